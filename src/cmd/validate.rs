//! Validate command - surface configuration problems without running a report

use super::ScenarioArgs;
use crate::core::{ConfigError, Scenario, ScenarioFile, SourceTable, SplitOverride};
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    #[command(flatten)]
    scenario: ScenarioArgs,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// A validation issue for output
#[derive(Debug, Clone, Serialize)]
struct ValidationIssue {
    /// Where the problem came from: the scenario itself or one --split
    origin: String,
    #[serde(rename = "type")]
    issue_type: String,
    message: String,
}

/// JSON output structure
#[derive(Debug, Serialize)]
struct ValidationOutput {
    scenario: String,
    issue_count: usize,
    issues: Vec<ValidationIssue>,
}

impl ValidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let (file, sources) = self.scenario.inputs()?;
        let name = file
            .name
            .clone()
            .unwrap_or_else(|| file.preset.display().to_string());
        let issues = collect_issues(file, &sources, self.scenario.overrides());

        if self.json {
            let output = ValidationOutput {
                scenario: name,
                issue_count: issues.len(),
                issues: issues.clone(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_text(&name, &issues);
        }

        // Exit with code 1 if issues found
        if !issues.is_empty() {
            std::process::exit(1);
        }
        Ok(())
    }
}

/// Check the scenario on its own, then each override against it, so that
/// one bad override does not hide the others.
fn collect_issues(
    file: ScenarioFile,
    sources: &SourceTable,
    overrides: &[SplitOverride],
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if let Err(err) = check(file.clone(), sources, &[]) {
        issues.push(issue("scenario", &err));
        return issues;
    }

    for o in overrides {
        if let Err(err) = check(file.clone(), sources, std::slice::from_ref(o)) {
            issues.push(issue(&format!("--split {}", o.category), &err));
        }
    }

    if issues.is_empty() && !overrides.is_empty() {
        if let Err(err) = check(file, sources, overrides) {
            issues.push(issue("combined overrides", &err));
        }
    }
    issues
}

fn check(
    file: ScenarioFile,
    sources: &SourceTable,
    overrides: &[SplitOverride],
) -> Result<(), ConfigError> {
    let scenario = Scenario::build(file, sources, overrides)?;
    scenario.compute()?;
    Ok(())
}

fn issue(origin: &str, err: &ConfigError) -> ValidationIssue {
    ValidationIssue {
        origin: origin.to_string(),
        issue_type: issue_type_name(err).to_string(),
        message: err.to_string(),
    }
}

fn issue_type_name(err: &ConfigError) -> &'static str {
    match err {
        ConfigError::SplitSumMismatch { .. } => "SplitSumMismatch",
        ConfigError::FractionOutOfRange { .. } => "FractionOutOfRange",
        ConfigError::UnknownBucket { .. } => "UnknownBucket",
        ConfigError::UnconfiguredSource(_) => "UnconfiguredSource",
        ConfigError::UnknownCategory(_) => "UnknownCategory",
        ConfigError::EmptyCategory => "EmptyCategory",
        ConfigError::DuplicateCategory(_) => "DuplicateCategory",
        ConfigError::ShareExceedsRemaining { .. } => "ShareExceedsRemaining",
        ConfigError::DuplicateShare(_) => "DuplicateShare",
        ConfigError::ResidualIsComputed(_) => "ResidualIsComputed",
        ConfigError::ResidualNotInBucketSet(_) => "ResidualNotInBucketSet",
        ConfigError::OffsetOutsideBucketSet(_) => "OffsetOutsideBucketSet",
        ConfigError::InvalidPercent(_) => "InvalidPercent",
        ConfigError::InvalidOverride(_) => "InvalidOverride",
    }
}

fn print_text(name: &str, issues: &[ValidationIssue]) {
    println!();
    println!("VALIDATION RESULTS ({})", name);
    println!();

    if issues.is_empty() {
        println!("\u{2713} No issues found.");
    } else {
        println!("\u{26A0} {} issue(s) found:", issues.len());
        println!();

        for (i, issue) in issues.iter().enumerate() {
            println!("  {}. [{}] {}", i + 1, issue.issue_type, issue.origin);
            println!("     {}", issue.message);
            println!();
        }
    }
}
