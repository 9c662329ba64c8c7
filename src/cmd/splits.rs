//! Splits command - resolved transfer percentages per origin category

use super::{format_votes, ScenarioArgs};
use crate::core::{Bucket, Scenario};
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

#[derive(Args, Debug)]
pub struct SplitsCommand {
    #[command(flatten)]
    scenario: ScenarioArgs,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct SplitsOutput {
    scenario: String,
    residual: Bucket,
    categories: Vec<CategoryOutput>,
}

#[derive(Debug, Serialize)]
struct CategoryOutput {
    category: String,
    first_round_votes: u64,
    percent: BTreeMap<Bucket, Decimal>,
}

impl SplitsCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let scenario = self.scenario.load()?;
        if self.json {
            let output = splits_output(&scenario);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!();
            println!("TRANSFER SPLITS ({})", scenario.name);
            println!();
            println!("{}", splits_table(&scenario));
            println!(
                "(auto) = {} is computed as 100% minus the other buckets",
                scenario.engine.residual()
            );
        }
        Ok(())
    }
}

fn splits_output(scenario: &Scenario) -> SplitsOutput {
    let buckets = scenario.engine.buckets();
    let categories = scenario
        .sources
        .rows()
        .iter()
        .map(|row| {
            let percent = scenario
                .splits
                .get(&row.category)
                .map(|split| {
                    buckets
                        .iter()
                        .map(|b| (*b, split.percent(*b).normalize()))
                        .collect()
                })
                .unwrap_or_default();
            CategoryOutput {
                category: row.category.clone(),
                first_round_votes: row.votes,
                percent,
            }
        })
        .collect();

    SplitsOutput {
        scenario: scenario.name.clone(),
        residual: scenario.engine.residual(),
        categories,
    }
}

fn splits_table(scenario: &Scenario) -> String {
    let buckets = scenario.engine.buckets();
    let residual = scenario.engine.residual();

    let mut builder = Builder::default();
    let mut header = vec!["Origin".to_string(), "Votes".to_string()];
    header.extend(buckets.iter().map(|b| {
        if *b == residual {
            format!("{} (auto)", b)
        } else {
            b.to_string()
        }
    }));
    builder.push_record(header);

    for row in scenario.sources.rows() {
        let mut record = vec![row.category.clone(), format_votes(row.votes)];
        match scenario.splits.get(&row.category) {
            Some(split) => record.extend(
                buckets
                    .iter()
                    .map(|b| format!("{}%", split.percent(*b).normalize())),
            ),
            None => record.extend(buckets.iter().map(|_| "-".to_string())),
        }
        builder.push_record(record);
    }

    builder
        .build()
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string()
}
