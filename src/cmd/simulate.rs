//! Simulate command - transfer first-round votes and report the second round

use super::{format_votes, ScenarioArgs};
use crate::core::{Bucket, Leader, Scenario, TransferResult};
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct SimulateCommand {
    #[command(flatten)]
    scenario: ScenarioArgs,

    /// Output as JSON instead of formatted text
    #[arg(long, conflicts_with = "csv")]
    json: bool,

    /// Output the per-origin breakdown as CSV
    #[arg(long)]
    csv: bool,
}

/// Simulation data for JSON output
#[derive(Debug, Serialize)]
struct SimulationOutput {
    scenario: String,
    preset: String,
    buckets: Vec<Bucket>,
    residual: Bucket,
    first_round_votes: u64,
    base_votes: u64,
    projected_votes: u64,
    truncation_loss: u64,
    totals: BTreeMap<Bucket, u64>,
    valid_votes: u64,
    percent_of_valid: BTreeMap<Bucket, String>,
    leader: Leader,
    margin: u64,
    breakdown: Vec<OriginOutput>,
}

#[derive(Debug, Serialize)]
struct OriginOutput {
    category: String,
    first_round_votes: u64,
    votes: BTreeMap<Bucket, u64>,
    truncation_loss: u64,
}

/// Row of the total votes table
#[derive(Debug, Clone, Tabled)]
struct BucketRow {
    #[tabled(rename = "Bucket")]
    bucket: String,
    #[tabled(rename = "Base")]
    base: String,
    #[tabled(rename = "Votes")]
    votes: String,
    #[tabled(rename = "Share")]
    share: String,
}

impl SimulateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let scenario = self.scenario.load()?;
        let result = scenario.compute()?;

        if self.json {
            self.print_json(&scenario, &result)
        } else if self.csv {
            write_breakdown_csv(&result, io::stdout())
        } else {
            self.print_report(&scenario, &result);
            Ok(())
        }
    }

    fn print_report(&self, scenario: &Scenario, result: &TransferResult) {
        let outcome = &result.outcome;

        println!();
        println!(
            "SECOND ROUND PROJECTION ({}) - {} is the residual",
            scenario.name,
            scenario.engine.residual()
        );
        println!();

        println!("VOTE CHECK");
        println!(
            "  First-round votes transferred: {}",
            format_votes(result.first_round_votes())
        );
        if result.base_votes() > 0 {
            println!("  Base votes: {}", format_votes(result.base_votes()));
        }
        println!(
            "  Projected second-round votes: {}",
            format_votes(result.projected_votes())
        );
        println!(
            "  Lost to truncation: {}",
            format_votes(result.truncation_loss())
        );
        println!();

        println!("VALID VOTES");
        for bucket in Bucket::FINALISTS {
            if let Some(share) = outcome.percent_of_valid.get(&bucket) {
                println!(
                    "  {}: {} ({})",
                    bucket,
                    format_votes(result.total(bucket)),
                    format_percent(*share)
                );
            }
        }
        println!(
            "  Valid: {} | Margin: {} | Leader: {}",
            format_votes(outcome.valid_votes),
            format_votes(outcome.margin),
            outcome.leader
        );
        println!();

        println!("TOTAL VOTES");
        let rows: Vec<BucketRow> = result
            .buckets
            .iter()
            .map(|&bucket| BucketRow {
                bucket: bucket.to_string(),
                base: format_votes(result.base_offsets.get(&bucket).copied().unwrap_or(0)),
                votes: format_votes(result.total(bucket)),
                share: format_percent(result.percent_of_projected(bucket)),
            })
            .collect();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
        println!();

        println!("TRANSFERS BY ORIGIN");
        println!("{}", breakdown_table(result));
    }

    fn print_json(&self, scenario: &Scenario, result: &TransferResult) -> anyhow::Result<()> {
        let outcome = &result.outcome;
        let data = SimulationOutput {
            scenario: scenario.name.clone(),
            preset: scenario.preset.display().to_string(),
            buckets: result.buckets.clone(),
            residual: scenario.engine.residual(),
            first_round_votes: result.first_round_votes(),
            base_votes: result.base_votes(),
            projected_votes: result.projected_votes(),
            truncation_loss: result.truncation_loss(),
            totals: result.totals.clone(),
            valid_votes: outcome.valid_votes,
            percent_of_valid: outcome
                .percent_of_valid
                .iter()
                .map(|(bucket, share)| (*bucket, format!("{:.2}", share.round_dp(2))))
                .collect(),
            leader: outcome.leader,
            margin: outcome.margin,
            breakdown: result
                .breakdown
                .iter()
                .map(|o| OriginOutput {
                    category: o.category.clone(),
                    first_round_votes: o.first_round_votes,
                    votes: o.votes.clone(),
                    truncation_loss: o.truncation_loss(),
                })
                .collect(),
        };

        println!("{}", serde_json::to_string_pretty(&data)?);
        Ok(())
    }
}

fn breakdown_table(result: &TransferResult) -> String {
    let mut builder = Builder::default();
    let mut header = vec!["Origin".to_string(), "First Round".to_string()];
    header.extend(result.buckets.iter().map(|b| format!("To {}", b)));
    header.push("Lost".to_string());
    builder.push_record(header);

    for origin in &result.breakdown {
        let mut record = vec![
            origin.category.clone(),
            format_votes(origin.first_round_votes),
        ];
        record.extend(result.buckets.iter().map(|b| format_votes(origin.to(*b))));
        record.push(format_votes(origin.truncation_loss()));
        builder.push_record(record);
    }

    builder
        .build()
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string()
}

/// Breakdown as CSV: one row per origin, one column per bucket
fn write_breakdown_csv<W: io::Write>(result: &TransferResult, writer: W) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["category".to_string(), "first_round_votes".to_string()];
    header.extend(result.buckets.iter().map(|b| b.display().to_lowercase()));
    header.push("truncation_loss".to_string());
    wtr.write_record(&header)?;

    for origin in &result.breakdown {
        let mut record = vec![origin.category.clone(), origin.first_round_votes.to_string()];
        record.extend(result.buckets.iter().map(|b| origin.to(*b).to_string()));
        record.push(origin.truncation_loss().to_string());
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn format_percent(share: Decimal) -> String {
    format!("{:.2}%", share.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Preset, SourceTable};

    fn full() -> TransferResult {
        let sources = SourceTable::first_round().unwrap();
        Scenario::from_preset(Preset::Full, &sources)
            .unwrap()
            .compute()
            .unwrap()
    }

    #[test]
    fn breakdown_csv_has_column_per_bucket() {
        let mut out = Vec::new();
        write_breakdown_csv(&full(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next(),
            Some("category,first_round_votes,pdc,libre,null,blank,truncation_loss")
        );
        assert_eq!(
            lines.next(),
            Some("PDC,1717432,1373945,85871,171743,85871,2")
        );
        assert_eq!(text.lines().count(), 10);
    }

    #[test]
    fn breakdown_table_lists_every_origin() {
        let table = breakdown_table(&full());
        assert!(table.contains("To BLANK"));
        assert!(table.contains("UNIDAD NAL."));
        assert!(table.contains("1,373,945"));
    }

    #[test]
    fn percent_has_two_decimals() {
        assert_eq!(format_percent(Decimal::new(547461, 4)), "54.75%");
        assert_eq!(format_percent(Decimal::ZERO), "0.00%");
    }
}
