use clap::{Parser, Subcommand};

mod cmd;
mod core;

use cmd::{
    schema::SchemaCommand, simulate::SimulateCommand, splits::SplitsCommand,
    validate::ValidateCommand,
};

#[derive(Parser, Debug)]
#[command(
    name = "runoff",
    version,
    about = "Project second-round results by transferring first-round votes"
)]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transfer votes and report totals, leader and per-origin breakdown
    Simulate(SimulateCommand),
    /// Show the resolved split percentages for every origin category
    Splits(SplitsCommand),
    /// Check a scenario and its overrides without reporting results
    Validate(ValidateCommand),
    /// Print the expected input formats
    Schema(SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let opts = Opts::parse();
    match opts.command {
        Command::Simulate(simulate) => simulate.exec(),
        Command::Splits(splits) => splits.exec(),
        Command::Validate(validate) => validate.exec(),
        Command::Schema(schema) => schema.exec(),
    }
}
