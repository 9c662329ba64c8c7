pub mod schema;
pub mod simulate;
pub mod splits;
pub mod validate;

use crate::core::{
    read_scenario_json, read_sources_csv, Preset, Scenario, ScenarioFile, SourceTable,
    SplitOverride, TieBreak,
};
use clap::{Args, ValueEnum};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Options shared by every command that runs a scenario
#[derive(Args, Debug)]
pub struct ScenarioArgs {
    /// Scenario preset (overrides the preset in --scenario)
    #[arg(short, long, value_enum)]
    preset: Option<PresetArg>,

    /// JSON scenario file
    #[arg(short = 'f', long)]
    scenario: Option<PathBuf>,

    /// CSV of first-round votes (category,votes) replacing the built-in table, or "-" for stdin
    #[arg(short, long)]
    sources: Option<PathBuf>,

    /// Set one category's free inputs, e.g. "A D N:pdc=50,libre=20" (repeatable)
    #[arg(long = "split", value_name = "CATEGORY:BUCKET=PCT,...")]
    overrides: Vec<SplitOverride>,

    /// Leader to report when the finalists tie
    #[arg(short, long, value_enum)]
    tie_break: Option<TieBreakArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PresetArg {
    /// All rows transfer; BLANK is the residual
    Full,
    /// Finalists keep their first-round votes; other rows transfer
    Seeded,
    /// PDC, LIBRE and NULL only; NULL is the residual
    NoBlank,
    /// PDC and LIBRE only; LIBRE is the residual
    Finalists,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Full => Preset::Full,
            PresetArg::Seeded => Preset::Seeded,
            PresetArg::NoBlank => Preset::NoBlank,
            PresetArg::Finalists => Preset::Finalists,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TieBreakArg {
    FavorLibre,
    FavorPdc,
    Declare,
}

impl From<TieBreakArg> for TieBreak {
    fn from(arg: TieBreakArg) -> Self {
        match arg {
            TieBreakArg::FavorLibre => TieBreak::FavorLibre,
            TieBreakArg::FavorPdc => TieBreak::FavorPdc,
            TieBreakArg::Declare => TieBreak::Declare,
        }
    }
}

impl ScenarioArgs {
    /// Read every input and resolve it into a scenario.
    pub fn load(&self) -> anyhow::Result<Scenario> {
        let (file, sources) = self.inputs()?;
        Ok(Scenario::build(file, &sources, &self.overrides)?)
    }

    /// Scenario file (with command-line settings applied) and default source table
    pub fn inputs(&self) -> anyhow::Result<(ScenarioFile, SourceTable)> {
        let mut file = match &self.scenario {
            Some(path) => read_scenario_json(BufReader::new(File::open(path)?))?,
            None => ScenarioFile::default(),
        };
        if let Some(preset) = self.preset {
            file.preset = preset.into();
        }
        if let Some(tie_break) = self.tie_break {
            file.tie_break = Some(tie_break.into());
        }
        let sources = match &self.sources {
            Some(path) => read_sources(path)?,
            None => SourceTable::first_round()?,
        };
        Ok((file, sources))
    }

    pub fn overrides(&self) -> &[SplitOverride] {
        &self.overrides
    }
}

/// Read a source table from a CSV file (or stdin with "-")
pub fn read_sources(path: &Path) -> anyhow::Result<SourceTable> {
    if path.as_os_str() == "-" {
        let mut buffer = Vec::new();
        io::stdin().lock().read_to_end(&mut buffer)?;
        if buffer.is_empty() {
            anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
        }
        read_sources_csv(io::Cursor::new(buffer))
    } else {
        read_sources_csv(BufReader::new(File::open(path)?))
    }
}

/// Whole number with thousands separators, e.g. 1,717,432
pub fn format_votes(votes: u64) -> String {
    let digits = votes.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_separators() {
        assert_eq!(format_votes(0), "0");
        assert_eq!(format_votes(999), "999");
        assert_eq!(format_votes(1000), "1,000");
        assert_eq!(format_votes(1_717_432), "1,717,432");
        assert_eq!(format_votes(100_000), "100,000");
    }
}
