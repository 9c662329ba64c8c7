use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::str::FromStr;

use super::bucket::Bucket;
use super::engine::{TieBreak, TransferEngine, TransferResult};
use super::error::ConfigError;
use super::source::{SourceRow, SourceTable};
use super::split::{CategorySplit, Percent, SplitBuilder, SplitConfig};

/// Named engine configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Every first-round vote is redistributed; BLANK takes the remainder
    #[default]
    Full,
    /// Finalists keep their first-round votes as a base; only the other rows transfer
    Seeded,
    /// No blank bucket; NULL takes the remainder
    NoBlank,
    /// Head-to-head only; LIBRE takes the remainder
    Finalists,
}

impl Preset {
    pub fn buckets(self) -> Vec<Bucket> {
        match self {
            Preset::Full | Preset::Seeded => Bucket::ALL.to_vec(),
            Preset::NoBlank => vec![Bucket::Pdc, Bucket::Libre, Bucket::Null],
            Preset::Finalists => Bucket::FINALISTS.to_vec(),
        }
    }

    pub fn residual(self) -> Bucket {
        match self {
            Preset::Full | Preset::Seeded => Bucket::Blank,
            Preset::NoBlank => Bucket::Null,
            Preset::Finalists => Bucket::Libre,
        }
    }

    pub fn seeds_finalists(self) -> bool {
        matches!(self, Preset::Seeded)
    }

    pub fn display(&self) -> &'static str {
        match self {
            Preset::Full => "full",
            Preset::Seeded => "seeded",
            Preset::NoBlank => "no-blank",
            Preset::Finalists => "finalists",
        }
    }
}

/// Percentage a free input starts at before the user changes it.
///
/// Finalist voters mostly stay with their candidate; everyone else leans
/// 40/30/20 across PDC, LIBRE and NULL.
pub fn default_percent(category: &str, bucket: Bucket) -> Percent {
    let value = match (Bucket::finalist_for_category(category), bucket) {
        (Some(Bucket::Pdc), Bucket::Pdc) => 80,
        (Some(Bucket::Pdc), Bucket::Libre) => 5,
        (Some(Bucket::Pdc), Bucket::Null) => 10,
        (Some(Bucket::Libre), Bucket::Libre) => 85,
        (Some(Bucket::Libre), Bucket::Pdc) => 5,
        (Some(Bucket::Libre), Bucket::Null) => 5,
        (None, Bucket::Pdc) => 40,
        (None, Bucket::Libre) => 30,
        (None, Bucket::Null) => 20,
        _ => 0,
    };
    Percent::new(value).unwrap_or(Percent::ZERO)
}

/// Scenario file (JSON). Everything except the preset is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    /// Name shown in reports
    #[serde(default)]
    pub name: Option<String>,
    /// Preset providing the defaults below
    #[serde(default)]
    pub preset: Preset,
    /// Destination buckets, replacing the preset's
    #[serde(default)]
    pub buckets: Option<Vec<Bucket>>,
    /// Bucket that receives the remainder of every split
    #[serde(default)]
    pub residual: Option<Bucket>,
    /// Votes each bucket holds before transfers
    #[serde(default)]
    pub base_offsets: Option<BTreeMap<Bucket, u64>>,
    /// What to report when the finalists tie
    #[serde(default)]
    pub tie_break: Option<TieBreak>,
    /// First-round rows replacing the built-in table
    #[serde(default)]
    pub sources: Option<Vec<SourceRow>>,
    /// Whole percentages per category for the free buckets; the residual is computed
    #[serde(default)]
    pub splits: BTreeMap<String, BTreeMap<Bucket, u8>>,
}

impl ScenarioFile {
    #[cfg(test)]
    pub fn from_preset(preset: Preset) -> Self {
        ScenarioFile {
            preset,
            ..Default::default()
        }
    }
}

pub fn read_scenario_json<R: Read>(reader: R) -> anyhow::Result<ScenarioFile> {
    let file: ScenarioFile = serde_json::from_reader(reader)?;
    log::info!(
        "Read scenario '{}' ({} preset, {} configured categories)",
        file.name.as_deref().unwrap_or("unnamed"),
        file.preset.display(),
        file.splits.len()
    );
    Ok(file)
}

/// Replacement free inputs for one category, e.g. `A D N:pdc=50,libre=20`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOverride {
    pub category: String,
    pub shares: Vec<(Bucket, Percent)>,
}

impl FromStr for SplitOverride {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidOverride(s.to_string());
        let (category, shares) = s.rsplit_once(':').ok_or_else(invalid)?;
        let category = category.trim();
        if category.is_empty() {
            return Err(invalid());
        }
        let shares = shares
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| {
                let (bucket, pct) = part.split_once('=').ok_or_else(invalid)?;
                Ok((bucket.parse::<Bucket>()?, pct.parse::<Percent>()?))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        if shares.is_empty() {
            return Err(invalid());
        }
        Ok(SplitOverride {
            category: category.to_string(),
            shares,
        })
    }
}

/// A fully resolved run: engine parameters, source rows and splits
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub preset: Preset,
    pub engine: TransferEngine,
    pub sources: SourceTable,
    pub splits: SplitConfig,
}

impl Scenario {
    /// Resolve a scenario file against the default source table, applying
    /// command-line overrides on top of the file's split inputs.
    pub fn build(
        file: ScenarioFile,
        default_sources: &SourceTable,
        overrides: &[SplitOverride],
    ) -> Result<Self, ConfigError> {
        let preset = file.preset;
        let buckets = file.buckets.unwrap_or_else(|| preset.buckets());
        let residual = file.residual.unwrap_or_else(|| preset.residual());

        let table = match file.sources {
            Some(rows) => SourceTable::new(rows)?,
            None => default_sources.clone(),
        };

        let (sources, base_offsets) = if preset.seeds_finalists() {
            let seeded = table.without(|r| Bucket::finalist_for_category(&r.category).is_some());
            let offsets = match file.base_offsets {
                Some(offsets) => offsets,
                None => table
                    .rows()
                    .iter()
                    .filter_map(|r| {
                        Bucket::finalist_for_category(&r.category).map(|b| (b, r.votes))
                    })
                    .collect(),
            };
            (seeded, offsets)
        } else {
            (table, file.base_offsets.unwrap_or_default())
        };

        let mut engine = TransferEngine::new(buckets, residual)?
            .with_tie_break(file.tie_break.unwrap_or_default());
        for (bucket, votes) in base_offsets {
            engine = engine.with_base_offset(bucket, votes)?;
        }

        let mut inputs: BTreeMap<String, BTreeMap<Bucket, Percent>> = BTreeMap::new();
        for (category, shares) in file.splits {
            let entry = inputs.entry(category).or_default();
            for (bucket, value) in shares {
                entry.insert(bucket, Percent::new(value)?);
            }
        }
        for o in overrides {
            let entry = inputs.entry(o.category.clone()).or_default();
            entry.extend(o.shares.iter().copied());
        }
        if let Some(unknown) = inputs.keys().find(|c| !sources.contains(c)) {
            return Err(ConfigError::UnknownCategory(unknown.clone()));
        }

        let splits = sources
            .rows()
            .iter()
            .map(|row| {
                let explicit = inputs.get(&row.category).cloned().unwrap_or_default();
                let split = resolve_split(&row.category, &engine, &explicit)?;
                Ok((row.category.clone(), split))
            })
            .collect::<Result<SplitConfig, ConfigError>>()?;

        Ok(Scenario {
            name: file.name.unwrap_or_else(|| preset.display().to_string()),
            preset,
            engine,
            sources,
            splits,
        })
    }

    #[cfg(test)]
    pub fn from_preset(preset: Preset, sources: &SourceTable) -> Result<Self, ConfigError> {
        Self::build(ScenarioFile::from_preset(preset), sources, &[])
    }

    pub fn compute(&self) -> Result<TransferResult, ConfigError> {
        self.engine.compute_transfer(self.sources.rows(), &self.splits)
    }
}

/// Explicit inputs go in first and must fit under the cap; the remaining free
/// buckets then take their defaults, clamped to whatever is left.
fn resolve_split(
    category: &str,
    engine: &TransferEngine,
    explicit: &BTreeMap<Bucket, Percent>,
) -> Result<CategorySplit, ConfigError> {
    let residual = engine.residual();
    if explicit.contains_key(&residual) {
        return Err(ConfigError::ResidualIsComputed(residual));
    }
    if let Some(bucket) = explicit.keys().find(|b| !engine.buckets().contains(b)) {
        return Err(ConfigError::UnknownBucket {
            category: category.to_string(),
            bucket: *bucket,
        });
    }

    let order = SplitBuilder::input_order(category, engine.buckets(), residual);
    let mut builder = SplitBuilder::new(residual);
    for bucket in &order {
        if let Some(percent) = explicit.get(bucket) {
            builder.allocate(*bucket, *percent)?;
        }
    }
    for bucket in order.iter().filter(|b| !explicit.contains_key(b)) {
        builder.allocate_clamped(*bucket, default_percent(category, *bucket))?;
    }
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::Leader;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn first_round() -> SourceTable {
        SourceTable::first_round().unwrap()
    }

    #[test]
    fn default_split_per_origin() {
        let scenario = Scenario::from_preset(Preset::Full, &first_round()).unwrap();

        let pdc = scenario.splits.get("PDC").unwrap();
        assert_eq!(pdc.percent(Bucket::Pdc), dec!(80));
        assert_eq!(pdc.percent(Bucket::Blank), dec!(5));

        let libre = scenario.splits.get("LIBRE").unwrap();
        assert_eq!(libre.percent(Bucket::Libre), dec!(85));
        assert_eq!(libre.percent(Bucket::Pdc), dec!(5));
        assert_eq!(libre.percent(Bucket::Blank), dec!(5));

        let mas = scenario.splits.get("MAS").unwrap();
        assert_eq!(mas.percent(Bucket::Null), dec!(20));
        assert_eq!(mas.percent(Bucket::Blank), dec!(10));
    }

    #[test]
    fn full_preset_totals() {
        let result = Scenario::from_preset(Preset::Full, &first_round())
            .unwrap()
            .compute()
            .unwrap();

        assert_eq!(result.total(Bucket::Pdc), 2_838_011);
        assert_eq!(result.total(Bucket::Libre), 2_345_938);
        assert_eq!(result.total(Bucket::Null), 939_528);
        assert_eq!(result.total(Bucket::Blank), 505_515);
        assert_eq!(result.first_round_votes(), 6_629_012);
        assert_eq!(result.projected_votes(), 6_628_992);
        assert_eq!(result.truncation_loss(), 20);
        assert_eq!(result.outcome.valid_votes, 5_183_949);
        assert_eq!(result.outcome.leader, Leader::Finalist(Bucket::Pdc));
        assert_eq!(result.outcome.margin, 492_073);
    }

    #[test]
    fn seeded_preset_moves_only_other_rows() {
        let scenario = Scenario::from_preset(Preset::Seeded, &first_round()).unwrap();
        assert!(!scenario.sources.contains("PDC"));
        assert!(!scenario.sources.contains("LIBRE"));
        assert_eq!(scenario.engine.base_offset(Bucket::Pdc), 1_717_432);
        assert_eq!(scenario.engine.base_offset(Bucket::Libre), 1_430_176);

        let result = scenario.compute().unwrap();
        assert_eq!(result.total(Bucket::Pdc), 3_109_990);
        assert_eq!(result.total(Bucket::Libre), 2_474_594);
        assert_eq!(result.base_votes(), 3_147_608);
        assert_eq!(result.first_round_votes(), 3_481_404);
        assert_eq!(result.truncation_loss(), 15);
        assert_eq!(result.outcome.margin, 635_396);
    }

    #[test]
    fn no_blank_preset_sends_remainder_to_null() {
        let result = Scenario::from_preset(Preset::NoBlank, &first_round())
            .unwrap()
            .compute()
            .unwrap();
        assert_eq!(result.buckets, vec![Bucket::Pdc, Bucket::Libre, Bucket::Null]);
        assert_eq!(result.total(Bucket::Null), 1_445_049);
        assert_eq!(result.total(Bucket::Blank), 0);
    }

    #[test]
    fn finalists_preset_is_head_to_head() {
        let scenario = Scenario::from_preset(Preset::Finalists, &first_round()).unwrap();
        assert_eq!(scenario.splits.get("LIBRE").unwrap().percent(Bucket::Libre), dec!(95));

        let result = scenario.compute().unwrap();
        assert_eq!(result.total(Bucket::Pdc), 2_838_011);
        assert_eq!(result.total(Bucket::Libre), 3_790_992);
        assert_eq!(result.outcome.valid_votes, result.projected_votes());
        assert_eq!(result.outcome.leader, Leader::Finalist(Bucket::Libre));
    }

    #[test]
    fn override_replaces_free_inputs() {
        let overrides = vec!["A D N:pdc=10,libre=70".parse::<SplitOverride>().unwrap()];
        let scenario =
            Scenario::build(ScenarioFile::default(), &first_round(), &overrides).unwrap();

        let adn = scenario.splits.get("A D N").unwrap();
        assert_eq!(adn.percent(Bucket::Pdc), dec!(10));
        assert_eq!(adn.percent(Bucket::Libre), dec!(70));
        // default NULL of 20 still fits
        assert_eq!(adn.percent(Bucket::Null), dec!(20));
        assert_eq!(adn.percent(Bucket::Blank), dec!(0));

        let result = scenario.compute().unwrap();
        assert_eq!(result.total(Bucket::Pdc), 2_706_194);
        assert_eq!(result.total(Bucket::Libre), 2_521_693);
        assert_eq!(result.outcome.margin, 184_501);
    }

    #[test]
    fn explicit_inputs_take_priority_over_defaults() {
        // LIBRE voters default to 85% retention, which would leave no room for 50% to PDC
        let overrides = vec!["LIBRE:pdc=50".parse::<SplitOverride>().unwrap()];
        let scenario =
            Scenario::build(ScenarioFile::default(), &first_round(), &overrides).unwrap();

        let libre = scenario.splits.get("LIBRE").unwrap();
        assert_eq!(libre.percent(Bucket::Pdc), dec!(50));
        assert_eq!(libre.percent(Bucket::Libre), dec!(50));
        assert_eq!(libre.percent(Bucket::Null), dec!(0));
        assert_eq!(libre.percent(Bucket::Blank), dec!(0));
    }

    #[test]
    fn override_errors() {
        let table = first_round();
        let build = |o: &str| -> Result<Scenario, ConfigError> {
            let o = o.parse::<SplitOverride>()?;
            Scenario::build(ScenarioFile::default(), &table, &[o])
        };

        assert_eq!(
            build("MAS:blank=10").unwrap_err(),
            ConfigError::ResidualIsComputed(Bucket::Blank)
        );
        assert_eq!(
            build("MAS:pdc=60,libre=50").unwrap_err(),
            ConfigError::ShareExceedsRemaining {
                bucket: Bucket::Libre,
                requested: 50,
                remaining: 40,
            }
        );
        assert_eq!(
            build("Ghost:pdc=10").unwrap_err(),
            ConfigError::UnknownCategory("Ghost".to_string())
        );
        assert!(matches!(build("MAS"), Err(ConfigError::InvalidOverride(_))));
        assert!(matches!(build("MAS:pdc"), Err(ConfigError::InvalidOverride(_))));
        assert!(matches!(build("MAS:pdc=101"), Err(ConfigError::InvalidPercent(_))));
    }

    #[test]
    fn override_bucket_outside_scenario() {
        let o = "MAS:null=10".parse::<SplitOverride>().unwrap();
        let err = Scenario::build(
            ScenarioFile::from_preset(Preset::Finalists),
            &first_round(),
            &[o],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownBucket {
                category: "MAS".to_string(),
                bucket: Bucket::Null,
            }
        );
    }

    #[test]
    fn override_category_may_contain_spaces_and_dots() {
        let o = "UNIDAD NAL.:libre=35, null=5".parse::<SplitOverride>().unwrap();
        assert_eq!(o.category, "UNIDAD NAL.");
        assert_eq!(
            o.shares,
            vec![
                (Bucket::Libre, Percent::new(35).unwrap()),
                (Bucket::Null, Percent::new(5).unwrap())
            ]
        );
    }

    #[test]
    fn scenario_file_with_inline_sources() {
        let json = r#"{
            "name": "tie",
            "preset": "full",
            "base_offsets": { "PDC": 1000000, "LIBRE": 1000000 },
            "tie_break": "declare",
            "sources": [ { "category": "X", "votes": 5000 } ],
            "splits": { "X": { "PDC": 0, "LIBRE": 0, "NULL": 0 } }
        }"#;
        let file = read_scenario_json(json.as_bytes()).unwrap();
        let scenario = Scenario::build(file, &first_round(), &[]).unwrap();
        assert_eq!(scenario.name, "tie");

        let result = scenario.compute().unwrap();
        assert_eq!(result.outcome.margin, 0);
        assert_eq!(result.outcome.leader, Leader::Tied);
        assert_eq!(result.total(Bucket::Blank), 5000);
    }

    #[test]
    fn scenario_file_rejects_unknown_fields() {
        let json = r#"{ "preset": "full", "colour": "orange" }"#;
        assert!(read_scenario_json(json.as_bytes()).is_err());
    }

    #[test]
    fn scenario_file_with_custom_residual() {
        let json = r#"{
            "buckets": ["PDC", "LIBRE", "NULL", "BLANK"],
            "residual": "NULL",
            "sources": [ { "category": "X", "votes": 100 } ],
            "splits": { "X": { "PDC": 50, "LIBRE": 30, "BLANK": 5 } }
        }"#;
        let file = read_scenario_json(json.as_bytes()).unwrap();
        let scenario = Scenario::build(file, &first_round(), &[]).unwrap();
        let split = scenario.splits.get("X").unwrap();
        assert_eq!(split.percent(Bucket::Null), dec!(15));
        assert_eq!(split.sum(), Decimal::ONE);
    }

    #[test]
    fn default_percent_table() {
        assert_eq!(default_percent("PDC", Bucket::Null).value(), 10);
        assert_eq!(default_percent("LIBRE", Bucket::Null).value(), 5);
        assert_eq!(default_percent("SUMATE", Bucket::Libre).value(), 30);
        assert_eq!(default_percent("SUMATE", Bucket::Blank).value(), 0);
    }
}
