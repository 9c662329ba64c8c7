use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::bucket::Bucket;
use super::error::ConfigError;
use super::source::SourceRow;
use super::split::SplitConfig;

/// How a dead heat between the finalists is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// LIBRE leads on a tie
    #[default]
    FavorLibre,
    /// PDC leads on a tie
    FavorPdc,
    /// No leader; reported as tied
    Declare,
}

/// Finalist ahead after the transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leader {
    Finalist(Bucket),
    Tied,
    /// No valid votes, or the scenario has no two finalists
    Undefined,
}

impl std::fmt::Display for Leader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Leader::Finalist(bucket) => write!(f, "{}", bucket),
            Leader::Tied => write!(f, "none (tied)"),
            Leader::Undefined => write!(f, "undefined (no valid votes)"),
        }
    }
}

impl Serialize for Leader {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Head-to-head figures between the two finalists
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    /// PDC + LIBRE, or 0 if either is missing from the scenario
    pub valid_votes: u64,
    /// Share of valid votes, finalists only
    pub percent_of_valid: BTreeMap<Bucket, Decimal>,
    pub leader: Leader,
    pub margin: u64,
}

/// Votes one origin category sends to each bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginBreakdown {
    pub category: String,
    pub first_round_votes: u64,
    pub votes: BTreeMap<Bucket, u64>,
}

impl OriginBreakdown {
    pub fn to(&self, bucket: Bucket) -> u64 {
        self.votes.get(&bucket).copied().unwrap_or(0)
    }

    pub fn transferred(&self) -> u64 {
        self.votes.values().sum()
    }

    /// Votes dropped by truncating each bucket's share
    pub fn truncation_loss(&self) -> u64 {
        self.first_round_votes - self.transferred()
    }
}

/// Result of one full transfer computation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferResult {
    pub buckets: Vec<Bucket>,
    pub breakdown: Vec<OriginBreakdown>,
    pub base_offsets: BTreeMap<Bucket, u64>,
    pub totals: BTreeMap<Bucket, u64>,
    pub outcome: Outcome,
}

impl TransferResult {
    pub fn total(&self, bucket: Bucket) -> u64 {
        self.totals.get(&bucket).copied().unwrap_or(0)
    }

    /// First-round votes of all transferred rows
    pub fn first_round_votes(&self) -> u64 {
        self.breakdown.iter().map(|o| o.first_round_votes).sum()
    }

    pub fn base_votes(&self) -> u64 {
        self.base_offsets.values().sum()
    }

    /// Every vote in the second round: transfers plus base offsets
    pub fn projected_votes(&self) -> u64 {
        self.totals.values().sum()
    }

    pub fn truncation_loss(&self) -> u64 {
        self.breakdown.iter().map(|o| o.truncation_loss()).sum()
    }

    /// Share of all projected votes that lands in `bucket`
    pub fn percent_of_projected(&self, bucket: Bucket) -> Decimal {
        percent(self.total(bucket), self.projected_votes())
    }
}

/// Redistributes first-round votes into second-round buckets.
///
/// One engine covers every scenario: it is parameterised by the bucket set,
/// the bucket that takes each split's remainder, optional base votes already
/// held by a bucket, and the tie-break policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEngine {
    buckets: Vec<Bucket>,
    residual: Bucket,
    base_offsets: BTreeMap<Bucket, u64>,
    tie_break: TieBreak,
}

impl TransferEngine {
    pub fn new(buckets: Vec<Bucket>, residual: Bucket) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let buckets: Vec<Bucket> = buckets.into_iter().filter(|b| seen.insert(*b)).collect();
        if !buckets.contains(&residual) {
            return Err(ConfigError::ResidualNotInBucketSet(residual));
        }
        Ok(TransferEngine {
            buckets,
            residual,
            base_offsets: BTreeMap::new(),
            tie_break: TieBreak::default(),
        })
    }

    /// Votes `bucket` holds before any transfer.
    pub fn with_base_offset(mut self, bucket: Bucket, votes: u64) -> Result<Self, ConfigError> {
        if !self.buckets.contains(&bucket) {
            return Err(ConfigError::OffsetOutsideBucketSet(bucket));
        }
        self.base_offsets.insert(bucket, votes);
        Ok(self)
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn residual(&self) -> Bucket {
        self.residual
    }

    pub fn base_offset(&self, bucket: Bucket) -> u64 {
        self.base_offsets.get(&bucket).copied().unwrap_or(0)
    }

    /// Check that `rows` and `config` describe the same categories and that
    /// every split is well formed.
    pub fn validate(&self, rows: &[SourceRow], config: &SplitConfig) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for row in rows {
            if !seen.insert(row.category.as_str()) {
                return Err(ConfigError::DuplicateCategory(row.category.clone()));
            }
            let split = config
                .get(&row.category)
                .ok_or_else(|| ConfigError::UnconfiguredSource(row.category.clone()))?;
            split.validate(&row.category, &self.buckets)?;
        }
        if let Some(unknown) = config.categories().find(|c| !seen.contains(c)) {
            return Err(ConfigError::UnknownCategory(unknown.to_string()));
        }
        Ok(())
    }

    /// Compute every bucket's votes from scratch.
    ///
    /// Each row's share of a bucket is truncated to a whole vote, so a row can
    /// transfer slightly fewer votes than it had. The shortfall is reported as
    /// truncation loss and never redistributed.
    pub fn compute_transfer(
        &self,
        rows: &[SourceRow],
        config: &SplitConfig,
    ) -> Result<TransferResult, ConfigError> {
        self.validate(rows, config)?;

        let mut totals: BTreeMap<Bucket, u64> = self
            .buckets
            .iter()
            .map(|b| (*b, self.base_offset(*b)))
            .collect();
        let mut breakdown = Vec::with_capacity(rows.len());

        for row in rows {
            let split = config
                .get(&row.category)
                .ok_or_else(|| ConfigError::UnconfiguredSource(row.category.clone()))?;

            let mut votes = BTreeMap::new();
            for &bucket in &self.buckets {
                let fraction = split.fraction(bucket);
                let moved = truncated_share(row.votes, fraction).ok_or_else(|| {
                    ConfigError::FractionOutOfRange {
                        category: row.category.clone(),
                        bucket,
                        fraction,
                    }
                })?;
                *totals.entry(bucket).or_default() += moved;
                votes.insert(bucket, moved);
            }

            let origin = OriginBreakdown {
                category: row.category.clone(),
                first_round_votes: row.votes,
                votes,
            };
            log::debug!(
                "{}: {} votes, {} transferred, {} lost to truncation",
                origin.category,
                origin.first_round_votes,
                origin.transferred(),
                origin.truncation_loss()
            );
            breakdown.push(origin);
        }

        let outcome = self.outcome(&totals);
        let result = TransferResult {
            buckets: self.buckets.clone(),
            breakdown,
            base_offsets: self.base_offsets.clone(),
            totals,
            outcome,
        };
        log::info!(
            "Projected {} votes from {} first-round votes ({} base, {} lost to truncation)",
            result.projected_votes(),
            result.first_round_votes(),
            result.base_votes(),
            result.truncation_loss()
        );
        Ok(result)
    }

    fn outcome(&self, totals: &BTreeMap<Bucket, u64>) -> Outcome {
        let (pdc, libre) = match (totals.get(&Bucket::Pdc), totals.get(&Bucket::Libre)) {
            (Some(&pdc), Some(&libre)) => (pdc, libre),
            _ => {
                return Outcome {
                    valid_votes: 0,
                    percent_of_valid: Bucket::FINALISTS
                        .into_iter()
                        .filter(|b| totals.contains_key(b))
                        .map(|b| (b, Decimal::ZERO))
                        .collect(),
                    leader: Leader::Undefined,
                    margin: 0,
                }
            }
        };

        let valid_votes = pdc + libre;
        let percent_of_valid = BTreeMap::from([
            (Bucket::Pdc, percent(pdc, valid_votes)),
            (Bucket::Libre, percent(libre, valid_votes)),
        ]);
        let leader = if valid_votes == 0 {
            Leader::Undefined
        } else if pdc > libre {
            Leader::Finalist(Bucket::Pdc)
        } else if libre > pdc {
            Leader::Finalist(Bucket::Libre)
        } else {
            match self.tie_break {
                TieBreak::FavorLibre => Leader::Finalist(Bucket::Libre),
                TieBreak::FavorPdc => Leader::Finalist(Bucket::Pdc),
                TieBreak::Declare => Leader::Tied,
            }
        };

        Outcome {
            valid_votes,
            percent_of_valid,
            leader,
            margin: pdc.abs_diff(libre),
        }
    }
}

/// `part / whole * 100`, or 0 when `whole` is 0
fn percent(part: u64, whole: u64) -> Decimal {
    if whole == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(part) / Decimal::from(whole) * dec!(100)
}

fn truncated_share(votes: u64, fraction: Decimal) -> Option<u64> {
    (Decimal::from(votes) * fraction).trunc().to_u64()
}
