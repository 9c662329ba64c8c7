use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::BTreeMap;

use super::bucket::Bucket;
use super::error::ConfigError;

/// How far below 1 a split's sum may drift: half of one integer percent.
/// A sum above 1 is never accepted, so truncated shares cannot exceed a row's votes.
pub const SUM_TOLERANCE: Decimal = dec!(0.005);

/// Whole percentage in `0..=100`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct Percent(u8);

impl Percent {
    pub const ZERO: Percent = Percent(0);

    pub fn new(value: u8) -> Result<Self, ConfigError> {
        if value > 100 {
            return Err(ConfigError::InvalidPercent(format!("{value} is above 100")));
        }
        Ok(Percent(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Exact decimal fraction, e.g. 33% -> 0.33
    pub fn fraction(self) -> Decimal {
        Decimal::new(i64::from(self.0), 2)
    }
}

impl std::fmt::Display for Percent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl std::str::FromStr for Percent {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_end_matches('%');
        let value = s
            .parse::<u8>()
            .map_err(|_| ConfigError::InvalidPercent(s.to_string()))?;
        Percent::new(value)
    }
}

/// Builds one category's split from capped percentage inputs.
///
/// Every non-residual bucket is entered in turn and capped at whatever the
/// previous inputs left over; `finish` hands the remainder to the residual
/// bucket, so the result always sums to 100%.
#[derive(Debug, Clone)]
pub struct SplitBuilder {
    residual: Bucket,
    remaining: u8,
    shares: Vec<(Bucket, Percent)>,
}

impl SplitBuilder {
    pub fn new(residual: Bucket) -> Self {
        SplitBuilder {
            residual,
            remaining: 100,
            shares: Vec::new(),
        }
    }

    /// Order in which `category`'s free inputs are entered: the category's own
    /// finalist first (retention), then the other non-residual buckets.
    pub fn input_order(category: &str, buckets: &[Bucket], residual: Bucket) -> Vec<Bucket> {
        let own = Bucket::finalist_for_category(category)
            .filter(|b| *b != residual && buckets.contains(b));
        own.into_iter()
            .chain(
                buckets
                    .iter()
                    .copied()
                    .filter(|b| *b != residual && Some(*b) != own),
            )
            .collect()
    }

    #[cfg(test)]
    pub fn remaining(&self) -> u8 {
        self.remaining
    }

    /// Enter a share, rejecting anything above the remaining cap.
    pub fn allocate(&mut self, bucket: Bucket, percent: Percent) -> Result<(), ConfigError> {
        self.check_free(bucket)?;
        if percent.value() > self.remaining {
            return Err(ConfigError::ShareExceedsRemaining {
                bucket,
                requested: percent.value(),
                remaining: self.remaining,
            });
        }
        self.push(bucket, percent);
        Ok(())
    }

    /// Enter a share, lowering it to the remaining cap if needed. Returns the
    /// share actually entered.
    pub fn allocate_clamped(
        &mut self,
        bucket: Bucket,
        percent: Percent,
    ) -> Result<Percent, ConfigError> {
        self.check_free(bucket)?;
        let capped = Percent(percent.value().min(self.remaining));
        if capped != percent {
            log::debug!(
                "{} share clamped from {} to {}",
                bucket,
                percent,
                capped
            );
        }
        self.push(bucket, capped);
        Ok(capped)
    }

    pub fn finish(self) -> CategorySplit {
        let residual = Percent(self.remaining);
        let fractions = self
            .shares
            .iter()
            .copied()
            .chain(std::iter::once((self.residual, residual)))
            .map(|(bucket, percent)| (bucket, percent.fraction()))
            .collect();
        CategorySplit { fractions }
    }

    fn check_free(&self, bucket: Bucket) -> Result<(), ConfigError> {
        if bucket == self.residual {
            return Err(ConfigError::ResidualIsComputed(bucket));
        }
        if self.shares.iter().any(|(b, _)| *b == bucket) {
            return Err(ConfigError::DuplicateShare(bucket));
        }
        Ok(())
    }

    fn push(&mut self, bucket: Bucket, percent: Percent) {
        self.remaining -= percent.value();
        self.shares.push((bucket, percent));
    }
}

/// How one origin category's voters split across buckets
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CategorySplit {
    fractions: BTreeMap<Bucket, Decimal>,
}

impl CategorySplit {
    /// Split from raw fractions. Not checked here; the engine rejects splits
    /// that do not sum to 1.
    #[cfg(test)]
    pub fn from_fractions<I>(fractions: I) -> Self
    where
        I: IntoIterator<Item = (Bucket, Decimal)>,
    {
        CategorySplit {
            fractions: fractions.into_iter().collect(),
        }
    }

    pub fn fraction(&self, bucket: Bucket) -> Decimal {
        self.fractions.get(&bucket).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn percent(&self, bucket: Bucket) -> Decimal {
        self.fraction(bucket) * dec!(100)
    }

    pub fn sum(&self) -> Decimal {
        self.fractions.values().sum()
    }

    /// Check the split against a scenario's bucket set.
    pub fn validate(&self, category: &str, buckets: &[Bucket]) -> Result<(), ConfigError> {
        for (&bucket, &fraction) in &self.fractions {
            if fraction < Decimal::ZERO || fraction > Decimal::ONE {
                return Err(ConfigError::FractionOutOfRange {
                    category: category.to_string(),
                    bucket,
                    fraction,
                });
            }
            if !buckets.contains(&bucket) && !fraction.is_zero() {
                return Err(ConfigError::UnknownBucket {
                    category: category.to_string(),
                    bucket,
                });
            }
        }
        let sum = self.sum();
        if sum > Decimal::ONE || Decimal::ONE - sum > SUM_TOLERANCE {
            return Err(ConfigError::SplitSumMismatch {
                category: category.to_string(),
                sum,
            });
        }
        Ok(())
    }
}

/// Splits for every origin category of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SplitConfig {
    splits: BTreeMap<String, CategorySplit>,
}

impl SplitConfig {
    pub fn get(&self, category: &str) -> Option<&CategorySplit> {
        self.splits.get(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.splits.keys().map(String::as_str)
    }
}

impl FromIterator<(String, CategorySplit)> for SplitConfig {
    fn from_iter<T: IntoIterator<Item = (String, CategorySplit)>>(iter: T) -> Self {
        SplitConfig {
            splits: iter.into_iter().collect(),
        }
    }
}
