use super::bucket::Bucket;
use rust_decimal::Decimal;

/// Invalid source table or split configuration. Raised before any transfer is
/// computed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("split for '{category}' sums to {sum}, expected 1")]
    SplitSumMismatch { category: String, sum: Decimal },
    #[error("fraction {fraction} for {bucket} in '{category}' is outside [0, 1]")]
    FractionOutOfRange {
        category: String,
        bucket: Bucket,
        fraction: Decimal,
    },
    #[error("split for '{category}' sends votes to {bucket}, which is not in this scenario")]
    UnknownBucket { category: String, bucket: Bucket },
    #[error("source row '{0}' has no split configured")]
    UnconfiguredSource(String),
    #[error("split configured for unknown category '{0}'")]
    UnknownCategory(String),
    #[error("source row with empty category name")]
    EmptyCategory,
    #[error("duplicate source category '{0}'")]
    DuplicateCategory(String),
    #[error("{bucket} share of {requested}% exceeds the remaining {remaining}%")]
    ShareExceedsRemaining {
        bucket: Bucket,
        requested: u8,
        remaining: u8,
    },
    #[error("{0} share entered more than once")]
    DuplicateShare(Bucket),
    #[error("{0} is the residual bucket and cannot be set directly")]
    ResidualIsComputed(Bucket),
    #[error("residual bucket {0} is not in the bucket set")]
    ResidualNotInBucketSet(Bucket),
    #[error("base offset given for {0}, which is not in the bucket set")]
    OffsetOutsideBucketSet(Bucket),
    #[error("invalid percentage: {0}")]
    InvalidPercent(String),
    #[error("invalid split override '{0}'")]
    InvalidOverride(String),
}
