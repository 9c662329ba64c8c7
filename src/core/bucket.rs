use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::ConfigError;

/// Destination of transferred votes in the second round
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bucket {
    /// First finalist
    Pdc,
    /// Second finalist
    Libre,
    /// Spoiled ballot
    Null,
    /// Blank ballot
    Blank,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [Bucket::Pdc, Bucket::Libre, Bucket::Null, Bucket::Blank];
    pub const FINALISTS: [Bucket; 2] = [Bucket::Pdc, Bucket::Libre];

    pub fn display(&self) -> &'static str {
        match self {
            Bucket::Pdc => "PDC",
            Bucket::Libre => "LIBRE",
            Bucket::Null => "NULL",
            Bucket::Blank => "BLANK",
        }
    }

    /// The finalist whose own first-round voters form `category`, if any.
    pub fn finalist_for_category(category: &str) -> Option<Bucket> {
        let category = category.trim();
        Bucket::FINALISTS
            .into_iter()
            .find(|b| b.display().eq_ignore_ascii_case(category))
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl FromStr for Bucket {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdc" => Ok(Bucket::Pdc),
            "libre" => Ok(Bucket::Libre),
            "null" | "nulo" => Ok(Bucket::Null),
            "blank" | "blanco" => Ok(Bucket::Blank),
            _ => Err(ConfigError::InvalidOverride(format!("unknown bucket '{}'", s.trim()))),
        }
    }
}
