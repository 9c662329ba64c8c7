pub mod bucket;
pub mod engine;
pub mod error;
pub mod scenario;
pub mod source;
pub mod split;

// Flat public surface for domain types and functions.
pub use bucket::Bucket;
pub use engine::{Leader, TieBreak, TransferResult};
pub use error::ConfigError;
pub use scenario::{read_scenario_json, Preset, Scenario, ScenarioFile, SplitOverride};
pub use source::{read_csv as read_sources_csv, SourceRow, SourceTable};
