use runoff_derive::CsvColumns;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;

use super::error::ConfigError;

/// First-round results the simulator ships with.
const FIRST_ROUND_CSV: &str = "\
category,votes
PDC,1717432
LIBRE,1430176
UNIDAD NAL.,1039426
MAS,166917
F P,86154
A P B,347574
SUMATE,76349
A D N,439388
Nulo,1325596
";

/// Description of one column of a CSV input, generated by `#[derive(CsvColumns)]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvColumn {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

/// First-round votes of one origin category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, CsvColumns)]
pub struct SourceRow {
    /// Origin category (party, or first-round null/blank voters)
    pub category: String,
    /// First-round vote count
    pub votes: u64,
}

impl SourceRow {
    #[cfg(test)]
    pub fn new(category: impl Into<String>, votes: u64) -> Self {
        SourceRow {
            category: category.into(),
            votes,
        }
    }
}

/// Ordered first-round table with unique, non-empty categories
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceTable {
    rows: Vec<SourceRow>,
}

impl SourceTable {
    pub fn new(rows: Vec<SourceRow>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for row in &rows {
            if row.category.trim().is_empty() {
                return Err(ConfigError::EmptyCategory);
            }
            if !seen.insert(row.category.as_str()) {
                return Err(ConfigError::DuplicateCategory(row.category.clone()));
            }
        }
        Ok(SourceTable { rows })
    }

    /// The built-in first-round table.
    pub fn first_round() -> anyhow::Result<Self> {
        read_csv(FIRST_ROUND_CSV.as_bytes())
    }

    pub fn rows(&self) -> &[SourceRow] {
        &self.rows
    }

    pub fn get(&self, category: &str) -> Option<&SourceRow> {
        self.rows.iter().find(|r| r.category == category)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.get(category).is_some()
    }

    /// Copy of the table without the rows for which `exclude` returns true.
    pub fn without<F>(&self, exclude: F) -> SourceTable
    where
        F: Fn(&SourceRow) -> bool,
    {
        SourceTable {
            rows: self.rows.iter().filter(|r| !exclude(r)).cloned().collect(),
        }
    }
}

/// Read a `category,votes` table.
pub fn read_csv<R: Read>(reader: R) -> anyhow::Result<SourceTable> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let rows = rdr
        .deserialize()
        .collect::<Result<Vec<SourceRow>, csv::Error>>()?;
    log::info!("Read {} source rows", rows.len());
    Ok(SourceTable::new(rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_votes(table: &SourceTable) -> u64 {
        table.rows().iter().map(|r| r.votes).sum()
    }

    #[test]
    fn built_in_table_matches_first_round() {
        let table = SourceTable::first_round().unwrap();
        assert_eq!(table.rows().len(), 9);
        assert_eq!(table.rows()[0], SourceRow::new("PDC", 1_717_432));
        assert_eq!(table.get("A D N").map(|r| r.votes), Some(439_388));
        assert_eq!(table.get("Nulo").map(|r| r.votes), Some(1_325_596));
        assert_eq!(total_votes(&table), 6_629_012);
    }

    #[test]
    fn rejects_duplicate_category() {
        let rows = vec![SourceRow::new("MAS", 1), SourceRow::new("MAS", 2)];
        assert_eq!(
            SourceTable::new(rows),
            Err(ConfigError::DuplicateCategory("MAS".to_string()))
        );
    }

    #[test]
    fn rejects_empty_category() {
        let rows = vec![SourceRow::new("  ", 10)];
        assert_eq!(SourceTable::new(rows), Err(ConfigError::EmptyCategory));
    }

    #[test]
    fn csv_is_trimmed_and_ordered() {
        let input = "category, votes\nB , 20\nA,10\n";
        let table = read_csv(input.as_bytes()).unwrap();
        let categories: Vec<_> = table.rows().iter().map(|r| r.category.as_str()).collect();
        assert_eq!(categories, vec!["B", "A"]);
        assert_eq!(total_votes(&table), 30);
    }

    #[test]
    fn csv_rejects_negative_votes() {
        let input = "category,votes\nA,-5\n";
        assert!(read_csv(input.as_bytes()).is_err());
    }

    #[test]
    fn without_keeps_order() {
        let table = SourceTable::first_round().unwrap();
        let rest = table.without(|r| r.category == "PDC" || r.category == "LIBRE");
        assert_eq!(rest.rows().len(), 7);
        assert_eq!(rest.rows()[0].category, "UNIDAD NAL.");
    }

    #[test]
    fn derived_columns() {
        assert_eq!(SourceRow::csv_header(), "category,votes");
        let columns = SourceRow::csv_columns();
        assert_eq!(columns.len(), 2);
        assert!(columns.iter().all(|c| c.required));
        assert_eq!(columns[1].description, "First-round vote count");
    }
}
