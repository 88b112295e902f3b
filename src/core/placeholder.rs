use crate::domain::model::{ParticipantRow, Placeholder, PlaceholderMap};
use crate::utils::error::{CertError, Result};
use crate::utils::validation::{validate_non_empty_string, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Column naming conventions seen in participant sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum ColumnSchema {
    /// Participant, Workshop, Area, Director, President
    #[default]
    TitleCase,
    /// PARTICIPANT, WORKSHOP, AREA, DIRECTOR, PRESIDENT
    UpperCase,
}

impl ColumnSchema {
    pub fn column_for(self, placeholder: Placeholder) -> &'static str {
        match (self, placeholder) {
            (ColumnSchema::TitleCase, Placeholder::Participant) => "Participant",
            (ColumnSchema::TitleCase, Placeholder::Workshop) => "Workshop",
            (ColumnSchema::TitleCase, Placeholder::Area) => "Area",
            (ColumnSchema::TitleCase, Placeholder::Director) => "Director",
            (ColumnSchema::TitleCase, Placeholder::President) => "President",
            (ColumnSchema::UpperCase, Placeholder::Participant) => "PARTICIPANT",
            (ColumnSchema::UpperCase, Placeholder::Workshop) => "WORKSHOP",
            (ColumnSchema::UpperCase, Placeholder::Area) => "AREA",
            (ColumnSchema::UpperCase, Placeholder::Director) => "DIRECTOR",
            (ColumnSchema::UpperCase, Placeholder::President) => "PRESIDENT",
        }
    }
}

impl fmt::Display for ColumnSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSchema::TitleCase => write!(f, "title-case"),
            ColumnSchema::UpperCase => write!(f, "upper-case"),
        }
    }
}

/// Which CSV column feeds each placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: BTreeMap<Placeholder, String>,
}

impl ColumnMapping {
    pub fn from_schema(schema: ColumnSchema) -> Self {
        let columns = Placeholder::ALL
            .into_iter()
            .map(|p| (p, schema.column_for(p).to_string()))
            .collect();
        Self { columns }
    }

    /// 以 `[columns]` 表格覆蓋預設欄位；鍵可寫成 `[PARTICIPANT]` 或 `participant`
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, String>) -> Result<()> {
        for (key, column) in overrides {
            let placeholder =
                Placeholder::from_token(key).ok_or_else(|| CertError::InvalidConfigValueError {
                    field: "columns".to_string(),
                    value: key.clone(),
                    reason: "Unknown placeholder".to_string(),
                })?;
            self.columns.insert(placeholder, column.clone());
        }
        Ok(())
    }

    pub fn column(&self, placeholder: Placeholder) -> &str {
        self.columns
            .get(&placeholder)
            .map(String::as_str)
            .unwrap_or_else(|| ColumnSchema::default().column_for(placeholder))
    }

    pub fn participant_column(&self) -> &str {
        self.column(Placeholder::Participant)
    }

    /// Columns required by the mapping that the header line does not provide.
    pub fn missing_columns(&self, headers: &[String]) -> Vec<String> {
        Placeholder::ALL
            .into_iter()
            .map(|p| self.column(p))
            .filter(|column| !headers.iter().any(|h| h == column))
            .map(str::to_string)
            .collect()
    }

    pub fn build(&self, row: &ParticipantRow) -> Result<PlaceholderMap> {
        PlaceholderMap::try_from_fn(|placeholder| {
            let column = self.column(placeholder);
            row.get(column)
                .map(str::to_string)
                .ok_or_else(|| CertError::MissingColumn {
                    row: row.record,
                    column: column.to_string(),
                })
        })
    }
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self::from_schema(ColumnSchema::default())
    }
}

impl Validate for ColumnMapping {
    fn validate(&self) -> Result<()> {
        for placeholder in Placeholder::ALL {
            validate_non_empty_string(
                &format!("columns.{}", placeholder),
                self.column(placeholder),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn row(record: u64, pairs: &[(&str, &str)]) -> ParticipantRow {
        let fields: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ParticipantRow::new(record, fields)
    }

    #[test]
    fn test_title_case_mapping() {
        let mapping = ColumnMapping::from_schema(ColumnSchema::TitleCase);
        let row = row(
            1,
            &[
                ("Participant", "Alice"),
                ("Workshop", "Rust 101"),
                ("Area", "Systems"),
                ("Director", "Dr. Lee"),
                ("President", "Prof. Kim"),
            ],
        );

        let map = mapping.build(&row).unwrap();
        assert_eq!(map.participant(), "Alice");
        assert_eq!(map.get(Placeholder::Workshop), "Rust 101");
        assert_eq!(map.get(Placeholder::President), "Prof. Kim");
    }

    #[test]
    fn test_upper_case_rejects_title_case_sheet() {
        let mapping = ColumnMapping::from_schema(ColumnSchema::UpperCase);
        let row = row(4, &[("Participant", "Alice")]);

        match mapping.build(&row) {
            Err(CertError::MissingColumn { row, column }) => {
                assert_eq!(row, 4);
                assert_eq!(column, "PARTICIPANT");
            }
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_director_column() {
        let mapping = ColumnMapping::default();
        let row = row(
            2,
            &[
                ("Participant", "Bob"),
                ("Workshop", "Rust 101"),
                ("Area", "Systems"),
                ("President", "Prof. Kim"),
            ],
        );

        let err = mapping.build(&row).unwrap_err();
        assert!(err.to_string().contains("Director"));
    }

    #[test]
    fn test_overrides_accept_bare_and_bracketed_keys() {
        let mut mapping = ColumnMapping::default();
        let mut overrides = BTreeMap::new();
        overrides.insert("[PARTICIPANT]".to_string(), "Full Name".to_string());
        overrides.insert("area".to_string(), "Track".to_string());
        mapping.apply_overrides(&overrides).unwrap();

        assert_eq!(mapping.participant_column(), "Full Name");
        assert_eq!(mapping.column(Placeholder::Area), "Track");
        assert_eq!(mapping.column(Placeholder::Director), "Director");
    }

    #[test]
    fn test_unknown_override_is_rejected() {
        let mut mapping = ColumnMapping::default();
        let mut overrides = BTreeMap::new();
        overrides.insert("[DATE]".to_string(), "Date".to_string());
        assert!(mapping.apply_overrides(&overrides).is_err());
    }

    #[test]
    fn test_missing_columns_report() {
        let mapping = ColumnMapping::default();
        let headers: Vec<String> = ["Participant", "Workshop", "Area", "President"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(mapping.missing_columns(&headers), vec!["Director".to_string()]);
    }
}
