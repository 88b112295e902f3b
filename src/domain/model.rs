use crate::utils::error::{CertError, ErrorCategory, InputKind, Result};
use chrono::{DateTime, Utc};
use lopdf::Document;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

/// 證書範本中可替換的佔位符
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Placeholder {
    Participant,
    Workshop,
    Area,
    Director,
    President,
}

impl Placeholder {
    pub const ALL: [Placeholder; 5] = [
        Placeholder::Participant,
        Placeholder::Workshop,
        Placeholder::Area,
        Placeholder::Director,
        Placeholder::President,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Placeholder::Participant => "[PARTICIPANT]",
            Placeholder::Workshop => "[WORKSHOP]",
            Placeholder::Area => "[AREA]",
            Placeholder::Director => "[DIRECTOR]",
            Placeholder::President => "[PRESIDENT]",
        }
    }

    /// Accepts `[PARTICIPANT]` as well as the bare `PARTICIPANT` / `participant`.
    pub fn from_token(token: &str) -> Option<Self> {
        let bare = token.trim().trim_start_matches('[').trim_end_matches(']');
        Placeholder::ALL
            .into_iter()
            .find(|p| p.token()[1..p.token().len() - 1].eq_ignore_ascii_case(bare))
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One CSV data row keyed by header name.
#[derive(Debug, Clone, Default)]
pub struct ParticipantRow {
    /// 1-based index among data rows (header excluded)
    pub record: u64,
    pub fields: HashMap<String, String>,
}

impl ParticipantRow {
    pub fn new(record: u64, fields: HashMap<String, String>) -> Self {
        Self { record, fields }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}

/// Values for every placeholder of one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderMap {
    values: [String; 5],
}

impl PlaceholderMap {
    /// 逐一為五個佔位符取值，任何一個失敗即返回錯誤
    pub fn try_from_fn<F>(mut value_for: F) -> Result<Self>
    where
        F: FnMut(Placeholder) -> Result<String>,
    {
        Ok(Self {
            values: [
                value_for(Placeholder::Participant)?,
                value_for(Placeholder::Workshop)?,
                value_for(Placeholder::Area)?,
                value_for(Placeholder::Director)?,
                value_for(Placeholder::President)?,
            ],
        })
    }

    pub fn get(&self, placeholder: Placeholder) -> &str {
        &self.values[placeholder.index()]
    }

    pub fn participant(&self) -> &str {
        self.get(Placeholder::Participant)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Placeholder, &str)> + '_ {
        Placeholder::ALL.into_iter().map(move |p| (p, self.get(p)))
    }
}

/// Fixed drawing positions (PDF points, origin bottom-left) for the overlay renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementTable {
    positions: BTreeMap<Placeholder, (f32, f32)>,
}

impl PlacementTable {
    pub fn empty() -> Self {
        Self {
            positions: BTreeMap::new(),
        }
    }

    pub fn with(mut self, placeholder: Placeholder, x: f32, y: f32) -> Self {
        self.positions.insert(placeholder, (x, y));
        self
    }

    pub fn set(&mut self, placeholder: Placeholder, x: f32, y: f32) {
        self.positions.insert(placeholder, (x, y));
    }

    pub fn get(&self, placeholder: Placeholder) -> Option<(f32, f32)> {
        self.positions.get(&placeholder).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Placeholder, (f32, f32))> + '_ {
        self.positions.iter().map(|(p, pos)| (*p, *pos))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl Default for PlacementTable {
    fn default() -> Self {
        Self::empty()
            .with(Placeholder::Participant, 150.0, 500.0)
            .with(Placeholder::Workshop, 150.0, 450.0)
            .with(Placeholder::Area, 150.0, 400.0)
            .with(Placeholder::Director, 150.0, 200.0)
            .with(Placeholder::President, 350.0, 200.0)
    }
}

/// A4 in points.
pub const DEFAULT_PAGE_SIZE: (f32, f32) = (595.2756, 841.8898);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    /// Base-14 font name, e.g. `Helvetica` or `Times-Roman`
    pub font: String,
    pub font_size: f32,
    pub page_width: f32,
    pub page_height: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            font: "Helvetica".to_string(),
            font_size: 12.0,
            page_width: DEFAULT_PAGE_SIZE.0,
            page_height: DEFAULT_PAGE_SIZE.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum RendererKind {
    /// Draw values on a generated overlay page and stamp it onto every template page
    #[default]
    Overlay,
    /// Replace tokens inside the template content streams (best effort)
    Substitution,
}

impl RendererKind {
    pub fn default_suffix(self) -> &'static str {
        match self {
            RendererKind::Overlay => "_certificate.pdf",
            RendererKind::Substitution => ".pdf",
        }
    }
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RendererKind::Overlay => write!(f, "overlay"),
            RendererKind::Substitution => write!(f, "substitution"),
        }
    }
}

/// The template PDF, parsed once and cloned for every certificate.
#[derive(Debug, Clone)]
pub struct TemplateDocument {
    path: PathBuf,
    document: Document,
}

impl TemplateDocument {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CertError::MissingFile {
                kind: InputKind::Template,
                path: path.display().to_string(),
            });
        }

        let document = Document::load(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            document,
        })
    }

    pub fn from_document<P: Into<PathBuf>>(path: P, document: Document) -> Self {
        Self {
            path: path.into(),
            document,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Fresh working copy for one certificate.
    pub fn to_document(&self) -> Document {
        self.document.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCertificate {
    pub row: u64,
    pub participant: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedCertificate {
    pub row: u64,
    pub participant: String,
    pub file_name: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub row: u64,
    pub participant: Option<String>,
    pub category: ErrorCategory,
    pub message: String,
}

/// Outcome of one batch run, also written as the JSON run report.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub renderer: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_rows: usize,
    pub generated: Vec<GeneratedCertificate>,
    pub failed: Vec<RowFailure>,
    pub archive: Option<String>,
}

impl BatchReport {
    pub fn new(renderer: impl Into<String>) -> Self {
        Self {
            renderer: renderer.into(),
            started_at: Utc::now(),
            finished_at: None,
            total_rows: 0,
            generated: Vec::new(),
            failed: Vec::new(),
            archive: None,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// 0 when every row produced a certificate, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.generated.iter().map(|c| c.file_name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_tokens_round_trip() {
        for placeholder in Placeholder::ALL {
            assert_eq!(Placeholder::from_token(placeholder.token()), Some(placeholder));
        }
        assert_eq!(Placeholder::from_token("director"), Some(Placeholder::Director));
        assert_eq!(Placeholder::from_token("[DATE]"), None);
    }

    #[test]
    fn test_placeholder_map_holds_every_token() {
        let map = PlaceholderMap::try_from_fn(|p| Ok(format!("value for {}", p))).unwrap();
        assert_eq!(map.iter().count(), 5);
        assert_eq!(map.participant(), "value for [PARTICIPANT]");
        assert_eq!(map.get(Placeholder::President), "value for [PRESIDENT]");
    }

    #[test]
    fn test_placeholder_map_propagates_first_failure() {
        let result = PlaceholderMap::try_from_fn(|p| match p {
            Placeholder::Director => Err(CertError::MissingColumn {
                row: 1,
                column: "Director".to_string(),
            }),
            other => Ok(other.to_string()),
        });
        assert!(matches!(result, Err(CertError::MissingColumn { .. })));
    }

    #[test]
    fn test_default_placements() {
        let table = PlacementTable::default();
        assert_eq!(table.len(), 5);
        assert_eq!(table.get(Placeholder::Participant), Some((150.0, 500.0)));
        assert_eq!(table.get(Placeholder::President), Some((350.0, 200.0)));
    }

    #[test]
    fn test_renderer_default_suffix() {
        assert_eq!(RendererKind::Overlay.default_suffix(), "_certificate.pdf");
        assert_eq!(RendererKind::Substitution.default_suffix(), ".pdf");
    }

    #[test]
    fn test_report_exit_code() {
        let mut report = BatchReport::new("overlay");
        report.total_rows = 2;
        report.generated.push(GeneratedCertificate {
            row: 1,
            participant: "Alice".to_string(),
            file_name: "Alice_certificate.pdf".to_string(),
            bytes: 1024,
        });
        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);

        report.failed.push(RowFailure {
            row: 2,
            participant: Some("Bob".to_string()),
            category: ErrorCategory::Schema,
            message: "Row 2: missing column 'Director'".to_string(),
        });
        assert!(!report.is_success());
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_missing_template() {
        let err = TemplateDocument::load("definitely/not/here.pdf").unwrap_err();
        assert!(matches!(
            err,
            CertError::MissingFile {
                kind: InputKind::Template,
                ..
            }
        ));
    }
}
