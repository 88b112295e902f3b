pub mod cli;
pub mod toml_config;

use crate::core::placeholder::{ColumnMapping, ColumnSchema};
use crate::core::ConfigProvider;
use crate::domain::model::{OverlayStyle, PlacementTable, RendererKind};
use crate::utils::error::{CertError, Result};
use crate::utils::validation::{
    validate_coordinate, validate_file_extension, validate_non_empty_string, validate_path,
    validate_range, Validate,
};
use toml_config::TomlConfig;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "cert-merge")]
#[command(about = "Generate personalized PDF certificates from a template and a CSV file")]
pub struct CliConfig {
    /// Path to the certificate template (e.g. Workshop_Certificate.pdf)
    pub template: String,

    /// Path to the CSV file containing the participant data
    pub csv: String,

    /// Directory to save the generated certificates
    pub output_dir: String,

    /// TOML job file with column mapping, placements and output options
    #[arg(short, long)]
    pub config: Option<String>,

    /// Rendering strategy; substitution is best effort
    #[arg(long, value_enum)]
    pub renderer: Option<RendererKind>,

    /// CSV column naming convention
    #[arg(long, value_enum)]
    pub schema: Option<ColumnSchema>,

    /// File name suffix appended to the participant name
    #[arg(long)]
    pub suffix: Option<String>,

    /// CSV field delimiter
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Overlay font size in points
    #[arg(long)]
    pub font_size: Option<f32>,

    /// Also bundle all certificates into this zip archive inside the output directory
    #[arg(long)]
    pub archive: Option<String>,

    /// Write a JSON run report with this name inside the output directory
    #[arg(long)]
    pub report: Option<String>,

    /// Abort the batch on the first failing row
    #[arg(long)]
    pub fail_fast: bool,

    /// Read the CSV and list the certificates without rendering them
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Log CPU and memory usage")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            renderer: self.renderer,
            schema: self.schema,
            suffix: self.suffix.clone(),
            delimiter: self.delimiter,
            font_size: self.font_size,
            archive: self.archive.clone(),
            report: self.report.clone(),
            fail_fast: self.fail_fast.then_some(true),
        }
    }

    /// 合併命令列參數與可選的 TOML 設定檔
    pub fn resolve(&self) -> Result<JobSettings> {
        let file = match &self.config {
            Some(path) => {
                tracing::info!("📁 Loading job file from: {}", path);
                let file = TomlConfig::from_file(path)?;
                file.validate()?;
                Some(file)
            }
            None => None,
        };

        JobSettings::resolve(
            &self.template,
            &self.csv,
            &self.output_dir,
            &self.overrides(),
            file.as_ref(),
        )
    }
}

/// Command-line values that win over the job file.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub renderer: Option<RendererKind>,
    pub schema: Option<ColumnSchema>,
    pub suffix: Option<String>,
    pub delimiter: Option<char>,
    pub font_size: Option<f32>,
    pub archive: Option<String>,
    pub report: Option<String>,
    pub fail_fast: Option<bool>,
}

/// Fully resolved settings for one batch.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub template_path: String,
    pub csv_path: String,
    pub output_dir: String,
    pub renderer: RendererKind,
    pub columns: ColumnMapping,
    pub placements: PlacementTable,
    pub style: OverlayStyle,
    pub suffix: String,
    pub delimiter: u8,
    pub fail_fast: bool,
    pub archive: Option<String>,
    pub report: Option<String>,
}

impl JobSettings {
    /// Overlay renderer, title-case columns, default placements.
    pub fn new(
        template_path: impl Into<String>,
        csv_path: impl Into<String>,
        output_dir: impl Into<String>,
    ) -> Self {
        Self {
            template_path: template_path.into(),
            csv_path: csv_path.into(),
            output_dir: output_dir.into(),
            renderer: RendererKind::Overlay,
            columns: ColumnMapping::from_schema(ColumnSchema::TitleCase),
            placements: PlacementTable::default(),
            style: OverlayStyle::default(),
            suffix: RendererKind::Overlay.default_suffix().to_string(),
            delimiter: b',',
            fail_fast: false,
            archive: None,
            report: None,
        }
    }

    /// Switches renderer together with its default suffix and column schema.
    pub fn with_renderer(mut self, renderer: RendererKind) -> Self {
        self.renderer = renderer;
        self.suffix = renderer.default_suffix().to_string();
        self.columns = ColumnMapping::from_schema(default_schema(renderer));
        self
    }

    /// 優先順序：命令列 > 設定檔 > 預設值
    pub fn resolve(
        template_path: &str,
        csv_path: &str,
        output_dir: &str,
        overrides: &SettingsOverrides,
        file: Option<&TomlConfig>,
    ) -> Result<Self> {
        let renderer = overrides
            .renderer
            .or_else(|| file.and_then(TomlConfig::renderer))
            .unwrap_or_default();

        let mut settings = Self::new(template_path, csv_path, output_dir).with_renderer(renderer);

        let schema = overrides
            .schema
            .or_else(|| file.and_then(TomlConfig::schema))
            .unwrap_or_else(|| default_schema(renderer));
        settings.columns = ColumnMapping::from_schema(schema);

        if let Some(file) = file {
            if let Some(columns) = &file.columns {
                settings.columns.apply_overrides(columns)?;
            }

            for (placeholder, x, y) in file.placements()? {
                settings.placements.set(placeholder, x, y);
            }

            if let Some(overlay) = &file.overlay {
                if let Some(font) = &overlay.font {
                    settings.style.font = font.clone();
                }
                if let Some(size) = overlay.font_size {
                    settings.style.font_size = size;
                }
                if let Some([width, height]) = overlay.page_size {
                    settings.style.page_width = width;
                    settings.style.page_height = height;
                }
            }

            if let Some(suffix) = file.suffix() {
                settings.suffix = suffix.to_string();
            }
            if let Some(delimiter) = file.delimiter() {
                settings.delimiter = parse_delimiter(delimiter)?;
            }
            settings.archive = file.archive().map(str::to_string);
            settings.report = file.report().map(str::to_string);
            settings.fail_fast = file.fail_fast().unwrap_or(false);
        }

        if let Some(suffix) = &overrides.suffix {
            settings.suffix = suffix.clone();
        }
        if let Some(delimiter) = overrides.delimiter {
            settings.delimiter = parse_delimiter(&delimiter.to_string())?;
        }
        if let Some(size) = overrides.font_size {
            settings.style.font_size = size;
        }
        if overrides.archive.is_some() {
            settings.archive = overrides.archive.clone();
        }
        if overrides.report.is_some() {
            settings.report = overrides.report.clone();
        }
        if let Some(fail_fast) = overrides.fail_fast {
            settings.fail_fast = fail_fast;
        }

        Ok(settings)
    }
}

/// Overlay sheets historically use `Participant`, substitution sheets `PARTICIPANT`.
fn default_schema(renderer: RendererKind) -> ColumnSchema {
    match renderer {
        RendererKind::Overlay => ColumnSchema::TitleCase,
        RendererKind::Substitution => ColumnSchema::UpperCase,
    }
}

fn parse_delimiter(value: &str) -> Result<u8> {
    let value = if value == "\\t" { "\t" } else { value };
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c as u8),
        _ => Err(CertError::InvalidConfigValueError {
            field: "delimiter".to_string(),
            value: value.to_string(),
            reason: "Delimiter must be a single ASCII character".to_string(),
        }),
    }
}

impl Validate for JobSettings {
    fn validate(&self) -> Result<()> {
        validate_path("template", &self.template_path)?;
        validate_file_extension("template", &self.template_path, &["pdf"])?;
        validate_path("csv", &self.csv_path)?;
        validate_file_extension("csv", &self.csv_path, &["csv", "tsv", "txt"])?;
        validate_path("output_dir", &self.output_dir)?;

        validate_non_empty_string("suffix", &self.suffix)?;
        if self.suffix.contains(['/', '\\']) {
            return Err(CertError::InvalidConfigValueError {
                field: "suffix".to_string(),
                value: self.suffix.clone(),
                reason: "Suffix cannot contain path separators".to_string(),
            });
        }

        self.columns.validate()?;

        if self.renderer == RendererKind::Overlay {
            validate_non_empty_string("overlay.font", &self.style.font)?;
            validate_range("font_size", self.style.font_size, 1.0, 288.0)?;
            for (placeholder, (x, y)) in self.placements.iter() {
                validate_coordinate(&format!("placement.{}", placeholder), x, y)?;
            }
            if self.placements.is_empty() {
                tracing::warn!("No placements configured, certificates will be plain template copies");
            }
        }

        for (field, name) in [("archive", &self.archive), ("report", &self.report)] {
            if let Some(name) = name {
                validate_path(field, name)?;
            }
        }

        Ok(())
    }
}

impl ConfigProvider for JobSettings {
    fn template_path(&self) -> &str {
        &self.template_path
    }

    fn csv_path(&self) -> &str {
        &self.csv_path
    }

    fn output_dir(&self) -> &str {
        &self.output_dir
    }

    fn renderer_kind(&self) -> RendererKind {
        self.renderer
    }

    fn column_mapping(&self) -> &ColumnMapping {
        &self.columns
    }

    fn placements(&self) -> &PlacementTable {
        &self.placements
    }

    fn overlay_style(&self) -> &OverlayStyle {
        &self.style
    }

    fn file_suffix(&self) -> &str {
        &self.suffix
    }

    fn delimiter(&self) -> u8 {
        self.delimiter
    }

    fn fail_fast(&self) -> bool {
        self.fail_fast
    }

    fn archive_name(&self) -> Option<&str> {
        self.archive.as_deref()
    }

    fn report_name(&self) -> Option<&str> {
        self.report.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Placeholder;

    #[test]
    fn test_defaults_follow_renderer() {
        let overlay = JobSettings::resolve("t.pdf", "p.csv", "out", &SettingsOverrides::default(), None).unwrap();
        assert_eq!(overlay.renderer, RendererKind::Overlay);
        assert_eq!(overlay.suffix, "_certificate.pdf");
        assert_eq!(overlay.columns.participant_column(), "Participant");

        let overrides = SettingsOverrides {
            renderer: Some(RendererKind::Substitution),
            ..Default::default()
        };
        let substitution = JobSettings::resolve("t.pdf", "p.csv", "out", &overrides, None).unwrap();
        assert_eq!(substitution.suffix, ".pdf");
        assert_eq!(substitution.columns.participant_column(), "PARTICIPANT");
    }

    #[test]
    fn test_cli_wins_over_file() {
        let file = TomlConfig::from_toml_str(
            r#"
[job]
renderer = "substitution"

[columns]
"[PARTICIPANT]" = "Name"

[placement]
"[AREA]" = [10.0, 20.0]

[output]
suffix = "_file.pdf"
report = "report.json"

[csv]
delimiter = "\\t"
"#,
        )
        .unwrap();

        let overrides = SettingsOverrides {
            renderer: Some(RendererKind::Overlay),
            suffix: Some("_cli.pdf".to_string()),
            fail_fast: Some(true),
            ..Default::default()
        };

        let settings = JobSettings::resolve("t.pdf", "p.csv", "out", &overrides, Some(&file)).unwrap();
        assert_eq!(settings.renderer, RendererKind::Overlay);
        assert_eq!(settings.suffix, "_cli.pdf");
        assert_eq!(settings.columns.participant_column(), "Name");
        assert_eq!(settings.columns.column(Placeholder::Workshop), "Workshop");
        assert_eq!(settings.placements.get(Placeholder::Area), Some((10.0, 20.0)));
        assert_eq!(settings.delimiter, b'\t');
        assert_eq!(settings.report.as_deref(), Some("report.json"));
        assert!(settings.fail_fast);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_inputs() {
        assert!(JobSettings::new("template.docx", "p.csv", "out").validate().is_err());
        assert!(JobSettings::new("t.pdf", "p.xlsx", "out").validate().is_err());
        assert!(JobSettings::new("t.pdf", "p.csv", "").validate().is_err());

        let mut settings = JobSettings::new("t.pdf", "p.csv", "out");
        settings.suffix = "/x.pdf".to_string();
        assert!(settings.validate().is_err());

        let mut settings = JobSettings::new("t.pdf", "p.csv", "out");
        settings.style.font_size = 0.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert_eq!(parse_delimiter("\\t").unwrap(), b'\t');
        assert!(parse_delimiter(";;").is_err());
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("§").is_err());
    }
}
