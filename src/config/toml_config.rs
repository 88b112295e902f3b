use crate::core::placeholder::ColumnSchema;
use crate::domain::model::{Placeholder, RendererKind};
use crate::utils::error::{CertError, InputKind, Result};
use crate::utils::validation::{
    validate_coordinate, validate_non_empty_string, validate_range, Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Optional job file carrying everything the three positional arguments cannot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub job: Option<JobConfig>,
    /// placeholder token -> CSV column
    pub columns: Option<BTreeMap<String, String>>,
    /// placeholder token -> [x, y]
    pub placement: Option<BTreeMap<String, [f32; 2]>>,
    pub overlay: Option<OverlayConfig>,
    pub output: Option<OutputConfig>,
    pub csv: Option<CsvConfig>,
    pub error_handling: Option<ErrorHandlingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: Option<String>,
    pub renderer: Option<RendererKind>,
    pub schema: Option<ColumnSchema>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayConfig {
    pub font: Option<String>,
    pub font_size: Option<f32>,
    pub page_size: Option<[f32; 2]>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub suffix: Option<String>,
    pub archive: Option<String>,
    pub report: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CsvConfig {
    pub delimiter: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    pub fail_fast: Option<bool>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CertError::MissingFile {
                kind: InputKind::Config,
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(CertError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| CertError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DIRECTOR_NAME})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex is valid"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    pub fn renderer(&self) -> Option<RendererKind> {
        self.job.as_ref().and_then(|j| j.renderer)
    }

    pub fn schema(&self) -> Option<ColumnSchema> {
        self.job.as_ref().and_then(|j| j.schema)
    }

    pub fn suffix(&self) -> Option<&str> {
        self.output.as_ref().and_then(|o| o.suffix.as_deref())
    }

    pub fn archive(&self) -> Option<&str> {
        self.output.as_ref().and_then(|o| o.archive.as_deref())
    }

    pub fn report(&self) -> Option<&str> {
        self.output.as_ref().and_then(|o| o.report.as_deref())
    }

    pub fn delimiter(&self) -> Option<&str> {
        self.csv.as_ref().and_then(|c| c.delimiter.as_deref())
    }

    pub fn fail_fast(&self) -> Option<bool> {
        self.error_handling.as_ref().and_then(|e| e.fail_fast)
    }

    /// Placement overrides keyed by placeholder.
    pub fn placements(&self) -> Result<Vec<(Placeholder, f32, f32)>> {
        let Some(table) = &self.placement else {
            return Ok(Vec::new());
        };

        table
            .iter()
            .map(|(key, [x, y])| {
                let placeholder = Placeholder::from_token(key).ok_or_else(|| {
                    CertError::InvalidConfigValueError {
                        field: "placement".to_string(),
                        value: key.clone(),
                        reason: "Unknown placeholder".to_string(),
                    }
                })?;
                Ok((placeholder, *x, *y))
            })
            .collect()
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        for (placeholder, x, y) in self.placements()? {
            validate_coordinate(&format!("placement.{}", placeholder), x, y)?;
        }

        if let Some(columns) = &self.columns {
            for (key, column) in columns {
                if Placeholder::from_token(key).is_none() {
                    return Err(CertError::InvalidConfigValueError {
                        field: "columns".to_string(),
                        value: key.clone(),
                        reason: "Unknown placeholder".to_string(),
                    });
                }
                validate_non_empty_string(&format!("columns.{}", key), column)?;
            }
        }

        if let Some(overlay) = &self.overlay {
            if let Some(size) = overlay.font_size {
                validate_range("overlay.font_size", size, 1.0, 288.0)?;
            }
            if let Some(font) = &overlay.font {
                validate_non_empty_string("overlay.font", font)?;
            }
            if let Some([width, height]) = overlay.page_size {
                validate_range("overlay.page_size", width, 1.0, 14400.0)?;
                validate_range("overlay.page_size", height, 1.0, 14400.0)?;
            }
        }

        if let Some(suffix) = self.suffix() {
            validate_non_empty_string("output.suffix", suffix)?;
        }

        Ok(())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_job_file() {
        let toml_content = r#"
[job]
name = "DSMLC Workshop"
renderer = "substitution"
schema = "upper-case"

[columns]
"[PARTICIPANT]" = "Full Name"

[placement]
"[PARTICIPANT]" = [150.0, 520.0]
director = [120, 180]

[overlay]
font = "Times-Roman"
font_size = 14.0

[output]
suffix = "-cert.pdf"
archive = "all.zip"

[csv]
delimiter = ";"

[error_handling]
fail_fast = true
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.renderer(), Some(RendererKind::Substitution));
        assert_eq!(config.schema(), Some(ColumnSchema::UpperCase));
        assert_eq!(config.suffix(), Some("-cert.pdf"));
        assert_eq!(config.archive(), Some("all.zip"));
        assert_eq!(config.delimiter(), Some(";"));
        assert_eq!(config.fail_fast(), Some(true));

        let placements = config.placements().unwrap();
        assert!(placements.contains(&(Placeholder::Participant, 150.0, 520.0)));
        assert!(placements.contains(&(Placeholder::Director, 120.0, 180.0)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_is_valid() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert!(config.renderer().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CERT_MERGE_TEST_SUFFIX", "_award.pdf");

        let toml_content = r#"
[output]
suffix = "${CERT_MERGE_TEST_SUFFIX}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.suffix(), Some("_award.pdf"));

        std::env::remove_var("CERT_MERGE_TEST_SUFFIX");
    }

    #[test]
    fn test_unknown_placeholder_fails_validation() {
        let toml_content = r#"
[placement]
"[DATE]" = [10.0, 10.0]
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_coordinate_fails_validation() {
        let toml_content = r#"
[placement]
"[AREA]" = [-5.0, 10.0]
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_renderer_is_a_parse_error() {
        let result = TomlConfig::from_toml_str("[job]\nrenderer = \"stamp\"\n");
        assert!(matches!(result, Err(CertError::ConfigValidationError { .. })));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[job]\nname = \"file-test\"\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(
            config.job.and_then(|j| j.name).as_deref(),
            Some("file-test")
        );
    }

    #[test]
    fn test_missing_config_file() {
        let result = TomlConfig::from_file("no/such/job.toml");
        assert!(matches!(
            result,
            Err(CertError::MissingFile {
                kind: InputKind::Config,
                ..
            })
        ));
    }
}
