use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// 缺少的輸入檔案種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Template,
    Csv,
    Config,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Template => write!(f, "template PDF"),
            InputKind::Csv => write!(f, "CSV file"),
            InputKind::Config => write!(f, "job file"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CertError {
    #[error("{kind} not found: {path}")]
    MissingFile { kind: InputKind, path: String },

    #[error("Row {row}: missing column '{column}'")]
    MissingColumn { row: u64, column: String },

    #[error("Page {page}: content stream is not text ({reason})")]
    ContentEncoding { page: u32, reason: String },

    #[error("Page {page}: unsupported content stream ({reason})")]
    UnsupportedStream { page: u32, reason: String },

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

pub type Result<T> = std::result::Result<T, CertError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Input,
    Schema,
    Pdf,
    Filesystem,
    Configuration,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl CertError {
    pub fn processing(message: impl Into<String>) -> Self {
        CertError::ProcessingError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CertError::MissingFile { .. } => ErrorCategory::Input,
            CertError::MissingColumn { .. } | CertError::CsvError(_) => ErrorCategory::Schema,
            CertError::ContentEncoding { .. }
            | CertError::UnsupportedStream { .. }
            | CertError::Pdf(_) => ErrorCategory::Pdf,
            CertError::IoError(_) | CertError::ZipError(_) => ErrorCategory::Filesystem,
            CertError::ConfigValidationError { .. }
            | CertError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            CertError::SerializationError(_)
            | CertError::ProcessingError { .. }
            | CertError::ValidationError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::Medium,
            ErrorCategory::Schema | ErrorCategory::Pdf | ErrorCategory::Processing => {
                ErrorSeverity::High
            }
            ErrorCategory::Input | ErrorCategory::Filesystem => ErrorSeverity::Critical,
        }
    }

    /// 程序結束碼：設定錯誤 2，輸入/檔案系統錯誤 3，其他處理錯誤 1
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            CertError::MissingFile { kind, .. } => {
                format!("Check that the {} path is correct and readable", kind)
            }
            CertError::MissingColumn { column, .. } => format!(
                "Add a '{}' column to the CSV header or map the placeholder to another column with --schema or a [columns] table",
                column
            ),
            CertError::ContentEncoding { .. } | CertError::UnsupportedStream { .. } => {
                "The template content is not plain text; use the overlay renderer (--renderer overlay)"
                    .to_string()
            }
            CertError::Pdf(_) => "Make sure the template is a readable, unencrypted PDF".to_string(),
            CertError::CsvError(_) => {
                "Check the CSV delimiter (--delimiter) and quoting".to_string()
            }
            CertError::IoError(_) | CertError::ZipError(_) => {
                "Check that the output directory is writable and the disk is not full".to_string()
            }
            CertError::ConfigValidationError { .. }
            | CertError::InvalidConfigValueError { .. } => {
                "Fix the command-line arguments or the job file and retry".to_string()
            }
            CertError::SerializationError(_)
            | CertError::ProcessingError { .. }
            | CertError::ValidationError { .. } => {
                "Re-run with --verbose for details".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CertError::MissingFile { kind, path } => {
                format!("Cannot find the {} at '{}'", kind, path)
            }
            CertError::MissingColumn { row, column } => {
                format!("Row {} has no value for column '{}'", row, column)
            }
            CertError::ContentEncoding { page, .. } | CertError::UnsupportedStream { page, .. } => {
                format!("Page {} of the template cannot be edited as text", page)
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_is_schema_error() {
        let err = CertError::MissingColumn {
            row: 3,
            column: "Director".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Schema);
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("Director"));
        assert!(err.recovery_suggestion().contains("Director"));
    }

    #[test]
    fn test_missing_file_is_critical() {
        let err = CertError::MissingFile {
            kind: InputKind::Template,
            path: "missing.pdf".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "template PDF not found: missing.pdf");
    }

    #[test]
    fn test_config_errors_exit_with_two() {
        let err = CertError::InvalidConfigValueError {
            field: "delimiter".to_string(),
            value: ";;".to_string(),
            reason: "Delimiter must be a single ASCII character".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.exit_code(), 2);
    }
}
