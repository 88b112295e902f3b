use crate::utils::error::{CertError, Result};
use std::collections::HashSet;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(CertError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(CertError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_file_extension(field_name: &str, file: &str, allowed_extensions: &[&str]) -> Result<()> {
    let allowed_set: HashSet<&str> = allowed_extensions.iter().copied().collect();

    let extension = std::path::Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension {
        Some(ext) if allowed_set.contains(ext.as_str()) => Ok(()),
        Some(ext) => Err(CertError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: file.to_string(),
            reason: format!(
                "Unsupported file extension: {}. Allowed extensions: {}",
                ext,
                allowed_extensions.join(", ")
            ),
        }),
        None => Err(CertError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: file.to_string(),
            reason: "File has no extension or invalid filename".to_string(),
        }),
    }
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CertError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(CertError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// 座標必須是有限且非負的數值（PDF 點，左下角為原點）
pub fn validate_coordinate(field_name: &str, x: f32, y: f32) -> Result<()> {
    if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
        return Err(CertError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: format!("({}, {})", x, y),
            reason: "Coordinates must be finite, non-negative numbers".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("output_dir", "./out").is_ok());
        assert!(validate_path("output_dir", "").is_err());
        assert!(validate_path("output_dir", "bad\0path").is_err());
    }

    #[test]
    fn test_validate_file_extension() {
        assert!(validate_file_extension("template", "cert.pdf", &["pdf"]).is_ok());
        assert!(validate_file_extension("template", "CERT.PDF", &["pdf"]).is_ok());
        assert!(validate_file_extension("template", "cert.docx", &["pdf"]).is_err());
        assert!(validate_file_extension("csv", "participants", &["csv", "tsv"]).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("font_size", 12.0, 1.0, 288.0).is_ok());
        assert!(validate_range("font_size", 0.5, 1.0, 288.0).is_err());
    }

    #[test]
    fn test_validate_coordinate() {
        assert!(validate_coordinate("placement", 150.0, 500.0).is_ok());
        assert!(validate_coordinate("placement", -1.0, 500.0).is_err());
        assert!(validate_coordinate("placement", f32::NAN, 500.0).is_err());
    }
}
