use crate::domain::ports::Storage;
use crate::utils::error::{CertError, Result};
use regex::Regex;
use std::collections::HashSet;
use std::io::Write;
use std::sync::OnceLock;
use zip::write::{FileOptions, ZipWriter};

fn unsafe_name_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // 空白與路徑分隔符一律換成底線，避免寫出輸出目錄
    RE.get_or_init(|| Regex::new(r"[\s/\\]").expect("static regex is valid"))
}

/// `"Alice Smith"` + `"_certificate.pdf"` → `"Alice_Smith_certificate.pdf"`.
pub fn certificate_file_name(participant: &str, suffix: &str) -> Result<String> {
    if participant.trim().is_empty() {
        return Err(CertError::ValidationError {
            message: "participant name is empty, cannot derive a file name".to_string(),
        });
    }

    let stem = unsafe_name_chars().replace_all(participant, "_");
    Ok(format!("{}{}", stem, suffix))
}

/// Persists rendered certificates and remembers what was written in this batch.
pub struct OutputWriter<'a, S: Storage> {
    storage: &'a S,
    written: HashSet<String>,
}

impl<'a, S: Storage> OutputWriter<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self {
            storage,
            written: HashSet::new(),
        }
    }

    pub async fn prepare(&self) -> Result<()> {
        self.storage.ensure_root().await
    }

    /// Writes `data`, silently replacing any existing file of that name.
    pub async fn write(&mut self, file_name: &str, data: &[u8]) -> Result<String> {
        if !self.written.insert(file_name.to_string()) {
            tracing::warn!(
                "⚠️ {} was already generated in this batch and will be overwritten",
                file_name
            );
        } else if self.storage.exists(file_name).await {
            tracing::debug!("Overwriting existing {}", file_name);
        }

        self.storage.write_file(file_name, data).await?;
        Ok(self.storage.location(file_name))
    }

    /// Bundles the named certificates into one zip archive next to them.
    /// A name listed twice (an overwritten certificate) is archived once.
    pub async fn write_archive(&self, archive_name: &str, file_names: &[&str]) -> Result<String> {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = file_names
            .iter()
            .copied()
            .filter(|name| seen.insert(*name))
            .collect();
        tracing::debug!("Creating {} with {} certificates", archive_name, unique.len());

        let mut entries = Vec::with_capacity(unique.len());
        for name in unique {
            let data = self.storage.read_file(name).await?;
            entries.push((name, data));
        }

        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
            for (name, data) in &entries {
                zip.start_file::<_, ()>(*name, FileOptions::default())?;
                zip.write_all(data)?;
            }
            zip.finish()?.into_inner()
        };

        self.storage.write_file(archive_name, &zip_data).await?;
        Ok(self.storage.location(archive_name))
    }
}
