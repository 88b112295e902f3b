use crate::domain::model::ParticipantRow;
use crate::utils::error::{CertError, InputKind, Result};
use csv::{Reader, ReaderBuilder, StringRecord};
use std::fs::File;
use std::path::Path;

/// Reads participant rows lazily, using the first line as headers.
pub struct CsvReader {
    reader: Reader<File>,
    headers: StringRecord,
}

impl CsvReader {
    pub fn open<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CertError::MissingFile {
                kind: InputKind::Csv,
                path: path.display().to_string(),
            });
        }

        // 允許欄位數不一致，缺值留到建立佔位符時才報錯
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_path(path)?;
        // Excel 匯出的 CSV 常帶 UTF-8 BOM，不能讓它黏在第一個欄位名稱上
        let headers: StringRecord = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| if i == 0 { h.trim_start_matches('\u{feff}') } else { h })
            .collect();

        tracing::debug!(
            "Opened CSV {} with columns: {}",
            path.display(),
            headers.iter().collect::<Vec<_>>().join(", ")
        );

        Ok(Self { reader, headers })
    }

    pub fn headers(&self) -> Vec<String> {
        self.headers.iter().map(str::to_string).collect()
    }

    pub fn rows(self) -> ParticipantRows {
        ParticipantRows {
            reader: self.reader,
            headers: self.headers,
            record: StringRecord::new(),
            next_index: 1,
        }
    }
}

pub struct ParticipantRows {
    reader: Reader<File>,
    headers: StringRecord,
    record: StringRecord,
    next_index: u64,
}

impl Iterator for ParticipantRows {
    type Item = Result<ParticipantRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record(&mut self.record) {
            Ok(false) => None,
            Ok(true) => {
                let index = self.next_index;
                self.next_index += 1;

                let fields = self
                    .headers
                    .iter()
                    .zip(self.record.iter())
                    .map(|(header, value)| (header.to_string(), value.to_string()))
                    .collect();

                Some(Ok(ParticipantRow::new(index, fields)))
            }
            Err(e) => {
                self.next_index += 1;
                Some(Err(CertError::CsvError(e)))
            }
        }
    }
}
