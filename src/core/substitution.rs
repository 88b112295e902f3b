//! In-place token substitution inside page content streams.
//!
//! Best effort only. Tokens are replaced as literal text, so they must appear
//! verbatim in the stream (one `Tj` operand, no kerning splits). Multi-stream
//! pages are rejoined and split back by line count; a value that adds or
//! removes line breaks shifts that split and may break the page. Tokens are
//! replaced one after another, so a value that itself contains a later token
//! (e.g. a workshop named `[AREA] track`) is substituted again.

use crate::domain::model::{PlaceholderMap, TemplateDocument};
use crate::domain::ports::Renderer;
use crate::utils::error::{CertError, Result};
use lopdf::{Document, ObjectId, Stream};

#[derive(Debug, Clone, Copy, Default)]
pub struct SubstitutionRenderer;

impl SubstitutionRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Rewrites one page. Returns whether any content changed.
    fn substitute_page(
        doc: &mut Document,
        page_number: u32,
        page_id: ObjectId,
        placeholders: &PlaceholderMap,
    ) -> Result<bool> {
        let stream_ids = doc.get_page_contents(page_id);
        if stream_ids.is_empty() {
            tracing::debug!("Page {} has no content stream, skipping", page_number);
            return Ok(false);
        }

        let mut segments = Vec::with_capacity(stream_ids.len());
        for id in &stream_ids {
            let stream = doc.get_object(*id)?.as_stream()?;
            segments.push(read_stream_text(page_number, stream)?);
        }

        let line_counts: Vec<usize> = segments.iter().map(|s| s.split('\n').count()).collect();
        let buffer = segments.join("\n");
        let replaced = replace_tokens(&buffer, placeholders);

        if replaced == buffer {
            return Ok(false);
        }

        let parts = split_by_line_counts(&replaced, &line_counts);
        for (id, part) in stream_ids.iter().zip(parts) {
            doc.get_object_mut(*id)?
                .as_stream_mut()?
                .set_plain_content(part.into_bytes());
        }

        Ok(true)
    }
}

impl Renderer for SubstitutionRenderer {
    fn name(&self) -> &'static str {
        "substitution"
    }

    fn render(&self, template: &TemplateDocument, placeholders: &PlaceholderMap) -> Result<Vec<u8>> {
        let mut doc = template.to_document();

        let mut changed_pages = 0;
        for (page_number, page_id) in doc.get_pages() {
            if Self::substitute_page(&mut doc, page_number, page_id, placeholders)? {
                changed_pages += 1;
            }
        }

        if changed_pages == 0 {
            tracing::warn!(
                "No placeholder tokens found in {}; output is a copy of the template",
                template.path().display()
            );
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

/// Decodes a content stream to text. Filtered streams are decompressed first.
fn read_stream_text(page: u32, stream: &Stream) -> Result<String> {
    let bytes = if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .map_err(|e| CertError::UnsupportedStream {
                page,
                reason: e.to_string(),
            })?
    } else {
        stream.content.clone()
    };

    String::from_utf8(bytes).map_err(|e| CertError::ContentEncoding {
        page,
        reason: e.to_string(),
    })
}

/// Replaces every token with its value, escaped for a PDF literal string.
/// Replacement runs in placeholder order over the already replaced text.
pub fn replace_tokens(text: &str, placeholders: &PlaceholderMap) -> String {
    placeholders
        .iter()
        .fold(text.to_string(), |acc, (placeholder, value)| {
            acc.replace(placeholder.token(), &escape_literal(value))
        })
}

pub fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '(' | ')') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Splits `text` into `line_counts.len()` parts of the given line counts;
/// the last part takes whatever remains.
fn split_by_line_counts(text: &str, line_counts: &[usize]) -> Vec<String> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut parts = Vec::with_capacity(line_counts.len());
    let mut cursor = 0;

    for (i, count) in line_counts.iter().enumerate() {
        let end = if i + 1 == line_counts.len() {
            lines.len()
        } else {
            (cursor + count).min(lines.len())
        };
        parts.push(lines[cursor..end].join("\n"));
        cursor = end;
    }

    parts
}
