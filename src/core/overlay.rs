//! Overlay rendering.
//!
//! Every value is drawn at its fixed coordinate on a blank one-page PDF. That
//! page is then stamped on top of each template page: the original contents
//! are wrapped in `q`/`Q` so their graphics state cannot leak into the
//! overlay, the overlay stream is appended, and the overlay font is merged
//! into the page resources.
//!
//! Coordinates are PDF points with the origin at the bottom-left corner.

use crate::domain::model::{OverlayStyle, PlaceholderMap, PlacementTable, TemplateDocument};
use crate::domain::ports::Renderer;
use crate::utils::error::{CertError, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Resource name of the overlay font. Unusual on purpose so it does not
/// shadow a font the template already uses.
const OVERLAY_FONT_KEY: &str = "CertOverlayF1";

/// Max depth when walking `/Parent` links for inherited resources.
const MAX_PAGE_TREE_DEPTH: usize = 64;

pub struct OverlayRenderer {
    placements: PlacementTable,
    style: OverlayStyle,
    scratch_dir: Option<PathBuf>,
}

impl OverlayRenderer {
    pub fn new(placements: PlacementTable, style: OverlayStyle) -> Self {
        Self {
            placements,
            style,
            scratch_dir: None,
        }
    }

    /// Directory for the temporary overlay file; the system temp dir otherwise.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Builds the one-page overlay holding only the placed values.
    pub fn build_overlay(&self, placeholders: &PlaceholderMap) -> Result<Document> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => Object::Name(self.style.font.as_bytes().to_vec()),
            "Encoding" => "WinAnsiEncoding",
        });

        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                OVERLAY_FONT_KEY => font_id,
            },
        });

        let mut operations = Vec::new();
        for (placeholder, value) in placeholders.iter() {
            let Some((x, y)) = self.placements.get(placeholder) else {
                continue;
            };

            if x > self.style.page_width || y > self.style.page_height {
                tracing::debug!(
                    "{} at ({}, {}) lies outside the {}x{} overlay page and will be clipped",
                    placeholder,
                    x,
                    y,
                    self.style.page_width,
                    self.style.page_height
                );
            }

            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![OVERLAY_FONT_KEY.into(), self.style.font_size.into()],
            ));
            operations.push(Operation::new("Td", vec![x.into(), y.into()]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(encode_win_ansi(value))],
            ));
            operations.push(Operation::new("ET", vec![]));
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                self.style.page_width.into(),
                self.style.page_height.into(),
            ],
        });

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        Ok(doc)
    }

    /// 將 overlay 寫入暫存檔；檔案在 NamedTempFile drop 時刪除
    fn persist_overlay(&self, overlay: &mut Document) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("cert-overlay-").suffix(".pdf");

        let mut file = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        overlay.save_to(file.as_file_mut())?;
        file.as_file_mut().flush()?;

        tracing::debug!("Overlay written to {}", file.path().display());
        Ok(file)
    }
}

impl Renderer for OverlayRenderer {
    fn name(&self) -> &'static str {
        "overlay"
    }

    fn render(&self, template: &TemplateDocument, placeholders: &PlaceholderMap) -> Result<Vec<u8>> {
        let mut overlay = self.build_overlay(placeholders)?;
        let scratch = self.persist_overlay(&mut overlay)?;
        let overlay = Document::load(scratch.path())?;
        let layer = OverlayLayer::from_document(&overlay)?;

        let mut output = template.to_document();
        let page_ids: Vec<ObjectId> = output.get_pages().into_values().collect();

        if page_ids.is_empty() {
            tracing::warn!(
                "Template {} has no pages, writing an empty document",
                template.path().display()
            );
        } else {
            layer.stamp(&mut output, &page_ids)?;
        }

        let mut bytes = Vec::new();
        output.save_to(&mut bytes)?;

        // scratch 在此處離開作用域，暫存檔隨之刪除
        drop(scratch);
        Ok(bytes)
    }
}

/// Content and fonts lifted from the overlay's single page.
struct OverlayLayer {
    content: Vec<u8>,
    fonts: Vec<(Vec<u8>, Dictionary)>,
}

impl OverlayLayer {
    fn from_document(doc: &Document) -> Result<Self> {
        let page_id = doc
            .get_pages()
            .values()
            .next()
            .copied()
            .ok_or_else(|| CertError::processing("overlay document has no pages"))?;

        let content = doc.get_page_content(page_id)?;
        let resources = inherited_resources(doc, page_id)?;

        let mut fonts = Vec::new();
        if let Some(font_dict) = resolve_dictionary(doc, resources.get(b"Font").ok())? {
            for (name, value) in font_dict.iter() {
                let font = match value {
                    Object::Reference(id) => doc.get_dictionary(*id)?.clone(),
                    Object::Dictionary(dict) => dict.clone(),
                    _ => continue,
                };
                fonts.push((name.clone(), font));
            }
        }

        Ok(Self { content, fonts })
    }

    fn stamp(&self, doc: &mut Document, page_ids: &[ObjectId]) -> Result<()> {
        let font_ids: Vec<(Vec<u8>, ObjectId)> = self
            .fonts
            .iter()
            .map(|(name, font)| (name.clone(), doc.add_object(font.clone())))
            .collect();

        let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));

        let mut closing = b"\nQ\n".to_vec();
        closing.extend_from_slice(&self.content);
        let close_id = doc.add_object(Stream::new(Dictionary::new(), closing));

        for page_id in page_ids {
            let mut resources = inherited_resources(doc, *page_id)?;
            let mut page_fonts =
                resolve_dictionary(doc, resources.get(b"Font").ok())?.unwrap_or_default();
            for (name, font_id) in &font_ids {
                page_fonts.set(name.clone(), Object::Reference(*font_id));
            }
            resources.set("Font", Object::Dictionary(page_fonts));

            let mut contents = vec![Object::Reference(open_id)];
            contents.extend(
                doc.get_page_contents(*page_id)
                    .into_iter()
                    .map(Object::Reference),
            );
            contents.push(Object::Reference(close_id));

            let page = doc.get_object_mut(*page_id)?.as_dict_mut()?;
            page.set("Resources", Object::Dictionary(resources));
            page.set("Contents", Object::Array(contents));
        }

        Ok(())
    }
}

/// Page resources, following `/Parent` links when the page inherits them.
fn inherited_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut current = Some(page_id);
    let mut depth = 0;

    while let Some(node_id) = current {
        let node = doc.get_dictionary(node_id)?;
        if let Ok(resources) = node.get(b"Resources") {
            return Ok(resolve_dictionary(doc, Some(resources))?.unwrap_or_default());
        }

        depth += 1;
        if depth > MAX_PAGE_TREE_DEPTH {
            break;
        }
        current = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    Ok(Dictionary::new())
}

fn resolve_dictionary(doc: &Document, object: Option<&Object>) -> Result<Option<Dictionary>> {
    match object {
        Some(Object::Reference(id)) => Ok(Some(doc.get_dictionary(*id)?.clone())),
        Some(Object::Dictionary(dict)) => Ok(Some(dict.clone())),
        _ => Ok(None),
    }
}

/// WinAnsi (cp1252) code points 0x80..=0x9F; 0x81, 0x8D, 0x8F, 0x90 and 0x9D are unassigned.
const WIN_ANSI_HIGH: [(char, u8); 27] = [
    ('€', 0x80),
    ('‚', 0x82),
    ('ƒ', 0x83),
    ('„', 0x84),
    ('…', 0x85),
    ('†', 0x86),
    ('‡', 0x87),
    ('ˆ', 0x88),
    ('‰', 0x89),
    ('Š', 0x8A),
    ('‹', 0x8B),
    ('Œ', 0x8C),
    ('Ž', 0x8E),
    ('‘', 0x91),
    ('’', 0x92),
    ('“', 0x93),
    ('”', 0x94),
    ('•', 0x95),
    ('–', 0x96),
    ('—', 0x97),
    ('˜', 0x98),
    ('™', 0x99),
    ('š', 0x9A),
    ('›', 0x9B),
    ('œ', 0x9C),
    ('ž', 0x9E),
    ('Ÿ', 0x9F),
];

/// Text for a WinAnsi-encoded base-14 font; unmappable characters become `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' => c as u8,
            _ => WIN_ANSI_HIGH
                .iter()
                .find(|(ch, _)| *ch == c)
                .map(|(_, byte)| *byte)
                .unwrap_or(b'?'),
        })
        .collect()
}
