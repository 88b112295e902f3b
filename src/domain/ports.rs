use crate::core::placeholder::ColumnMapping;
use crate::domain::model::{OverlayStyle, PlaceholderMap, PlacementTable, RendererKind, TemplateDocument};
use crate::utils::error::Result;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
    /// Creates the storage root (recursively) if it is missing.
    fn ensure_root(&self) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Human-readable location of `path`, used in logs and reports.
    fn location(&self, path: &str) -> String;
}

pub trait ConfigProvider: Send + Sync {
    fn template_path(&self) -> &str;
    fn csv_path(&self) -> &str;
    fn output_dir(&self) -> &str;
    fn renderer_kind(&self) -> RendererKind;
    fn column_mapping(&self) -> &ColumnMapping;
    fn placements(&self) -> &PlacementTable;
    fn overlay_style(&self) -> &OverlayStyle;
    fn file_suffix(&self) -> &str;
    fn delimiter(&self) -> u8;
    fn fail_fast(&self) -> bool;
    fn archive_name(&self) -> Option<&str>;
    fn report_name(&self) -> Option<&str>;
}

/// Turns the template plus one row's values into a finished PDF.
pub trait Renderer: Send + Sync {
    fn name(&self) -> &'static str;
    fn render(&self, template: &TemplateDocument, placeholders: &PlaceholderMap) -> Result<Vec<u8>>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn render(&self, template: &TemplateDocument, placeholders: &PlaceholderMap) -> Result<Vec<u8>> {
        (**self).render(template, placeholders)
    }
}
