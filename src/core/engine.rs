use crate::core::csv_reader::CsvReader;
use crate::core::output::{certificate_file_name, OutputWriter};
use crate::core::overlay::OverlayRenderer;
use crate::core::substitution::SubstitutionRenderer;
use crate::core::{ConfigProvider, Renderer, Storage};
use crate::domain::model::{
    BatchReport, GeneratedCertificate, ParticipantRow, PlannedCertificate, RendererKind,
    RowFailure, TemplateDocument,
};
use crate::utils::error::{CertError, Result};
use crate::utils::monitor::SystemMonitor;

/// Picks the renderer named by the configuration.
pub fn build_renderer<C: ConfigProvider>(config: &C) -> Box<dyn Renderer> {
    match config.renderer_kind() {
        RendererKind::Overlay => Box::new(OverlayRenderer::new(
            config.placements().clone(),
            config.overlay_style().clone(),
        )),
        RendererKind::Substitution => Box::new(SubstitutionRenderer::new()),
    }
}

pub struct CertificateEngine<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    renderer: Box<dyn Renderer>,
    monitor: SystemMonitor,
}

impl<S: Storage, C: ConfigProvider> CertificateEngine<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self::new_with_monitoring(storage, config, false)
    }

    pub fn new_with_monitoring(storage: S, config: C, monitor_enabled: bool) -> Self {
        let renderer = build_renderer(&config);
        Self {
            storage,
            config,
            renderer,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    /// Lists the certificates a run would write, without rendering.
    pub fn plan(&self) -> Result<Vec<PlannedCertificate>> {
        let template = TemplateDocument::load(self.config.template_path())?;
        tracing::info!(
            "📄 Template {} has {} page(s)",
            template.path().display(),
            template.page_count()
        );

        let reader = CsvReader::open(self.config.csv_path(), self.config.delimiter())?;
        self.warn_missing_columns(&reader.headers());

        let mapping = self.config.column_mapping();
        let mut planned = Vec::new();
        for row in reader.rows() {
            let row = row?;
            let placeholders = mapping.build(&row)?;
            let file_name =
                certificate_file_name(placeholders.participant(), self.config.file_suffix())?;
            planned.push(PlannedCertificate {
                row: row.record,
                participant: placeholders.participant().to_string(),
                file_name,
            });
        }

        Ok(planned)
    }

    pub async fn run(&self) -> Result<BatchReport> {
        tracing::info!(
            "🚀 Starting certificate batch with the {} renderer",
            self.renderer.name()
        );

        let template = TemplateDocument::load(self.config.template_path())?;
        tracing::info!(
            "📄 Loaded template {} ({} page(s))",
            template.path().display(),
            template.page_count()
        );
        self.monitor.log_stats("Template loaded");

        let reader = CsvReader::open(self.config.csv_path(), self.config.delimiter())?;
        self.warn_missing_columns(&reader.headers());

        let mut writer = OutputWriter::new(&self.storage);
        writer.prepare().await?;

        let mut report = BatchReport::new(self.renderer.name());

        for row in reader.rows() {
            report.total_rows += 1;
            let index = report.total_rows as u64;

            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    self.record_failure(&mut report, index, None, e)?;
                    continue;
                }
            };

            let participant = row
                .get(self.config.column_mapping().participant_column())
                .map(str::to_string);

            match self.process_row(&row, &template, &mut writer).await {
                Ok(certificate) => {
                    tracing::info!(
                        "✅ Row {}: {} ({} bytes)",
                        certificate.row,
                        certificate.file_name,
                        certificate.bytes
                    );
                    report.generated.push(certificate);
                }
                Err(e) => self.record_failure(&mut report, row.record, participant, e)?,
            }
        }

        self.monitor.log_stats("Certificates rendered");

        if let Some(archive_name) = self.config.archive_name() {
            if report.generated.is_empty() {
                tracing::warn!("No certificates generated, skipping archive {}", archive_name);
            } else {
                let location = writer
                    .write_archive(archive_name, &report.file_names())
                    .await?;
                tracing::info!("📦 Archive saved to: {}", location);
                report.archive = Some(location);
            }
        }

        report.finish();

        if let Some(report_name) = self.config.report_name() {
            let json = serde_json::to_vec_pretty(&report)?;
            self.storage.write_file(report_name, &json).await?;
            tracing::info!("📝 Run report saved to: {}", self.storage.location(report_name));
        }

        tracing::info!(
            "Processed {} row(s): {} generated, {} failed",
            report.total_rows,
            report.generated.len(),
            report.failed.len()
        );
        self.monitor.log_final_stats();

        Ok(report)
    }

    async fn process_row(
        &self,
        row: &ParticipantRow,
        template: &TemplateDocument,
        writer: &mut OutputWriter<'_, S>,
    ) -> Result<GeneratedCertificate> {
        let placeholders = self.config.column_mapping().build(row)?;
        let file_name =
            certificate_file_name(placeholders.participant(), self.config.file_suffix())?;

        tracing::debug!("Row {}: rendering {}", row.record, file_name);
        let bytes = self.renderer.render(template, &placeholders)?;
        writer.write(&file_name, &bytes).await?;

        Ok(GeneratedCertificate {
            row: row.record,
            participant: placeholders.participant().to_string(),
            file_name,
            bytes: bytes.len(),
        })
    }

    /// 單列失敗只記錄不中斷，除非設定 fail_fast
    fn record_failure(
        &self,
        report: &mut BatchReport,
        row: u64,
        participant: Option<String>,
        error: CertError,
    ) -> Result<()> {
        if self.config.fail_fast() {
            tracing::error!("❌ Row {} failed, aborting batch: {}", row, error);
            return Err(error);
        }

        tracing::error!("❌ Row {} failed: {}", row, error);
        tracing::debug!("💡 Suggestion: {}", error.recovery_suggestion());

        report.failed.push(RowFailure {
            row,
            participant,
            category: error.category(),
            message: error.to_string(),
        });
        Ok(())
    }

    fn warn_missing_columns(&self, headers: &[String]) {
        let missing = self.config.column_mapping().missing_columns(headers);
        if !missing.is_empty() {
            tracing::warn!(
                "⚠️ CSV header lacks column(s) {}; affected rows will fail",
                missing.join(", ")
            );
        }
    }
}
