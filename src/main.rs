use cert_merge::config::JobSettings;
use cert_merge::core::ConfigProvider;
use cert_merge::utils::{error::CertError, logger, validation::Validate};
use cert_merge::{CertificateEngine, CliConfig, LocalStorage};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting cert-merge");
    tracing::debug!("CLI config: {:?}", config);

    // 解析並驗證配置
    let settings = match config.resolve().and_then(|s| s.validate().map(|_| s)) {
        Ok(settings) => settings,
        Err(e) => exit_with(&e),
    };

    display_settings_summary(&settings);

    let storage = LocalStorage::new(settings.output_dir.clone());
    let engine = CertificateEngine::new_with_monitoring(storage, settings, config.monitor);

    if config.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No certificates will be written");
        match engine.plan() {
            Ok(planned) => {
                for item in &planned {
                    println!("  row {:>4}: {}", item.row, item.file_name);
                }
                println!("✅ {} certificate(s) would be generated", planned.len());
                return Ok(());
            }
            Err(e) => exit_with(&e),
        }
    }

    match engine.run().await {
        Ok(report) if report.is_success() => {
            println!(
                "✅ Generated {} certificate(s) in {}",
                report.generated.len(),
                config.output_dir
            );
            if let Some(archive) = &report.archive {
                println!("📦 Archive: {}", archive);
            }
        }
        Ok(report) => {
            eprintln!(
                "⚠️ Generated {} of {} certificate(s); {} row(s) failed:",
                report.generated.len(),
                report.total_rows,
                report.failed.len()
            );
            for failure in &report.failed {
                eprintln!("  row {:>4}: {}", failure.row, failure.message);
            }
            std::process::exit(report.exit_code());
        }
        Err(e) => exit_with(&e),
    }

    Ok(())
}

fn exit_with(e: &CertError) -> ! {
    tracing::error!(
        "❌ Certificate generation failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    std::process::exit(e.exit_code().max(1));
}

fn display_settings_summary(settings: &JobSettings) {
    tracing::info!("📋 Template: {}", settings.template_path());
    tracing::info!("📋 CSV: {}", settings.csv_path());
    tracing::info!("📋 Output: {}", settings.output_dir());
    tracing::info!(
        "📋 Renderer: {}, suffix: {}, participant column: {}",
        settings.renderer_kind(),
        settings.file_suffix(),
        settings.column_mapping().participant_column()
    );
    if settings.fail_fast() {
        tracing::info!("📋 Fail-fast enabled");
    }
}
