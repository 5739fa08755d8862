use anyhow::{Context, Result};
use certgen::core::ConfigProvider;
use certgen::utils::{logger, validation::Validate};
use certgen::{
    load_records, BatchOptions, CertificateEngine, CertificatePipeline, LibreOfficeConverter,
    LocalStorage, SubmissionRecord, TomlConfig,
};
use clap::Parser;

#[derive(Parser)]
#[command(name = "toml-certgen")]
#[command(about = "Certificate generator driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "certgen.toml")]
    config: String,

    /// Override the records file from config
    #[arg(long)]
    records: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Dry run - show what would be generated without executing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 載入 TOML 配置
    let mut config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config file '{}'", args.config))?;

    // 初始化日誌
    logger::init_logger(args.verbose || config.verbose_logging(), config.json_logs());

    tracing::info!("🚀 Starting TOML-based certificate generator");
    tracing::info!("📁 Configuration loaded from: {}", args.config);

    // 應用命令列覆蓋設定
    if let Some(records) = &args.records {
        config.records = Some(certgen::config::toml_config::RecordsConfig {
            path: records.clone(),
        });
        tracing::info!("🔧 Records file overridden to: {}", records);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        return Err(e).context("configuration validation failed");
    }

    let records_path = config
        .records_path()
        .context("no records file given; set [records] path or pass --records")?
        .to_string();
    let records = load_records(&records_path)
        .await
        .with_context(|| format!("failed to load records from '{}'", records_path))?;

    display_config_summary(&config, &args, &records);

    let storage = LocalStorage::new(config.base_dir());
    let converter = LibreOfficeConverter::new(config.converter_binary());
    tracing::info!("📁 Base directory: {}", storage.base_path().display());
    tracing::info!("🖨️ Converter: {}", converter.binary().display());
    let pipeline = CertificatePipeline::from_config(storage, converter, &config)?;

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        perform_dry_run(&pipeline, &records);
        return Ok(());
    }

    // 決定監控設定
    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let options = BatchOptions::from_config(&config);
    let engine = CertificateEngine::new_with_monitoring(pipeline, options, monitor_enabled);
    let report = engine.run(records).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    println!(
        "📊 {} succeeded, {} failed, {} skipped",
        report.succeeded(),
        report.failed(),
        report.skipped
    );

    if !report.is_success() {
        anyhow::bail!(
            "{} certificates could not be generated",
            report.failed() + report.skipped
        );
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig, args: &Args, records: &[SubmissionRecord]) {
    println!("📋 Configuration Summary:");
    println!("  Pipeline: {}", config.pipeline.name);
    if let Some(description) = &config.pipeline.description {
        println!("  Description: {}", description);
    }
    println!("  Base dir: {}", config.base_dir());
    println!("  Records: {}", records.len());
    println!("  Converter: {}", config.converter_binary());
    println!("  Timeout: {}s", config.conversion_timeout().as_secs());
    println!("  Concurrent Jobs: {}", config.concurrent_jobs());
    println!("  Default Variant: {}", config.default_variant());
    println!("  Comments: {}", config.generate_comments());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(
    pipeline: &CertificatePipeline<LocalStorage, LibreOfficeConverter>,
    records: &[SubmissionRecord],
) {
    println!("🔍 Dry Run Analysis:");
    println!();

    for record in records {
        let variant = pipeline
            .variants()
            .for_track(&record.track)
            .map(|v| v.name.clone())
            .unwrap_or_else(|e| format!("<{}>", e));
        let paths = pipeline.certificate_paths(&record.file_name);

        println!("📄 {} ({})", record.name, record.file_name);
        println!("  Variant: {}", variant);
        println!("  Workshops: {}", record.workshops.len());
        println!("  DOCX: {}", paths.docx_path);
        println!("  PDF: {}", paths.pdf_path);
        if record.has_comment() {
            let comment = pipeline.comment_paths(&record.file_name);
            println!("  Comment: {}", comment.docx_path);
        }
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}
