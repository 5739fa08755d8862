use certgen::core::ConfigProvider;
use certgen::utils::error::{CertError, ErrorSeverity};
use certgen::utils::{logger, validation::Validate};
use certgen::{
    load_records, BatchOptions, BatchReport, CertificateEngine, CertificatePipeline, CliConfig,
    LibreOfficeConverter, LocalStorage,
};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_logger(config.verbose, config.json_logs);

    tracing::info!("Starting certgen CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        exit_with(&e, "Configuration validation failed");
    }

    let Some(records_path) = config.records_path() else {
        let e = CertError::MissingConfigError {
            field: "records".to_string(),
        };
        exit_with(&e, "Nothing to do");
    };

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let records = match load_records(records_path).await {
        Ok(records) => records,
        Err(e) => exit_with(&e, "Loading records failed"),
    };

    // 創建存儲、轉換器和管道
    let storage = LocalStorage::new(config.base_dir());
    let converter = LibreOfficeConverter::new(config.converter_binary());
    tracing::info!("📁 Base directory: {}", storage.base_path().display());
    tracing::info!("🖨️ Converter: {}", converter.binary().display());
    let pipeline = match CertificatePipeline::from_config(storage, converter, &config) {
        Ok(pipeline) => pipeline,
        Err(e) => exit_with(&e, "Pipeline setup failed"),
    };

    let options = BatchOptions::from_config(&config);
    let engine = CertificateEngine::new_with_monitoring(pipeline, options, monitor_enabled);

    match engine.run(records).await {
        Ok(report) => {
            print_report(&report);
            if !report.is_success() {
                std::process::exit(1);
            }
        }
        Err(e) => exit_with(&e, "Certificate batch failed"),
    }

    Ok(())
}

fn print_report(report: &BatchReport) {
    for outcome in &report.outcomes {
        match &outcome.certificate {
            Ok(artifacts) => println!("✅ {} -> {}", outcome.file_name, artifacts.pdf_path),
            Err(message) => println!("❌ {}: {}", outcome.file_name, message),
        }
        if let Some(Err(message)) = &outcome.comment {
            println!("❌ {} (comment): {}", outcome.file_name, message);
        }
    }

    println!(
        "📊 {} succeeded, {} failed, {} skipped",
        report.succeeded(),
        report.failed(),
        report.skipped
    );
}

fn exit_with(e: &CertError, context: &str) -> ! {
    tracing::error!(
        "❌ {}: {} (Category: {:?}, Severity: {:?})",
        context,
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
