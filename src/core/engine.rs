use crate::core::pipeline::CertificatePipeline;
use crate::domain::model::{GeneratedArtifacts, SubmissionRecord};
use crate::domain::ports::{ConfigProvider, Converter, Storage};
use crate::utils::error::{CertError, Result};
use crate::utils::monitor::SystemMonitor;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub concurrent_jobs: usize,
    pub stop_on_error: bool,
    pub generate_comments: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrent_jobs: 1,
            stop_on_error: false,
            generate_comments: false,
        }
    }
}

impl BatchOptions {
    pub fn from_config<P: ConfigProvider>(config: &P) -> Self {
        Self {
            concurrent_jobs: config.concurrent_jobs().max(1),
            stop_on_error: config.stop_on_error(),
            generate_comments: config.generate_comments(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    pub file_name: String,
    pub certificate: std::result::Result<GeneratedArtifacts, String>,
    pub comment: Option<std::result::Result<GeneratedArtifacts, String>>,
}

impl RecordOutcome {
    pub fn is_success(&self) -> bool {
        self.certificate.is_ok() && !matches!(self.comment, Some(Err(_)))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<RecordOutcome>,
    /// Records never started because an earlier one failed with `stop_on_error`.
    pub skipped: usize,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped == 0
    }
}

/// Runs the certificate pipeline over a batch of records.
///
/// Records share nothing but the pipeline itself, so they can run concurrently. One record's
/// failure is recorded in the report; it stops the batch only with `stop_on_error`.
pub struct CertificateEngine<S, C>
where
    S: Storage + Clone + 'static,
    C: Converter + 'static,
{
    pipeline: Arc<CertificatePipeline<S, C>>,
    options: BatchOptions,
    monitor: SystemMonitor,
}

impl<S, C> CertificateEngine<S, C>
where
    S: Storage + Clone + 'static,
    C: Converter + 'static,
{
    pub fn new(pipeline: CertificatePipeline<S, C>, options: BatchOptions) -> Self {
        Self::new_with_monitoring(pipeline, options, false)
    }

    pub fn new_with_monitoring(
        pipeline: CertificatePipeline<S, C>,
        options: BatchOptions,
        monitor_enabled: bool,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            options,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self, records: Vec<SubmissionRecord>) -> Result<BatchReport> {
        tracing::info!("🚀 Generating certificates for {} records", records.len());
        self.monitor.log_stats("Start");

        let report = if self.options.stop_on_error || self.options.concurrent_jobs <= 1 {
            self.run_sequential(records).await
        } else {
            self.run_concurrent(records).await?
        };

        self.monitor.log_final_stats();
        tracing::info!(
            "✅ Batch finished: {} succeeded, {} failed, {} skipped",
            report.succeeded(),
            report.failed(),
            report.skipped
        );
        Ok(report)
    }

    async fn run_sequential(&self, records: Vec<SubmissionRecord>) -> BatchReport {
        let mut report = BatchReport::default();
        let total = records.len();

        for (index, record) in records.into_iter().enumerate() {
            let outcome =
                process_record(&self.pipeline, &record, self.options.generate_comments).await;
            let failed = !outcome.is_success();
            report.outcomes.push(outcome);
            self.monitor.log_stats(&format!("Record {}/{}", index + 1, total));

            if failed && self.options.stop_on_error {
                report.skipped = total - index - 1;
                tracing::warn!(
                    "⏹️ Stopping after failure of '{}', {} records skipped",
                    record.file_name,
                    report.skipped
                );
                break;
            }
        }

        report
    }

    async fn run_concurrent(&self, records: Vec<SubmissionRecord>) -> Result<BatchReport> {
        let semaphore = Arc::new(Semaphore::new(self.options.concurrent_jobs));
        let generate_comments = self.options.generate_comments;
        let mut tasks = JoinSet::new();

        for (index, record) in records.into_iter().enumerate() {
            let pipeline = Arc::clone(&self.pipeline);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                (index, process_record(&pipeline, &record, generate_comments).await)
            });
        }

        let mut indexed = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = joined.map_err(|e| CertError::ProcessingError {
                message: format!("certificate task failed: {}", e),
            })?;
            indexed.push((index, outcome));
        }
        indexed.sort_by_key(|(index, _)| *index);

        Ok(BatchReport {
            outcomes: indexed.into_iter().map(|(_, outcome)| outcome).collect(),
            skipped: 0,
        })
    }
}

async fn process_record<S, C>(
    pipeline: &CertificatePipeline<S, C>,
    record: &SubmissionRecord,
    generate_comments: bool,
) -> RecordOutcome
where
    S: Storage + Clone,
    C: Converter,
{
    let certificate = pipeline.process(record).await.map_err(|e| {
        tracing::error!(
            "❌ Certificate '{}' failed: {} (Category: {:?})",
            record.file_name,
            e,
            e.category()
        );
        e.to_string()
    });

    let comment = if generate_comments && record.has_comment() {
        Some(pipeline.generate_comment_file(record).await.map_err(|e| {
            tracing::error!("❌ Comment sheet '{}' failed: {}", record.file_name, e);
            e.to_string()
        }))
    } else {
        None
    };

    RecordOutcome {
        file_name: record.file_name.clone(),
        certificate,
        comment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures::{docx_with_body, paragraph};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                CertError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct EchoConverter;

    #[async_trait]
    impl Converter for EchoConverter {
        async fn convert(&self, document: &[u8], _target_format: &str) -> Result<Vec<u8>> {
            Ok(document.to_vec())
        }
    }

    async fn engine(
        options: BatchOptions,
    ) -> (CertificateEngine<MockStorage, EchoConverter>, MockStorage) {
        let storage = MockStorage::default();
        let template = docx_with_body(&[
            paragraph("{{name}}"),
            paragraph("{{vorname}}"),
            paragraph("{{track}}"),
            paragraph("{{workshops}}"),
            paragraph("{{workshopsList}}"),
            paragraph("{{date}}"),
        ]);
        storage
            .write_file("templates/Web Beginner.docx", &template)
            .await
            .unwrap();
        storage
            .write_file(
                "templates/comment.docx",
                &docx_with_body(&[paragraph("{{date}} {{firstName}} {{comment}}")]),
            )
            .await
            .unwrap();

        let pipeline = CertificatePipeline::new(storage.clone(), EchoConverter);
        (CertificateEngine::new(pipeline, options), storage)
    }

    fn record(file_name: &str, level: &str) -> SubmissionRecord {
        SubmissionRecord::new("Max Muster", "Max", file_name).with_template("Web", level)
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_batch_by_default() {
        let (engine, _) = engine(BatchOptions::default()).await;
        let records = vec![
            record("a", "Beginner"),
            record("b", "Expert"),
            record("c", "Beginner"),
        ];

        let report = engine.run(records).await.unwrap();

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(report.outcomes[1].certificate.is_err());
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_stop_on_error_skips_the_rest() {
        let options = BatchOptions {
            stop_on_error: true,
            ..BatchOptions::default()
        };
        let (engine, _) = engine(options).await;
        let records = vec![
            record("a", "Beginner"),
            record("b", "Expert"),
            record("c", "Beginner"),
        ];

        let report = engine.run(records).await.unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_concurrent_run_reports_in_input_order() {
        let options = BatchOptions {
            concurrent_jobs: 4,
            ..BatchOptions::default()
        };
        let (engine, storage) = engine(options).await;
        let records: Vec<SubmissionRecord> = (0..8)
            .map(|i| record(&format!("cert_{i}"), "Beginner"))
            .collect();

        let report = engine.run(records).await.unwrap();

        let names: Vec<&str> = report.outcomes.iter().map(|o| o.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["cert_0", "cert_1", "cert_2", "cert_3", "cert_4", "cert_5", "cert_6", "cert_7"]
        );
        assert!(report.is_success());
        let files = storage.files.lock().await;
        assert!(files.contains_key("certificates/pdf/cert_7.pdf"));
    }

    #[tokio::test]
    async fn test_comments_only_for_records_with_a_comment() {
        let options = BatchOptions {
            generate_comments: true,
            ..BatchOptions::default()
        };
        let (engine, storage) = engine(options).await;
        let records = vec![
            record("a", "Beginner").with_comment("Well done"),
            record("b", "Beginner"),
        ];

        let report = engine.run(records).await.unwrap();

        assert!(report.outcomes[0].comment.as_ref().unwrap().is_ok());
        assert!(report.outcomes[1].comment.is_none());
        let files = storage.files.lock().await;
        assert!(files.contains_key("certificates/comment/a_comment.docx"));
        assert!(!files.contains_key("certificates/comment/b_comment.docx"));
    }
}
