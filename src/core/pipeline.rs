use crate::core::assembler::PatchAssembler;
use crate::core::presentation::{VariantRegistry, COMMENT_VARIANT};
use crate::core::templates::TemplateLoader;
use crate::domain::model::{GeneratedArtifacts, SubmissionRecord};
use crate::domain::ports::{ConfigProvider, Converter, Storage};
use crate::utils::error::{CertError, Result};
use crate::utils::validation::validate_file_stem;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

pub const DOCX_DIR: &str = "certificates/docx";
pub const COMMENT_DIR: &str = "certificates/comment";
pub const PDF_DIR: &str = "certificates/pdf";

pub const DEFAULT_COMMENT_TEMPLATE: &str = "comment";
pub const DEFAULT_TARGET_FORMAT: &str = "pdf";
pub const DEFAULT_CONVERSION_TIMEOUT: Duration = Duration::from_secs(120);

/// Source of the generation date printed on every document.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

pub fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Fills templates for submissions, stores the documents and their PDF conversions.
///
/// Every path is relative to the storage's base directory:
///
/// - `templates/{track} {level}.docx` and `templates/{comment_template}.docx` are read;
/// - `certificates/docx/{file_name}.docx` and `certificates/pdf/{file_name}.pdf` are written
///   for certificates;
/// - `certificates/comment/{file_name}_comment.docx` and
///   `certificates/pdf/{file_name}_comment.pdf` for comment sheets.
///
/// Reruns with the same `file_name` overwrite the previous files.
pub struct CertificatePipeline<S: Storage + Clone, C: Converter> {
    storage: S,
    templates: TemplateLoader<S>,
    converter: C,
    variants: VariantRegistry,
    comment_template: String,
    target_format: String,
    conversion_timeout: Duration,
    clock: Clock,
}

impl<S: Storage + Clone, C: Converter> CertificatePipeline<S, C> {
    pub fn new(storage: S, converter: C) -> Self {
        Self {
            templates: TemplateLoader::new(storage.clone()),
            storage,
            converter,
            variants: VariantRegistry::builtin(),
            comment_template: DEFAULT_COMMENT_TEMPLATE.to_string(),
            target_format: DEFAULT_TARGET_FORMAT.to_string(),
            conversion_timeout: DEFAULT_CONVERSION_TIMEOUT,
            clock: Arc::new(local_today),
        }
    }

    pub fn from_config<P: ConfigProvider>(storage: S, converter: C, config: &P) -> Result<Self> {
        let mut variants = VariantRegistry::builtin();
        variants.apply_overrides(&config.style_overrides())?;
        variants.set_default(config.default_variant())?;
        for (track, variant) in config.track_variants() {
            variants.map_track(track, &variant)?;
        }

        Ok(Self::new(storage, converter)
            .with_variants(variants)
            .with_comment_template(config.comment_template())
            .with_target_format(config.target_format())
            .with_conversion_timeout(config.conversion_timeout()))
    }

    pub fn with_variants(mut self, variants: VariantRegistry) -> Self {
        self.variants = variants;
        self
    }

    pub fn with_comment_template(mut self, name: impl Into<String>) -> Self {
        self.comment_template = name.into();
        self
    }

    pub fn with_target_format(mut self, format: impl Into<String>) -> Self {
        self.target_format = format.into().trim_start_matches('.').to_string();
        self
    }

    pub fn with_conversion_timeout(mut self, timeout: Duration) -> Self {
        self.conversion_timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn variants(&self) -> &VariantRegistry {
        &self.variants
    }

    pub fn certificate_paths(&self, file_name: &str) -> GeneratedArtifacts {
        GeneratedArtifacts {
            docx_path: format!("{}/{}.docx", DOCX_DIR, file_name),
            pdf_path: format!("{}/{}.{}", PDF_DIR, file_name, self.target_format),
        }
    }

    pub fn comment_paths(&self, file_name: &str) -> GeneratedArtifacts {
        GeneratedArtifacts {
            docx_path: format!("{}/{}_comment.docx", COMMENT_DIR, file_name),
            pdf_path: format!("{}/{}_comment.{}", PDF_DIR, file_name, self.target_format),
        }
    }

    /// Fills a template with a record using the named variant's markers and styles.
    pub async fn fill_template(
        &self,
        template: Vec<u8>,
        record: &SubmissionRecord,
        variant: &str,
    ) -> Result<Vec<u8>> {
        let variant = self.variants.get(variant)?.clone();
        PatchAssembler::new(variant)
            .fill(template, record, (self.clock)())
            .await
    }

    /// Stores a filled certificate and its conversion.
    pub async fn generate_certificate(
        &self,
        document: &[u8],
        file_name: &str,
    ) -> Result<GeneratedArtifacts> {
        validate_file_stem("file_name", file_name)?;
        let paths = self.certificate_paths(file_name);
        self.write_and_convert(document, &paths).await?;
        Ok(paths)
    }

    /// Fills the comment template for a record and stores it with its conversion.
    pub async fn generate_comment_file(
        &self,
        record: &SubmissionRecord,
    ) -> Result<GeneratedArtifacts> {
        validate_file_stem("file_name", &record.file_name)?;

        let template = self.templates.load_named(&self.comment_template).await?;
        let document = self.fill_template(template, record, COMMENT_VARIANT).await?;

        let paths = self.comment_paths(&record.file_name);
        self.write_and_convert(&document, &paths).await?;
        tracing::info!("📝 Comment sheet for {} saved to {}", record.name, paths.pdf_path);
        Ok(paths)
    }

    /// Template lookup by the record's track and level, fill, store and convert.
    pub async fn process(&self, record: &SubmissionRecord) -> Result<GeneratedArtifacts> {
        validate_file_stem("file_name", &record.file_name)?;
        if record.track.trim().is_empty() || record.level.trim().is_empty() {
            return Err(CertError::ValidationError {
                message: format!(
                    "record '{}' needs a track and a level to select its template",
                    record.file_name
                ),
            });
        }

        let template = self.templates.load_for(&record.track, &record.level).await?;
        let variant = self.variants.for_track(&record.track)?.name.clone();
        let document = self.fill_template(template, record, &variant).await?;

        let paths = self.generate_certificate(&document, &record.file_name).await?;
        tracing::info!("🎓 Certificate for {} saved to {}", record.name, paths.pdf_path);
        Ok(paths)
    }

    async fn write_and_convert(&self, document: &[u8], paths: &GeneratedArtifacts) -> Result<()> {
        self.storage.write_file(&paths.docx_path, document).await?;
        tracing::debug!("Wrote {} ({} bytes)", paths.docx_path, document.len());

        let converted = match self.convert(document).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("❌ Converting {} failed: {}", paths.docx_path, e);
                return Err(e);
            }
        };

        self.storage.write_file(&paths.pdf_path, &converted).await?;
        tracing::debug!("Wrote {} ({} bytes)", paths.pdf_path, converted.len());
        Ok(())
    }

    /// Dropping the conversion future on timeout also tears down whatever it spawned.
    async fn convert(&self, document: &[u8]) -> Result<Vec<u8>> {
        let conversion = self.converter.convert(document, &self.target_format);
        match tokio::time::timeout(self.conversion_timeout, conversion).await {
            Ok(Ok(bytes)) if bytes.is_empty() => Err(CertError::ConversionFailed {
                message: "converter returned an empty document".to_string(),
            }),
            Ok(result) => result,
            Err(_) => Err(CertError::ConversionTimeout {
                seconds: self.conversion_timeout.as_secs(),
            }),
        }
    }
}
