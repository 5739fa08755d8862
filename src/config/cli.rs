use crate::app::converters::libreoffice::DEFAULT_BINARY;
use crate::core::pipeline::{DEFAULT_COMMENT_TEMPLATE, DEFAULT_TARGET_FORMAT};
use crate::core::presentation::{VariantRegistry, STANDARD_VARIANT};
use crate::core::ConfigProvider;
use crate::domain::model::RunStyle;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_file_extensions, validate_non_empty_string, validate_path, validate_positive_number,
    validate_range, Validate,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "certgen")]
#[command(about = "Fill certificate templates for a batch of submissions and convert them to PDF")]
pub struct CliConfig {
    /// Directory holding `templates/` and receiving `certificates/`
    #[arg(long, default_value = ".")]
    pub base_dir: String,

    /// Submissions to process (.json or .csv)
    #[arg(long)]
    pub records: Option<String>,

    #[arg(long = "soffice", default_value = DEFAULT_BINARY)]
    pub converter_binary: String,

    #[arg(long, default_value = "120")]
    pub timeout_secs: u64,

    #[arg(long, default_value = "1")]
    pub concurrent_jobs: usize,

    #[arg(long, help = "Stop the batch at the first failed record")]
    pub stop_on_error: bool,

    #[arg(long, help = "Also generate comment sheets for records with a comment")]
    pub comments: bool,

    #[arg(long, default_value = DEFAULT_COMMENT_TEMPLATE)]
    pub comment_template: String,

    #[arg(long, default_value = STANDARD_VARIANT)]
    pub variant: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Log process CPU and memory during the batch")]
    pub monitor: bool,
}

impl ConfigProvider for CliConfig {
    fn base_dir(&self) -> &str {
        &self.base_dir
    }

    fn records_path(&self) -> Option<&str> {
        self.records.as_deref()
    }

    fn converter_binary(&self) -> &str {
        &self.converter_binary
    }

    fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn target_format(&self) -> &str {
        DEFAULT_TARGET_FORMAT
    }

    fn concurrent_jobs(&self) -> usize {
        self.concurrent_jobs
    }

    fn stop_on_error(&self) -> bool {
        self.stop_on_error
    }

    fn generate_comments(&self) -> bool {
        self.comments
    }

    fn comment_template(&self) -> &str {
        &self.comment_template
    }

    fn default_variant(&self) -> &str {
        &self.variant
    }

    fn track_variants(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    fn style_overrides(&self) -> HashMap<String, HashMap<String, RunStyle>> {
        HashMap::new()
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("base_dir", &self.base_dir)?;
        if let Some(records) = &self.records {
            validate_file_extensions("records", std::slice::from_ref(records), &["json", "csv"])?;
        }
        validate_non_empty_string("soffice", &self.converter_binary)?;
        validate_range("timeout_secs", self.timeout_secs, 1, 3600)?;
        validate_positive_number("concurrent_jobs", self.concurrent_jobs, 1)?;
        validate_non_empty_string("comment_template", &self.comment_template)?;
        VariantRegistry::builtin().set_default(&self.variant)?;
        Ok(())
    }
}
