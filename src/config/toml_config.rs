use crate::app::converters::libreoffice::DEFAULT_BINARY;
use crate::core::pipeline::{DEFAULT_COMMENT_TEMPLATE, DEFAULT_TARGET_FORMAT};
use crate::core::presentation::{VariantRegistry, STANDARD_VARIANT};
use crate::core::ConfigProvider;
use crate::domain::model::RunStyle;
use crate::utils::error::{CertError, Result};
use crate::utils::validation::{
    validate_file_extensions, validate_non_empty_string, validate_path, validate_positive_number,
    validate_range, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static ENV_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    pub records: Option<RecordsConfig>,
    #[serde(default)]
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub presentation: PresentationConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: String,
    pub comment_template: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            comment_template: None,
        }
    }
}

fn default_base_dir() -> String {
    ".".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionConfig {
    pub binary: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub target_format: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    pub concurrent_jobs: Option<usize>,
    pub stop_on_error: Option<bool>,
    pub generate_comments: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresentationConfig {
    pub default_variant: Option<String>,
    /// Track key to variant name.
    #[serde(default)]
    pub track_variants: HashMap<String, String>,
    /// Variant name to marker key to style.
    #[serde(default)]
    pub overrides: HashMap<String, HashMap<String, RunStyle>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
    pub json_logs: Option<bool>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CertError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| CertError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CERT_BASE_DIR}); unknown variables are left as written.
    fn substitute_env_vars(content: &str) -> String {
        ENV_PLACEHOLDER
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        validate_path("paths.base_dir", &self.paths.base_dir)?;

        if let Some(records) = &self.records {
            validate_path("records.path", &records.path)?;
            validate_file_extensions(
                "records.path",
                std::slice::from_ref(&records.path),
                &["json", "csv"],
            )?;
        }

        if let Some(binary) = &self.conversion.binary {
            validate_non_empty_string("conversion.binary", binary)?;
        }
        if let Some(timeout) = self.conversion.timeout_seconds {
            validate_range("conversion.timeout_seconds", timeout, 1, 3600)?;
        }
        if let Some(format) = &self.conversion.target_format {
            validate_non_empty_string("conversion.target_format", format)?;
        }

        if let Some(jobs) = self.batch.concurrent_jobs {
            validate_positive_number("batch.concurrent_jobs", jobs, 1)?;
        }

        for (variant, styles) in &self.presentation.overrides {
            for (key, style) in styles {
                validate_range(
                    &format!("presentation.overrides.{}.{}.size_pt", variant, key),
                    style.size_pt,
                    1.0,
                    200.0,
                )?;
            }
        }

        // Resolving the presentation once catches unknown variants, marker keys and bad colors.
        let mut registry = VariantRegistry::builtin();
        registry.apply_overrides(&self.presentation.overrides)?;
        registry.set_default(self.default_variant())?;
        for (track, variant) in &self.presentation.track_variants {
            registry.map_track(track.clone(), variant)?;
        }

        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }

    pub fn verbose_logging(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.log_level.as_deref())
            .map(|level| matches!(level, "debug" | "trace"))
            .unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn base_dir(&self) -> &str {
        &self.paths.base_dir
    }

    fn records_path(&self) -> Option<&str> {
        self.records.as_ref().map(|r| r.path.as_str())
    }

    fn converter_binary(&self) -> &str {
        self.conversion.binary.as_deref().unwrap_or(DEFAULT_BINARY)
    }

    fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.conversion.timeout_seconds.unwrap_or(120))
    }

    fn target_format(&self) -> &str {
        self.conversion
            .target_format
            .as_deref()
            .unwrap_or(DEFAULT_TARGET_FORMAT)
    }

    fn concurrent_jobs(&self) -> usize {
        self.batch.concurrent_jobs.unwrap_or(1)
    }

    fn stop_on_error(&self) -> bool {
        self.batch.stop_on_error.unwrap_or(false)
    }

    fn generate_comments(&self) -> bool {
        self.batch.generate_comments.unwrap_or(false)
    }

    fn comment_template(&self) -> &str {
        self.paths
            .comment_template
            .as_deref()
            .unwrap_or(DEFAULT_COMMENT_TEMPLATE)
    }

    fn default_variant(&self) -> &str {
        self.presentation
            .default_variant
            .as_deref()
            .unwrap_or(STANDARD_VARIANT)
    }

    fn track_variants(&self) -> HashMap<String, String> {
        self.presentation.track_variants.clone()
    }

    fn style_overrides(&self) -> HashMap<String, HashMap<String, RunStyle>> {
        self.presentation.overrides.clone()
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL: &str = r#"
[pipeline]
name = "summer-school"
description = "Certificates for the summer cohort"

[paths]
base_dir = "/srv/certificates"
comment_template = "Kommentar"

[records]
path = "submissions.csv"

[conversion]
binary = "/usr/bin/soffice"
timeout_seconds = 60

[batch]
concurrent_jobs = 3
generate_comments = true

[presentation]
default_variant = "standard"

[presentation.track_variants]
"Web Development" = "compact"

[presentation.overrides.standard.name]
font = "Lato"
size_pt = 18
color = "C00000"
bold = true

[monitoring]
enabled = true
log_level = "debug"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = TomlConfig::from_toml_str(FULL).unwrap();

        assert_eq!(config.pipeline.name, "summer-school");
        assert_eq!(config.base_dir(), "/srv/certificates");
        assert_eq!(config.records_path(), Some("submissions.csv"));
        assert_eq!(config.converter_binary(), "/usr/bin/soffice");
        assert_eq!(config.conversion_timeout(), Duration::from_secs(60));
        assert_eq!(config.concurrent_jobs(), 3);
        assert!(config.generate_comments());
        assert!(!config.stop_on_error());
        assert_eq!(config.comment_template(), "Kommentar");
        assert_eq!(
            config.track_variants().get("Web Development").map(String::as_str),
            Some("compact")
        );
        assert_eq!(config.style_overrides()["standard"]["name"].font, "Lato");
        assert!(config.monitoring_enabled());
        assert!(config.verbose_logging());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = TomlConfig::from_toml_str("[pipeline]\nname = \"minimal\"\n").unwrap();

        assert_eq!(config.base_dir(), ".");
        assert_eq!(config.records_path(), None);
        assert_eq!(config.converter_binary(), "soffice");
        assert_eq!(config.target_format(), "pdf");
        assert_eq!(config.default_variant(), "standard");
        assert_eq!(config.comment_template(), "comment");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CERTGEN_TEST_BASE_DIR", "/data/certs");

        let toml_content = r#"
[pipeline]
name = "env"

[paths]
base_dir = "${CERTGEN_TEST_BASE_DIR}"
comment_template = "${CERTGEN_TEST_UNSET_VAR}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.base_dir(), "/data/certs");
        assert_eq!(config.comment_template(), "${CERTGEN_TEST_UNSET_VAR}");

        std::env::remove_var("CERTGEN_TEST_BASE_DIR");
    }

    #[test]
    fn test_unknown_track_variant_fails_validation() {
        let toml_content = r#"
[pipeline]
name = "bad"

[presentation.track_variants]
"Design" = "poster"
"#;
        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_override_color_fails_validation() {
        let toml_content = r#"
[pipeline]
name = "bad"

[presentation.overrides.standard.date]
font = "Quicksand"
size_pt = 10
color = "black"
"#;
        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(FULL.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.pipeline.name, "summer-school");
    }
}
