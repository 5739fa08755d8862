use thiserror::Error;

#[derive(Error, Debug)]
pub enum CertError {
    #[error("Template not found: {path}")]
    TemplateNotFound { path: String },

    #[error("Template markers without a patch: {}", markers.join(", "))]
    MarkerMismatch { markers: Vec<String> },

    #[error("Document conversion failed: {message}")]
    ConversionFailed { message: String },

    #[error("Document conversion timed out after {seconds}s")]
    ConversionTimeout { seconds: u64 },

    #[error("Malformed document part '{part}': {message}")]
    DocumentError { part: String, message: String },

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Template,
    Document,
    Conversion,
    Storage,
    Input,
    Configuration,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CertError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CertError::TemplateNotFound { .. } | CertError::MarkerMismatch { .. } => {
                ErrorCategory::Template
            }
            CertError::DocumentError { .. } | CertError::ZipError(_) => ErrorCategory::Document,
            CertError::ConversionFailed { .. } | CertError::ConversionTimeout { .. } => {
                ErrorCategory::Conversion
            }
            CertError::IoError(_) => ErrorCategory::Storage,
            CertError::CsvError(_)
            | CertError::SerializationError(_)
            | CertError::ValidationError { .. } => ErrorCategory::Input,
            CertError::ConfigError { .. }
            | CertError::ConfigValidationError { .. }
            | CertError::InvalidConfigValueError { .. }
            | CertError::MissingConfigError { .. } => ErrorCategory::Configuration,
            CertError::ProcessingError { .. } => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Conversion => ErrorSeverity::Medium,
            ErrorCategory::Template | ErrorCategory::Document | ErrorCategory::Input => {
                ErrorSeverity::High
            }
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage | ErrorCategory::Internal => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            CertError::TemplateNotFound { path } => format!(
                "Place the template at '{}' or check the track/level of the record",
                path
            ),
            CertError::MarkerMismatch { .. } => {
                "Use a template variant that supplies every marker of this template".to_string()
            }
            CertError::ConversionFailed { .. } => {
                "Check that LibreOffice is installed and the --soffice binary is correct"
                    .to_string()
            }
            CertError::ConversionTimeout { .. } => {
                "Raise the conversion timeout or check for a hung office process".to_string()
            }
            CertError::DocumentError { .. } | CertError::ZipError(_) => {
                "Re-save the template as a .docx file from a word processor".to_string()
            }
            CertError::IoError(_) => {
                "Check that the base directory exists and is writable".to_string()
            }
            CertError::CsvError(_) | CertError::SerializationError(_) => {
                "Check the format of the records file".to_string()
            }
            CertError::ValidationError { .. } => "Fix the offending record field".to_string(),
            CertError::ConfigError { .. }
            | CertError::ConfigValidationError { .. }
            | CertError::InvalidConfigValueError { .. }
            | CertError::MissingConfigError { .. } => {
                "Review the configuration file and command line flags".to_string()
            }
            CertError::ProcessingError { .. } => {
                "Retry the run; report it if it persists".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Template => format!("Template problem: {}", self),
            ErrorCategory::Document => format!("Could not read the template document: {}", self),
            ErrorCategory::Conversion => format!("PDF conversion failed: {}", self),
            ErrorCategory::Storage => format!("File system problem: {}", self),
            ErrorCategory::Input => format!("Invalid input: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Internal => format!("Unexpected failure: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, CertError>;
