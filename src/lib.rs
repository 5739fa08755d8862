pub mod app;
pub mod config;
pub mod core;
pub mod docx;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{LocalStorage, TomlConfig};

pub use app::converters::LibreOfficeConverter;
pub use app::sources::load_records;
pub use core::{
    engine::{BatchOptions, BatchReport, CertificateEngine},
    pipeline::CertificatePipeline,
};
pub use domain::model::{GeneratedArtifacts, SubmissionRecord};
pub use utils::error::{CertError, Result};
