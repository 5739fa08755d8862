use crate::domain::ports::Storage;
use crate::utils::error::{CertError, Result};
use crate::utils::validation::validate_file_stem;

pub const TEMPLATE_DIR: &str = "templates";

/// Reads `.docx` templates from the `templates/` directory of a storage. Nothing is cached.
#[derive(Debug, Clone)]
pub struct TemplateLoader<S: Storage> {
    storage: S,
}

impl<S: Storage> TemplateLoader<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn track_template_path(track: &str, level: &str) -> String {
        format!("{}/{} {}.docx", TEMPLATE_DIR, track, level)
    }

    pub fn named_template_path(name: &str) -> String {
        format!("{}/{}.docx", TEMPLATE_DIR, name)
    }

    /// Template for a track and level, e.g. `templates/Data Science Advanced.docx`.
    ///
    /// Both keys become part of the file name, so each must be a single path component.
    pub async fn load_for(&self, track: &str, level: &str) -> Result<Vec<u8>> {
        validate_file_stem("track", track)?;
        validate_file_stem("level", level)?;
        self.load(Self::track_template_path(track, level)).await
    }

    pub async fn load_named(&self, name: &str) -> Result<Vec<u8>> {
        validate_file_stem("template", name)?;
        self.load(Self::named_template_path(name)).await
    }

    async fn load(&self, path: String) -> Result<Vec<u8>> {
        tracing::debug!("Loading template {}", path);
        match self.storage.read_file(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(CertError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CertError::TemplateNotFound { path })
            }
            Err(e) => Err(e),
        }
    }
}
