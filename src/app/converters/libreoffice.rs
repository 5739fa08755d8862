use crate::domain::ports::Converter;
use crate::utils::error::{CertError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

pub const DEFAULT_BINARY: &str = "soffice";

/// Converts documents with a headless LibreOffice process.
///
/// Each call works in its own temporary directory with its own user profile, so concurrent
/// conversions do not fight over the profile lock. The child is killed when the call is
/// dropped, which is how a caller's timeout reaches the process.
#[derive(Debug, Clone)]
pub struct LibreOfficeConverter {
    binary: PathBuf,
}

impl Default for LibreOfficeConverter {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl LibreOfficeConverter {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, workdir: &Path, input: &Path, target_format: &str) -> Command {
        let profile = workdir.join("profile");
        let mut command = Command::new(&self.binary);
        command
            .arg(format!("-env:UserInstallation=file://{}", profile.display()))
            .arg("--headless")
            .arg("--convert-to")
            .arg(target_format)
            .arg("--outdir")
            .arg(workdir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Converter for LibreOfficeConverter {
    async fn convert(&self, document: &[u8], target_format: &str) -> Result<Vec<u8>> {
        let target_format = target_format.trim_start_matches('.');
        let workdir = tempfile::Builder::new().prefix("certgen-").tempdir()?;
        let input = workdir.path().join("document.docx");
        tokio::fs::write(&input, document).await?;

        tracing::debug!(
            "Running {} --convert-to {} on {} bytes",
            self.binary.display(),
            target_format,
            document.len()
        );

        let output = self
            .command(workdir.path(), &input, target_format)
            .output()
            .await
            .map_err(|e| CertError::ConversionFailed {
                message: format!("could not start {}: {}", self.binary.display(), e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CertError::ConversionFailed {
                message: format!(
                    "{} exited with {}: {}",
                    self.binary.display(),
                    output.status,
                    stderr.trim()
                ),
            });
        }

        let produced = workdir.path().join(format!("document.{}", target_format));
        match tokio::fs::read(&produced).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                Err(CertError::ConversionFailed {
                    message: format!("no {} output was produced: {}", target_format, stdout.trim()),
                })
            }
            Err(e) => Err(CertError::IoError(e)),
        }
    }
}
