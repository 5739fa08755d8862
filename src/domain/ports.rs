use crate::domain::model::RunStyle;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Byte store addressed by paths relative to an injected base directory.
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// External engine turning a filled document into another format.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, document: &[u8], target_format: &str) -> Result<Vec<u8>>;
}

pub trait ConfigProvider: Send + Sync {
    fn base_dir(&self) -> &str;
    fn records_path(&self) -> Option<&str>;
    fn converter_binary(&self) -> &str;
    fn conversion_timeout(&self) -> Duration;
    fn target_format(&self) -> &str;
    fn concurrent_jobs(&self) -> usize;
    fn stop_on_error(&self) -> bool;
    fn generate_comments(&self) -> bool;
    fn comment_template(&self) -> &str;
    fn default_variant(&self) -> &str;
    fn track_variants(&self) -> HashMap<String, String>;
    /// Variant name to marker key to style.
    fn style_overrides(&self) -> HashMap<String, HashMap<String, RunStyle>>;
}
