pub mod assembler;
pub mod engine;
pub mod pipeline;
pub mod presentation;
pub mod templates;

pub use crate::domain::model::{
    BlockParagraph, GeneratedArtifacts, Patch, PatchSet, RunStyle, SubmissionRecord, TextRun,
};
pub use crate::domain::ports::{ConfigProvider, Converter, Storage};
pub use crate::utils::error::Result;
