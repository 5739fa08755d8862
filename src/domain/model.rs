use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One participant's submission, read-only input to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub name: String,
    #[serde(alias = "firstName")]
    pub first_name: String,
    /// Template selection key, the `{track}` part of `templates/{track} {level}.docx`.
    #[serde(default)]
    pub track: String,
    #[serde(default)]
    pub level: String,
    #[serde(default, alias = "trackLabel", alias = "trackEn")]
    pub track_label: Option<String>,
    #[serde(default)]
    pub workshops: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(alias = "fileName")]
    pub file_name: String,
}

impl SubmissionRecord {
    pub fn new(
        name: impl Into<String>,
        first_name: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            first_name: first_name.into(),
            track: String::new(),
            level: String::new(),
            track_label: None,
            workshops: Vec::new(),
            comment: None,
            file_name: file_name.into(),
        }
    }

    pub fn with_template(mut self, track: impl Into<String>, level: impl Into<String>) -> Self {
        self.track = track.into();
        self.level = level.into();
        self
    }

    pub fn with_track_label(mut self, label: impl Into<String>) -> Self {
        self.track_label = Some(label.into());
        self
    }

    pub fn with_workshops<I, W>(mut self, workshops: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: Into<String>,
    {
        self.workshops = workshops.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn has_comment(&self) -> bool {
        self.comment
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Presentation of a single text run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStyle {
    pub font: String,
    pub size_pt: f32,
    /// Hex RGB without `#`.
    pub color: String,
    #[serde(default)]
    pub bold: bool,
}

impl RunStyle {
    pub fn new(font: impl Into<String>, size_pt: f32, color: impl Into<String>) -> Self {
        Self {
            font: font.into(),
            size_pt,
            color: color.into(),
            bold: false,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// WordprocessingML sizes are in half-points.
    pub fn half_points(&self) -> u32 {
        (self.size_pt * 2.0).round().max(1.0) as u32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub style: RunStyle,
}

impl TextRun {
    pub fn new(text: impl Into<String>, style: RunStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockParagraph {
    pub runs: Vec<TextRun>,
    /// List nesting level when the paragraph is a bullet item.
    pub bullet_level: Option<u8>,
}

impl BlockParagraph {
    pub fn bullet(level: u8, runs: Vec<TextRun>) -> Self {
        Self {
            runs,
            bullet_level: Some(level),
        }
    }

    pub fn plain(runs: Vec<TextRun>) -> Self {
        Self {
            runs,
            bullet_level: None,
        }
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// Replacement content for one marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Replaces the marker inside its paragraph with styled runs.
    Inline(Vec<TextRun>),
    /// Replaces the whole paragraph holding the marker with generated paragraphs.
    Block(Vec<BlockParagraph>),
}

impl Patch {
    pub fn has_bullets(&self) -> bool {
        match self {
            Patch::Inline(_) => false,
            Patch::Block(paragraphs) => paragraphs.iter().any(|p| p.bullet_level.is_some()),
        }
    }
}

/// Marker key to replacement content for a single render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchSet {
    entries: BTreeMap<String, Patch>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, patch: Patch) {
        self.entries.insert(key.into(), patch);
    }

    pub fn get(&self, key: &str) -> Option<&Patch> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn needs_bullet_numbering(&self) -> bool {
        self.entries.values().any(Patch::has_bullets)
    }
}

/// Paths, relative to the storage base directory, of one generated pair of files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedArtifacts {
    pub docx_path: String,
    pub pdf_path: String,
}
