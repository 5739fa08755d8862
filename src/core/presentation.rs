//! Template variants: which markers a template declares, what fills them and how they look.

use crate::domain::model::{BlockParagraph, Patch, RunStyle, SubmissionRecord, TextRun};
use crate::utils::error::{CertError, Result};
use crate::utils::validation::validate_hex_color;
use chrono::NaiveDate;
use std::collections::HashMap;

pub const STANDARD_VARIANT: &str = "standard";
pub const COMPACT_VARIANT: &str = "compact";
pub const COMMENT_VARIANT: &str = "comment";

pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// What a marker is filled with. Each kind decides on its own whether the record has data
/// for it; without data the marker still gets an (empty) patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerContent {
    Name,
    FirstName,
    TrackLabel,
    WorkshopIntro,
    WorkshopList,
    Date,
    Comment,
}

impl MarkerContent {
    pub fn build(&self, record: &SubmissionRecord, today: NaiveDate, style: &RunStyle) -> Patch {
        let run = |text: String| vec![TextRun::new(text, style.clone())];

        match self {
            MarkerContent::Name => Patch::Inline(run(record.name.clone())),
            MarkerContent::FirstName => {
                Patch::Inline(non_empty(&record.first_name).map(run).unwrap_or_default())
            }
            MarkerContent::TrackLabel => Patch::Inline(
                record
                    .track_label
                    .as_deref()
                    .and_then(non_empty)
                    .map(run)
                    .unwrap_or_default(),
            ),
            MarkerContent::WorkshopIntro => {
                if record.workshops.is_empty() {
                    Patch::Inline(Vec::new())
                } else {
                    Patch::Inline(run(format!(
                        "{} also took part in workshops with the following companies: ",
                        record.first_name
                    )))
                }
            }
            MarkerContent::WorkshopList => Patch::Block(
                record
                    .workshops
                    .iter()
                    .map(|workshop| BlockParagraph::bullet(0, run(workshop.clone())))
                    .collect(),
            ),
            MarkerContent::Date => Patch::Inline(run(today.format(DATE_FORMAT).to_string())),
            MarkerContent::Comment => Patch::Inline(
                record
                    .comment
                    .as_deref()
                    .and_then(non_empty)
                    .map(run)
                    .unwrap_or_default(),
            ),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRule {
    pub key: String,
    pub content: MarkerContent,
    pub style: RunStyle,
}

impl MarkerRule {
    pub fn new(key: impl Into<String>, content: MarkerContent, style: RunStyle) -> Self {
        Self {
            key: key.into(),
            content,
            style,
        }
    }
}

/// The markers of one family of templates together with their presentation table.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateVariant {
    pub name: String,
    pub rules: Vec<MarkerRule>,
}

impl TemplateVariant {
    pub fn new(name: impl Into<String>, rules: Vec<MarkerRule>) -> Self {
        Self {
            name: name.into(),
            rules,
        }
    }

    /// Quicksand layout with greeting and track markers.
    pub fn standard() -> Self {
        let heading = RunStyle::new("Quicksand", 14.0, "2F5496").bold();
        let body = RunStyle::new("Quicksand", 10.0, "000000");

        Self::new(
            STANDARD_VARIANT,
            vec![
                MarkerRule::new("name", MarkerContent::Name, heading.clone()),
                MarkerRule::new("vorname", MarkerContent::FirstName, body.clone()),
                MarkerRule::new("track", MarkerContent::TrackLabel, heading),
                MarkerRule::new("workshops", MarkerContent::WorkshopIntro, body.clone()),
                MarkerRule::new("workshopsList", MarkerContent::WorkshopList, body.clone()),
                MarkerRule::new("date", MarkerContent::Date, body.bold()),
            ],
        )
    }

    /// Layout whose templates carry neither a greeting nor a track line.
    pub fn compact() -> Self {
        let heading = RunStyle::new("Montserrat", 16.0, "1F3864").bold();
        let body = RunStyle::new("Montserrat", 11.0, "262626");

        Self::new(
            COMPACT_VARIANT,
            vec![
                MarkerRule::new("name", MarkerContent::Name, heading),
                MarkerRule::new("workshops", MarkerContent::WorkshopIntro, body.clone()),
                MarkerRule::new("workshopsList", MarkerContent::WorkshopList, body.clone()),
                MarkerRule::new("date", MarkerContent::Date, body),
            ],
        )
    }

    /// Reviewer comment sheet.
    pub fn comment() -> Self {
        let body = RunStyle::new("Quicksand", 10.0, "000000");

        Self::new(
            COMMENT_VARIANT,
            vec![
                MarkerRule::new("date", MarkerContent::Date, body.clone()),
                MarkerRule::new("firstName", MarkerContent::FirstName, body.clone()),
                MarkerRule::new("comment", MarkerContent::Comment, body),
            ],
        )
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.key.as_str())
    }

    pub fn set_style(&mut self, key: &str, style: RunStyle) -> Result<()> {
        let rule = self
            .rules
            .iter_mut()
            .find(|rule| rule.key == key)
            .ok_or_else(|| CertError::ConfigValidationError {
                field: format!("presentation.overrides.{}.{}", self.name, key),
                message: format!("variant '{}' has no marker '{}'", self.name, key),
            })?;
        rule.style = style;
        Ok(())
    }
}

/// Known variants plus the rules for choosing one per record.
#[derive(Debug, Clone)]
pub struct VariantRegistry {
    variants: HashMap<String, TemplateVariant>,
    default_variant: String,
    track_variants: HashMap<String, String>,
}

impl Default for VariantRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl VariantRegistry {
    pub fn builtin() -> Self {
        let variants = [
            TemplateVariant::standard(),
            TemplateVariant::compact(),
            TemplateVariant::comment(),
        ]
        .into_iter()
        .map(|v| (v.name.clone(), v))
        .collect();

        Self {
            variants,
            default_variant: STANDARD_VARIANT.to_string(),
            track_variants: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Result<&TemplateVariant> {
        self.variants
            .get(name)
            .ok_or_else(|| CertError::ConfigValidationError {
                field: "variant".to_string(),
                message: format!("unknown template variant '{}'", name),
            })
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        self.get(name)?;
        self.default_variant = name.to_string();
        Ok(())
    }

    pub fn default_variant(&self) -> &str {
        &self.default_variant
    }

    pub fn map_track(&mut self, track: impl Into<String>, variant: &str) -> Result<()> {
        self.get(variant)?;
        self.track_variants.insert(track.into(), variant.to_string());
        Ok(())
    }

    /// Variant for certificates of a track, falling back to the default.
    pub fn for_track(&self, track: &str) -> Result<&TemplateVariant> {
        let name = self
            .track_variants
            .get(track)
            .map(String::as_str)
            .unwrap_or(&self.default_variant);
        self.get(name)
    }

    pub fn apply_overrides(
        &mut self,
        overrides: &HashMap<String, HashMap<String, RunStyle>>,
    ) -> Result<()> {
        for (variant_name, styles) in overrides {
            let variant = self.variants.get_mut(variant_name).ok_or_else(|| {
                CertError::ConfigValidationError {
                    field: format!("presentation.overrides.{}", variant_name),
                    message: format!("unknown template variant '{}'", variant_name),
                }
            })?;
            for (key, style) in styles {
                validate_hex_color(
                    &format!("presentation.overrides.{}.{}.color", variant_name, key),
                    &style.color,
                )?;
                variant.set_style(key, style.clone())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
    }

    #[test]
    fn test_date_is_day_month_year() {
        let record = SubmissionRecord::new("Jane Doe", "Jane", "cert");
        let style = RunStyle::new("Quicksand", 10.0, "000000");

        match MarkerContent::Date.build(&record, today(), &style) {
            Patch::Inline(runs) => assert_eq!(runs[0].text, "07.03.2024"),
            other => panic!("unexpected patch {other:?}"),
        }
    }

    #[test]
    fn test_missing_track_label_gives_empty_inline() {
        let record = SubmissionRecord::new("Jane Doe", "Jane", "cert");
        let style = RunStyle::new("Quicksand", 14.0, "2F5496");
        assert_eq!(
            MarkerContent::TrackLabel.build(&record, today(), &style),
            Patch::Inline(vec![])
        );
    }

    #[test]
    fn test_standard_and_compact_differ_in_markers() {
        let standard = TemplateVariant::standard();
        let standard_keys: Vec<&str> = standard.keys().collect();
        let compact = TemplateVariant::compact();
        let compact_keys: Vec<&str> = compact.keys().collect();

        assert!(standard_keys.contains(&"vorname"));
        assert!(standard_keys.contains(&"track"));
        assert!(!compact_keys.contains(&"vorname"));
        assert!(!compact_keys.contains(&"track"));
    }

    #[test]
    fn test_track_mapping_falls_back_to_default() {
        let mut registry = VariantRegistry::builtin();
        registry.map_track("Web Development", COMPACT_VARIANT).unwrap();

        assert_eq!(registry.for_track("Web Development").unwrap().name, COMPACT_VARIANT);
        assert_eq!(registry.for_track("Data Science").unwrap().name, STANDARD_VARIANT);
        assert!(registry.map_track("Design", "missing").is_err());
    }

    #[test]
    fn test_overrides_replace_styles() {
        let mut registry = VariantRegistry::builtin();
        let mut styles = HashMap::new();
        styles.insert(
            "name".to_string(),
            RunStyle::new("Lato", 18.0, "C00000").bold(),
        );
        let overrides = HashMap::from([(STANDARD_VARIANT.to_string(), styles)]);

        registry.apply_overrides(&overrides).unwrap();

        let name_rule = registry
            .get(STANDARD_VARIANT)
            .unwrap()
            .rules
            .iter()
            .find(|r| r.key == "name")
            .cloned()
            .unwrap();
        assert_eq!(name_rule.style.font, "Lato");
        assert_eq!(name_rule.style.half_points(), 36);
    }

    #[test]
    fn test_override_for_unknown_marker_is_rejected() {
        let mut registry = VariantRegistry::builtin();
        let styles = HashMap::from([(
            "vorname".to_string(),
            RunStyle::new("Lato", 10.0, "000000"),
        )]);
        let overrides = HashMap::from([(COMPACT_VARIANT.to_string(), styles)]);

        assert!(registry.apply_overrides(&overrides).is_err());
    }
}
