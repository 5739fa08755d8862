use crate::core::presentation::TemplateVariant;
use crate::docx;
use crate::domain::model::{PatchSet, SubmissionRecord};
use crate::utils::error::{CertError, Result};
use chrono::NaiveDate;

/// Builds patch-sets for one template variant and applies them to template bytes.
#[derive(Debug, Clone)]
pub struct PatchAssembler {
    variant: TemplateVariant,
}

impl PatchAssembler {
    pub fn new(variant: TemplateVariant) -> Self {
        Self { variant }
    }

    /// One entry per marker of the variant, empty when the record has nothing for it.
    pub fn assemble(&self, record: &SubmissionRecord, today: NaiveDate) -> PatchSet {
        let mut patches = PatchSet::new();
        for rule in &self.variant.rules {
            patches.insert(rule.key.clone(), rule.content.build(record, today, &rule.style));
        }
        patches
    }

    /// Patches the template on the blocking pool; zip and XML work is CPU bound.
    pub async fn fill(
        &self,
        template: Vec<u8>,
        record: &SubmissionRecord,
        today: NaiveDate,
    ) -> Result<Vec<u8>> {
        let patches = self.assemble(record, today);
        tracing::debug!(
            variant = %self.variant.name,
            file_name = %record.file_name,
            patches = patches.len(),
            "filling template"
        );

        tokio::task::spawn_blocking(move || docx::patch_document(&template, &patches))
            .await
            .map_err(|e| CertError::ProcessingError {
                message: format!("template patch task failed: {}", e),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures::{docx_with_body, paragraph, read_entry};
    use crate::docx::xml::{paragraph_text, paragraph_tree};
    use crate::domain::model::Patch;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 5).unwrap()
    }

    fn jane() -> SubmissionRecord {
        SubmissionRecord::new("Jane Doe", "Jane", "cert_001")
            .with_track_label("Data Science")
            .with_workshops(["Acme Corp"])
    }

    fn standard_template() -> Vec<u8> {
        docx_with_body(&[
            paragraph("{{name}}"),
            paragraph("Dear {{vorname}},"),
            paragraph("{{track}}"),
            paragraph("{{workshops}}"),
            paragraph("{{workshopsList}}"),
            paragraph("{{date}}"),
        ])
    }

    #[test]
    fn test_workshops_produce_intro_and_bullets() {
        let assembler = PatchAssembler::new(TemplateVariant::standard());
        let patches = assembler.assemble(&jane(), today());

        match patches.get("workshops").unwrap() {
            Patch::Inline(runs) => {
                assert_eq!(runs.len(), 1);
                assert!(runs[0]
                    .text
                    .contains("Jane also took part in workshops with the following companies: "));
            }
            other => panic!("unexpected patch {other:?}"),
        }

        match patches.get("workshopsList").unwrap() {
            Patch::Block(paragraphs) => {
                assert_eq!(paragraphs.len(), 1);
                assert_eq!(paragraphs[0].text(), "Acme Corp");
                assert_eq!(paragraphs[0].bullet_level, Some(0));
                assert_eq!(paragraphs[0].runs[0].style.font, "Quicksand");
            }
            other => panic!("unexpected patch {other:?}"),
        }
    }

    #[test]
    fn test_no_workshops_keeps_keys_with_empty_values() {
        let assembler = PatchAssembler::new(TemplateVariant::standard());
        let record = SubmissionRecord::new("Jane Doe", "Jane", "cert_002");
        let patches = assembler.assemble(&record, today());

        assert_eq!(patches.get("workshops"), Some(&Patch::Inline(vec![])));
        assert_eq!(patches.get("workshopsList"), Some(&Patch::Block(vec![])));
        assert_eq!(patches.get("track"), Some(&Patch::Inline(vec![])));
        assert_eq!(patches.len(), 6);
    }

    #[test]
    fn test_every_variant_key_is_present() {
        for variant in [
            TemplateVariant::standard(),
            TemplateVariant::compact(),
            TemplateVariant::comment(),
        ] {
            let patches = PatchAssembler::new(variant.clone())
                .assemble(&SubmissionRecord::new("A", "B", "c"), today());
            for key in variant.keys() {
                assert!(patches.contains_key(key), "{} lacks {}", variant.name, key);
            }
        }
    }

    #[tokio::test]
    async fn test_fill_renders_bullets_in_input_order() {
        let assembler = PatchAssembler::new(TemplateVariant::standard());
        let record = jane().with_workshops(["Acme Corp", "Globex", "Initech"]);

        let filled = assembler
            .fill(standard_template(), &record, today())
            .await
            .unwrap();
        let document = read_entry(&filled, docx::DOCUMENT_PART);

        let bullets: Vec<String> = paragraph_tree(&document)
            .into_iter()
            .map(|node| &document[node.range])
            .filter(|p| p.contains("<w:numPr>"))
            .map(paragraph_text)
            .collect();
        assert_eq!(bullets, vec!["Acme Corp", "Globex", "Initech"]);
        assert!(document.contains("05.11.2024"));
        assert!(document.contains("Dear "));
    }

    #[tokio::test]
    async fn test_fill_without_workshops_has_no_bullets() {
        let assembler = PatchAssembler::new(TemplateVariant::standard());
        let record = SubmissionRecord::new("Jane Doe", "Jane", "cert_002");

        let filled = assembler
            .fill(standard_template(), &record, today())
            .await
            .unwrap();
        let document = read_entry(&filled, docx::DOCUMENT_PART);

        assert!(!document.contains("<w:numPr>"));
        assert!(!document.contains("also took part"));
        assert!(!document.contains("{{"));
    }

    #[tokio::test]
    async fn test_compact_variant_accepts_template_without_greeting() {
        let template = docx_with_body(&[
            paragraph("{{name}}"),
            paragraph("{{workshops}}"),
            paragraph("{{workshopsList}}"),
            paragraph("{{date}}"),
        ]);
        let assembler = PatchAssembler::new(TemplateVariant::compact());

        let filled = assembler.fill(template, &jane(), today()).await.unwrap();
        assert!(read_entry(&filled, docx::DOCUMENT_PART).contains("Montserrat"));
    }
}
