use crate::utils::error::{CertError, Result};
use regex::Regex;
use std::sync::LazyLock;

pub const NUMBERING_PART: &str = "word/numbering.xml";
pub const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

const NUMBERING_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering";
const NUMBERING_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml";
const WORDML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

static NUM_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<w:num\s[^>]*?w:numId="(\d+)""#).expect("numId pattern is valid")
});

static ABSTRACT_NUM_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<w:abstractNum\s[^>]*?w:abstractNumId="(\d+)""#)
        .expect("abstractNumId pattern is valid")
});

static FIRST_NUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<w:num[\s>]").expect("num pattern is valid"));

static SELF_CLOSED_ROOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<w:numbering(\s[^>]*?)?/>").expect("numbering root pattern is valid")
});

static RELATIONSHIP_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"Id="rId(\d+)""#).expect("relationship id pattern is valid"));

/// A bullet list definition appended to the template's numbering part.
///
/// Ids are chosen above every id already present so existing lists keep their numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulletNumbering {
    pub num_id: u32,
    pub abstract_num_id: u32,
}

impl BulletNumbering {
    pub fn plan(existing: Option<&str>) -> Self {
        let Some(xml) = existing else {
            return Self {
                num_id: 1,
                abstract_num_id: 0,
            };
        };

        let next = |re: &Regex, floor: u32| {
            re.captures_iter(xml)
                .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
                .max()
                .map(|max| max + 1)
                .unwrap_or(floor)
        };

        Self {
            num_id: next(&NUM_ID, 1),
            abstract_num_id: next(&ABSTRACT_NUM_ID, 0),
        }
    }

    fn abstract_num_xml(&self) -> String {
        let levels: String = (0..9u32)
            .map(|level| {
                let glyph = match level % 3 {
                    0 => "\u{2022}",
                    1 => "o",
                    _ => "\u{25AA}",
                };
                format!(
                    concat!(
                        "<w:lvl w:ilvl=\"{level}\">",
                        "<w:start w:val=\"1\"/>",
                        "<w:numFmt w:val=\"bullet\"/>",
                        "<w:lvlText w:val=\"{glyph}\"/>",
                        "<w:lvlJc w:val=\"left\"/>",
                        "<w:pPr><w:ind w:left=\"{left}\" w:hanging=\"360\"/></w:pPr>",
                        "</w:lvl>"
                    ),
                    level = level,
                    glyph = glyph,
                    left = 720 * (level + 1),
                )
            })
            .collect();

        format!(
            "<w:abstractNum w:abstractNumId=\"{}\"><w:multiLevelType w:val=\"hybridMultilevel\"/>{}</w:abstractNum>",
            self.abstract_num_id, levels
        )
    }

    fn num_xml(&self) -> String {
        format!(
            "<w:num w:numId=\"{}\"><w:abstractNumId w:val=\"{}\"/></w:num>",
            self.num_id, self.abstract_num_id
        )
    }

    /// A complete numbering part for templates that have none.
    pub fn standalone_part(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:numbering xmlns:w=\"{}\">{}{}</w:numbering>",
            WORDML_NS,
            self.abstract_num_xml(),
            self.num_xml()
        )
    }

    /// Adds the definition to an existing numbering part. `w:abstractNum` elements must
    /// precede every `w:num`, so the two halves go to different places.
    pub fn merge_into(&self, numbering: &str) -> Result<String> {
        let numbering = expand_empty_root(numbering);

        let close = numbering
            .rfind("</w:numbering>")
            .ok_or_else(|| CertError::DocumentError {
                part: NUMBERING_PART.to_string(),
                message: "missing </w:numbering>".to_string(),
            })?;

        let abstract_at = FIRST_NUM
            .find(&numbering)
            .map(|m| m.start())
            .unwrap_or(close);
        let num_at = numbering.find("<w:numIdMacAtCleanup").unwrap_or(close);

        let mut merged = String::with_capacity(numbering.len() + 2048);
        merged.push_str(&numbering[..abstract_at]);
        merged.push_str(&self.abstract_num_xml());
        merged.push_str(&numbering[abstract_at..num_at]);
        merged.push_str(&self.num_xml());
        merged.push_str(&numbering[num_at..]);
        Ok(merged)
    }
}

fn expand_empty_root(numbering: &str) -> String {
    match SELF_CLOSED_ROOT.find(numbering) {
        Some(root) => {
            let range = root.range();
            let open = format!("{}>", root.as_str().trim_end_matches("/>"));
            format!(
                "{}{}</w:numbering>{}",
                &numbering[..range.start],
                open,
                &numbering[range.end..]
            )
        }
        None => numbering.to_string(),
    }
}

/// Points the main document at `numbering.xml` unless it already does.
pub fn register_relationship(rels: &str) -> Result<String> {
    if rels.contains(NUMBERING_REL_TYPE) {
        return Ok(rels.to_string());
    }

    let close = rels
        .rfind("</Relationships>")
        .ok_or_else(|| CertError::DocumentError {
            part: DOCUMENT_RELS_PART.to_string(),
            message: "missing </Relationships>".to_string(),
        })?;

    let next_id = RELATIONSHIP_ID
        .captures_iter(rels)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .max()
        .map(|max| max + 1)
        .unwrap_or(1);

    Ok(format!(
        "{}<Relationship Id=\"rId{}\" Type=\"{}\" Target=\"numbering.xml\"/>{}",
        &rels[..close],
        next_id,
        NUMBERING_REL_TYPE,
        &rels[close..]
    ))
}

pub fn empty_relationships_part() -> String {
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\"></Relationships>".to_string()
}

pub fn register_content_type(content_types: &str) -> Result<String> {
    if content_types.contains("PartName=\"/word/numbering.xml\"") {
        return Ok(content_types.to_string());
    }

    let close = content_types
        .rfind("</Types>")
        .ok_or_else(|| CertError::DocumentError {
            part: CONTENT_TYPES_PART.to_string(),
            message: "missing </Types>".to_string(),
        })?;

    Ok(format!(
        "{}<Override PartName=\"/word/numbering.xml\" ContentType=\"{}\"/>{}",
        &content_types[..close],
        NUMBERING_CONTENT_TYPE,
        &content_types[close..]
    ))
}
