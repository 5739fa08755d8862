use crate::docx::numbering::{
    self, BulletNumbering, CONTENT_TYPES_PART, DOCUMENT_RELS_PART, NUMBERING_PART,
};
use crate::docx::xml::{self, ParagraphNode};
use crate::domain::model::{BlockParagraph, Patch, PatchSet, RunStyle, TextRun};
use crate::utils::error::{CertError, Result};
use regex::Regex;
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::io::{Cursor, Read, Seek, Write};
use std::ops::Range;
use std::sync::LazyLock;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const DOCUMENT_PART: &str = "word/document.xml";

static CONTENT_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^word/(document|header\d*|footer\d*)\.xml$")
        .expect("content part pattern is valid")
});

/// Result of patching one XML part.
#[derive(Debug, Default)]
struct PartOutcome {
    xml: String,
    changed: bool,
    used: BTreeSet<String>,
    unpatched: BTreeSet<String>,
    bullets_used: bool,
}

/// Applies a patch-set to a `.docx` template and returns the filled document.
///
/// Patch keys with no marker in the template are ignored. Markers left without a patch are
/// reported as [`CertError::MarkerMismatch`].
pub fn patch_document(template: &[u8], patches: &PatchSet) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(template))?;

    let content_parts: Vec<String> = archive
        .file_names()
        .filter(|name| CONTENT_PART.is_match(name))
        .map(str::to_string)
        .collect();

    if !content_parts.iter().any(|name| name == DOCUMENT_PART) {
        return Err(CertError::DocumentError {
            part: DOCUMENT_PART.to_string(),
            message: "template has no main document part".to_string(),
        });
    }

    let existing_numbering = read_part_opt(&mut archive, NUMBERING_PART)?;
    let bullets = patches
        .needs_bullet_numbering()
        .then(|| BulletNumbering::plan(existing_numbering.as_deref()));

    let mut replaced: HashMap<String, Vec<u8>> = HashMap::new();
    let mut added: Vec<(String, Vec<u8>)> = Vec::new();
    let mut used = BTreeSet::new();
    let mut unpatched = BTreeSet::new();
    let mut bullets_used = false;

    for part in &content_parts {
        let source = read_part(&mut archive, part)?;
        let outcome = patch_part(&source, patches, bullets.as_ref());

        tracing::debug!(
            part = %part,
            markers = outcome.used.len(),
            "patched document part"
        );

        used.extend(outcome.used);
        unpatched.extend(outcome.unpatched);
        bullets_used |= outcome.bullets_used;
        if outcome.changed {
            replaced.insert(part.clone(), outcome.xml.into_bytes());
        }
    }

    if !unpatched.is_empty() {
        return Err(CertError::MarkerMismatch {
            markers: unpatched.into_iter().collect(),
        });
    }

    for key in patches.keys().filter(|key| !used.contains(*key)) {
        tracing::debug!("patch '{}' has no marker in this template", key);
    }

    if let Some(plan) = bullets.filter(|_| bullets_used) {
        match existing_numbering {
            Some(numbering) => {
                replaced.insert(
                    NUMBERING_PART.to_string(),
                    plan.merge_into(&numbering)?.into_bytes(),
                );
            }
            None => {
                added.push((NUMBERING_PART.to_string(), plan.standalone_part().into_bytes()));

                match read_part_opt(&mut archive, DOCUMENT_RELS_PART)? {
                    Some(rels) => {
                        replaced.insert(
                            DOCUMENT_RELS_PART.to_string(),
                            numbering::register_relationship(&rels)?.into_bytes(),
                        );
                    }
                    None => {
                        let rels = numbering::empty_relationships_part();
                        added.push((
                            DOCUMENT_RELS_PART.to_string(),
                            numbering::register_relationship(&rels)?.into_bytes(),
                        ));
                    }
                }

                let content_types = read_part(&mut archive, CONTENT_TYPES_PART)?;
                replaced.insert(
                    CONTENT_TYPES_PART.to_string(),
                    numbering::register_content_type(&content_types)?.into_bytes(),
                );
            }
        }
    }

    rewrite_archive(archive, replaced, added)
}

fn read_part_opt<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>> {
    let Some(index) = archive.index_for_name(name) else {
        return Ok(None);
    };
    let mut file = archive.by_index(index)?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| CertError::DocumentError {
            part: name.to_string(),
            message: e.to_string(),
        })?;
    Ok(Some(content))
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    read_part_opt(archive, name)?.ok_or_else(|| CertError::DocumentError {
        part: name.to_string(),
        message: "part is missing".to_string(),
    })
}

/// Copies every untouched entry raw, in the original order, then appends new parts.
fn rewrite_archive<R: Read + Seek>(
    mut archive: ZipArchive<R>,
    mut replaced: HashMap<String, Vec<u8>>,
    added: Vec<(String, Vec<u8>)>,
) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for index in 0..archive.len() {
        let file = archive.by_index(index)?;
        let name = file.name().to_string();
        match replaced.remove(&name) {
            Some(data) => {
                drop(file);
                writer.start_file(name, options)?;
                writer.write_all(&data)?;
            }
            None => writer.raw_copy_file(file)?,
        }
    }

    for (name, data) in added {
        writer.start_file(name, options)?;
        writer.write_all(&data)?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

/// Patches and numbering shared by every paragraph of a part.
struct PatchContext<'a> {
    patches: &'a PatchSet,
    bullets: Option<&'a BulletNumbering>,
}

fn patch_part(source: &str, patches: &PatchSet, bullets: Option<&BulletNumbering>) -> PartOutcome {
    let ctx = PatchContext { patches, bullets };
    let mut outcome = PartOutcome::default();
    let tree = xml::paragraph_tree(source);

    outcome.xml = rewrite_siblings(source, 0..source.len(), &tree, &ctx, &mut outcome);
    outcome
}

/// Rewrites the paragraphs `nodes` found inside `span` of `source`, innermost first, and copies
/// the markup between them as is.
fn rewrite_siblings(
    source: &str,
    span: Range<usize>,
    nodes: &[ParagraphNode],
    ctx: &PatchContext<'_>,
    outcome: &mut PartOutcome,
) -> String {
    let mut out = String::with_capacity(span.len());
    let mut cursor = span.start;

    for node in nodes {
        out.push_str(&source[cursor..node.range.start]);

        let paragraph = if node.children.is_empty() {
            Cow::Borrowed(&source[node.range.clone()])
        } else {
            Cow::Owned(rewrite_siblings(
                source,
                node.range.clone(),
                &node.children,
                ctx,
                outcome,
            ))
        };

        let following = &source[node.range.end..span.end];
        match patch_paragraph(&paragraph, &out, following, ctx, outcome) {
            Some(rebuilt) => {
                outcome.changed = true;
                out.push_str(&rebuilt);
            }
            None => out.push_str(&paragraph),
        }
        cursor = node.range.end;
    }
    out.push_str(&source[cursor..span.end]);

    out
}

/// Returns the replacement markup when the paragraph's own text holds a patched marker.
///
/// `preceding` and `following` are the markup around the paragraph inside its container.
fn patch_paragraph(
    paragraph: &str,
    preceding: &str,
    following: &str,
    ctx: &PatchContext<'_>,
    outcome: &mut PartOutcome,
) -> Option<String> {
    let nested = xml::nested_paragraphs(paragraph);
    let elements = xml::own_text_elements(paragraph, &nested);
    let text: String = elements.iter().map(|e| e.text.as_str()).collect();
    if !text.contains("{{") {
        return None;
    }
    let markers = xml::find_markers(&text);
    if markers.is_empty() {
        return None;
    }

    let block = markers.iter().find_map(|m| match ctx.patches.get(&m.key) {
        Some(Patch::Block(paragraphs)) => Some((m.key.as_str(), paragraphs)),
        _ => None,
    });

    if let Some((key, paragraphs)) = block {
        if markers.len() > 1
            || !nested.is_empty()
            || text.trim() != text[markers[0].span.clone()].trim()
        {
            tracing::warn!(
                "block marker '{}' shares its paragraph with other content, which is dropped",
                key
            );
        }
        for marker in &markers {
            outcome.used.insert(marker.key.clone());
        }
        let rendered: String = paragraphs
            .iter()
            .map(|p| {
                outcome.bullets_used |= p.bullet_level.is_some() && ctx.bullets.is_some();
                block_paragraph_xml(p, ctx.bullets)
            })
            .collect();

        // Cells and text boxes must keep one paragraph.
        if rendered.is_empty() && xml::is_sole_block(preceding, following) {
            return Some(format!(
                "{}{}</w:p>",
                xml::opening_tag(paragraph),
                xml::paragraph_properties(paragraph).unwrap_or("")
            ));
        }
        return Some(rendered);
    }

    let mut replacements: Vec<(Range<usize>, &[TextRun])> = Vec::new();
    for marker in &markers {
        match ctx.patches.get(&marker.key) {
            Some(Patch::Inline(runs)) => {
                replacements.push((marker.span.clone(), runs.as_slice()));
                outcome.used.insert(marker.key.clone());
            }
            Some(Patch::Block(_)) => {}
            None => {
                outcome.unpatched.insert(marker.key.clone());
            }
        }
    }
    if replacements.is_empty() {
        return None;
    }

    // Offset of each text element's first character in the paragraph text.
    let mut offsets = Vec::with_capacity(elements.len());
    let mut position = 0;
    for element in &elements {
        offsets.push(position);
        position += element.text.len();
    }

    let mut rebuilt = String::with_capacity(paragraph.len() + 256);
    let mut cursor = 0;
    for run in xml::own_runs(paragraph, &nested) {
        let owned: Vec<usize> = (0..elements.len())
            .filter(|&i| run.start <= elements[i].range.start && elements[i].range.end <= run.end)
            .collect();
        let (Some(&first), Some(&last)) = (owned.first(), owned.last()) else {
            continue;
        };
        let covered = offsets[first]..offsets[last] + elements[last].text.len();
        if !replacements
            .iter()
            .any(|(span, _)| span.start < covered.end && covered.start < span.end)
        {
            continue;
        }

        rebuilt.push_str(&paragraph[cursor..run.start]);
        let pieces: Vec<(&xml::TextElement, usize)> =
            owned.iter().map(|&i| (&elements[i], offsets[i])).collect();
        rebuilt.push_str(&rewrite_run(
            &paragraph[run.clone()],
            run.start,
            &pieces,
            &replacements,
        ));
        cursor = run.end;
    }
    rebuilt.push_str(&paragraph[cursor..]);

    Some(rebuilt)
}

/// Splits one run around the markers it carries: literal text keeps the run's own properties,
/// marker text is dropped and each patch is emitted where its marker starts.
fn rewrite_run(
    run: &str,
    run_start: usize,
    elements: &[(&xml::TextElement, usize)],
    replacements: &[(Range<usize>, &[TextRun])],
) -> String {
    let reopen = format!(
        "{}{}",
        xml::opening_tag(run),
        xml::run_properties(run).unwrap_or("")
    );
    let mut out = String::with_capacity(run.len() + 256);
    let mut cursor = 0;

    for (element, offset) in elements {
        let local = element.range.start - run_start..element.range.end - run_start;
        out.push_str(&run[cursor..local.start]);

        let text = &element.text;
        let end = offset + text.len();
        let mut at = *offset;
        while at < end {
            let inside = replacements
                .iter()
                .find(|(span, _)| span.start <= at && at < span.end);
            match inside {
                Some((span, runs)) => {
                    // A marker split over several runs is emitted by the run where it starts.
                    if span.start == at {
                        out.push_str("</w:r>");
                        for patch_run in runs.iter() {
                            out.push_str(&run_xml(patch_run));
                        }
                        out.push_str(&reopen);
                    }
                    at = span.end.min(end);
                }
                None => {
                    let next = replacements
                        .iter()
                        .map(|(span, _)| span.start)
                        .filter(|&start| start > at && start < end)
                        .min()
                        .unwrap_or(end);
                    out.push_str("<w:t xml:space=\"preserve\">");
                    out.push_str(&xml::escape_xml(&text[at - offset..next - offset]));
                    out.push_str("</w:t>");
                    at = next;
                }
            }
        }
        cursor = local.end;
    }
    out.push_str(&run[cursor..]);

    out.replace(&format!("{}</w:r>", reopen), "")
}

/// Text content with `\n` rendered as line breaks.
fn push_text(out: &mut String, text: &str) {
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push_str("<w:br/>");
        }
        if !line.is_empty() {
            out.push_str("<w:t xml:space=\"preserve\">");
            out.push_str(&xml::escape_xml(line));
            out.push_str("</w:t>");
        }
    }
}

pub fn run_properties_xml(style: &RunStyle) -> String {
    let font = xml::escape_xml(&style.font);
    let size = style.half_points();
    let bold = if style.bold { "<w:b/><w:bCs/>" } else { "" };
    format!(
        "<w:rPr><w:rFonts w:ascii=\"{font}\" w:hAnsi=\"{font}\" w:eastAsia=\"{font}\" w:cs=\"{font}\"/>{bold}<w:color w:val=\"{color}\"/><w:sz w:val=\"{size}\"/><w:szCs w:val=\"{size}\"/></w:rPr>",
        font = font,
        bold = bold,
        color = xml::escape_xml(&style.color),
        size = size,
    )
}

pub fn run_xml(run: &TextRun) -> String {
    let mut out = String::from("<w:r>");
    out.push_str(&run_properties_xml(&run.style));
    push_text(&mut out, &run.text);
    out.push_str("</w:r>");
    out
}

fn block_paragraph_xml(paragraph: &BlockParagraph, bullets: Option<&BulletNumbering>) -> String {
    let mut out = String::from("<w:p>");
    if let (Some(level), Some(numbering)) = (paragraph.bullet_level, bullets) {
        out.push_str(&format!(
            "<w:pPr><w:numPr><w:ilvl w:val=\"{}\"/><w:numId w:val=\"{}\"/></w:numPr></w:pPr>",
            level.min(8),
            numbering.num_id
        ));
    }
    for run in &paragraph.runs {
        out.push_str(&run_xml(run));
    }
    out.push_str("</w:p>");
    out
}
