//! Just enough WordprocessingML scanning to find markers: the paragraph tree, the runs and
//! text a paragraph owns itself, and the bits of markup carried over when a run is split.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static PARAGRAPH_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(/?)w:p(?:\s[^>]*?)?(/?)>").expect("paragraph tag pattern is valid")
});

static RUN_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(/?)w:r(?:\s[^>]*?)?(/?)>").expect("run tag pattern is valid")
});

static TEXT_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>").expect("text element pattern is valid")
});

static PARAGRAPH_PROPERTIES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*(<w:pPr(?:\s[^>]*)?>.*?</w:pPr>|<w:pPr\s*/>)")
        .expect("paragraph properties pattern is valid")
});

static RUN_PROPERTIES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*(<w:rPr(?:\s[^>]*)?>.*?</w:rPr>|<w:rPr\s*/>)")
        .expect("run properties pattern is valid")
});

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("marker pattern is valid")
});

/// A `{{key}}` occurrence inside a paragraph's visible text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerMatch {
    pub key: String,
    pub span: Range<usize>,
}

/// A `w:p` element and the paragraphs nested in it, e.g. through a text box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphNode {
    pub range: Range<usize>,
    pub children: Vec<ParagraphNode>,
}

/// A `w:t` element owned by a paragraph, with its decoded text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextElement {
    pub range: Range<usize>,
    pub text: String,
}

/// Top-level paragraphs of `xml` in document order, each with its nested paragraphs.
///
/// Unclosed paragraphs are dropped.
pub fn paragraph_tree(xml: &str) -> Vec<ParagraphNode> {
    let mut stack: Vec<(usize, Vec<ParagraphNode>)> = Vec::new();
    let mut roots = Vec::new();

    for caps in PARAGRAPH_TAG.captures_iter(xml) {
        let Some(tag) = caps.get(0) else { continue };
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let self_closing = caps.get(2).is_some_and(|m| !m.as_str().is_empty());

        let node = if self_closing {
            ParagraphNode {
                range: tag.range(),
                children: Vec::new(),
            }
        } else if closing {
            let Some((start, children)) = stack.pop() else {
                continue;
            };
            ParagraphNode {
                range: start..tag.end(),
                children,
            }
        } else {
            stack.push((tag.start(), Vec::new()));
            continue;
        };

        match stack.last_mut() {
            Some((_, siblings)) => siblings.push(node),
            None => roots.push(node),
        }
    }

    roots
}

/// Ranges of the paragraphs nested inside `paragraph`, relative to it.
pub fn nested_paragraphs(paragraph: &str) -> Vec<Range<usize>> {
    paragraph_tree(paragraph)
        .into_iter()
        .next()
        .map(|node| node.children.into_iter().map(|child| child.range).collect())
        .unwrap_or_default()
}

fn inside(position: usize, ranges: &[Range<usize>]) -> bool {
    ranges.iter().any(|r| r.contains(&position))
}

/// The paragraph's own `w:r` elements, skipping runs of nested paragraphs.
///
/// A run hosting a text box is still one of the paragraph's runs; its range covers the box.
pub fn own_runs(paragraph: &str, nested: &[Range<usize>]) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut open: Option<usize> = None;

    for caps in RUN_TAG.captures_iter(paragraph) {
        let Some(tag) = caps.get(0) else { continue };
        if inside(tag.start(), nested) {
            continue;
        }
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let self_closing = caps.get(2).is_some_and(|m| !m.as_str().is_empty());

        match (closing, self_closing, open) {
            (false, true, None) => runs.push(tag.range()),
            (false, false, None) => open = Some(tag.start()),
            (true, _, Some(start)) => {
                runs.push(start..tag.end());
                open = None;
            }
            _ => {}
        }
    }

    runs
}

/// The paragraph's own `w:t` elements in document order.
pub fn own_text_elements(paragraph: &str, nested: &[Range<usize>]) -> Vec<TextElement> {
    TEXT_ELEMENT
        .captures_iter(paragraph)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if inside(whole.start(), nested) {
                return None;
            }
            Some(TextElement {
                range: whole.range(),
                text: unescape_xml(caps.get(1)?.as_str()),
            })
        })
        .collect()
}

/// Visible text of the paragraph itself, without the text of nested paragraphs.
#[cfg(test)]
pub(crate) fn own_text(paragraph: &str) -> String {
    own_text_elements(paragraph, &nested_paragraphs(paragraph))
        .into_iter()
        .map(|element| element.text)
        .collect()
}

/// Concatenated, unescaped content of every `w:t` element in `xml`.
#[cfg(test)]
pub(crate) fn paragraph_text(xml: &str) -> String {
    TEXT_ELEMENT
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| unescape_xml(m.as_str()))
        .collect()
}

pub fn find_markers(text: &str) -> Vec<MarkerMatch> {
    MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let key = caps.get(1)?;
            Some(MarkerMatch {
                key: key.as_str().to_string(),
                span: whole.range(),
            })
        })
        .collect()
}

/// The start tag of an element, e.g. `<w:p w:rsidR="00A1">`.
pub fn opening_tag(element: &str) -> &str {
    match element.find('>') {
        Some(end) => &element[..=end],
        None => element,
    }
}

/// The paragraph's own `w:pPr`, which directly follows its start tag.
pub fn paragraph_properties(paragraph: &str) -> Option<&str> {
    let body = &paragraph[opening_tag(paragraph).len()..];
    PARAGRAPH_PROPERTIES
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// The run's own `w:rPr`, which directly follows its start tag.
pub fn run_properties(run: &str) -> Option<&str> {
    let body = &run[opening_tag(run).len()..];
    RUN_PROPERTIES
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Whether the markup before and after an element leaves it alone in a table cell or text box,
/// both of which must keep at least one paragraph.
pub fn is_sole_block(preceding: &str, following: &str) -> bool {
    let following = following.trim_start();
    if !(following.starts_with("</w:tc>") || following.starts_with("</w:txbxContent>")) {
        return false;
    }

    let preceding = preceding.trim_end();
    if preceding.ends_with("</w:tcPr>") {
        return true;
    }
    match preceding.rfind('<') {
        Some(start) if preceding.ends_with('>') => {
            let tag = &preceding[start..];
            is_start_tag(tag, "w:tc") || is_start_tag(tag, "w:txbxContent")
        }
        _ => false,
    }
}

fn is_start_tag(tag: &str, name: &str) -> bool {
    tag.strip_prefix('<')
        .and_then(|rest| rest.strip_prefix(name))
        .is_some_and(|rest| {
            let named = rest.starts_with('>') || rest.starts_with(char::is_whitespace);
            named && !rest.ends_with("/>")
        })
}

pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn unescape_xml(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };

        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };

        match decoded {
            Some(c) => out.push(c),
            None => out.push_str(&tail[..=semi]),
        }
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    out
}
