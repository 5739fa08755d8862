#![allow(dead_code)]

use async_trait::async_trait;
use certgen::core::Converter;
use certgen::Result;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const CONTENT_TYPES: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>",
    "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">",
    "<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>",
    "<Default Extension=\"xml\" ContentType=\"application/xml\"/>",
    "<Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>",
    "</Types>"
);

const PACKAGE_RELS: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>",
    "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"word/document.xml\"/>",
    "</Relationships>"
);

const DOCUMENT_RELS: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>",
    "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    "</Relationships>"
);

/// Paragraph whose text is split over two runs, the way Word often stores edited markers.
pub fn split_paragraph(text: &str) -> String {
    let (head, tail) = text.split_at(text.len() / 2);
    format!(
        "<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
        head, tail
    )
}

pub fn paragraph(text: &str) -> String {
    format!(
        "<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
        text
    )
}

pub fn docx(paragraphs: &[String]) -> Vec<u8> {
    let document = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        paragraphs.concat()
    );

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        ("word/document.xml", document.as_str()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS),
    ] {
        zip.start_file(name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Certificate template carrying every marker of the standard layout.
pub fn standard_template() -> Vec<u8> {
    docx(&[
        paragraph("Certificate of Participation"),
        split_paragraph("{{name}}"),
        paragraph("Dear {{vorname}}, you completed the {{track}} track."),
        paragraph("{{workshops}}"),
        paragraph("{{workshopsList}}"),
        paragraph("Issued on {{date}}"),
    ])
}

pub fn comment_template() -> Vec<u8> {
    docx(&[
        paragraph("{{date}}"),
        paragraph("Hello {{firstName}},"),
        paragraph("{{comment}}"),
    ])
}

/// Lays out `templates/` under a base directory.
pub fn install_template(base: &Path, name: &str, bytes: &[u8]) {
    let dir = base.join("templates");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{}.docx", name)), bytes).unwrap();
}

pub fn document_xml(docx: &[u8]) -> String {
    let mut archive = ZipArchive::new(Cursor::new(docx)).unwrap();
    let mut file = archive.by_name("word/document.xml").unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    content
}

pub fn has_entry(docx: &[u8], name: &str) -> bool {
    ZipArchive::new(Cursor::new(docx))
        .unwrap()
        .by_name(name)
        .is_ok()
}

/// Stands in for LibreOffice: "converts" by prefixing the input size.
#[derive(Clone, Default)]
pub struct FakeConverter {
    pub calls: Arc<AtomicUsize>,
}

impl FakeConverter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Converter for FakeConverter {
    async fn convert(&self, document: &[u8], target_format: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("%{} {} bytes", target_format.to_uppercase(), document.len()).into_bytes())
    }
}

/// Converter that never answers.
pub struct StuckConverter;

#[async_trait]
impl Converter for StuckConverter {
    async fn convert(&self, _document: &[u8], _target_format: &str) -> Result<Vec<u8>> {
        std::future::pending().await
    }
}
