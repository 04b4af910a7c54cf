//! In-memory DOCX fixtures shared by the integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

pub const MEDIA: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 1, 2, 3, 250, 251];

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Full `word/document.xml` around `body`.
pub fn document_xml(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n<w:document xmlns:w=\"{}\"><w:body>{}<w:sectPr><w:pgSz w:w=\"12240\" w:h=\"15840\"/></w:sectPr></w:body></w:document>",
        W_NS, body
    )
}

/// A minimal DOCX with `body` as the document body and one media part.
pub fn build_docx(body: &str) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let document = document_xml(body);
    let entries: [(&str, &[u8], SimpleFileOptions); 4] = [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes(), deflated),
        ("_rels/.rels", ROOT_RELS.as_bytes(), deflated),
        ("word/document.xml", document.as_bytes(), deflated),
        ("word/media/image1.png", MEDIA, stored),
    ];
    for (name, data, options) in entries {
        zip.start_file(name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Raw bytes of one entry.
pub fn entry(docx: &[u8], name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(Cursor::new(docx)).unwrap();
    let mut data = Vec::new();
    archive.by_name(name).unwrap().read_to_end(&mut data).unwrap();
    data
}

pub fn entry_names(docx: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(docx)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

pub fn main_part(docx: &[u8]) -> String {
    String::from_utf8(entry(docx, "word/document.xml")).unwrap()
}

/// `<w:r>` holding `text`, optionally with run properties.
pub fn run(rpr: &str, text: &str) -> String {
    let rpr = if rpr.is_empty() {
        String::new()
    } else {
        format!("<w:rPr>{}</w:rPr>", rpr)
    };
    format!("<w:r>{}<w:t xml:space=\"preserve\">{}</w:t></w:r>", rpr, text)
}

pub fn para(runs: &[String]) -> String {
    format!("<w:p>{}</w:p>", runs.concat())
}

/// Numbered list paragraph (`numId` 1).
pub fn list_para(runs: &[String]) -> String {
    format!(
        "<w:p><w:pPr><w:pStyle w:val=\"ListParagraph\"/><w:numPr><w:ilvl w:val=\"0\"/><w:numId w:val=\"1\"/></w:numPr></w:pPr>{}</w:p>",
        runs.concat()
    )
}

/// Logical text of every paragraph in the generated document.
pub fn paragraph_texts(docx: &[u8]) -> Vec<String> {
    let document = docx_fill::Document::open(docx.to_vec()).unwrap();
    document
        .paragraphs()
        .into_iter()
        .map(|p| {
            docx_fill::tokenizer::logical_text(document.tree(), p.node)
                .text()
                .to_string()
        })
        .collect()
}
