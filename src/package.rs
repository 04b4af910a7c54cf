//! DOCX container I/O.
//!
//! Reading pulls out the main document part as text. Writing rebuilds the
//! zip from the original archive: every other entry is raw-copied
//! (compressed bytes and header untouched) in its original position, and
//! only the main part is re-encoded.

use crate::error::FillError;
use lazy_static::lazy_static;
use regex::Regex;
use std::io::{Cursor, Read, Seek, Write};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Part name used when `[Content_Types].xml` does not declare one.
pub const DEFAULT_MAIN_PART: &str = "word/document.xml";

const CONTENT_TYPES: &str = "[Content_Types].xml";

lazy_static! {
    static ref OVERRIDE_RE: Regex = Regex::new(r#"<Override\s+([^>]+?)/?>"#).unwrap();
    static ref PART_NAME_RE: Regex = Regex::new(r#"PartName="/?([^"]+)""#).unwrap();
    static ref CONTENT_TYPE_RE: Regex = Regex::new(r#"ContentType="([^"]+)""#).unwrap();
}

/// Find the main document part declared in `[Content_Types].xml`.
///
/// Matches the document, template and macro-enabled variants, all of which
/// end in `.main+xml` and name the wordprocessing vocabulary.
fn locate_main_part(content_types: &str) -> Option<String> {
    OVERRIDE_RE.captures_iter(content_types).find_map(|caps| {
        let attrs = &caps[1];
        let content_type = CONTENT_TYPE_RE.captures(attrs)?;
        let content_type = content_type.get(1)?.as_str();
        let is_main = content_type.ends_with(".main+xml")
            && (content_type.contains("wordprocessingml") || content_type.contains("ms-word"));
        if !is_main {
            return None;
        }
        PART_NAME_RE
            .captures(attrs)
            .map(|c| c[1].to_string())
    })
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, FillError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(FillError::corrupt(format!("{}: {}", name, e))),
    };
    let mut data = Vec::new();
    entry
        .read_to_end(&mut data)
        .map_err(|e| FillError::corrupt(format!("{}: {}", name, e)))?;
    Ok(Some(data))
}

/// An opened DOCX container.
#[derive(Debug, Clone)]
pub struct Package {
    bytes: Vec<u8>,
    main_part: String,
    entry_count: usize,
}

impl Package {
    /// Open a container, returning it together with the main part's XML.
    pub fn open(bytes: Vec<u8>) -> Result<(Self, String), FillError> {
        let (main_part, xml, entry_count) = {
            let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice()))
                .map_err(|e| FillError::corrupt(format!("not a zip archive: {}", e)))?;

            let main_part = read_entry(&mut archive, CONTENT_TYPES)?
                .and_then(|data| locate_main_part(&String::from_utf8_lossy(&data)))
                .unwrap_or_else(|| DEFAULT_MAIN_PART.to_string());

            let xml = read_entry(&mut archive, &main_part)?.ok_or_else(|| {
                FillError::corrupt(format!("missing main document part {}", main_part))
            })?;
            let xml = String::from_utf8(xml)
                .map_err(|_| FillError::corrupt(format!("{} is not valid UTF-8", main_part)))?;

            (main_part, xml, archive.len())
        };

        Ok((
            Self {
                bytes,
                main_part,
                entry_count,
            },
            xml,
        ))
    }

    /// Zip entry name of the main document part.
    pub fn main_part(&self) -> &str {
        &self.main_part
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Assemble a new container with `main_xml` as the main part.
    ///
    /// The archive is built entirely in memory; bytes are only returned once
    /// the zip has been finished successfully.
    pub fn write(&self, main_xml: &str) -> Result<Vec<u8>, FillError> {
        let write_err = |e: &dyn std::fmt::Display| FillError::write_failure(e.to_string());

        let mut archive =
            ZipArchive::new(Cursor::new(self.bytes.as_slice())).map_err(|e| write_err(&e))?;
        let mut zip = ZipWriter::new(Cursor::new(Vec::with_capacity(self.bytes.len())));

        // Fixed timestamp keeps repeated runs byte-identical.
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(|e| write_err(&e))?;
            if entry.name() == self.main_part {
                drop(entry);
                zip.start_file(self.main_part.clone(), options)
                    .map_err(|e| write_err(&e))?;
                zip.write_all(main_xml.as_bytes())
                    .map_err(|e| write_err(&e))?;
            } else {
                zip.raw_copy_file(entry).map_err(|e| write_err(&e))?;
            }
        }

        let cursor = zip.finish().map_err(|e| write_err(&e))?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            zip.start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_locate_main_part() {
        let ct = r#"<Types><Default Extension="xml" ContentType="application/xml"/>
            <Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
            <Override ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml" PartName="/word/document2.xml"/></Types>"#;
        assert_eq!(locate_main_part(ct), Some("word/document2.xml".to_string()));
        assert_eq!(locate_main_part("<Types></Types>"), None);
    }

    #[test]
    fn test_open_falls_back_to_default_part() {
        let bytes = build_zip(&[("word/document.xml", "<w:document/>")]);
        let (package, xml) = Package::open(bytes).unwrap();
        assert_eq!(package.main_part(), DEFAULT_MAIN_PART);
        assert_eq!(xml, "<w:document/>");
        assert_eq!(package.entry_count(), 1);
    }

    #[test]
    fn test_open_rejects_non_zip_and_missing_part() {
        let err = Package::open(b"definitely not a zip".to_vec()).unwrap_err();
        assert!(matches!(err, FillError::CorruptPackage { .. }));

        let bytes = build_zip(&[("word/styles.xml", "<styles/>")]);
        let err = Package::open(bytes).unwrap_err();
        assert!(err.to_string().contains("missing main document part"));
    }

    #[test]
    fn test_write_preserves_other_parts_and_order() {
        let bytes = build_zip(&[
            ("[Content_Types].xml", "<Types/>"),
            ("word/document.xml", "<old/>"),
            ("word/media/image1.png", "PNGDATA"),
        ]);
        let (package, _) = Package::open(bytes).unwrap();
        let out = package.write("<new/>").unwrap();

        let mut archive = ZipArchive::new(Cursor::new(out)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["[Content_Types].xml", "word/document.xml", "word/media/image1.png"]
        );
        let mut doc = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut doc)
            .unwrap();
        assert_eq!(doc, "<new/>");
        let mut media = String::new();
        archive
            .by_name("word/media/image1.png")
            .unwrap()
            .read_to_string(&mut media)
            .unwrap();
        assert_eq!(media, "PNGDATA");
    }

    #[test]
    fn test_write_is_deterministic() {
        let bytes = build_zip(&[("word/document.xml", "<old/>")]);
        let (package, _) = Package::open(bytes).unwrap();
        assert_eq!(package.write("<x/>").unwrap(), package.write("<x/>").unwrap());
    }
}
