//! Multi-format document extraction, dispatched by file extension.
//!
//! Binary formats (PDF, DOCX) decode to plain UTF-8 text with layout
//! discarded; `.txt` reads literally; `.json` parses into a structured tree
//! and never falls back to plain text. Everything else is rejected as
//! unsupported.

use std::io::Read;
use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};

/// Maximum decompressed bytes read from the DOCX document part (zip-bomb
/// protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Normalized extractor output: a flat text body or a parsed JSON tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedDocument {
    Text(String),
    Structured(Value),
}

/// Extract a staged file into text or a structured tree.
pub fn extract(path: &Path) -> Result<ExtractedDocument> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => {
            let bytes = std::fs::read(path)?;
            extract_pdf(&bytes).map(ExtractedDocument::Text)
        }
        "docx" => {
            let bytes = std::fs::read(path)?;
            extract_docx(&bytes).map(ExtractedDocument::Text)
        }
        "txt" => Ok(ExtractedDocument::Text(std::fs::read_to_string(path)?)),
        "json" => {
            let raw = std::fs::read_to_string(path)?;
            let value: Value = serde_json::from_str(&raw)
                .map_err(|e| Error::MalformedInput(format!("invalid JSON: {}", e)))?;
            Ok(ExtractedDocument::Structured(value))
        }
        "" => Err(Error::UnsupportedFormat("(no extension)".to_string())),
        other => Err(Error::UnsupportedFormat(format!(".{}", other))),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| Error::Extract(format!("pdf: {}", e)))
}

/// Pull the raw text out of a DOCX archive: read `word/document.xml`
/// (size-bounded) and collect the `<w:t>` text runs, separating paragraphs
/// with a space.
fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| Error::Extract(format!("docx: {}", e)))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|e| Error::Extract(format!("docx: word/document.xml: {}", e)))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| Error::Extract(format!("docx: {}", e)))?;
    }
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(Error::Extract(
            "docx: word/document.xml exceeds size limit".to_string(),
        ));
    }

    collect_text_runs(&doc_xml)
}

fn collect_text_runs(xml: &[u8]) -> Result<String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text_run => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"t" => in_text_run = false,
                    // paragraph boundary: keep words from fusing
                    b"p" => {
                        if !out.is_empty() && !out.ends_with(' ') {
                            out.push(' ');
                        }
                    }
                    _ => {}
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(Error::Extract(format!("docx: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, contents: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::File::create(&path)
            .unwrap()
            .write_all(contents)
            .unwrap();
        (dir, path)
    }

    #[test]
    fn unsupported_extension_is_rejected_by_name() {
        let (_dir, path) = temp_file("payload.xyz", b"whatever");
        let err = extract(&path).unwrap_err();
        match err {
            Error::UnsupportedFormat(ext) => assert_eq!(ext, ".xyz"),
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
    }

    #[test]
    fn missing_extension_is_unsupported() {
        let (_dir, path) = temp_file("payload", b"whatever");
        assert!(matches!(
            extract(&path).unwrap_err(),
            Error::UnsupportedFormat(_)
        ));
    }

    #[test]
    fn txt_reads_literal_contents() {
        let (_dir, path) = temp_file("note.txt", b"plain  text body");
        assert_eq!(
            extract(&path).unwrap(),
            ExtractedDocument::Text("plain  text body".to_string())
        );
    }

    #[test]
    fn json_parses_into_a_tree() {
        let (_dir, path) = temp_file("data.json", br#"{"a": 1}"#);
        match extract(&path).unwrap() {
            ExtractedDocument::Structured(value) => assert_eq!(value["a"], 1),
            other => panic!("expected structured output, got {:?}", other),
        }
    }

    #[test]
    fn malformed_json_does_not_fall_back_to_text() {
        let (_dir, path) = temp_file("data.json", b"{not json");
        assert!(matches!(
            extract(&path).unwrap_err(),
            Error::MalformedInput(_)
        ));
    }

    #[test]
    fn invalid_pdf_bytes_fail_extraction() {
        let (_dir, path) = temp_file("doc.pdf", b"not a pdf");
        assert!(matches!(extract(&path).unwrap_err(), Error::Extract(_)));
    }

    #[test]
    fn invalid_zip_fails_docx_extraction() {
        let (_dir, path) = temp_file("doc.docx", b"not a zip");
        assert!(matches!(extract(&path).unwrap_err(), Error::Extract(_)));
    }

    #[test]
    fn docx_text_runs_are_collected_across_paragraphs() {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file(
                "word/document.xml",
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
            let xml = "<?xml version=\"1.0\"?>\
                <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
                <w:body>\
                <w:p><w:r><w:t>first para</w:t></w:r></w:p>\
                <w:p><w:r><w:t>second para</w:t></w:r></w:p>\
                </w:body></w:document>";
            std::io::Write::write_all(&mut zip, xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        let (_dir, path) = temp_file("doc.docx", &buf);
        match extract(&path).unwrap() {
            ExtractedDocument::Text(text) => {
                assert_eq!(text, "first para second para");
            }
            other => panic!("expected text, got {:?}", other),
        }
    }
}
