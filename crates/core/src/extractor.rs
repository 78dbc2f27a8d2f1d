use crate::models::DocumentFormat;
use lopdf::Document;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};

/// Why an extraction fell back to lossy decoding instead of structured
/// parsing. Callers never receive an error from this module; the diagnostic
/// lets them and the tests tell a clean extraction from a degraded one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionDiagnostic {
    PdfFallback(String),
    DocxFallback(String),
}

impl ExtractionDiagnostic {
    pub fn reason(&self) -> &str {
        match self {
            ExtractionDiagnostic::PdfFallback(reason) => reason,
            ExtractionDiagnostic::DocxFallback(reason) => reason,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    pub diagnostic: Option<ExtractionDiagnostic>,
}

impl Extraction {
    fn clean(text: String) -> Self {
        Self {
            text,
            diagnostic: None,
        }
    }

    fn degraded(text: String, diagnostic: ExtractionDiagnostic) -> Self {
        Self {
            text,
            diagnostic: Some(diagnostic),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.diagnostic.is_some()
    }
}

/// Best-effort plain-text extraction. Structured parse failures degrade to a
/// lossy UTF-8 decode of the original bytes rather than surfacing an error.
pub fn extract_text(bytes: &[u8], filename: &str) -> Extraction {
    match DocumentFormat::from_filename(filename) {
        DocumentFormat::Pdf => match extract_pdf(bytes) {
            Ok(text) => Extraction::clean(text),
            Err(reason) => {
                Extraction::degraded(lossy_decode(bytes), ExtractionDiagnostic::PdfFallback(reason))
            }
        },
        DocumentFormat::Docx => match extract_docx(bytes) {
            Ok(text) => Extraction::clean(text),
            Err(reason) => Extraction::degraded(
                lossy_decode(bytes),
                ExtractionDiagnostic::DocxFallback(reason),
            ),
        },
        DocumentFormat::PlainText => Extraction::clean(lossy_decode(bytes)),
    }
}

fn lossy_decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn extract_pdf(bytes: &[u8]) -> Result<String, String> {
    let mut document = Document::load_mem(bytes).map_err(|error| error.to_string())?;

    if document.is_encrypted() {
        // Empty-password decryption covers PDFs that are only owner-locked;
        // anything stronger degrades per page below.
        let _ = document.decrypt("");
    }

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        // A page that fails to extract contributes an empty string instead
        // of aborting the whole document.
        let text = document.extract_text(&[page_no]).unwrap_or_default();
        pages.push(text);
    }

    Ok(pages.join("\n").trim().to_string())
}

fn extract_docx(bytes: &[u8]) -> Result<String, String> {
    let cursor = Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor).map_err(|error| error.to_string())?;
    let mut file = archive
        .by_name("word/document.xml")
        .map_err(|error| error.to_string())?;

    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|error| error.to_string())?;

    extract_docx_paragraphs(&xml)
}

/// Pulls the text runs out of a WordprocessingML body: `w:t` holds text,
/// `w:p` closes a paragraph. Empty paragraphs are dropped.
fn extract_docx_paragraphs(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) if element.name().as_ref() == b"w:t" => {
                in_text_run = true;
            }
            Ok(Event::End(element)) => match element.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => {
                    if !current.trim().is_empty() {
                        paragraphs.push(current.trim().to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Text(text)) if in_text_run => {
                let value = text.unescape().map_err(|error| error.to_string())?;
                current.push_str(&value);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(error) => return Err(error.to_string()),
        }
    }

    if !current.trim().is_empty() {
        paragraphs.push(current.trim().to_string());
    }

    Ok(paragraphs.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const DOCUMENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>
    <w:p><w:r><w:t></w:t></w:r></w:p>
    <w:p><w:r><w:t>Second </w:t></w:r><w:r><w:t>paragraph.</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    fn build_docx(document_xml: &str) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            writer
                .start_file("word/document.xml", SimpleFileOptions::default())
                .expect("start zip entry");
            writer
                .write_all(document_xml.as_bytes())
                .expect("write zip entry");
            writer.finish().expect("finish zip");
        }
        buffer.into_inner()
    }

    #[test]
    fn plain_text_decodes_lossily() {
        let bytes = b"hello \xff world";
        let extraction = extract_text(bytes, "notes.txt");
        assert!(!extraction.is_degraded());
        assert!(extraction.text.starts_with("hello "));
        assert!(extraction.text.ends_with(" world"));
    }

    #[test]
    fn unknown_extension_is_treated_as_text() {
        let extraction = extract_text(b"just bytes", "archive.bin");
        assert!(!extraction.is_degraded());
        assert_eq!(extraction.text, "just bytes");
    }

    #[test]
    fn docx_paragraphs_are_joined_with_newlines() {
        let bytes = build_docx(DOCUMENT_XML);
        let extraction = extract_text(&bytes, "report.docx");
        assert!(!extraction.is_degraded());
        assert_eq!(extraction.text, "First paragraph.\nSecond paragraph.");
    }

    #[test]
    fn broken_pdf_falls_back_to_lossy_decode() {
        let extraction = extract_text(b"not a real pdf", "broken.pdf");
        assert!(extraction.is_degraded());
        assert_eq!(extraction.text, "not a real pdf");
        assert!(matches!(
            extraction.diagnostic,
            Some(ExtractionDiagnostic::PdfFallback(_))
        ));
    }

    #[test]
    fn broken_docx_falls_back_to_lossy_decode() {
        let extraction = extract_text(b"not a zip archive", "broken.docx");
        assert!(extraction.is_degraded());
        assert_eq!(extraction.text, "not a zip archive");
    }
}
