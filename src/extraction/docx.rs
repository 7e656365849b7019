use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use std::io::{Cursor, Read};
use tracing::info;
use zip::ZipArchive;

use super::{ExtractionError, TextExtractor};
use crate::utils::normalize;

const DOCUMENT_PART: &str = "word/document.xml";

/// Paragraph text from the main part of a Word document.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn extract(&self, data: &[u8]) -> Result<String, ExtractionError> {
        let xml = read_document_part(data)?;
        let paragraphs = parse_paragraphs(&xml)?;
        info!("Extracted {} paragraphs from DOCX", paragraphs.len());
        Ok(join_paragraphs(&paragraphs))
    }
}

fn read_document_part(data: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| ExtractionError::Docx(format!("not a zip container: {}", e)))?;
    let mut entry = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| ExtractionError::Docx(format!("missing {}: {}", DOCUMENT_PART, e)))?;

    let mut buffer = Vec::new();
    entry
        .read_to_end(&mut buffer)
        .map_err(|e| ExtractionError::Docx(e.to_string()))?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Text of every `w:p`, including empty ones, in the order they close.
///
/// Paragraphs nest inside text boxes (`w:txbxContent`); each open paragraph
/// keeps its own buffer so the enclosing paragraph's runs survive, and the
/// box text comes out as its own paragraph ahead of the one holding it.
fn parse_paragraphs(xml: &str) -> Result<Vec<String>, ExtractionError> {
    let mut reader = XmlReader::from_str(xml);
    reader.trim_text(false);
    let mut buf = Vec::new();

    let mut paragraphs = Vec::new();
    let mut open: Vec<String> = Vec::new();
    let mut run_depth = 0usize;
    let mut text_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"p" => open.push(String::new()),
                b"r" => run_depth += 1,
                b"t" => text_depth += 1,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                // Tab stops inside paragraph properties are also named `tab`
                if let Some(current) = open.last_mut().filter(|_| run_depth > 0) {
                    match e.local_name().as_ref() {
                        b"tab" => current.push('\t'),
                        b"br" | b"cr" => current.push('\n'),
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(current) = open.last_mut().filter(|_| text_depth > 0) {
                    let text = e.unescape().map_err(|e| ExtractionError::Docx(e.to_string()))?;
                    current.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"p" => {
                    if let Some(paragraph) = open.pop() {
                        paragraphs.push(paragraph);
                    }
                }
                b"r" => run_depth = run_depth.saturating_sub(1),
                b"t" => text_depth = text_depth.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractionError::Docx(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

/// Drop blank paragraphs, one paragraph per line, normalize.
pub fn join_paragraphs<S: AsRef<str>>(paragraphs: &[S]) -> String {
    let kept = paragraphs
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>();
    normalize(&kept.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    /// Minimal DOCX container holding one run per paragraph.
    fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| {
                format!(
                    r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
                    p.replace('&', "&amp;").replace('<', "&lt;")
                )
            })
            .collect();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file(DOCUMENT_PART, FileOptions::default()).unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_empty_paragraphs_are_dropped() {
        let data = build_docx(&["", "Hello", "  ", "World"]);
        let text = DocxExtractor.extract(&data).unwrap();
        assert_eq!(text, "Hello\nWorld");
    }

    #[test]
    fn test_runs_tabs_and_breaks() {
        let xml = r#"<w:document xmlns:w="w"><w:body>
            <w:p><w:r><w:t>Rent &amp; fees</w:t></w:r><w:r><w:tab/><w:t>due</w:t></w:r></w:p>
            <w:p><w:r><w:t>Line one</w:t><w:br/><w:t>Line two</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let paragraphs = parse_paragraphs(xml).unwrap();
        assert_eq!(paragraphs, vec!["Rent & fees\tdue", "Line one\nLine two"]);
        assert_eq!(join_paragraphs(&paragraphs), "Rent & fees due\nLine one\nLine two");
    }

    #[test]
    fn test_text_box_keeps_enclosing_paragraph() {
        let xml = r#"<w:document xmlns:w="w"><w:body>
            <w:p><w:r><w:t>Outer start</w:t></w:r><w:r><w:pict><w:txbxContent><w:p><w:r><w:t>Box text</w:t></w:r></w:p></w:txbxContent></w:pict></w:r><w:r><w:t xml:space="preserve"> outer end</w:t></w:r></w:p>
            <w:p><w:r><w:t>After</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let paragraphs = parse_paragraphs(xml).unwrap();
        assert_eq!(paragraphs, vec!["Box text", "Outer start outer end", "After"]);
    }

    #[test]
    fn test_not_a_zip() {
        let err = DocxExtractor.extract(b"plain bytes").unwrap_err();
        assert!(matches!(err, ExtractionError::Docx(_)));
    }
}
