use std::panic;
use tracing::{info, warn};

use super::{ExtractionError, TextExtractor};
use crate::utils::normalize;

/// Reads the embedded text layer of a PDF with `pdf-extract`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePdfExtractor;

impl TextExtractor for NativePdfExtractor {
    fn extract(&self, data: &[u8]) -> Result<String, ExtractionError> {
        // pdf-extract panics on some malformed inputs instead of returning an error
        let pages = panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(data))
            .map_err(|_| ExtractionError::Pdf("PDF parser panicked".to_string()))?
            .map_err(|e| ExtractionError::Pdf(e.to_string()))?;

        let total = pages.len();
        let pages = pages_with_text(&pages);
        info!("Extracted text from {} of {} PDF pages", pages.len(), total);

        if pages.is_empty() {
            warn!("PDF appears to be scanned or has no extractable text");
        }

        Ok(join_pages(&pages))
    }
}

/// Trimmed page texts in page order, blank pages dropped.
fn pages_with_text<S: AsRef<str>>(pages: &[S]) -> Vec<&str> {
    pages
        .iter()
        .map(|page| page.as_ref().trim())
        .filter(|page| !page.is_empty())
        .collect()
}

/// Join page texts with a blank line and normalize.
pub(crate) fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let joined = pages
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    normalize(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Single-font PDF with one page per entry; `None` is a page without content.
    fn build_pdf(pages: &[Option<&str>]) -> Vec<u8> {
        let first_page_obj = 4;
        let kids: Vec<String> = (0..pages.len())
            .map(|i| format!("{} 0 R", first_page_obj + 2 * i))
            .collect();

        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), pages.len()),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        ];
        for (i, page) in pages.iter().enumerate() {
            let content_obj = first_page_obj + 2 * i + 1;
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                content_obj
            ));
            let stream = match page {
                Some(text) => format!("BT /F1 24 Tf 72 700 Td ({}) Tj ET", text),
                None => String::new(),
            };
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                stream.len(),
                stream
            ));
        }

        let mut pdf = String::from("%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
        }

        let xref_at = pdf.len();
        pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
        for offset in offsets {
            pdf.push_str(&format!("{:010} 00000 n \n", offset));
        }
        pdf.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        ));
        pdf.into_bytes()
    }

    #[test]
    fn test_pages_joined_with_blank_line() {
        let pdf = build_pdf(&[Some("Page one text"), Some("Page two text")]);
        let text = NativePdfExtractor.extract(&pdf).unwrap();
        assert_eq!(text, "Page one text\n\nPage two text");
    }

    #[test]
    fn test_blank_pages_skipped() {
        let pdf = build_pdf(&[Some("Cover sheet"), None, Some("Signature page")]);
        let text = NativePdfExtractor.extract(&pdf).unwrap();
        assert_eq!(text, "Cover sheet\n\nSignature page");
        assert_eq!(text.split_whitespace().count(), 4);
    }

    #[test]
    fn test_pdf_without_text_layer_is_empty() {
        let pdf = build_pdf(&[None, None]);
        assert_eq!(NativePdfExtractor.extract(&pdf).unwrap(), "");
    }

    #[test]
    fn test_pages_with_text_trims_and_drops_blank() {
        let pages = vec!["\n  Page one \n".to_string(), "   \n".to_string(), "Page three".to_string()];
        assert_eq!(pages_with_text(&pages), vec!["Page one", "Page three"]);
    }

    #[test]
    fn test_join_pages_normalizes() {
        let pages = vec!["Title   line\n\n\n\nBody", "", "Second\tpage"];
        assert_eq!(join_pages(&pages), "Title line\n\nBody\n\nSecond page");
    }

    #[test]
    fn test_garbage_input_is_an_error_not_a_panic() {
        let result = NativePdfExtractor.extract(b"definitely not a pdf");
        assert!(matches!(result, Err(ExtractionError::Pdf(_))));
    }
}
