//! Text extraction from uploaded documents.
//!
//! Dispatch is by filename extension only. PDFs try the embedded text layer
//! first and fall back to OCR of rasterized pages; images go straight to OCR.
//! Only image OCR failures surface as errors: every other failure mode degrades
//! to empty text and is left to the caller to report.

pub mod docx;
pub mod ocr;
pub mod pdf_parser;

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::OcrConfig;
use crate::utils::truncate_chars;

pub use docx::DocxExtractor;
pub use ocr::{ImageOcrExtractor, OcrEngine, PageRasterizer, PdfOcrExtractor, Pdftoppm, TesseractCli};
pub use pdf_parser::NativePdfExtractor;

/// Extensions the pipeline understands, lowercase and without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "png", "jpg", "jpeg", "tiff", "bmp"];

const PREVIEW_CHARS: usize = 1000;

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The OCR engine or page rasterizer cannot be run in this environment.
    #[error("OCR is unavailable: {0}")]
    OcrUnavailable(String),

    /// The engine ran but recognition or image decoding failed.
    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Failed to parse PDF: {0}")]
    Pdf(String),

    #[error("Failed to read DOCX: {0}")]
    Docx(String),
}

/// One extraction strategy: raw bytes in, normalized text out.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, data: &[u8]) -> Result<String, ExtractionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Docx,
    Image,
    Unknown,
}

impl SourceFormat {
    /// Classify by the lowercased extension of `filename`.
    pub fn from_filename(filename: &str) -> Self {
        let ext = match filename.rsplit_once('.') {
            Some((_, ext)) => ext.to_lowercase(),
            None => return SourceFormat::Unknown,
        };
        match ext.as_str() {
            "pdf" => SourceFormat::Pdf,
            "docx" => SourceFormat::Docx,
            "png" | "jpg" | "jpeg" | "tiff" | "bmp" => SourceFormat::Image,
            _ => SourceFormat::Unknown,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, SourceFormat::Unknown)
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceFormat::Pdf => "PDF",
            SourceFormat::Docx => "DOCX",
            SourceFormat::Image => "image",
            SourceFormat::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// An upload after extraction. Immutable once built.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    source_format: SourceFormat,
    raw_bytes: Box<[u8]>,
    text: String,
}

impl ExtractedDocument {
    pub fn source_format(&self) -> SourceFormat {
        self.source_format
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw_bytes
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Short report of an extraction, without the full text.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionPreview {
    pub filename: String,
    pub characters: usize,
    pub preview: String,
}

impl ExtractionPreview {
    pub fn new(filename: &str, text: &str) -> Self {
        Self {
            filename: filename.to_string(),
            characters: text.chars().count(),
            preview: truncate_chars(text, PREVIEW_CHARS).to_string(),
        }
    }
}

/// Routes uploads to the right [`TextExtractor`] and applies the PDF fallback policy.
pub struct ExtractionPipeline {
    pdf_native: Box<dyn TextExtractor>,
    pdf_ocr: Box<dyn TextExtractor>,
    docx: Box<dyn TextExtractor>,
    image_ocr: Box<dyn TextExtractor>,
}

impl ExtractionPipeline {
    /// Default strategies: pdf-extract, pdftoppm + tesseract, zip/XML DOCX reader.
    pub fn new(config: &OcrConfig) -> Self {
        let engine: Arc<dyn OcrEngine> = Arc::new(TesseractCli::from_config(config));
        let rasterizer = Pdftoppm::new(config.pdftoppm_cmd.clone());

        Self {
            pdf_native: Box::new(NativePdfExtractor),
            pdf_ocr: Box::new(PdfOcrExtractor::new(Box::new(rasterizer), engine.clone(), config.dpi)),
            docx: Box::new(DocxExtractor),
            image_ocr: Box::new(ImageOcrExtractor::new(engine, config.contrast_boost)),
        }
    }

    /// Assemble a pipeline from explicit strategies.
    pub fn from_parts(
        pdf_native: Box<dyn TextExtractor>,
        pdf_ocr: Box<dyn TextExtractor>,
        docx: Box<dyn TextExtractor>,
        image_ocr: Box<dyn TextExtractor>,
    ) -> Self {
        Self {
            pdf_native,
            pdf_ocr,
            docx,
            image_ocr,
        }
    }

    /// Extract text from `data`, choosing a strategy from `filename`.
    ///
    /// Unsupported extensions and documents without text both yield an empty
    /// string. Only image OCR errors are returned as `Err`.
    pub fn extract(&self, filename: &str, data: &[u8]) -> Result<String, ExtractionError> {
        let format = SourceFormat::from_filename(filename);
        info!(filename, %format, bytes = data.len(), "Extracting text");

        let text = match format {
            SourceFormat::Pdf => self.extract_pdf(data),
            SourceFormat::Docx => match self.docx.extract(data) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "DOCX extraction failed");
                    String::new()
                }
            },
            SourceFormat::Image => self.image_ocr.extract(data)?,
            SourceFormat::Unknown => {
                debug!(filename, "Unsupported extension, no text extracted");
                String::new()
            }
        };

        info!(characters = text.len(), "Extraction finished");
        Ok(text)
    }

    /// Same dispatch as [`extract`](Self::extract), keeping the bytes and detected format.
    pub fn extract_document(&self, filename: &str, data: Vec<u8>) -> Result<ExtractedDocument, ExtractionError> {
        let text = self.extract(filename, &data)?;
        Ok(ExtractedDocument {
            source_format: SourceFormat::from_filename(filename),
            raw_bytes: data.into_boxed_slice(),
            text,
        })
    }

    fn extract_pdf(&self, data: &[u8]) -> String {
        let native = match self.pdf_native.extract(data) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Native PDF extraction failed");
                String::new()
            }
        };

        if !native.trim().is_empty() {
            return native;
        }

        info!("PDF appears to be scanned, attempting OCR...");
        match self.pdf_ocr.extract(data) {
            Ok(text) => text,
            Err(e) => {
                // No alternative left for this PDF; the caller sees empty text.
                warn!(error = %e, "PDF OCR fallback unavailable");
                String::new()
            }
        }
    }
}
