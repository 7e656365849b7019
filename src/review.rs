//! Request-scoped orchestration: extract, analyze, export.
//!
//! A [`Reviewer`] holds no per-request state and can be shared across threads.
//! Each call owns its bytes and text from start to finish.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::analysis::{AnalysisError, Analyzer};
use crate::export::{self, ExportFormat};
use crate::extraction::{ExtractedDocument, ExtractionError, ExtractionPipeline, ExtractionPreview};
use crate::summary::Summary;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("No readable text found. Supported: PDF, DOCX, PNG, JPG, JPEG, TIFF, BMP.")]
    NoReadableText,

    #[error(
        "OCR is not available ({0}). Install Tesseract and poppler-utils: \
         Linux: sudo apt-get install tesseract-ocr poppler-utils, \
         Mac: brew install tesseract poppler, \
         Windows: https://github.com/UB-Mannheim/tesseract/wiki"
    )]
    OcrUnavailable(String),

    #[error("Could not read text from the image: {0}")]
    OcrFailed(String),

    #[error("Analysis service unavailable: {0}")]
    Configuration(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailure(String),
}

impl ReviewError {
    /// HTTP status a hosting layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ReviewError::NoReadableText => 400,
            ReviewError::OcrFailed(_) => 422,
            ReviewError::OcrUnavailable(_) | ReviewError::Configuration(_) => 503,
            ReviewError::AnalysisFailure(_) => 500,
        }
    }

    /// Process exit code for command-line hosts.
    pub fn exit_code(&self) -> i32 {
        match self {
            ReviewError::AnalysisFailure(_) => 2,
            ReviewError::OcrUnavailable(_) | ReviewError::Configuration(_) => 3,
            ReviewError::NoReadableText | ReviewError::OcrFailed(_) => 4,
        }
    }
}

impl From<ExtractionError> for ReviewError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::OcrUnavailable(msg) => ReviewError::OcrUnavailable(msg),
            ExtractionError::OcrFailed(msg) => ReviewError::OcrFailed(msg),
            ExtractionError::Pdf(_) | ExtractionError::Docx(_) => ReviewError::NoReadableText,
        }
    }
}

impl From<AnalysisError> for ReviewError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::Configuration(msg) => ReviewError::Configuration(msg),
            other => ReviewError::AnalysisFailure(other.to_string()),
        }
    }
}

/// Result of analyzing an uploaded file.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeReport {
    pub filename: String,
    pub full_text: String,
    pub summary: Summary,
    pub char_count: usize,
}

/// Result of analyzing pasted text.
#[derive(Debug, Clone, Serialize)]
pub struct TextReport {
    pub summary: Summary,
    pub char_count: usize,
}

/// A rendered export ready to be written or served.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub filename: String,
    pub media_type: &'static str,
    pub content: String,
}

pub struct Reviewer {
    pipeline: ExtractionPipeline,
    analyzer: Arc<dyn Analyzer>,
}

impl Reviewer {
    pub fn new(pipeline: ExtractionPipeline, analyzer: Arc<dyn Analyzer>) -> Self {
        Self { pipeline, analyzer }
    }

    /// Extract text, failing with [`ReviewError::NoReadableText`] when there is none.
    pub fn extract(&self, filename: &str, data: Vec<u8>) -> Result<ExtractedDocument, ReviewError> {
        let document = self.pipeline.extract_document(filename, data)?;
        if !document.has_text() {
            warn!(filename, format = %document.source_format(), "No readable text");
            return Err(ReviewError::NoReadableText);
        }
        Ok(document)
    }

    pub fn preview(&self, filename: &str, data: Vec<u8>) -> Result<ExtractionPreview, ReviewError> {
        let document = self.extract(filename, data)?;
        Ok(ExtractionPreview::new(filename, document.text()))
    }

    pub fn analyze(&self, filename: &str, data: Vec<u8>) -> Result<AnalyzeReport, ReviewError> {
        let text = self.extract(filename, data)?.into_text();
        let summary = self.run_analysis(&text)?;

        Ok(AnalyzeReport {
            filename: display_name(filename).to_string(),
            char_count: text.chars().count(),
            full_text: text,
            summary,
        })
    }

    pub fn analyze_text(&self, text: &str) -> Result<TextReport, ReviewError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ReviewError::NoReadableText);
        }
        let summary = self.run_analysis(text)?;
        Ok(TextReport {
            summary,
            char_count: text.chars().count(),
        })
    }

    /// Analyze an uploaded file and render it as `format`.
    pub fn export(&self, filename: &str, data: Vec<u8>, format: ExportFormat) -> Result<ExportArtifact, ReviewError> {
        let report = self.analyze(filename, data)?;
        Ok(render_report(&report, format))
    }

    /// Analyze pasted text and render it as `format`.
    pub fn export_text(&self, text: &str, format: ExportFormat) -> Result<ExportArtifact, ReviewError> {
        let text = text.trim();
        let report = self.analyze_text(text)?;
        Ok(build_artifact("document", text, &report.summary, format))
    }

    fn run_analysis(&self, text: &str) -> Result<Summary, ReviewError> {
        info!(characters = text.len(), "Running analysis");
        let summary = self.analyzer.analyze(text).map_err(|e| {
            warn!(error = %e, "Analysis failed");
            ReviewError::from(e)
        })?;
        info!(
            bullets = summary.bullets.len(),
            risks = summary.risks.len(),
            "Analysis finished"
        );
        Ok(summary)
    }
}

/// Render an existing report without running the analysis again.
pub fn render_report(report: &AnalyzeReport, format: ExportFormat) -> ExportArtifact {
    build_artifact(&report.filename, &report.full_text, &report.summary, format)
}

fn display_name(filename: &str) -> &str {
    if filename.trim().is_empty() {
        "document"
    } else {
        filename
    }
}

fn file_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

fn build_artifact(filename: &str, text: &str, summary: &Summary, format: ExportFormat) -> ExportArtifact {
    let stem = file_stem(filename);
    let suffix = match format {
        ExportFormat::Summary => "summary",
        ExportFormat::Text | ExportFormat::Html => "review",
    };

    ExportArtifact {
        filename: format!("{}-{}.{}", stem, suffix, format.file_extension()),
        media_type: format.media_type(),
        content: export::render(format, filename, text, summary),
    }
}
