//! The analysis capability: document text in, [`Summary`] out.
//!
//! The model is asked for JSON, and the reply is decoded into typed structs
//! before anything else sees it. A payload missing required fields or carrying
//! an unknown risk level is rejected as a whole.

pub mod openai;

use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::AnalysisConfig;
use crate::summary::{RiskClause, RiskLevel, Summary};
use crate::utils::word_count;

pub use openai::OpenAiAnalyzer;

pub const SYSTEM_PROMPT: &str = r#"You are a document review assistant helping users understand long documents before signing.

For each document:
1. Give a clear bullet-point summary (5-12 bullets) of main points, parties, obligations, deadlines, and key terms.
2. Flag unusual, one-sided, or risky clauses. For each: quote the clause exactly as written, assign risk level (low/medium/high), explain the concern.
3. Identify document type if possible (e.g., lease, NDA, employment agreement). Use "Unknown" otherwise.
4. List questions the reader should ask before signing.

Respond ONLY with valid JSON:
{
  "summary": ["bullet 1", "bullet 2", ...],
  "document_type": "type or null",
  "flagged_risks": [
    {"clause": "exact quote", "risk_level": "low|medium|high", "description": "why concerning"}
  ],
  "questions_to_ask": ["question 1", ...]
}

Be thorough but concise. Flag genuinely concerning clauses, not normal boilerplate."#;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The capability cannot be constructed (missing credential, bad settings).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network failure or non-success response.
    #[error("Analysis request failed: {0}")]
    Request(String),

    /// The model replied with something that does not decode into a summary.
    #[error("Invalid analysis response: {0}")]
    InvalidResponse(String),
}

impl AnalysisError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, AnalysisError::Configuration(_))
    }
}

/// Summarizes document text and flags risky clauses.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Result<Summary, AnalysisError>;
}

#[derive(Debug, Deserialize)]
struct RawSummary {
    summary: Vec<String>,
    #[serde(default)]
    document_type: Option<String>,
    #[serde(default)]
    flagged_risks: Vec<RawRisk>,
    #[serde(default)]
    questions_to_ask: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawRisk {
    clause: String,
    risk_level: RiskLevel,
    description: String,
}

/// Strip a surrounding Markdown code fence, if the model added one.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Decode a model reply into a [`Summary`]; `word_count` comes from `source_text`.
pub fn decode_summary(content: &str, source_text: &str) -> Result<Summary, AnalysisError> {
    let raw: RawSummary = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;

    let bullets = raw
        .summary
        .into_iter()
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect();

    let document_type = raw
        .document_type
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("null"));

    let risks = raw
        .flagged_risks
        .into_iter()
        .map(|r| RiskClause::new(r.clause, r.risk_level, r.description))
        .collect();

    let questions_to_ask = raw
        .questions_to_ask
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();

    Ok(Summary {
        bullets,
        document_type,
        risks,
        word_count: word_count(source_text),
        questions_to_ask,
    })
}

type AnalyzerInit = Box<dyn Fn() -> Result<Arc<dyn Analyzer>, AnalysisError> + Send + Sync>;

/// An [`Analyzer`] built on first use and shared afterwards.
///
/// Construction runs at most once even under concurrent first calls. A failed
/// construction is remembered and reported as a configuration error on every call.
pub struct LazyAnalyzer {
    init: AnalyzerInit,
    cell: OnceCell<Result<Arc<dyn Analyzer>, String>>,
}

impl LazyAnalyzer {
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Analyzer>, AnalysisError> + Send + Sync + 'static,
    {
        Self {
            init: Box::new(init),
            cell: OnceCell::new(),
        }
    }

    /// Lazily construct an [`OpenAiAnalyzer`] from `config`.
    pub fn openai(config: AnalysisConfig) -> Self {
        Self::new(move || {
            let analyzer: Arc<dyn Analyzer> = Arc::new(OpenAiAnalyzer::new(&config)?);
            Ok(analyzer)
        })
    }

    fn get(&self) -> Result<&Arc<dyn Analyzer>, AnalysisError> {
        self.cell
            .get_or_init(|| {
                info!("Initializing analysis client");
                (self.init)().map_err(|e| match e {
                    AnalysisError::Configuration(msg) => msg,
                    other => other.to_string(),
                })
            })
            .as_ref()
            .map_err(|msg| AnalysisError::Configuration(msg.clone()))
    }
}

impl Analyzer for LazyAnalyzer {
    fn analyze(&self, text: &str) -> Result<Summary, AnalysisError> {
        self.get()?.analyze(text)
    }
}
