// Library exports for the CLI binaries and integration tests

pub mod analysis;
pub mod annotate;
pub mod config;
pub mod export;
pub mod extraction;
pub mod review;
pub mod summary;
pub mod utils;

// Re-export commonly used types
pub use analysis::{AnalysisError, Analyzer, LazyAnalyzer, OpenAiAnalyzer};
pub use annotate::{locate, relocate, structure, MatchSpan, RenderMode};
pub use config::ReviewConfig;
pub use export::ExportFormat;
pub use extraction::{ExtractedDocument, ExtractionError, ExtractionPipeline, SourceFormat, TextExtractor};
pub use review::{ReviewError, Reviewer};
pub use summary::{RiskClause, RiskLevel, SafetyScore, Summary};
pub use utils::normalize;
