//! Re-anchoring flagged clauses in the source text and shaping it for display.

pub mod relocate;
pub mod structure;

pub use relocate::{clause_pattern, highlight_html, locate, relocate, MatchSpan, RenderMode, MIN_CLAUSE_CHARS};
pub use structure::structure;
