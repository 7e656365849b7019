pub mod text_processor;

pub use text_processor::{collapse_whitespace, escape_html, excerpt, normalize, truncate_chars, word_count};
