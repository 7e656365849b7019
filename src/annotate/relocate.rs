use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::summary::RiskClause;
use crate::utils::{collapse_whitespace, escape_html};

/// Clauses shorter than this (trimmed, in characters) are not searched for.
pub const MIN_CLAUSE_CHARS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// `>> [RISK - HIGH] clause <<`
    PlainMarker,
    /// `<mark class="risk-highlight risk-high" title="...">clause</mark>`; text must be HTML-escaped.
    HtmlMark,
}

/// A located occurrence of a risk clause, as byte offsets into the searched text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpan<'a> {
    pub start: usize,
    pub end: usize,
    pub risk: &'a RiskClause,
}

impl MatchSpan<'_> {
    fn overlaps(&self, start: usize, end: usize) -> bool {
        start < self.end && self.start < end
    }
}

/// Regex source matching `clause` with any whitespace run widened to `\s+`.
///
/// Returns `None` when the clause has no non-whitespace content.
pub fn clause_pattern(clause: &str) -> Option<String> {
    let tokens: Vec<String> = clause.split_whitespace().map(regex::escape).collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(r"\s+"))
    }
}

fn compile_clause(clause: &str) -> Option<Regex> {
    let pattern = clause_pattern(clause)?;
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => Some(re),
        Err(e) => {
            debug!(error = %e, "Skipping clause with unusable pattern");
            None
        }
    }
}

/// The form of the clause that is searched for under `mode`.
fn search_form(clause: &str, mode: RenderMode) -> Option<String> {
    let trimmed = clause.trim();
    if trimmed.chars().count() < MIN_CLAUSE_CHARS {
        return None;
    }
    match mode {
        RenderMode::PlainMarker => Some(trimmed.to_string()),
        RenderMode::HtmlMark => {
            let escaped = escape_html(&collapse_whitespace(trimmed));
            (escaped.chars().count() >= MIN_CLAUSE_CHARS).then_some(escaped)
        }
    }
}

/// Find non-overlapping occurrences of every clause, longest clause first.
///
/// A match that would overlap a span already claimed by a longer clause is dropped.
/// The result is ordered by position.
pub fn locate<'a>(text: &str, risks: &'a [RiskClause], mode: RenderMode) -> Vec<MatchSpan<'a>> {
    let mut ordered: Vec<&RiskClause> = risks.iter().collect();
    ordered.sort_by_key(|r| std::cmp::Reverse(r.clause_text.trim().chars().count()));

    let mut spans: Vec<MatchSpan<'a>> = Vec::new();

    for risk in ordered {
        let Some(form) = search_form(&risk.clause_text, mode) else {
            continue;
        };
        let Some(re) = compile_clause(&form) else {
            continue;
        };

        let mut pos = 0;
        while pos < text.len() {
            let Some(m) = re.find_at(text, pos) else {
                break;
            };
            let splits_entity = mode == RenderMode::HtmlMark
                && (inside_entity(text, m.start()) || inside_entity(text, m.end()));
            if splits_entity || spans.iter().any(|s| s.overlaps(m.start(), m.end())) {
                pos = next_char_boundary(text, m.start());
                continue;
            }
            spans.push(MatchSpan {
                start: m.start(),
                end: m.end(),
                risk,
            });
            pos = m.end();
        }
    }

    spans.sort_by_key(|s| s.start);
    spans
}

/// True when byte `idx` of escaped text falls strictly inside an `&...;` entity.
///
/// Escaped text has no bare `&`, so the nearest `&` or `;` before `idx` decides.
fn inside_entity(text: &str, idx: usize) -> bool {
    matches!(text[..idx].rfind(|c| c == '&' || c == ';'), Some(pos) if text.as_bytes()[pos] == b'&')
}

fn next_char_boundary(text: &str, idx: usize) -> usize {
    idx + text[idx..].chars().next().map(char::len_utf8).unwrap_or(1)
}

/// Wrap every located clause in `text` with markers for `mode`.
///
/// Only insertions happen; everything outside the markers is copied verbatim.
pub fn relocate(text: &str, risks: &[RiskClause], mode: RenderMode) -> String {
    let spans = locate(text, risks, mode);
    render_spans(text, &spans, mode)
}

/// Escape raw document text and highlight risk clauses with `<mark>` elements.
pub fn highlight_html(raw_text: &str, risks: &[RiskClause]) -> String {
    relocate(&escape_html(raw_text), risks, RenderMode::HtmlMark)
}

fn render_spans(text: &str, spans: &[MatchSpan<'_>], mode: RenderMode) -> String {
    let mut out = String::with_capacity(text.len() + spans.len() * 64);
    let mut last = 0;

    for span in spans {
        out.push_str(&text[last..span.start]);
        match mode {
            RenderMode::PlainMarker => {
                out.push_str(">> [RISK - ");
                out.push_str(&span.risk.risk_level.as_str().to_uppercase());
                out.push_str("] ");
                out.push_str(&text[span.start..span.end]);
                out.push_str(" <<");
            }
            RenderMode::HtmlMark => {
                out.push_str(&format!(
                    r#"<mark class="risk-highlight {}" title="{}">"#,
                    span.risk.risk_level.css_class(),
                    escape_html(&span.risk.description)
                ));
                out.push_str(&text[span.start..span.end]);
                out.push_str("</mark>");
            }
        }
        last = span.end;
    }
    out.push_str(&text[last..]);
    out
}
