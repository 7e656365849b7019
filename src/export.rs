//! Downloadable renderings of a review.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::annotate::{highlight_html, relocate, structure, RenderMode};
use crate::summary::Summary;
use crate::utils::{escape_html, excerpt};

const SUMMARY_CLAUSE_CHARS: usize = 500;
const ANNOTATED_CLAUSE_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Markdown-style summary without the document text.
    Summary,
    /// Document text with inline risk markers, followed by the summary.
    Text,
    /// Standalone HTML page with highlighted clauses.
    Html,
}

impl ExportFormat {
    pub fn file_extension(&self) -> &'static str {
        match self {
            ExportFormat::Summary | ExportFormat::Text => "txt",
            ExportFormat::Html => "html",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            ExportFormat::Summary | ExportFormat::Text => "text/plain; charset=utf-8",
            ExportFormat::Html => "text/html; charset=utf-8",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" | "md" => Ok(ExportFormat::Summary),
            "text" | "txt" => Ok(ExportFormat::Text),
            "html" => Ok(ExportFormat::Html),
            other => Err(format!("unknown export format: {}", other)),
        }
    }
}

/// Render `summary` (and, where the format includes it, `text`) as `format`.
pub fn render(format: ExportFormat, title: &str, text: &str, summary: &Summary) -> String {
    match format {
        ExportFormat::Summary => summary_text(summary),
        ExportFormat::Text => annotated_text(text, summary),
        ExportFormat::Html => annotated_html(title, text, summary),
    }
}

/// Markdown-ish summary: key points, document type, flagged risks with quoted clauses.
pub fn summary_text(summary: &Summary) -> String {
    let mut lines = vec![
        "# Document Summary".to_string(),
        String::new(),
        "## Key Points".to_string(),
        String::new(),
    ];
    for bullet in &summary.bullets {
        lines.push(format!("- {}", bullet));
    }
    lines.push(String::new());

    if let Some(doc_type) = &summary.document_type {
        lines.push(format!("**Document type:** {}", doc_type));
        lines.push(String::new());
    }

    if !summary.risks.is_empty() {
        lines.push("## Flagged Risks".to_string());
        lines.push(String::new());
        for (i, risk) in summary.risks.iter().enumerate() {
            lines.push(format!(
                "### {}. [{}] {}",
                i + 1,
                risk.risk_level.as_str().to_uppercase(),
                risk.description
            ));
            lines.push(String::new());
            lines.push(format!("> {}", excerpt(&risk.clause_text, SUMMARY_CLAUSE_CHARS)));
            lines.push(String::new());
        }
    }

    lines.join("\n")
}

/// Plain-text review: the document with risk markers in place, then the findings.
pub fn annotated_text(text: &str, summary: &Summary) -> String {
    let mut out = String::new();
    let score = summary.safety_score();

    out.push_str("DOCUMENT REVIEW\n");
    out.push_str(&format!("Safety score: {}\n", score));
    out.push_str(&format!("Words: {}\n\n", summary.word_count));

    section(&mut out, "DOCUMENT TEXT (flagged clauses marked in place)");
    out.push_str(&relocate(text, &summary.risks, RenderMode::PlainMarker));
    out.push_str("\n\n");

    section(&mut out, "KEY POINTS");
    for bullet in &summary.bullets {
        out.push_str(&format!("- {}\n", bullet));
    }
    out.push('\n');

    if !summary.questions_to_ask.is_empty() {
        section(&mut out, "QUESTIONS TO ASK");
        for question in &summary.questions_to_ask {
            out.push_str(&format!("- {}\n", question));
        }
        out.push('\n');
    }

    if let Some(doc_type) = &summary.document_type {
        out.push_str(&format!("Document type: {}\n\n", doc_type));
    }

    if !summary.risks.is_empty() {
        section(&mut out, "FLAGGED RISKS");
        for (i, risk) in summary.risks.iter().enumerate() {
            out.push_str(&format!(
                "{}. [{}] {}\n",
                i + 1,
                risk.risk_level.as_str().to_uppercase(),
                risk.description
            ));
            out.push_str(&format!(
                "   Clause: \"{}\"\n\n",
                excerpt(&risk.clause_text, ANNOTATED_CLAUSE_CHARS)
            ));
        }
    }

    out.trim_end().to_string()
}

fn section(out: &mut String, heading: &str) {
    out.push_str(heading);
    out.push('\n');
    out.push_str(&"-".repeat(heading.chars().count()));
    out.push('\n');
}

const HTML_STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:52rem;margin:2rem auto;padding:0 1rem;line-height:1.5;color:#1f2937}\
h1{font-size:1.5rem}.score{font-weight:600}\
mark.risk-highlight{padding:0 .15em;border-radius:3px}\
mark.risk-low{background:#fef9c3}mark.risk-medium{background:#fed7aa}mark.risk-high{background:#fecaca}\
.document{border-top:1px solid #e5e7eb;margin-top:2rem;padding-top:1rem}\
.doc-title{font-size:1.25rem}.doc-heading{font-size:1.05rem}";

/// Standalone HTML page: score, key points, questions, then the highlighted document.
pub fn annotated_html(title: &str, text: &str, summary: &Summary) -> String {
    let score = summary.safety_score();
    let title = escape_html(title);
    let mut out = String::new();

    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>{} - Review</title>\n", title));
    out.push_str(&format!("<style>{}</style>\n", HTML_STYLE));
    out.push_str("</head>\n<body>\n");

    out.push_str(&format!("<h1>{}</h1>\n", title));
    out.push_str(&format!(
        "<p class=\"score\">Safety score: {} / 100 &middot; {}</p>\n",
        score.value(),
        score.label()
    ));
    if let Some(doc_type) = &summary.document_type {
        out.push_str(&format!(
            "<p class=\"doc-type\">Document type: {}</p>\n",
            escape_html(doc_type)
        ));
    }

    out.push_str("<section class=\"key-points\">\n<h2>Key Points</h2>\n");
    push_html_list(&mut out, &summary.bullets);
    out.push_str("</section>\n");

    if !summary.questions_to_ask.is_empty() {
        out.push_str("<section class=\"questions\">\n<h2>Questions to Ask</h2>\n");
        push_html_list(&mut out, &summary.questions_to_ask);
        out.push_str("</section>\n");
    }

    out.push_str("<section class=\"document\">\n");
    out.push_str(&structure(&highlight_html(text, &summary.risks)));
    out.push_str("\n</section>\n</body>\n</html>\n");
    out
}

fn push_html_list(out: &mut String, items: &[String]) {
    out.push_str("<ul>\n");
    for item in items {
        out.push_str(&format!("<li>{}</li>\n", escape_html(item)));
    }
    out.push_str("</ul>\n");
}
