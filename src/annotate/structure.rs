use once_cell::sync::Lazy;
use regex::Regex;

static RE_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(●|•|[-*]|\d+\.)\s").expect("valid regex"));
static RE_BULLET_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(●|•|[-*]|\d+\.)\s*").expect("valid regex"));

const TITLE_MAX_CHARS: usize = 80;
const HEADING_MAX_CHARS: usize = 60;

/// Classification of one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    ListItem,
    Title,
    Heading,
    Paragraph,
}

fn is_list_item(line: &str, stripped: &str) -> bool {
    RE_BULLET.is_match(line) || stripped.starts_with('●') || stripped.starts_with('•')
}

fn is_heading(stripped: &str) -> bool {
    stripped.chars().count() < HEADING_MAX_CHARS
        && !stripped.ends_with('.')
        && stripped.chars().next().is_some_and(char::is_uppercase)
}

fn classify(line: &str, stripped: &str, first_content: bool) -> LineKind {
    if stripped.is_empty() {
        LineKind::Blank
    } else if is_list_item(line, stripped) {
        LineKind::ListItem
    } else if first_content && stripped.chars().count() < TITLE_MAX_CHARS {
        LineKind::Title
    } else if is_heading(stripped) {
        LineKind::Heading
    } else {
        LineKind::Paragraph
    }
}

/// Convert (already escaped and highlighted) text into an HTML outline.
///
/// One pass, top to bottom. Line content is emitted as-is and never re-escaped,
/// so inline `<mark>` elements survive.
pub fn structure(text: &str) -> String {
    let mut result = Vec::new();
    let mut in_list = false;
    let mut seen_content = false;

    for line in text.split('\n') {
        let stripped = line.trim();
        let kind = classify(line, stripped, !seen_content);
        if kind != LineKind::Blank {
            seen_content = true;
        }

        if kind != LineKind::ListItem && in_list {
            result.push("</ul>".to_string());
            in_list = false;
        }

        match kind {
            LineKind::Blank => result.push("<br>".to_string()),
            LineKind::ListItem => {
                if !in_list {
                    result.push("<ul class='doc-list'>".to_string());
                    in_list = true;
                }
                let content = RE_BULLET_MARKER.replace(stripped, "");
                result.push(format!("<li class='doc-item'>{}</li>", content));
            }
            LineKind::Title => result.push(format!("<h2 class='doc-title'>{}</h2>", stripped)),
            LineKind::Heading => result.push(format!("<h3 class='doc-heading'>{}</h3>", stripped)),
            LineKind::Paragraph => result.push(format!("<p class='doc-para'>{}</p>", line)),
        }
    }

    if in_list {
        result.push("</ul>".to_string());
    }
    result.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_outline() {
        let text = "Residential Lease Agreement\n\
                    Parties\n\
                    This agreement is made between the landlord and the tenant named below.\n\
                    \n\
                    - Rent is due monthly\n\
                    2. Deposit is refundable\n\
                    ● Pets allowed\n\
                    after the list comes a lowercase line";
        let expected = "<h2 class='doc-title'>Residential Lease Agreement</h2>\n\
                        <h3 class='doc-heading'>Parties</h3>\n\
                        <p class='doc-para'>This agreement is made between the landlord and the tenant named below.</p>\n\
                        <br>\n\
                        <ul class='doc-list'>\n\
                        <li class='doc-item'>Rent is due monthly</li>\n\
                        <li class='doc-item'>Deposit is refundable</li>\n\
                        <li class='doc-item'>Pets allowed</li>\n\
                        </ul>\n\
                        <p class='doc-para'>after the list comes a lowercase line</p>";
        assert_eq!(structure(text), expected);
    }

    #[test]
    fn test_title_is_first_non_blank_line() {
        let out = structure("\n\nShort title\nSecond line");
        assert_eq!(
            out,
            "<br>\n<br>\n<h2 class='doc-title'>Short title</h2>\n<h3 class='doc-heading'>Second line</h3>"
        );
    }

    #[test]
    fn test_long_first_line_is_not_a_title() {
        let first = "A".repeat(80);
        let out = structure(&first);
        assert_eq!(out, format!("<p class='doc-para'>{}</p>", first));
    }

    #[test]
    fn test_sentence_is_not_heading() {
        let out = structure("Intro\nShort sentence.\nlowercase start");
        assert!(out.contains("<p class='doc-para'>Short sentence.</p>"));
        assert!(out.contains("<p class='doc-para'>lowercase start</p>"));
    }

    #[test]
    fn test_list_closed_by_blank_line_and_at_end() {
        let out = structure("Title\n* one\n\n* two");
        assert_eq!(
            out,
            "<h2 class='doc-title'>Title</h2>\n<ul class='doc-list'>\n<li class='doc-item'>one</li>\n</ul>\n<br>\n<ul class='doc-list'>\n<li class='doc-item'>two</li>\n</ul>"
        );
    }

    #[test]
    fn test_inline_markup_kept_verbatim() {
        let line = r#"Fees: <mark class="risk-highlight risk-high" title="x">late fee of $500</mark> applies."#;
        let out = structure(&format!("Title\n{}", line));
        assert!(out.contains(&format!("<p class='doc-para'>{}</p>", line)));
    }
}
