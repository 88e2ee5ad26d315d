//! Light formatting of assistant replies.
//!
//! The agent is told not to use markdown but often does anyway. Replies are
//! rewritten into a tiny inline markup (`<b>`, `<i>`, `<br>`) that front ends
//! can render directly or break into styled segments.

use regex::Regex;
use std::sync::LazyLock;

const DECORATIVE_EMOJI: [char; 5] = ['🎉', '🏠', '👉', '💡', '✅'];

struct FormatPatterns {
    heading: Regex,
    quote: Regex,
    list_item: Regex,
    bold: Regex,
    italic: Regex,
    leading_breaks: Regex,
    tag: Regex,
}

static PATTERNS: LazyLock<FormatPatterns> = LazyLock::new(|| FormatPatterns {
    heading: Regex::new(r"(?m)^#\s(.*?)$").expect("Invalid heading regex"),
    quote: Regex::new(r"(?m)^> (.*?)$").expect("Invalid quote regex"),
    list_item: Regex::new(r"(?m)^- (.*?)$").expect("Invalid list regex"),
    bold: Regex::new(r"\*\*(.*?)\*\*").expect("Invalid bold regex"),
    italic: Regex::new(r"\*(.*?)\*").expect("Invalid italic regex"),
    leading_breaks: Regex::new(r"^(<br>\s*)+").expect("Invalid break regex"),
    tag: Regex::new(r"<[^>]*>?").expect("Invalid tag regex"),
});

/// Rewrite semi-markdown agent text into inline markup.
pub fn format_assistant_message(text: &str) -> String {
    let p = &*PATTERNS;

    let mut out: String = text.chars().filter(|c| !DECORATIVE_EMOJI.contains(c)).collect();
    out = out.replace("---", "");
    out = p.heading.replace_all(&out, "<br><b>${1}</b>").into_owned();
    out = p.quote.replace_all(&out, "<br><i>${1}</i>").into_owned();
    out = p.list_item.replace_all(&out, "<br>• ${1}").into_owned();
    out = p.bold.replace_all(&out, "<b>${1}</b>").into_owned();
    out = p.italic.replace_all(&out, "<i>${1}</i>").into_owned();
    out = out.replace("\n\n", "<br><br>").replace('\n', "<br>");
    out = p.leading_breaks.replace(&out, "").into_owned();
    out.trim().to_string()
}

/// Drop every tag, leaving the text that should be spoken aloud.
pub fn strip_tags(markup: &str) -> String {
    PATTERNS.tag.replace_all(markup, "").into_owned()
}

/// A run of text with uniform style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

/// Break inline markup into display lines of styled segments.
///
/// `<br>` ends a line; `<b>`/`<i>` toggle style. Any other `<` is kept as text.
pub fn markup_to_lines(markup: &str) -> Vec<Vec<Segment>> {
    markup.split("<br>").map(parse_line).collect()
}

fn parse_line(line: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut bold = false;
    let mut italic = false;
    let mut rest = line;

    while let Some(idx) = rest.find('<') {
        current.push_str(&rest[..idx]);
        let tail = &rest[idx..];

        let toggle = ["<b>", "</b>", "<i>", "</i>"]
            .into_iter()
            .find(|tag| tail.starts_with(tag));

        match toggle {
            Some(tag) => {
                if !current.is_empty() {
                    segments.push(Segment {
                        text: std::mem::take(&mut current),
                        bold,
                        italic,
                    });
                }
                match tag {
                    "<b>" => bold = true,
                    "</b>" => bold = false,
                    "<i>" => italic = true,
                    _ => italic = false,
                }
                rest = &tail[tag.len()..];
            }
            None => {
                current.push('<');
                rest = &tail[1..];
            }
        }
    }
    current.push_str(rest);

    if !current.is_empty() {
        segments.push(Segment {
            text: current,
            bold,
            italic,
        });
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(
            format_assistant_message("  Hello there, how can I help?  "),
            "Hello there, how can I help?"
        );
    }

    #[test]
    fn test_bold_and_italic() {
        assert_eq!(
            format_assistant_message("This is **great** and *quick*"),
            "This is <b>great</b> and <i>quick</i>"
        );
    }

    #[test]
    fn test_heading_quote_and_list_lines() {
        let input = "# Your Offer\n> Subject to KYC\n- Rate: 8.5%\n- Tenure: 5 years";
        assert_eq!(
            format_assistant_message(input),
            "<b>Your Offer</b><br><br><i>Subject to KYC</i><br><br>• Rate: 8.5%<br><br>• Tenure: 5 years"
        );
    }

    #[test]
    fn test_paragraph_and_line_breaks() {
        assert_eq!(format_assistant_message("One\n\nTwo\nThree"), "One<br><br>Two<br>Three");
    }

    #[test]
    fn test_emoji_and_dividers_removed() {
        assert_eq!(
            format_assistant_message("🎉 Congrats ✅\n---\nNext 👉 step"),
            "Congrats <br><br>Next  step"
        );
    }

    #[test]
    fn test_leading_breaks_removed() {
        assert_eq!(format_assistant_message("\n\nHello"), "Hello");
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<b>Hi</b><br>there <i>friend</i>"), "Hithere friend");
        assert_eq!(strip_tags("cut off <b"), "cut off ");
    }

    #[test]
    fn test_markup_to_lines_styles() {
        let lines = markup_to_lines("Hi <b>bold</b> and <i>it</i><br>next");
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            vec![
                Segment { text: "Hi ".into(), bold: false, italic: false },
                Segment { text: "bold".into(), bold: true, italic: false },
                Segment { text: " and ".into(), bold: false, italic: false },
                Segment { text: "it".into(), bold: false, italic: true },
            ]
        );
        assert_eq!(
            lines[1],
            vec![Segment { text: "next".into(), bold: false, italic: false }]
        );
    }

    #[test]
    fn test_markup_to_lines_keeps_stray_angle_brackets() {
        let lines = markup_to_lines("income < 5 lakh");
        assert_eq!(lines[0][0].text, "income < 5 lakh");
    }

    #[test]
    fn test_markup_to_lines_empty_line() {
        let lines = markup_to_lines("a<br><br>b");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].is_empty());
    }
}
