// src/matcher/format.rs
// =============================================================================
// Turns match units into output lines.
//
// Plain:  [<url>: ][<line>: ]<text>
// Color:  same layout, matched spans, url and line number wrapped in ANSI
//         bold green
// Json:   {"url": ..., "line": ..., "text": ...}, one object per line
// =============================================================================

use std::ops::Range;

use serde::Serialize;
use url::Url;

use super::MatchUnit;

pub const MATCH_COLOR: &str = "\x1b[1;32m";
pub const FAILURE_COLOR: &str = "\x1b[1;31m";
pub const RESET_COLOR: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputStyle {
    #[default]
    Plain,
    Color,
    Json,
}

/// One --json output line
#[derive(Debug, Serialize)]
struct JsonMatch<'a> {
    url: &'a str,
    line: Option<usize>,
    text: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct Formatter {
    pub style: OutputStyle,
    /// Prefix each result with its line number
    pub line_numbers: bool,
    /// Prefix each result with the page URL
    pub source_url: bool,
}

impl Formatter {
    // Renders one unit found on `url` as a complete output line
    pub fn render(&self, unit: &MatchUnit, url: &Url) -> String {
        if self.style == OutputStyle::Json {
            let record = JsonMatch {
                url: url.as_str(),
                line: unit.line,
                text: &unit.text,
            };
            // Serializing borrowed strings and an integer cannot fail
            return serde_json::to_string(&record).unwrap_or_default();
        }

        let color = self.style == OutputStyle::Color;
        let mut out = String::new();

        if self.source_url {
            out.push_str(&paint(url.as_str(), color));
            out.push_str(": ");
        }
        if self.line_numbers {
            if let Some(line) = unit.line {
                out.push_str(&paint(&line.to_string(), color));
                out.push_str(": ");
            }
        }

        if color {
            out.push_str(&highlight_spans(&unit.text, &unit.spans, MATCH_COLOR));
        } else {
            out.push_str(&unit.text);
        }
        out
    }
}

/// Wraps the whole input in `color`
pub fn light_up(input: &str, color: &str) -> String {
    format!("{color}{input}{RESET_COLOR}")
}

fn paint(input: &str, color: bool) -> String {
    if color {
        light_up(input, MATCH_COLOR)
    } else {
        input.to_string()
    }
}

// Wraps each span of `text` in `color` ... reset
//
// `spans` must be sorted, non-overlapping and on char boundaries.
fn highlight_spans(text: &str, spans: &[Range<usize>], color: &str) -> String {
    let mut out = String::with_capacity(text.len() + spans.len() * 12);
    let mut cursor = 0;

    for span in spans {
        out.push_str(&text[cursor..span.start]);
        out.push_str(&light_up(&text[span.clone()], color));
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}
