// src/matcher/mod.rs
// =============================================================================
// This module decides which parts of a fetched page are reported.
//
// Submodules:
// - text: line-oriented matching (literal substrings or regular expressions)
// - selector: structural matching with CSS selectors
// - format: highlighting and assembly of the final output line
//
// A Matcher is built once from the final configuration (patterns, mode,
// case-insensitivity, inversion) and is read-only afterwards, so every worker
// can share it through Arc<Settings>.
// =============================================================================

mod format;
mod selector;
mod text;

use std::ops::Range;

use crate::error::{Result, WeepError};

pub use format::{light_up, Formatter, OutputStyle, FAILURE_COLOR};
pub use selector::SelectorTarget;

use selector::SelectorMatcher;
use text::TextMatcher;

/// How configured patterns are interpreted
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PatternMode {
    /// Plain substring search on every line
    #[default]
    Literal,
    /// Regular expression search on every line
    Regex,
    /// CSS selectors evaluated against the parsed document
    Selector(SelectorTarget),
}

/// One reported unit: a line of the page or a selected element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchUnit {
    /// 1-based line number; None for structural matches
    pub line: Option<usize>,
    /// Trimmed content in its original casing
    pub text: String,
    /// Byte ranges of `text` to highlight, sorted and non-overlapping
    pub spans: Vec<Range<usize>>,
}

#[derive(Debug)]
enum MatcherKind {
    Text(TextMatcher),
    Selector(SelectorMatcher),
}

#[derive(Debug)]
pub struct Matcher {
    kind: MatcherKind,
    invert: bool,
}

impl Matcher {
    // Compiles every pattern for the chosen mode in one step
    //
    // Case folding (literal) and case-insensitive compilation (regex) are
    // derived here from `ignore_case`, so the order in which options were
    // supplied never matters.
    pub fn new(
        patterns: &[String],
        mode: &PatternMode,
        ignore_case: bool,
        invert: bool,
    ) -> Result<Self> {
        if patterns.is_empty() {
            return Err(WeepError::Config("no patterns given".to_string()));
        }

        let kind = match mode {
            PatternMode::Literal => MatcherKind::Text(TextMatcher::literal(patterns, ignore_case)),
            PatternMode::Regex => MatcherKind::Text(TextMatcher::regex(patterns, ignore_case)?),
            PatternMode::Selector(target) => {
                MatcherKind::Selector(SelectorMatcher::new(patterns, target.clone())?)
            }
        };

        Ok(Self { kind, invert })
    }

    // Runs the matcher over a whole page body
    //
    // Returns the reported units in document order.
    pub fn find_matches(&self, body: &str) -> Vec<MatchUnit> {
        match &self.kind {
            MatcherKind::Text(matcher) => body
                .lines()
                .enumerate()
                .filter_map(|(index, line)| {
                    let spans = match (matcher.match_line(line), self.invert) {
                        (Some(spans), false) => spans,
                        (None, true) => Vec::new(),
                        _ => return None,
                    };
                    let (text, spans) = trim_unit(line, spans);
                    Some(MatchUnit {
                        line: Some(index + 1),
                        text,
                        spans,
                    })
                })
                .collect(),
            MatcherKind::Selector(matcher) => matcher.find(body, self.invert),
        }
    }
}

// Trims a line and moves its highlight spans onto the trimmed text
//
// Spans that fall entirely inside the trimmed whitespace are dropped, spans
// crossing the boundary are clipped.
fn trim_unit(line: &str, spans: Vec<Range<usize>>) -> (String, Vec<Range<usize>>) {
    let start = line.len() - line.trim_start().len();
    let trimmed = line.trim();
    let end = start + trimmed.len();

    let spans = spans
        .into_iter()
        .filter_map(|span| {
            let from = span.start.max(start);
            let to = span.end.min(end);
            (from < to).then(|| from - start..to - start)
        })
        .collect();

    (trimmed.to_string(), spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "line1\nfoo bar\nbaz\n";

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_literal_reports_matching_line() {
        let matcher = Matcher::new(&patterns(&["foo"]), &PatternMode::Literal, false, false).unwrap();
        let units = matcher.find_matches(BODY);
        assert_eq!(
            units,
            vec![MatchUnit {
                line: Some(2),
                text: "foo bar".to_string(),
                spans: vec![0..3],
            }]
        );
    }

    #[test]
    fn test_invert_reports_non_matching_lines() {
        let matcher = Matcher::new(&patterns(&["foo"]), &PatternMode::Literal, false, true).unwrap();
        let lines: Vec<_> = matcher.find_matches(BODY).into_iter().map(|u| u.line).collect();
        assert_eq!(lines, vec![Some(1), Some(3)]);
    }

    #[test]
    fn test_invert_requires_no_pattern_to_match() {
        let matcher =
            Matcher::new(&patterns(&["foo", "baz"]), &PatternMode::Literal, false, true).unwrap();
        let texts: Vec<_> = matcher.find_matches(BODY).into_iter().map(|u| u.text).collect();
        assert_eq!(texts, vec!["line1"]);
    }

    #[test]
    fn test_case_sensitive_literal_misses_other_case() {
        let matcher = Matcher::new(&patterns(&["FOO"]), &PatternMode::Literal, false, false).unwrap();
        assert!(matcher.find_matches(BODY).is_empty());
    }

    #[test]
    fn test_ignore_case_keeps_original_casing() {
        let matcher = Matcher::new(&patterns(&["hello"]), &PatternMode::Literal, true, false).unwrap();
        let units = matcher.find_matches("   Say HeLLo World  \n");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "Say HeLLo World");
        assert_eq!(units[0].spans, vec![4..9]);
    }

    #[test]
    fn test_multiple_patterns_merge_into_one_result() {
        let matcher =
            Matcher::new(&patterns(&["foo", "bar"]), &PatternMode::Literal, false, false).unwrap();
        let units = matcher.find_matches(BODY);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].spans, vec![0..3, 4..7]);
    }

    #[test]
    fn test_regex_highlights_every_match() {
        let matcher =
            Matcher::new(&patterns(&[r"ba\w"]), &PatternMode::Regex, false, false).unwrap();
        let units = matcher.find_matches("bar and baz\nnothing\n");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].line, Some(1));
        assert_eq!(units[0].spans, vec![0..3, 8..11]);
    }

    #[test]
    fn test_regex_ignore_case() {
        let matcher = Matcher::new(&patterns(&["^ERROR"]), &PatternMode::Regex, true, false).unwrap();
        let units = matcher.find_matches("error: disk full\nok\n");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "error: disk full");
    }

    #[test]
    fn test_invalid_regex_is_config_error() {
        let err = Matcher::new(&patterns(&["(unclosed"]), &PatternMode::Regex, false, false)
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_no_patterns_is_config_error() {
        let err = Matcher::new(&[], &PatternMode::Literal, false, false).unwrap_err();
        assert!(matches!(err, WeepError::Config(_)));
    }

    #[test]
    fn test_crlf_lines_are_scanned_like_lines() {
        let matcher = Matcher::new(&patterns(&["two"]), &PatternMode::Literal, false, false).unwrap();
        let units = matcher.find_matches("one\r\ntwo\r\n");
        assert_eq!(units[0].line, Some(2));
        assert_eq!(units[0].text, "two");
    }

    #[test]
    fn test_trim_unit_clips_spans() {
        let (text, spans) = trim_unit("  ab  ", vec![0..3, 4..6]);
        assert_eq!(text, "ab");
        assert_eq!(spans, vec![0..1]);
    }
}
