// src/matcher/text.rs
// =============================================================================
// Line-oriented matching: literal substrings or regular expressions.
//
// Case-insensitive literal matching compares a lower-cased copy of the line
// with lower-cased patterns. Highlight spans found in the copy are mapped back
// to the original line, so the reported text keeps its casing even when
// lower-casing changes byte lengths (e.g. 'İ').
// =============================================================================

use std::ops::Range;

use regex::{Regex, RegexBuilder};

use crate::error::{Result, WeepError};

#[derive(Debug)]
enum TextPattern {
    Literal(String),
    Regex(Regex),
}

#[derive(Debug)]
pub(super) struct TextMatcher {
    patterns: Vec<TextPattern>,
    ignore_case: bool,
}

impl TextMatcher {
    pub(super) fn literal(patterns: &[String], ignore_case: bool) -> Self {
        let patterns = patterns
            .iter()
            .map(|p| {
                if ignore_case {
                    TextPattern::Literal(fold_case(p))
                } else {
                    TextPattern::Literal(p.clone())
                }
            })
            .collect();

        Self {
            patterns,
            ignore_case,
        }
    }

    pub(super) fn regex(patterns: &[String], ignore_case: bool) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(ignore_case)
                    .build()
                    .map(TextPattern::Regex)
                    .map_err(|source| WeepError::Regex {
                        pattern: p.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        // Regexes carry case-insensitivity themselves, no folded copy needed
        Ok(Self {
            patterns,
            ignore_case: false,
        })
    }

    // Checks one line against every pattern
    //
    // Returns None when no pattern matches, otherwise the merged highlight
    // spans (which may be empty, e.g. for an empty pattern).
    pub(super) fn match_line(&self, line: &str) -> Option<Vec<Range<usize>>> {
        let folded = self.ignore_case.then(|| FoldedLine::new(line));
        let haystack = folded.as_ref().map_or(line, |f| f.text.as_str());

        let mut matched = false;
        let mut spans = Vec::new();

        for pattern in &self.patterns {
            match pattern {
                TextPattern::Literal(needle) => {
                    if !haystack.contains(needle.as_str()) {
                        continue;
                    }
                    matched = true;
                    if needle.is_empty() {
                        continue;
                    }
                    for (start, found) in haystack.match_indices(needle.as_str()) {
                        let span = start..start + found.len();
                        spans.push(match &folded {
                            Some(f) => f.to_original(span),
                            None => span,
                        });
                    }
                }
                TextPattern::Regex(re) => {
                    if !re.is_match(line) {
                        continue;
                    }
                    matched = true;
                    spans.extend(re.find_iter(line).map(|m| m.range()).filter(|r| !r.is_empty()));
                }
            }
        }

        matched.then(|| merge_spans(spans))
    }
}

// Lower-cases char by char so patterns and lines fold identically
fn fold_case(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).collect()
}

// A lower-cased copy of a line that remembers where each byte came from
struct FoldedLine {
    text: String,
    /// For every byte of `text`, the byte range of the original char it came from
    origin: Vec<Range<usize>>,
}

impl FoldedLine {
    fn new(line: &str) -> Self {
        let mut text = String::with_capacity(line.len());
        let mut origin = Vec::with_capacity(line.len());

        for (start, ch) in line.char_indices() {
            let source = start..start + ch.len_utf8();
            for lower in ch.to_lowercase() {
                text.push(lower);
                origin.extend(std::iter::repeat(source.clone()).take(lower.len_utf8()));
            }
        }

        Self { text, origin }
    }

    // Maps a non-empty span of the folded text onto the original line
    fn to_original(&self, span: Range<usize>) -> Range<usize> {
        self.origin[span.start].start..self.origin[span.end - 1].end
    }
}

// Sorts spans and merges the overlapping ones
fn merge_spans(mut spans: Vec<Range<usize>>) -> Vec<Range<usize>> {
    spans.sort_by_key(|s| (s.start, s.end));

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.start < last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}
