// src/cli.rs
// =============================================================================
// This file defines the command-line interface using the `clap` crate.
//
//   weep [OPTIONS] [PATTERN] [URLS]...
//
// When no pattern is given with -e or -f, the first positional argument is
// the pattern. When no URLs are given, they are read from stdin, one per line.
//
// Cli::settings() turns the parsed flags into a validated Settings value.
// =============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};

use crate::config::{Settings, DEFAULT_CONCURRENCY};
use crate::crawl::StatusPolicy;
use crate::matcher::{OutputStyle, PatternMode, SelectorTarget};

#[derive(Parser, Debug)]
#[command(
    name = "weep",
    version,
    about = "Recursively grep web pages for text, regular expressions or CSS selectors",
    long_about = "weep fetches the given pages, prints every line (or selected element) that \
                  matches, and follows same-site links to keep searching. \
                  Press ctrl-c to stop a recursive search."
)]
pub struct Cli {
    /// Pattern followed by URLs (URLs are read from stdin when none are given)
    #[arg(value_name = "ARGS")]
    pub args: Vec<String>,

    /// Pattern to search for (repeatable); all positionals become URLs
    #[arg(short = 'e', long = "regexp", value_name = "PATTERN")]
    pub patterns: Vec<String>,

    /// Read patterns from a file, one per line
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub pattern_file: Option<PathBuf>,

    /// Read allowed domains from a file, one per line
    #[arg(short = 'd', long = "domains-file", value_name = "FILE")]
    pub domains_file: Option<PathBuf>,

    /// Also follow links to this host (repeatable)
    #[arg(long = "domain", value_name = "HOST")]
    pub domains: Vec<String>,

    /// Write matches to a file instead of stdout
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Ignore case when matching
    #[arg(short = 'i', long)]
    pub ignore_case: bool,

    /// Report lines (or elements) that match none of the patterns
    #[arg(short = 'v', long)]
    pub invert_match: bool,

    /// Prefix results with their line number
    #[arg(short = 'n', long)]
    pub line_number: bool,

    /// Prefix results with the URL of their page
    #[arg(short = 'H', long = "with-url")]
    pub with_url: bool,

    /// Fetch only the given pages, do not follow links
    #[arg(short = 's', long)]
    pub single: bool,

    /// Number of concurrent workers
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Requests per second across all workers (0 = unlimited)
    #[arg(short = 'l', long = "rate", default_value_t = 0.0)]
    pub rate: f64,

    /// Requests allowed back to back before the rate applies
    #[arg(long, default_value_t = 1)]
    pub burst: u32,

    /// HTTP method to use
    #[arg(short = 'X', long = "method", default_value = "GET")]
    pub method: String,

    /// Treat patterns as regular expressions
    #[arg(short = 'E', long = "extended-regexp", conflicts_with = "css")]
    pub regex: bool,

    /// Treat patterns as CSS selectors and report the selected elements
    #[arg(long)]
    pub css: bool,

    /// With --css, report this attribute of each selected element
    #[arg(long, value_name = "NAME", requires = "css", conflicts_with = "inner_html")]
    pub attr: Option<String>,

    /// With --css, report the inner HTML of each selected element
    #[arg(long, requires = "css")]
    pub inner_html: bool,

    /// Print each match as a JSON object
    #[arg(long)]
    pub json: bool,

    /// When to highlight matches
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,

    /// Treat non-2xx responses as failures instead of matching their body
    #[arg(long)]
    pub fail_on_status: bool,

    /// More diagnostic logging on stderr (-vv for debug)
    #[arg(long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// Resolves the choice against whether the sink is a terminal
    pub fn enabled(self, is_terminal: bool) -> bool {
        match self {
            ColorChoice::Auto => is_terminal,
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        }
    }
}

impl Cli {
    // Splits positionals into (patterns, urls)
    //
    // Patterns come from -e and -f; if there are none, the first positional
    // is the pattern and the rest are URLs.
    pub fn patterns_and_urls(&self) -> Result<(Vec<String>, Vec<String>)> {
        let mut patterns = self.patterns.clone();
        if let Some(file) = &self.pattern_file {
            patterns.extend(load_lines(file)?);
        }

        let mut urls = self.args.clone();
        if patterns.is_empty() && self.pattern_file.is_none() {
            if urls.is_empty() {
                bail!("no pattern given (usage: weep <pattern> [url(s) or read from stdin])");
            }
            patterns.push(urls.remove(0));
        }

        Ok((patterns, urls))
    }

    pub fn pattern_mode(&self) -> PatternMode {
        if self.css {
            let target = match (&self.attr, self.inner_html) {
                (Some(name), _) => SelectorTarget::Attribute(name.clone()),
                (None, true) => SelectorTarget::InnerHtml,
                (None, false) => SelectorTarget::Text,
            };
            PatternMode::Selector(target)
        } else if self.regex {
            PatternMode::Regex
        } else {
            PatternMode::Literal
        }
    }

    // Builds the validated settings
    //
    // Parameters:
    //   patterns: from patterns_and_urls()
    //   color: whether the match sink gets ANSI highlighting
    pub fn settings(&self, patterns: Vec<String>, color: bool) -> Result<Settings> {
        let mut domains = self.domains.clone();
        if let Some(file) = &self.domains_file {
            domains.extend(load_lines(file)?);
        }

        let style = if self.json {
            OutputStyle::Json
        } else if color {
            OutputStyle::Color
        } else {
            OutputStyle::Plain
        };

        let status_policy = if self.fail_on_status {
            StatusPolicy::Reject
        } else {
            StatusPolicy::Accept
        };

        let settings = Settings::builder()
            .patterns(patterns)
            .mode(self.pattern_mode())
            .ignore_case(self.ignore_case)
            .invert(self.invert_match)
            .line_numbers(self.line_number)
            .source_url(self.with_url)
            .style(style)
            .single_page(self.single)
            .allowed_domains(domains)
            .concurrency(self.concurrency)
            .rate(self.rate)
            .burst(self.burst)
            .method(self.method.clone())
            .timeout(Duration::from_secs(self.timeout))
            .status_policy(status_policy)
            .build()?;

        Ok(settings)
    }
}

// Reads non-empty lines from a file
fn load_lines(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("could not read '{}'", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
