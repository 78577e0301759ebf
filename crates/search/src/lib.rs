//! Find and replace over a single document buffer.
//!
//! Patterns are either literal text or regular expressions. Forward searches
//! wrap around to the start of the buffer, and replace helpers return the
//! rewritten text so the caller decides when to commit it to the document.

use std::ops::Range;

use regex::{Captures, Regex, RegexBuilder};
use thiserror::Error;

/// Error conditions raised by the search engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("search pattern cannot be empty")]
    EmptyPattern,
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
}

/// Determines how the search pattern is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchMode {
    #[default]
    Plain,
    Regex,
}

/// Options supplied to the search engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchOptions {
    pub pattern: String,
    pub mode: SearchMode,
    pub case_sensitive: bool,
    pub whole_word: bool,
}

impl SearchOptions {
    /// Plain, case-sensitive search for `pattern`.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            mode: SearchMode::Plain,
            case_sensitive: true,
            whole_word: false,
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            mode: SearchMode::Regex,
            ..Self::new(pattern)
        }
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.pattern.is_empty() {
            return Err(SearchError::EmptyPattern);
        }
        Ok(())
    }
}

/// A single match, with byte offsets and a 1-based line/column position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchMatch {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
    pub matched: String,
    pub line_text: String,
}

impl SearchMatch {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Result of replacing one match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub replaced_text: String,
    /// The match that was replaced, positioned in the original text.
    pub replaced: SearchMatch,
    /// Byte offset just past the inserted replacement in `replaced_text`.
    pub cursor: usize,
}

/// Captures the outcome of a `replace_all` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplaceAllOutcome {
    pub replaced_text: String,
    pub replacements: usize,
    pub matches: Vec<SearchMatch>,
}

/// Search engine bound to a particular text buffer.
pub struct SearchEngine<'a> {
    text: &'a str,
    line_index: LineIndex<'a>,
}

impl<'a> SearchEngine<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            line_index: LineIndex::new(text),
        }
    }

    /// Finds the first match starting at or after `start_pos`, wrapping to the
    /// beginning of the buffer when nothing follows.
    pub fn find(
        &self,
        start_pos: usize,
        options: &SearchOptions,
    ) -> Result<Option<SearchMatch>, SearchError> {
        let regex = compile(options)?;
        Ok(self
            .find_with(&regex, start_pos, options)
            .map(|range| self.build_match(range)))
    }

    /// Returns every non-overlapping match in buffer order.
    pub fn find_all(&self, options: &SearchOptions) -> Result<Vec<SearchMatch>, SearchError> {
        let regex = compile(options)?;
        Ok(self
            .ranges(&regex, options)
            .into_iter()
            .map(|range| self.build_match(range))
            .collect())
    }

    /// Replaces the match `find` would return from `start_pos`.
    ///
    /// In regex mode `$1`/`${name}` in the replacement expand to captures.
    pub fn replace_next(
        &self,
        start_pos: usize,
        replacement: &str,
        options: &SearchOptions,
    ) -> Result<Option<ReplaceOutcome>, SearchError> {
        let regex = compile(options)?;
        let Some(range) = self.find_with(&regex, start_pos, options) else {
            return Ok(None);
        };

        let mut inserted = String::new();
        match options.mode {
            SearchMode::Regex => {
                // Re-run at the match so word boundaries see the surrounding text.
                match regex.captures_at(self.text, range.start) {
                    Some(caps) => caps.expand(replacement, &mut inserted),
                    None => inserted.push_str(replacement),
                }
            }
            SearchMode::Plain => inserted.push_str(replacement),
        }

        let mut replaced_text =
            String::with_capacity(self.text.len() - range.len() + inserted.len());
        replaced_text.push_str(&self.text[..range.start]);
        replaced_text.push_str(&inserted);
        replaced_text.push_str(&self.text[range.end..]);

        Ok(Some(ReplaceOutcome {
            replaced_text,
            cursor: range.start + inserted.len(),
            replaced: self.build_match(range),
        }))
    }

    /// Replaces every match and reports how many were rewritten.
    pub fn replace_all(
        &self,
        replacement: &str,
        options: &SearchOptions,
    ) -> Result<ReplaceAllOutcome, SearchError> {
        let regex = compile(options)?;
        let mut matches = Vec::new();
        let mut replaced_text = String::with_capacity(self.text.len());
        let mut last = 0usize;

        for caps in regex.captures_iter(self.text) {
            let Some(m) = caps.get(0) else {
                continue;
            };
            if m.start() == m.end() || !self.accepts(m.range(), options) {
                continue;
            }
            replaced_text.push_str(&self.text[last..m.start()]);
            expand_into(&caps, replacement, options.mode, &mut replaced_text);
            last = m.end();
            matches.push(self.build_match(m.range()));
        }

        if matches.is_empty() {
            return Ok(ReplaceAllOutcome {
                replaced_text: self.text.to_string(),
                replacements: 0,
                matches,
            });
        }
        replaced_text.push_str(&self.text[last..]);

        Ok(ReplaceAllOutcome {
            replaced_text,
            replacements: matches.len(),
            matches,
        })
    }

    fn find_with(
        &self,
        regex: &Regex,
        start_pos: usize,
        options: &SearchOptions,
    ) -> Option<Range<usize>> {
        let ranges = self.ranges(regex, options);
        let start = floor_char_boundary(self.text, start_pos);
        ranges
            .iter()
            .find(|range| range.start >= start)
            .or_else(|| ranges.first())
            .cloned()
    }

    fn ranges(&self, regex: &Regex, options: &SearchOptions) -> Vec<Range<usize>> {
        regex
            .find_iter(self.text)
            .map(|m| m.range())
            .filter(|range| !range.is_empty() && self.accepts(range.clone(), options))
            .collect()
    }

    fn accepts(&self, range: Range<usize>, options: &SearchOptions) -> bool {
        !options.whole_word || self.is_whole_word(range.start, range.end)
    }

    fn build_match(&self, range: Range<usize>) -> SearchMatch {
        let (line, column) = self.line_index.line_and_column(range.start);
        SearchMatch {
            matched: self.text[range.clone()].to_string(),
            line_text: self.line_index.line_text(line),
            start: range.start,
            end: range.end,
            line,
            column,
        }
    }

    fn is_whole_word(&self, start: usize, end: usize) -> bool {
        let is_word = |ch: char| ch.is_alphanumeric() || ch == '_';
        let left = self.text[..start].chars().next_back().is_some_and(is_word);
        let right = self.text[end..].chars().next().is_some_and(is_word);
        !(left || right)
    }
}

fn expand_into(caps: &Captures<'_>, replacement: &str, mode: SearchMode, dst: &mut String) {
    match mode {
        SearchMode::Regex => caps.expand(replacement, dst),
        SearchMode::Plain => dst.push_str(replacement),
    }
}

fn compile(options: &SearchOptions) -> Result<Regex, SearchError> {
    options.validate()?;
    let pattern = match options.mode {
        SearchMode::Plain => regex::escape(&options.pattern),
        SearchMode::Regex => options.pattern.clone(),
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(!options.case_sensitive)
        .multi_line(true)
        .build()
        .map_err(|err| SearchError::InvalidPattern(err.to_string()))
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    (0..=index)
        .rev()
        .find(|idx| text.is_char_boundary(*idx))
        .unwrap_or(0)
}

#[derive(Clone)]
struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(idx, _)| idx + 1));
        Self { text, starts }
    }

    fn line_and_column(&self, index: usize) -> (usize, usize) {
        let pos = match self.starts.binary_search(&index) {
            Ok(line_zero) => line_zero,
            Err(insert) => insert.saturating_sub(1),
        };
        let line_start = self.starts.get(pos).copied().unwrap_or(0);
        let column = self.text[line_start..index].chars().count() + 1;
        (pos + 1, column)
    }

    fn line_text(&self, line: usize) -> String {
        let zero_based = line.saturating_sub(1);
        let start = self.starts.get(zero_based).copied().unwrap_or(0);
        let end = self
            .starts
            .get(zero_based + 1)
            .copied()
            .unwrap_or(self.text.len());
        self.text[start..end]
            .trim_end_matches(['\n', '\r'])
            .to_string()
    }
}
