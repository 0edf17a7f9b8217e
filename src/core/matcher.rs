//! Filepath: src/core/matcher.rs
//! Marker matching and inline-label extraction.
//!
//! A marker pattern is composed from a comment fragment and a signature
//! fragment, e.g. `//` + `TODO` accepts `// TODO fix`, `//TODO: fix`, and
//! `// TODO(security): fix`. All patterns are compiled once per run.

use itertools::Itertools;
use regex::Regex;

/// Compiled comment × signature patterns, tried in priority order.
#[derive(Debug, Clone)]
pub struct MarkerMatcher
{
    patterns: Vec<Regex>,
}

impl MarkerMatcher
{
    /// Build one pattern per (comment, signature) pair. Comments are the
    /// outer loop, signatures the inner loop; that order is the priority.
    pub fn new(
        comments: &[String],
        signatures: &[String],
    ) -> Result<Self, regex::Error>
    {
        let patterns = comments
            .iter()
            .cartesian_product(signatures)
            .map(|(comment, signature)| Regex::new(&compose(comment, signature)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// Return the marker text of the first pattern that matches `line`.
    pub fn find<'a>(
        &self,
        line: &'a str,
    ) -> Option<&'a str>
    {
        self.patterns
            .iter()
            .find_map(|re| {
                let caps = re.captures(line)?;

                // One of the two alternatives always participates
                caps.name("text")
                    .or_else(|| caps.name("labelled"))
                    .map(|m| m.as_str())
            })
    }

    pub fn pattern_count(&self) -> usize
    {
        self.patterns
            .len()
    }
}

/// `<comment> ?<signature>` then either a `' '`/`':'` separator and the
/// rest of the line, or an inline label starting with `(`.
fn compose(
    comment: &str,
    signature: &str,
) -> String
{
    format!(r"(?:{comment}) ?(?:{signature})(?:[ :](?P<text>.+)|(?P<labelled>\(.+))")
}

/// Labels and title derived from one matched marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted
{
    pub labels: Vec<String>,
    pub title: String,
}

/// Inline-label extraction and title cleanup.
#[derive(Debug, Clone)]
pub struct LabelExtractor
{
    issue_label: String,
    inline: Option<Regex>,
    strip: Option<Regex>,
    trim: Vec<char>,
    max_title_length: Option<usize>,
}

impl LabelExtractor
{
    /// `strip` falls back to `inline` when unset, so every collected label
    /// is also removed from the title.
    pub fn new(
        issue_label: impl Into<String>,
        inline: Option<Regex>,
        strip: Option<Regex>,
        trim: &str,
    ) -> Self
    {
        let strip = strip.or_else(|| inline.clone());

        Self {
            issue_label: issue_label.into(),
            inline,
            strip,
            trim: trim
                .chars()
                .collect(),
            max_title_length: None,
        }
    }

    pub fn with_max_title_length(
        mut self,
        max: Option<usize>,
    ) -> Self
    {
        self.max_title_length = max;
        self
    }

    /// Collect labels from `raw_line` and clean `matched` into a title.
    /// The configured issue label always comes first; inline labels are
    /// appended in line order without deduplication.
    pub fn extract(
        &self,
        raw_line: &str,
        matched: &str,
    ) -> Extracted
    {
        let mut labels = vec![self
            .issue_label
            .clone()];

        let stripped = match (&self.inline, &self.strip)
        {
            (Some(inline), strip) =>
            {
                for caps in inline.captures_iter(raw_line)
                {
                    if let Some(m) = caps
                        .get(1)
                        .or_else(|| caps.get(0))
                    {
                        labels.push(
                            m.as_str()
                                .to_string(),
                        );
                    }
                }

                match strip
                {
                    Some(re) => re
                        .replace_all(matched, "")
                        .into_owned(),
                    None => matched.to_string(),
                }
            }
            (None, _) => matched.to_string(),
        };

        Extracted { labels, title: self.clean_title(&stripped) }
    }

    fn clean_title(
        &self,
        text: &str,
    ) -> String
    {
        let trimmed = text
            .trim_matches(|c| {
                self.trim
                    .contains(&c)
            })
            .trim_end();

        match self.max_title_length
        {
            Some(max)
                if trimmed
                    .chars()
                    .count()
                    > max =>
            {
                trimmed
                    .chars()
                    .take(max)
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            }
            _ => trimmed.to_string(),
        }
    }
}
