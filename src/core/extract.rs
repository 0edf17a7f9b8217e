//! Filepath: src/core/extract.rs
//! Single-pass marker extraction over a unified diff.
//!
//! States: awaiting the first file header, then inside an eligible or
//! ineligible file. Lines before the first file header, lines of
//! ineligible files, and the preamble of a file (`index`, `---`, `+++`,
//! mode lines before the first hunk) are skipped without touching the
//! line counter. The pass is pure: diff text in, ordered items out.

use std::{borrow::Cow, fmt};

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace, warn};

use crate::core::{
    diff::{ChangeKind, DiffLine, ExtractError, LineCounter, classify},
    filter::PathFilter,
    matcher::{Extracted, LabelExtractor, MarkerMatcher},
    snippet::{self, SnippetWindow},
};

/// One marker found in the diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerItem
{
    /// Marker text with labels stripped and trimmed
    pub title: String,

    /// New-side path of the file
    pub file: String,

    /// New-file line number (see `LineCounter` for deletions)
    pub line: u32,

    pub kind: ChangeKind,

    /// Issue label first, then inline labels in line order
    pub labels: Vec<String>,

    /// Issue body; only additions carry one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl fmt::Display for MarkerItem
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        write!(f, "{} @ {}:{}", self.title, self.file, self.line)
    }
}

/// Where the permalink in an issue body points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permalink
{
    pub server_url: String,
    pub repository: String,
    pub sha: String,
}

impl Permalink
{
    /// `<server>/<repo>/blob/<sha>/<file>#L<start>-L<end>`
    pub fn url(
        &self,
        file: &str,
        start: u32,
        end: u32,
    ) -> String
    {
        format!(
            "{}/{}/blob/{}/{}#L{start}-L{end}",
            self.server_url
                .trim_end_matches('/'),
            self.repository,
            self.sha,
            file.trim_start_matches('/'),
        )
    }
}

/// Fully resolved, precompiled extraction settings.
#[derive(Debug, Clone)]
pub struct FilterConfig
{
    pub matcher: MarkerMatcher,
    pub labels: LabelExtractor,
    pub paths: PathFilter,
    pub window: SnippetWindow,

    /// Fence tag for snippets; file extension when unset
    pub snippet_syntax: Option<String>,

    /// Longer lines are counted but never matched
    pub max_line_length: Option<usize>,

    pub permalink: Option<Permalink>,
}

impl FilterConfig
{
    /// Settings with no path filtering, default window, no permalink.
    pub fn new(
        matcher: MarkerMatcher,
        labels: LabelExtractor,
    ) -> Self
    {
        Self {
            matcher,
            labels,
            paths: PathFilter::default(),
            window: SnippetWindow::default(),
            snippet_syntax: None,
            max_line_length: None,
            permalink: None,
        }
    }

    pub fn with_paths(
        mut self,
        paths: PathFilter,
    ) -> Self
    {
        self.paths = paths;
        self
    }

    pub fn with_window(
        mut self,
        window: SnippetWindow,
    ) -> Self
    {
        self.window = window;
        self
    }

    pub fn with_snippet_syntax(
        mut self,
        syntax: Option<String>,
    ) -> Self
    {
        self.snippet_syntax = syntax;
        self
    }

    pub fn with_max_line_length(
        mut self,
        max: Option<usize>,
    ) -> Self
    {
        self.max_line_length = max;
        self
    }

    pub fn with_permalink(
        mut self,
        permalink: Option<Permalink>,
    ) -> Self
    {
        self.permalink = permalink;
        self
    }
}

/// Driver state between lines
#[derive(Debug, Clone)]
enum FileState<'a>
{
    AwaitingFile,
    HasFile
    {
        path: Cow<'a, str>,
        eligible: bool,
    },
    /// File header without a recoverable path; its lines are skipped
    Unreadable,
}

/// Walk `diff` once and collect every marker on added or removed lines.
#[instrument(skip_all, fields(bytes = diff.len()))]
pub fn extract(
    diff: &str,
    config: &FilterConfig,
) -> Result<Vec<MarkerItem>, ExtractError>
{
    let lines: Vec<&str> = diff
        .lines()
        .collect();

    let mut state = FileState::AwaitingFile;
    let mut counter = LineCounter::default();
    // Index of the first line after the current file's latest hunk header
    let mut hunk_start: Option<usize> = None;
    let mut items = Vec::new();

    for (idx, raw) in lines
        .iter()
        .enumerate()
    {
        match classify(raw, idx + 1)?
        {
            DiffLine::FileHeader(Some(path)) =>
            {
                let eligible = config
                    .paths
                    .is_eligible(&path);
                if !eligible
                {
                    debug!(file = %path, "skipping ineligible file");
                }

                state = FileState::HasFile { path, eligible };
                hunk_start = None;
            }

            DiffLine::FileHeader(None) =>
            {
                warn!(line = idx + 1, header = *raw, "skipping file with unreadable header");
                state = FileState::Unreadable;
                hunk_start = None;
            }

            DiffLine::HunkHeader(new_start) =>
            {
                counter.on_hunk_header(new_start);
                hunk_start = Some(idx + 1);
            }

            DiffLine::Content(kind) =>
            {
                let FileState::HasFile { path, eligible: true } = &state
                else
                {
                    continue;
                };
                let path: &str = path;
                let Some(hunk_start) = hunk_start
                else
                {
                    continue;
                };

                let line = counter.next_for(kind);

                let Some(change) = kind.change()
                else
                {
                    continue;
                };

                if config
                    .max_line_length
                    .is_some_and(|max| raw.len() > max)
                {
                    trace!(file = path, line, "line too long for matching");
                    continue;
                }

                let Some(matched) = config
                    .matcher
                    .find(raw)
                else
                {
                    continue;
                };

                let Extracted { labels, title } = config
                    .labels
                    .extract(raw, matched);
                if title.is_empty()
                {
                    debug!(file = path, line, "marker without text ignored");
                    continue;
                }

                let body = match change
                {
                    ChangeKind::Addition =>
                    {
                        Some(issue_body(&title, path, line, &lines, idx, hunk_start, config))
                    }
                    ChangeKind::Deletion => None,
                };

                items.push(MarkerItem {
                    title,
                    file: path.to_string(),
                    line,
                    kind: change,
                    labels,
                    body,
                });
            }
        }
    }

    debug!(items = items.len(), "extraction finished");
    Ok(items)
}

/// Markdown body for a new issue: title, line, permalink, snippet.
fn issue_body(
    title: &str,
    file: &str,
    line: u32,
    lines: &[&str],
    idx: usize,
    hunk_start: usize,
    config: &FilterConfig,
) -> String
{
    let mut body = format!("**{title}**\n\nLine: {line}");

    if let Some(link) = &config.permalink
    {
        let start = line
            .saturating_sub(config.window.before as u32)
            .max(1);
        let end = line.saturating_add(config.window.after as u32);

        body.push('\n');
        body.push_str(&link.url(file, start, end));
    }

    let syntax = config
        .snippet_syntax
        .as_deref()
        .unwrap_or_else(|| syntax_for(file));

    if let Some(snippet) = snippet::build(lines, idx, hunk_start, config.window, syntax)
    {
        body.push_str("\n\n");
        body.push_str(&snippet);
    }

    body
}

/// Fence tag guessed from the file extension
fn syntax_for(file: &str) -> &str
{
    Utf8Path::new(file)
        .extension()
        .unwrap_or("")
}
