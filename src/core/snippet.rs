//! Filepath: src/core/snippet.rs
//! Code-context snippets for new issues.
//!
//! A snippet is a window of diff lines around a marker, bounded by the
//! enclosing hunk, with change markers stripped, blank lines dropped and
//! the common leading-tab indentation removed. Git's `\` note lines are
//! dropped too.

/// Indentation character removed from snippet lines
const INDENT: char = '\t';

/// Lines to capture around a marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnippetWindow
{
    pub before: usize,
    pub after: usize,
}

impl Default for SnippetWindow
{
    fn default() -> Self
    {
        Self { before: 3, after: 7 }
    }
}

/// Build a fenced snippet around `lines[current]`.
///
/// The window never reaches before `hunk_start` (first line after the hunk
/// header) and stops at the next file or hunk header. Returns `None` when
/// nothing but blank lines remain.
pub fn build(
    lines: &[&str],
    current: usize,
    hunk_start: usize,
    window: SnippetWindow,
    syntax: &str,
) -> Option<String>
{
    if current >= lines.len()
    {
        return None;
    }

    let start = current
        .saturating_sub(window.before)
        .max(hunk_start)
        .min(current);
    let mut end = current
        .saturating_add(window.after)
        .min(lines.len() - 1);

    // Never run into the next hunk or file
    if let Some(offset) = lines[current + 1..=end]
        .iter()
        .position(|l| is_header(l))
    {
        end = current + offset;
    }

    let body: Vec<&str> = lines[start..=end]
        .iter()
        // `\ No newline at end of file` and similar git notes
        .filter(|l| !l.starts_with('\\'))
        .map(|l| strip_change_marker(l))
        .filter(|l| {
            !l.trim()
                .is_empty()
        })
        .collect();

    if body.is_empty()
    {
        return None;
    }

    Some(fence(&dedent_tabs(&body), syntax))
}

fn is_header(line: &str) -> bool
{
    line.starts_with("@@") || line.starts_with("diff --git ")
}

fn strip_change_marker(line: &str) -> &str
{
    match line.as_bytes().first()
    {
        Some(b'+' | b'-' | b' ') => &line[1..],
        _ => line,
    }
}

/// Remove the smallest leading-tab run shared by all lines
fn dedent_tabs(lines: &[&str]) -> Vec<String>
{
    let indent = lines
        .iter()
        .map(|l| {
            l.chars()
                .take_while(|c| *c == INDENT)
                .count()
        })
        .min()
        .unwrap_or(0);

    // INDENT is one byte, so `indent` chars == `indent` bytes
    lines
        .iter()
        .map(|l| l[indent..].to_string())
        .collect()
}

fn fence(
    lines: &[String],
    syntax: &str,
) -> String
{
    format!("```{syntax}\n{}\n```", lines.join("\n"))
}
