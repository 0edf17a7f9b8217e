//! Filepath: src/core/diff.rs
//! Unified-diff line vocabulary.
//! - `classify` turns one raw line into a file header, hunk header, or
//!   content line (addition / deletion / context)
//! - `LineCounter` tracks the new-file line number across hunks
//!
//! Only the new side of the diff is numbered. Deletions are reported at
//! the counter's current value without advancing it.
//!
//! Paths git had to quote (`core.quotePath`, non-ASCII or special
//! characters) arrive as `"b/caf\303\251.rs"` and are unquoted here.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Kind of a content line inside a hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind
{
    Addition,
    Deletion,
    Context,
}

impl LineKind
{
    /// The change this line represents, if any. Context lines carry none.
    pub fn change(self) -> Option<ChangeKind>
    {
        match self
        {
            LineKind::Addition => Some(ChangeKind::Addition),
            LineKind::Deletion => Some(ChangeKind::Deletion),
            LineKind::Context => None,
        }
    }
}

/// Side of the diff a marker was found on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind
{
    Addition,
    Deletion,
}

/// One classified diff line. File headers borrow the path from the input
/// unless it had to be unquoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine<'a>
{
    /// `diff --git a/<old> b/<new>`; carries `<new>`, or `None` when the
    /// header names no path that can be recovered
    FileHeader(Option<Cow<'a, str>>),
    /// `@@ -<old> +<new> @@`; carries the new-range start
    HunkHeader(u32),
    /// Anything else
    Content(LineKind),
}

/// Extraction failures. Everything else (non-matching lines, unknown
/// prefixes) is silently skipped.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ExtractError
{
    /// The new-range start of a hunk header could not be parsed
    #[error("malformed hunk header at diff line {line}: {text:?}")]
    #[diagnostic(
        code(todo2issue::diff::malformed_hunk_header),
        help("hunk headers look like `@@ -10,5 +12,7 @@`; line numbers after this point cannot be trusted")
    )]
    MalformedHunkHeader
    {
        /// 1-based line in the diff text
        line: usize,
        text: String,
    },
}

const FILE_HEADER_PREFIX: &str = "diff --git ";
const HUNK_HEADER_PREFIX: &str = "@@";

/// Classify a raw diff line. `at` is the 1-based position of the line in
/// the diff, used only for error reporting.
pub fn classify(
    raw: &str,
    at: usize,
) -> Result<DiffLine<'_>, ExtractError>
{
    if let Some(rest) = raw.strip_prefix(FILE_HEADER_PREFIX)
    {
        return Ok(DiffLine::FileHeader(parse_new_path(rest)));
    }

    if raw.starts_with(HUNK_HEADER_PREFIX)
    {
        return parse_hunk_start(raw)
            .map(DiffLine::HunkHeader)
            .ok_or_else(|| ExtractError::MalformedHunkHeader { line: at, text: raw.to_string() });
    }

    // Blank lines are context and never marker candidates
    if raw
        .trim()
        .is_empty()
    {
        return Ok(DiffLine::Content(LineKind::Context));
    }

    let kind = match raw.as_bytes()[0]
    {
        b'+' => LineKind::Addition,
        b'-' => LineKind::Deletion,
        _ => LineKind::Context,
    };

    Ok(DiffLine::Content(kind))
}

/// New-side path from the part of `diff --git a/<old> b/<new>` after the
/// prefix. Either side may be C-quoted.
fn parse_new_path(rest: &str) -> Option<Cow<'_, str>>
{
    let rest = rest.trim_end();

    if rest.ends_with('"')
    {
        // Inside a quoted path `"` is always escaped, so ` "b/` only
        // occurs where the new side starts
        let start = rest.rfind(" \"b/")? + 1;
        let path = unquote(&rest[start..])?;
        let path = path.strip_prefix("b/")?;
        return (!path.is_empty()).then(|| Cow::Owned(path.to_string()));
    }

    // Split from the end so old paths containing " b/" stay intact
    let idx = rest.rfind(" b/")?;
    let path = &rest[idx + 3..];

    (!path.is_empty()).then_some(Cow::Borrowed(path))
}

/// Decode a git C-quoted string, quotes included. Octal escapes are raw
/// bytes; invalid UTF-8 is replaced.
fn unquote(quoted: &str) -> Option<String>
{
    let inner = quoted
        .strip_prefix('"')?
        .strip_suffix('"')?;

    let mut bytes = Vec::with_capacity(inner.len());
    let mut iter = inner
        .bytes()
        .peekable();

    while let Some(b) = iter.next()
    {
        if b != b'\\'
        {
            bytes.push(b);
            continue;
        }

        let decoded = match iter.next()?
        {
            b'"' => b'"',
            b'\\' => b'\\',
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'v' => 0x0b,
            d @ b'0'..=b'7' =>
            {
                let mut value = u32::from(d - b'0');
                for _ in 0..2
                {
                    let next = iter.next_if(|c| (b'0'..=b'7').contains(c))?;
                    value = value * 8 + u32::from(next - b'0');
                }
                u8::try_from(value).ok()?
            }
            _ => return None,
        };
        bytes.push(decoded);
    }

    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parse the start of the `+` range from `@@ -a,b +c,d @@ ...`
fn parse_hunk_start(raw: &str) -> Option<u32>
{
    let body = raw
        .strip_prefix(HUNK_HEADER_PREFIX)?
        .trim_start();
    let end = body.find(HUNK_HEADER_PREFIX)?;

    let new_range = body[..end]
        .split_whitespace()
        .find_map(|tok| tok.strip_prefix('+'))?;

    new_range
        .split(',')
        .next()?
        .parse::<u32>()
        .ok()
}

/// New-file line counter, reset by every hunk header.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LineCounter
{
    next: u32,
}

impl LineCounter
{
    /// Restart numbering at the hunk's new-range start
    pub fn on_hunk_header(
        &mut self,
        new_start: u32,
    )
    {
        self.next = new_start;
    }

    /// Number for the next content line. Advances unless it is a deletion.
    pub fn next_for(
        &mut self,
        kind: LineKind,
    ) -> u32
    {
        let current = self.next;

        if kind != LineKind::Deletion
        {
            self.next = self
                .next
                .saturating_add(1);
        }

        current
    }

    pub fn current(&self) -> u32
    {
        self.next
    }
}
