//! Filepath: src/core/filter.rs
//! Path eligibility for extraction.
//!
//! Prefix lists are compared case-insensitively. When both lists are set,
//! the included list acts as an allow-list exception to the excluded one.

use regex::Regex;

#[derive(Debug, Clone, Default)]
pub struct PathFilter
{
    /// Lowercased prefixes
    included: Vec<String>,

    /// Lowercased prefixes
    excluded: Vec<String>,

    /// Optional regex every eligible path must also match
    file_pattern: Option<Regex>,
}

impl PathFilter
{
    pub fn new(
        included: &[String],
        excluded: &[String],
        file_pattern: Option<Regex>,
    ) -> Self
    {
        Self {
            included: lowercase_all(included),
            excluded: lowercase_all(excluded),
            file_pattern,
        }
    }

    /// Whether markers in `path` should be extracted.
    pub fn is_eligible(
        &self,
        path: &str,
    ) -> bool
    {
        let lowered = path.to_lowercase();
        let in_excluded = has_prefix(&self.excluded, &lowered);
        let in_included = has_prefix(&self.included, &lowered);

        let dropped = match (self.excluded.is_empty(), self.included.is_empty())
        {
            (true, true) => false,
            (false, true) => in_excluded,
            (true, false) => !in_included,
            (false, false) => in_excluded && !in_included,
        };

        if dropped
        {
            return false;
        }

        self.file_pattern
            .as_ref()
            .is_none_or(|re| re.is_match(path))
    }
}

fn lowercase_all(items: &[String]) -> Vec<String>
{
    items
        .iter()
        .map(|s| s.to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn has_prefix(
    prefixes: &[String],
    lowered_path: &str,
) -> bool
{
    prefixes
        .iter()
        .any(|p| lowered_path.starts_with(p.as_str()))
}
