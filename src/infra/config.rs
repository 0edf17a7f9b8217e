//! Filepath: src/infra/config.rs
//! Run configuration.
//!
//! Sources, lowest priority first:
//!   1) config file (`--config`, else `todo2issue.toml` / `.todo2issue.toml`)
//!   2) `GITHUB_*` variables (repository, sha, server_url, token)
//!   3) `INPUT_*` variables (GitHub Actions inputs)
//!   4) `TODO2ISSUE_*` variables
//!   5) `--set key=value` flags
//!
//! Actions input names (`todo`, `comment`, `labels_pattern`, ...) are
//! accepted as aliases of the canonical keys. Setting both an alias and its
//! canonical key in the merged configuration is rejected by the loader.
//!
//! List keys given as strings (environment, `--set`) are split on commas
//! outside brackets, so `/{2,3}` stays one pattern.

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use camino::Utf8Path;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    cli::{AppContext, InitArgs},
    core::{
        extract::{FilterConfig, Permalink},
        filter::PathFilter,
        matcher::{LabelExtractor, MarkerMatcher},
        snippet::SnippetWindow,
    },
};

/// Config files probed in the working directory, in order
const CONFIG_FILES: [&str; 2] = ["todo2issue.toml", ".todo2issue.toml"];

/// Largest accepted snippet window on either side
const MAX_WINDOW: usize = 15;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError
{
    #[error("failed to load configuration")]
    Load(#[from] config::ConfigError),

    #[error("missing required option `{0}`")]
    Missing(&'static str),

    #[error("option `{option}` is not a valid regular expression")]
    InvalidPattern
    {
        option: &'static str,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// `owner/name` of the tracker repository
    pub repository: Option<String>,

    /// Commit the diff ends at; used for permalinks and close comments
    pub sha: Option<String>,

    /// Commit the diff starts at (remote comparison)
    pub base_sha: Option<String>,

    /// API token handed to `gh`; never written back out
    #[serde(skip_serializing)]
    pub token: Option<String>,

    /// Web root for permalinks
    pub server_url: String,

    /// Marker signatures (regex fragments)
    #[serde(alias = "todo", deserialize_with = "list_or_csv")]
    pub markers: Vec<String>,

    /// Comment syntax fragments (regex fragments)
    #[serde(alias = "comment", deserialize_with = "list_or_csv")]
    pub comment_patterns: Vec<String>,

    /// Regex for inline labels; capture group 1 is the label when present
    #[serde(alias = "labels_pattern")]
    pub inline_label_pattern: Option<String>,

    /// Regex removed from titles; defaults to the inline label pattern
    #[serde(alias = "labels_replace_pattern")]
    pub label_strip_pattern: Option<String>,

    /// Label every created issue gets first
    #[serde(alias = "github_label")]
    pub issue_label: String,

    /// Characters trimmed from both ends of a title
    pub trim: String,

    pub lines_before: usize,
    pub lines_after: usize,

    /// Path prefixes (case-insensitive)
    #[serde(deserialize_with = "list_or_csv")]
    pub included_paths: Vec<String>,
    #[serde(deserialize_with = "list_or_csv")]
    pub excluded_paths: Vec<String>,

    /// Regex a path must match to be scanned
    pub file_pattern: Option<String>,

    /// Longer diff lines are never matched
    pub max_line_length: Option<usize>,

    pub max_title_length: Option<usize>,

    /// Snippet fence tag; file extension when unset
    pub snippet_syntax: Option<String>,

    /// Delay between tracker writes in milliseconds
    #[serde(alias = "timeout")]
    pub delay_ms: u64,

    /// Extract and report only, never touch the tracker
    #[serde(alias = "nopublish")]
    pub no_publish: bool,
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            repository: None,
            sha: None,
            base_sha: None,
            token: None,
            server_url: "https://github.com".to_string(),
            markers: vec!["TODO".to_string()],
            comment_patterns: vec!["//".to_string()],
            inline_label_pattern: None,
            label_strip_pattern: None,
            issue_label: "TODO".to_string(),
            trim: " :\"".to_string(),
            lines_before: 3,
            lines_after: 7,
            included_paths: Vec::new(),
            excluded_paths: Vec::new(),
            file_pattern: None,
            max_line_length: None,
            max_title_length: None,
            snippet_syntax: None,
            delay_ms: 1000,
            no_publish: false,
        }
    }
}

impl Config
{
    pub fn require_repository(&self) -> Result<&str, ConfigError>
    {
        self.repository
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or(ConfigError::Missing("repository"))
    }

    pub fn delay(&self) -> Duration
    {
        Duration::from_millis(self.delay_ms)
    }

    /// Permalink target, when both repository and sha are known
    pub fn permalink(&self) -> Option<Permalink>
    {
        Some(Permalink {
            server_url: self
                .server_url
                .clone(),
            repository: self
                .repository
                .clone()?,
            sha: self
                .sha
                .clone()?,
        })
    }

    pub fn window(&self) -> SnippetWindow
    {
        SnippetWindow {
            before: self
                .lines_before
                .min(MAX_WINDOW),
            after: self
                .lines_after
                .min(MAX_WINDOW),
        }
    }

    /// Compile every pattern once and build the extraction settings.
    pub fn filter_config(&self) -> Result<FilterConfig, ConfigError>
    {
        let markers = non_empty(&self.markers);
        if markers.is_empty()
        {
            return Err(ConfigError::Missing("markers"));
        }

        let comments = non_empty(&self.comment_patterns);
        if comments.is_empty()
        {
            return Err(ConfigError::Missing("comment_patterns"));
        }

        let matcher = MarkerMatcher::new(&comments, &markers)
            .map_err(|source| ConfigError::InvalidPattern { option: "markers", source })?;

        let labels = LabelExtractor::new(
            self.issue_label
                .clone(),
            compile("inline_label_pattern", &self.inline_label_pattern)?,
            compile("label_strip_pattern", &self.label_strip_pattern)?,
            &self.trim,
        )
        .with_max_title_length(self.max_title_length);

        let paths = PathFilter::new(
            &self.included_paths,
            &self.excluded_paths,
            compile("file_pattern", &self.file_pattern)?,
        );

        Ok(FilterConfig::new(matcher, labels)
            .with_paths(paths)
            .with_window(self.window())
            .with_snippet_syntax(
                self.snippet_syntax
                    .clone(),
            )
            .with_max_line_length(self.max_line_length)
            .with_permalink(self.permalink()))
    }

    /// Printable summary with the token masked
    pub fn describe(&self) -> Vec<(&'static str, String)>
    {
        let opt = |v: &Option<String>| {
            v.clone()
                .unwrap_or_else(|| "-".to_string())
        };

        vec![
            ("repository", opt(&self.repository)),
            ("base sha", opt(&self.base_sha)),
            ("sha", opt(&self.sha)),
            ("token", mask_token(self.token.as_deref())),
            ("markers", self.markers.join(", ")),
            ("comment patterns", self.comment_patterns.join(", ")),
            ("inline label pattern", opt(&self.inline_label_pattern)),
            ("label strip pattern", opt(&self.label_strip_pattern)),
            ("issue label", self.issue_label.clone()),
            ("trim", format!("{:?}", self.trim)),
            ("delay", format!("{}ms", self.delay_ms)),
            ("lines before", self.window().before.to_string()),
            ("lines after", self.window().after.to_string()),
        ]
    }
}

fn non_empty(items: &[String]) -> Vec<String>
{
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn compile(
    option: &'static str,
    pattern: &Option<String>,
) -> Result<Option<Regex>, ConfigError>
{
    match pattern
        .as_deref()
        .filter(|p| !p.is_empty())
    {
        Some(p) => Regex::new(p)
            .map(Some)
            .map_err(|source| ConfigError::InvalidPattern { option, source }),
        None => Ok(None),
    }
}

/// `abcd1234` -> `a******4`
fn mask_token(token: Option<&str>) -> String
{
    let Some(token) = token.filter(|t| !t.is_empty())
    else
    {
        return "-".to_string();
    };

    let chars: Vec<char> = token
        .chars()
        .collect();
    if chars.len() <= 2
    {
        return "*".repeat(chars.len());
    }

    let mut masked = String::with_capacity(chars.len());
    masked.push(chars[0]);
    masked.push_str(&"*".repeat(chars.len() - 2));
    masked.push(chars[chars.len() - 1]);
    masked
}

/// Load configuration from files, the process environment and overrides.
pub fn load_config(
    file: Option<&Utf8Path>,
    overrides: &[(String, String)],
) -> Result<Config, ConfigError>
{
    build_config(file, None, overrides)
}

/// `env` replaces the process environment when given (tests).
fn build_config(
    file: Option<&Utf8Path>,
    env: Option<config::Map<String, String>>,
    overrides: &[(String, String)],
) -> Result<Config, ConfigError>
{
    let mut builder = config::Config::builder();

    match file
    {
        Some(path) =>
        {
            builder = builder.add_source(config::File::from(path.as_std_path()));
        }
        None =>
        {
            if let Some(found) = CONFIG_FILES
                .iter()
                .map(Path::new)
                .find(|p| p.exists())
            {
                builder = builder.add_source(config::File::from(found));
            }
        }
    }

    for prefix in ["GITHUB", "INPUT", "TODO2ISSUE"]
    {
        builder = builder.add_source(env_source(prefix, env.clone()));
    }

    for (key, value) in overrides
    {
        builder = builder.set_override(key.as_str(), value.as_str())?;
    }

    let parsed: Config = builder
        .build()?
        .try_deserialize()?;

    Ok(parsed)
}

fn env_source(
    prefix: &str,
    env: Option<config::Map<String, String>>,
) -> config::Environment
{
    config::Environment::with_prefix(prefix)
        .ignore_empty(true)
        .try_parsing(true)
        .source(env)
}

/// List keys take a TOML array, or a comma-separated string from the
/// environment or `--set`.
fn list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany
    {
        Many(Vec<String>),
        One(String),
        // `try_parsing` turns values like `true` or `42` into scalars
        Bool(bool),
        Int(i64),
        Float(f64),
    }

    Ok(match OneOrMany::deserialize(deserializer)?
    {
        OneOrMany::Many(items) => items,
        OneOrMany::One(csv) => split_list(&csv),
        OneOrMany::Bool(b) => vec![b.to_string()],
        OneOrMany::Int(n) => vec![n.to_string()],
        OneOrMany::Float(x) => vec![x.to_string()],
    })
}

/// Split on commas outside `{}`, `[]` and `()` so regex fragments like
/// `/{2,3}` survive. `\,` is a literal comma. Empty entries are dropped.
fn split_list(csv: &str) -> Vec<String>
{
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut chars = csv.chars();

    while let Some(c) = chars.next()
    {
        match c
        {
            '\\' =>
            {
                match chars.next()
                {
                    Some(',') => current.push(','),
                    Some(next) =>
                    {
                        current.push(c);
                        current.push(next);
                    }
                    None => current.push(c),
                }
                continue;
            }
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 =>
            {
                items.push(std::mem::take(&mut current));
                continue;
            }
            _ =>
            {}
        }
        current.push(c);
    }
    items.push(current);

    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join(CONFIG_FILES[0]);

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            println!("Would write {}:\n{}", config_path, toml_string);
        }
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path);
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn env(vars: &[(&str, &str)]) -> Option<config::Map<String, String>>
    {
        Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    /// Empty config file so the working directory is never probed
    fn empty_file() -> (tempfile::TempDir, camino::Utf8PathBuf)
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("empty.toml");
        std::fs::write(&path, "").unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(path).unwrap();
        (dir, path)
    }

    #[test]
    fn test_defaults_compile()
    {
        let (_dir, file) = empty_file();
        let config = build_config(Some(&file), env(&[]), &[]).unwrap();
        assert_eq!(config.markers, vec!["TODO"]);
        assert_eq!(config.delay(), Duration::from_millis(1000));
        assert!(
            config
                .filter_config()
                .is_ok()
        );
    }

    #[test]
    fn test_actions_inputs_and_precedence()
    {
        let vars = env(&[
            ("GITHUB_REPOSITORY", "acme/app"),
            ("GITHUB_SHA", "fromgithub"),
            ("INPUT_SHA", "frominput"),
            ("INPUT_TODO", "TODO,FIXME"),
            ("INPUT_LINES_BEFORE", "20"),
            ("INPUT_LINES_AFTER", ""),
            ("INPUT_NOPUBLISH", "true"),
            ("TODO2ISSUE_EXCLUDED_PATHS", "vendor/,third_party/"),
        ]);
        let (_dir, file) = empty_file();
        let config = build_config(Some(&file), vars, &[]).unwrap();

        assert_eq!(config.repository.as_deref(), Some("acme/app"));
        assert_eq!(config.sha.as_deref(), Some("frominput"));
        assert_eq!(config.markers, vec!["TODO", "FIXME"]);
        assert_eq!(config.window(), SnippetWindow { before: 15, after: 7 });
        assert!(config.no_publish);
        assert_eq!(config.excluded_paths, vec!["vendor/", "third_party/"]);
    }

    #[test]
    fn test_overrides_win()
    {
        let vars = env(&[("TODO2ISSUE_ISSUE_LABEL", "from-env")]);
        let overrides = vec![
            ("issue_label".to_string(), "from-flag".to_string()),
            ("markers".to_string(), "TODO, FIXME".to_string()),
        ];
        let (_dir, file) = empty_file();
        let config = build_config(Some(&file), vars, &overrides).unwrap();

        assert_eq!(config.issue_label, "from-flag");
        assert_eq!(config.markers, vec!["TODO", "FIXME"]);
    }

    #[test]
    fn test_file_source()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("todo2issue.toml");
        std::fs::write(
            &path,
            "markers = [\"HACK\"]\nexcluded_paths = [\"gen/\"]\nlabels_pattern = '\\[(\\w+)\\]'\n",
        )
        .unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(path).unwrap();

        let config = build_config(Some(&path), env(&[]), &[]).unwrap();
        assert_eq!(config.markers, vec!["HACK"]);
        assert_eq!(config.excluded_paths, vec!["gen/"]);
        assert_eq!(config.inline_label_pattern.as_deref(), Some(r"\[(\w+)\]"));
    }

    #[test]
    fn test_split_list_keeps_quantifiers()
    {
        assert_eq!(split_list("//, #"), vec!["//", "#"]);
        assert_eq!(split_list(r"/{2,3}, --"), vec![r"/{2,3}", "--"]);
        assert_eq!(split_list("[,;]x,(a,b)"), vec!["[,;]x", "(a,b)"]);
        assert_eq!(split_list(r"a\,b,c"), vec!["a,b", "c"]);
        assert_eq!(split_list(r"\d+,x"), vec![r"\d+", "x"]);
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn test_regex_fragment_from_env_is_not_split()
    {
        let vars = env(&[("INPUT_COMMENT", "/{2,3},#")]);
        let (_dir, file) = empty_file();
        let config = build_config(Some(&file), vars, &[]).unwrap();

        assert_eq!(config.comment_patterns, vec!["/{2,3}", "#"]);

        // A lone value that type-parses is still one list entry
        let vars = env(&[("INPUT_TODO", "42")]);
        let numeric = build_config(Some(&file), vars, &[]).unwrap();
        assert_eq!(numeric.markers, vec!["42"]);
        assert!(
            config
                .filter_config()
                .is_ok()
        );
    }

    #[test]
    fn test_invalid_pattern_names_option()
    {
        let config = Config { file_pattern: Some("(".to_string()), ..Config::default() };
        let err = config
            .filter_config()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { option: "file_pattern", .. }));
    }

    #[test]
    fn test_empty_markers_are_missing()
    {
        let config = Config { markers: vec![" ".to_string()], ..Config::default() };
        assert!(matches!(config.filter_config(), Err(ConfigError::Missing("markers"))));
    }

    #[test]
    fn test_permalink_needs_repo_and_sha()
    {
        let mut config = Config { repository: Some("acme/app".to_string()), ..Config::default() };
        assert!(
            config
                .permalink()
                .is_none()
        );

        config.sha = Some("abc".to_string());
        assert_eq!(
            config
                .permalink()
                .unwrap()
                .url("src/a.rs", 1, 5),
            "https://github.com/acme/app/blob/abc/src/a.rs#L1-L5"
        );
    }

    #[test]
    fn test_token_is_masked()
    {
        assert_eq!(mask_token(Some("ghp_secret")), "g********t");
        assert_eq!(mask_token(None), "-");
        assert_eq!(mask_token(Some("ab")), "**");
    }
}
