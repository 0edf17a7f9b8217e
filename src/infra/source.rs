//! Filepath: src/infra/source.rs
//! Where the diff text comes from.
//! - a patch file (`~` and `$VAR` expanded) or stdin (`-`)
//! - `git diff <base> <head>` in the working directory
//! - the remote comparison of two commits through `gh api`
//!
//! Without an explicit choice, a configured `base_sha` selects the remote
//! comparison (the CI case) and stdin is used otherwise.

use std::{
    fmt,
    io::Read,
    process::{Command, Stdio},
};

use anyhow::{Context, Result, bail};
use camino::Utf8PathBuf;
use tracing::{debug, instrument};

use crate::{
    cli::DiffArgs,
    infra::{
        config::{Config, ConfigError},
        github::GhClient,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffSource
{
    File(Utf8PathBuf),
    Stdin,
    Git
    {
        base: String,
        head: String,
    },
    Remote
    {
        repository: String,
        base: String,
        head: String,
    },
}

impl fmt::Display for DiffSource
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        match self
        {
            DiffSource::File(path) => write!(f, "file {path}"),
            DiffSource::Stdin => write!(f, "stdin"),
            DiffSource::Git { base, head } => write!(f, "git diff {base} {head}"),
            DiffSource::Remote { repository, base, head } =>
            {
                write!(f, "{repository} compare {base}...{head}")
            }
        }
    }
}

impl DiffSource
{
    /// Pick a source from CLI flags, falling back to configuration.
    pub fn resolve(
        args: &DiffArgs,
        config: &Config,
    ) -> Result<Self>
    {
        if let Some(path) = &args.diff
        {
            if path == "-"
            {
                return Ok(DiffSource::Stdin);
            }

            let expanded = shellexpand::full(path)
                .with_context(|| format!("cannot expand diff path {path}"))?;
            return Ok(DiffSource::File(Utf8PathBuf::from(expanded.into_owned())));
        }

        if let Some(range) = &args.git
        {
            let (base, head) = parse_range(range)?;
            return Ok(DiffSource::Git { base, head });
        }

        if args.remote
            || config
                .base_sha
                .is_some()
        {
            return Ok(DiffSource::Remote {
                repository: config
                    .require_repository()?
                    .to_string(),
                base: config
                    .base_sha
                    .clone()
                    .ok_or(ConfigError::Missing("base_sha"))?,
                head: config
                    .sha
                    .clone()
                    .ok_or(ConfigError::Missing("sha"))?,
            });
        }

        Ok(DiffSource::Stdin)
    }

    /// Fetch the diff text. Invalid UTF-8 is replaced, not rejected.
    #[instrument(skip(self, gh), fields(source = %self))]
    pub fn read(
        &self,
        gh: &GhClient,
    ) -> Result<String>
    {
        let text = match self
        {
            DiffSource::File(path) =>
            {
                let bytes = std::fs::read(path).with_context(|| format!("failed to read {path}"))?;
                String::from_utf8_lossy(&bytes).into_owned()
            }
            DiffSource::Stdin =>
            {
                let mut bytes = Vec::new();
                std::io::stdin()
                    .read_to_end(&mut bytes)
                    .context("failed to read diff from stdin")?;
                String::from_utf8_lossy(&bytes).into_owned()
            }
            DiffSource::Git { base, head } => git_diff(base, head)?,
            DiffSource::Remote { repository, base, head } => gh
                .compare_diff(repository, base, head)
                .context("failed to fetch diff")?,
        };

        debug!(bytes = text.len(), "diff loaded");
        Ok(text)
    }
}

/// `BASE..HEAD`, `BASE...HEAD` or a lone `BASE` (compared with HEAD)
fn parse_range(range: &str) -> Result<(String, String)>
{
    let (base, head) = match range.split_once("..")
    {
        Some((base, head)) => (base, head.trim_start_matches('.')),
        None => (range, "HEAD"),
    };

    if base.is_empty()
    {
        bail!("invalid revision range {range:?}: missing base");
    }

    let head = if head.is_empty() { "HEAD" } else { head };
    Ok((base.to_string(), head.to_string()))
}

fn git_diff(
    base: &str,
    head: &str,
) -> Result<String>
{
    let output = Command::new("git")
        .args(["diff", "--no-color", "--no-ext-diff", base, head])
        .stdin(Stdio::null())
        .output()
        .context("failed to run git diff")?;

    if !output
        .status
        .success()
    {
        bail!(
            "git diff {base} {head} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn args() -> DiffArgs
    {
        DiffArgs { diff: None, git: None, remote: false }
    }

    #[test]
    fn test_parse_range_forms()
    {
        assert_eq!(parse_range("main..feature").unwrap(), ("main".into(), "feature".into()));
        assert_eq!(parse_range("main...feature").unwrap(), ("main".into(), "feature".into()));
        assert_eq!(parse_range("v1.0").unwrap(), ("v1.0".into(), "HEAD".into()));
        assert_eq!(parse_range("abc..").unwrap(), ("abc".into(), "HEAD".into()));
        assert!(parse_range("..head").is_err());
    }

    #[test]
    fn test_default_is_stdin()
    {
        let source = DiffSource::resolve(&args(), &Config::default()).unwrap();
        assert_eq!(source, DiffSource::Stdin);
    }

    #[test]
    fn test_dash_is_stdin_and_paths_are_files()
    {
        let mut a = args();
        a.diff = Some("-".to_string());
        assert_eq!(DiffSource::resolve(&a, &Config::default()).unwrap(), DiffSource::Stdin);

        a.diff = Some("changes.patch".to_string());
        assert_eq!(
            DiffSource::resolve(&a, &Config::default()).unwrap(),
            DiffSource::File(Utf8PathBuf::from("changes.patch"))
        );
    }

    #[test]
    fn test_base_sha_selects_remote()
    {
        let config = Config {
            repository: Some("acme/app".to_string()),
            base_sha: Some("aaa".to_string()),
            sha: Some("bbb".to_string()),
            ..Config::default()
        };

        assert_eq!(
            DiffSource::resolve(&args(), &config).unwrap(),
            DiffSource::Remote {
                repository: "acme/app".to_string(),
                base: "aaa".to_string(),
                head: "bbb".to_string(),
            }
        );
    }

    #[test]
    fn test_remote_requires_shas()
    {
        let mut a = args();
        a.remote = true;
        let config = Config { repository: Some("acme/app".to_string()), ..Config::default() };

        let err = DiffSource::resolve(&a, &config).unwrap_err();
        assert!(
            err.to_string()
                .contains("base_sha")
        );
    }

    #[test]
    fn test_read_file_source()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("d.patch");
        std::fs::write(&path, "diff --git a/x b/x\n").unwrap();

        let source = DiffSource::File(Utf8PathBuf::from_path_buf(path).unwrap());
        let text = source
            .read(&GhClient::new(None))
            .unwrap();
        assert_eq!(text, "diff --git a/x b/x\n");
    }
}
