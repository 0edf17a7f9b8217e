//! Filepath: src/infra/github.rs
//! GitHub access through the `gh` CLI.
//!
//! Every call is a single `gh api` invocation. The token, when configured,
//! is handed to `gh` through `GH_TOKEN`; otherwise `gh`'s own login is used.

use std::{
    io::Write,
    process::{Command, Stdio},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    core::reconcile::RemoteIssue,
    infra::tracker::{IssueTracker, NewIssue, TrackerError},
};

/// Media type that makes the compare endpoint return a unified diff
const DIFF_MEDIA_TYPE: &str = "Accept: application/vnd.github.v3.diff";

/// Thin runner for `gh api`
#[derive(Debug, Clone)]
pub struct GhClient
{
    program: String,
    token: Option<String>,
}

impl GhClient
{
    pub fn new(token: Option<String>) -> Self
    {
        Self { program: "gh".to_string(), token }
    }

    /// Use a different executable (tests, wrappers)
    pub fn with_program(
        mut self,
        program: impl Into<String>,
    ) -> Self
    {
        self.program = program.into();
        self
    }

    /// Run `gh api <args>`, feeding `input` on stdin, and return stdout.
    pub fn api(
        &self,
        args: &[&str],
        input: Option<&[u8]>,
    ) -> Result<Vec<u8>, TrackerError>
    {
        let command = format!("{} api {}", self.program, args.join(" "));
        debug!(%command, "calling GitHub");

        let mut cmd = Command::new(&self.program);
        cmd.arg("api")
            .args(args)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(token) = &self.token
        {
            cmd.env("GH_TOKEN", token);
        }

        let spawn_err = |source| TrackerError::Spawn { program: self.program.clone(), source };
        let mut child = cmd
            .spawn()
            .map_err(spawn_err)?;

        if let (Some(bytes), Some(mut stdin)) = (input, child.stdin.take())
        {
            stdin
                .write_all(bytes)
                .map_err(spawn_err)?;
        }

        let output = child
            .wait_with_output()
            .map_err(spawn_err)?;

        if !output
            .status
            .success()
        {
            return Err(TrackerError::Failed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr)
                    .trim()
                    .to_string(),
            });
        }

        Ok(output.stdout)
    }

    /// Unified diff between two commits of `repository`
    #[instrument(skip(self))]
    pub fn compare_diff(
        &self,
        repository: &str,
        base: &str,
        head: &str,
    ) -> Result<String, TrackerError>
    {
        let endpoint = format!("repos/{repository}/compare/{base}...{head}");
        let bytes = self.api(&["-H", DIFF_MEDIA_TYPE, &endpoint], None)?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Issue as returned by the REST API. Pull requests show up in the issue
/// list too and carry a `pull_request` key.
#[derive(Debug, Deserialize)]
struct ApiIssue
{
    number: u64,
    title: String,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Created
{
    number: u64,
}

/// `IssueTracker` over the GitHub REST API
#[derive(Debug, Clone)]
pub struct GhTracker
{
    client: GhClient,
    repository: String,
}

impl GhTracker
{
    pub fn new(
        client: GhClient,
        repository: impl Into<String>,
    ) -> Self
    {
        Self { client, repository: repository.into() }
    }

    fn decode<'de, T: Deserialize<'de>>(
        endpoint: &str,
        bytes: &'de [u8],
    ) -> Result<T, TrackerError>
    {
        serde_json::from_slice(bytes)
            .map_err(|source| TrackerError::Decode { command: endpoint.to_string(), source })
    }
}

impl IssueTracker for GhTracker
{
    fn open_issues(&self) -> Result<Vec<RemoteIssue>, TrackerError>
    {
        let endpoint = format!("repos/{}/issues?state=open&per_page=100", self.repository);
        let bytes = self
            .client
            .api(&["--paginate", &endpoint], None)?;

        parse_issue_pages(&bytes)
            .map_err(|source| TrackerError::Decode { command: endpoint, source })
    }

    fn create_issue(
        &self,
        issue: &NewIssue<'_>,
    ) -> Result<u64, TrackerError>
    {
        let endpoint = format!("repos/{}/issues", self.repository);
        let payload = encode(&endpoint, issue)?;

        let bytes = self
            .client
            .api(&["-X", "POST", &endpoint, "--input", "-"], Some(&payload))?;
        let created: Created = Self::decode(&endpoint, &bytes)?;

        Ok(created.number)
    }

    fn close_issue(
        &self,
        id: u64,
        comment: &str,
    ) -> Result<(), TrackerError>
    {
        let issue = format!("repos/{}/issues/{id}", self.repository);
        self.client
            .api(&["-X", "PATCH", &issue, "-f", "state=closed"], None)?;

        let comments = format!("{issue}/comments");
        let body = format!("body={comment}");
        self.client
            .api(&["-X", "POST", &comments, "-f", &body], None)?;

        Ok(())
    }
}

fn encode<T: Serialize>(
    endpoint: &str,
    body: &T,
) -> Result<Vec<u8>, TrackerError>
{
    serde_json::to_vec(body)
        .map_err(|source| TrackerError::Encode { command: endpoint.to_string(), source })
}

/// `gh api --paginate` prints one JSON array per page back to back
fn parse_issue_pages(bytes: &[u8]) -> Result<Vec<RemoteIssue>, serde_json::Error>
{
    let mut issues = Vec::new();

    for page in serde_json::Deserializer::from_slice(bytes).into_iter::<Vec<ApiIssue>>()
    {
        issues.extend(
            page?
                .into_iter()
                .filter(|i| {
                    i.pull_request
                        .is_none()
                })
                .map(|i| RemoteIssue { id: i.number, title: i.title }),
        );
    }

    Ok(issues)
}
