//! Filepath: src/infra/tracker.rs
//! Issue-tracker seam.
//! - `IssueTracker`: read open issues, create, close
//! - `Throttled`: fixed delay between write calls
//!
//! No retries anywhere: a failed call is reported and the caller stops.

use std::{
    cell::Cell,
    thread,
    time::Duration,
};

use serde::Serialize;
use tracing::trace;

use crate::core::{extract::MarkerItem, reconcile::RemoteIssue};

/// Tracker call failures
#[derive(Debug, thiserror::Error)]
pub enum TrackerError
{
    #[error("failed to run `{program}`")]
    Spawn
    {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited unsuccessfully: {stderr}")]
    Failed
    {
        command: String,
        stderr: String,
    },

    #[error("failed to encode request for `{command}`")]
    Encode
    {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected response from `{command}`")]
    Decode
    {
        command: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Request body for a new issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewIssue<'a>
{
    pub title: &'a str,
    pub body: &'a str,
    pub labels: &'a [String],
}

impl<'a> From<&'a MarkerItem> for NewIssue<'a>
{
    fn from(item: &'a MarkerItem) -> Self
    {
        Self {
            title: &item.title,
            body: item
                .body
                .as_deref()
                .unwrap_or_default(),
            labels: &item.labels,
        }
    }
}

pub trait IssueTracker
{
    /// Snapshot of currently open issues
    fn open_issues(&self) -> Result<Vec<RemoteIssue>, TrackerError>;

    /// Create an issue and return its number
    fn create_issue(
        &self,
        issue: &NewIssue<'_>,
    ) -> Result<u64, TrackerError>;

    /// Close an issue and leave `comment` on it
    fn close_issue(
        &self,
        id: u64,
        comment: &str,
    ) -> Result<(), TrackerError>;
}

/// Wraps a tracker so consecutive writes are spaced by `delay`.
/// Reads are not delayed.
pub struct Throttled<T>
{
    inner: T,
    delay: Duration,
    wrote: Cell<bool>,
}

impl<T> Throttled<T>
{
    pub fn new(
        inner: T,
        delay: Duration,
    ) -> Self
    {
        Self { inner, delay, wrote: Cell::new(false) }
    }

    pub fn into_inner(self) -> T
    {
        self.inner
    }

    fn pause(&self)
    {
        if self
            .wrote
            .replace(true)
            && !self
                .delay
                .is_zero()
        {
            trace!(delay_ms = self.delay.as_millis() as u64, "throttling tracker write");
            thread::sleep(self.delay);
        }
    }
}

impl<T: IssueTracker> IssueTracker for Throttled<T>
{
    fn open_issues(&self) -> Result<Vec<RemoteIssue>, TrackerError>
    {
        self.inner
            .open_issues()
    }

    fn create_issue(
        &self,
        issue: &NewIssue<'_>,
    ) -> Result<u64, TrackerError>
    {
        self.pause();
        self.inner
            .create_issue(issue)
    }

    fn close_issue(
        &self,
        id: u64,
        comment: &str,
    ) -> Result<(), TrackerError>
    {
        self.pause();
        self.inner
            .close_issue(id, comment)
    }
}
