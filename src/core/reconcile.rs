//! Filepath: src/core/reconcile.rs
//! Turn extracted markers into tracker actions.
//!
//! Identity is the issue title: a removed marker closes every open issue
//! whose title is exactly equal (case-sensitive) to the marker text. Two
//! markers with the same text in different files are indistinguishable,
//! and re-running on the same diff creates the issues again.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::{diff::ChangeKind, extract::MarkerItem};

/// An open issue as reported by the tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIssue
{
    pub id: u64,
    pub title: String,
}

/// One tracker write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action
{
    Close
    {
        id: u64,
        title: String,
    },
    Create(MarkerItem),
}

impl Action
{
    pub fn verb(&self) -> &'static str
    {
        match self
        {
            Action::Close { .. } => "close",
            Action::Create(_) => "create",
        }
    }

    pub fn describe(&self) -> String
    {
        match self
        {
            Action::Close { id, title } => format!("#{id} {title}"),
            Action::Create(item) => item.to_string(),
        }
    }
}

/// Ordered actions: every close first, then every create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan
{
    pub actions: Vec<Action>,
}

impl Plan
{
    pub fn is_empty(&self) -> bool
    {
        self.actions
            .is_empty()
    }

    pub fn len(&self) -> usize
    {
        self.actions
            .len()
    }

    pub fn closes(&self) -> usize
    {
        self.actions
            .iter()
            .filter(|a| matches!(a, Action::Close { .. }))
            .count()
    }

    pub fn creates(&self) -> usize
    {
        self.len() - self.closes()
    }
}

/// Partition `items` and match deletions against `open` by title.
pub fn plan(
    items: &[MarkerItem],
    open: &[RemoteIssue],
) -> Plan
{
    let (additions, deletions): (Vec<&MarkerItem>, Vec<&MarkerItem>) = items
        .iter()
        .partition(|i| i.kind == ChangeKind::Addition);

    let removed: HashSet<&str> = deletions
        .iter()
        .map(|d| d.title.as_str())
        .collect();

    let closes = open
        .iter()
        .filter(|issue| removed.contains(issue.title.as_str()))
        .map(|issue| Action::Close { id: issue.id, title: issue.title.clone() });

    let creates = additions
        .into_iter()
        .map(|item| Action::Create(item.clone()));

    Plan {
        actions: closes
            .chain(creates)
            .collect(),
    }
}
