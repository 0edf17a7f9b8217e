//! **todo2issue** - Turn TODO comments in a diff into tracker issues
//!
//! Reads a unified diff, finds marker comments on added and removed lines,
//! and opens or closes issues so the tracker follows the code.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core pipeline - diff parsing, marker extraction, reconciliation
pub mod core {
    /// Unified-diff line classification and new-side line counting
    pub mod diff;
    pub use diff::{ChangeKind, ExtractError};

    /// Marker regexes and title/label extraction
    pub mod matcher;
    pub use matcher::{LabelExtractor, MarkerMatcher};

    /// Include/exclude path rules
    pub mod filter;
    pub use filter::PathFilter;

    /// Fenced code snippets around a marker
    pub mod snippet;

    /// Diff to marker items
    pub mod extract;
    pub use extract::{FilterConfig, MarkerItem, extract};

    /// Marker items plus open issues to an ordered action plan
    pub mod reconcile;
    pub use reconcile::{Action, Plan, RemoteIssue};

    /// `scan` command: extract and print
    pub mod scan;
    pub use scan::run as scan_run;

    /// `sync` command: extract, plan, apply
    pub mod sync;
    pub use sync::run as sync_run;
}

/// Infrastructure - configuration, diff sources, tracker access
pub mod infra {
    /// Layered configuration (file, environment, overrides)
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Tracker seam and write throttling
    pub mod tracker;
    pub use tracker::{IssueTracker, Throttled, TrackerError};

    /// GitHub through the `gh` CLI
    pub mod github;
    pub use github::{GhClient, GhTracker};

    /// Diff text from files, stdin, git or the remote API
    pub mod source;
    pub use source::DiffSource;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use crate::core::{scan_run, sync_run};
pub use infra::{Config, load_config};

// Core types for external consumers
pub use crate::core::{Action, ChangeKind, MarkerItem, Plan};
