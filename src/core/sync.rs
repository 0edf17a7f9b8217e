//! Filepath: src/core/sync.rs
//! `sync`: extract markers, plan against open issues, apply the plan.
//!
//! Steps stop early on `no_publish` (after printing the items) and on
//! `--dry-run` (after printing the plan). Application is sequential and
//! fail-fast: the first tracker error aborts the rest.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tabled::{Table, Tabled};
use tracing::{info, instrument, warn};

use crate::{
    cli::{AppContext, SyncArgs},
    core::{
        reconcile::{Action, Plan, plan},
        scan,
    },
    infra::{
        github::{GhClient, GhTracker},
        source::DiffSource,
        tracker::{IssueTracker, NewIssue, Throttled, TrackerError},
    },
};

#[derive(Debug, thiserror::Error)]
pub enum SyncError
{
    #[error("failed to {verb} {what} ({done} done, {remaining} not attempted)")]
    ActionFailed
    {
        verb: &'static str,
        what: String,
        done: usize,
        remaining: usize,
        /// Actions that succeeded before the failure
        completed: SyncReport,
        #[source]
        source: TrackerError,
    },
}

impl SyncError
{
    pub fn completed(&self) -> &SyncReport
    {
        match self
        {
            SyncError::ActionFailed { completed, .. } => completed,
        }
    }
}

/// What was actually written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport
{
    pub closed: Vec<u64>,
    pub created: Vec<(u64, String)>,
}

/// Comment left on every issue closed for a removed marker
pub fn close_comment(sha: Option<&str>) -> String
{
    match sha
    {
        Some(sha) => format!("Closed automatically with {sha}"),
        None => "Closed automatically".to_string(),
    }
}

/// Run `plan` against `tracker` in order. `on_action` is called after each
/// successful action.
pub fn apply_plan<T, F>(
    plan: &Plan,
    tracker: &T,
    close_comment: &str,
    mut on_action: F,
) -> Result<SyncReport, SyncError>
where
    T: IssueTracker + ?Sized,
    F: FnMut(&Action),
{
    let mut report = SyncReport::default();
    let total = plan.len();

    for (done, action) in plan
        .actions
        .iter()
        .enumerate()
    {
        let result = match action
        {
            Action::Close { id, .. } => tracker
                .close_issue(*id, close_comment)
                .map(|()| report.closed.push(*id)),
            Action::Create(item) => tracker
                .create_issue(&NewIssue::from(item))
                .map(|id| {
                    report
                        .created
                        .push((id, item.title.clone()))
                }),
        };

        if let Err(source) = result
        {
            return Err(SyncError::ActionFailed {
                verb: action.verb(),
                what: action.describe(),
                done,
                remaining: total - done - 1,
                completed: report,
                source,
            });
        }

        on_action(action);
    }

    Ok(report)
}

#[derive(Tabled)]
struct PlanRow
{
    action: &'static str,
    target: String,
    labels: String,
}

fn plan_table(plan: &Plan) -> String
{
    let rows = plan
        .actions
        .iter()
        .map(|action| PlanRow {
            action: action.verb(),
            target: action.describe(),
            labels: match action
            {
                Action::Create(item) => item
                    .labels
                    .join(", "),
                Action::Close { .. } => String::new(),
            },
        });

    Table::new(rows).to_string()
}

fn progress_bar(
    len: usize,
    quiet: bool,
) -> ProgressBar
{
    if quiet
    {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

#[instrument(skip_all)]
pub fn run(
    args: SyncArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config = scan::load(ctx)?;
    let repository = config
        .require_repository()?
        .to_string();
    let filter = config
        .filter_config()
        .context("invalid configuration")?;
    let source = DiffSource::resolve(&args.source, &config)?;

    let items = scan::read_and_extract(&source, &config, &filter)?;
    scan::print_items(&items, ctx);

    if config.no_publish
    {
        info!("no_publish set, leaving the tracker untouched");
        return Ok(());
    }

    let client = GhClient::new(
        config
            .token
            .clone(),
    );
    let tracker = Throttled::new(GhTracker::new(client, repository.as_str()), config.delay());

    let open = tracker
        .open_issues()
        .with_context(|| format!("failed to list open issues of {repository}"))?;
    let plan = plan(&items, &open);

    if plan.is_empty()
    {
        if !ctx.quiet
        {
            println!("Nothing to do");
        }
        return Ok(());
    }

    if !ctx.quiet
    {
        println!("{}", plan_table(&plan));
    }

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            println!(
                "Would close {} and create {} issue(s) in {repository}",
                plan.closes(),
                plan.creates()
            );
        }
        return Ok(());
    }

    let comment = close_comment(config.sha.as_deref());
    let pb = progress_bar(plan.len(), ctx.quiet);
    let outcome = apply_plan(&plan, &tracker, &comment, |action| {
        pb.inc(1);
        pb.set_message(format!("{} {}", action.verb(), action.describe()));
    });
    pb.finish_and_clear();

    let report = match outcome
    {
        Ok(report) => report,
        Err(err) =>
        {
            // Report partial progress before failing
            print_report(err.completed(), ctx);
            warn!(error = %err, "sync aborted");
            return Err(err.into());
        }
    };

    print_report(&report, ctx);
    info!(closed = report.closed.len(), created = report.created.len(), "sync complete");
    Ok(())
}

fn print_report(
    report: &SyncReport,
    ctx: &AppContext,
)
{
    for id in &report.closed
    {
        println!("{} closed #{id}", paint("✓", ctx));
    }
    for (id, title) in &report.created
    {
        println!("{} created #{id} {title}", paint("✓", ctx));
    }
}

fn paint(
    mark: &str,
    ctx: &AppContext,
) -> String
{
    if ctx.no_color { mark.to_string() } else { mark.green().to_string() }
}

#[cfg(test)]
mod tests
{
    use std::cell::RefCell;

    use super::*;
    use crate::core::{
        diff::ChangeKind,
        extract::MarkerItem,
        reconcile::RemoteIssue,
    };

    /// Records calls; fails the call numbered `fail_at` (0-based)
    #[derive(Default)]
    struct Recorder
    {
        calls: RefCell<Vec<String>>,
        fail_at: Option<usize>,
    }

    impl Recorder
    {
        fn record(
            &self,
            call: String,
        ) -> Result<usize, TrackerError>
        {
            let mut calls = self
                .calls
                .borrow_mut();
            let n = calls.len();
            calls.push(call.clone());

            if self.fail_at == Some(n)
            {
                return Err(TrackerError::Failed { command: call, stderr: "HTTP 502".to_string() });
            }
            Ok(n)
        }
    }

    impl IssueTracker for Recorder
    {
        fn open_issues(&self) -> Result<Vec<RemoteIssue>, TrackerError>
        {
            Ok(Vec::new())
        }

        fn create_issue(
            &self,
            issue: &NewIssue<'_>,
        ) -> Result<u64, TrackerError>
        {
            let n = self.record(format!("create {} {:?}", issue.title, issue.labels))?;
            Ok(100 + n as u64)
        }

        fn close_issue(
            &self,
            id: u64,
            comment: &str,
        ) -> Result<(), TrackerError>
        {
            self.record(format!("close {id} {comment}"))
                .map(|_| ())
        }
    }

    fn item(title: &str) -> MarkerItem
    {
        MarkerItem {
            title: title.to_string(),
            file: "src/a.rs".to_string(),
            line: 4,
            kind: ChangeKind::Addition,
            labels: vec!["TODO".to_string()],
            body: Some(format!("**{title}**")),
        }
    }

    fn sample_plan() -> Plan
    {
        Plan {
            actions: vec![
                Action::Close { id: 7, title: "old".to_string() },
                Action::Create(item("first")),
                Action::Create(item("second")),
            ],
        }
    }

    #[test]
    fn test_applies_in_order()
    {
        let tracker = Recorder::default();
        let mut seen = Vec::new();

        let report = apply_plan(&sample_plan(), &tracker, "Closed automatically with abc", |a| {
            seen.push(a.verb())
        })
        .unwrap();

        assert_eq!(
            *tracker
                .calls
                .borrow(),
            vec![
                "close 7 Closed automatically with abc".to_string(),
                "create first [\"TODO\"]".to_string(),
                "create second [\"TODO\"]".to_string(),
            ]
        );
        assert_eq!(seen, vec!["close", "create", "create"]);
        assert_eq!(report.closed, vec![7]);
        assert_eq!(
            report.created,
            vec![(101, "first".to_string()), (102, "second".to_string())]
        );
    }

    #[test]
    fn test_first_failure_stops()
    {
        let tracker = Recorder { fail_at: Some(1), ..Recorder::default() };

        let err = apply_plan(&sample_plan(), &tracker, "bye", |_| {}).unwrap_err();

        let SyncError::ActionFailed { verb, done, remaining, .. } = &err;
        assert_eq!(*verb, "create");
        assert_eq!(err.completed().closed, vec![7]);
        assert!(
            err.completed()
                .created
                .is_empty()
        );
        assert_eq!(*done, 1);
        assert_eq!(*remaining, 1);
        // The third action was never attempted
        assert_eq!(
            tracker
                .calls
                .borrow()
                .len(),
            2
        );
        assert!(
            err.to_string()
                .contains("first @ src/a.rs:4")
        );
    }

    #[test]
    fn test_close_comment_mentions_sha()
    {
        assert_eq!(close_comment(Some("abc123")), "Closed automatically with abc123");
        assert_eq!(close_comment(None), "Closed automatically");
    }

    #[test]
    fn test_plan_table_lists_actions()
    {
        let table = plan_table(&sample_plan());
        assert!(table.contains("close"));
        assert!(table.contains("#7 old"));
        assert!(table.contains("second @ src/a.rs:4"));
    }
}
