use camino::Utf8PathBuf;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

/// Shared application context for global flags
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    pub quiet: bool,                        // global --quiet
    pub no_color: bool,                     // global --no-color
    pub dry_run: bool,                      // global --dry-run
    pub config: Option<Utf8PathBuf>,        // global --config
    pub overrides: Vec<(String, String)>,   // global --set
}

#[derive(Parser)]
#[command(name = "todo2issue")]
#[command(about = "Turn TODO comments added or removed in a diff into tracker issues")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without executing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Config file (default: ./todo2issue.toml or ./.todo2issue.toml)
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Override a config key (repeatable), e.g. --set issue_label=debt
    #[arg(long = "set", value_name = "KEY=VALUE", global = true, value_parser = parse_key_val)]
    pub overrides: Vec<(String, String)>,
}

impl Cli {
    pub fn context(&self) -> AppContext {
        AppContext {
            quiet: self.quiet,
            no_color: self.no_color,
            dry_run: self.dry_run,
            config: self.config.clone(),
            overrides: self.overrides.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract added and removed TODO markers from a diff and print them
    Scan(ScanArgs),

    /// Extract markers and reconcile them with the repository's open issues
    Sync(SyncArgs),

    /// Initialize a todo2issue.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Where to read the diff from; at most one may be given
#[derive(Debug, Clone, Default, Args)]
pub struct DiffArgs {
    /// Read a unified diff from this file ("-" for stdin)
    #[arg(long, value_name = "PATH", conflicts_with_all = ["git", "remote"])]
    pub diff: Option<String>,

    /// Diff a local revision range (BASE..HEAD, or BASE to compare with HEAD)
    #[arg(long, value_name = "RANGE", conflicts_with = "remote")]
    pub git: Option<String>,

    /// Fetch the diff between base_sha and sha from the tracker's API
    #[arg(long)]
    pub remote: bool,
}

#[derive(Debug, Parser)]
pub struct ScanArgs {
    #[command(flatten)]
    pub source: DiffArgs,

    /// Print the extracted items as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct SyncArgs {
    #[command(flatten)]
    pub source: DiffArgs,
}

#[derive(Debug, Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: Utf8PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<Utf8PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}

/// Parse `KEY=VALUE`; the value may itself contain `=`
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{s}`"));
    }

    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_key_val_splits_on_first_equals() {
        assert_eq!(
            parse_key_val("label_strip_pattern=a=b").unwrap(),
            ("label_strip_pattern".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn global_flags_reach_context() {
        let cli = Cli::try_parse_from([
            "todo2issue",
            "scan",
            "--diff",
            "x.patch",
            "--quiet",
            "--set",
            "issue_label=debt",
        ])
        .unwrap();

        let ctx = cli.context();
        assert!(ctx.quiet);
        assert_eq!(ctx.overrides, vec![("issue_label".to_string(), "debt".to_string())]);
        match cli.command {
            Commands::Scan(args) => assert_eq!(args.source.diff.as_deref(), Some("x.patch")),
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn diff_sources_conflict() {
        let res = Cli::try_parse_from(["todo2issue", "sync", "--diff", "a", "--remote"]);
        assert!(res.is_err());
    }
}
