use anyhow::Result;
use clap::Parser;
use todo2issue::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.no_color);

    // Build a context once, pass everywhere
    let ctx = cli.context();

    match cli.command {
        Commands::Scan(args) => todo2issue::scan_run(args, &ctx),
        Commands::Sync(args) => todo2issue::sync_run(args, &ctx),
        Commands::Init(args) => todo2issue::infra::config::init(args, &ctx),
        Commands::Completions(args) => todo2issue::completion::run(args, &ctx),
    }
}

/// Logs go to stderr; RUST_LOG wins over -v
fn init_tracing(verbose: u8, no_color: bool) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("todo2issue={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .init();
}
