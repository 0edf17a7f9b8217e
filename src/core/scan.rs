//! Filepath: src/core/scan.rs
//! `scan`: read a diff, extract markers, print them.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tracing::{debug, info, instrument};

use crate::{
    cli::{AppContext, ScanArgs},
    core::{
        diff::ChangeKind,
        extract::{FilterConfig, MarkerItem, extract},
    },
    infra::{
        config::{Config, load_config},
        github::GhClient,
        source::DiffSource,
    },
};

#[instrument(skip_all)]
pub fn run(
    args: ScanArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config = load(ctx)?;
    let filter = config
        .filter_config()
        .context("invalid configuration")?;
    let source = DiffSource::resolve(&args.source, &config)?;

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            println!("Would scan diff from {source}");
        }
        return Ok(());
    }

    let items = read_and_extract(&source, &config, &filter)?;

    if args.json
    {
        let json = serde_json::to_string_pretty(&items).context("failed to serialize items")?;
        println!("{json}");
    }
    else
    {
        print_items(&items, ctx);
    }

    Ok(())
}

/// Load configuration and log it with the token masked
pub(crate) fn load(ctx: &AppContext) -> Result<Config>
{
    let config = load_config(ctx.config.as_deref(), &ctx.overrides)
        .context("failed to load configuration")?;

    for (key, value) in config.describe()
    {
        debug!(key, %value, "config");
    }

    Ok(config)
}

pub(crate) fn read_and_extract(
    source: &DiffSource,
    config: &Config,
    filter: &FilterConfig,
) -> Result<Vec<MarkerItem>>
{
    let gh = GhClient::new(
        config
            .token
            .clone(),
    );
    let diff = source.read(&gh)?;

    let items = extract(&diff, filter)?;
    info!(found = items.len(), %source, "markers extracted");
    Ok(items)
}

/// Additions then removals, one `+`/`-` line per item. Headers are
/// suppressed by `--quiet`; items are always printed.
pub(crate) fn print_items(
    items: &[MarkerItem],
    ctx: &AppContext,
)
{
    for (kind, header, sign) in [
        (ChangeKind::Addition, "Parsed new TODOs:", "+"),
        (ChangeKind::Deletion, "Parsed removed TODOs:", "-"),
    ]
    {
        let group: Vec<&MarkerItem> = items
            .iter()
            .filter(|i| i.kind == kind)
            .collect();

        if group.is_empty()
        {
            continue;
        }

        if !ctx.quiet
        {
            println!("{header}");
        }

        for item in group
        {
            println!("{}", format_item(item, sign, !ctx.no_color));
        }
    }
}

fn format_item(
    item: &MarkerItem,
    sign: &str,
    color: bool,
) -> String
{
    if !color
    {
        return format!("{sign}\t{item}");
    }

    match item.kind
    {
        ChangeKind::Addition => format!("{}\t{item}", sign.green()),
        ChangeKind::Deletion => format!("{}\t{item}", sign.red()),
    }
}
