use std::io::{IsTerminal, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use bookfinder_core::config_file;
use bookfinder_core::conditions::ConditionChange;
use bookfinder_core::query;
use bookfinder_core::selection::{MemoryClipboard, Osc52Clipboard};
use bookfinder_core::{
    BasicSearch, CatalogClient, Config, ConditionAction, ConditionsState, DatabaseSelection,
    FetchUpdate, Logic, Pagination, QueryParams, ResultFetcher, SearchField, SettingsUpdate,
    reduce,
};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

mod output;

use output::ColorMode;

/// Book catalog search - query the catalog and copy second-pass codes
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Catalog server base URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the data sources the server offers
    Dbs,

    /// Show the server's search settings, or change them
    Settings {
        /// Records per result page
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        page_size: Option<u32>,

        /// Field the search forms start on
        #[arg(long)]
        default_field: Option<SearchField>,
    },

    /// Search the catalog
    Search(SearchArgs),
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Basic search keyword
    #[arg(short, long, conflicts_with = "conditions")]
    query: Option<String>,

    /// Field for the basic search, or for conditions given without one
    #[arg(short, long)]
    field: Option<SearchField>,

    /// Exact matching for the basic search
    #[arg(long, conflicts_with = "conditions")]
    exact: bool,

    /// Advanced search condition, `field:query` or just `query` (up to 6)
    #[arg(short = 'c', long = "cond", value_name = "FIELD:QUERY")]
    conditions: Vec<String>,

    /// Join condition N (1-based, from 2) to the previous one with OR
    #[arg(long = "or", value_name = "N")]
    or: Vec<usize>,

    /// Exact matching for condition N
    #[arg(long = "exact-cond", value_name = "N")]
    exact_cond: Vec<usize>,

    /// Fuzzy matching for condition N (added conditions default to exact)
    #[arg(long = "fuzzy-cond", value_name = "N")]
    fuzzy_cond: Vec<usize>,

    /// Data source to search; repeat for several (default: all available)
    #[arg(long = "db", value_name = "NAME")]
    dbs: Vec<String>,

    /// Result page to open
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    page: Option<u32>,

    /// Jump to a page after the first one loads, validated against the page count
    #[arg(long, value_name = "PAGE")]
    jump: Option<String>,

    /// Copy the codes of every record on the page
    #[arg(long, conflicts_with = "copy_keys")]
    copy: bool,

    /// Copy the codes of the given records, in order
    #[arg(long = "copy-key", value_name = "KEY")]
    copy_keys: Vec<String>,

    /// Copy a single record's code
    #[arg(long = "copy-one", value_name = "KEY", conflicts_with_all = ["copy", "copy_keys"])]
    copy_one: Option<String>,

    /// Print exported codes instead of writing them to the clipboard
    /// (always the case when stdout is not a terminal)
    #[arg(long)]
    print: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let config = resolve_config(cli.url, cli.timeout)?;
    let color = ColorMode(!cli.no_color && config.color && std::io::stdout().is_terminal());
    let client = CatalogClient::new(&config.base_url, config.timeout())
        .context("building HTTP client")?;

    match cli.command {
        Command::Dbs => list_dbs(&client, &config, color).await,
        Command::Settings {
            page_size,
            default_field,
        } => settings(&client, page_size, default_field, color).await,
        Command::Search(args) => search(client, &config, args, color).await,
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Resolve configuration: CLI flags > env vars > config file > defaults.
fn resolve_config(url: Option<String>, timeout: Option<u64>) -> anyhow::Result<Config> {
    let file = config_file::load_config();
    let mut config = Config::from_file(&file)?;

    if let Ok(env_url) = std::env::var("BOOKFINDER_URL")
        && !env_url.trim().is_empty()
    {
        config.base_url = env_url;
    }
    if let Some(secs) = std::env::var("BOOKFINDER_TIMEOUT")
        .ok()
        .and_then(|v| v.trim().parse().ok())
    {
        config.timeout_secs = secs;
    }
    if let Some(url) = url {
        config.base_url = url;
    }
    if let Some(secs) = timeout {
        config.timeout_secs = secs;
    }

    tracing::debug!(base_url = %config.base_url, timeout_secs = config.timeout_secs, "resolved config");
    Ok(config)
}

/// Load the available data sources and apply any requested subset.
async fn select_databases(
    client: &CatalogClient,
    requested: &[String],
) -> anyhow::Result<DatabaseSelection> {
    let available = client
        .available_dbs()
        .await
        .context("loading available data sources")?;
    let mut selection = DatabaseSelection::new(available);
    if !requested.is_empty() {
        selection.set_selected(requested);
        if selection.selected().is_empty() {
            anyhow::bail!(
                "none of the requested data sources are available: {}",
                requested.join(", ")
            );
        }
    }
    Ok(selection)
}

async fn list_dbs(
    client: &CatalogClient,
    config: &Config,
    color: ColorMode,
) -> anyhow::Result<ExitCode> {
    let selection = select_databases(client, &config.databases).await?;
    let mut out = std::io::stdout().lock();
    output::print_databases(&mut out, &selection, color)?;
    Ok(ExitCode::SUCCESS)
}

async fn settings(
    client: &CatalogClient,
    page_size: Option<u32>,
    default_field: Option<SearchField>,
    color: ColorMode,
) -> anyhow::Result<ExitCode> {
    let current = client.settings().await.context("loading settings")?;
    let shown = if page_size.is_none() && default_field.is_none() {
        current
    } else {
        let update = SettingsUpdate {
            page_size,
            default_search_field: default_field,
            datasources: None,
        };
        let saved = client
            .update_settings(&update)
            .await
            .context("saving settings")?;
        current.merge(saved)
    };
    let mut out = std::io::stdout().lock();
    output::print_settings(&mut out, &shown, color)?;
    Ok(ExitCode::SUCCESS)
}

/// Split `field:query`. A prefix that is not a field name is part of the query.
fn parse_condition(raw: &str, default_field: SearchField) -> (SearchField, String) {
    if let Some((prefix, rest)) = raw.split_once(':')
        && let Ok(field) = prefix.parse::<SearchField>()
    {
        return (field, rest.to_string());
    }
    (default_field, raw.to_string())
}

/// Build the advanced form state by replaying the actions a user would take.
fn build_conditions(
    args: &SearchArgs,
    default_field: SearchField,
    fuzzy: bool,
) -> anyhow::Result<ConditionsState> {
    let update = |index: usize, change: ConditionChange| ConditionAction::Update { index, change };

    let mut state = reduce(
        &ConditionsState::new(),
        ConditionAction::SetFirstField(default_field),
    )?;
    state = reduce(&state, update(0, ConditionChange::Fuzzy(fuzzy)))?;

    for (index, raw) in args.conditions.iter().enumerate() {
        if index > 0 {
            state = reduce(&state, ConditionAction::Add)?;
        }
        let (field, text) = parse_condition(raw, default_field);
        state = reduce(&state, update(index, ConditionChange::Field(field)))?;
        state = reduce(&state, update(index, ConditionChange::Query(text)))?;
    }

    let position = |n: usize, flag: &str, min: usize| -> anyhow::Result<usize> {
        if n < min || n > state.len() {
            anyhow::bail!("{flag} {n}: no such condition");
        }
        Ok(n - 1)
    };
    let mut changes = Vec::new();
    for &n in &args.or {
        changes.push((position(n, "--or", 2)?, ConditionChange::Logic(Logic::Or)));
    }
    for &n in &args.exact_cond {
        changes.push((position(n, "--exact-cond", 1)?, ConditionChange::Fuzzy(false)));
    }
    for &n in &args.fuzzy_cond {
        changes.push((position(n, "--fuzzy-cond", 1)?, ConditionChange::Fuzzy(true)));
    }
    for (index, change) in changes {
        state = reduce(&state, update(index, change))?;
    }
    Ok(state)
}

/// Field a search starts on: flag, then config file, then server setting.
async fn starting_field(
    client: &CatalogClient,
    flag: Option<SearchField>,
    config: &Config,
) -> SearchField {
    if let Some(field) = flag.or(config.default_field) {
        return field;
    }
    match client.settings().await {
        Ok(settings) => settings.default_search_field.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "could not load settings, using default field");
            SearchField::default()
        }
    }
}

async fn search(
    client: CatalogClient,
    config: &Config,
    args: SearchArgs,
    color: ColorMode,
) -> anyhow::Result<ExitCode> {
    let requested = if args.dbs.is_empty() {
        &config.databases
    } else {
        &args.dbs
    };
    let dbs = select_databases(&client, requested).await?;
    let field = starting_field(&client, args.field, config).await;

    let submitted = if args.conditions.is_empty() {
        let basic = BasicSearch {
            field,
            query: args.query.clone().unwrap_or_default(),
            fuzzy: config.fuzzy && !args.exact,
        };
        basic.submit(dbs.selected())
    } else {
        let state = build_conditions(&args, field, config.fuzzy)?;
        let result = state.submit(dbs.selected());
        if result.is_err() {
            tracing::debug!(rows = ?state.touch_all().rows(), "advanced search rejected");
        }
        result
    };
    let mut params: QueryParams = match submitted {
        Ok(params) => params,
        Err(err) => {
            output::print_submit_error(&mut std::io::stderr(), &err, color)?;
            return Ok(ExitCode::from(2));
        }
    };
    if let Some(page) = args.page {
        params.set(query::PAGE, page.to_string());
    }

    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let mut fetcher = ResultFetcher::new(Arc::new(client.clone()), &cancel);
    fetcher.set_query(params.to_query_string());
    if !await_results(&mut fetcher, color).await? {
        return Ok(ExitCode::FAILURE);
    }

    if let Some(input) = &args.jump {
        let pagination = Pagination::new(&fetcher.params(), fetcher.view().meta().total_pages);
        match pagination.jump_to(input) {
            Ok(next) => {
                fetcher.set_query(next.to_query_string());
                if !await_results(&mut fetcher, color).await? {
                    return Ok(ExitCode::FAILURE);
                }
            }
            Err(e) => {
                output::print_error(&mut std::io::stderr(), &e.to_string(), color)?;
                return Ok(ExitCode::from(2));
            }
        }
    }

    let view = fetcher.view();
    let pagination = Pagination::new(&fetcher.params(), view.meta().total_pages);
    {
        let mut out = std::io::stdout().lock();
        output::print_meta(&mut out, &view.meta(), color)?;
        output::print_results(&mut out, view.items(), &client, color)?;
        output::print_pagination(&mut out, &pagination, color)?;
        out.flush()?;
    }

    export(&mut fetcher, &args, color)?;
    fetcher.shutdown();
    Ok(ExitCode::SUCCESS)
}

/// Wait for the pending search. Returns `false` if it failed or was interrupted.
async fn await_results(fetcher: &mut ResultFetcher, color: ColorMode) -> anyhow::Result<bool> {
    if !fetcher.has_pending() {
        return Ok(true);
    }
    match fetcher.next_update().await {
        Some(FetchUpdate::Applied) => Ok(true),
        Some(FetchUpdate::Failed(msg)) => {
            output::print_error(&mut std::io::stderr(), &msg, color)?;
            Ok(false)
        }
        Some(FetchUpdate::Discarded) | None => {
            output::print_error(&mut std::io::stderr(), "search interrupted", color)?;
            Ok(false)
        }
    }
}

/// Whether exported codes are printed rather than sent as OSC 52. Escape
/// sequences are only written to a terminal.
fn prints_codes(print_flag: bool, stdout_is_terminal: bool) -> bool {
    print_flag || !stdout_is_terminal
}

fn export(fetcher: &mut ResultFetcher, args: &SearchArgs, color: ColorMode) -> anyhow::Result<()> {
    let print = prints_codes(args.print, std::io::stdout().is_terminal());
    let selection = fetcher.view_mut().selection_mut();
    let mut memory = MemoryClipboard::default();
    let mut osc52 = Osc52Clipboard::stdout();
    let clipboard: &mut dyn bookfinder_core::Clipboard = if print {
        &mut memory
    } else {
        &mut osc52
    };

    if let Some(key) = &args.copy_one {
        match selection.export_one(key, clipboard)? {
            Some(name) if print => println!("{name}"),
            Some(name) => eprintln!("Copied {name}"),
            None => tracing::warn!(key = %key, "no code to copy for this entry"),
        }
        return Ok(());
    }

    if args.copy {
        selection.select_all();
    } else if args.copy_keys.is_empty() {
        return Ok(());
    } else {
        for key in &args.copy_keys {
            if !selection.visible_keys().iter().any(|k| k == key) {
                tracing::warn!(key = %key, "not on this page, skipping");
            }
            if !selection.is_selected(key) {
                selection.toggle(key);
            }
        }
    }

    let outcome = selection.export_selected(clipboard)?;
    if print {
        output::print_export(&mut std::io::stdout(), &outcome, true, color)?;
    } else {
        output::print_export(&mut std::io::stderr(), &outcome, false, color)?;
    }
    Ok(())
}
