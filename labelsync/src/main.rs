//! Keeps item labels in step with page moves.
//!
//! Reads the move log of one wiki edition after a stored cursor and updates
//! the labels of linked items where the move was a plain rename.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use labelsync::core::cursor::normalize;
use labelsync::exit_codes;
use labelsync::io::checkpoint::{CheckpointStore, FileCheckpointStore};
use labelsync::io::config::{
    Config, Credentials, DEFAULT_CONFIG_FILE, PASSWORD_ENV, USERNAME_ENV, load_config,
    write_config,
};
use labelsync::io::confirm::{AcceptAll, Confirmer, TerminalConfirmer};
use labelsync::io::journal::FileJournal;
use labelsync::io::mediawiki::{ApiClient, ClientOptions};
use labelsync::io::wiki::MediaWiki;
use labelsync::io::wikibase::Wikibase;
use labelsync::logging;
use labelsync::reconcile::{EventOutcome, ReconcileContext};
use labelsync::run::{RunHalted, RunOptions, RunStop, run_batch};

#[derive(Parser)]
#[command(
    name = "labelsync",
    version,
    about = "Keep item labels in step with page moves"
)]
struct Cli {
    /// Config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a config file with the built-in editions.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// List configured editions.
    Editions,
    /// Process move events after the stored cursor.
    Run {
        #[arg(short, long)]
        edition: String,
        /// Maximum number of events; defaults to `batch_limit`.
        #[arg(long)]
        limit: Option<usize>,
        /// Apply changes without asking.
        #[arg(short, long)]
        yes: bool,
        /// Read and decide, but never write labels or the cursor.
        #[arg(long)]
        dry_run: bool,
    },
    /// Show, set or reset the stored cursor of an edition.
    Cursor {
        #[arg(short, long)]
        edition: String,
        #[arg(long, conflicts_with = "set")]
        reset: bool,
        /// RFC 3339 timestamp; events at or before it are skipped.
        #[arg(long, value_name = "TIMESTAMP")]
        set: Option<String>,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    logging::init();
    if let Err(err) = run(cli) {
        eprintln!("{err:#}");
        let code = if err.downcast_ref::<RunHalted>().is_some() {
            exit_codes::TRANSPORT
        } else {
            exit_codes::INVALID
        };
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Editions => cmd_editions(&cli.config),
        Command::Run {
            edition,
            limit,
            yes,
            dry_run,
        } => cmd_run(&cli.config, &edition, limit, yes, dry_run),
        Command::Cursor {
            edition,
            reset,
            set,
        } => cmd_cursor(&cli.config, &edition, reset, set.as_deref()),
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            config_path.display()
        );
    }
    write_config(config_path, &Config::default())?;
    println!("wrote {}", config_path.display());
    Ok(())
}

fn cmd_editions(config_path: &Path) -> Result<()> {
    let cfg = load_config(config_path)?;
    for (id, edition) in &cfg.editions {
        println!(
            "{id}\tsite={}wiki\tlang={}\tforbidden={:?}",
            edition.site, edition.lang, edition.forbidden
        );
    }
    Ok(())
}

fn cmd_cursor(config_path: &Path, edition: &str, reset: bool, set: Option<&str>) -> Result<()> {
    let cfg = load_config(config_path)?;
    let profile = cfg.profile(edition)?;
    let store = FileCheckpointStore::new(&cfg.state_dir);
    if reset {
        store.clear(&profile.edition)?;
        println!("cursor: edition={} reset", profile.edition);
        return Ok(());
    }
    if let Some(raw) = set {
        let cursor = normalize(raw).with_context(|| format!("invalid timestamp {raw:?}"))?;
        store.save(&profile.edition, &cursor)?;
        println!("cursor: edition={} cursor={cursor}", profile.edition);
        return Ok(());
    }
    let cursor = store.load(&profile.edition)?;
    println!(
        "cursor: edition={} cursor={}",
        profile.edition,
        cursor.as_deref().unwrap_or("none")
    );
    Ok(())
}

fn cmd_run(
    config_path: &Path,
    edition: &str,
    limit: Option<usize>,
    yes: bool,
    dry_run: bool,
) -> Result<()> {
    let cfg = load_config(config_path)?;
    let profile = cfg.profile(edition)?;
    let limit = limit.unwrap_or(cfg.batch_limit);
    if limit == 0 {
        bail!("--limit must be > 0");
    }
    let credentials = Credentials::from_env();
    if credentials.is_none() && !dry_run {
        bail!("set {USERNAME_ENV} and {PASSWORD_ENV} to a bot password, or pass --dry-run");
    }

    let checkpoints = FileCheckpointStore::new(&cfg.state_dir);
    let options = ClientOptions {
        user_agent: cfg.user_agent.clone(),
        maxlag: cfg.maxlag,
        max_retries: cfg.max_retries,
        write_interval: cfg.write_interval(),
    };
    let wiki = MediaWiki::new(
        ApiClient::new(profile.wiki_api.clone(), options.clone())?,
        profile.namespace,
    );
    let repo = Wikibase::new(
        ApiClient::new(cfg.repo_api.clone(), options)?,
        profile.site_id(),
        profile.lang.clone(),
    );
    if let Some(credentials) = &credentials {
        // Only used to word the error.
        let cursor = checkpoints.load(&profile.edition).ok().flatten();
        repo.login(&credentials.username, &credentials.password)
            .with_context(|| RunHalted {
                position: "login".to_string(),
                cursor,
            })?;
    }

    let confirmer: Box<dyn Confirmer> = if yes {
        Box::new(AcceptAll)
    } else {
        Box::new(TerminalConfirmer)
    };
    let journal = FileJournal::open(&cfg.state_dir, &profile.edition)?;
    let ctx = ReconcileContext {
        profile: &profile,
        pages: &wiki,
        items: &repo,
        confirmer: confirmer.as_ref(),
        journal: &journal,
        dry_run,
    };

    let outcome = run_batch(
        &wiki,
        &checkpoints,
        &ctx,
        &RunOptions { limit },
        |event, outcome| {
            if let Some(line) = describe(outcome) {
                println!("{} {line}", event.timestamp);
            }
        },
    )?;

    let stop = match outcome.stop {
        RunStop::Exhausted => "exhausted",
        RunStop::LimitReached => "limit",
    };
    println!(
        "run: edition={} processed={} written={} skipped={} cursor={} stop={stop}{}",
        outcome.edition,
        outcome.processed,
        outcome.written,
        outcome.skipped,
        outcome.cursor.as_deref().unwrap_or("none"),
        if dry_run { " (dry-run)" } else { "" }
    );
    println!(
        "journals: {} {}",
        journal.paths().changes_path.display(),
        journal.paths().review_path.display()
    );
    Ok(())
}

/// One stdout line per event that touched or questioned an item.
fn describe(outcome: &EventOutcome) -> Option<String> {
    match outcome {
        EventOutcome::Skipped(_) | EventOutcome::Unchanged { .. } => None,
        EventOutcome::Added { item_id, label } => Some(format!("{item_id} added {label:?}")),
        EventOutcome::Changed {
            item_id,
            from,
            to,
            alias_added,
        } => Some(format!(
            "{item_id} changed {from:?} -> {to:?}{}",
            if *alias_added { " (alias kept)" } else { "" }
        )),
        EventOutcome::Rejected { item_id, .. } => Some(format!("{item_id} rejected")),
        EventOutcome::Declined { item_id } => Some(format!("{item_id} declined")),
        EventOutcome::Unsure { item_id, .. } => Some(format!("{item_id} needs review")),
    }
}
