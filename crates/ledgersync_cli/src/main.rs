//! LedgerSync CLI
//!
//! Offline expense ledger with sync to a remote store.
//!
//! # Commands
//!
//! - `add` / `edit` / `remove` - Change the local ledger
//! - `list` - Show the ledger and spending totals
//! - `budget` - Show or set the monthly budget
//! - `sync` - Push local changes and reconcile with the remote store
//! - `pull` - Replace the local ledger with the remote one

mod commands;

use clap::{Parser, Subcommand};
use commands::add::NewEntry;
use commands::edit::EntryChanges;
use commands::Context;
use ledgersync_engine::RetryConfig;
use ledgersync_protocol::{Frequency, UserId};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Offline expense ledger.
#[derive(Parser)]
#[command(name = "ledgersync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the ledger cache file
    #[arg(global = true, short, long, env = "LEDGERSYNC_CACHE", default_value = "ledger.json")]
    cache: PathBuf,

    /// Remote store base URL
    #[arg(
        global = true,
        short,
        long,
        env = "LEDGERSYNC_SERVER",
        default_value = "http://localhost:8080/api"
    )]
    server: String,

    /// User id (required to create a new ledger)
    #[arg(global = true, short, long, env = "LEDGERSYNC_USER")]
    user: Option<u64>,

    /// Session token sent to the remote store
    #[arg(global = true, long, env = "LEDGERSYNC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Request timeout in seconds
    #[arg(global = true, long, default_value = "30")]
    timeout: u64,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a new expense
    Add {
        /// Description
        name: String,

        /// Amount
        cost: f64,

        /// Category label
        category: String,

        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(short, long)]
        date: Option<String>,

        /// Repeat interval (weekly, bi-weekly, monthly, quarterly, yearly)
        #[arg(short, long)]
        repeat: Option<Frequency>,

        /// Last date of the recurrence
        #[arg(long)]
        until: Option<String>,
    },

    /// Change an expense by its list index
    Edit {
        /// Index shown by `list`
        index: usize,

        /// New description
        #[arg(long)]
        name: Option<String>,

        /// New amount
        #[arg(long)]
        cost: Option<f64>,

        /// New category
        #[arg(long)]
        category: Option<String>,

        /// New date
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Remove an expense by its list index
    Remove {
        /// Index shown by `list`
        index: usize,
    },

    /// Show the ledger
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show or set the monthly budget
    Budget {
        /// New monthly amount
        amount: Option<f64>,
    },

    /// Reconcile the ledger with the remote store
    Sync {
        /// Make a single attempt
        #[arg(long)]
        no_retry: bool,

        /// Maximum number of attempts
        #[arg(long, default_value = "3")]
        attempts: u32,

        /// Skip updates whose content already matches the remote row
        #[arg(long)]
        skip_unchanged: bool,
    },

    /// Replace the ledger with the remote state
    Pull {
        /// Discard unsynced local changes
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("ledgersync_engine=debug,ledgersync_cli=debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context {
        cache_path: cli.cache,
        server_url: cli.server,
        user: cli.user.map(UserId::new),
        token: cli.token,
        timeout: Duration::from_secs(cli.timeout),
    };
    let mut cache = ctx.load_cache()?;

    match cli.command {
        Commands::Add {
            name,
            cost,
            category,
            date,
            repeat,
            until,
        } => {
            let entry = NewEntry {
                name,
                cost,
                category,
                date,
                repeat,
                until,
            };
            commands::add::run(&mut cache, entry)?;
            ctx.save_cache(&cache)?;
        }
        Commands::Edit {
            index,
            name,
            cost,
            category,
            date,
        } => {
            let changes = EntryChanges {
                name,
                cost,
                category,
                date,
            };
            commands::edit::run(&mut cache, index, changes)?;
            ctx.save_cache(&cache)?;
        }
        Commands::Remove { index } => {
            commands::remove::run(&mut cache, index)?;
            ctx.save_cache(&cache)?;
        }
        Commands::List { format } => {
            commands::list::run(&cache, &format)?;
        }
        Commands::Budget { amount } => {
            commands::budget::run(&mut cache, amount)?;
            if amount.is_some() {
                ctx.save_cache(&cache)?;
            }
        }
        Commands::Sync {
            no_retry,
            attempts,
            skip_unchanged,
        } => {
            let config = ctx
                .sync_config(cache.user_id())
                .with_retry(RetryConfig::new(attempts))
                .with_skip_unchanged(skip_unchanged);
            let engine = ctx.engine(config)?;
            commands::sync::run(&engine, &mut cache, !no_retry)?;
            ctx.save_cache(&cache)?;
        }
        Commands::Pull { force } => {
            let engine = ctx.engine(ctx.sync_config(cache.user_id()))?;
            commands::pull::run(&engine, &mut cache, force)?;
            ctx.save_cache(&cache)?;
        }
    }

    Ok(())
}
