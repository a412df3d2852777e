//! # Recall Me CLI (`recall`)
//!
//! Searches your documents and asks an AI webhook about them.
//!
//! ## Usage
//!
//! ```bash
//! recall --config ./config/recall.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall search "<query>"` | Show the raw retrieved passages |
//! | `recall ask "<query>"` | Search, send to the webhook, print the answer |
//! | `recall saved list` | List saved searches from the config file |
//! | `recall saved run <name>` | Re-run a saved search |
//! | `recall profiles` | Show poll profiles and their worst-case wait |
//!
//! Logging goes to stderr and is controlled by `RECALL_LOG`
//! (e.g. `RECALL_LOG=recall_me=debug`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use recall_me::ask::{self, AskOptions};
use recall_me::config::{self, Config};
use recall_me::export::ExportFormat;
use recall_me::progress::ProgressMode;
use recall_me::{profiles, saved, search};

/// Recall Me: ask questions about your own documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "recall",
    about = "Recall Me: search your documents and ask an AI webhook about them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search documents and print the retrieved passages.
    Search {
        /// The search query string.
        query: String,

        /// Number of passages to retrieve.
        #[arg(long)]
        k: Option<usize>,

        /// Output format: `text` or `json`.
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Search, send the results to the AI webhook, and print its answer.
    ///
    /// Without a configured webhook (or with `--no-ai`) the formatted
    /// search results are printed instead.
    Ask {
        /// The question.
        query: String,

        /// Number of passages to retrieve.
        #[arg(long)]
        k: Option<usize>,

        /// Poll profile from `[webhook.profiles]` (default: `webhook.profile`).
        #[arg(long)]
        profile: Option<String>,

        /// Webhook URL, overriding `webhook.url`.
        #[arg(long)]
        webhook: Option<String>,

        /// Send the question without retrieved context.
        #[arg(long)]
        no_context: bool,

        /// Skip the webhook and print the search results.
        #[arg(long)]
        no_ai: bool,

        /// Output format: `text`, `markdown`, or `json`.
        #[arg(long, default_value = "text")]
        format: String,

        /// Write the answer to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Poll progress on stderr: `off`, `human`, or `json`.
        /// Defaults to `human` when stderr is a terminal.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Saved searches from `[[saved]]` in the config file.
    Saved {
        #[command(subcommand)]
        action: SavedAction,
    },

    /// List poll profiles with their schedule and worst-case wait.
    Profiles,
}

#[derive(Subcommand)]
enum SavedAction {
    /// List saved searches.
    List,
    /// Run a saved search by name.
    Run {
        name: String,

        /// Output format: `text`, `markdown`, or `json`.
        #[arg(long, default_value = "text")]
        format: String,

        /// Write the answer to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Poll progress on stderr: `off`, `human`, or `json`.
        #[arg(long)]
        progress: Option<String>,
    },
}

fn progress_mode(arg: Option<&str>) -> anyhow::Result<ProgressMode> {
    match arg {
        Some(s) => ProgressMode::parse(s),
        None => Ok(ProgressMode::default_for_tty()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_env("RECALL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        tracing::debug!(
            "No config file at {}, using defaults",
            cli.config.display()
        );
        Config::minimal()
    };

    match cli.command {
        Commands::Search { query, k, format } => {
            search::run_search(&cfg, &query, k, &format).await?;
        }
        Commands::Ask {
            query,
            k,
            profile,
            webhook,
            no_context,
            no_ai,
            format,
            output,
            progress,
        } => {
            let format = ExportFormat::parse(&format)?;
            let opts = AskOptions {
                k,
                profile,
                webhook_url: webhook,
                include_context: !no_context,
                use_ai: !no_ai,
                progress: progress_mode(progress.as_deref())?,
                ..AskOptions::new(query)
            };
            ask::run_ask(&cfg, &opts, format, output.as_deref()).await?;
        }
        Commands::Saved { action } => match action {
            SavedAction::List => {
                saved::list_saved(&cfg)?;
            }
            SavedAction::Run {
                name,
                format,
                output,
                progress,
            } => {
                let format = ExportFormat::parse(&format)?;
                let progress = progress_mode(progress.as_deref())?;
                saved::run_saved(&cfg, &name, format, output.as_deref(), progress).await?;
            }
        },
        Commands::Profiles => {
            profiles::list_profiles(&cfg)?;
        }
    }

    Ok(())
}
