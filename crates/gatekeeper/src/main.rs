//! # Gatekeeper CLI
//!
//! Operator tooling around the verification core: validates the compound
//! data, inspects records, pre-approval lists and stored sessions, and
//! maintains the blocklist.
//!
//! ```text
//! gatekeeper check
//! gatekeeper record 42
//! gatekeeper pre-approved 1001 123456
//! gatekeeper session 123456
//! gatekeeper block 123456
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use gatekeeper::config::{AppConfig, ConfigOverrides};
use gatekeeper::state::AppState;

/// Chiral Gate - join request verification core
#[derive(Parser, Debug)]
#[command(name = "gatekeeper")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/gatekeeper.toml")]
    config: String,

    /// Redis URL (overrides config)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Bot identity whose sessions are served (overrides config)
    #[arg(long, env = "BOT_USER_ID")]
    bot_user_id: Option<i64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open data files and the session store, verify every candidate
    Check,
    /// Print the index entry and raw record of a compound
    Record { id: u32 },
    /// Look up a user in a group's pre-approval list
    PreApproved { group_id: i64, user_id: i64 },
    /// Print the stored session of a user as JSON
    Session { user_id: i64 },
    /// Ignore a user's private messages and button presses
    Block { user_id: i64 },
    /// Lift a block
    Unblock { user_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_logging(&args.log_level, args.json_logs)?;

    info!("🧪 Starting Chiral Gate v{}", env!("CARGO_PKG_VERSION"));

    let overrides = ConfigOverrides {
        redis_url: args.redis_url.clone(),
        bot_user_id: args.bot_user_id,
    };
    let config = AppConfig::load(&args.config, &overrides)?;
    info!("📋 Configuration loaded from {}", args.config);

    let state = AppState::new(config).await?;

    match args.command {
        Command::Check => check(&state).await,
        Command::Record { id } => {
            let entry = state
                .library
                .index_record(id)
                .await
                .with_context(|| format!("Failed to read index slot {id}"))?;
            let text = state
                .library
                .fetch_record_text(id)
                .await
                .with_context(|| format!("Failed to fetch compound {id}"))?;
            println!("{entry:?}");
            println!("{text}");
            Ok(())
        }
        Command::PreApproved { group_id, user_id } => {
            let approved = state
                .preapproval
                .is_pre_approved(group_id, user_id)
                .await
                .context("Failed to read pre-approval list")?;
            println!("{approved}");
            Ok(())
        }
        Command::Session { user_id } => {
            let repo = state.repository()?;
            match repo.get_session(user_id).await.context("Failed to load session")? {
                Some(session) => println!("{}", serde_json::to_string_pretty(&session)?),
                None => println!("no session for user {user_id}"),
            }
            Ok(())
        }
        Command::Block { user_id } => {
            ensure_user_id(user_id)?;
            let blocked = state.repository()?.block_user(user_id).await.context("Failed to block user")?;
            println!("{}", if blocked { "blocked" } else { "already blocked" });
            Ok(())
        }
        Command::Unblock { user_id } => {
            ensure_user_id(user_id)?;
            let lifted = state.repository()?.unblock_user(user_id).await.context("Failed to unblock user")?;
            println!("{}", if lifted { "unblocked" } else { "not blocked" });
            Ok(())
        }
    }
}

fn ensure_user_id(user_id: i64) -> Result<()> {
    if user_id <= 0 {
        anyhow::bail!("invalid user id {user_id}");
    }
    Ok(())
}

/// Resolve every candidate through the index and the record store
async fn check(state: &AppState) -> Result<()> {
    let candidates = state.library.candidates();
    let mut broken = 0usize;
    for &id in candidates.ids() {
        if let Err(e) = state.library.fetch_record(id).await {
            warn!(id, error = %e, "Candidate unusable");
            broken += 1;
        }
    }

    state.repository()?;
    info!(
        "✅ {} candidates checked, {} unusable, store backend {:?}",
        candidates.len(),
        broken,
        state.config.store_backend
    );

    if broken > 0 {
        anyhow::bail!("{broken} of {} candidates are unusable", candidates.len());
    }
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
