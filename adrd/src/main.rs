//! Authentication-data replicator daemon.
//!
//! Tails a directory changelog, projects it into a KV store, and hosts the
//! STS session-token verifier's operator utilities.

#![forbid(unsafe_code)]

mod cursor;
mod driver;
mod http_api;
mod metrics;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use adr_common::changelog::InMemoryChangelogSource;
use adr_common::config::Config;
use adr_common::kv::RedisKvClient;
use adr_common::parser::ValidatingRuleParser;
use adr_common::token::{IssueRequest, VerifyOptions};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cursor::FileCursorStore;
use driver::Driver;

#[derive(Parser)]
#[command(name = "adrd")]
#[command(author, version, about = "Authentication-data replicator daemon")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the changelog tailer, applying entries to the KV store.
    Run,
    /// Issue a new STS session token using the configured primary key.
    IssueToken {
        #[arg(long)]
        uuid: String,
        #[arg(long)]
        role_arn: String,
        #[arg(long)]
        session_name: String,
        /// Seconds from now until expiry.
        #[arg(long, default_value_t = 3600)]
        ttl_secs: i64,
    },
    /// Verify an STS session token against the configured key store.
    VerifyToken {
        token: String,
    },
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_secs() as i64
}

fn init_logging(verbose: bool) {
    let filter = if verbose { EnvFilter::new("debug") } else { EnvFilter::new("info") };
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (config, sources) = Config::load(cli.config.as_deref()).context("loading configuration")?;
    for sourced in &sources {
        info!(field = %sourced.field, source = %sourced.source, "config value");
    }

    match cli.command {
        Command::Run => run(&config).await,
        Command::IssueToken { uuid, role_arn, session_name, ttl_secs } => {
            issue_token(&config, uuid, role_arn, session_name, ttl_secs)
        }
        Command::VerifyToken { token } => verify_token(&config, token),
    }
}

async fn run(config: &Config) -> Result<()> {
    info!(kv_url = %config.kv_url, "starting replicator");

    let kv = RedisKvClient::connect(&config.kv_url).context("connecting to KV store")?;
    let parser = ValidatingRuleParser;
    let cursor_store = FileCursorStore::new(&config.cursor_path);

    // The changelog source is a trait boundary (§6): a real LDAP tailer is
    // out of scope, so `run` drives an empty in-memory source until one is
    // wired in by an operator-supplied collaborator.
    let changelog = InMemoryChangelogSource::new(vec![]);

    metrics::register().context("registering metrics")?;

    let http_state = http_api::HttpState {
        cursor: Arc::new(FileCursorStore::new(&config.cursor_path)),
        changelog: Arc::new(InMemoryChangelogSource::new(vec![])),
        version: env!("CARGO_PKG_VERSION"),
        started_at: Instant::now(),
    };
    let _http_handle = http_api::start_server(&config.metrics_bind, http_state).await.context("starting HTTP server")?;

    let driver = Driver::new(&changelog, &kv, &parser, &cursor_store);
    driver.run_forever(std::time::Duration::from_secs(2)).await.context("replicator halted")?;
    Ok(())
}

fn issue_token(config: &Config, uuid: String, role_arn: String, session_name: String, ttl_secs: i64) -> Result<()> {
    let store = config.token.build_token_store().context("building token store")?;
    let now = now_unix();
    let token = store
        .generate(
            IssueRequest {
                uuid,
                role_arn,
                session_name,
                expires: now + ttl_secs,
            },
            now,
        )
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    metrics::observe_token("issue", "ok");
    println!("{token}");
    Ok(())
}

fn verify_token(config: &Config, token: String) -> Result<()> {
    let store = config.token.build_token_store().context("building token store")?;
    let now = now_unix();
    let options = VerifyOptions {
        issuer: Some(config.token.issuer.clone()),
        audience: Some(config.token.audience.clone()),
    };
    match store.verify(&token, &options, now) {
        Ok(claims) => {
            metrics::observe_token("verify", "ok");
            println!("{}", serde_json::to_string_pretty(&claims)?);
            Ok(())
        }
        Err(e) => {
            metrics::observe_token("verify", "rejected");
            warn!(error = %e, "token verification failed");
            Err(anyhow::anyhow!(e.to_string()))
        }
    }
}
