//! # CLI Layer
//!
//! This module is **one possible client** for refkeep: an operator tool run
//! against an exported store snapshot. Request handlers and scheduled jobs use
//! [`refkeep::RefkeepApi`] directly.
//!
//! The CLI layer is the **only** place in the workspace that:
//! - Knows about terminal I/O (stdout, stderr)
//! - Installs a tracing subscriber
//! - Handles argument parsing
//! - Decides exit codes
//!
//! ## Structure
//!
//! - `run()`: parse, set up logging and context, dispatch
//! - `init_context()`: loads config and opens the store
//! - `handle_*()`: one per subcommand, calling the API and printing the outcome

use super::render::{
    print_messages, render_json, render_report, render_thread, ThreadJson,
};
use super::setup::{Cli, Commands};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use refkeep::commands::CmdMessage;
use refkeep::config::{self, RefkeepConfig};
use refkeep::model::{Identity, RootKind};
use refkeep::store::fs::FileStore;
use refkeep::store::fs_backend::SNAPSHOT_FILE;
use refkeep::RefkeepApi;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

struct AppContext {
    api: RefkeepApi<FileStore>,
    config: RefkeepConfig,
    store_path: PathBuf,
    json: bool,
}

impl AppContext {
    /// JSON mode prints `value`; human mode prints `messages`.
    fn emit<T: Serialize>(&self, value: &T, messages: &[CmdMessage]) -> Result<()> {
        if self.json {
            print!("{}", render_json(value)?);
        } else {
            print_messages(messages);
        }
        Ok(())
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Config template needs neither config nor store
    if let Commands::Config { template: true } = &cli.command {
        print!("{}", config::template());
        return Ok(());
    }

    let ctx = init_context(&cli)?;
    debug!(store = %ctx.store_path.display(), "store opened");

    match cli.command {
        Commands::Delete { kind, id } => handle_delete(&ctx, kind, &id).await,
        Commands::DeleteComment {
            kind,
            root_id,
            comment_id,
        } => handle_delete_comment(&ctx, kind, &root_id, &comment_id).await,
        Commands::CloseAccount {
            uid,
            caller,
            elevated,
        } => {
            let caller = if elevated {
                Identity::admin(caller)
            } else {
                Identity::user(caller)
            };
            handle_close_account(&ctx, &caller, &uid).await
        }
        Commands::Scan => handle_scan(&ctx).await,
        Commands::Clean { yes } => handle_clean(&ctx, yes).await,
        Commands::Reconcile { kind, id } => handle_reconcile(&ctx, kind, id.as_deref()).await,
        Commands::Thread { kind, id } => handle_thread(&ctx, kind, &id).await,
        Commands::Config { .. } => handle_config(&ctx),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "refkeep=info",
        1 => "refkeep=debug",
        _ => "refkeep=trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .try_init();
}

fn init_context(cli: &Cli) -> Result<AppContext> {
    let config = RefkeepConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let store_path = cli
        .store
        .clone()
        .or_else(|| config.store_path.clone())
        .unwrap_or_else(|| PathBuf::from(SNAPSHOT_FILE));
    let store = FileStore::open(store_path.clone());
    let api = RefkeepApi::from_config(store, &config);

    Ok(AppContext {
        api,
        config,
        store_path,
        json: cli.json,
    })
}

async fn handle_delete(ctx: &AppContext, kind: RootKind, id: &str) -> Result<()> {
    let outcome = ctx.api.delete_root(kind, id).await?;
    ctx.emit(&outcome, &outcome.messages())
}

async fn handle_delete_comment(
    ctx: &AppContext,
    kind: RootKind,
    root_id: &str,
    comment_id: &str,
) -> Result<()> {
    let outcome = ctx.api.delete_comment(kind, root_id, comment_id).await?;
    ctx.emit(&outcome, &outcome.messages())
}

async fn handle_close_account(ctx: &AppContext, caller: &Identity, uid: &str) -> Result<()> {
    let outcome = ctx.api.close_account(caller, uid).await?;
    ctx.emit(&outcome, &outcome.messages())
}

async fn handle_scan(ctx: &AppContext) -> Result<()> {
    let report = ctx.api.scan_orphans().await?;
    if ctx.json {
        print!("{}", render_json(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(())
}

async fn handle_clean(ctx: &AppContext, yes: bool) -> Result<()> {
    let report = ctx.api.scan_orphans().await?;
    let preview = ctx.api.clean_preview(&report);

    if preview.total() == 0 {
        return ctx.emit(&preview, &[CmdMessage::info("Nothing to clean.")]);
    }
    if !yes {
        if ctx.json {
            print!("{}", render_json(&preview)?);
        } else {
            print!("{}", render_report(&report));
            print_messages(&[CmdMessage::warning(format!(
                "{} record(s) would be deleted. Re-run with --yes to delete them.",
                preview.total()
            ))]);
        }
        return Ok(());
    }

    let summary = ctx.api.clean_orphans(&report).await?;
    ctx.emit(&summary, &summary.messages())
}

async fn handle_reconcile(ctx: &AppContext, kind: RootKind, id: Option<&str>) -> Result<()> {
    match id {
        Some(id) => match ctx.api.reconcile_counter(kind, id).await? {
            Some(fixed) => ctx.emit(&fixed, &[fixed.message()]),
            None => anyhow::bail!("{} {} not found", kind, id),
        },
        None => {
            let fixed = ctx.api.reconcile_all(kind).await?;
            let mut messages: Vec<CmdMessage> = fixed.iter().map(|f| f.message()).collect();
            messages.push(CmdMessage::info(format!(
                "{} {} counter(s) corrected",
                fixed.len(),
                kind
            )));
            ctx.emit(&fixed, &messages)
        }
    }
}

async fn handle_thread(ctx: &AppContext, kind: RootKind, id: &str) -> Result<()> {
    let threads = ctx.api.thread(kind, id).await?;
    if ctx.json {
        print!("{}", render_json(&ThreadJson::forest(&threads))?);
    } else {
        print!("{}", render_thread(&threads, Utc::now()));
    }
    Ok(())
}

fn handle_config(ctx: &AppContext) -> Result<()> {
    if ctx.json {
        print!("{}", render_json(&ctx.config)?);
        return Ok(());
    }
    let store = ctx.store_path.display().to_string();
    let lines = [
        format!("max_batch_ops = {}", ctx.config.max_batch_ops),
        format!("op_timeout_ms = {}", ctx.config.op_timeout_ms),
        format!("sweep_ghost_comments = {}", ctx.config.sweep_ghost_comments),
        format!("store_path = {}", store),
    ];
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}
