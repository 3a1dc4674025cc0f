mod ai;
mod analytics;
mod announcements;
mod config;
mod curriculum;
mod db;
mod error;
mod gateway;
mod help_queue;
mod ipc;
mod model;
mod progress;
mod roster;
mod transfer;

use std::io::{self, BufRead, Write};

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::ai::{ContentGenerator, HttpContentClient};

fn init_tracing() {
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
}

fn content_client(args: &config::Args) -> Option<Box<dyn ContentGenerator>> {
    let settings = args.llm_settings()?;
    match HttpContentClient::new(settings) {
        Ok(client) => {
            info!(model = client.model(), "content generation enabled");
            Some(Box::new(client))
        }
        Err(e) => {
            warn!(error = %e, "content client unavailable");
            None
        }
    }
}

fn main() {
    init_tracing();
    let args = config::Args::parse();

    let mut state = ipc::AppState {
        workspace: None,
        store: None,
        ai: content_client(&args),
    };
    if let Some(path) = args.workspace.as_deref() {
        if let Err(e) = ipc::select_workspace(&mut state, path) {
            error!(workspace = %path.display(), error = %format!("{e:#}"), "workspace open failed");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                warn!(error = %e, "unparseable request line");
                // No id to echo back.
                ipc::err("", "bad_json", e.to_string(), None)
            }
        };

        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
