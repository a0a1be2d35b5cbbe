mod bulk_csv;
mod cache;
mod config;
mod db;
mod ipc;
mod logging;
mod model;
mod stats;
mod timetable;

use std::io::{self, BufRead, Write};

use clap::Parser;
use tracing::{error, info};

fn main() {
    let config = config::Config::parse();
    logging::init(&config.log_filter);

    let mut state = ipc::AppState::new(Box::new(timetable::SampleTimetable));
    if let Some(path) = config.workspace.as_deref() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            error!(workspace = %path.display(), error = ?e, "cannot open startup workspace");
        }
    }
    info!(version = env!("CARGO_PKG_VERSION"), "attendd ready");

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
            // No id to echo back.
            Err(e) => serde_json::json!({
                "ok": false,
                "error": { "code": "bad_json", "message": e.to_string() },
            }),
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
