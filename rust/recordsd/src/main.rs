mod backup;
mod config;
mod credentials;
mod ipc;
mod layout;
mod results;
mod roster;
mod session;
mod store;
mod workspace;

use serde_json::json;
use std::io::{self, BufRead, Write};

fn main() {
    config::init_logging();
    let cfg = config::Config::from_args(std::env::args());

    let mut state = ipc::AppState::default();
    if let Some(path) = cfg.workspace.as_deref() {
        match workspace::Workspace::open(path) {
            Ok(ws) => {
                tracing::info!(workspace = %path.display(), "workspace opened");
                state.workspace = Some(ws);
            }
            Err(e) => {
                let message = format!("{e:#}");
                tracing::error!(workspace = %path.display(), error = %message, "failed to open workspace");
            }
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "unparseable request line");
                let resp = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
