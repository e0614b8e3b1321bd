use super::respond;
use crate::backup;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, require_login};
use crate::ipc::types::{AppState, Request};
use crate::workspace::Workspace;
use serde_json::json;
use std::path::PathBuf;

fn backup_failed(e: anyhow::Error) -> HandlerErr {
    let message = format!("{e:#}");
    tracing::error!(error = %message, "backup operation failed");
    HandlerErr::new("backup_failed", message)
}

fn export_bundle(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = require_login(state)?;
    let out_path = PathBuf::from(get_required_str(params, "outPath")?);
    let summary = backup::export_workspace_bundle(ws.root(), &out_path).map_err(backup_failed)?;
    tracing::info!(bundle = %out_path.display(), entries = summary.entry_count, "exported workspace bundle");
    Ok(json!({
        "path": out_path.to_string_lossy(),
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
    }))
}

fn import_bundle(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = require_login(state)?;
    let root = ws.root().to_path_buf();
    let in_path = PathBuf::from(get_required_str(params, "inPath")?);

    let summary = backup::import_workspace_bundle(&in_path, &root).map_err(backup_failed)?;
    // Reopen so an imported older roster goes through the upgrade step.
    let reopened = Workspace::open(&root).map_err(backup_failed)?;
    let still_registered = match state.session.username() {
        Some(username) => reopened.credentials.is_registered(username)?,
        None => false,
    };
    if !still_registered {
        state.session.logout();
    }
    state.workspace = Some(reopened);
    tracing::info!(
        bundle = %in_path.display(),
        entries = summary.entry_count,
        users_added = summary.users_added,
        "imported workspace bundle"
    );
    Ok(json!({
        "bundleFormatDetected": summary.bundle_format_detected,
        "entryCount": summary.entry_count,
        "usersAdded": summary.users_added,
        "loggedIn": state.session.is_logged_in(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "backup.exportWorkspaceBundle" => export_bundle(state, &req.params),
        "backup.importWorkspaceBundle" => import_bundle(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
