use crate::ipc::error::HandlerErr;
use crate::ipc::types::AppState;
use crate::workspace::Workspace;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn require_workspace(state: &AppState) -> Result<&Workspace, HandlerErr> {
    state
        .workspace
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

/// The workspace plus the logged-in username; everything past login goes through here.
pub fn require_login(state: &AppState) -> Result<(&Workspace, &str), HandlerErr> {
    let ws = require_workspace(state)?;
    let username = state
        .session
        .username()
        .ok_or_else(|| HandlerErr::new("not_logged_in", "log in first"))?;
    Ok((ws, username))
}
