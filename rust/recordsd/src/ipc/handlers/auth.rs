use super::respond;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, require_workspace};
use crate::ipc::types::{AppState, Request};
use crate::results::check_name;
use serde_json::json;

fn register(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let ws = require_workspace(state)?;
    let username = get_required_str(params, "username")?;
    let password = get_required_str(params, "password")?;
    // The username doubles as the name of the user's result directory.
    check_name("username", &username)?;
    if password.is_empty() {
        return Err(HandlerErr::new("bad_params", "password must not be empty"));
    }

    let registered = ws.credentials.register(&username, &password)?;
    if registered {
        tracing::info!(user = %username, "registered user");
    }
    // Registering never logs anyone in.
    Ok(json!({ "registered": registered, "username": username }))
}

fn login(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let username = get_required_str(params, "username")?;
    let password = get_required_str(params, "password")?;
    let ws = require_workspace(state)?;
    let table = ws.credentials.clone();

    if !state.session.login(&table, &username, &password)? {
        tracing::warn!(user = %username, "rejected login");
        return Err(HandlerErr::new("invalid_credentials", "invalid credentials"));
    }
    tracing::info!(user = %username, "logged in");
    Ok(json!({ "username": username }))
}

fn logout(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    if let Some(user) = state.session.username() {
        tracing::info!(user = %user, "logged out");
    }
    state.session.logout();
    Ok(json!({ "loggedOut": true }))
}

fn whoami(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({
        "loggedIn": state.session.is_logged_in(),
        "username": state.session.username(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.register" => register(state, &req.params),
        "auth.login" => login(state, &req.params),
        "auth.logout" => logout(state),
        "auth.whoami" => whoami(state),
        _ => return None,
    };
    Some(respond(req, result))
}
