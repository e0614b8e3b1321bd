use super::respond;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, require_login};
use crate::ipc::types::{AppState, Request};
use crate::results::{is_pdf_name, ResultEntry};
use crate::store::write_atomic;
use serde_json::json;
use std::io::ErrorKind;
use std::path::PathBuf;

fn entry_json(e: &ResultEntry) -> serde_json::Value {
    json!({
        "className": e.class_name,
        "examName": e.exam_name,
        "fileName": e.file_name,
        "sizeBytes": e.size_bytes,
        "sha256": e.sha256,
        "uploadedAt": e.uploaded_at,
    })
}

fn upload(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (ws, username) = require_login(state)?;
    let class_name = get_required_str(params, "className")?;
    let exam_name = get_required_str(params, "examName")?;
    let source = PathBuf::from(get_required_str(params, "sourcePath")?);

    let source_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if !is_pdf_name(source_name) {
        return Err(HandlerErr::new("bad_params", "only .pdf files can be uploaded")
            .with_details(json!({ "sourcePath": source.to_string_lossy() })));
    }

    let bytes = std::fs::read(&source).map_err(|e| {
        let code = match e.kind() {
            ErrorKind::NotFound => "not_found",
            _ => "io_failed",
        };
        HandlerErr::new(code, format!("failed to read {}: {}", source.to_string_lossy(), e))
    })?;

    let path = ws.results.save(username, &class_name, &exam_name, &bytes)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(json!({
        "path": path.to_string_lossy(),
        "fileName": file_name,
        "sizeBytes": bytes.len(),
    }))
}

fn list(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let (ws, username) = require_login(state)?;
    let entries = ws.results.list(username)?;
    let rows: Vec<serde_json::Value> = entries.iter().map(entry_json).collect();
    Ok(json!({ "results": rows }))
}

fn exams(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let (ws, username) = require_login(state)?;
    Ok(json!({ "exams": ws.results.exams(username)? }))
}

fn classes(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (ws, username) = require_login(state)?;
    let exam_name = get_required_str(params, "examName")?;
    Ok(json!({ "classes": ws.results.classes_for_exam(username, &exam_name)? }))
}

fn download(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (ws, username) = require_login(state)?;
    let class_name = get_required_str(params, "className")?;
    let exam_name = get_required_str(params, "examName")?;
    let out_path = PathBuf::from(get_required_str(params, "outPath")?);

    let bytes = ws.results.read(username, &class_name, &exam_name)?;
    write_atomic(&out_path, &bytes)?;
    Ok(json!({
        "path": out_path.to_string_lossy(),
        "sizeBytes": bytes.len(),
    }))
}

fn delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (ws, username) = require_login(state)?;
    let class_name = get_required_str(params, "className")?;
    let exam_name = get_required_str(params, "examName")?;
    let deleted = ws.results.delete(username, &class_name, &exam_name)?;
    Ok(json!({ "deleted": deleted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "results.upload" => upload(state, &req.params),
        "results.list" => list(state),
        "results.exams" => exams(state),
        "results.classes" => classes(state, &req.params),
        "results.download" => download(state, &req.params),
        "results.delete" => delete(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
