use super::respond;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_optional_str, get_required_str, require_login};
use crate::ipc::types::{AppState, Request};
use crate::roster::{to_csv, SearchMode, StudentRecord};
use crate::store::write_atomic;
use crate::workspace::Workspace;
use serde_json::json;
use std::path::PathBuf;

fn student_json(s: &StudentRecord) -> serde_json::Value {
    json!({
        "rollNo": s.roll_no,
        "name": s.name,
        "fatherName": s.father_name,
        "class": s.class_name,
        "mobileNo": s.mobile_no,
        "address": s.address,
    })
}

fn parse_student(params: &serde_json::Value) -> Result<StudentRecord, HandlerErr> {
    Ok(StudentRecord {
        roll_no: get_required_str(params, "rollNo")?,
        name: get_required_str(params, "name")?,
        father_name: get_required_str(params, "fatherName")?,
        class_name: get_required_str(params, "class")?,
        mobile_no: get_required_str(params, "mobileNo")?,
        address: get_required_str(params, "address")?,
    })
}

/// Unrecognized modes match nothing rather than failing the request.
fn run_search(
    ws: &Workspace,
    params: &serde_json::Value,
) -> Result<Vec<StudentRecord>, HandlerErr> {
    let mode = get_required_str(params, "mode")?;
    let term = get_optional_str(params, "term");
    match SearchMode::parse(&mode) {
        Some(m) => Ok(ws.roster.search(term.as_deref(), m)?),
        None => {
            tracing::debug!(mode = %mode, "unknown search mode");
            Ok(Vec::new())
        }
    }
}

fn add(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = require_login(state)?;
    let record = parse_student(params)?;
    let blank = record.blank_fields();
    if !blank.is_empty() {
        return Err(HandlerErr::new("bad_params", "please fill in all fields")
            .with_details(json!({ "fields": blank })));
    }

    let roll_no = record.roll_no.clone();
    let added = ws.roster.add(record)?;
    if added {
        tracing::info!(roll_no = %roll_no, "added student");
    }
    Ok(json!({ "added": added, "rollNo": roll_no }))
}

fn search(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = require_login(state)?;
    let students = run_search(ws, params)?;
    let rows: Vec<serde_json::Value> = students.iter().map(student_json).collect();
    Ok(json!({ "students": rows }))
}

fn delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = require_login(state)?;
    let roll_no = get_required_str(params, "rollNo")?;
    ws.roster.delete(&roll_no)?;
    tracing::info!(roll_no = %roll_no, "deleted student");
    Ok(json!({ "deleted": true, "rollNo": roll_no }))
}

fn roll_numbers(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = require_login(state)?;
    Ok(json!({ "rollNumbers": ws.roster.roll_numbers()? }))
}

fn export_csv(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (ws, _) = require_login(state)?;
    let out_path = PathBuf::from(get_required_str(params, "outPath")?);
    let students = run_search(ws, params)?;
    write_atomic(&out_path, to_csv(&students).as_bytes())?;
    Ok(json!({
        "path": out_path.to_string_lossy(),
        "rowCount": students.len(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.add" => add(state, &req.params),
        "students.search" => search(state, &req.params),
        "students.delete" => delete(state, &req.params),
        "students.rollNumbers" => roll_numbers(state),
        "students.exportCsv" => export_csv(state, &req.params),
        _ => return None,
    };
    Some(respond(req, result))
}
