pub mod auth;
pub mod backup_exchange;
pub mod core;
pub mod results;
pub mod students;

use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::Request;

pub(crate) fn respond(req: &Request, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}
