use crate::results::ResultsError;
use crate::store::StoreError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// A failed handler, rendered into an `err` envelope by the dispatcher.
#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        let code = match e {
            StoreError::Io { .. } => "io_failed",
            StoreError::Corrupt { .. } | StoreError::Encode { .. } => "store_corrupt",
        };
        tracing::error!(error = %e, "store operation failed");
        HandlerErr::new(code, e.to_string())
    }
}

impl From<ResultsError> for HandlerErr {
    fn from(e: ResultsError) -> Self {
        match e {
            ResultsError::InvalidName { field, .. } => {
                HandlerErr::new("bad_params", e.to_string()).with_details(json!({ "field": field }))
            }
            ResultsError::NotFound { .. } => HandlerErr::new("not_found", e.to_string()),
            ResultsError::Io { .. } => {
                tracing::error!(error = %e, "result file operation failed");
                HandlerErr::new("io_failed", e.to_string())
            }
            ResultsError::Store(inner) => HandlerErr::from(inner),
        }
    }
}
