use serde_json::Value;
use thiserror::Error;

use crate::wire::{Patch, PatchOp};

pub mod artifact;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("response must be a JSON object with an \"ops\" array")]
    MissingOps,
    #[error("\"ops\" must be an array")]
    OpsNotArray,
    #[error("op {index}: {reason}")]
    InvalidOp { index: usize, reason: String },
}

impl PatchError {
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Models sometimes wrap JSON in a ```json fence despite instructions.
fn strip_fence(raw: &str) -> &str {
    let t = raw.trim();
    let Some(rest) = t.strip_prefix("```") else { return t };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn required_str(op: &Value, field: &str, index: usize) -> Result<String, PatchError> {
    match op.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(PatchError::InvalidOp { index, reason: format!("\"{field}\" must not be empty") }),
        Some(_) => Err(PatchError::InvalidOp { index, reason: format!("\"{field}\" must be a string") }),
        None => Err(PatchError::InvalidOp { index, reason: format!("missing \"{field}\"") }),
    }
}

/// Decode a model response into a patch. Every op must be a complete
/// `editFile`; the first bad op rejects the whole patch.
pub fn validate_patch(raw: &str) -> Result<Patch, PatchError> {
    let value: Value = serde_json::from_str(strip_fence(raw)).map_err(|e| PatchError::InvalidJson(e.to_string()))?;
    let ops = match value.as_object().and_then(|o| o.get("ops")) {
        None => return Err(PatchError::MissingOps),
        Some(Value::Array(ops)) => ops,
        Some(_) => return Err(PatchError::OpsNotArray),
    };

    let mut out = Vec::with_capacity(ops.len());
    for (index, op) in ops.iter().enumerate() {
        if !op.is_object() {
            return Err(PatchError::InvalidOp { index, reason: "op must be an object".into() });
        }
        let kind = required_str(op, "kind", index)?;
        if kind != "editFile" {
            return Err(PatchError::InvalidOp { index, reason: format!("unsupported kind \"{kind}\" (expected \"editFile\")") });
        }
        out.push(PatchOp {
            kind,
            path: required_str(op, "path", index)?,
            find: required_str(op, "find", index)?,
            replace: required_str(op, "replace", index)?,
        });
    }
    Ok(Patch { ops: out })
}
