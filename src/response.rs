//! Standard response envelope helpers.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Uniform `{status, data, count?, offset?, limit?}` wrapper returned for every request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: Status,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl Envelope {
    pub fn success(data: Value) -> Self {
        Envelope {
            status: Status::Success,
            data,
            count: None,
            offset: None,
            limit: None,
        }
    }

    pub fn success_many(rows: Vec<Value>) -> Self {
        Self::success(Value::Array(rows))
    }

    /// Success without payload (deletes, association clears).
    pub fn success_empty() -> Self {
        Self::success(Value::Null)
    }

    /// Paginated list: `count` is the total ignoring the window.
    pub fn success_page(rows: Vec<Value>, count: u64, offset: u64, limit: Option<u64>) -> Self {
        Envelope {
            count: Some(count),
            offset: Some(offset),
            limit,
            ..Self::success_many(rows)
        }
    }

    pub fn error(err: &AppError) -> Self {
        Envelope {
            status: Status::Error,
            data: error_body(err.code(), err.to_string()),
            count: None,
            offset: None,
            limit: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Error code carried in `data.code`, if this is an error envelope.
    pub fn error_code(&self) -> Option<&str> {
        match self.status {
            Status::Error => self.data.get("code").and_then(Value::as_str),
            Status::Success => None,
        }
    }
}

pub fn error_body(code: &str, message: String) -> Value {
    serde_json::json!({
        "code": code,
        "message": message,
    })
}
