//! Error classification into retry categories (spec §4.7 "Error Classifier").

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Retriable,
    NonRetriableClient,
    NonRetriableCredential,
    NonRetriableQuota,
}

impl ErrorClass {
    pub fn is_retriable(self) -> bool {
        matches!(self, ErrorClass::Retriable)
    }
}

const TIMEOUT_CODES: &[&str] = &["ERR_TIMEOUT", "ETIMEDOUT", "ECONNABORTED"];
const TIMEOUT_NAMES: &[&str] = &["TimeoutError", "AbortError"];

/// Extracts a status code from the first of `.status`, `.statusCode`,
/// `.response.status` that is present (spec §4.7 "Extract status code").
fn extract_status(error: &Value) -> Option<i64> {
    error
        .get("status")
        .or_else(|| error.get("statusCode"))
        .or_else(|| error.get("response").and_then(|r| r.get("status")))
        .and_then(Value::as_i64)
}

fn is_timeout(error: &Value) -> bool {
    let code = error.get("code").and_then(Value::as_str).unwrap_or("");
    let name = error.get("name").and_then(Value::as_str).unwrap_or("");
    TIMEOUT_CODES.contains(&code) || TIMEOUT_NAMES.contains(&name)
}

/// Classifies an arbitrary error value (spec §4.7). Status-code
/// presence takes precedence over timeout-name detection, per the spec's
/// explicit ordering (§8 "Classifier precedence").
pub fn classify_error(error: &Value) -> ErrorClass {
    if let Some(status) = extract_status(error) {
        return match status {
            401 | 403 => ErrorClass::NonRetriableCredential,
            402 => ErrorClass::NonRetriableQuota,
            400 | 404 | 422 => ErrorClass::NonRetriableClient,
            429 => ErrorClass::Retriable,
            500 | 502 | 503 | 504 => ErrorClass::Retriable,
            s if (400..500).contains(&s) => ErrorClass::NonRetriableClient,
            s if (500..600).contains(&s) => ErrorClass::Retriable,
            _ => ErrorClass::Retriable,
        };
    }

    if is_timeout(error) {
        return ErrorClass::Retriable;
    }

    ErrorClass::Retriable
}
