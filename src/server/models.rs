use serde::Serialize;

use crate::jobs::{ErrorCode, ErrorInfo};

/// Failure envelope. Every non-2xx body is `{"error": {...}}`.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: ErrorInfo,
}

impl ErrorResponse {
    pub(crate) fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorInfo {
                code,
                message: message.into(),
                retryable: false,
                details: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) uptime_seconds: u64,
    pub(crate) version: &'static str,
}
