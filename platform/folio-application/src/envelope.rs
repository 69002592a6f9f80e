use crate::period::iso_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_UNAUTHORIZED: u16 = 401;
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;
pub const STATUS_INTERNAL_ERROR: u16 = 500;
pub const STATUS_UNAVAILABLE: u16 = 503;

/// `{success, data?, error?, timestamp}` wrapper returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

/// An envelope together with the HTTP status it would be served with.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    pub status: u16,
    pub envelope: ApiEnvelope<T>,
}

impl<T> Reply<T> {
    pub fn ok(data: T, now: DateTime<Utc>) -> Self {
        Self {
            status: STATUS_OK,
            envelope: ApiEnvelope {
                success: true,
                data: Some(data),
                error: None,
                timestamp: iso_timestamp(now),
            },
        }
    }

    pub fn error(status: u16, message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            status,
            envelope: ApiEnvelope {
                success: false,
                data: None,
                error: Some(message.into()),
                timestamp: iso_timestamp(now),
            },
        }
    }

    /// Errors become a 500 carrying the message verbatim.
    pub fn from_result(result: Result<T, String>, now: DateTime<Utc>) -> Self {
        match result {
            Ok(data) => Self::ok(data, now),
            Err(err) => Self::error(STATUS_INTERNAL_ERROR, err, now),
        }
    }

    pub fn is_success(&self) -> bool {
        self.envelope.success
    }
}

impl<T: Serialize> Reply<T> {
    pub fn to_json(&self) -> Result<serde_json::Value, String> {
        serde_json::to_value(&self.envelope)
            .map_err(|err| format!("failed to serialize response envelope: {err}"))
    }
}

/// Maps an exchange error message to a status and a user-facing message.
pub fn classify_exchange_error(message: &str) -> (u16, &'static str) {
    let lower = message.to_lowercase();
    if lower.contains("invalid api-key") || lower.contains("unauthorized") {
        (
            STATUS_UNAUTHORIZED,
            "Invalid API credentials. Please check your Binance API key.",
        )
    } else if lower.contains("timestamp") || lower.contains("recvwindow") {
        (
            STATUS_BAD_REQUEST,
            "Server time synchronization error. Please try again.",
        )
    } else if lower.contains("configured") || lower.contains("not found") {
        (
            STATUS_INTERNAL_ERROR,
            "API configuration error. Environment variables may be missing.",
        )
    } else if lower.contains("enotfound") || lower.contains("network") || lower.contains("timeout")
    {
        (
            STATUS_UNAVAILABLE,
            "Network connection error. Please check your internet connection.",
        )
    } else if lower.contains("rate limit") || lower.contains("too many requests") {
        (
            STATUS_TOO_MANY_REQUESTS,
            "Binance API rate limit exceeded. Please wait before retrying.",
        )
    } else {
        (STATUS_INTERNAL_ERROR, "Failed to fetch portfolio data")
    }
}
