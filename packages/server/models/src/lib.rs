#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API envelope and response types for the haver server.
//!
//! Every endpoint answers with an [`ApiResponse`], including errors, so
//! clients can always read `status` and `message` from the body.

use serde::{Deserialize, Serialize};

/// The `{status, message, data}` envelope wrapped around every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// HTTP status code, repeated in the body.
    pub status: u16,
    /// Human readable outcome.
    pub message: String,
    /// Payload, `null` for errors and bodiless successes.
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Creates a response carrying `data`.
    #[must_use]
    pub fn new(status: u16, message: impl Into<String>, data: T) -> Self {
        Self {
            status,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Creates a response with `data: null`.
    #[must_use]
    pub fn empty(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_response_serializes_null_data() {
        let value = serde_json::to_value(ApiResponse::empty(404, "Project not found")).unwrap();

        assert_eq!(
            value,
            serde_json::json!({ "status": 404, "message": "Project not found", "data": null })
        );
    }
}
