//! Shared error types including RFC7807 Problem Details.

use serde::{Deserialize, Serialize};

/// RFC7807 Problem Details (application/problem+json)
///
/// Every `/api/*` failure is rendered with this envelope so clients can surface
/// auth and validation errors instead of failing to decode a success body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// A URI reference that identifies the problem type.
    #[serde(rename = "type")]
    pub type_url: String,
    /// A short, human-readable summary of the problem type.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Human-readable explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// A URI reference that identifies the specific occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ProblemDetails {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            type_url: "https://mangahub.dev/problems/bad-request".to_string(),
            title: "Bad Request".to_string(),
            status: 400,
            detail: Some(detail.into()),
            instance: None,
        }
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self {
            type_url: "https://mangahub.dev/problems/unauthorized".to_string(),
            title: "Unauthorized".to_string(),
            status: 401,
            detail: Some(detail.into()),
            instance: None,
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            type_url: "https://mangahub.dev/problems/not-found".to_string(),
            title: "Not Found".to_string(),
            status: 404,
            detail: Some(detail.into()),
            instance: None,
        }
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self {
            type_url: "https://mangahub.dev/problems/conflict".to_string(),
            title: "Conflict".to_string(),
            status: 409,
            detail: Some(detail.into()),
            instance: None,
        }
    }

    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self {
            type_url: "https://mangahub.dev/problems/internal-error".to_string(),
            title: "Internal Server Error".to_string(),
            status: 500,
            detail: Some(detail.into()),
            instance: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_type_and_omits_absent_fields() {
        let value = serde_json::to_value(ProblemDetails::conflict("email already taken")).unwrap();
        assert_eq!(value["type"], "https://mangahub.dev/problems/conflict");
        assert_eq!(value["status"], 409);
        assert_eq!(value["detail"], "email already taken");
        assert!(value.get("instance").is_none());
        assert!(value.get("type_url").is_none());
    }
}
