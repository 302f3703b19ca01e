//! # ApiClient: Abstract Backend Operations
//!
//! This module defines the `ApiClient` trait, the only seam between the sync
//! engine and the backend. The engine stays transport-agnostic: an HTTP
//! adapter, a test double or an offline stub all plug in here.
//!
//! ## Design
//!
//! ```text
//! lichtblick-sync (pure)         frontend (transport)
//! ┌──────────────────┐           ┌──────────────────┐
//! │ SyncEngine       │           │ HttpApiClient    │
//! │   ┌───────────┐  │           │   implements     │
//! │   │ ApiClient │◄─┼───────────│   ApiClient      │
//! │   └───────────┘  │           │                  │
//! └──────────────────┘           └──────────────────┘
//! ```
//!
//! Every call answers with an explicit [`ApiResponse`] instead of an error
//! type, because "the endpoint does not exist" is an expected answer that
//! drives capability discovery rather than a failure.

use crate::capability::ProbeOutcome;
use crate::types::{PostId, ReactionKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Tagged answer from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResponse<T> {
    /// The request succeeded
    Ok(T),
    /// The endpoint exists but the post does not
    NotFound,
    /// The endpoint does not exist on this backend
    Unsupported,
    /// Network, validation or server failure
    Error(String),
}

impl<T> ApiResponse<T> {
    /// What this answer tells the capability registry.
    ///
    /// `NotFound` only speaks about the post, so it is inconclusive for the
    /// feature.
    pub fn probe_outcome(&self) -> ProbeOutcome {
        match self {
            Self::Ok(_) => ProbeOutcome::ConfirmedSupported,
            Self::Unsupported => ProbeOutcome::ConfirmedUnsupported,
            Self::NotFound | Self::Error(_) => ProbeOutcome::Inconclusive,
        }
    }

    /// Short status label for logs
    pub fn status_label(&self) -> &'static str {
        match self {
            Self::Ok(_) => "ok",
            Self::NotFound => "not_found",
            Self::Unsupported => "unsupported",
            Self::Error(_) => "error",
        }
    }
}

/// A comment as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteComment {
    /// Server-issued identifier
    pub id: String,
    /// Author display name (the backend sends the author's email)
    #[serde(default)]
    pub author: String,
    /// Comment body
    pub text: String,
    /// ISO-8601 creation time
    #[serde(default)]
    pub created_at: Option<String>,
}

/// How an HTTP adapter should read a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpClass {
    /// 2xx
    Success,
    /// The route is missing (404, 405, 501)
    MissingEndpoint,
    /// Anything else
    Failure,
}

/// Classify an HTTP status code for optional-feature endpoints.
///
/// Backends without a feature answer its routes with 404, so a 404 on these
/// routes means "unsupported" rather than "post not found".
pub fn classify_http_status(status: u16) -> HttpClass {
    match status {
        200..=299 => HttpClass::Success,
        404 | 405 | 501 => HttpClass::MissingEndpoint,
        _ => HttpClass::Failure,
    }
}

/// Backend operations consumed by the sync engine.
///
/// Implementations bound the duration of each call themselves and report a
/// timeout as [`ApiResponse::Error`].
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Enable or disable the current user's reaction on a post
    async fn set_reaction(
        &self,
        post_id: &PostId,
        kind: ReactionKind,
        enabled: bool,
    ) -> ApiResponse<()>;

    /// Fetch all comments of a post, oldest first
    async fn list_comments(&self, post_id: &PostId) -> ApiResponse<Vec<RemoteComment>>;

    /// Post a comment; the backend may return the new comment's id
    async fn add_comment(&self, post_id: &PostId, text: &str) -> ApiResponse<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_outcomes() {
        assert_eq!(
            ApiResponse::Ok(()).probe_outcome(),
            ProbeOutcome::ConfirmedSupported
        );
        assert_eq!(
            ApiResponse::<()>::Unsupported.probe_outcome(),
            ProbeOutcome::ConfirmedUnsupported
        );
        assert_eq!(
            ApiResponse::<()>::NotFound.probe_outcome(),
            ProbeOutcome::Inconclusive
        );
        assert_eq!(
            ApiResponse::<()>::Error("timeout".into()).probe_outcome(),
            ProbeOutcome::Inconclusive
        );
    }

    #[test]
    fn test_http_classification() {
        assert_eq!(classify_http_status(200), HttpClass::Success);
        assert_eq!(classify_http_status(201), HttpClass::Success);
        assert_eq!(classify_http_status(404), HttpClass::MissingEndpoint);
        assert_eq!(classify_http_status(501), HttpClass::MissingEndpoint);
        assert_eq!(classify_http_status(422), HttpClass::Failure);
        assert_eq!(classify_http_status(500), HttpClass::Failure);
    }

    #[test]
    fn test_remote_comment_accepts_backend_payload() {
        let json = r#"{
            "id": "7c1e",
            "post_id": "p1",
            "user_id": "u1",
            "text": "Schönes Foto",
            "created_at": "2025-05-01T10:00:00",
            "author": "ana@example.org"
        }"#;
        let comment: RemoteComment = serde_json::from_str(json).unwrap();
        assert_eq!(comment.author, "ana@example.org");
        assert_eq!(comment.created_at.as_deref(), Some("2025-05-01T10:00:00"));
    }
}
