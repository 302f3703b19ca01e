//! Categorized sync errors
//!
//! Provides structured error types that enable:
//! - Categorized error handling (input vs network vs missing post)
//! - Appropriate notice severity routing in the presentation layer
//! - Recovery hints for user-actionable errors
//!
//! Backend capability gaps are not errors: a missing feature
//! degrades to local-only mode and is reported as a successful outcome.

use crate::types::{Feature, PostId};
use std::fmt;

// ============================================================================
// Error Categories
// ============================================================================

/// Severity used by frontends to pick a notice style.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Informational, no action lost
    Info,
    /// Action was reverted but can be retried
    Warning,
    /// Unexpected failure
    Error,
}

/// High-level error categories for frontend error handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// User input validation errors (correctable by user)
    Input,
    /// Configuration errors (correctable by modifying settings)
    Config,
    /// The post vanished on the server
    NotFound,
    /// Network or server errors (often transient)
    Network,
}

impl ErrorCategory {
    /// Check if this error category is user-correctable.
    #[must_use]
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, Self::Input | Self::Config)
    }

    /// Check if this error category is likely transient.
    ///
    /// Transient errors may resolve on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get the appropriate notice severity for this category.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Input => Severity::Info,
            Self::Config => Severity::Error,
            Self::NotFound => Severity::Warning,
            Self::Network => Severity::Warning,
        }
    }

    /// Get a short label for this category.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Config => "Config",
            Self::NotFound => "Not Found",
            Self::Network => "Network",
        }
    }

    /// Get a hint for the user on how to resolve this category of error.
    #[must_use]
    pub fn resolution_hint(&self) -> &'static str {
        match self {
            Self::Input => "Check your input and try again",
            Self::Config => "Review your configuration settings",
            Self::NotFound => "The post is no longer available; refresh the feed",
            Self::Network => "Check your network connection and retry",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Errors surfaced by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Rejected before any I/O (e.g. empty comment text)
    #[error("{message}")]
    Validation {
        /// Human-readable reason
        message: String,
    },

    /// Network or server failure; any optimistic change was reverted
    #[error("{feature} request failed: {message}")]
    Transient {
        /// Feature whose endpoint failed
        feature: Feature,
        /// Failure reported by the API client
        message: String,
    },

    /// The server no longer knows the post; any optimistic change was reverted
    #[error("post {post_id} not found while updating {feature}")]
    PostNotFound {
        /// Post the request targeted
        post_id: PostId,
        /// Feature whose endpoint answered
        feature: Feature,
    },

    /// Invalid engine configuration
    #[error("invalid configuration: {message}")]
    Config {
        /// Human-readable reason
        message: String,
    },
}

impl SyncError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a transient error for a feature
    pub fn transient(feature: Feature, message: impl Into<String>) -> Self {
        Self::Transient {
            feature,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Category used for UI treatment
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Input,
            Self::Transient { .. } => ErrorCategory::Network,
            Self::PostNotFound { .. } => ErrorCategory::NotFound,
            Self::Config { .. } => ErrorCategory::Config,
        }
    }

    /// Check if retrying the same action may succeed
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Validation { .. })
    }

    /// Get a short error code string
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION",
            Self::Transient { feature, .. } => match feature {
                Feature::Like => "LIKE_FAILED",
                Feature::Dislike => "DISLIKE_FAILED",
                Feature::Comments => "COMMENTS_FAILED",
            },
            Self::PostNotFound { .. } => "POST_NOT_FOUND",
            Self::Config { .. } => "CONFIG",
        }
    }
}

/// Result alias used throughout the engine
pub type SyncResult<T> = Result<T, SyncError>;
