//! Error types for the classroom client.

use std::time::Duration;
use thiserror::Error;

/// Additional context from remote errors for debugging.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// HTTP status code from the remote.
    pub http_status: Option<u16>,
    /// Remote error status (e.g. "PERMISSION_DENIED", "invalid_grant").
    pub remote_code: Option<String>,
    /// Request ID from the remote (x-request-id header).
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.remote_code = Some(code.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

/// Errors from a single remote classroom call.
///
/// The client never retries; every variant reaches the caller as-is.
#[derive(Debug, Error)]
pub enum ClassroomError {
    /// The remote rejected the credential (expired, revoked, invalid grant).
    #[error("unauthorized: {message}")]
    Unauthorized {
        message: String,
        context: Option<ErrorContext>,
    },

    /// Credential is valid but lacks access to the resource.
    #[error("forbidden: {message}")]
    Forbidden {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("not found: {message}")]
    NotFound {
        message: String,
        context: Option<ErrorContext>,
    },

    /// Remote quota hit (HTTP 429).
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        retry_after: Duration,
        context: Option<ErrorContext>,
    },

    /// Any other non-success response.
    #[error("remote error (HTTP {status}): {message}")]
    Remote {
        status: u16,
        message: String,
        context: Option<ErrorContext>,
    },

    /// Response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Listing kept returning continuation tokens past the page cap.
    #[error("pagination did not terminate after {pages} pages")]
    Pagination { pages: usize },

    /// HTTP/network error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error (bad credential format, client build failure).
    #[error("configuration error: {0}")]
    Config(String),

    /// The caller's cancel flag was raised before or during the call.
    #[error("cancelled")]
    Cancelled,
}

impl ClassroomError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            context: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            context: None,
        }
    }

    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
            context: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Map a non-success HTTP status to an error variant.
    pub fn from_status(status: u16, message: impl Into<String>, context: ErrorContext) -> Self {
        let message = message.into();
        let invalid_grant = context.remote_code.as_deref() == Some("invalid_grant");
        match status {
            401 => Self::Unauthorized {
                message,
                context: Some(context),
            },
            400 if invalid_grant => Self::Unauthorized {
                message,
                context: Some(context),
            },
            403 => Self::Forbidden {
                message,
                context: Some(context),
            },
            404 => Self::NotFound {
                message,
                context: Some(context),
            },
            429 => Self::RateLimited {
                retry_after: Duration::from_secs(60),
                context: Some(context),
            },
            _ => Self::Remote {
                status,
                message,
                context: Some(context),
            },
        }
    }

    /// Whether the caller must re-authorize instead of retrying with the same credential.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Get a short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::Remote { .. } => "remote_error",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Pagination { .. } => "pagination",
            Self::Http(_) => "http_error",
            Self::Config(_) => "config_error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Get the error context if available.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Unauthorized { context, .. } => context.as_ref(),
            Self::Forbidden { context, .. } => context.as_ref(),
            Self::NotFound { context, .. } => context.as_ref(),
            Self::RateLimited { context, .. } => context.as_ref(),
            Self::Remote { context, .. } => context.as_ref(),
            Self::InvalidResponse(_)
            | Self::Pagination { .. }
            | Self::Http(_)
            | Self::Config(_)
            | Self::Cancelled => None,
        }
    }

    /// Get the request ID if available.
    pub fn request_id(&self) -> Option<&str> {
        self.context().and_then(|c| c.request_id.as_deref())
    }
}
