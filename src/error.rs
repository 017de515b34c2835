//! Application error taxonomy.
//!
//! Every operation in the integration returns `AppResult<T>`; errors are
//! propagated as values up to the HTTP boundary, which maps them to the
//! response or redirect shape the caller expects.

use thiserror::Error;

/// Result type used across the integration
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AppError {
    /// Transaction currency not in the gateway account's supported set.
    /// Raised before any network call is made.
    #[error("currency '{currency}' is not supported by this gateway")]
    UnsupportedCurrency { currency: String },

    /// Bad input: non-positive amount, missing phone number, duplicate
    /// reference id. No log entry is written for these.
    #[error("{message}")]
    Validation { message: String },

    /// Network or HTTP-level failure talking to the gateway
    #[error("gateway transport failure: {message}")]
    GatewayTransport { message: String },

    /// Well-formed gateway response indicating business failure. The
    /// gateway's message is preserved verbatim for support diagnosis.
    #[error("gateway rejected the request: {message}")]
    GatewayRejection { message: String },

    /// Failure after the gateway accepted or committed funds: the commit
    /// was refused, or the ERP-side payment record could not be written.
    /// Operators reconcile manually via the try-again operation.
    #[error("reconciliation failed: {message}")]
    Reconciliation { message: String },

    /// Document store collaborator failure
    #[error("document store error: {message}")]
    Store { message: String },

    /// Startup or environment configuration problem
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::GatewayTransport {
            message: message.into(),
        }
    }

    pub fn rejection(message: impl Into<String>) -> Self {
        Self::GatewayRejection {
            message: message.into(),
        }
    }

    pub fn reconciliation(message: impl Into<String>) -> Self {
        Self::Reconciliation {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Validation-class errors are rejected before any side effect, so no
    /// transaction log entry exists for them.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::UnsupportedCurrency { .. }
        )
    }
}
