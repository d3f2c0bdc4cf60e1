//! Typed error handling for transport operations.
//!
//! The dispatch queue keys its retry behaviour on the split made here:
//! - Transient failures (4xx SMTP codes, connection trouble) - requeue
//!   at the front without consuming a retry
//! - Permanent failures (5xx SMTP codes, bad addresses) - counted
//!   against the job's retry bound

use thiserror::Error;

use crate::email::ValidationError;

/// Top-level transport error.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Temporary failure, the relay signalled a retry-after-style
    /// condition (e.g. SMTP 421).
    #[error("transient failure: {0}")]
    Transient(#[from] TransientError),

    /// Permanent failure, retrying the same message will not help.
    #[error("permanent failure: {0}")]
    Permanent(#[from] PermanentError),
}

/// Failures interpreted as temporary/rate-related.
#[derive(Debug, Error)]
pub enum TransientError {
    /// Could not establish or keep a connection to the relay.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The relay returned a 4xx response.
    #[error("temporary SMTP error: {code} {message}")]
    SmtpTemporary {
        /// SMTP reply code (421, 450, ...).
        code: u16,
        /// Reply text from the relay.
        message: String,
    },

    /// The relay did not answer in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// TLS negotiation with the relay failed.
    #[error("TLS handshake failed: {0}")]
    TlsHandshakeFailed(String),
}

/// Failures that are final for the message.
#[derive(Debug, Error)]
pub enum PermanentError {
    /// A sender or recipient address did not parse as a mailbox.
    #[error("invalid mailbox {address:?}: {detail}")]
    InvalidMailbox {
        /// The offending address.
        address: String,
        /// Parser detail.
        detail: String,
    },

    /// The relay returned a 5xx response.
    #[error("message rejected: {code} {message}")]
    MessageRejected {
        /// SMTP reply code (550, 554, ...).
        code: u16,
        /// Reply text from the relay.
        message: String,
    },

    /// The relay refused our credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The message could not be assembled (bad content type, malformed
    /// attachment, MIME build failure).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl TransportError {
    /// Returns `true` if the failure is temporary and the queue should
    /// retry without penalty.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns `true` if the failure is final for this message.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    /// The SMTP reply code, when the relay answered with one.
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::Transient(TransientError::SmtpTemporary { code, .. })
            | Self::Permanent(PermanentError::MessageRejected { code, .. }) => Some(*code),
            _ => None,
        }
    }
}

impl From<ValidationError> for TransportError {
    fn from(error: ValidationError) -> Self {
        Self::Permanent(PermanentError::InvalidMessage(error.to_string()))
    }
}

/// Classify a lettre SMTP transport error.
///
/// - 4xx reply codes and network/timeout/TLS trouble are transient
/// - 5xx reply codes are permanent
/// - anything else is treated as permanent so a malformed message can
///   never wedge the queue in an uncounted retry loop
impl From<lettre::transport::smtp::Error> for TransportError {
    fn from(error: lettre::transport::smtp::Error) -> Self {
        let code = error
            .status()
            .map(|status| status.to_string().parse::<u16>().unwrap_or_default());
        let detail = error.to_string();

        if error.is_transient() {
            return Self::Transient(TransientError::SmtpTemporary {
                code: code.unwrap_or(421),
                message: detail,
            });
        }
        if error.is_permanent() {
            return Self::Permanent(PermanentError::MessageRejected {
                code: code.unwrap_or(550),
                message: detail,
            });
        }
        if error.is_timeout() {
            return Self::Transient(TransientError::Timeout(detail));
        }
        if error.is_tls() {
            return Self::Transient(TransientError::TlsHandshakeFailed(detail));
        }
        if error.is_client() {
            return Self::Permanent(PermanentError::InvalidMessage(detail));
        }

        // Connection resets, refused connections, unexpected EOF.
        Self::Transient(TransientError::ConnectionFailed(detail))
    }
}

impl From<lettre::error::Error> for TransportError {
    fn from(error: lettre::error::Error) -> Self {
        Self::Permanent(PermanentError::InvalidMessage(error.to_string()))
    }
}
