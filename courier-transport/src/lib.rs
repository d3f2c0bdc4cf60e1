//! Mail transport abstraction for the Courier relay API
//!
//! This crate defines the message model accepted by the API, the
//! [`MailTransport`] trait consumed by the dispatch queue, and a
//! lettre-backed SMTP implementation for relaying through Gmail or a
//! self-hosted Postfix instance.
//!
//! The dispatch queue only ever sees the trait and the
//! [`TransportError`] classification; whether a failure is transient
//! (retry without penalty) or permanent (counted against the job) is
//! decided here.

mod email;
mod error;
mod smtp;

pub use email::{Attachment, ContentEncoding, Email, ValidationError};
pub use error::{PermanentError, TransientError, TransportError};
pub use smtp::{SmtpConfig, SmtpMailer, SmtpMode};

use async_trait::async_trait;

/// Confirmation returned by a transport once a message has been accepted
/// by the upstream relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// The transport-assigned message identifier, as stamped into the
    /// `Message-ID` header of the outgoing mail.
    pub message_id: String,
}

/// A capability that delivers a structured message to an SMTP relay.
///
/// Implementations either confirm delivery with a [`Receipt`] or fail
/// with a [`TransportError`] carrying the transient/permanent
/// classification the dispatch queue keys its retry logic on.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver a single message.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the relay rejects the message or
    /// cannot be reached.
    async fn send(&self, email: &Email) -> Result<Receipt, TransportError>;

    /// Check that the relay is reachable and accepts our credentials.
    ///
    /// Used once at startup; a failure is logged, not fatal.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] describing why the relay is
    /// unreachable.
    async fn verify(&self) -> Result<(), TransportError>;
}
