//! Request and response bodies
//!
//! Fields that the original API requires are still `Option` at the
//! serde level: a missing field must come back as a 400 validation
//! error with a useful message, not a deserialization rejection.

use courier_transport::{Attachment, Email};
use serde::{Deserialize, Serialize};

/// Body of `POST /send-email`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    /// Recipient address.
    #[serde(default)]
    pub to: Option<String>,
    /// Subject line.
    #[serde(default)]
    pub subject: Option<String>,
    /// Plain-text body.
    #[serde(default)]
    pub text: Option<String>,
    /// HTML body.
    #[serde(default)]
    pub html: Option<String>,
    /// Sender override; defaults to the configured sender.
    #[serde(default)]
    pub from: Option<String>,
}

impl SendEmailRequest {
    pub(crate) fn into_email(self) -> Email {
        Email {
            to: self.to.into_iter().collect(),
            from: self.from,
            subject: self.subject.unwrap_or_default(),
            text: self.text,
            html: self.html,
            attachments: Vec::new(),
        }
    }
}

/// Body of `POST /send-email-with-attachments`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailWithAttachmentsRequest {
    /// The message itself.
    #[serde(flatten)]
    pub message: SendEmailRequest,
    /// Attachments to include.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl SendEmailWithAttachmentsRequest {
    pub(crate) fn into_email(self) -> Email {
        let mut email = self.message.into_email();
        email.attachments = self.attachments;
        email
    }
}

/// Body of `POST /send-bulk-email`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBulkEmailRequest {
    /// One message is dispatched per recipient.
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
}

impl SendBulkEmailRequest {
    /// The message for one recipient of the bulk request.
    pub(crate) fn email_for(&self, recipient: &str) -> Email {
        Email {
            to: vec![recipient.to_string()],
            from: self.from.clone(),
            subject: self.subject.clone().unwrap_or_default(),
            text: self.text.clone(),
            html: self.html.clone(),
            attachments: Vec::new(),
        }
    }
}

/// Successful response of the single-message send endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailResponse {
    /// Always `true`; failures use the error body instead.
    pub success: bool,
    /// The `Message-ID` stamped into the relayed message.
    pub message_id: String,
}

/// Per-recipient outcome of a bulk send.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSendResult {
    /// The recipient this result is for.
    pub recipient: String,
    /// Whether the relay accepted the message.
    pub success: bool,
    /// Message id on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Failure detail on rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of `POST /send-bulk-email`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBulkEmailResponse {
    /// `true` only when every recipient succeeded.
    pub success: bool,
    /// One entry per recipient, in request order.
    pub results: Vec<BulkSendResult>,
}
