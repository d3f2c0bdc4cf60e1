//! Message model for outgoing mail

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::Deserialize;
use thiserror::Error;

/// A structured outgoing message, as accepted by the API and handed to
/// the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    /// Recipient addresses (at least one).
    pub to: Vec<String>,
    /// Sender address. `None` falls back to the transport's configured
    /// default sender.
    pub from: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text: Option<String>,
    /// HTML body.
    pub html: Option<String>,
    /// File attachments.
    pub attachments: Vec<Attachment>,
}

impl Email {
    /// Create a message with a single recipient and no body.
    #[must_use]
    pub fn new(to: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            to: vec![to.into()],
            from: None,
            subject: subject.into(),
            text: None,
            html: None,
            attachments: Vec::new(),
        }
    }

    /// Validate the parts of the message that the HTTP layer can reject
    /// up front: recipients present, at least one body, attachments
    /// decodable.
    ///
    /// Address syntax is left to the transport, which reports bad
    /// mailboxes as permanent failures.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.to.is_empty() {
            return Err(ValidationError::MissingRecipient);
        }
        if self.to.iter().any(|addr| addr.trim().is_empty()) {
            return Err(ValidationError::EmptyRecipient);
        }
        if self.subject.trim().is_empty() {
            return Err(ValidationError::MissingSubject);
        }
        if self.text.is_none() && self.html.is_none() {
            return Err(ValidationError::MissingBody);
        }
        for attachment in &self.attachments {
            attachment.validate()?;
        }
        Ok(())
    }
}

/// How attachment content is encoded on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    /// Content is the literal UTF-8 text of the attachment.
    #[default]
    Utf8,
    /// Content is standard base64.
    Base64,
}

/// A file attachment as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// File name presented to the recipient.
    pub filename: String,
    /// Attachment content, encoded per `encoding`.
    pub content: String,
    /// Content encoding, defaults to UTF-8 text.
    #[serde(default)]
    pub encoding: ContentEncoding,
    /// MIME content type, e.g. `application/pdf`.
    pub content_type: String,
}

impl Attachment {
    /// Decode the content into raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAttachment`] if base64 content
    /// does not decode.
    pub fn decoded_content(&self) -> Result<Vec<u8>, ValidationError> {
        match self.encoding {
            ContentEncoding::Utf8 => Ok(self.content.clone().into_bytes()),
            ContentEncoding::Base64 => BASE64.decode(self.content.as_bytes()).map_err(|e| {
                ValidationError::InvalidAttachment {
                    filename: self.filename.clone(),
                    detail: format!("invalid base64 content: {e}"),
                }
            }),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.filename.trim().is_empty() {
            return Err(ValidationError::InvalidAttachment {
                filename: self.filename.clone(),
                detail: "missing filename".to_string(),
            });
        }
        if self.content_type.trim().is_empty() {
            return Err(ValidationError::InvalidAttachment {
                filename: self.filename.clone(),
                detail: "missing contentType".to_string(),
            });
        }
        // Decode eagerly so a bad payload is a 400, not a queue rejection.
        self.decoded_content().map(drop)
    }
}

/// Request-level problems with a message, reported to the caller as
/// 400 responses before anything is enqueued.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// No recipients were supplied.
    #[error("missing required field: to")]
    MissingRecipient,

    /// A recipient address was empty.
    #[error("recipient address must not be empty")]
    EmptyRecipient,

    /// No subject was supplied.
    #[error("missing required field: subject")]
    MissingSubject,

    /// Neither a text nor an HTML body was supplied.
    #[error("missing required field: text or html")]
    MissingBody,

    /// An attachment is malformed.
    #[error("invalid attachment {filename:?}: {detail}")]
    InvalidAttachment {
        /// Attachment file name, for the error message.
        filename: String,
        /// What was wrong with it.
        detail: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn text_email() -> Email {
        Email {
            text: Some("hello".to_string()),
            ..Email::new("user@example.com", "greetings")
        }
    }

    #[test]
    fn valid_text_email_passes() {
        assert!(text_email().validate().is_ok());
    }

    #[test]
    fn missing_recipient_rejected() {
        let mut email = text_email();
        email.to.clear();
        assert_eq!(email.validate(), Err(ValidationError::MissingRecipient));
    }

    #[test]
    fn missing_body_rejected() {
        let email = Email::new("user@example.com", "no body");
        assert_eq!(email.validate(), Err(ValidationError::MissingBody));
    }

    #[test]
    fn html_only_body_is_enough() {
        let mut email = Email::new("user@example.com", "html");
        email.html = Some("<p>hi</p>".to_string());
        assert!(email.validate().is_ok());
    }

    #[test]
    fn base64_attachment_decodes() {
        let attachment = Attachment {
            filename: "note.txt".to_string(),
            content: BASE64.encode("attached text"),
            encoding: ContentEncoding::Base64,
            content_type: "text/plain".to_string(),
        };
        assert_eq!(attachment.decoded_content().unwrap(), b"attached text");
    }

    #[test]
    fn bad_base64_attachment_rejected() {
        let mut email = text_email();
        email.attachments.push(Attachment {
            filename: "note.txt".to_string(),
            content: "not base64!!!".to_string(),
            encoding: ContentEncoding::Base64,
            content_type: "text/plain".to_string(),
        });
        assert!(matches!(
            email.validate(),
            Err(ValidationError::InvalidAttachment { .. })
        ));
    }

    #[test]
    fn attachment_payload_deserializes_camel_case() {
        let attachment: Attachment = serde_json::from_str(
            r#"{"filename":"a.pdf","content":"aGk=","encoding":"base64","contentType":"application/pdf"}"#,
        )
        .unwrap();
        assert_eq!(attachment.encoding, ContentEncoding::Base64);
        assert_eq!(attachment.content_type, "application/pdf");
    }
}
