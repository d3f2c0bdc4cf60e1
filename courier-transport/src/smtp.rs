//! Lettre-backed SMTP relay transport

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment as MimeAttachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{authentication::Credentials, extension::ClientId},
};
use serde::Deserialize;
use ulid::Ulid;

use crate::{
    Email, MailTransport, Receipt, TransportError,
    error::{PermanentError, TransientError},
};

/// How the connection to the relay is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpMode {
    /// Implicit TLS from the first byte (Gmail on port 465).
    Relay,
    /// Plaintext upgraded via STARTTLS (Gmail/Postfix on port 587).
    #[default]
    StartTls,
    /// No TLS at all, for a Postfix instance on localhost.
    Plain,
}

/// Configuration for the SMTP relay connection.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// Relay host name, e.g. `smtp.gmail.com` or `127.0.0.1`.
    #[serde(default = "default_host")]
    pub host: String,

    /// Relay port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connection security mode.
    #[serde(default)]
    pub mode: SmtpMode,

    /// SMTP AUTH username. Credentials are only presented when both
    /// username and password are set.
    #[serde(default)]
    pub username: Option<String>,

    /// SMTP AUTH password (an app password for Gmail).
    #[serde(default)]
    pub password: Option<String>,

    /// Default sender address used when a request omits `from`.
    #[serde(default = "default_from")]
    pub from: String,

    /// EHLO hostname presented to the relay. Defaults to the local
    /// hostname.
    #[serde(default)]
    pub hello_name: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

const fn default_port() -> u16 {
    587
}

fn default_from() -> String {
    "courier@localhost".to_string()
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            mode: SmtpMode::default(),
            username: None,
            password: None,
            from: default_from(),
            hello_name: None,
        }
    }
}

/// SMTP implementation of [`MailTransport`].
///
/// Wraps a pooled async lettre transport. Every outgoing message is
/// stamped with a generated `Message-ID`, which is what the API reports
/// back to callers.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    default_from: String,
    /// Domain part of generated Message-IDs.
    id_domain: String,
}

impl SmtpMailer {
    /// Build a mailer from configuration. No connection is made here;
    /// the pool connects lazily on first send.
    ///
    /// # Errors
    ///
    /// Returns an error if TLS parameters for the relay host cannot be
    /// constructed.
    pub fn new(config: &SmtpConfig) -> Result<Self, TransportError> {
        let mut builder = match config.mode {
            SmtpMode::Relay => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?,
            SmtpMode::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            }
            SmtpMode::Plain => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            }
        }
        .port(config.port);

        if let Some(name) = &config.hello_name {
            builder = builder.hello_name(ClientId::Domain(name.clone()));
        }

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let id_domain = config
            .hello_name
            .clone()
            .or_else(|| config.from.split_once('@').map(|(_, d)| d.to_string()))
            .unwrap_or_else(|| "localhost".to_string());

        Ok(Self {
            transport: builder.build(),
            default_from: config.from.clone(),
            id_domain,
        })
    }

    /// Assemble the MIME message and its generated Message-ID.
    fn build_message(&self, email: &Email) -> Result<(Message, String), TransportError> {
        let from = email.from.as_deref().unwrap_or(&self.default_from);
        let message_id = format!("<{}@{}>", Ulid::new(), self.id_domain);

        let mut builder = Message::builder()
            .from(parse_mailbox(from)?)
            .subject(email.subject.clone())
            .message_id(Some(message_id.clone()));
        for to in &email.to {
            builder = builder.to(parse_mailbox(to)?);
        }

        let body = match (&email.text, &email.html) {
            (Some(text), Some(html)) => {
                BodyPart::Multi(MultiPart::alternative_plain_html(text.clone(), html.clone()))
            }
            (Some(text), None) => BodyPart::Single(SinglePart::plain(text.clone())),
            (None, Some(html)) => BodyPart::Single(SinglePart::html(html.clone())),
            (None, None) => {
                return Err(PermanentError::InvalidMessage(
                    "message has neither a text nor an html body".to_string(),
                )
                .into());
            }
        };

        let message = if email.attachments.is_empty() {
            match body {
                BodyPart::Single(part) => builder.singlepart(part)?,
                BodyPart::Multi(part) => builder.multipart(part)?,
            }
        } else {
            let mut mixed = match body {
                BodyPart::Single(part) => MultiPart::mixed().singlepart(part),
                BodyPart::Multi(part) => MultiPart::mixed().multipart(part),
            };
            for attachment in &email.attachments {
                let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                    PermanentError::InvalidMessage(format!(
                        "attachment {:?} has invalid content type {:?}: {e}",
                        attachment.filename, attachment.content_type
                    ))
                })?;
                mixed = mixed.singlepart(
                    MimeAttachment::new(attachment.filename.clone())
                        .body(attachment.decoded_content()?, content_type),
                );
            }
            builder.multipart(mixed)?
        };

        Ok((message, message_id))
    }
}

enum BodyPart {
    Single(SinglePart),
    Multi(MultiPart),
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<Receipt, TransportError> {
        let (message, message_id) = self.build_message(email)?;

        let response = self.transport.send(message).await?;
        tracing::debug!(
            message_id = %message_id,
            code = %response.code(),
            "relay accepted message"
        );

        Ok(Receipt { message_id })
    }

    async fn verify(&self) -> Result<(), TransportError> {
        let reachable = self.transport.test_connection().await?;
        if reachable {
            Ok(())
        } else {
            Err(TransientError::ConnectionFailed(
                "relay did not answer EHLO".to_string(),
            )
            .into())
        }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| {
            PermanentError::InvalidMailbox {
                address: address.to_string(),
                detail: e.to_string(),
            }
            .into()
        })
}
