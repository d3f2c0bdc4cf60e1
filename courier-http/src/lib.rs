//! HTTP API surface for the Courier relay
//!
//! Exposes the send endpoints, a health probe, and a queue status view
//! over axum. Every send — including bulk — goes through the one
//! rate-limited dispatch queue, so the configured send rate holds
//! across all endpoints.
//!
//! # Endpoints
//!
//! - **`POST /send-email`** - relay a single message
//! - **`POST /send-bulk-email`** - relay one message per recipient
//! - **`POST /send-email-with-attachments`** - as send-email, with attachments
//! - **`GET /health`** - static liveness probe
//! - **`GET /queue-status`** - pending count, busy flag, last send time

mod allowlist;
mod api;
mod config;
mod error;
mod handlers;
mod server;

pub use allowlist::{AllowlistError, IpAllowlist};
pub use api::{
    BulkSendResult, SendBulkEmailRequest, SendBulkEmailResponse, SendEmailRequest,
    SendEmailResponse, SendEmailWithAttachmentsRequest,
};
pub use config::HttpConfig;
pub use error::ApiError;
pub use server::{ApiServer, ApiServerError, ApiState, router};
