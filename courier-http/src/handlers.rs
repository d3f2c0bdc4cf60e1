//! Endpoint handlers
//!
//! Each send handler validates up front, enqueues, and awaits the
//! job's terminal outcome. Nothing here talks to the transport
//! directly; the drain worker is the only sender.

use axum::{Json, extract::State, http::StatusCode};
use futures_util::future::join_all;

use crate::{
    api::{
        BulkSendResult, SendBulkEmailRequest, SendBulkEmailResponse, SendEmailRequest,
        SendEmailResponse, SendEmailWithAttachmentsRequest,
    },
    error::ApiError,
    server::ApiState,
};
use courier_dispatch::{QueueStatus, SendHandle};
use courier_transport::{Email, ValidationError};

/// `POST /send-email`
pub(crate) async fn send_email(
    State(state): State<ApiState>,
    Json(request): Json<SendEmailRequest>,
) -> Result<Json<SendEmailResponse>, ApiError> {
    relay(&state, request.into_email()).await
}

/// `POST /send-email-with-attachments`
pub(crate) async fn send_email_with_attachments(
    State(state): State<ApiState>,
    Json(request): Json<SendEmailWithAttachmentsRequest>,
) -> Result<Json<SendEmailResponse>, ApiError> {
    relay(&state, request.into_email()).await
}

async fn relay(state: &ApiState, email: Email) -> Result<Json<SendEmailResponse>, ApiError> {
    email.validate()?;
    let handle = state.queue.enqueue(email);
    let receipt = handle.resolve().await?;
    Ok(Json(SendEmailResponse {
        success: true,
        message_id: receipt.message_id,
    }))
}

/// `POST /send-bulk-email`
///
/// The whole batch is validated before anything is enqueued, so a
/// malformed request never half-sends. Per-recipient outcomes are
/// reported individually; the response is 200 even when some fail.
pub(crate) async fn send_bulk_email(
    State(state): State<ApiState>,
    Json(request): Json<SendBulkEmailRequest>,
) -> Result<Json<SendBulkEmailResponse>, ApiError> {
    if request.recipients.is_empty() {
        return Err(ValidationError::MissingRecipient.into());
    }

    let emails = request
        .recipients
        .iter()
        .map(|recipient| {
            let email = request.email_for(recipient);
            email.validate()?;
            Ok(email)
        })
        .collect::<Result<Vec<_>, ValidationError>>()?;

    // Enqueue everything first; the worker paces the actual sends.
    let handles = emails
        .into_iter()
        .map(|email| state.queue.enqueue(email))
        .collect::<Vec<_>>();

    let outcomes = join_all(handles.into_iter().map(SendHandle::resolve)).await;

    let results = request
        .recipients
        .iter()
        .zip(outcomes)
        .map(|(recipient, outcome)| match outcome {
            Ok(receipt) => BulkSendResult {
                recipient: recipient.clone(),
                success: true,
                message_id: Some(receipt.message_id),
                error: None,
            },
            Err(error) => BulkSendResult {
                recipient: recipient.clone(),
                success: false,
                message_id: None,
                error: Some(error.to_string()),
            },
        })
        .collect::<Vec<_>>();

    let success = results.iter().all(|result| result.success);
    Ok(Json(SendBulkEmailResponse { success, results }))
}

/// `GET /health`
pub(crate) async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// `GET /queue-status`
pub(crate) async fn queue_status(State(state): State<ApiState>) -> Json<QueueStatus> {
    Json(state.queue.status())
}
