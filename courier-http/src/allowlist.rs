//! IP allow-listing
//!
//! The only authentication the relay carries: an optional list of
//! client addresses. Empty means open, the expected setup when the
//! relay sits behind a reverse proxy that does its own access control.

use std::{
    net::{AddrParseError, IpAddr, SocketAddr},
    sync::Arc,
};

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::error::ErrorBody;

/// A misconfigured allow-list entry.
#[derive(Debug, Error)]
#[error("invalid allow-list entry {entry:?}: {source}")]
pub struct AllowlistError {
    /// The entry that did not parse.
    pub entry: String,
    source: AddrParseError,
}

/// Set of client IPs permitted to call the API.
#[derive(Debug, Clone, Default)]
pub struct IpAllowlist {
    allowed: Arc<Vec<IpAddr>>,
}

impl IpAllowlist {
    /// Parse the configured entries.
    ///
    /// # Errors
    ///
    /// Returns an [`AllowlistError`] naming the first entry that is not
    /// a valid IP address.
    pub fn new(entries: &[String]) -> Result<Self, AllowlistError> {
        let allowed = entries
            .iter()
            .map(|entry| {
                entry.trim().parse().map_err(|source| AllowlistError {
                    entry: entry.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            allowed: Arc::new(allowed),
        })
    }

    fn is_open(&self) -> bool {
        self.allowed.is_empty()
    }

    fn permits(&self, ip: IpAddr) -> bool {
        self.allowed.contains(&ip)
    }
}

/// Middleware rejecting requests from addresses outside the list.
pub(crate) async fn enforce(
    State(allowlist): State<IpAllowlist>,
    request: Request,
    next: Next,
) -> Response {
    if allowlist.is_open() {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());

    match peer {
        Some(ip) if allowlist.permits(ip) => next.run(request).await,
        Some(ip) => {
            tracing::warn!(client = %ip, "request rejected by IP allow-list");
            forbidden("client address not allowed")
        }
        None => {
            tracing::warn!("request rejected, peer address unknown");
            forbidden("peer address unknown")
        }
    }
}

fn forbidden(detail: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorBody {
            error: "forbidden",
            detail: detail.to_string(),
        }),
    )
        .into_response()
}
