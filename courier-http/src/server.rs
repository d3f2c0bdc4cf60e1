//! Router assembly and the API server lifecycle

use std::{net::SocketAddr, time::Duration};

use axum::{
    Router, middleware,
    routing::{get, post},
};
use courier_dispatch::{DispatchQueue, Signal};
use thiserror::Error;
use tokio::{net::TcpListener, sync::broadcast};
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer,
};

use crate::{
    allowlist::{self, IpAllowlist},
    config::HttpConfig,
    handlers,
};

/// State shared by the handlers.
#[derive(Debug, Clone)]
pub struct ApiState {
    /// The one dispatch queue every send goes through.
    pub queue: DispatchQueue,
}

/// Failures bringing the API server up or down.
#[derive(Debug, Error)]
pub enum ApiServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Build the API router.
///
/// Standalone so tests can drive it with `tower::ServiceExt::oneshot`
/// without a listening socket.
#[must_use]
pub fn router(state: ApiState, allowlist: IpAllowlist, config: &HttpConfig) -> Router {
    Router::new()
        .route("/send-email", post(handlers::send_email))
        .route("/send-bulk-email", post(handlers::send_bulk_email))
        .route(
            "/send-email-with-attachments",
            post(handlers::send_email_with_attachments),
        )
        .route("/health", get(handlers::health))
        .route("/queue-status", get(handlers::queue_status))
        .layer(middleware::from_fn_with_state(
            allowlist,
            allowlist::enforce,
        ))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The bound API server, ready to serve.
#[derive(Debug)]
pub struct ApiServer {
    listener: TcpListener,
    router: Router,
}

impl ApiServer {
    /// Bind the configured listen address.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Bind`] when the address is taken or
    /// not bindable.
    pub async fn bind(
        config: &HttpConfig,
        state: ApiState,
        allowlist: IpAllowlist,
    ) -> Result<Self, ApiServerError> {
        let listener = TcpListener::bind(&config.listen_address)
            .await
            .map_err(|source| ApiServerError::Bind {
                address: config.listen_address.clone(),
                source,
            })?;
        let router = router(state, allowlist, config);
        Ok(Self { listener, router })
    }

    /// The address actually bound, useful when the port was 0.
    ///
    /// # Errors
    ///
    /// Propagates the socket error if the local address is unavailable.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until the shutdown signal fires, then finish in-flight
    /// requests and return.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Serve`] if the accept loop fails.
    pub async fn serve(
        self,
        mut shutdown: broadcast::Receiver<Signal>,
    ) -> Result<(), ApiServerError> {
        if let Ok(address) = self.local_addr() {
            tracing::info!(%address, "API server listening");
        }

        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("API server shutting down");
        })
        .await?;

        Ok(())
    }
}
