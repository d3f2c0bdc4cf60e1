//! Endpoint tests driven through the router with `oneshot`, no socket.

use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode, header},
};
use courier_dispatch::{DispatchConfig, DispatchQueue, Signal};
use courier_http::{ApiState, HttpConfig, IpAllowlist, router};
use courier_transport::{
    Email, MailTransport, PermanentError, Receipt, TransientError, TransportError,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tower::ServiceExt;

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Accept,
    Reject,
    Transient,
}

/// Transport that replays a script of outcomes, then accepts.
#[derive(Debug, Default)]
struct MockTransport {
    script: Mutex<VecDeque<Outcome>>,
    sent_to: Mutex<Vec<String>>,
}

impl MockTransport {
    fn scripted(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            sent_to: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    async fn send(&self, email: &Email) -> Result<Receipt, TransportError> {
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Accept);
        match outcome {
            Outcome::Accept => {
                let to = email.to.first().cloned().unwrap_or_default();
                self.sent_to.lock().unwrap().push(to.clone());
                Ok(Receipt {
                    message_id: format!("<accepted-{to}>"),
                })
            }
            Outcome::Reject => Err(TransportError::Permanent(PermanentError::MessageRejected {
                code: 550,
                message: "mailbox unknown".to_string(),
            })),
            Outcome::Transient => Err(TransportError::Transient(TransientError::SmtpTemporary {
                code: 421,
                message: "try later".to_string(),
            })),
        }
    }

    async fn verify(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

struct Fixture {
    app: Router,
    queue: DispatchQueue,
    _shutdown: broadcast::Sender<Signal>,
}

fn fixture_with(transport: MockTransport, allowed_ips: &[&str]) -> Fixture {
    let config = DispatchConfig {
        rate_limit_per_minute: 60_000, // 1ms apart, tests should not wait on the gate
        retry_delay_ms: 10,
        // One counted failure rejects; keeps scripted outcomes aligned
        // with requests even when retried jobs interleave.
        max_retries: 1,
        send_timeout_ms: 1_000,
    };
    let (queue, worker) = DispatchQueue::new(config, Arc::new(transport));
    let (shutdown, rx) = broadcast::channel(1);
    tokio::spawn(worker.serve(rx));

    let http = HttpConfig {
        allowed_ips: allowed_ips.iter().map(ToString::to_string).collect(),
        ..HttpConfig::default()
    };
    let allowlist = IpAllowlist::new(&http.allowed_ips).expect("valid allow-list");
    let app = router(
        ApiState {
            queue: queue.clone(),
        },
        allowlist,
        &http,
    );

    Fixture {
        app,
        queue,
        _shutdown: shutdown,
    }
}

fn fixture(transport: MockTransport) -> Fixture {
    fixture_with(transport, &[])
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 45000))))
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 45000))))
        .body(Body::empty())
        .expect("request builds")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test(start_paused = true)]
async fn send_email_relays_and_returns_the_message_id() {
    let fixture = fixture(MockTransport::default());

    let response = fixture
        .app
        .oneshot(post_json(
            "/send-email",
            &json!({"to": "user@example.com", "subject": "hi", "text": "hello"}),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["messageId"], json!("<accepted-user@example.com>"));
}

#[tokio::test(start_paused = true)]
async fn missing_required_fields_are_bad_requests() {
    let cases = [
        json!({"subject": "hi", "text": "x"}),
        json!({"to": "user@example.com", "text": "x"}),
        json!({"to": "user@example.com", "subject": "hi"}),
    ];

    for body in cases {
        let fixture = fixture(MockTransport::default());
        let response = fixture
            .app
            .oneshot(post_json("/send-email", &body))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        let error = json_body(response).await;
        assert_eq!(error["error"], json!("validation"));
    }
}

#[tokio::test(start_paused = true)]
async fn permanent_rejections_surface_as_internal_errors() {
    let fixture = fixture(MockTransport::scripted([Outcome::Reject]));

    let response = fixture
        .app
        .oneshot(post_json(
            "/send-email",
            &json!({"to": "user@example.com", "subject": "hi", "text": "hello"}),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], json!("dispatch"));
    assert!(
        body["detail"].as_str().is_some_and(|s| s.contains("550")),
        "detail should carry the SMTP code: {body}"
    );
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_before_responding() {
    let fixture = fixture(MockTransport::scripted([
        Outcome::Transient,
        Outcome::Accept,
    ]));

    let response = fixture
        .app
        .oneshot(post_json(
            "/send-email",
            &json!({"to": "user@example.com", "subject": "hi", "text": "hello"}),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn bulk_send_reports_per_recipient_outcomes() {
    let fixture = fixture(MockTransport::scripted([
        Outcome::Accept,
        Outcome::Reject,
        Outcome::Accept,
    ]));

    let response = fixture
        .app
        .oneshot(post_json(
            "/send-bulk-email",
            &json!({
                "recipients": ["a@example.com", "b@example.com", "c@example.com"],
                "subject": "hi",
                "text": "hello"
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(false));
    let results = body["results"].as_array().expect("results array");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["success"], json!(true));
    assert_eq!(results[0]["recipient"], json!("a@example.com"));
    assert_eq!(results[1]["success"], json!(false));
    assert!(results[1]["error"].is_string());
    assert_eq!(results[2]["success"], json!(true));
}

#[tokio::test(start_paused = true)]
async fn bulk_send_with_no_recipients_is_a_bad_request() {
    let fixture = fixture(MockTransport::default());

    let response = fixture
        .app
        .oneshot(post_json(
            "/send-bulk-email",
            &json!({"recipients": [], "subject": "hi", "text": "x"}),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn attachments_are_accepted_and_bad_base64_is_rejected() {
    let fixture = fixture(MockTransport::default());
    let response = fixture
        .app
        .oneshot(post_json(
            "/send-email-with-attachments",
            &json!({
                "to": "user@example.com",
                "subject": "report",
                "text": "see attached",
                "attachments": [{
                    "filename": "data.bin",
                    "content": "aGVsbG8=",
                    "encoding": "base64",
                    "contentType": "application/octet-stream"
                }]
            }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);

    let fixture = self::fixture(MockTransport::default());
    let response = fixture
        .app
        .oneshot(post_json(
            "/send-email-with-attachments",
            &json!({
                "to": "user@example.com",
                "subject": "report",
                "text": "see attached",
                "attachments": [{
                    "filename": "data.bin",
                    "content": "not base64!!!",
                    "encoding": "base64",
                    "contentType": "application/octet-stream"
                }]
            }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn health_is_always_ok() {
    let fixture = fixture(MockTransport::default());
    let response = fixture
        .app
        .oneshot(get("/health"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn queue_status_reports_the_idle_shape() {
    let fixture = fixture(MockTransport::default());
    assert!(fixture.queue.is_empty());

    let response = fixture
        .app
        .oneshot(get("/queue-status"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["queueLength"], json!(0));
    assert_eq!(body["isProcessing"], json!(false));
    assert_eq!(body["lastEmailTime"], json!(0));
    assert!(body["rateLimitMs"].is_u64());
}

#[tokio::test(start_paused = true)]
async fn allow_list_blocks_unlisted_clients() {
    let fixture = fixture_with(MockTransport::default(), &["10.1.2.3"]);

    let response = fixture
        .app
        .oneshot(get("/health"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test(start_paused = true)]
async fn allow_list_admits_listed_clients() {
    let fixture = fixture_with(MockTransport::default(), &["10.1.2.3"]);

    let request = Request::get("/health")
        .extension(ConnectInfo(SocketAddr::from(([10, 1, 2, 3], 9999))))
        .body(Body::empty())
        .expect("request builds");
    let response = fixture
        .app
        .oneshot(request)
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
}
