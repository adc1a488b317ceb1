//! Remote draft backend integration tests
//!
//! A small axum server on an ephemeral port plays the token endpoint and
//! the drafts API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use mail_merge_service::backends::RemoteDraftBackend;
use mail_merge_service::config::CredentialConfig;
use mail_merge_service::dispatch::{DeliveryBackend, DeliveryError, DispatchOrchestrator};
use mail_merge_service::template::{MergeTemplate, RenderedMessage};

#[derive(Default)]
struct MockRemote {
    tokens_issued: AtomicUsize,
    /// Reject this many draft posts with 401 before accepting
    unauthorized_remaining: AtomicUsize,
    /// Respond 500 to every draft post
    failing: std::sync::atomic::AtomicBool,
    drafts: Mutex<Vec<Value>>,
    auth_headers: Mutex<Vec<String>>,
}

#[derive(Deserialize)]
struct TokenForm {
    grant_type: String,
    client_id: String,
    client_secret: String,
}

async fn issue_token(
    State(mock): State<Arc<MockRemote>>,
    Form(form): Form<TokenForm>,
) -> Result<Json<Value>, StatusCode> {
    if form.grant_type != "client_credentials" || form.client_id != "merge" || form.client_secret != "s3cret" {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let n = mock.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
    Ok(Json(json!({
        "access_token": format!("token-{}", n),
        "token_type": "Bearer",
        "expires_in": 3600
    })))
}

async fn create_draft(
    State(mock): State<Arc<MockRemote>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> StatusCode {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    mock.auth_headers.lock().await.push(auth);

    if mock.failing.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    let rejected = mock
        .unauthorized_remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if rejected {
        return StatusCode::UNAUTHORIZED;
    }

    mock.drafts.lock().await.push(payload);
    StatusCode::CREATED
}

async fn spawn_mock(mock: Arc<MockRemote>) -> String {
    let app = Router::new()
        .route("/oauth/token", post(issue_token))
        .route("/drafts", post(create_draft))
        .with_state(mock);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn backend_for(base: &str) -> RemoteDraftBackend {
    RemoteDraftBackend::new(
        format!("{}/drafts", base),
        CredentialConfig::ClientCredentials {
            token_url: format!("{}/oauth/token", base),
            client_id: "merge".to_string(),
            client_secret: "s3cret".to_string(),
            scope: None,
        },
        Duration::from_secs(5),
    )
    .unwrap()
}

fn message(to: &str) -> RenderedMessage {
    RenderedMessage {
        to: to.to_string(),
        subject: "Quarterly update".to_string(),
        body: "<p>Numbers are up</p>".to_string(),
    }
}

#[tokio::test]
async fn test_posts_draft_with_bearer_token() {
    let mock = Arc::new(MockRemote::default());
    let base = spawn_mock(mock.clone()).await;
    let backend = backend_for(&base);

    backend.attempt(&message("Ada <ada@example.com>")).await.unwrap();
    backend.attempt(&message("alan@example.com")).await.unwrap();

    // Token is cached between calls
    assert_eq!(mock.tokens_issued.load(Ordering::SeqCst), 1);
    assert_eq!(*mock.auth_headers.lock().await, vec!["Bearer token-1", "Bearer token-1"]);

    let drafts = mock.drafts.lock().await;
    assert_eq!(drafts.len(), 2);
    assert_eq!(drafts[0]["to"][0]["email"], "ada@example.com");
    assert_eq!(drafts[0]["to"][0]["name"], "Ada");
    assert_eq!(drafts[0]["subject"], "Quarterly update");
    assert_eq!(drafts[0]["body_type"], "html");
}

#[tokio::test]
async fn test_unauthorized_invalidates_token() {
    let mock = Arc::new(MockRemote::default());
    mock.unauthorized_remaining.store(1, Ordering::SeqCst);
    let base = spawn_mock(mock.clone()).await;
    let backend = backend_for(&base);

    let first = backend.attempt(&message("ada@example.com")).await;
    assert!(matches!(first, Err(DeliveryError::Credential(_))));

    backend.attempt(&message("ada@example.com")).await.unwrap();
    assert_eq!(mock.tokens_issued.load(Ordering::SeqCst), 2);
    assert_eq!(
        *mock.auth_headers.lock().await,
        vec!["Bearer token-1", "Bearer token-2"]
    );
}

#[tokio::test]
async fn test_bad_client_secret_is_credential_error() {
    let mock = Arc::new(MockRemote::default());
    let base = spawn_mock(mock.clone()).await;

    let backend = RemoteDraftBackend::new(
        format!("{}/drafts", base),
        CredentialConfig::ClientCredentials {
            token_url: format!("{}/oauth/token", base),
            client_id: "merge".to_string(),
            client_secret: "wrong".to_string(),
            scope: Some("drafts.write".to_string()),
        },
        Duration::from_secs(5),
    )
    .unwrap();

    let result = backend.attempt(&message("ada@example.com")).await;
    assert!(matches!(result, Err(DeliveryError::Credential(_))));
    assert!(mock.drafts.lock().await.is_empty());
}

#[tokio::test]
async fn test_server_error_demotes_remote_in_run() {
    let mock = Arc::new(MockRemote::default());
    mock.failing.store(true, Ordering::SeqCst);
    let base = spawn_mock(mock.clone()).await;

    let remote: Arc<dyn DeliveryBackend> = Arc::new(backend_for(&base));
    let memory = Arc::new(mail_merge_service::backends::MemoryBackend::new());

    let template = MergeTemplate::new("{{Email}}", "Hi", "<p>Hello</p>");
    let recipients: Vec<_> = ["a@example.com", "b@example.com"]
        .iter()
        .map(|email| json!({"Email": email}).as_object().cloned().unwrap())
        .collect();

    let report = DispatchOrchestrator::new(vec![remote, memory.clone() as Arc<dyn DeliveryBackend>])
        .run(&template, &recipients)
        .await;

    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].message.contains("500"));
    assert_eq!(report.demoted_backends, vec!["remote"]);
    assert_eq!(memory.delivered().await.len(), 1);
}
