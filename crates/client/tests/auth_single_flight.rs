//! Credential-expiry behavior against an in-process server: the coordinator
//! must collapse N concurrent expirations into one refresh call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;

use axiomflow_client::{
    AuthSession, ClientConfig, ClientError, CredentialStore, MemoryCredentialStore, RequestClient,
    SessionEvent,
};
use axiomflow_types::{Credential, Job};

const FRESH_TOKEN: &str = "fresh-access";

struct TestState {
    refresh_calls: AtomicUsize,
    job_calls: AtomicUsize,
    refresh_fails: bool,
}

impl TestState {
    fn new(refresh_fails: bool) -> Arc<Self> {
        Arc::new(Self {
            refresh_calls: AtomicUsize::new(0),
            job_calls: AtomicUsize::new(0),
            refresh_fails,
        })
    }
}

async fn refresh_handler(
    State(state): State<Arc<TestState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    // Widen the window so concurrent callers genuinely overlap the flight.
    tokio::time::sleep(Duration::from_millis(100)).await;

    if state.refresh_fails {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "detail": "refresh token expired" })),
        );
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "token": FRESH_TOKEN,
            "refresh_token": "rotated-refresh",
            "user": { "id": "u1", "email": "u@example.com" },
        })),
    )
}

async fn login_handler(
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let ok = body["email"] == "u@example.com" && body["password"] == "hunter22";
    if !ok {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "detail": "invalid email or password" })),
        );
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "token": "login-access",
            "refresh_token": "login-refresh",
            "user": { "id": "u1", "email": "u@example.com", "name": "U", "provider": "email" },
        })),
    )
}

async fn job_handler(
    State(state): State<Arc<TestState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    state.job_calls.fetch_add(1, Ordering::SeqCst);

    let expected = format!("Bearer {FRESH_TOKEN}");
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "detail": "token expired" })),
        );
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": "j1", "document_id": "d1", "state": "running", "progress": 0.5
        })),
    )
}

async fn start_server(state: Arc<TestState>) -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/v1/auth/refresh", post(refresh_handler))
        .route("/v1/auth/login", post(login_handler))
        .route("/v1/jobs/{id}", get(job_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), handle)
}

fn client_with_stale_credential(api_base: &str) -> (Arc<RequestClient>, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::with_credential(Credential::new(
        "stale-access",
        "valid-refresh",
    )));
    let config = ClientConfig::with_bases(api_base, "ws://127.0.0.1:1");
    let client = Arc::new(RequestClient::new(
        &config,
        Arc::clone(&store) as Arc<dyn CredentialStore>,
    ));
    (client, store)
}

#[tokio::test]
async fn concurrent_expiry_triggers_exactly_one_refresh() {
    let state = TestState::new(false);
    let (base, server) = start_server(Arc::clone(&state)).await;
    let (client, store) = client_with_stale_credential(&base);

    // Three independent requests hit the expired credential near-simultaneously.
    let mut handles = Vec::new();
    for _ in 0..3 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            client.get_json::<Job>("/v1/jobs/j1").await
        }));
    }
    for handle in handles {
        let job = handle.await.unwrap().expect("request should succeed after refresh");
        assert_eq!(job.id, "j1");
    }

    // Exactly one refresh flight; every request retried exactly once.
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(state.job_calls.load(Ordering::SeqCst), 6);

    // All waiters resolved with the same refreshed credential, now stored.
    let credential = store.get().unwrap();
    assert_eq!(credential.access_token, FRESH_TOKEN);
    assert_eq!(credential.refresh_token, "rotated-refresh");

    server.abort();
}

#[tokio::test]
async fn refreshed_credential_is_reused_without_another_flight() {
    let state = TestState::new(false);
    let (base, server) = start_server(Arc::clone(&state)).await;
    let (client, _store) = client_with_stale_credential(&base);

    client.get_json::<Job>("/v1/jobs/j1").await.unwrap();
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);

    // Follow-up request carries the fresh token straight away.
    client.get_json::<Job>("/v1/jobs/j1").await.unwrap();
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(state.job_calls.load(Ordering::SeqCst), 3);

    server.abort();
}

#[tokio::test]
async fn login_seeds_store_with_durability_choice() {
    let state = TestState::new(false);
    let (base, server) = start_server(state).await;
    let store = Arc::new(MemoryCredentialStore::new());
    let session = AuthSession::new(
        reqwest::Client::new(),
        &base,
        Arc::clone(&store) as Arc<dyn CredentialStore>,
    );

    let user = session
        .login("u@example.com", "hunter22", true)
        .await
        .unwrap();
    assert_eq!(user.email, "u@example.com");

    let credential = store.get().unwrap();
    assert_eq!(credential.access_token, "login-access");
    assert_eq!(credential.refresh_token, "login-refresh");
    assert!(store.durable(), "remember=true must be recorded");

    session.logout();
    assert!(store.get().is_none());

    server.abort();
}

#[tokio::test]
async fn rejected_login_leaves_store_untouched() {
    let state = TestState::new(false);
    let (base, server) = start_server(state).await;
    let store = Arc::new(MemoryCredentialStore::new());
    let session = AuthSession::new(
        reqwest::Client::new(),
        &base,
        Arc::clone(&store) as Arc<dyn CredentialStore>,
    );

    let err = session
        .login("u@example.com", "wrong", false)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::PermissionDenied { .. }));
    assert!(store.get().is_none());

    server.abort();
}

#[tokio::test]
async fn refresh_failure_terminates_session_exactly_once() {
    let state = TestState::new(true);
    let (base, server) = start_server(Arc::clone(&state)).await;
    let (client, store) = client_with_stale_credential(&base);

    let mut events = client.coordinator().subscribe_session_events();

    let mut handles = Vec::new();
    for _ in 0..3 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            client.get_json::<Job>("/v1/jobs/j1").await
        }));
    }
    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(
            matches!(err, ClientError::PermissionDenied { .. }),
            "expected PermissionDenied, got {err:?}"
        );
    }

    // One refresh attempt, one terminated signal, store wiped.
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
    assert!(store.get().is_none());
    assert!(matches!(
        events.try_recv().unwrap(),
        SessionEvent::Terminated { .. }
    ));
    assert!(events.try_recv().is_err(), "only one terminated event expected");

    server.abort();
}
