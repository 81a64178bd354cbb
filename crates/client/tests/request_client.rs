//! Request classification against a mock HTTP server.

use std::sync::Arc;

use reqwest::Method;

use axiomflow_client::{
    ClientConfig, ClientError, CredentialStore, MemoryCredentialStore, RequestClient,
};
use axiomflow_types::{Credential, Job, JobState};

fn client_for(server: &mockito::ServerGuard, credential: Option<Credential>) -> RequestClient {
    let store = match credential {
        Some(c) => Arc::new(MemoryCredentialStore::with_credential(c)),
        None => Arc::new(MemoryCredentialStore::new()),
    };
    let config = ClientConfig::with_bases(server.url(), "ws://127.0.0.1:1");
    RequestClient::new(&config, store as Arc<dyn CredentialStore>)
}

#[tokio::test]
async fn forbidden_is_permission_denied_and_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/glossary")
        .with_status(403)
        .with_body("account not verified")
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, Some(Credential::new("acc", "ref")));
    let err = client
        .execute(Method::GET, "/v1/glossary", None)
        .await
        .unwrap_err();

    match err {
        ClientError::PermissionDenied { reason } => {
            assert!(reason.contains("not verified"), "reason: {reason}")
        }
        other => panic!("expected PermissionDenied, got {other:?}"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn server_error_carries_status_and_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/jobs/j1")
        .with_status(500)
        .with_body("boom")
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, Some(Credential::new("acc", "ref")));
    let err = client
        .execute(Method::GET, "/v1/jobs/j1", None)
        .await
        .unwrap_err();

    match err {
        ClientError::Server { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected Server, got {other:?}"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn public_request_skips_the_auth_dance() {
    let mut server = mockito::Server::new_async().await;
    // 401 on a credential-less request must NOT trigger a refresh.
    let endpoint = server
        .mock("GET", "/v1/public/health")
        .with_status(401)
        .with_body("nope")
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/v1/auth/refresh")
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server, None);
    let err = client
        .execute(Method::GET, "/v1/public/health", None)
        .await
        .unwrap_err();

    assert!(
        matches!(err, ClientError::Server { status: 401, .. }),
        "got {err:?}"
    );
    endpoint.assert_async().await;
    refresh.assert_async().await;
}

#[tokio::test]
async fn get_json_deserializes_typed_payloads() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/jobs/j1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"j1","document_id":"d1","state":"succeeded","progress":1.0}"#)
        .create_async()
        .await;

    let client = client_for(&server, Some(Credential::new("acc", "ref")));
    let job: Job = client.get_json("/v1/jobs/j1").await.unwrap();
    assert_eq!(job.state, JobState::Succeeded);
    assert_eq!(job.progress, 1.0);
    mock.assert_async().await;
}

#[tokio::test]
async fn post_json_sends_body_and_bearer() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/jobs/j1/pause")
        .match_header("authorization", "Bearer acc")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"j1","document_id":"d1","state":"paused"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server, Some(Credential::new("acc", "ref")));
    let job: Job = client.post_json("/v1/jobs/j1/pause", None).await.unwrap();
    assert_eq!(job.state, JobState::Paused);
    mock.assert_async().await;
}
