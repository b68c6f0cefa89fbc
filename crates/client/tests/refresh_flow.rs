//! Auth interceptor and refresh behavior against an in-process fake server.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use atrium_auth::wire::{LogoutRequest, RefreshRequest};
use atrium_auth::{CachedUser, Role};
use atrium_client::{ApiClient, ApiRequest, ApiResponse, ClientError, TokenStore, Transport};
use atrium_core::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshMode {
    Rotate,
    KeepRefreshToken,
    Reject,
    NetworkDown,
}

struct FakeServer {
    valid_access: Mutex<String>,
    valid_refresh: Mutex<String>,
    mode: Mutex<RefreshMode>,
    generation: AtomicUsize,
    refresh_calls: AtomicUsize,
    resource_calls: AtomicUsize,
    seen_auth: Mutex<Vec<Option<String>>>,
    revoked: Mutex<Vec<String>>,
    reject_everything: AtomicBool,
    hold_refresh: Option<Arc<Notify>>,
    latency: Duration,
}

impl FakeServer {
    fn new() -> Self {
        Self {
            valid_access: Mutex::new("tok1".into()),
            valid_refresh: Mutex::new("rt1".into()),
            mode: Mutex::new(RefreshMode::Rotate),
            generation: AtomicUsize::new(1),
            refresh_calls: AtomicUsize::new(0),
            resource_calls: AtomicUsize::new(0),
            seen_auth: Mutex::new(Vec::new()),
            revoked: Mutex::new(Vec::new()),
            reject_everything: AtomicBool::new(false),
            hold_refresh: None,
            latency: Duration::from_millis(5),
        }
    }

    /// Invalidate the current access token, as if it had expired.
    fn expire_access_token(&self) {
        *self.valid_access.lock().unwrap() = "expired".into();
    }

    fn set_mode(&self, mode: RefreshMode) {
        *self.mode.lock().unwrap() = mode;
    }

    fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn resource_calls(&self) -> usize {
        self.resource_calls.load(Ordering::SeqCst)
    }

    fn unauthorized() -> ApiResponse {
        ApiResponse::json_body(401, &json!({ "error": "unauthenticated", "message": "token rejected" }))
    }

    async fn refresh(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hold) = &self.hold_refresh {
            hold.notified().await;
        }
        tokio::time::sleep(self.latency).await;

        let mode = *self.mode.lock().unwrap();
        if mode == RefreshMode::NetworkDown {
            return Err(ClientError::Network("connection refused".into()));
        }
        if mode == RefreshMode::Reject {
            return Ok(Self::unauthorized());
        }

        let body: RefreshRequest = serde_json::from_value(request.body.unwrap_or_default()).unwrap();
        if body.refresh_token != *self.valid_refresh.lock().unwrap() {
            return Ok(Self::unauthorized());
        }

        let n = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let access = format!("tok{n}");
        *self.valid_access.lock().unwrap() = access.clone();

        if mode == RefreshMode::KeepRefreshToken {
            return Ok(ApiResponse::json_body(200, &json!({ "access_token": access })));
        }
        let refresh = format!("rt{n}");
        *self.valid_refresh.lock().unwrap() = refresh.clone();
        Ok(ApiResponse::json_body(
            200,
            &json!({ "access_token": access, "refresh_token": refresh }),
        ))
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        match request.path.as_str() {
            "/auth/refresh" => self.refresh(request).await,
            "/auth/logout" => {
                let body: LogoutRequest = serde_json::from_value(request.body.unwrap_or_default()).unwrap();
                self.revoked.lock().unwrap().push(body.refresh_token);
                Ok(ApiResponse::new(204, Vec::new()))
            }
            _ => {
                self.resource_calls.fetch_add(1, Ordering::SeqCst);
                let bearer = request.bearer_token().map(str::to_string);
                self.seen_auth.lock().unwrap().push(bearer.clone());
                tokio::time::sleep(self.latency).await;

                let valid = self.valid_access.lock().unwrap().clone();
                if self.reject_everything.load(Ordering::SeqCst) || bearer.as_deref() != Some(valid.as_str()) {
                    return Ok(Self::unauthorized());
                }
                Ok(ApiResponse::json_body(200, &json!({ "ok": true })))
            }
        }
    }
}

fn cached_user() -> CachedUser {
    CachedUser {
        id: UserId::new(),
        email: "a@example.com".into(),
        name: "A".into(),
        role: Role::Member,
        permissions: Role::Member.permissions(),
    }
}

fn logged_in(server: Arc<FakeServer>) -> ApiClient {
    let tokens = TokenStore::in_memory();
    tokens.set_access_token("tok1").unwrap();
    tokens.set_refresh_token("rt1").unwrap();
    tokens.set_cached_user(&cached_user()).unwrap();
    ApiClient::with_parts(server, tokens)
}

#[tokio::test]
async fn stored_token_is_sent_as_bearer() {
    let server = Arc::new(FakeServer::new());
    let client = logged_in(server.clone());

    let response = client.send(ApiRequest::get("/workspaces")).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(*server.seen_auth.lock().unwrap(), vec![Some("tok1".to_string())]);
    assert_eq!(server.refresh_calls(), 0);
}

#[tokio::test]
async fn without_tokens_requests_go_out_unauthenticated() {
    let server = Arc::new(FakeServer::new());
    let client = ApiClient::with_parts(server.clone(), TokenStore::in_memory());

    let err = client.send(ApiRequest::get("/workspaces")).await.unwrap_err();
    assert!(matches!(err, ClientError::AuthenticationRequired));
    assert_eq!(*server.seen_auth.lock().unwrap(), vec![None]);
    assert_eq!(server.refresh_calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_expiry_refreshes_exactly_once() {
    let server = Arc::new(FakeServer::new());
    let client = Arc::new(logged_in(server.clone()));
    server.expire_access_token();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.send(ApiRequest::get("/workspaces")).await })
        })
        .collect();

    for task in tasks {
        let response = task.await.unwrap().unwrap();
        assert_eq!(response.status, 200);
    }

    assert_eq!(server.refresh_calls(), 1);
    assert_eq!(client.tokens().access_token().as_deref(), Some("tok2"));
    assert_eq!(client.tokens().refresh_token().as_deref(), Some("rt2"));
}

#[tokio::test]
async fn unrotated_refresh_keeps_the_stored_refresh_token() {
    let server = Arc::new(FakeServer::new());
    server.set_mode(RefreshMode::KeepRefreshToken);
    let client = logged_in(server.clone());
    server.expire_access_token();

    client.send(ApiRequest::get("/workspaces")).await.unwrap();
    assert_eq!(client.tokens().access_token().as_deref(), Some("tok2"));
    assert_eq!(client.tokens().refresh_token().as_deref(), Some("rt1"));
}

#[tokio::test]
async fn rejected_refresh_clears_the_session() {
    let server = Arc::new(FakeServer::new());
    server.set_mode(RefreshMode::Reject);
    let client = logged_in(server.clone());
    server.expire_access_token();

    let err = client.send(ApiRequest::get("/workspaces")).await.unwrap_err();
    assert!(matches!(err, ClientError::AuthenticationRequired));
    assert!(!client.tokens().has_access_token());
    assert!(!client.tokens().has_refresh_token());
    assert!(client.cached_user().is_none());
    assert!(!client.can("workspaces.read"));
}

#[tokio::test]
async fn network_failure_during_refresh_keeps_tokens() {
    let server = Arc::new(FakeServer::new());
    server.set_mode(RefreshMode::NetworkDown);
    let client = logged_in(server.clone());
    server.expire_access_token();

    let err = client.send(ApiRequest::get("/workspaces")).await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));
    assert_eq!(client.tokens().access_token().as_deref(), Some("tok1"));
    assert_eq!(client.tokens().refresh_token().as_deref(), Some("rt1"));
}

#[tokio::test]
async fn second_unauthorized_does_not_loop() {
    let server = Arc::new(FakeServer::new());
    let client = logged_in(server.clone());
    server.reject_everything.store(true, Ordering::SeqCst);

    let err = client.send(ApiRequest::get("/workspaces")).await.unwrap_err();
    assert!(matches!(err, ClientError::AuthenticationRequired));
    assert_eq!(server.refresh_calls(), 1);
    assert_eq!(server.resource_calls(), 2);
    // The refresh itself succeeded, so the new tokens are kept.
    assert_eq!(client.tokens().access_token().as_deref(), Some("tok2"));
}

#[tokio::test]
async fn missing_access_token_refreshes_before_sending() {
    let server = Arc::new(FakeServer::new());
    let client = logged_in(server.clone());
    client.tokens().remove_access_token().unwrap();

    let response = client.send(ApiRequest::get("/workspaces")).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(server.refresh_calls(), 1);
    assert_eq!(*server.seen_auth.lock().unwrap(), vec![Some("tok2".to_string())]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_refresh_is_shared_with_queued_requests() {
    let hold = Arc::new(Notify::new());
    let server = Arc::new(FakeServer {
        hold_refresh: Some(hold.clone()),
        ..FakeServer::new()
    });
    server.set_mode(RefreshMode::NetworkDown);
    let client = Arc::new(logged_in(server.clone()));
    server.expire_access_token();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.send(ApiRequest::get("/workspaces")).await })
        })
        .collect();

    // Every request has been rejected before the one refresh is let through.
    while server.resource_calls() < 8 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    hold.notify_one();

    for task in tasks {
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::Network(_)), "unexpected error: {err:?}");
    }
    assert_eq!(server.refresh_calls(), 1);
    assert_eq!(server.resource_calls(), 8);
    assert_eq!(client.tokens().access_token().as_deref(), Some("tok1"));
    assert_eq!(client.tokens().refresh_token().as_deref(), Some("rt1"));
}

#[tokio::test]
async fn later_request_retries_after_a_failed_refresh() {
    let server = Arc::new(FakeServer::new());
    server.set_mode(RefreshMode::NetworkDown);
    let client = logged_in(server.clone());
    server.expire_access_token();

    let err = client.send(ApiRequest::get("/workspaces")).await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));

    server.set_mode(RefreshMode::Rotate);
    let response = client.send(ApiRequest::get("/workspaces")).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(server.refresh_calls(), 2);
    assert_eq!(client.tokens().refresh_token().as_deref(), Some("rt2"));
}

#[tokio::test]
async fn logout_cancels_waiting_requests() {
    let hold = Arc::new(Notify::new());
    let server = Arc::new(FakeServer {
        hold_refresh: Some(hold.clone()),
        ..FakeServer::new()
    });
    let client = Arc::new(logged_in(server.clone()));
    server.expire_access_token();

    let first = {
        let client = client.clone();
        tokio::spawn(async move { client.send(ApiRequest::get("/workspaces")).await })
    };
    let second = {
        let client = client.clone();
        tokio::spawn(async move { client.send(ApiRequest::get("/workspaces")).await })
    };

    // Let both requests fail and queue on the refresh gate.
    while server.refresh_calls() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    let logout = {
        let client = client.clone();
        tokio::spawn(async move { client.logout().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    hold.notify_one();

    assert!(matches!(first.await.unwrap(), Err(ClientError::SessionClosed)));
    assert!(matches!(second.await.unwrap(), Err(ClientError::SessionClosed)));
    logout.await.unwrap().unwrap();

    assert_eq!(server.refresh_calls(), 1);
    // The token minted by the in-flight rotation is the one revoked.
    assert_eq!(*server.revoked.lock().unwrap(), vec!["rt2".to_string()]);
    assert!(!client.tokens().has_access_token());
    assert!(!client.tokens().has_refresh_token());
    assert!(client.cached_user().is_none());
}

#[tokio::test]
async fn logout_revokes_the_stored_refresh_token() {
    let server = Arc::new(FakeServer::new());
    let client = logged_in(server.clone());

    client.logout().await.unwrap();
    assert_eq!(*server.revoked.lock().unwrap(), vec!["rt1".to_string()]);
    assert!(!client.tokens().has_refresh_token());
}

#[tokio::test]
async fn shutdown_during_refresh_keeps_rotated_tokens() {
    let hold = Arc::new(Notify::new());
    let server = Arc::new(FakeServer {
        hold_refresh: Some(hold.clone()),
        ..FakeServer::new()
    });
    let client = Arc::new(logged_in(server.clone()));
    server.expire_access_token();

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.send(ApiRequest::get("/workspaces")).await })
    };
    while server.refresh_calls() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    client.shutdown();
    hold.notify_one();

    assert!(matches!(pending.await.unwrap(), Err(ClientError::SessionClosed)));
    let server_refresh = server.valid_refresh.lock().unwrap().clone();
    assert_eq!(server_refresh, "rt2");
    assert_eq!(client.tokens().refresh_token(), Some(server_refresh));
    assert_eq!(client.tokens().access_token().as_deref(), Some("tok2"));
    assert!(client.cached_user().is_some());
    assert!(server.revoked.lock().unwrap().is_empty());
}

#[tokio::test]
async fn anonymous_requests_skip_the_interceptor() {
    let server = Arc::new(FakeServer::new());
    let client = logged_in(server.clone());
    server.expire_access_token();

    let response = client
        .send(ApiRequest::get("/health").anonymous())
        .await
        .unwrap();
    assert_eq!(response.status, 401);
    assert_eq!(*server.seen_auth.lock().unwrap(), vec![None]);
    assert_eq!(server.refresh_calls(), 0);
}

#[tokio::test]
async fn client_side_permission_gate_uses_cached_user() {
    let server = Arc::new(FakeServer::new());
    let client = logged_in(server);

    assert!(client.can("workspaces.update"));
    assert!(!client.can("workspaces.purge"));
    assert!(!client.can("workspaces.launch_rockets"));
}
