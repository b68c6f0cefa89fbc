//! Middleware pipeline in front of a [`Transport`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ClientError;
use crate::session::AuthSession;
use crate::transport::{ApiRequest, ApiResponse, Transport};

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, request: ApiRequest, next: Next<'_>) -> Result<ApiResponse, ClientError>;
}

/// The remainder of the pipeline. Cheap to copy, so a middleware may run it more than once.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    transport: &'a dyn Transport,
    rest: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub async fn run(self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        match self.rest.split_first() {
            Some((middleware, rest)) => {
                middleware
                    .handle(
                        request,
                        Next {
                            transport: self.transport,
                            rest,
                        },
                    )
                    .await
            }
            None => self.transport.send(request).await,
        }
    }
}

/// Middlewares applied in insertion order around a transport.
#[derive(Clone)]
pub struct Pipeline {
    transport: Arc<dyn Transport>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            middlewares: Vec::new(),
        }
    }

    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        Next {
            transport: self.transport.as_ref(),
            rest: &self.middlewares,
        }
        .run(request)
        .await
    }
}

/// Attaches the stored bearer token and recovers from an expired one.
///
/// - stored access token: sent as `Authorization: Bearer <token>`
/// - no access token but a refresh token: refresh first
/// - `401`: refresh (single-flight) and resend exactly once
/// - `401` again after a refresh: [`ClientError::AuthenticationRequired`]
pub struct AuthInterceptor {
    session: Arc<AuthSession>,
}

impl AuthInterceptor {
    pub fn new(session: Arc<AuthSession>) -> Self {
        Self { session }
    }
}

fn authorized(request: &ApiRequest, token: Option<&str>) -> ApiRequest {
    match token {
        Some(token) => request.clone().with_bearer(token),
        None => request.clone(),
    }
}

#[async_trait]
impl Middleware for AuthInterceptor {
    async fn handle(&self, request: ApiRequest, next: Next<'_>) -> Result<ApiResponse, ClientError> {
        if request.anonymous {
            return next.run(request).await;
        }

        let ticket = self.session.ticket();
        let tokens = self.session.tokens();

        let mut sent = tokens.access_token();
        if sent.is_none() && tokens.has_refresh_token() {
            sent = Some(self.session.refresh_after(None, ticket).await?);
        }

        let response = next.run(authorized(&request, sent.as_deref())).await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        tracing::debug!(path = %request.path, "request unauthorized; refreshing access token");
        let fresh = self.session.refresh_after(sent.as_deref(), ticket).await?;

        let retried = next.run(authorized(&request, Some(&fresh))).await?;
        if retried.is_unauthorized() {
            tracing::warn!(path = %request.path, "request still unauthorized after refresh");
            return Err(ClientError::AuthenticationRequired);
        }
        Ok(retried)
    }
}
