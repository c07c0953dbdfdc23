use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{FromRequestParts, Request};
use axum::response::{IntoResponse, Redirect, Response};
use futures::future::BoxFuture;
use http::header::{HeaderName, HeaderValue, SET_COOKIE};
use http::request::Parts;
use tower::{Layer, Service};

use crate::config::JwtConfig;
use crate::error::AuthError;
use crate::request::{self, FormRequest, TokenRequest};
use crate::token::{Token, TokenService, VerificationOutcome};

/// Response header carrying the current token.
pub const TOKEN_HEADER: HeaderName = HeaderName::from_static("token");

/// Cookie carrying the current token.
pub const TOKEN_COOKIE: &str = "token";

/// Largest form body buffered while looking for a token parameter.
const FORM_BODY_LIMIT: usize = 64 * 1024;

/// Tower layer authenticating every request with a [`TokenService`].
///
/// Valid tokens pass through; expired tokens inside the refresh window are
/// replaced.  Either way the current token is placed in the request
/// extensions (see [`AuthToken`]) and attached to the response.  Everything
/// else is rejected with a JSON error or a redirect, depending on what the
/// client accepts.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use axum::{routing::get, Router};
/// use axum_jwt_refresh::{AuthToken, JwtConfig, JwtLayer, TokenService};
///
/// async fn me(AuthToken(token): AuthToken) -> String {
///     format!("jti = {:?}", token.jti())
/// }
///
/// # fn example() -> Result<(), axum_jwt_refresh::AuthError> {
/// let service = Arc::new(TokenService::new(JwtConfig::from_env()?)?);
/// let app: Router = Router::new()
///     .route("/me", get(me))
///     .layer(JwtLayer::new(service));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct JwtLayer {
    service: Arc<TokenService>,
}

impl JwtLayer {
    pub fn new(service: Arc<TokenService>) -> Self {
        Self { service }
    }

    /// Build the service from `config`, failing on bad key material.
    pub fn from_config(config: JwtConfig) -> Result<Self, AuthError> {
        Ok(Self::new(Arc::new(TokenService::new(config)?)))
    }
}

impl<S> Layer<S> for JwtLayer {
    type Service = JwtMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        JwtMiddleware {
            inner,
            service: self.service.clone(),
        }
    }
}

/// The service produced by [`JwtLayer`].
#[derive(Debug, Clone)]
pub struct JwtMiddleware<S> {
    inner: S,
    service: Arc<TokenService>,
}

impl<S> Service<Request> for JwtMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let service = self.service.clone();
        // Use the instance that was polled ready; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            let wants_json = parts.wants_json();

            let (extracted, body) = extract(&service, &parts, body).await;
            let decision = match extracted {
                Ok(raw) => decide(&service, &raw),
                Err(e) => Decision::Rejected(e),
            };

            let token = match decision {
                Decision::Accepted(token) => {
                    tracing::debug!(jti = ?token.jti(), "token accepted");
                    token
                }
                Decision::Refreshed(token) => {
                    tracing::debug!(jti = ?token.jti(), "expired token refreshed");
                    token
                }
                Decision::Rejected(e) => {
                    if let AuthError::ConfigError(_) = e {
                        tracing::error!(error = %e, "token refresh failed");
                    } else {
                        tracing::debug!(
                            error = %e,
                            wants_json,
                            path = %parts.uri.path(),
                            "request rejected"
                        );
                    }
                    return Ok(reject(service.config(), e, wants_json));
                }
            };

            parts.extensions.insert(token.clone());
            let mut response = inner.call(Request::from_parts(parts, body)).await?;
            attach(service.config(), &token, &mut response);
            Ok(response)
        })
    }
}

enum Decision {
    Accepted(Token),
    Refreshed(Token),
    Rejected(AuthError),
}

fn decide(service: &TokenService, raw: &str) -> Decision {
    match service.verify(raw) {
        VerificationOutcome::Valid(token) => Decision::Accepted(token),
        VerificationOutcome::Expired(token) if service.is_refreshable(&token) => {
            match service.refresh(&token) {
                Ok(fresh) => Decision::Refreshed(fresh),
                Err(e) => Decision::Rejected(e),
            }
        }
        VerificationOutcome::Expired(_) => Decision::Rejected(AuthError::TokenExpired),
        VerificationOutcome::Missing => Decision::Rejected(AuthError::TokenNotFound),
        VerificationOutcome::MalformedStructure | VerificationOutcome::ClaimsMismatch => {
            Decision::Rejected(AuthError::InvalidToken)
        }
        VerificationOutcome::BadSignature => Decision::Rejected(AuthError::InvalidTokenSignature),
    }
}

/// Look for the token in the head first, then in a url-encoded form body.
///
/// The body is buffered only in the second case and handed back intact.
async fn extract(
    service: &TokenService,
    parts: &Parts,
    body: Body,
) -> (Result<String, AuthError>, Body) {
    match service.extract_token_string(parts) {
        Err(AuthError::TokenNotFound) if request::is_form(parts) => {
            match axum::body::to_bytes(body, FORM_BODY_LIMIT).await {
                Ok(bytes) => {
                    let found = service.extract_token_string(&FormRequest {
                        parts,
                        form: &bytes,
                    });
                    (found, Body::from(bytes))
                }
                Err(e) => {
                    tracing::debug!(error = %e, "form body unreadable");
                    (Err(AuthError::TokenNotFound), Body::empty())
                }
            }
        }
        other => (other, body),
    }
}

fn reject(config: &JwtConfig, error: AuthError, wants_json: bool) -> Response {
    if wants_json {
        error.into_response()
    } else {
        Redirect::to(&config.redirect_path).into_response()
    }
}

fn attach(config: &JwtConfig, token: &Token, response: &mut Response) {
    let headers = response.headers_mut();

    if config.transport.uses_header() {
        match HeaderValue::from_str(token.as_str()) {
            Ok(value) => {
                headers.insert(TOKEN_HEADER, value);
            }
            Err(e) => tracing::warn!(error = %e, "token is not a valid header value"),
        }
    }

    if config.transport.uses_cookie() {
        let secure = if config.secure_cookies { "; Secure" } else { "" };
        let cookie = format!(
            "{TOKEN_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{secure}",
            config.refresh_window_secs
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(error = %e, "token is not a valid cookie value"),
        }
    }
}

/// Axum extractor for the token the [`JwtLayer`] accepted or refreshed.
///
/// Rejects with [`AuthError::TokenNotFound`] on routes the layer does not
/// cover.
///
/// ```rust
/// use axum_jwt_refresh::{AuthToken, ClaimValue};
///
/// async fn handler(AuthToken(token): AuthToken) -> String {
///     match token.claims().get("role") {
///         Some(ClaimValue::String(role)) => format!("role: {role}"),
///         _ => "no role".into(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthToken(pub Token);

impl<S> FromRequestParts<S> for AuthToken
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Token>()
            .cloned()
            .map(AuthToken)
            .ok_or(AuthError::TokenNotFound)
    }
}
