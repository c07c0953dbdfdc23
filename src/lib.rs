//! # axum-jwt-refresh
//!
//! Signed JWT sessions for [Axum](https://docs.rs/axum): issue tokens,
//! verify them on every request, and transparently re-issue expired ones
//! while they are still inside a refresh window.
//!
//! Signing and verification are done by
//! [`jsonwebtoken`](https://docs.rs/jsonwebtoken) (HS256 with a shared
//! secret, or RS256 with a PEM key pair).  This crate owns the policy
//! around it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::{routing::{get, post}, Json, Router};
//! use axum_jwt_refresh::{AuthToken, ClaimValue, CustomClaims, JwtConfig, JwtLayer, TokenService};
//!
//! async fn me(AuthToken(token): AuthToken) -> String {
//!     format!("session {:?}", token.jti())
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     // JWT_SECRET (or JWT_PRIVATE_KEY_PATH) must be set.
//!     let service = Arc::new(TokenService::new(JwtConfig::from_env().unwrap()).unwrap());
//!
//!     let login = {
//!         let service = service.clone();
//!         move || async move {
//!             let claims = CustomClaims::from([("role".to_string(), ClaimValue::from("admin"))]);
//!             let token = service.create_token(Some("session-1"), &claims).unwrap();
//!             Json(token.into_string())
//!         }
//!     };
//!
//!     let app = Router::new()
//!         .route("/me", get(me))
//!         .layer(JwtLayer::new(service))
//!         .route("/login", post(login));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! ## Request lifecycle
//!
//! 1. The token is read from `Authorization: Bearer <token>`, else from the
//!    `token` query or form parameter (names are configurable).
//! 2. It is checked for structure, then `iss`/`sub`/`aud`, then signature,
//!    then expiry.
//! 3. A valid token is passed on unchanged.  An expired token whose `iat`
//!    is within the refresh window is replaced by a new one carrying the
//!    same `jti` and the custom claims listed in its `customClaims` claim.
//! 4. The current token is returned in the `Token` response header and/or
//!    the `token` cookie.
//! 5. Failures answer `{"success": false, "error": "..."}` with 403 (no
//!    token) or 401 to clients that want JSON, and redirect everyone else.
//!
//! ## Environment variables (`JwtConfig::from_env`)
//!
//! This crate does **not** load `.env` files.  See
//! [`JwtConfig::from_env`] for the full table; the essentials are
//! `JWT_SECRET` or `JWT_PRIVATE_KEY_PATH`, `JWT_TTL_SECS` and
//! `JWT_REFRESH_TTL_SECS`.

pub mod claims;
pub mod codec;
pub mod config;
pub mod error;
pub mod middleware;
pub mod request;
pub mod token;

pub use claims::{ClaimValue, Claims, CustomClaims};
pub use config::{JwtConfig, SigningKey, TokenTransport};
pub use error::AuthError;
pub use middleware::{AuthToken, JwtLayer, JwtMiddleware, TOKEN_COOKIE, TOKEN_HEADER};
pub use request::{FormRequest, TokenRequest};
pub use token::{Token, TokenService, VerificationOutcome};
