//! Minimal server with a public login route and a protected area.
//!
//! ```bash
//! JWT_SECRET=dev-secret JWT_TTL_SECS=30 cargo run --example server
//! curl -s -XPOST localhost:3000/login -d 'user=alice'
//! curl -i -H "Authorization: Bearer <token>" localhost:3000/me
//! ```
//!
//! Once the 30 second lifetime passes, `/me` answers with a fresh token in
//! the `Token` header.

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::State,
    routing::{get, post},
};
use axum_jwt_refresh::{AuthError, AuthToken, ClaimValue, CustomClaims, JwtConfig, JwtLayer, TokenService};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Deserialize)]
struct Login {
    user: String,
}

#[derive(Serialize)]
struct Issued {
    token: String,
    expires_at: Option<i64>,
}

async fn login(
    State(service): State<Arc<TokenService>>,
    Form(login): Form<Login>,
) -> Result<Json<Issued>, AuthError> {
    let claims = CustomClaims::from([("user".to_string(), ClaimValue::from(login.user.as_str()))]);
    let session = format!("{}-{}", login.user, std::process::id());
    let token = service.create_token(Some(&session), &claims)?;
    tracing::info!(user = %login.user, jti = %session, "issued token");

    Ok(Json(Issued {
        expires_at: token.claims().exp,
        token: token.into_string(),
    }))
}

async fn me(AuthToken(token): AuthToken) -> Json<serde_json::Value> {
    Json(serde_json::to_value(token.claims()).unwrap_or_default())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,axum_jwt_refresh=debug")),
        )
        .init();

    let config = match JwtConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid JWT configuration");
            std::process::exit(1);
        }
    };
    let service = match TokenService::new(config) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!(error = %e, "cannot load JWT keys");
            std::process::exit(1);
        }
    };

    let app = Router::new()
        .route("/me", get(me))
        .layer(JwtLayer::new(service.clone()))
        .route("/login", post(login))
        .with_state(service);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
        .await
        .expect("bind 0.0.0.0:3000");
    tracing::info!("listening on http://0.0.0.0:3000");
    axum::serve(listener, app).await.expect("server error");
}
