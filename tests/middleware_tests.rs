//! End-to-end tests for the JWT layer.
//!
//! Each test builds a small router behind `JwtLayer` and drives it with
//! `oneshot`, checking the accept / refresh / reject paths.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
    routing::{get, post},
};
use axum_jwt_refresh::{
    AuthToken, ClaimValue, CustomClaims, JwtConfig, JwtLayer, TOKEN_HEADER, TokenService,
    TokenTransport, VerificationOutcome,
};
use tower::ServiceExt;

const ONE_HOUR: u64 = 3600;
const FIFTEEN_DAYS: u64 = 1_296_000;

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn config() -> JwtConfig {
    JwtConfig::new("test-secret-for-middleware")
        .expiry_secs(Some(ONE_HOUR))
        .refresh_window_secs(FIFTEEN_DAYS)
        .redirect_path("/login")
}

fn service(config: JwtConfig) -> Arc<TokenService> {
    Arc::new(TokenService::new(config).expect("valid config"))
}

/// Echo the session id and role of the token the layer handed over.
async fn whoami(AuthToken(token): AuthToken) -> String {
    let role = match token.claims().get("role") {
        Some(ClaimValue::String(role)) => role.as_str(),
        _ => "-",
    };
    format!("{}:{role}", token.jti().unwrap_or("-"))
}

/// Echo the request body, to prove it survives form extraction.
async fn echo(_: AuthToken, body: String) -> String {
    body
}

fn app(service: Arc<TokenService>) -> Router {
    Router::new()
        .route("/me", get(whoami))
        .route("/echo", post(echo))
        .layer(JwtLayer::new(service))
}

fn admin() -> CustomClaims {
    CustomClaims::from([("role".to_string(), ClaimValue::from("admin"))])
}

fn get_with(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_string(res: Response) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(res: Response) -> serde_json::Value {
    serde_json::from_str(&body_string(res).await).unwrap()
}

#[tokio::test]
async fn valid_token_passes_and_is_echoed() {
    let svc = service(config());
    let token = svc.create_token(Some("abc"), &admin()).unwrap();
    let bearer = format!("Bearer {token}");

    let res = app(svc)
        .oneshot(get_with("/me", &[("authorization", bearer.as_str())]))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[TOKEN_HEADER], token.as_str());
    assert_eq!(body_string(res).await, "abc:admin");
}

#[tokio::test]
async fn expired_token_within_window_is_refreshed() {
    let svc = service(config());
    let old = svc
        .create_token_at(now() - 4000, Some("abc"), &admin())
        .unwrap();
    let bearer = format!("Bearer {old}");

    let res = app(svc.clone())
        .oneshot(get_with("/me", &[("authorization", bearer.as_str())]))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let fresh = res.headers()[TOKEN_HEADER].to_str().unwrap().to_owned();
    assert_ne!(fresh, old.as_str());
    // The handler already sees the replacement.
    assert_eq!(body_string(res).await, "abc:admin");

    let VerificationOutcome::Valid(fresh) = svc.verify(&fresh) else {
        panic!("refreshed token should verify");
    };
    assert_eq!(fresh.jti(), Some("abc"));
    assert_eq!(fresh.claims().get("role"), Some(&ClaimValue::from("admin")));
    assert!(fresh.claims().iat >= now() - 5);
}

#[tokio::test]
async fn expired_past_window_is_rejected_as_json() {
    let svc = service(config());
    let old = svc
        .create_token_at(now() - 1_300_000, Some("abc"), &CustomClaims::new())
        .unwrap();
    let bearer = format!("Bearer {old}");

    let res = app(svc)
        .oneshot(get_with(
            "/me",
            &[("authorization", bearer.as_str()), ("accept", "application/json")],
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().get(TOKEN_HEADER).is_none());
    assert_eq!(
        body_json(res).await,
        serde_json::json!({ "success": false, "error": "Token has expired." })
    );
}

#[tokio::test]
async fn expired_past_window_redirects_browsers() {
    let svc = service(config());
    let old = svc
        .create_token_at(now() - 1_300_000, None, &CustomClaims::new())
        .unwrap();
    let bearer = format!("Bearer {old}");

    let res = app(svc)
        .oneshot(get_with(
            "/me",
            &[("authorization", bearer.as_str()), ("accept", "text/html")],
        ))
        .await
        .unwrap();

    assert!(res.status().is_redirection());
    assert_eq!(res.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn missing_token_is_forbidden_for_json_clients() {
    let res = app(service(config()))
        .oneshot(get_with("/me", &[("accept", "application/json")]))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(res).await,
        serde_json::json!({ "success": false, "error": "Token not found." })
    );
}

#[tokio::test]
async fn missing_token_redirects_otherwise() {
    let res = app(service(config()))
        .oneshot(get_with("/me", &[]))
        .await
        .unwrap();

    assert!(res.status().is_redirection());
    assert_eq!(res.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn ajax_requests_get_json() {
    let res = app(service(config()))
        .oneshot(get_with("/me", &[("x-requested-with", "XMLHttpRequest")]))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn foreign_signature_is_rejected() {
    let foreign = service(JwtConfig::new("another-secret"))
        .create_token(Some("abc"), &CustomClaims::new())
        .unwrap();
    let bearer = format!("Bearer {foreign}");

    let res = app(service(config()))
        .oneshot(get_with(
            "/me",
            &[("authorization", bearer.as_str()), ("accept", "application/json")],
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(res).await["error"], "Invalid token sign.");
}

#[tokio::test]
async fn malformed_and_mismatched_tokens_are_invalid() {
    let svc = service(config().issuer("https://auth.example.com"));
    let other_issuer = service(config().issuer("https://elsewhere.example.com"))
        .create_token(None, &CustomClaims::new())
        .unwrap();

    for raw in ["not-a-jwt".to_string(), other_issuer.into_string()] {
        let bearer = format!("Bearer {raw}");
        let res = app(svc.clone())
            .oneshot(get_with(
                "/me",
                &[("authorization", bearer.as_str()), ("accept", "application/json")],
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{raw}");
        assert_eq!(body_json(res).await["error"], "Invalid token.");
    }
}

#[tokio::test]
async fn non_bearer_header_does_not_fall_back() {
    let svc = service(config());
    let token = svc.create_token(None, &CustomClaims::new()).unwrap();
    let uri = format!("/me?token={token}");

    let res = app(svc)
        .oneshot(get_with(
            &uri,
            &[
                ("authorization", "Basic Zm9vOmJhcg=="),
                ("accept", "application/json"),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn query_parameter_fallback() {
    let svc = service(config());
    let token = svc.create_token(Some("q"), &CustomClaims::new()).unwrap();

    let res = app(svc)
        .oneshot(get_with(&format!("/me?token={token}"), &[]))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_string(res).await, "q:-");
}

#[tokio::test]
async fn form_body_fallback_keeps_body() {
    let svc = service(config());
    let token = svc.create_token(Some("f"), &CustomClaims::new()).unwrap();
    let form = format!("name=alice&token={token}");

    let req = Request::builder()
        .method("POST")
        .uri("/echo")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.clone()))
        .unwrap();

    let res = app(svc).oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[TOKEN_HEADER], token.as_str());
    assert_eq!(body_string(res).await, form);
}

#[tokio::test]
async fn cookie_transport_round_trip() {
    let svc = service(config().transport(TokenTransport::Cookie));
    let token = svc.create_token(Some("c"), &CustomClaims::new()).unwrap();
    let bearer = format!("Bearer {token}");

    let res = app(svc.clone())
        .oneshot(get_with("/me", &[("authorization", bearer.as_str())]))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get(TOKEN_HEADER).is_none());

    let set_cookie = res.headers()[header::SET_COOKIE].to_str().unwrap().to_owned();
    assert!(set_cookie.starts_with(&format!("token={token};")));
    assert!(set_cookie.contains("HttpOnly"));

    // A browser sends the cookie back without any header.
    let cookie = set_cookie.split(';').next().unwrap().to_owned();
    let res = app(svc)
        .oneshot(get_with("/me", &[("cookie", cookie.as_str())]))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_string(res).await, "c:-");
}

#[tokio::test]
async fn rsa_keys_from_files() {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
    let svc = service(
        JwtConfig::rsa_files(
            format!("{dir}/private.pem"),
            Some(format!("{dir}/public.pem").into()),
        )
        .expiry_secs(Some(ONE_HOUR)),
    );
    let token = svc.create_token(Some("rsa"), &admin()).unwrap();
    let bearer = format!("Bearer {token}");

    let res = app(svc)
        .oneshot(get_with("/me", &[("authorization", bearer.as_str())]))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_string(res).await, "rsa:admin");
}

#[tokio::test]
async fn extractor_without_layer_is_forbidden() {
    let app = Router::new().route("/me", get(whoami));
    let res = app.oneshot(get_with("/me", &[])).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}
