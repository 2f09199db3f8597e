//! Session gate behaviour through the HTTP stack.

use axum::http::{Method, StatusCode};
use tower::ServiceExt;

use sitegate::auth::codec;
use sitegate::auth::SessionSecret;
use sitegate::config::Environment;

mod common;
use common::*;

#[tokio::test]
async fn test_missing_cookie_is_rejected_without_clearing() {
    let app = app();
    let response = app
        .router
        .oneshot(request(Method::GET, "/api/auth/me", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(session_set_cookie(&response).is_none());
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["statusCode"], 401);
    assert_eq!(body["message"], "Unauthorized: no token provided");
}

#[tokio::test]
async fn test_valid_session_is_renewed() {
    let app = app();
    let credential = app.credential_for(&user("u1"));
    app.clock.advance(10);

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/api/auth/me", Some(&credential), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = session_set_cookie(&response).expect("renewed cookie");
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/"));
    assert!(set_cookie.contains("Max-Age=86400"));
    assert!(!set_cookie.contains("Secure"));

    let renewed = cookie_value(&set_cookie);
    assert_ne!(renewed, credential);

    let secret = SessionSecret::new(SECRET);
    let old = codec::decode(&credential, &secret, START + 10).unwrap();
    let new = codec::decode(&renewed, &secret, START + 10).unwrap();
    assert!(new.exp > old.exp);
    assert_eq!(new.auth_time, Some(START));

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["subjectId"], "u1");
    assert_eq!(body["user"]["isAdmin"], false);
}

#[tokio::test]
async fn test_expired_session_clears_cookie() {
    let app = app();
    let credential = app.credential_for(&user("u1"));
    app.clock.advance(DAY + 1);

    let response = app
        .router
        .oneshot(request(Method::GET, "/api/auth/me", Some(&credential), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(is_removal(&session_set_cookie(&response).unwrap()));
    let body = json_body(response).await;
    assert_eq!(body["message"], "Unauthorized: session expired, please sign in again");
}

#[tokio::test]
async fn test_tampered_and_malformed_credentials() {
    let app = app();
    let credential = app.credential_for(&user("u1"));

    let (signed, tag) = credential.rsplit_once('.').unwrap();
    let mut flipped: Vec<char> = tag.chars().collect();
    flipped[0] = if flipped[0] == 'A' { 'B' } else { 'A' };
    let tampered = format!("{}.{}", signed, flipped.into_iter().collect::<String>());

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/api/auth/me", Some(&tampered), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(is_removal(&session_set_cookie(&response).unwrap()));
    assert_eq!(json_body(response).await["message"], "Unauthorized: invalid token signature");

    let response = app
        .router
        .oneshot(request(Method::GET, "/api/auth/me", Some("not-a-token"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["message"], "Unauthorized: malformed token");
}

#[tokio::test]
async fn test_absolute_ceiling_ends_active_session() {
    let mut config = test_config();
    config.session.max_session_age_secs = Some(2 * DAY);
    let app = app_with(config);

    let mut credential = app.credential_for(&user("u1"));
    for _ in 0..2 {
        app.clock.advance(20 * HOUR);
        let response = app
            .router
            .clone()
            .oneshot(request(Method::GET, "/api/auth/me", Some(&credential), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        credential = cookie_value(&session_set_cookie(&response).unwrap());
    }

    // Renewal at 40h was capped at the 48h ceiling.
    let claims = codec::decode(&credential, &SessionSecret::new(SECRET), START + 40 * HOUR).unwrap();
    assert_eq!(claims.exp, START + 2 * DAY);

    app.clock.advance(8 * HOUR);
    let response = app
        .router
        .oneshot(request(Method::GET, "/api/auth/me", Some(&credential), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(json_body(response).await["message"]
        .as_str()
        .unwrap()
        .contains("expired"));
}

#[tokio::test]
async fn test_optional_session_status() {
    let app = app();

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/api/auth/status", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_set_cookie(&response).is_none());
    assert_eq!(json_body(response).await["authenticated"], false);

    let credential = app.credential_for(&admin("root"));
    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/api/auth/status", Some(&credential), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_set_cookie(&response).is_some());
    let body = json_body(response).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user"]["isAdmin"], true);

    let response = app
        .router
        .oneshot(request(Method::GET, "/api/auth/status", Some("garbage"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(is_removal(&session_set_cookie(&response).unwrap()));
    assert_eq!(json_body(response).await["authenticated"], false);
}

#[tokio::test]
async fn test_signout_clears_cookie() {
    let app = app();
    let credential = app.credential_for(&user("u1"));

    let response = app
        .router
        .oneshot(request(Method::POST, "/api/auth/signout", Some(&credential), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = session_set_cookie(&response).unwrap();
    assert!(is_removal(&set_cookie));
    assert!(set_cookie.contains("Path=/"));
    assert!(set_cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_production_cookie_attributes() {
    let mut config = test_config();
    config.environment = Environment::Production;
    let app = app_with(config);
    let credential = app.credential_for(&user("u1"));

    let response = app
        .router
        .oneshot(request(Method::GET, "/api/auth/me", Some(&credential), None))
        .await
        .unwrap();

    let set_cookie = session_set_cookie(&response).unwrap();
    assert!(set_cookie.contains("Secure"));
    assert!(set_cookie.contains("SameSite=None"));
}

#[tokio::test]
async fn test_error_detail_depends_on_environment() {
    let app = app();
    let response = app
        .router
        .oneshot(request(Method::GET, "/api/auth/me", None, None))
        .await
        .unwrap();
    assert!(json_body(response).await["stack"].is_string());

    let mut config = test_config();
    config.environment = Environment::Production;
    let response = app_with(config)
        .router
        .oneshot(request(Method::GET, "/api/auth/me", None, None))
        .await
        .unwrap();
    assert!(json_body(response).await.get("stack").is_none());
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = app();
    let response = app
        .router
        .oneshot(request(Method::GET, "/api/unknown", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));
}
