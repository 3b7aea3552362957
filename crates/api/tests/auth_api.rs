//! HTTP-level integration tests for the account API: registration, login,
//! lockout, logout, and the stable error-code contract.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, post_json, register_user, session_cookie};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Registration returns the user, sets a session cookie, and the session
/// works on the next request.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_register_success(pool: PgPool) {
    let app = build_test_app(pool);

    let (cookie, json) = register_user(app.clone(), "alice").await;
    assert_eq!(json["username"], "alice");
    assert_eq!(json["isVerified"], false);
    assert!(json.get("passwordHash").is_none(), "hash must never be serialized");

    let response = get(app, "/settings", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK, "session must resolve on the next request");
}

/// Registering a taken username yields `conflict` with `fields: ["username"]`.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_register_duplicate_username_is_a_conflict(pool: PgPool) {
    let app = build_test_app(pool);
    register_user(app.clone(), "alice").await;

    let body = serde_json::json!({
        "username": "alice",
        "email": "other@test.com",
        "password": "a-long-enough-password",
    });
    let response = post_json(app, "/api/register", body, None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json = body_json(response).await;
    assert_eq!(json["errors"][0]["code"], "conflict");
    assert_eq!(json["errors"][0]["message"], "Conflict occurred");
    assert_eq!(json["errors"][0]["fields"], serde_json::json!(["username"]));
}

/// The same contract holds for a taken email, with the email field named.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_register_duplicate_email_names_the_field(pool: PgPool) {
    let app = build_test_app(pool);
    register_user(app.clone(), "alice").await;

    let body = serde_json::json!({
        "username": "bob",
        "email": "alice@test.com",
        "password": "a-long-enough-password",
    });
    let response = post_json(app, "/api/register", body, None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json = body_json(response).await;
    assert_eq!(json["errors"][0]["code"], "conflict");
    assert_eq!(json["errors"][0]["fields"], serde_json::json!(["email"]));
}

/// A short password is rejected with the stable `weak-password` code.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_register_weak_password(pool: PgPool) {
    let app = build_test_app(pool);

    let body = serde_json::json!({
        "username": "alice",
        "email": "alice@test.com",
        "password": "short",
    });
    let response = post_json(app, "/api/register", body, None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["errors"][0]["code"], "weak-password");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_register_rejects_bad_usernames(pool: PgPool) {
    let app = build_test_app(pool);

    for bad in ["a", "8ball", "_x", "has space"] {
        let body = serde_json::json!({
            "username": bad,
            "email": "alice@test.com",
            "password": "a-long-enough-password",
        });
        let response = post_json(app.clone(), "/api/register", body, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "username={bad}");
    }
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// Login with correct credentials sets a session cookie.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_login_success(pool: PgPool) {
    let app = build_test_app(pool);
    register_user(app.clone(), "alice").await;

    let body = serde_json::json!({ "username": "alice", "password": "a-long-enough-password" });
    let response = post_json(app, "/api/login", body, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_some());

    let json = body_json(response).await;
    assert_eq!(json["username"], "alice");
}

/// Wrong password and unknown username produce byte-identical errors, so
/// responses never reveal whether a username exists.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_login_failures_do_not_enumerate_users(pool: PgPool) {
    let app = build_test_app(pool);
    register_user(app.clone(), "alice").await;

    let wrong_password = post_json(
        app.clone(),
        "/api/login",
        serde_json::json!({ "username": "alice", "password": "incorrect-password" }),
        None,
    )
    .await;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);

    let unknown_user = post_json(
        app,
        "/api/login",
        serde_json::json!({ "username": "ghost", "password": "whatever-at-all" }),
        None,
    )
    .await;
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);

    let a = body_json(wrong_password).await;
    let b = body_json(unknown_user).await;
    assert_eq!(a, b, "both failures must be indistinguishable");
    assert_eq!(a["errors"][0]["code"], "bad-credentials");
}

/// Five failed attempts lock the account; even the correct password is
/// then refused with `account-locked`.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_login_lockout_after_repeated_failures(pool: PgPool) {
    let app = build_test_app(pool);
    register_user(app.clone(), "alice").await;

    for _ in 0..5 {
        let response = post_json(
            app.clone(),
            "/api/login",
            serde_json::json!({ "username": "alice", "password": "incorrect-password" }),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = post_json(
        app,
        "/api/login",
        serde_json::json!({ "username": "alice", "password": "a-long-enough-password" }),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["errors"][0]["code"], "account-locked");
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Logout invalidates the session server-side; the old cookie no longer
/// resolves.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_logout_invalidates_the_session(pool: PgPool) {
    let app = build_test_app(pool);
    let (cookie, _) = register_user(app.clone(), "alice").await;

    let response = post_json(app.clone(), "/api/logout", serde_json::json!({}), Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);

    // The old token now resolves to logged-out: /settings bounces to login.
    let response = get(app, "/settings", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

/// A forged (unsigned) cookie value never resolves to a session.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_forged_cookie_is_ignored(pool: PgPool) {
    let app = build_test_app(pool);
    register_user(app.clone(), "alice").await;

    let forged = "harbor.sid=00000000-0000-4000-8000-000000000000";
    let response = get(app, "/settings", Some(forged), None).await;
    assert_eq!(response.status(), StatusCode::FOUND, "forged cookie must not log in");
}

/// Cross-origin requests never get a session attached, even with a valid
/// cookie.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_cross_origin_requests_get_no_session(pool: PgPool) {
    let app = build_test_app(pool);
    let (cookie, _) = register_user(app.clone(), "alice").await;

    // Same-origin (matching Origin header) works.
    let response = get(
        app.clone(),
        "/settings",
        Some(&cookie),
        Some("http://localhost:3000"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Foreign origin: same cookie, no session.
    let response = get(app, "/settings", Some(&cookie), Some("https://evil.example")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

// ---------------------------------------------------------------------------
// Password reset & account management
// ---------------------------------------------------------------------------

/// Forgot-password reports success whether or not the address exists, and
/// schedules the reset job only when it does.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_forgot_password_does_not_enumerate(pool: PgPool) {
    let app = build_test_app(pool.clone());
    register_user(app.clone(), "alice").await;

    let known = post_json(
        app.clone(),
        "/api/forgot-password",
        serde_json::json!({ "email": "alice@test.com" }),
        None,
    )
    .await;
    assert_eq!(known.status(), StatusCode::OK);
    assert_eq!(body_json(known).await["success"], true);

    let unknown = post_json(
        app,
        "/api/forgot-password",
        serde_json::json!({ "email": "nobody@test.com" }),
        None,
    )
    .await;
    assert_eq!(unknown.status(), StatusCode::OK);
    assert_eq!(body_json(unknown).await["success"], true);

    let jobs: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM jobs WHERE task_identifier = 'send_password_reset_email'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(jobs, 1, "only the known address gets a reset job");
}

/// A wrong reset token is `success: false`, not an error.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_reset_password_with_bad_token(pool: PgPool) {
    let app = build_test_app(pool);
    let (_, user) = register_user(app.clone(), "alice").await;

    let body = serde_json::json!({
        "userId": user["id"],
        "resetToken": "not-the-token",
        "newPassword": "another-long-password",
    });
    let response = post_json(app, "/api/reset-password", body, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], false);
}

/// A wrong verification token is `success: false`.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_verify_email_with_bad_token(pool: PgPool) {
    let app = build_test_app(pool.clone());
    register_user(app.clone(), "alice").await;

    let email_id: i64 = sqlx::query_scalar("SELECT id FROM user_emails LIMIT 1")
        .fetch_one(&pool)
        .await
        .unwrap();

    let body = serde_json::json!({ "emailId": email_id, "token": "not-the-token" });
    let response = post_json(app, "/api/verify-email", body, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], false);
}

/// Registration stores only a token digest and schedules the verification
/// email; redeeming the real token flips the email to verified.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_verification_job_is_scheduled_with_the_plaintext_token(pool: PgPool) {
    let app = build_test_app(pool.clone());
    register_user(app.clone(), "alice").await;

    let (email_id, token): (i64, String) = sqlx::query_as(
        "SELECT (payload->>'email_id')::bigint, payload->>'token' FROM jobs
         WHERE task_identifier = 'send_verification_email'",
    )
    .fetch_one(&pool)
    .await
    .expect("the verification job must be queued");

    let stored: Option<String> =
        sqlx::query_scalar("SELECT verification_token FROM user_emails WHERE id = $1")
            .bind(email_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_ne!(stored.as_deref(), Some(token.as_str()), "only the digest is stored");

    let body = serde_json::json!({ "emailId": email_id, "token": token });
    let response = post_json(app, "/api/verify-email", body, None).await;
    assert_eq!(body_json(response).await["success"], true);

    let verified: bool = sqlx::query_scalar("SELECT is_verified FROM user_emails WHERE id = $1")
        .bind(email_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(verified);
}

/// Settings mutations require a session and surface `not-authorized`.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_settings_require_a_session(pool: PgPool) {
    let app = build_test_app(pool);

    let response = post_json(
        app,
        "/api/settings/delete-email",
        serde_json::json!({ "emailId": 1 }),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errors"][0]["code"], "not-authorized");
}

/// The last email on an account cannot be deleted.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_last_email_cannot_be_deleted(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let (cookie, _) = register_user(app.clone(), "alice").await;

    let email_id: i64 = sqlx::query_scalar("SELECT id FROM user_emails LIMIT 1")
        .fetch_one(&pool)
        .await
        .unwrap();

    let body = serde_json::json!({ "emailId": email_id });
    let response = post_json(app, "/api/settings/delete-email", body, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Deleting the account removes the user row and ends the session.
#[sqlx::test(migrations = "../db/migrations")]
async fn test_delete_account(pool: PgPool) {
    let app = build_test_app(pool.clone());
    let (cookie, _) = register_user(app.clone(), "alice").await;

    let response = post_json(
        app.clone(),
        "/api/settings/delete-account",
        serde_json::json!({}),
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let users: i64 = sqlx::query_scalar("SELECT count(*) FROM users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(users, 0);

    let response = get(app, "/settings", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}
