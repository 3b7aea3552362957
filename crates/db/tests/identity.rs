//! Integration tests for OAuth identity linking.

use harbor_db::models::identity::LinkOrRegister;
use harbor_db::models::user::CreateUser;
use harbor_db::repositories::{IdentityRepo, UserRepo};
use sqlx::PgPool;

fn github_login(identifier: &str, username: &str) -> LinkOrRegister {
    LinkOrRegister {
        session_user_id: None,
        service: "github".to_string(),
        identifier: identifier.to_string(),
        username: username.to_string(),
        name: Some("Test User".to_string()),
        avatar_url: None,
        email: Some(format!("{username}@example.com")),
        details: serde_json::json!({ "accessToken": "gho_test" }),
    }
}

#[sqlx::test]
async fn first_login_creates_a_user(pool: PgPool) {
    let user = IdentityRepo::link_or_register(&pool, &github_login("1001", "octocat"))
        .await
        .expect("link_or_register should succeed");

    assert_eq!(user.username, "octocat");
    assert!(user.password_hash.is_none(), "OAuth-only users have no password");

    let identity = IdentityRepo::find(&pool, "github", "1001")
        .await
        .unwrap()
        .expect("identity should be linked");
    assert_eq!(identity.user_id, user.id);
}

#[sqlx::test]
async fn second_login_resumes_the_same_user(pool: PgPool) {
    let first = IdentityRepo::link_or_register(&pool, &github_login("1001", "octocat"))
        .await
        .unwrap();
    let second = IdentityRepo::link_or_register(&pool, &github_login("1001", "octocat"))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
}

#[sqlx::test]
async fn authenticated_login_links_instead_of_creating(pool: PgPool) {
    let existing = UserRepo::create(
        &pool,
        &CreateUser {
            username: "alice".to_string(),
            name: None,
            avatar_url: None,
            password_hash: Some("$argon2id$fake".to_string()),
        },
    )
    .await
    .unwrap();

    let mut input = github_login("2002", "alice_gh");
    input.session_user_id = Some(existing.id);

    let linked = IdentityRepo::link_or_register(&pool, &input).await.unwrap();
    assert_eq!(linked.id, existing.id, "identity must attach to the session user");

    let identities = IdentityRepo::list_for_user(&pool, existing.id).await.unwrap();
    assert_eq!(identities.len(), 1);
    assert_eq!(identities[0].identifier, "2002");
}

#[sqlx::test]
async fn taken_username_gets_a_suffix(pool: PgPool) {
    UserRepo::create(
        &pool,
        &CreateUser {
            username: "octocat".to_string(),
            name: None,
            avatar_url: None,
            password_hash: Some("$argon2id$fake".to_string()),
        },
    )
    .await
    .unwrap();

    let user = IdentityRepo::link_or_register(&pool, &github_login("3003", "octocat"))
        .await
        .unwrap();
    assert_eq!(user.username, "octocat2");
}

#[sqlx::test]
async fn concurrent_first_logins_create_exactly_one_user(pool: PgPool) {
    let input = github_login("4004", "racer");

    let (a, b) = tokio::join!(
        IdentityRepo::link_or_register(&pool, &input),
        IdentityRepo::link_or_register(&pool, &input),
    );
    let a = a.expect("first concurrent login should succeed");
    let b = b.expect("second concurrent login should succeed");

    assert_eq!(a.id, b.id, "both logins must resolve to the same user");

    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM users WHERE username LIKE 'racer%'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1, "exactly one user row may exist");
}
