mod common;

use mangahub_server::store::UserStore;
use serde_json::{json, Value};

#[tokio::test]
async fn register_login_and_me() {
    let app = common::spawn_app().await;
    let token = app.register("alice", "correct-horse").await;

    let me: Value = app.me(&token).await.json().await.unwrap();
    assert_eq!(me["username"], "alice");
    assert_eq!(me["email"], "alice@example.com");

    let login = app.login("alice", "correct-horse").await;
    assert_eq!(login.status(), 200);
    let body: Value = login.json().await.unwrap();
    assert_eq!(body["user"]["username"], "alice");
    assert!(body["expires_at"].is_string());

    let wrong = app.login("alice", "battery-staple").await;
    assert_eq!(wrong.status(), 401);
    let unknown = app.login("mallory", "correct-horse").await;
    assert_eq!(unknown.status(), 401);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = common::spawn_app().await;
    app.register("alice", "correct-horse").await;

    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "username": "alice2",
            "email": "ALICE@example.com",
            "password": "correct-horse",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    assert_eq!(
        response.headers()["content-type"],
        "application/problem+json"
    );
}

#[tokio::test]
async fn logout_revokes_outstanding_tokens() {
    let app = common::spawn_app().await;
    let first = app.register("alice", "correct-horse").await;
    let second: Value = app
        .login("alice", "correct-horse")
        .await
        .json()
        .await
        .unwrap();
    let second = second["token"].as_str().unwrap().to_string();

    let logout = app
        .client
        .post(app.url("/api/auth/logout"))
        .bearer_auth(&first)
        .send()
        .await
        .unwrap();
    assert_eq!(logout.status(), 200);

    assert_eq!(app.me(&first).await.status(), 401);
    assert_eq!(app.me(&second).await.status(), 401);

    let fresh: Value = app
        .login("alice", "correct-horse")
        .await
        .json()
        .await
        .unwrap();
    let fresh = fresh["token"].as_str().unwrap();
    assert_eq!(app.me(fresh).await.status(), 200);
}

#[tokio::test]
async fn change_password_rotates_credentials_and_tokens() {
    let app = common::spawn_app().await;
    let token = app.register("alice", "correct-horse").await;

    let bad = app
        .client
        .post(app.url("/api/auth/change-password"))
        .bearer_auth(&token)
        .json(&json!({"old_password": "nope-nope", "new_password": "battery-staple"}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 401);
    assert_eq!(app.me(&token).await.status(), 200);

    let changed = app
        .client
        .post(app.url("/api/auth/change-password"))
        .bearer_auth(&token)
        .json(&json!({"old_password": "correct-horse", "new_password": "battery-staple"}))
        .send()
        .await
        .unwrap();
    assert_eq!(changed.status(), 200);

    assert_eq!(app.me(&token).await.status(), 401);
    assert_eq!(app.login("alice", "correct-horse").await.status(), 401);
    assert_eq!(app.login("alice", "battery-staple").await.status(), 200);
}

#[tokio::test]
async fn version_bump_invalidates_only_older_tokens() {
    let app = common::spawn_app().await;
    let old = app.register("alice", "correct-horse").await;
    let user = app
        .state
        .users
        .find_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();

    app.state.users.bump_token_version(&user.id).await.unwrap();
    assert_eq!(app.me(&old).await.status(), 401);

    let user = app.state.users.find_by_id(&user.id).await.unwrap().unwrap();
    let (fresh, _) = app.state.tokens.sign(&user).unwrap();
    assert_eq!(app.me(&fresh).await.status(), 200);
}

#[tokio::test]
async fn malformed_credentials_are_unauthorized() {
    let app = common::spawn_app().await;
    let token = app.register("alice", "correct-horse").await;

    let missing = app
        .client
        .get(app.url("/api/users/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 401);

    let mut tampered = token.clone();
    tampered.push('x');
    assert_eq!(app.me(&tampered).await.status(), 401);

    let problem: Value = app.me("not-a-jwt").await.json().await.unwrap();
    assert_eq!(problem["status"], 401);
    assert_eq!(problem["detail"], "invalid token");
}

#[tokio::test]
async fn health_and_readiness_report_counts() {
    let app = common::spawn_app().await;

    let health: Value = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let ready = app.client.get(app.url("/ready")).send().await.unwrap();
    assert_eq!(ready.status(), 200);
    let ready: Value = ready.json().await.unwrap();
    assert_eq!(ready["store"], "ok");
    assert_eq!(ready["tcp_clients"], 0);
    assert_eq!(ready["notify_clients"], 0);
}
