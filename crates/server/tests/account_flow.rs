mod common;

use common::{state, Client, MAIN_GROUP};
use serde_json::json;

#[tokio::test]
async fn register_signs_in_with_main_group() {
    let state = state().await;
    let mut alice = Client::connect();
    let reply = alice.register(&state, "alice").await;

    assert!(reply["token"].is_string());
    assert_eq!(reply["user"]["identity"], "alice");
    assert!(reply["user"].get("secret").is_none());
    assert!(reply["user"].get("secretHash").is_none());
    assert_eq!(reply["groups"][0]["groupName"], MAIN_GROUP);

    let session = state.registry.session(alice.handle.id()).unwrap();
    assert_eq!(session.channels, vec![MAIN_GROUP.to_string()]);
}

#[tokio::test]
async fn register_rejects_duplicates_and_bad_input() {
    let state = state().await;
    let mut alice = Client::connect();
    alice.register(&state, "alice").await;

    let mut other = Client::connect();
    let reply = other
        .call(&state, "register", json!({ "identity": "alice", "secret": "x" }))
        .await;
    assert_eq!(reply, json!({ "success": false, "code": 3 }));

    for identity in ["", "a&b", "  "] {
        let reply = other
            .call(&state, "register", json!({ "identity": identity, "secret": "x" }))
            .await;
        assert_eq!(reply, json!({ "success": false, "code": 4 }), "{:?}", identity);
    }

    let reply = other
        .call(&state, "register", json!({ "identity": "dave", "secret": "" }))
        .await;
    assert_eq!(reply["code"], 4);
    assert!(state.registry.session(other.handle.id()).is_none());
}

#[tokio::test]
async fn login_distinguishes_wrong_secret_from_unknown_identity() {
    let state = state().await;
    let mut alice = Client::connect();
    alice.register(&state, "alice").await;
    alice.emit(&state, "logout", json!(null)).await;
    assert_eq!(state.registry.online_count(), 0);

    let mut client = Client::connect();
    let reply = client
        .call(&state, "login", json!({ "identity": "alice", "secret": "nope" }))
        .await;
    assert_eq!(reply, json!({ "success": false, "code": 1 }));

    let reply = client
        .call(&state, "login", json!({ "identity": "nobody", "secret": "pw" }))
        .await;
    assert_eq!(reply, json!({ "success": false, "code": 2 }));

    let reply = client
        .call(&state, "login", json!({ "identity": "alice", "secret": "pw" }))
        .await;
    assert_eq!(reply["success"], true);
    assert!(reply["token"].is_string());
    assert_eq!(state.registry.online_count(), 1);
}

#[tokio::test]
async fn token_login_restores_session_without_new_token() {
    let state = state().await;
    let mut alice = Client::connect();
    let reply = alice.register(&state, "alice").await;
    let token = reply["token"].as_str().unwrap().to_string();

    let mut second = Client::connect();
    let reply = second.call(&state, "login_with_token", json!(token)).await;
    assert_eq!(reply["success"], true);
    assert!(reply.get("token").is_none());
    assert_eq!(reply["user"]["identity"], "alice");

    // two live sessions under one identity
    assert_eq!(state.registry.sessions_for_identity("alice").len(), 2);

    let reply = second.call(&state, "login_with_token", json!("forged.token")).await;
    assert_eq!(reply, json!({ "success": false }));
}

#[tokio::test]
async fn relogin_on_same_connection_replaces_session() {
    let state = state().await;
    let mut alice = Client::connect();
    alice.register(&state, "alice").await;
    alice
        .call(&state, "login", json!({ "identity": "alice", "secret": "pw" }))
        .await;

    assert_eq!(state.registry.online_count(), 1);
    assert_eq!(state.registry.sessions_for_identity("alice").len(), 1);
}

#[tokio::test]
async fn profile_updates_skip_protected_keys() {
    let state = state().await;
    let mut alice = Client::connect();
    let mut bob = Client::connect();
    alice.register(&state, "alice").await;
    bob.register(&state, "bob").await;

    alice
        .emit(
            &state,
            "update_profile",
            json!({
                "sign": "hello",
                "location": "Berlin",
                "identity": "mallory",
                "groups": [],
                "theme": "dark"
            }),
        )
        .await;

    let profile = bob.call(&state, "fetch_profile", json!("alice")).await;
    assert_eq!(
        profile,
        json!({ "identity": "alice", "sign": "hello", "location": "Berlin" })
    );

    let user = state.store.fetch_user("alice").await.unwrap().unwrap();
    assert_eq!(user.identity, "alice");
    assert_eq!(user.groups, vec![MAIN_GROUP.to_string()]);
    assert_eq!(user.profile.extra["theme"], "dark");

    let missing = bob.call(&state, "fetch_profile", json!("nobody")).await;
    assert_eq!(missing, json!({ "success": false }));
}

#[tokio::test]
async fn upload_credential_has_three_parts() {
    let state = state().await;
    let mut alice = Client::connect();
    alice.register(&state, "alice").await;

    let credential = alice.call(&state, "upload_credential", json!(null)).await;
    let parts: Vec<&str> = credential.as_str().unwrap().split(':').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "AK");
}
