use payloads::requests;
use reqwest::StatusCode;

use test_helpers::{
    alice_credentials, assert_status_code, spawn_app, to_login_credentials,
};

#[tokio::test]
async fn login_refused() -> anyhow::Result<()> {
    let app = spawn_app().await;

    // test a login with an invalid user
    let body = requests::LoginCredentials {
        username: "random".into(),
        password: "random".into(),
    };
    let result = app.client.login(&body).await;

    match result {
        Err(payloads::ClientError::APIError(code, text)) => {
            assert_eq!(code, StatusCode::UNAUTHORIZED);
            assert_eq!(text, "Authentication failed: Invalid credentials");
        }
        _ => {
            panic!("Expected APIError");
        }
    }

    // login check should fail
    let is_logged_in = app.client.login_check().await?;
    assert!(!is_logged_in);

    Ok(())
}

#[tokio::test]
async fn create_account_logs_in() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_alice_user().await?;

    // account creation leaves a valid session
    let is_logged_in = app.client.login_check().await?;
    assert!(is_logged_in);

    // and the password round-trips through a fresh login
    app.client.logout().await?;
    assert!(!app.client.login_check().await?);
    app.client
        .login(&to_login_credentials(&alice_credentials()))
        .await?;
    assert!(app.client.login_check().await?);

    Ok(())
}

#[tokio::test]
async fn new_accounts_start_as_plain_bidders() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_alice_user().await?;

    let profile = app.client.user_profile().await?;
    assert_eq!(profile.username, "alice");
    assert_eq!(profile.role, payloads::Role::User);
    assert!(!profile.can_host);
    assert_eq!(profile.wallet_balance, rust_decimal::dec!(0));
    assert_eq!(profile.total_bids, 0);
    assert_eq!(profile.total_auctions_won, 0);
    assert!(!profile.has_push_token);

    Ok(())
}

#[tokio::test]
async fn invalid_account_details_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let mut body = requests::CreateAccount {
        username: (0..52).map(|_| "X").collect::<String>(),
        email: "anemail@example.com".into(),
        password: "a-password".into(),
        display_name: None,
    };
    let result = app.client.create_account(&body).await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    body.username = "username".into();
    body.email =
        format!("{}@example.com", (0..300).map(|_| "X").collect::<String>());
    let result = app.client.create_account(&body).await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn duplicate_username_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_alice_user().await?;
    app.client.logout().await?;

    let mut duplicate = alice_credentials();
    duplicate.email = "other@example.com".into();
    let result = app.client.create_account(&duplicate).await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn update_profile_applies_present_fields() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_alice_user().await?;

    let profile = app
        .client
        .update_profile(&requests::UpdateProfile {
            display_name: Some("Alice A.".into()),
            push_token: None,
        })
        .await?;
    assert_eq!(profile.display_name.as_deref(), Some("Alice A."));
    assert!(!profile.has_push_token);

    // registering a push token leaves the display name alone
    let profile = app
        .client
        .update_profile(&requests::UpdateProfile {
            display_name: None,
            push_token: Some("alice-device-token".into()),
        })
        .await?;
    assert_eq!(profile.display_name.as_deref(), Some("Alice A."));
    assert!(profile.has_push_token);

    Ok(())
}
