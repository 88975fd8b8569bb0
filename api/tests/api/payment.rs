use api::payments::MOCK_WEBHOOK_SIGNATURE;
use payloads::{BidPaymentStatus, PaymentStatus, requests};
use reqwest::StatusCode;
use rust_decimal::dec;

use test_helpers::{assert_status_code, auction_details_a, spawn_app};

#[tokio::test]
async fn payment_intent_lifecycle_credits_wallet() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_bidding_trio().await?;
    let auction_id = app.client.create_auction(&auction_details_a()).await?;

    app.login_bob().await?;
    let bid_id = app.place_bid(auction_id, dec!(150)).await?;
    assert_eq!(app.wallet_balance("bob").await?, dec!(1000));

    let created = app
        .client
        .create_payment_intent(&requests::CreatePaymentIntent {
            amount: dec!(150),
            currency: None,
            auction_id,
            bid_id,
        })
        .await?;
    assert!(!created.client_secret.is_empty());

    // the local record mirrors the intent
    let status = sqlx::query_scalar::<_, PaymentStatus>(
        "SELECT status FROM payments WHERE payment_intent_id = $1",
    )
    .bind(&created.payment_intent_id)
    .fetch_one(&app.db_pool)
    .await?;
    assert_eq!(status, PaymentStatus::RequiresPaymentMethod);

    // confirming before the gateway reports success applies nothing
    let confirmation = app
        .client
        .confirm_payment(&requests::ConfirmPayment {
            payment_intent_id: created.payment_intent_id.clone(),
            auction_id,
            bid_id,
        })
        .await?;
    assert!(!confirmation.applied);
    assert_eq!(confirmation.status, "requires_payment_method");
    assert_eq!(app.wallet_balance("bob").await?, dec!(1000));

    // the client completes the payment sheet; the gateway flips the intent
    app.payments.mark_succeeded(&created.payment_intent_id);

    let confirmation = app
        .client
        .confirm_payment(&requests::ConfirmPayment {
            payment_intent_id: created.payment_intent_id.clone(),
            auction_id,
            bid_id,
        })
        .await?;
    assert!(confirmation.applied);
    assert_eq!(confirmation.status, "succeeded");
    assert_eq!(app.wallet_balance("bob").await?, dec!(1150));

    // the linked bid is now marked paid
    let view = app.client.auction_details(&auction_id).await?;
    assert_eq!(view.bids[0].payment_status, BidPaymentStatus::Paid);
    assert!(view.bids[0].paid_at.is_some());

    // retrying the confirm cannot double-credit
    let retry = app
        .client
        .confirm_payment(&requests::ConfirmPayment {
            payment_intent_id: created.payment_intent_id.clone(),
            auction_id,
            bid_id,
        })
        .await?;
    assert!(retry.applied);
    assert_eq!(app.wallet_balance("bob").await?, dec!(1150));

    Ok(())
}

#[tokio::test]
async fn payment_intent_requires_positive_amount() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_bidding_trio().await?;
    let auction_id = app.client.create_auction(&auction_details_a()).await?;
    app.login_bob().await?;
    let bid_id = app.place_bid(auction_id, dec!(150)).await?;

    let result = app
        .client
        .create_payment_intent(&requests::CreatePaymentIntent {
            amount: dec!(0),
            currency: None,
            auction_id,
            bid_id,
        })
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn confirming_someone_elses_payment_is_denied() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_bidding_trio().await?;
    let auction_id = app.client.create_auction(&auction_details_a()).await?;

    app.login_bob().await?;
    let bid_id = app.place_bid(auction_id, dec!(150)).await?;
    let created = app
        .client
        .create_payment_intent(&requests::CreatePaymentIntent {
            amount: dec!(150),
            currency: None,
            auction_id,
            bid_id,
        })
        .await?;
    app.payments.mark_succeeded(&created.payment_intent_id);

    app.login_charlie().await?;
    let result = app
        .client
        .confirm_payment(&requests::ConfirmPayment {
            payment_intent_id: created.payment_intent_id,
            auction_id,
            bid_id,
        })
        .await;
    assert_status_code(result, StatusCode::FORBIDDEN);
    assert_eq!(app.wallet_balance("charlie").await?, dec!(1000));
    assert_eq!(app.wallet_balance("bob").await?, dec!(1000));

    Ok(())
}

#[tokio::test]
async fn webhook_verifies_signatures() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let url = format!(
        "http://127.0.0.1:{}/api/payments/webhook",
        app.port
    );
    let payload = serde_json::json!({
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": "pi_mock_000001" } },
    })
    .to_string();

    // valid signature is acknowledged
    let response = app
        .client
        .inner_client
        .post(&url)
        .header("Stripe-Signature", MOCK_WEBHOOK_SIGNATURE)
        .body(payload.clone())
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["received"], true);

    // a bad signature is rejected
    let response = app
        .client
        .inner_client
        .post(&url)
        .header("Stripe-Signature", "not-the-signature")
        .body(payload.clone())
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // as is a missing one
    let response = app
        .client
        .inner_client
        .post(&url)
        .body(payload)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}
