use payloads::{AuctionStatus, requests};
use reqwest::StatusCode;
use rust_decimal::dec;

use test_helpers::{assert_status_code, auction_details_a, spawn_app};

#[tokio::test]
async fn create_auction_requires_hosting_rights() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_alice_user().await?;

    // plain accounts cannot host
    let result = app.client.create_auction(&auction_details_a()).await;
    assert_status_code(result, StatusCode::FORBIDDEN);

    // and no auction was created
    let auctions = app
        .client
        .list_auctions(&requests::ListAuctions { status: None })
        .await?;
    assert!(auctions.is_empty());

    app.make_host("alice").await?;
    app.client.create_auction(&auction_details_a()).await?;

    Ok(())
}

#[tokio::test]
async fn create_auction_rejects_invalid_details() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_alice_user().await?;
    app.make_host("alice").await?;

    let mut details = auction_details_a();
    details.title = "   ".into();
    let result = app.client.create_auction(&details).await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    let mut details = auction_details_a();
    details.duration_hours = 0;
    let result = app.client.create_auction(&details).await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn auction_starts_active_at_starting_price() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_alice_user().await?;
    app.make_host("alice").await?;

    let details = auction_details_a();
    let auction_id = app.client.create_auction(&details).await?;

    let view = app.client.auction_details(&auction_id).await?;
    assert_eq!(view.auction.status, AuctionStatus::Active);
    assert_eq!(view.auction.starting_price, details.starting_price);
    assert_eq!(view.auction.current_price, details.starting_price);
    assert_eq!(view.auction.bid_count, 0);
    assert_eq!(view.auction.participant_count, 0);
    assert_eq!(view.auction.winner_id, None);
    assert_eq!(view.auction.host.username, "alice");
    assert_eq!(
        view.auction.end_at,
        view.auction.start_at
            + jiff::Span::new().hours(details.duration_hours as i64)
    );
    assert!(view.bids.is_empty());
    assert_eq!(view.total_bids, 0);

    Ok(())
}

#[tokio::test]
async fn auction_details_is_public() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_alice_user().await?;
    app.make_host("alice").await?;
    let auction_id = app.client.create_auction(&auction_details_a()).await?;

    // no session required for viewing
    app.client.logout().await?;
    let view = app.client.auction_details(&auction_id).await?;
    assert_eq!(view.auction.auction_id, auction_id);

    // but listing is
    let result = app
        .client
        .list_auctions(&requests::ListAuctions { status: None })
        .await;
    assert_status_code(result, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn list_auctions_filters_by_status() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_alice_user().await?;
    app.make_host("alice").await?;

    let first = app.client.create_auction(&auction_details_a()).await?;
    let second = app.client.create_auction(&auction_details_a()).await?;

    app.client
        .end_auction(&requests::EndAuction { auction_id: first })
        .await?;

    let active = app
        .client
        .list_auctions(&requests::ListAuctions {
            status: Some(AuctionStatus::Active),
        })
        .await?;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].auction_id, second);

    let ended = app
        .client
        .list_auctions(&requests::ListAuctions {
            status: Some(AuctionStatus::Ended),
        })
        .await?;
    assert_eq!(ended.len(), 1);
    assert_eq!(ended[0].auction_id, first);

    let all = app
        .client
        .list_auctions(&requests::ListAuctions { status: None })
        .await?;
    assert_eq!(all.len(), 2);

    Ok(())
}

#[tokio::test]
async fn missing_auction_is_not_found() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let missing = payloads::AuctionId(uuid::Uuid::new_v4());
    let result = app.client.auction_details(&missing).await;
    assert_status_code(result, StatusCode::NOT_FOUND);

    // same through bidding
    app.create_alice_user().await?;
    app.set_wallet_balance("alice", dec!(500)).await?;
    let result = app
        .client
        .place_bid(&requests::PlaceBid {
            auction_id: missing,
            amount: dec!(100),
        })
        .await;
    assert_status_code(result, StatusCode::NOT_FOUND);

    Ok(())
}
