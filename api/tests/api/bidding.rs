use payloads::{BidPaymentStatus, requests};
use reqwest::StatusCode;
use rust_decimal::dec;

use test_helpers::{
    assert_status_code, auction_details_a, auction_details_b, spawn_app,
};

#[tokio::test]
async fn bidding_requires_a_session() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_alice_user().await?;
    app.make_host("alice").await?;
    let auction_id = app.client.create_auction(&auction_details_a()).await?;
    app.client.logout().await?;

    let result = app
        .client
        .place_bid(&requests::PlaceBid {
            auction_id,
            amount: dec!(150),
        })
        .await;
    assert_status_code(result, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn bid_must_beat_current_price() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_bidding_trio().await?;
    // starting price 100
    let auction_id = app.client.create_auction(&auction_details_a()).await?;

    app.login_bob().await?;

    // below the starting price
    let result = app
        .client
        .place_bid(&requests::PlaceBid {
            auction_id,
            amount: dec!(90),
        })
        .await;
    match result {
        Err(payloads::ClientError::APIError(code, text)) => {
            assert_eq!(code, StatusCode::CONFLICT);
            assert!(
                text.contains("must be higher than current price"),
                "unexpected error text: {text}"
            );
        }
        _ => panic!("Expected APIError"),
    }

    // equal to the starting price is still too low
    let result = app
        .client
        .place_bid(&requests::PlaceBid {
            auction_id,
            amount: dec!(100),
        })
        .await;
    assert_status_code(result, StatusCode::CONFLICT);

    // and no writes happened
    let view = app.client.auction_details(&auction_id).await?;
    assert_eq!(view.auction.current_price, dec!(100));
    assert_eq!(view.auction.bid_count, 0);
    assert!(view.bids.is_empty());

    Ok(())
}

#[tokio::test]
async fn bid_requires_wallet_coverage() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_bidding_trio().await?;
    let auction_id = app.client.create_auction(&auction_details_a()).await?;

    app.login_bob().await?;
    app.set_wallet_balance("bob", dec!(120)).await?;

    let result = app
        .client
        .place_bid(&requests::PlaceBid {
            auction_id,
            amount: dec!(150),
        })
        .await;
    assert_status_code(result, StatusCode::CONFLICT);

    // a balance exactly covering the amount is sufficient
    app.place_bid(auction_id, dec!(120)).await?;
    let view = app.client.auction_details(&auction_id).await?;
    assert_eq!(view.auction.current_price, dec!(120));

    Ok(())
}

#[tokio::test]
async fn accepted_bid_updates_auction_and_counters() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_bidding_trio().await?;
    let auction_id = app.client.create_auction(&auction_details_a()).await?;

    app.login_bob().await?;
    let bid_id = app.place_bid(auction_id, dec!(150)).await?;

    // the new bid shows up immediately in the details view
    let view = app.client.auction_details(&auction_id).await?;
    assert_eq!(view.auction.current_price, dec!(150));
    assert_eq!(view.auction.bid_count, 1);
    assert_eq!(view.auction.participant_count, 1);
    assert!(view.auction.last_bid_at.is_some());
    assert_eq!(view.total_bids, 1);
    assert_eq!(view.bids.len(), 1);
    assert_eq!(view.bids[0].bid_id, bid_id);
    assert_eq!(view.bids[0].amount, dec!(150));
    assert_eq!(view.bids[0].bidder.username, "bob");
    assert_eq!(view.bids[0].payment_status, BidPaymentStatus::Unpaid);

    // bidder's aggregate counter moved
    let profile = app.client.user_profile().await?;
    assert_eq!(profile.total_bids, 1);

    // a second bid from the same user doesn't re-count the participant
    app.place_bid(auction_id, dec!(175)).await?;
    let view = app.client.auction_details(&auction_id).await?;
    assert_eq!(view.auction.bid_count, 2);
    assert_eq!(view.auction.participant_count, 1);
    assert_eq!(view.auction.current_price, dec!(175));

    // a different bidder does
    app.login_charlie().await?;
    app.place_bid(auction_id, dec!(200)).await?;
    let view = app.client.auction_details(&auction_id).await?;
    assert_eq!(view.auction.bid_count, 3);
    assert_eq!(view.auction.participant_count, 2);
    assert_eq!(view.auction.current_price, dec!(200));
    // newest first
    assert_eq!(view.bids[0].bidder.username, "charlie");

    Ok(())
}

#[tokio::test]
async fn bids_rejected_after_end_time() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_bidding_trio().await?;
    // one-hour auction
    let auction_id = app.client.create_auction(&auction_details_b()).await?;

    app.login_bob().await?;
    app.time_source.advance(jiff::Span::new().hours(2));

    let result = app
        .client
        .place_bid(&requests::PlaceBid {
            auction_id,
            amount: dec!(75),
        })
        .await;
    match result {
        Err(payloads::ClientError::APIError(code, text)) => {
            assert_eq!(code, StatusCode::CONFLICT);
            assert!(
                text.contains("Auction has ended"),
                "unexpected error text: {text}"
            );
        }
        _ => panic!("Expected APIError"),
    }

    Ok(())
}

/// Two simultaneous bids at the same amount race for the same auction row.
/// The row lock serializes them: whichever commits first sets the price,
/// and the other re-checks against it and is rejected. Exactly one wins.
#[tokio::test]
async fn concurrent_equal_bids_accept_exactly_one() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_bidding_trio().await?;
    let auction_id = app.client.create_auction(&auction_details_a()).await?;

    app.login_bob().await?;
    let bid = requests::PlaceBid {
        auction_id,
        amount: dec!(150),
    };
    let (first, second) =
        tokio::join!(app.client.place_bid(&bid), app.client.place_bid(&bid));

    let accepted =
        [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 1);
    for result in [first, second] {
        if let Err(payloads::ClientError::APIError(code, text)) = result {
            assert_eq!(code, StatusCode::CONFLICT);
            assert!(text.contains("must be higher than current price"));
        }
    }

    let view = app.client.auction_details(&auction_id).await?;
    assert_eq!(view.auction.current_price, dec!(150));
    assert_eq!(view.auction.bid_count, 1);

    Ok(())
}

#[tokio::test]
async fn concurrent_bids_on_distinct_auctions() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_bidding_trio().await?;
    let first = app.client.create_auction(&auction_details_a()).await?;
    let second = app.client.create_auction(&auction_details_b()).await?;

    app.login_bob().await?;
    app.place_bid(first, dec!(150)).await?;
    app.login_charlie().await?;
    app.place_bid(second, dec!(60)).await?;

    // each auction's price tracks its own highest bid
    let first_view = app.client.auction_details(&first).await?;
    let second_view = app.client.auction_details(&second).await?;
    assert_eq!(first_view.auction.current_price, dec!(150));
    assert_eq!(second_view.auction.current_price, dec!(60));

    Ok(())
}
