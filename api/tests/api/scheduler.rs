use api::scheduler::sweep_tick;
use jiff::Span;
use payloads::AuctionStatus;
use rust_decimal::dec;

use test_helpers::{auction_details_a, auction_details_b, spawn_app};

#[tokio::test]
async fn sweep_finalizes_expired_auctions() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_bidding_trio().await?;
    // one-hour auction alongside a day-long one
    let short = app.client.create_auction(&auction_details_b()).await?;
    let long = app.client.create_auction(&auction_details_a()).await?;

    app.login_bob().await?;
    app.place_bid(short, dec!(60)).await?;
    let bob_id = app.user_id("bob").await?;

    app.time_source.advance(Span::new().hours(2));
    sweep_tick(&app.db_pool, &app.time_source).await?;

    // the expired auction concluded with bob as winner
    let view = app.client.auction_details(&short).await?;
    assert_eq!(view.auction.status, AuctionStatus::Ended);
    assert_eq!(view.auction.winner_id, Some(bob_id));
    assert_eq!(view.auction.winning_bid, Some(dec!(60)));
    assert!(view.auction.ended_at.is_some());

    let profile = app.client.user_profile().await?;
    assert_eq!(profile.total_auctions_won, 1);

    // the day-long auction is untouched
    let view = app.client.auction_details(&long).await?;
    assert_eq!(view.auction.status, AuctionStatus::Active);

    Ok(())
}

#[tokio::test]
async fn sweep_is_idempotent() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_bidding_trio().await?;
    let auction_id = app.client.create_auction(&auction_details_b()).await?;
    app.login_bob().await?;
    app.place_bid(auction_id, dec!(60)).await?;

    app.time_source.advance(Span::new().hours(2));
    sweep_tick(&app.db_pool, &app.time_source).await?;
    sweep_tick(&app.db_pool, &app.time_source).await?;

    let profile = app.client.user_profile().await?;
    assert_eq!(profile.total_auctions_won, 1);

    Ok(())
}

#[tokio::test]
async fn sweep_without_bids_records_no_winner() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_alice_user().await?;
    app.make_host("alice").await?;
    let auction_id = app.client.create_auction(&auction_details_b()).await?;

    app.time_source.advance(Span::new().hours(2));
    sweep_tick(&app.db_pool, &app.time_source).await?;

    let view = app.client.auction_details(&auction_id).await?;
    assert_eq!(view.auction.status, AuctionStatus::Ended);
    assert_eq!(view.auction.winner_id, None);
    // with no bids the recorded winning bid falls back to the start price
    assert_eq!(view.auction.winning_bid, Some(dec!(50)));

    Ok(())
}

/// The host ending early and the sweep racing each other resolve through
/// the same guarded transition; whichever runs second is a no-op.
#[tokio::test]
async fn host_end_then_sweep_does_not_double_count() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.create_bidding_trio().await?;
    let auction_id = app.client.create_auction(&auction_details_b()).await?;
    app.login_bob().await?;
    app.place_bid(auction_id, dec!(60)).await?;

    app.login_alice().await?;
    app.client
        .end_auction(&payloads::requests::EndAuction { auction_id })
        .await?;

    app.time_source.advance(Span::new().hours(2));
    sweep_tick(&app.db_pool, &app.time_source).await?;

    app.login_bob().await?;
    let profile = app.client.user_profile().await?;
    assert_eq!(profile.total_auctions_won, 1);

    Ok(())
}
