use super::*;
use jiff::Span;
use jiff_sqlx::ToSqlx;
use payloads::{
    AuctionId, AuctionStatus, BidId, UserId, requests, responses,
};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::time::TimeSource;

/// Fetch an auction row with its row lock held for the rest of the
/// transaction. Bid acceptance and ending both start here so they serialize
/// per auction.
async fn get_auction_for_update_tx(
    auction_id: &AuctionId,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<Auction, StoreError> {
    sqlx::query_as::<_, Auction>(
        "SELECT * FROM auctions WHERE id = $1 FOR UPDATE",
    )
    .bind(auction_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => StoreError::AuctionNotFound,
        e => StoreError::Database(e),
    })
}

pub async fn create_auction(
    details: &requests::CreateAuction,
    user_id: &UserId,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<AuctionId, StoreError> {
    if let Some(reason) = requests::validate_auction(details).error_message()
    {
        return Err(StoreError::InvalidInput(reason));
    }

    let host = read_user(pool, user_id).await?;
    if !host.can_host {
        return Err(StoreError::CannotHost);
    }

    let now = time_source.now();
    let end_at = now + Span::new().hours(details.duration_hours as i64);

    let auction_id = sqlx::query_as::<_, Auction>(
        "INSERT INTO auctions (
            host_id,
            title,
            description,
            category,
            images,
            starting_price,
            current_price,
            duration_hours,
            start_at,
            end_at,
            created_at,
            updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $8, $9, $8, $8)
        RETURNING *",
    )
    .bind(user_id)
    .bind(&details.title)
    .bind(&details.description)
    .bind(&details.category)
    .bind(&details.images)
    .bind(details.starting_price)
    .bind(details.duration_hours)
    .bind(now.to_sqlx())
    .bind(end_at.to_sqlx())
    .fetch_one(pool)
    .await?
    .id;

    Ok(auction_id)
}

pub async fn place_bid(
    auction_id: &AuctionId,
    amount: Decimal,
    user_id: &UserId,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<BidId, StoreError> {
    let mut tx = pool.begin().await?;
    let bid_id =
        place_bid_tx(auction_id, amount, user_id, &mut tx, time_source)
            .await?;
    tx.commit().await?;
    Ok(bid_id)
}

/// Validate and record a bid. Preconditions are checked in order against
/// the locked auction row: exists, active, not past its end, amount above
/// the current price, bidder balance covers the amount. All writes (bid
/// row, auction counters, bidder counter, participant row) land in the
/// caller's transaction.
pub async fn place_bid_tx(
    auction_id: &AuctionId,
    amount: Decimal,
    user_id: &UserId,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    time_source: &TimeSource,
) -> Result<BidId, StoreError> {
    let auction = get_auction_for_update_tx(auction_id, tx).await?;

    if auction.status != AuctionStatus::Active {
        return Err(StoreError::AuctionNotActive);
    }

    let now = time_source.now();
    if now >= auction.end_at {
        return Err(StoreError::AuctionEnded);
    }

    if amount <= auction.current_price {
        return Err(StoreError::BidTooLow {
            current: auction.current_price,
        });
    }

    let bidder = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => StoreError::UserNotFound,
        e => StoreError::Database(e),
    })?;

    if bidder.wallet_balance < amount {
        return Err(StoreError::InsufficientBalance);
    }

    let bid_id = sqlx::query_scalar::<_, BidId>(
        "INSERT INTO bids (auction_id, bidder_id, amount, placed_at, updated_at)
        VALUES ($1, $2, $3, $4, $4)
        RETURNING id",
    )
    .bind(auction_id)
    .bind(user_id)
    .bind(amount)
    .bind(now.to_sqlx())
    .fetch_one(&mut **tx)
    .await?;

    // A user's first bid joins them as a participant
    let joined = sqlx::query(
        "INSERT INTO auction_participants (auction_id, user_id, joined_at)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING",
    )
    .bind(auction_id)
    .bind(user_id)
    .bind(now.to_sqlx())
    .execute(&mut **tx)
    .await?
    .rows_affected();

    sqlx::query(
        "UPDATE auctions SET
            current_price = $2,
            bid_count = bid_count + 1,
            participant_count = participant_count + $3,
            last_bid_at = $4
        WHERE id = $1",
    )
    .bind(auction_id)
    .bind(amount)
    .bind(joined as i32)
    .bind(now.to_sqlx())
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "UPDATE users SET total_bids = total_bids + 1 WHERE id = $1",
    )
    .bind(user_id)
    .execute(&mut **tx)
    .await?;

    Ok(bid_id)
}

/// End an auction on behalf of its host.
pub async fn end_auction(
    auction_id: &AuctionId,
    user_id: &UserId,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<responses::EndAuctionOutcome, StoreError> {
    let mut tx = pool.begin().await?;
    let auction = get_auction_for_update_tx(auction_id, &mut tx).await?;

    if auction.host_id != *user_id {
        return Err(StoreError::NotAuctionHost);
    }

    let outcome = finalize_auction_tx(&auction, &mut tx, time_source).await?;
    tx.commit().await?;
    Ok(outcome)
}

/// Conclude an auction: pick the winner, claim the `active -> ended`
/// transition, and credit the winner's counter. The auction row must be
/// locked in the caller's transaction.
///
/// Idempotent: on an already-ended auction the recorded outcome is echoed
/// back and nothing is written.
pub async fn finalize_auction_tx(
    auction: &Auction,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    time_source: &TimeSource,
) -> Result<responses::EndAuctionOutcome, StoreError> {
    if auction.status == AuctionStatus::Ended {
        return Ok(responses::EndAuctionOutcome {
            auction_id: auction.id,
            winner_id: auction.winner_id,
            winning_bid: auction.winning_bid.unwrap_or(auction.starting_price),
            already_ended: true,
        });
    }

    // Top bid wins; ties on amount resolve to the earliest placed.
    let top_bid = sqlx::query_as::<_, Bid>(
        "SELECT * FROM bids WHERE auction_id = $1
        ORDER BY amount DESC, placed_at ASC
        LIMIT 1",
    )
    .bind(auction.id)
    .fetch_optional(&mut **tx)
    .await?;

    let (winner_id, winning_bid) = match &top_bid {
        Some(bid) => (Some(bid.bidder_id), bid.amount),
        None => (None, auction.starting_price),
    };

    // The status check makes the transition single-shot even if a caller
    // reaches here without the row lock.
    let ended = sqlx::query(
        "UPDATE auctions SET
            status = 'ended',
            winner_id = $2,
            winning_bid = $3,
            ended_at = $4
        WHERE id = $1 AND status = 'active'",
    )
    .bind(auction.id)
    .bind(winner_id)
    .bind(winning_bid)
    .bind(time_source.now().to_sqlx())
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if ended == 1
        && let Some(winner) = winner_id
    {
        sqlx::query(
            "UPDATE users SET total_auctions_won = total_auctions_won + 1
            WHERE id = $1",
        )
        .bind(winner)
        .execute(&mut **tx)
        .await?;
    }

    Ok(responses::EndAuctionOutcome {
        auction_id: auction.id,
        winner_id,
        winning_bid,
        already_ended: false,
    })
}

/// Full auction view for the public details endpoint: the auction, its 50
/// most recent bids (newest first) with bidder identities, and the total
/// bid count.
pub async fn auction_details(
    auction_id: &AuctionId,
    pool: &PgPool,
) -> Result<responses::AuctionDetails, StoreError> {
    let auction = sqlx::query_as::<_, Auction>(
        "SELECT * FROM auctions WHERE id = $1",
    )
    .bind(auction_id)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => StoreError::AuctionNotFound,
        e => StoreError::Database(e),
    })?;

    let bids = sqlx::query_as::<_, Bid>(
        "SELECT * FROM bids WHERE auction_id = $1
        ORDER BY placed_at DESC
        LIMIT 50",
    )
    .bind(auction_id)
    .fetch_all(pool)
    .await?;

    let mut user_ids: Vec<UserId> =
        bids.iter().map(|b| b.bidder_id).collect();
    user_ids.push(auction.host_id);
    let identities = get_user_identities(&user_ids, pool).await?;

    let host = identities
        .get(&auction.host_id)
        .cloned()
        .ok_or(StoreError::UserNotFound)?;

    let total_bids = auction.bid_count;
    let bids = bids
        .into_iter()
        .map(|bid| {
            let bidder = identities
                .get(&bid.bidder_id)
                .cloned()
                .ok_or(StoreError::UserNotFound)?;
            Ok(bid.with_bidder(bidder))
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    Ok(responses::AuctionDetails {
        auction: auction.with_host(host),
        bids,
        total_bids,
    })
}

/// Newest-first auction listing, optionally filtered by status.
pub async fn list_auctions(
    filter: &requests::ListAuctions,
    pool: &PgPool,
) -> Result<Vec<responses::Auction>, StoreError> {
    let auctions = match filter.status {
        Some(status) => {
            sqlx::query_as::<_, Auction>(
                "SELECT * FROM auctions WHERE status = $1
                ORDER BY created_at DESC",
            )
            .bind(status)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Auction>(
                "SELECT * FROM auctions ORDER BY created_at DESC",
            )
            .fetch_all(pool)
            .await?
        }
    };

    let host_ids: Vec<UserId> = auctions.iter().map(|a| a.host_id).collect();
    let identities = get_user_identities(&host_ids, pool).await?;

    auctions
        .into_iter()
        .map(|auction| {
            let host = identities
                .get(&auction.host_id)
                .cloned()
                .ok_or(StoreError::UserNotFound)?;
            Ok(auction.with_host(host))
        })
        .collect()
}
