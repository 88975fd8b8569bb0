//! Background finalization of expired auctions.
//!
//! Auctions carry their end time from creation; the host can end one early
//! through the API, but an auction nobody ends still has to conclude. The
//! scheduler ticks on an interval and pushes every `active` auction whose
//! end time has passed through the same guarded end transition the host
//! path uses, so the two can race safely.
//!
//! Expired auctions are claimed one at a time with `FOR UPDATE SKIP
//! LOCKED`, which also keeps multiple server instances from fighting over
//! the same rows.

use sqlx::PgPool;
use std::time::Duration;
use tokio::time;

use crate::{store, telemetry::log_error, time::TimeSource};

pub struct Scheduler {
    pool: PgPool,
    time_source: TimeSource,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(
        pool: PgPool,
        time_source: TimeSource,
        tick_interval: Duration,
    ) -> Self {
        Self {
            pool,
            time_source,
            tick_interval,
        }
    }

    pub async fn run(&self) {
        let mut interval = time::interval(self.tick_interval);
        loop {
            interval.tick().await;
            let _ = sweep_tick(&self.pool, &self.time_source)
                .await
                .map_err(log_error);
        }
    }
}

/// Finalize every currently expired auction, one claim per transaction.
#[tracing::instrument(skip(pool, time_source))]
pub async fn sweep_tick(
    pool: &PgPool,
    time_source: &TimeSource,
) -> anyhow::Result<()> {
    loop {
        match finalize_next_expired(pool, time_source).await {
            Ok(Some(auction_id)) => {
                tracing::info!(%auction_id, "Finalized expired auction");
            }
            Ok(None) => break, // nothing left to finalize
            Err(e) => {
                // Log and stop this tick; the next tick retries.
                tracing::error!("Failed to finalize auction: {:#}", e);
                break;
            }
        }
    }
    Ok(())
}

/// Claim and finalize one expired auction. Returns the auction id, or
/// `None` when no expired auction is claimable.
async fn finalize_next_expired(
    pool: &PgPool,
    time_source: &TimeSource,
) -> anyhow::Result<Option<payloads::AuctionId>> {
    use jiff_sqlx::ToSqlx;

    let mut tx = pool.begin().await?;

    let auction = sqlx::query_as::<_, store::Auction>(
        "SELECT * FROM auctions
        WHERE status = 'active' AND end_at <= $1
        ORDER BY end_at
        FOR UPDATE SKIP LOCKED
        LIMIT 1",
    )
    .bind(time_source.now().to_sqlx())
    .fetch_optional(&mut *tx)
    .await?;

    let Some(auction) = auction else {
        return Ok(None);
    };

    let auction_id = auction.id;
    store::finalize_auction_tx(&auction, &mut tx, time_source).await?;
    tx.commit().await?;

    Ok(Some(auction_id))
}
