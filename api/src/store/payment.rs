use super::*;
use jiff_sqlx::ToSqlx;
use payloads::{AuctionId, BidId, PaymentStatus, UserId};
use sqlx::PgPool;

use crate::payments::{GatewayIntent, from_minor_units};
use crate::time::TimeSource;

/// Persist a local record mirroring a freshly created gateway intent.
pub async fn create_payment(
    intent: &GatewayIntent,
    user_id: &UserId,
    auction_id: &AuctionId,
    bid_id: &BidId,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<Payment, StoreError> {
    let payment = sqlx::query_as::<_, Payment>(
        "INSERT INTO payments (
            payment_intent_id,
            user_id,
            auction_id,
            bid_id,
            amount,
            currency,
            created_at,
            updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
        RETURNING *",
    )
    .bind(&intent.id)
    .bind(user_id)
    .bind(auction_id)
    .bind(bid_id)
    .bind(from_minor_units(intent.amount_minor))
    .bind(&intent.currency)
    .bind(time_source.now().to_sqlx())
    .fetch_one(pool)
    .await?;
    Ok(payment)
}

/// Apply a gateway-confirmed payment: mark the payment record succeeded,
/// mark the linked bid paid, and credit the payer's wallet by the intent
/// amount. Runs in one transaction keyed on the locked payment row, and is
/// a no-op if the payment was already applied, so a client retrying its
/// confirm call cannot double-credit the wallet.
pub async fn apply_successful_payment(
    intent: &GatewayIntent,
    user_id: &UserId,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    let payment = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE payment_intent_id = $1 FOR UPDATE",
    )
    .bind(&intent.id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => StoreError::PaymentNotFound,
        e => StoreError::Database(e),
    })?;

    if payment.user_id != *user_id {
        return Err(StoreError::NotPaymentOwner);
    }

    if payment.status == PaymentStatus::Succeeded {
        return Ok(());
    }

    sqlx::query(
        "UPDATE payments SET status = 'succeeded'
        WHERE payment_intent_id = $1",
    )
    .bind(&intent.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE bids SET payment_status = 'paid', paid_at = $2
        WHERE id = $1",
    )
    .bind(payment.bid_id)
    .bind(time_source.now().to_sqlx())
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE users SET wallet_balance = wallet_balance + $2
        WHERE id = $1",
    )
    .bind(payment.user_id)
    .bind(from_minor_units(intent.amount_minor))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
