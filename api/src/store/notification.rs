use super::*;
use jiff_sqlx::ToSqlx;
use payloads::{AuctionId, NotificationId, UserId};
use sqlx::PgPool;
use sqlx::types::Json;

use crate::time::TimeSource;

/// Log an attempted notification delivery. Rows are written for failures
/// too, so the log is a complete delivery history.
pub async fn record_notification(
    user_id: &UserId,
    title: &str,
    body: &str,
    data: &serde_json::Value,
    message_id: &str,
    status: &str,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<NotificationId, StoreError> {
    let notification_id = sqlx::query_scalar::<_, NotificationId>(
        "INSERT INTO notifications (
            user_id,
            title,
            body,
            data,
            message_id,
            status,
            created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id",
    )
    .bind(user_id)
    .bind(title)
    .bind(body)
    .bind(Json(data))
    .bind(message_id)
    .bind(status)
    .bind(time_source.now().to_sqlx())
    .fetch_one(pool)
    .await?;
    Ok(notification_id)
}

/// Every participant of an auction with their registered push token, in
/// join order. Participants without a token are included so fan-out can
/// report them skipped.
pub async fn participants_with_tokens(
    auction_id: &AuctionId,
    pool: &PgPool,
) -> Result<Vec<(UserId, Option<String>)>, StoreError> {
    let rows = sqlx::query_as::<_, (UserId, Option<String>)>(
        "SELECT u.id, u.push_token
        FROM auction_participants ap
        JOIN users u ON ap.user_id = u.id
        WHERE ap.auction_id = $1
        ORDER BY ap.joined_at",
    )
    .bind(auction_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
