use actix_identity::Identity;
use actix_web::{HttpResponse, post, web};
use payloads::requests;
use sqlx::PgPool;

use crate::push::{PushClient, PushMessage};
use crate::routes::{APIError, get_user_id};
use crate::store::{self, StoreError};
use crate::telemetry::log_error;
use crate::time::TimeSource;

/// Send one push message to a user. The delivery attempt is logged whether
/// or not the transport accepts it.
#[tracing::instrument(skip(user, details, pool, push, time_source))]
#[post("/send_notification")]
pub async fn send_notification(
    user: Identity,
    details: web::Json<requests::SendNotification>,
    pool: web::Data<PgPool>,
    push: web::Data<PushClient>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let _ = get_user_id(&user)?;

    let recipient = store::read_user(&pool, &details.user_id).await?;
    let token = recipient
        .push_token
        .ok_or_else(|| APIError::from(StoreError::NoPushToken))?;

    let send_result = push
        .send(PushMessage {
            token,
            title: details.title.clone(),
            body: details.body.clone(),
            data: details.data.clone(),
        })
        .await;

    let (message_id, status) = match &send_result {
        Ok(message_id) => (message_id.as_str(), "sent"),
        Err(_) => ("", "failed"),
    };
    let notification_id = store::record_notification(
        &details.user_id,
        &details.title,
        &details.body,
        &details.data,
        message_id,
        status,
        &pool,
        &time_source,
    )
    .await?;

    let message_id = send_result.map_err(APIError::UnexpectedError)?;
    Ok(HttpResponse::Ok().json(payloads::responses::NotificationSent {
        notification_id,
        message_id,
    }))
}

/// Fan an auction update out to every participant. Sends are best-effort
/// and independent: one recipient failing (or having no token) does not
/// stop the rest, and each outcome is reported back.
#[tracing::instrument(skip(user, details, pool, push, time_source))]
#[post("/send_auction_update")]
pub async fn send_auction_update(
    user: Identity,
    details: web::Json<requests::SendAuctionUpdate>,
    pool: web::Data<PgPool>,
    push: web::Data<PushClient>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let _ = get_user_id(&user)?;

    // Surface a not-found before fanning out to nobody.
    let auction_details =
        store::auction_details(&details.auction_id, &pool).await?;
    let auction_id = auction_details.auction.auction_id;

    let participants =
        store::participants_with_tokens(&auction_id, &pool).await?;

    let data = serde_json::json!({
        "auction_id": auction_id,
        "kind": details.kind,
    });

    let mut recipients = Vec::with_capacity(participants.len());
    let mut notifications_sent = 0;
    for (user_id, token) in participants {
        let Some(token) = token else {
            // No device registered; skip silently like any other
            // per-recipient failure.
            recipients.push(payloads::responses::AuctionUpdateRecipient {
                user_id,
                message_id: None,
                error: Some("no push token".to_string()),
            });
            continue;
        };

        let outcome = push
            .send(PushMessage {
                token,
                title: "Auction Update".to_string(),
                body: details.message.clone(),
                data: data.clone(),
            })
            .await;

        let (message_id, status, error) = match outcome {
            Ok(message_id) => {
                notifications_sent += 1;
                (Some(message_id), "sent", None)
            }
            Err(e) => {
                tracing::warn!(%user_id, "Failed to send auction update: {e:#}");
                (None, "failed", Some(format!("{e:#}")))
            }
        };

        // Best-effort bookkeeping; a logging failure shouldn't fail the
        // fan-out.
        if let Err(e) = store::record_notification(
            &user_id,
            "Auction Update",
            &details.message,
            &data,
            message_id.as_deref().unwrap_or(""),
            status,
            &pool,
            &time_source,
        )
        .await
        {
            log_error(e);
        }

        recipients.push(payloads::responses::AuctionUpdateRecipient {
            user_id,
            message_id,
            error,
        });
    }

    Ok(HttpResponse::Ok().json(payloads::responses::AuctionUpdateSent {
        auction_id,
        notifications_sent,
        recipients,
    }))
}
