use actix_identity::Identity;
use actix_web::{HttpRequest, HttpResponse, post, web};
use payloads::requests;
use sqlx::PgPool;
use std::collections::HashMap;

use crate::payments::{PaymentGateway, to_minor_units};
use crate::routes::{APIError, get_user_id};
use crate::{store, time::TimeSource};

/// Create a gateway payment intent for a bid and mirror it locally. The
/// returned client secret is what the client hands to the gateway's
/// payment sheet.
#[tracing::instrument(skip(user, details, pool, payments, time_source))]
#[post("/create_payment_intent")]
pub async fn create_payment_intent(
    user: Identity,
    details: web::Json<requests::CreatePaymentIntent>,
    pool: web::Data<PgPool>,
    payments: web::Data<PaymentGateway>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&user)?;

    if details.amount <= rust_decimal::Decimal::ZERO {
        return Err(APIError::BadRequest(anyhow::anyhow!(
            "Amount must be positive"
        )));
    }
    let amount_minor =
        to_minor_units(details.amount).map_err(APIError::BadRequest)?;
    let currency = details.currency.as_deref().unwrap_or("usd");

    // The stored gateway customer id ties the intent to the caller's saved
    // payment methods, when they have any.
    let payer = store::read_user(&pool, &user_id).await?;

    let metadata = HashMap::from([
        ("user_id".to_string(), user_id.to_string()),
        ("auction_id".to_string(), details.auction_id.to_string()),
        ("bid_id".to_string(), details.bid_id.to_string()),
        ("type".to_string(), "auction_bid".to_string()),
    ]);

    let intent = payments
        .create_intent(
            amount_minor,
            currency,
            payer.stripe_customer_id.as_deref(),
            metadata,
        )
        .await
        .map_err(APIError::UnexpectedError)?;

    store::create_payment(
        &intent,
        &user_id,
        &details.auction_id,
        &details.bid_id,
        &pool,
        &time_source,
    )
    .await?;

    Ok(HttpResponse::Ok().json(payloads::responses::PaymentIntentCreated {
        payment_intent_id: intent.id,
        client_secret: intent.client_secret,
    }))
}

/// Re-fetch the intent from the gateway and, if it succeeded, apply it:
/// payment record marked succeeded, linked bid marked paid, caller's wallet
/// credited. Safe to retry; an already-applied payment is a no-op.
#[tracing::instrument(skip(user, details, pool, payments, time_source))]
#[post("/confirm_payment")]
pub async fn confirm_payment(
    user: Identity,
    details: web::Json<requests::ConfirmPayment>,
    pool: web::Data<PgPool>,
    payments: web::Data<PaymentGateway>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&user)?;

    let intent = payments
        .retrieve_intent(&details.payment_intent_id)
        .await
        .map_err(APIError::UnexpectedError)?;

    let applied = if intent.succeeded() {
        store::apply_successful_payment(
            &intent,
            &user_id,
            &pool,
            &time_source,
        )
        .await?;
        true
    } else {
        false
    };

    Ok(HttpResponse::Ok().json(payloads::responses::PaymentConfirmation {
        payment_intent_id: intent.id,
        status: intent.status,
        applied,
    }))
}

/// Gateway webhook endpoint. Signature-verified; events are logged for
/// observability but state changes flow through `confirm_payment`.
#[tracing::instrument(skip(request, body, payments))]
#[post("/payments/webhook")]
pub async fn payment_webhook(
    request: HttpRequest,
    body: web::Bytes,
    payments: web::Data<PaymentGateway>,
) -> Result<HttpResponse, APIError> {
    let signature = request
        .headers()
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            APIError::BadRequest(anyhow::anyhow!(
                "Missing Stripe-Signature header"
            ))
        })?;

    let payload = std::str::from_utf8(&body).map_err(|e| {
        APIError::BadRequest(
            anyhow::Error::from(e).context("Webhook body is not UTF-8"),
        )
    })?;

    let event = payments
        .verify_webhook(payload, signature)
        .map_err(APIError::BadRequest)?;

    match event.kind.as_str() {
        "payment_intent.succeeded" => {
            tracing::info!(intent = ?event.intent_id, "Payment intent succeeded");
        }
        "payment_intent.payment_failed" => {
            tracing::warn!(intent = ?event.intent_id, "Payment intent failed");
        }
        other => {
            tracing::info!(kind = other, "Unhandled gateway event");
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "received": true })))
}
