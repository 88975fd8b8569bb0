pub mod auction;
pub mod login;
pub mod notification;
pub mod payment;

use actix_identity::Identity;
use actix_web::{
    HttpResponse, Responder, ResponseError, body::BoxBody,
    dev::HttpServiceFactory, get, web,
};
use uuid::Uuid;

use crate::store::StoreError;

pub fn api_services() -> impl HttpServiceFactory {
    web::scope("/api")
        .service(health_check)
        .service(login::login)
        .service(login::login_check)
        .service(login::logout)
        .service(login::create_account)
        .service(login::user_profile)
        .service(login::update_profile)
        .service(auction::create_auction)
        .service(auction::place_bid)
        .service(auction::end_auction)
        .service(auction::auction_details)
        .service(auction::list_auctions)
        .service(payment::create_payment_intent)
        .service(payment::confirm_payment)
        .service(payment::payment_webhook)
        .service(notification::send_notification)
        .service(notification::send_auction_update)
}

#[get("/health_check")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("healthy")
}

/// Error taxonomy surfaced to callers. Mirrors the five failure categories
/// of the public contract: unauthenticated, not-found, permission-denied,
/// failed-precondition, and internal, plus bad-request for malformed input.
#[derive(Debug, thiserror::Error)]
pub enum APIError {
    #[error("Authentication failed")]
    AuthError(#[source] anyhow::Error),
    #[error("Bad request")]
    BadRequest(#[source] anyhow::Error),
    #[error("Not found")]
    NotFound(#[source] anyhow::Error),
    #[error("Permission denied")]
    PermissionDenied(#[source] anyhow::Error),
    #[error("Failed precondition")]
    FailedPrecondition(#[source] anyhow::Error),
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl ResponseError for APIError {
    fn error_response(&self) -> HttpResponse<BoxBody> {
        match self {
            Self::AuthError(e) => {
                HttpResponse::Unauthorized().body(format!("{self}: {e}"))
            }
            Self::BadRequest(e) => {
                HttpResponse::BadRequest().body(format!("{self}: {e}"))
            }
            Self::NotFound(e) => {
                HttpResponse::NotFound().body(format!("{self}: {e}"))
            }
            Self::PermissionDenied(e) => {
                HttpResponse::Forbidden().body(format!("{self}: {e}"))
            }
            Self::FailedPrecondition(e) => {
                HttpResponse::Conflict().body(format!("{self}: {e}"))
            }
            Self::UnexpectedError(_) => {
                HttpResponse::InternalServerError().body(self.to_string())
            }
        }
    }
}

impl From<StoreError> for APIError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(_) => APIError::UnexpectedError(e.into()),
            StoreError::UnexpectedError(_) => {
                APIError::UnexpectedError(e.into())
            }
            StoreError::UserNotFound => APIError::NotFound(e.into()),
            StoreError::AuctionNotFound => APIError::NotFound(e.into()),
            StoreError::BidNotFound => APIError::NotFound(e.into()),
            StoreError::PaymentNotFound => APIError::NotFound(e.into()),
            StoreError::CannotHost => APIError::PermissionDenied(e.into()),
            StoreError::NotAuctionHost => APIError::PermissionDenied(e.into()),
            StoreError::NotPaymentOwner => {
                APIError::PermissionDenied(e.into())
            }
            StoreError::AuctionNotActive => {
                APIError::FailedPrecondition(e.into())
            }
            StoreError::AuctionEnded => APIError::FailedPrecondition(e.into()),
            StoreError::BidTooLow { .. } => {
                APIError::FailedPrecondition(e.into())
            }
            StoreError::InsufficientBalance => {
                APIError::FailedPrecondition(e.into())
            }
            StoreError::NoPushToken => APIError::FailedPrecondition(e.into()),
            _ => APIError::BadRequest(e.into()),
        }
    }
}

fn get_user_id(user: &Identity) -> Result<payloads::UserId, APIError> {
    let id_str = user.id().map_err(|e| {
        APIError::AuthError(
            anyhow::Error::from(e).context("Invalid login session"),
        )
    })?;
    // special case: since this is used in so many routes, the user_id is
    // recorded here, but attaches to the span for the api route itself
    tracing::Span::current()
        .record("user_id", tracing::field::display(&id_str));
    Ok(payloads::UserId(
        Uuid::parse_str(&id_str).map_err(anyhow::Error::from)?,
    ))
}
