use actix_identity::Identity;
use actix_web::{HttpResponse, post, web};
use payloads::requests;
use sqlx::PgPool;

use crate::routes::{APIError, get_user_id};
use crate::{store, time::TimeSource};

#[tracing::instrument(skip(user, details, pool, time_source), ret)]
#[post("/create_auction")]
pub async fn create_auction(
    user: Identity,
    details: web::Json<requests::CreateAuction>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&user)?;
    let auction_id =
        store::create_auction(&details, &user_id, &pool, &time_source)
            .await?;
    Ok(HttpResponse::Ok().json(auction_id))
}

#[tracing::instrument(skip(user, pool, time_source), ret)]
#[post("/place_bid")]
pub async fn place_bid(
    user: Identity,
    details: web::Json<requests::PlaceBid>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&user)?;
    let bid_id = store::place_bid(
        &details.auction_id,
        details.amount,
        &user_id,
        &pool,
        &time_source,
    )
    .await?;
    Ok(HttpResponse::Ok().json(bid_id))
}

#[tracing::instrument(skip(user, pool, time_source), ret)]
#[post("/end_auction")]
pub async fn end_auction(
    user: Identity,
    details: web::Json<requests::EndAuction>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&user)?;
    let outcome = store::end_auction(
        &details.auction_id,
        &user_id,
        &pool,
        &time_source,
    )
    .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Public: auction pages are viewable without a session.
#[tracing::instrument(skip(pool))]
#[post("/auction_details")]
pub async fn auction_details(
    auction_id: web::Json<payloads::AuctionId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let details = store::auction_details(&auction_id, &pool).await?;
    Ok(HttpResponse::Ok().json(details))
}

#[tracing::instrument(skip(user, pool))]
#[post("/auctions")]
pub async fn list_auctions(
    user: Identity,
    filter: web::Json<requests::ListAuctions>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let _ = get_user_id(&user)?;
    let auctions = store::list_auctions(&filter, &pool).await?;
    Ok(HttpResponse::Ok().json(auctions))
}
