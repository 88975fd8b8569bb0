//! Database store module for the Bidstream API
//!
//! ## Design Decisions
//!
//! ### Time Source Dependency
//! - **Mocked time for testing**: Functions that need current time accept a
//!   `TimeSource` parameter instead of creating their own. This allows time
//!   to be mocked during tests.
//! - **Consistent time handling**: All time-sensitive operations use the
//!   same `TimeSource` instance passed from the application routes.
//!
//! ### Transactions
//! - **Bid acceptance is atomic**: the bid row, the auction's price and
//!   counters, the bidder's counter, and the participant row commit in one
//!   transaction with the auction row locked `FOR UPDATE`. Two concurrent
//!   bids on the same auction serialize; the loser re-checks against the
//!   winner's price.
//! - **Ending is a guarded transition**: `active -> ended` is claimed with
//!   a conditional update, so repeated end calls (host retries, the
//!   background sweep racing the host) never double-apply winner counters.
//!
//! ### Type Safety
//! - **Id newtypes with sqlx::Type**: ids can be bound in queries without
//!   accessing the inner UUID value (`.0`).
//! - **Database triggers**: `updated_at` fields are maintained by database
//!   triggers, so application code doesn't set them on updates.

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTs;
use jiff_sqlx::ToSqlx;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use payloads::{
    AuctionId, AuctionStatus, BidId, BidPaymentStatus, OptionalTimestamp,
    PaymentIntentId, PaymentStatus, Role, UserId, requests, responses,
};

use crate::time::TimeSource;

mod auction;
mod notification;
mod payment;

pub use auction::*;
pub use notification::*;
pub use payment::*;

/// A complete user row that stays in the backend.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub can_host: bool,
    pub wallet_balance: Decimal,
    pub total_bids: i32,
    pub total_auctions_won: i32,
    pub push_token: Option<String>,
    pub stripe_customer_id: Option<String>,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub deleted_at: Option<Timestamp>,
}

impl User {
    pub fn identity(&self) -> responses::UserIdentity {
        responses::UserIdentity {
            user_id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
        }
    }

    pub fn into_profile(self) -> responses::UserProfile {
        responses::UserProfile {
            user_id: self.id,
            username: self.username,
            email: self.email,
            display_name: self.display_name,
            role: self.role,
            can_host: self.can_host,
            wallet_balance: self.wallet_balance,
            total_bids: self.total_bids,
            total_auctions_won: self.total_auctions_won,
            has_push_token: self.push_token.is_some(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Auction {
    pub id: AuctionId,
    pub host_id: UserId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub images: Vec<String>,
    pub status: AuctionStatus,
    pub starting_price: Decimal,
    pub current_price: Decimal,
    pub duration_hours: i32,
    #[sqlx(try_from = "SqlxTs")]
    pub start_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub end_at: Timestamp,
    pub bid_count: i32,
    pub participant_count: i32,
    pub winner_id: Option<UserId>,
    pub winning_bid: Option<Decimal>,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub last_bid_at: Option<Timestamp>,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub ended_at: Option<Timestamp>,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
}

impl Auction {
    /// Helper to convert to the response type with the host identity.
    pub fn with_host(
        self,
        host: responses::UserIdentity,
    ) -> responses::Auction {
        responses::Auction {
            auction_id: self.id,
            title: self.title,
            description: self.description,
            category: self.category,
            images: self.images,
            host,
            status: self.status,
            starting_price: self.starting_price,
            current_price: self.current_price,
            duration_hours: self.duration_hours,
            start_at: self.start_at,
            end_at: self.end_at,
            bid_count: self.bid_count,
            participant_count: self.participant_count,
            winner_id: self.winner_id,
            winning_bid: self.winning_bid,
            last_bid_at: self.last_bid_at,
            ended_at: self.ended_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Bid {
    pub id: BidId,
    pub auction_id: AuctionId,
    pub bidder_id: UserId,
    pub amount: Decimal,
    pub payment_status: BidPaymentStatus,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub paid_at: Option<Timestamp>,
    #[sqlx(try_from = "SqlxTs")]
    pub placed_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
}

impl Bid {
    pub fn with_bidder(self, bidder: responses::UserIdentity) -> responses::Bid {
        responses::Bid {
            bid_id: self.id,
            auction_id: self.auction_id,
            bidder,
            amount: self.amount,
            payment_status: self.payment_status,
            paid_at: self.paid_at,
            placed_at: self.placed_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Payment {
    pub payment_intent_id: PaymentIntentId,
    pub user_id: UserId,
    pub auction_id: AuctionId,
    pub bid_id: BidId,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Field too long")]
    FieldTooLong,
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("Username or email already taken")]
    NotUnique(#[source] sqlx::Error),
    #[error("User not found")]
    UserNotFound,
    #[error("Auction not found")]
    AuctionNotFound,
    #[error("Bid not found")]
    BidNotFound,
    #[error("Payment not found")]
    PaymentNotFound,
    #[error("User cannot host auctions")]
    CannotHost,
    #[error("Only the auction host can end the auction")]
    NotAuctionHost,
    #[error("Payment belongs to a different user")]
    NotPaymentOwner,
    #[error("Auction is not active")]
    AuctionNotActive,
    #[error("Auction has ended")]
    AuctionEnded,
    #[error("Bid must be higher than current price ({current})")]
    BidTooLow { current: Decimal },
    #[error("Insufficient wallet balance")]
    InsufficientBalance,
    #[error("User has no push token registered")]
    NoPushToken,
    #[error("Database error")]
    Database(#[source] sqlx::Error),
    #[error("Unexpected error")]
    UnexpectedError(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.is_unique_violation()
        {
            return StoreError::NotUnique(e);
        }
        StoreError::Database(e)
    }
}

pub async fn create_user(
    pool: &PgPool,
    username: &str,
    email: &str,
    display_name: Option<&str>,
    password_hash: &str,
    time_source: &TimeSource,
) -> Result<User, StoreError> {
    if let Some(reason) =
        requests::validate_username(username).error_message()
    {
        return Err(StoreError::InvalidInput(reason));
    }
    if email.len() > requests::EMAIL_MAX_LEN {
        return Err(StoreError::FieldTooLong);
    }
    if display_name.is_some_and(|n| n.len() > requests::DISPLAY_NAME_MAX_LEN)
    {
        return Err(StoreError::FieldTooLong);
    }
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (
                username,
                email,
                display_name,
                password_hash,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *;",
    )
    .bind(username)
    .bind(email)
    .bind(display_name)
    .bind(password_hash)
    .bind(time_source.now().to_sqlx())
    .fetch_one(pool)
    .await?;
    Ok(user)
}

pub async fn read_user(pool: &PgPool, id: &UserId) -> Result<User, StoreError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1;")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => StoreError::UserNotFound,
            e => StoreError::Database(e),
        })
}

/// Apply present fields of a profile update and return the updated row.
/// `push_token` is also how a device registers itself for notifications.
pub async fn update_profile(
    user_id: &UserId,
    details: &requests::UpdateProfile,
    pool: &PgPool,
) -> Result<User, StoreError> {
    if details
        .display_name
        .as_ref()
        .is_some_and(|n| n.len() > requests::DISPLAY_NAME_MAX_LEN)
    {
        return Err(StoreError::FieldTooLong);
    }
    sqlx::query_as::<_, User>(
        "UPDATE users SET
            display_name = COALESCE($2, display_name),
            push_token = COALESCE($3, push_token)
        WHERE id = $1
        RETURNING *;",
    )
    .bind(user_id)
    .bind(&details.display_name)
    .bind(&details.push_token)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => StoreError::UserNotFound,
        e => StoreError::Database(e),
    })
}

/// Batch-fetch display identities for a set of users.
pub async fn get_user_identities(
    user_ids: &[UserId],
    pool: &PgPool,
) -> Result<std::collections::HashMap<UserId, responses::UserIdentity>, StoreError>
{
    let identities = sqlx::query_as::<_, responses::UserIdentity>(
        "SELECT id AS user_id, username, display_name
        FROM users WHERE id = ANY($1)",
    )
    .bind(user_ids)
    .fetch_all(pool)
    .await?;

    Ok(identities.into_iter().map(|u| (u.user_id, u)).collect())
}
