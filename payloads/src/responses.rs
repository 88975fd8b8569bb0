use crate::{
    AuctionId, AuctionStatus, BidId, BidPaymentStatus, NotificationId,
    PaymentIntentId, Role, UserId,
};
use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// User identification bundled with display information.
///
/// This is the standard way to reference users in API responses. Clients
/// should display `display_name` (if present) or `username`, but use
/// `user_id` for any API calls that reference the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct UserIdentity {
    pub user_id: UserId,
    pub username: String,
    pub display_name: Option<String>,
}

/// The calling user's own profile, including wallet state and counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub can_host: bool,
    pub wallet_balance: Decimal,
    pub total_bids: i32,
    pub total_auctions_won: i32,
    pub has_push_token: bool,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub auction_id: AuctionId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub images: Vec<String>,
    pub host: UserIdentity,
    pub status: AuctionStatus,
    pub starting_price: Decimal,
    pub current_price: Decimal,
    pub duration_hours: i32,
    pub start_at: Timestamp,
    pub end_at: Timestamp,
    pub bid_count: i32,
    pub participant_count: i32,
    pub winner_id: Option<UserId>,
    pub winning_bid: Option<Decimal>,
    pub last_bid_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub bid_id: BidId,
    pub auction_id: AuctionId,
    pub bidder: UserIdentity,
    pub amount: Decimal,
    pub payment_status: BidPaymentStatus,
    pub paid_at: Option<Timestamp>,
    pub placed_at: Timestamp,
}

/// Full auction view: the auction, its recent bids (newest first, capped at
/// 50), and the true total bid count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionDetails {
    pub auction: Auction,
    pub bids: Vec<Bid>,
    pub total_bids: i32,
}

/// Outcome of ending an auction. `winning_bid` falls back to the starting
/// price when no bids were placed, in which case `winner_id` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndAuctionOutcome {
    pub auction_id: AuctionId,
    pub winner_id: Option<UserId>,
    pub winning_bid: Decimal,
    /// False when this call performed the transition; true when the auction
    /// had already ended and the recorded outcome is being echoed back.
    pub already_ended: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntentCreated {
    pub payment_intent_id: PaymentIntentId,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub payment_intent_id: PaymentIntentId,
    /// Gateway-reported intent status, verbatim.
    pub status: String,
    /// True when the intent succeeded and the wallet credit was applied.
    pub applied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSent {
    pub notification_id: NotificationId,
    pub message_id: String,
}

/// Per-recipient outcome of an auction-update fan-out. Sends are
/// best-effort; a failed recipient does not affect the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionUpdateRecipient {
    pub user_id: UserId,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionUpdateSent {
    pub auction_id: AuctionId,
    pub notifications_sent: usize,
    pub recipients: Vec<AuctionUpdateRecipient>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessMessage {
    pub message: String,
}
