use crate::{AuctionId, AuctionStatus, BidId, PaymentIntentId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const EMAIL_MAX_LEN: usize = 255;
pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;
pub const DISPLAY_NAME_MAX_LEN: usize = 255;
pub const AUCTION_TITLE_MAX_LEN: usize = 200;
pub const AUCTION_DESCRIPTION_MAX_LEN: usize = 5000;
pub const AUCTION_CATEGORY_MAX_LEN: usize = 100;
pub const AUCTION_MAX_IMAGES: usize = 10;
pub const AUCTION_MAX_DURATION_HOURS: i32 = 24 * 14;

/// Validation result for usernames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsernameValidation {
    Valid,
    TooShort,
    TooLong,
    InvalidCharacters,
    MustStartWithLetter,
}

impl UsernameValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            Self::Valid => None,
            Self::TooShort => Some("Username must be at least 3 characters"),
            Self::TooLong => Some("Username must be at most 30 characters"),
            Self::InvalidCharacters => Some(
                "Username can only contain letters, numbers, and underscores",
            ),
            Self::MustStartWithLetter => {
                Some("Username must start with a letter")
            }
        }
    }
}

/// Validate a username.
///
/// Rules:
/// - 3-30 characters
/// - ASCII letters, numbers, and underscores only
/// - Must start with a letter
pub fn validate_username(username: &str) -> UsernameValidation {
    if username.len() < USERNAME_MIN_LEN {
        return UsernameValidation::TooShort;
    }
    if username.len() > USERNAME_MAX_LEN {
        return UsernameValidation::TooLong;
    }

    let mut chars = username.chars();

    if let Some(first) = chars.next()
        && !first.is_ascii_alphabetic()
    {
        return UsernameValidation::MustStartWithLetter;
    }

    for c in chars {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return UsernameValidation::InvalidCharacters;
        }
    }

    UsernameValidation::Valid
}

/// Validation result for auction creation details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuctionValidation {
    Valid,
    TitleEmpty,
    TitleTooLong,
    DescriptionTooLong,
    CategoryTooLong,
    StartingPriceNegative,
    DurationOutOfRange,
    TooManyImages,
}

impl AuctionValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            Self::Valid => None,
            Self::TitleEmpty => Some("Title must not be empty"),
            Self::TitleTooLong => Some("Title must be at most 200 characters"),
            Self::DescriptionTooLong => {
                Some("Description must be at most 5000 characters")
            }
            Self::CategoryTooLong => {
                Some("Category must be at most 100 characters")
            }
            Self::StartingPriceNegative => {
                Some("Starting price must not be negative")
            }
            Self::DurationOutOfRange => {
                Some("Duration must be between 1 hour and 14 days")
            }
            Self::TooManyImages => Some("At most 10 images are allowed"),
        }
    }
}

pub fn validate_auction(details: &CreateAuction) -> AuctionValidation {
    if details.title.trim().is_empty() {
        return AuctionValidation::TitleEmpty;
    }
    if details.title.len() > AUCTION_TITLE_MAX_LEN {
        return AuctionValidation::TitleTooLong;
    }
    if details.description.len() > AUCTION_DESCRIPTION_MAX_LEN {
        return AuctionValidation::DescriptionTooLong;
    }
    if details.category.len() > AUCTION_CATEGORY_MAX_LEN {
        return AuctionValidation::CategoryTooLong;
    }
    if details.starting_price < Decimal::ZERO {
        return AuctionValidation::StartingPriceNegative;
    }
    if details.duration_hours < 1
        || details.duration_hours > AUCTION_MAX_DURATION_HOURS
    {
        return AuctionValidation::DurationOutOfRange;
    }
    if details.images.len() > AUCTION_MAX_IMAGES {
        return AuctionValidation::TooManyImages;
    }
    AuctionValidation::Valid
}

#[derive(Serialize, Deserialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct CreateAccount {
    pub email: String,
    pub username: String,
    pub password: String,
    pub display_name: Option<String>,
}

/// Fields are applied when present; `push_token` is also how a device
/// registers itself for notifications.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub display_name: Option<String>,
    pub push_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAuction {
    pub title: String,
    pub description: String,
    pub starting_price: Decimal,
    pub duration_hours: i32,
    pub category: String,
    pub images: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaceBid {
    pub auction_id: AuctionId,
    pub amount: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndAuction {
    pub auction_id: AuctionId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListAuctions {
    pub status: Option<AuctionStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePaymentIntent {
    pub amount: Decimal,
    /// ISO currency code, lowercase ("usd"). Defaults to usd when omitted.
    pub currency: Option<String>,
    pub auction_id: AuctionId,
    pub bid_id: BidId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmPayment {
    pub payment_intent_id: PaymentIntentId,
    pub auction_id: AuctionId,
    pub bid_id: BidId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendNotification {
    pub user_id: UserId,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendAuctionUpdate {
    pub auction_id: AuctionId,
    /// Short machine-readable kind ("new_bid", "ending_soon", ...).
    pub kind: String,
    pub message: String,
}
