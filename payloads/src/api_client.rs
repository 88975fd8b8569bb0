use crate::{AuctionId, requests, responses};
use reqwest::StatusCode;
use serde::Serialize;

type ReqwestResult = Result<reqwest::Response, reqwest::Error>;

/// An API client for interfacing with the backend.
pub struct APIClient {
    pub address: String,
    pub inner_client: reqwest::Client,
}

/// Helper methods for http actions
impl APIClient {
    fn format_url(&self, path: &str) -> String {
        format!("{}/api/{path}", &self.address)
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> ReqwestResult {
        self.inner_client
            .post(self.format_url(path))
            .json(body)
            .send()
            .await
    }

    async fn empty_post(&self, path: &str) -> ReqwestResult {
        self.inner_client.post(self.format_url(path)).send().await
    }

    async fn empty_get(&self, path: &str) -> ReqwestResult {
        self.inner_client.get(self.format_url(path)).send().await
    }
}

/// Methods on the backend API
impl APIClient {
    pub async fn health_check(&self) -> Result<(), ClientError> {
        let response = self.empty_get("health_check").await?;
        ok_empty(response).await
    }

    pub async fn create_account(
        &self,
        details: &requests::CreateAccount,
    ) -> Result<(), ClientError> {
        let response = self.post("create_account", details).await?;
        ok_empty(response).await
    }

    pub async fn login(
        &self,
        details: &requests::LoginCredentials,
    ) -> Result<(), ClientError> {
        let response = self.post("login", &details).await?;
        ok_empty(response).await
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let response = self.empty_post("logout").await?;
        ok_empty(response).await
    }

    /// Check if the user is logged in.
    pub async fn login_check(&self) -> Result<bool, ClientError> {
        let response = self.empty_post("login_check").await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::UNAUTHORIZED => Ok(false),
            _ => Err(ClientError::APIError(
                response.status(),
                response.text().await?,
            )),
        }
    }

    /// Get the current user's profile information.
    pub async fn user_profile(
        &self,
    ) -> Result<responses::UserProfile, ClientError> {
        let response = self.empty_get("user_profile").await?;
        ok_body(response).await
    }

    /// Update display name and/or register a push token.
    pub async fn update_profile(
        &self,
        details: &requests::UpdateProfile,
    ) -> Result<responses::UserProfile, ClientError> {
        let response = self.post("update_profile", details).await?;
        ok_body(response).await
    }

    pub async fn create_auction(
        &self,
        details: &requests::CreateAuction,
    ) -> Result<AuctionId, ClientError> {
        let response = self.post("create_auction", details).await?;
        ok_body(response).await
    }

    pub async fn place_bid(
        &self,
        details: &requests::PlaceBid,
    ) -> Result<crate::BidId, ClientError> {
        let response = self.post("place_bid", details).await?;
        ok_body(response).await
    }

    pub async fn end_auction(
        &self,
        details: &requests::EndAuction,
    ) -> Result<responses::EndAuctionOutcome, ClientError> {
        let response = self.post("end_auction", details).await?;
        ok_body(response).await
    }

    /// Public endpoint; does not require a session.
    pub async fn auction_details(
        &self,
        auction_id: &AuctionId,
    ) -> Result<responses::AuctionDetails, ClientError> {
        let response = self.post("auction_details", auction_id).await?;
        ok_body(response).await
    }

    pub async fn list_auctions(
        &self,
        filter: &requests::ListAuctions,
    ) -> Result<Vec<responses::Auction>, ClientError> {
        let response = self.post("auctions", filter).await?;
        ok_body(response).await
    }

    pub async fn create_payment_intent(
        &self,
        details: &requests::CreatePaymentIntent,
    ) -> Result<responses::PaymentIntentCreated, ClientError> {
        let response = self.post("create_payment_intent", details).await?;
        ok_body(response).await
    }

    pub async fn confirm_payment(
        &self,
        details: &requests::ConfirmPayment,
    ) -> Result<responses::PaymentConfirmation, ClientError> {
        let response = self.post("confirm_payment", details).await?;
        ok_body(response).await
    }

    pub async fn send_notification(
        &self,
        details: &requests::SendNotification,
    ) -> Result<responses::NotificationSent, ClientError> {
        let response = self.post("send_notification", details).await?;
        ok_body(response).await
    }

    pub async fn send_auction_update(
        &self,
        details: &requests::SendAuctionUpdate,
    ) -> Result<responses::AuctionUpdateSent, ClientError> {
        let response = self.post("send_auction_update", details).await?;
        ok_body(response).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An unhandled API error to display, containing response text.
    #[error("{1}")]
    APIError(StatusCode, String),
    #[error("Network error. Please check your connection.")]
    Network(#[from] reqwest::Error),
}

/// Deserialize a successful request into the desired type, or return an
/// appropriate error.
pub async fn ok_body<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(response.json::<T>().await?)
}

/// Check that an empty response is OK, returning a ClientError if not.
pub async fn ok_empty(response: reqwest::Response) -> Result<(), ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(())
}
