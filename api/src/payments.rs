//! Payment gateway client.
//!
//! Wraps the Stripe API behind a small surface the routes use: create an
//! intent, re-fetch an intent, verify a webhook signature. The `mock-stripe`
//! feature swaps in an in-memory intent table whose lifecycle tests can
//! drive directly.

use anyhow::Result;
#[cfg(not(feature = "mock-stripe"))]
use anyhow::Context;
use payloads::PaymentIntentId;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
#[cfg(not(feature = "mock-stripe"))]
use secrecy::ExposeSecret;
#[cfg(not(feature = "mock-stripe"))]
use secrecy::SecretBox;
use std::collections::HashMap;
#[cfg(feature = "mock-stripe")]
use std::sync::{Arc, Mutex};

use crate::Config;

pub const INTENT_STATUS_REQUIRES_PAYMENT_METHOD: &str =
    "requires_payment_method";
pub const INTENT_STATUS_SUCCEEDED: &str = "succeeded";

/// Gateway-agnostic view of a payment intent.
#[derive(Debug, Clone)]
pub struct GatewayIntent {
    pub id: PaymentIntentId,
    pub client_secret: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
}

impl GatewayIntent {
    pub fn succeeded(&self) -> bool {
        self.status == INTENT_STATUS_SUCCEEDED
    }
}

/// A verified webhook event from the gateway.
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    pub kind: String,
    pub intent_id: Option<PaymentIntentId>,
}

/// Convert a decimal currency amount to the gateway's minor units (cents).
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| anyhow::anyhow!("Amount out of range: {amount}"))
}

/// Convert the gateway's minor units back to a decimal amount.
pub fn from_minor_units(amount_minor: i64) -> Decimal {
    Decimal::new(amount_minor, 2)
}

#[cfg_attr(feature = "mock-stripe", derive(Clone, Default))]
pub struct PaymentGateway {
    #[cfg(not(feature = "mock-stripe"))]
    client: stripe::Client,
    #[cfg(not(feature = "mock-stripe"))]
    webhook_secret: SecretBox<String>,
    #[cfg(feature = "mock-stripe")]
    state: Arc<Mutex<MockGatewayState>>,
}

#[cfg(not(feature = "mock-stripe"))]
impl PaymentGateway {
    pub fn new(config: &Config) -> Self {
        let client =
            stripe::Client::new(config.stripe_secret_key.expose_secret());
        Self {
            client,
            webhook_secret: SecretBox::new(Box::new(
                config.stripe_webhook_secret.expose_secret().clone(),
            )),
        }
    }

    #[tracing::instrument(skip(self, metadata))]
    pub async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        customer: Option<&str>,
        metadata: HashMap<String, String>,
    ) -> Result<GatewayIntent> {
        let mut params =
            stripe::CreatePaymentIntent::new(amount_minor, currency_code(currency)?);
        params.customer = customer
            .map(|c| c.parse::<stripe::CustomerId>())
            .transpose()
            .context("Invalid gateway customer id")?;
        params.metadata = Some(metadata);
        params.automatic_payment_methods =
            Some(stripe::CreatePaymentIntentAutomaticPaymentMethods {
                allow_redirects: None,
                enabled: true,
            });

        let intent = stripe::PaymentIntent::create(&self.client, params)
            .await
            .context("Failed to create payment intent")?;

        Ok(intent_from_stripe(intent))
    }

    #[tracing::instrument(skip(self))]
    pub async fn retrieve_intent(
        &self,
        id: &PaymentIntentId,
    ) -> Result<GatewayIntent> {
        let stripe_id = id
            .0
            .parse::<stripe::PaymentIntentId>()
            .context("Invalid payment intent id")?;
        let intent =
            stripe::PaymentIntent::retrieve(&self.client, &stripe_id, &[])
                .await
                .context("Failed to retrieve payment intent")?;
        Ok(intent_from_stripe(intent))
    }

    /// Verify a webhook payload against its signature header and extract
    /// the event kind and intent linkage.
    pub fn verify_webhook(
        &self,
        payload: &str,
        signature: &str,
    ) -> Result<GatewayEvent> {
        let event = stripe::Webhook::construct_event(
            payload,
            signature,
            self.webhook_secret.expose_secret(),
        )
        .context("Webhook signature verification failed")?;

        let kind = match event.type_ {
            stripe::EventType::PaymentIntentSucceeded => {
                "payment_intent.succeeded".to_string()
            }
            stripe::EventType::PaymentIntentPaymentFailed => {
                "payment_intent.payment_failed".to_string()
            }
            other => format!("{other:?}"),
        };
        let intent_id = match event.data.object {
            stripe::EventObject::PaymentIntent(intent) => {
                Some(PaymentIntentId(intent.id.to_string()))
            }
            _ => None,
        };
        Ok(GatewayEvent { kind, intent_id })
    }
}

#[cfg(not(feature = "mock-stripe"))]
fn currency_code(code: &str) -> Result<stripe::Currency> {
    match code {
        "usd" => Ok(stripe::Currency::USD),
        "eur" => Ok(stripe::Currency::EUR),
        "gbp" => Ok(stripe::Currency::GBP),
        "jpy" => Ok(stripe::Currency::JPY),
        "krw" => Ok(stripe::Currency::KRW),
        other => anyhow::bail!("Unsupported currency: {other}"),
    }
}

#[cfg(not(feature = "mock-stripe"))]
fn intent_from_stripe(intent: stripe::PaymentIntent) -> GatewayIntent {
    GatewayIntent {
        id: PaymentIntentId(intent.id.to_string()),
        client_secret: intent.client_secret.unwrap_or_default(),
        amount_minor: intent.amount,
        currency: intent.currency.to_string(),
        status: intent.status.as_str().to_string(),
    }
}

#[cfg(feature = "mock-stripe")]
#[derive(Default)]
struct MockGatewayState {
    intents: HashMap<String, GatewayIntent>,
    next_id: u64,
}

#[cfg(feature = "mock-stripe")]
pub const MOCK_WEBHOOK_SIGNATURE: &str = "mock-signature";

#[cfg(feature = "mock-stripe")]
impl PaymentGateway {
    pub fn new(_config: &Config) -> Self {
        Self::default()
    }

    #[tracing::instrument(skip(self, metadata))]
    pub async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        _customer: Option<&str>,
        metadata: HashMap<String, String>,
    ) -> Result<GatewayIntent> {
        let _ = metadata;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("pi_mock_{:06}", state.next_id);
        let intent = GatewayIntent {
            id: PaymentIntentId(id.clone()),
            client_secret: format!("{id}_secret"),
            amount_minor,
            currency: currency.to_string(),
            status: INTENT_STATUS_REQUIRES_PAYMENT_METHOD.to_string(),
        };
        state.intents.insert(id, intent.clone());
        Ok(intent)
    }

    #[tracing::instrument(skip(self))]
    pub async fn retrieve_intent(
        &self,
        id: &PaymentIntentId,
    ) -> Result<GatewayIntent> {
        let state = self.state.lock().unwrap();
        state
            .intents
            .get(&id.0)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No such payment intent: {id}"))
    }

    pub fn verify_webhook(
        &self,
        payload: &str,
        signature: &str,
    ) -> Result<GatewayEvent> {
        if signature != MOCK_WEBHOOK_SIGNATURE {
            anyhow::bail!("Webhook signature verification failed");
        }
        let value: serde_json::Value = serde_json::from_str(payload)?;
        let kind = value["type"].as_str().unwrap_or("unknown").to_string();
        let intent_id = value["data"]["object"]["id"]
            .as_str()
            .map(|s| PaymentIntentId(s.to_string()));
        Ok(GatewayEvent { kind, intent_id })
    }

    /// Flip a mock intent to succeeded, as if the payment method had been
    /// confirmed on the client.
    pub fn mark_succeeded(&self, id: &PaymentIntentId) {
        let mut state = self.state.lock().unwrap();
        if let Some(intent) = state.intents.get_mut(&id.0) {
            intent.status = INTENT_STATUS_SUCCEEDED.to_string();
        }
    }
}
