use crate::config::StripeConfig;
use crate::error::{AppError, AppResult};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Trial granted on the base subscription at first checkout.
pub const TRIAL_PERIOD_DAYS: u32 = 14;

#[derive(Debug, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    /// Hosted payment page; null for some session states.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripePortalSession {
    pub url: String,
}

/// Subscription as returned by `GET /v1/subscriptions/{id}` without
/// expansions: `customer` is a plain id string.
#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub status: String,
    pub customer: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
}

#[derive(Clone)]
pub struct StripeService {
    client: Client,
    config: StripeConfig,
}

impl StripeService {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn base_monthly_price_id(&self) -> Option<&str> {
        self.config.price_base_monthly.as_deref()
    }

    pub fn topup_price_id(&self, emails: i64) -> Option<&str> {
        self.config.topup_price_id(emails)
    }

    /// Create a Stripe customer tagged with the owning account id.
    pub async fn create_customer(
        &self,
        email: Option<&str>,
        account_id: Uuid,
    ) -> AppResult<StripeCustomer> {
        let mut params = vec![("metadata[account_id]", account_id.to_string())];
        if let Some(email) = email {
            params.push(("email", email.to_string()));
        }

        self.post_form("/customers", &params).await
    }

    /// Subscription-mode checkout session for the base plan, with trial and
    /// account metadata so webhook events can resolve the account.
    pub async fn create_subscription_checkout(
        &self,
        customer_id: &str,
        price_id: &str,
        account_id: Uuid,
        success_url: &str,
        cancel_url: &str,
    ) -> AppResult<StripeCheckoutSession> {
        let params = [
            ("customer", customer_id.to_string()),
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", price_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "subscription_data[trial_period_days]",
                TRIAL_PERIOD_DAYS.to_string(),
            ),
            (
                "subscription_data[metadata][account_id]",
                account_id.to_string(),
            ),
            ("success_url", success_url.to_string()),
            ("cancel_url", cancel_url.to_string()),
        ];

        self.post_form("/checkout/sessions", &params).await
    }

    /// One-time payment checkout session for a top-up pack. The quota credit
    /// happens later via the checkout.session.completed webhook, never here.
    pub async fn create_topup_checkout(
        &self,
        customer_id: &str,
        price_id: &str,
        account_id: Uuid,
        emails: i64,
        success_url: &str,
        cancel_url: &str,
    ) -> AppResult<StripeCheckoutSession> {
        let params = [
            ("customer", customer_id.to_string()),
            ("mode", "payment".to_string()),
            ("line_items[0][price]", price_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("metadata[account_id]", account_id.to_string()),
            ("metadata[topup_emails]", emails.to_string()),
            ("success_url", success_url.to_string()),
            ("cancel_url", cancel_url.to_string()),
        ];

        self.post_form("/checkout/sessions", &params).await
    }

    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> AppResult<StripePortalSession> {
        let params = [
            ("customer", customer_id.to_string()),
            ("return_url", return_url.to_string()),
        ];

        self.post_form("/billing_portal/sessions", &params).await
    }

    pub async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> AppResult<StripeSubscription> {
        let url = format!("{STRIPE_API_BASE}/subscriptions/{subscription_id}");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            Err(AppError::ExternalApiError(format!(
                "Failed to retrieve subscription {subscription_id}: {error_text}"
            )))
        }
    }

    /// Verify the `stripe-signature` header and parse the event payload.
    pub fn verify_webhook_signature(
        &self,
        payload: &str,
        signature: &str,
    ) -> AppResult<stripe::Event> {
        stripe::Webhook::construct_event(payload, signature, &self.config.webhook_secret)
            .map_err(|e| AppError::AuthError(format!("Invalid webhook signature: {e}")))
    }

    async fn post_form<T, P>(&self, path: &str, params: &P) -> AppResult<T>
    where
        T: serde::de::DeserializeOwned,
        P: serde::Serialize + ?Sized,
    {
        let url = format!("{STRIPE_API_BASE}{path}");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .form(params)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            Err(AppError::ExternalApiError(format!(
                "Stripe request {path} failed: {error_text}"
            )))
        }
    }
}
