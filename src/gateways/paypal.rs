use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::PayPalConfig;
use crate::error::{AppError, Result};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct PayPalOrder {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub purchase_units: Vec<PurchaseUnit>,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseUnit {
    pub amount: Option<PayPalAmount>,
    pub custom_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PayPalAmount {
    pub currency_code: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct PayPalCapture {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct PayPalSubscription {
    pub id: String,
    pub status: String,
    pub plan_id: Option<String>,
    pub billing_info: Option<BillingInfo>,
}

#[derive(Debug, Deserialize)]
pub struct BillingInfo {
    pub next_billing_time: Option<String>,
    pub last_payment: Option<LastPayment>,
}

#[derive(Debug, Deserialize)]
pub struct LastPayment {
    pub amount: Option<PayPalAmount>,
    pub time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyWebhookResponse {
    verification_status: String,
}

/// Header set PayPal attaches to each webhook delivery, needed for the
/// verify-webhook-signature call.
#[derive(Debug, Clone)]
pub struct WebhookHeaders {
    pub transmission_id: String,
    pub transmission_time: String,
    pub transmission_sig: String,
    pub cert_url: String,
    pub auth_algo: String,
}

#[derive(Debug, Clone)]
pub struct PayPalClient {
    client: Client,
    client_id: String,
    client_secret: String,
    webhook_id: String,
    api_base: String,
}

impl PayPalClient {
    pub fn new(config: &PayPalConfig, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            webhook_id: config.webhook_id.clone(),
            api_base: config.api_base.clone(),
        }
    }

    /// Fetch a short-lived OAuth access token. PayPal tokens last hours, but
    /// fetching per call keeps the client stateless; request volume here is
    /// far below any rate limit that would justify caching.
    async fn access_token(&self) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.api_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AppError::from_reqwest("PayPal token", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse PayPal token: {}", e)))?;
        Ok(token.access_token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest("PayPal API", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse PayPal response: {}", e)))
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest("PayPal API", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse PayPal response: {}", e)))
    }

    /// Fetch an order. Authenticity for PayPal rests on this server-to-server
    /// read of the order status, not on a client-supplied signature.
    pub async fn fetch_order(&self, order_id: &str) -> Result<PayPalOrder> {
        self.get_json(&format!("/v2/checkout/orders/{}", order_id))
            .await
    }

    /// Capture an approved order. Not idempotent: an ambiguous outcome
    /// (timeout) must be resolved by fetching the order, never by re-capturing.
    pub async fn capture_order(&self, order_id: &str) -> Result<PayPalCapture> {
        self.post_json(
            &format!("/v2/checkout/orders/{}/capture", order_id),
            json!({}),
        )
        .await
    }

    pub async fn fetch_subscription(&self, subscription_id: &str) -> Result<PayPalSubscription> {
        self.get_json(&format!("/v1/billing/subscriptions/{}", subscription_id))
            .await
    }

    pub async fn cancel_subscription(&self, subscription_id: &str, reason: &str) -> Result<()> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!(
                "{}/v1/billing/subscriptions/{}/cancel",
                self.api_base, subscription_id
            ))
            .bearer_auth(&token)
            .json(&json!({ "reason": reason }))
            .send()
            .await
            .map_err(|e| AppError::from_reqwest("PayPal API", e))?;

        // Cancel returns 204 with no body
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Verify a webhook delivery through PayPal's verify-webhook-signature
    /// endpoint. Requires the webhook id registered in the dashboard.
    pub async fn verify_webhook_signature(
        &self,
        headers: &WebhookHeaders,
        raw_body: &[u8],
    ) -> Result<bool> {
        if self.webhook_id.is_empty() {
            return Err(AppError::Internal(
                "PAYPAL_WEBHOOK_ID not configured".into(),
            ));
        }

        let event: serde_json::Value = serde_json::from_slice(raw_body)?;
        let response: VerifyWebhookResponse = self
            .post_json(
                "/v1/notifications/verify-webhook-signature",
                json!({
                    "transmission_id": headers.transmission_id,
                    "transmission_time": headers.transmission_time,
                    "transmission_sig": headers.transmission_sig,
                    "cert_url": headers.cert_url,
                    "auth_algo": headers.auth_algo,
                    "webhook_id": self.webhook_id,
                    "webhook_event": event,
                }),
            )
            .await?;

        Ok(response.verification_status == "SUCCESS")
    }
}
