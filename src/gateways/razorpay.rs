use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::RazorpayConfig;
use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

const API_BASE: &str = "https://api.razorpay.com/v1";

/// Which signing convention matched during payment verification.
///
/// Subscription payments have been observed to sign over different field
/// combinations than one-time orders; anything other than `Primary` is
/// logged loudly by callers since it indicates gateway-documentation drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFormat {
    /// `{order_or_subscription_id}|{payment_id}` (documented convention).
    Primary,
    /// `{payment_id}` alone.
    PaymentIdOnly,
    /// `{payment_id}|{order_or_subscription_id}` (swapped).
    Swapped,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct RazorpayPlan {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RazorpaySubscription {
    pub id: String,
    pub plan_id: String,
    pub status: String,
    pub short_url: Option<String>,
    pub current_start: Option<i64>,
    pub current_end: Option<i64>,
    pub paid_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RazorpayPayment {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub order_id: Option<String>,
    pub method: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RazorpayClient {
    client: Client,
    key_id: String,
    key_secret: String,
    webhook_secret: String,
}

impl RazorpayClient {
    pub fn new(config: &RazorpayConfig, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(format!("{}{}", API_BASE, path))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest("Razorpay API", e))?;

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
            .map_err(|e| AppError::Internal(format!("Failed to parse Razorpay response: {}", e)))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", API_BASE, path))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(|e| AppError::from_reqwest("Razorpay API", e))?;

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
            .map_err(|e| AppError::Internal(format!("Failed to parse Razorpay response: {}", e)))
    }

    /// Create a one-time order. `amount_minor` is in the currency's minor
    /// unit (paise for INR); Razorpay rejects anything under 100.
    pub async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<RazorpayOrder> {
        self.post_json(
            "/orders",
            json!({
                "amount": amount_minor,
                "currency": currency,
                "receipt": receipt,
            }),
        )
        .await
    }

    pub async fn create_plan(
        &self,
        name: &str,
        amount_minor: i64,
        currency: &str,
        period: &str,
        interval_count: i64,
    ) -> Result<RazorpayPlan> {
        self.post_json(
            "/plans",
            json!({
                "period": period,
                "interval": interval_count,
                "item": {
                    "name": name,
                    "amount": amount_minor,
                    "currency": currency,
                },
            }),
        )
        .await
    }

    pub async fn create_subscription(
        &self,
        plan_id: &str,
        total_count: i64,
        customer_notify: bool,
        start_at: Option<i64>,
    ) -> Result<RazorpaySubscription> {
        let mut body = json!({
            "plan_id": plan_id,
            "total_count": total_count,
            "customer_notify": if customer_notify { 1 } else { 0 },
        });
        if let Some(ts) = start_at {
            body["start_at"] = json!(ts);
        }
        self.post_json("/subscriptions", body).await
    }

    pub async fn fetch_subscription(&self, subscription_id: &str) -> Result<RazorpaySubscription> {
        self.get_json(&format!("/subscriptions/{}", subscription_id))
            .await
    }

    pub async fn fetch_payment(&self, payment_id: &str) -> Result<RazorpayPayment> {
        self.get_json(&format!("/payments/{}", payment_id)).await
    }

    /// Cancel a subscription mandate. `cancel_at_cycle_end=false` cancels
    /// immediately.
    pub async fn cancel_subscription(&self, subscription_id: &str) -> Result<RazorpaySubscription> {
        self.post_json(
            &format!("/subscriptions/{}/cancel", subscription_id),
            json!({ "cancel_at_cycle_end": 0 }),
        )
        .await
    }

    fn hmac_hex(&self, key: &str, message: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|_| AppError::Internal("Invalid HMAC key".into()))?;
        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn matches(expected: &str, provided: &str) -> bool {
        // Length is not secret (64 hex chars for SHA-256); the comparison
        // itself must be constant-time.
        expected.len() == provided.len()
            && expected.as_bytes().ct_eq(provided.as_bytes()).into()
    }

    /// Verify a checkout payment signature against the key secret.
    ///
    /// The documented convention signs `{order_or_subscription_id}|{payment_id}`,
    /// but subscription payments have been seen signing over the payment id
    /// alone or the swapped order. Returns which format matched, or None.
    pub fn verify_payment_signature(
        &self,
        order_or_subscription_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<Option<SignatureFormat>> {
        let primary = self.hmac_hex(
            &self.key_secret,
            &format!("{}|{}", order_or_subscription_id, payment_id),
        )?;
        if Self::matches(&primary, signature) {
            return Ok(Some(SignatureFormat::Primary));
        }

        let payment_only = self.hmac_hex(&self.key_secret, payment_id)?;
        if Self::matches(&payment_only, signature) {
            return Ok(Some(SignatureFormat::PaymentIdOnly));
        }

        let swapped = self.hmac_hex(
            &self.key_secret,
            &format!("{}|{}", payment_id, order_or_subscription_id),
        )?;
        if Self::matches(&swapped, signature) {
            return Ok(Some(SignatureFormat::Swapped));
        }

        Ok(None)
    }

    /// Verify a webhook delivery: HMAC over the raw body with the webhook
    /// secret, compared against the `x-razorpay-signature` header.
    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal("Invalid webhook secret".into()))?;
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());
        Ok(Self::matches(&expected, signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RazorpayConfig;

    fn client() -> RazorpayClient {
        RazorpayClient::new(
            &RazorpayConfig {
                key_id: "rzp_test_key".into(),
                key_secret: "test_secret".into(),
                webhook_secret: "whsec".into(),
            },
            15,
        )
    }

    fn sign(secret: &str, message: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn primary_format_accepted() {
        let sig = sign("test_secret", "order_1|pay_1");
        let matched = client()
            .verify_payment_signature("order_1", "pay_1", &sig)
            .unwrap();
        assert_eq!(matched, Some(SignatureFormat::Primary));
    }

    #[test]
    fn payment_id_only_format_accepted() {
        let sig = sign("test_secret", "pay_1");
        let matched = client()
            .verify_payment_signature("sub_1", "pay_1", &sig)
            .unwrap();
        assert_eq!(matched, Some(SignatureFormat::PaymentIdOnly));
    }

    #[test]
    fn swapped_format_accepted() {
        let sig = sign("test_secret", "pay_1|sub_1");
        let matched = client()
            .verify_payment_signature("sub_1", "pay_1", &sig)
            .unwrap();
        assert_eq!(matched, Some(SignatureFormat::Swapped));
    }

    #[test]
    fn mutated_signature_rejected() {
        let mut sig = sign("test_secret", "order_1|pay_1");
        // flip one hex char
        let last = sig.pop().unwrap();
        sig.push(if last == '0' { '1' } else { '0' });
        let matched = client()
            .verify_payment_signature("order_1", "pay_1", &sig)
            .unwrap();
        assert_eq!(matched, None);
    }

    #[test]
    fn webhook_signature_roundtrip() {
        let body = br#"{"event":"payment.captured"}"#;
        let sig = sign("whsec", std::str::from_utf8(body).unwrap());
        assert!(client().verify_webhook_signature(body, &sig).unwrap());
        assert!(!client().verify_webhook_signature(body, "deadbeef").unwrap());
    }
}
