use std::env;

/// Razorpay API credentials.
#[derive(Debug, Clone, Default)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
}

/// PayPal API credentials.
#[derive(Debug, Clone, Default)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Webhook ID registered in the PayPal dashboard, required for
    /// verify-webhook-signature calls.
    pub webhook_id: String,
    /// REST API base, switched between live and sandbox by PAYPAL_ENV.
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub razorpay: RazorpayConfig,
    pub paypal: PayPalConfig,
    /// Bounded timeout applied to every outbound gateway call (seconds).
    pub gateway_timeout_secs: u64,
    pub dev_mode: bool,
}

/// Read an env var, falling back to its VITE_-prefixed twin.
///
/// The original deployment shared gateway credentials with a Vite frontend,
/// so several variables only exist under the VITE_ prefix.
fn env_or_vite(name: &str) -> Option<String> {
    env::var(name)
        .or_else(|_| env::var(format!("VITE_{}", name)))
        .ok()
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("PAYRAIL_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let razorpay = RazorpayConfig {
            key_id: env_or_vite("RAZORPAY_KEY_ID").unwrap_or_default(),
            key_secret: env_or_vite("RAZORPAY_KEY_SECRET").unwrap_or_default(),
            webhook_secret: env_or_vite("RAZORPAY_WEBHOOK_SECRET").unwrap_or_default(),
        };

        let paypal_env = env::var("PAYPAL_ENV").unwrap_or_else(|_| "sandbox".to_string());
        let api_base = if paypal_env == "live" {
            "https://api-m.paypal.com".to_string()
        } else {
            "https://api-m.sandbox.paypal.com".to_string()
        };
        let paypal = PayPalConfig {
            client_id: env_or_vite("PAYPAL_CLIENT_ID").unwrap_or_default(),
            client_secret: env_or_vite("PAYPAL_CLIENT_SECRET").unwrap_or_default(),
            webhook_id: env_or_vite("PAYPAL_WEBHOOK_ID").unwrap_or_default(),
            api_base,
        };

        if razorpay.key_id.is_empty() && !dev_mode {
            tracing::warn!("RAZORPAY_KEY_ID not set - Razorpay endpoints will fail");
        }
        if paypal.client_id.is_empty() && !dev_mode {
            tracing::warn!("PAYPAL_CLIENT_ID not set - PayPal endpoints will fail");
        }

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "payrail.db".to_string()),
            razorpay,
            paypal,
            gateway_timeout_secs: env::var("GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
