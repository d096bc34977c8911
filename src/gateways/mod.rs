//! HTTP clients for the payment gateways.
//!
//! Each client wraps a shared `reqwest::Client` with the credentials loaded at
//! startup. Calls return typed payloads or `AppError::Gateway` carrying the
//! remote status and body. None of these operations are idempotent; callers
//! must check gateway-side state before retrying a create or capture.

mod paypal;
mod razorpay;

pub use paypal::{PayPalCapture, PayPalClient, PayPalOrder, PayPalSubscription, WebhookHeaders};
pub use razorpay::{
    RazorpayClient, RazorpayOrder, RazorpayPayment, RazorpayPlan, RazorpaySubscription,
    SignatureFormat,
};
