pub mod common;
pub mod paypal;
pub mod razorpay;

pub use paypal::paypal_webhook;
pub use razorpay::razorpay_webhook;
