pub mod paypal;
pub mod razorpay;
pub mod subscriptions;
pub mod webhooks;
