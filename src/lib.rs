//! Payrail - subscription billing and payment-gateway reconciliation
//!
//! This library provides the core functionality for the Payrail billing
//! service: gateway client adapters (Razorpay, PayPal), payment verification,
//! subscription lifecycle management, and webhook reconciliation.

pub mod billing;
pub mod config;
pub mod db;
pub mod error;
pub mod gateways;
pub mod handlers;
pub mod models;
pub mod plan_cache;
