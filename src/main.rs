use axum::{
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::time::Duration;

use payrail::config::Config;
use payrail::db::{create_pool, init_db, queries, AppState};
use payrail::gateways::{PayPalClient, RazorpayClient};
use payrail::handlers;
use payrail::models::{BillingInterval, CreateProfile, PlanTier};

#[derive(Parser, Debug)]
#[command(name = "payrail")]
#[command(about = "Subscription billing and payment gateway reconciliation service")]
struct Cli {
    /// Seed the database with dev data (profiles and a plan catalog)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds the database with dev data for local testing: one founder profile,
/// one mentor profile, and a basic/premium plan catalog with INR pricing.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM plans", [], |row| row.get(0))
        .expect("Failed to count plans");
    if existing > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let founder = queries::create_profile(
        &conn,
        &CreateProfile {
            auth_user_id: "auth_dev_founder".to_string(),
            role: "founder".to_string(),
            country: Some("IN".to_string()),
        },
    )
    .expect("Failed to create dev founder profile");

    let mentor = queries::create_profile(
        &conn,
        &CreateProfile {
            auth_user_id: "auth_dev_mentor".to_string(),
            role: "mentor".to_string(),
            country: Some("IN".to_string()),
        },
    )
    .expect("Failed to create dev mentor profile");

    let plans = [
        ("Basic Monthly", PlanTier::Basic, 29900, BillingInterval::Monthly),
        ("Basic Yearly", PlanTier::Basic, 299900, BillingInterval::Yearly),
        ("Premium Monthly", PlanTier::Premium, 59900, BillingInterval::Monthly),
        ("Premium Yearly", PlanTier::Premium, 599900, BillingInterval::Yearly),
    ];

    for (name, tier, amount_minor, interval) in plans {
        let plan = queries::create_plan(
            &conn,
            &queries::CreatePlan {
                name: name.to_string(),
                tier,
                user_type: "founder".to_string(),
                amount_minor,
                currency: "INR".to_string(),
                interval,
            },
        )
        .expect("Failed to create dev plan");

        // Rough USD override for non-IN users
        queries::set_plan_price(&conn, &plan.id, "US", amount_minor / 25, "USD")
            .expect("Failed to set dev plan price");

        tracing::info!("Plan: {} (id: {})", plan.name, plan.id);
    }

    tracing::info!("Founder profile: {} (auth: {})", founder.id, founder.auth_user_id);
    tracing::info!("Mentor profile: {} (auth: {})", mentor.id, mentor.auth_user_id);

    println!();
    println!("--- COPY FROM HERE ---");
    println!("  founder_profile_id: {}", founder.id);
    println!("  mentor_profile_id: {}", mentor.id);
    println!("--- END COPY ---");
    println!();
}

/// Spawns the expiry sweep: lapses active subscriptions whose paid period
/// ended with autopay off, and purges old webhook dedupe rows. Runs hourly.
fn spawn_expiry_sweep(state: AppState) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(60 * 60);

        loop {
            tokio::time::sleep(interval).await;

            match state.db.get() {
                Ok(conn) => {
                    match queries::expire_lapsed_subscriptions(&conn, queries::now()) {
                        Ok(count) if count > 0 => {
                            tracing::info!("Expired {} lapsed subscriptions", count);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!("Expiry sweep failed: {}", e);
                        }
                    }
                    match queries::purge_old_webhook_events(&conn, 30) {
                        Ok(count) if count > 0 => {
                            tracing::debug!("Purged {} old webhook events", count);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!("Webhook event purge failed: {}", e);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to get db connection for expiry sweep: {}", e);
                }
            }
        }
    });

    tracing::info!("Expiry sweep started (runs hourly)");
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "payrail=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        razorpay: RazorpayClient::new(&config.razorpay, config.gateway_timeout_secs),
        paypal: PayPalClient::new(&config.paypal, config.gateway_timeout_secs),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set PAYRAIL_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    spawn_expiry_sweep(state.clone());

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/razorpay/create-order", post(handlers::razorpay::create_order))
        .route(
            "/api/razorpay/create-subscription",
            post(handlers::razorpay::create_subscription),
        )
        .route("/api/razorpay/verify", post(handlers::razorpay::verify))
        .route("/api/razorpay/webhook", post(handlers::webhooks::razorpay_webhook))
        .route("/api/paypal/verify", post(handlers::paypal::verify))
        .route(
            "/api/paypal/verify-subscription",
            post(handlers::paypal::verify_subscription),
        )
        .route("/api/paypal/webhook", post(handlers::webhooks::paypal_webhook))
        .route("/api/subscriptions/upgrade", post(handlers::subscriptions::upgrade))
        .route("/api/subscriptions/downgrade", post(handlers::subscriptions::downgrade))
        .route(
            "/api/subscriptions/stop-autopay",
            post(handlers::subscriptions::stop_autopay),
        )
        .route("/api/subscriptions/current", get(handlers::subscriptions::current))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Payrail server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
