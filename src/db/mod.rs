mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::gateways::{PayPalClient, RazorpayClient};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state: database pool, gateway clients, and configuration
/// constructed once at startup (gateway credentials are never read from the
/// environment per call).
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub razorpay: RazorpayClient,
    pub paypal: PayPalClient,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
