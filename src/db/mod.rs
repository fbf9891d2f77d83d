mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::clock::Clock;
use crate::gateway::PaymentGatewayClient;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding the database pool and injected collaborators.
///
/// The gateway client and clock are trait objects constructed once at startup
/// so tests can substitute deterministic fakes.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Authoritative payment-status lookup
    pub gateway: Arc<dyn PaymentGatewayClient>,
    pub clock: Arc<dyn Clock>,
    /// Single-flight guard for the retry sweep
    pub sweep_lock: Arc<tokio::sync::Mutex<()>>,
    /// Bearer token for the operator endpoints (None disables them)
    pub operator_api_key: Option<String>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
