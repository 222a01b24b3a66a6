//! Storage backends for sell requests and accounts.

mod memory;
mod postgres;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::accounts::AccountStore;
use crate::lifecycle::SellRequestStore;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// One backend seen through both store capabilities.
#[derive(Clone)]
pub struct Storage {
    pub requests: Arc<dyn SellRequestStore>,
    pub accounts: Arc<dyn AccountStore>,
}

impl Storage {
    pub fn postgres(database: DatabaseConnection) -> Self {
        let store = Arc::new(PostgresStore::new(database));
        Self {
            requests: store.clone(),
            accounts: store,
        }
    }

    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            requests: store.clone(),
            accounts: store,
        }
    }
}
