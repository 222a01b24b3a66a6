//! Capabilities the lifecycle manager is constructed with.
//!
//! The manager owns no state of its own. Persistence, account lookups and
//! time all come in through these traits, so the Postgres and in-memory
//! backends (and test doubles) plug in the same way.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::accounts::Account;

use super::types::{
    AppendOutcome, NewSellRequest, Page, SellRequest, SellRequestFilter, SellRequestStatus,
    StatusTally, Transition, TransitionOutcome,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A uniqueness constraint rejected the write.
    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

#[async_trait]
pub trait SellRequestStore: Send + Sync {
    async fn insert(&self, request: NewSellRequest) -> Result<SellRequest, StoreError>;

    async fn find(&self, id: i64) -> Result<Option<SellRequest>, StoreError>;

    /// Most recent `pending` or `approved` request for the pair, if any.
    async fn find_live(
        &self,
        user_id: i64,
        wallet_address: &str,
    ) -> Result<Option<SellRequest>, StoreError>;

    /// Writes `transition` only if the stored status still equals `expected`.
    async fn transition(
        &self,
        id: i64,
        expected: SellRequestStatus,
        transition: Transition,
    ) -> Result<TransitionOutcome, StoreError>;

    async fn append_document(
        &self,
        id: i64,
        reference: String,
        max_documents: usize,
    ) -> Result<AppendOutcome, StoreError>;

    /// Newest submission first, ties broken by id descending.
    async fn query(
        &self,
        filter: &SellRequestFilter,
        page: Page,
    ) -> Result<Vec<SellRequest>, StoreError>;

    async fn tally(&self, filter: &SellRequestFilter) -> Result<Vec<StatusTally>, StoreError>;

    /// `approved` requests reviewed before `cutoff`, oldest review first.
    async fn approved_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<SellRequest>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn account(&self, id: i64) -> Result<Option<Account>, StoreError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
