//! In-process backend. Every operation runs under one mutex, which is what
//! makes `transition` a real compare-and-set here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::accounts::{Account, AccountStore, NewAccount};
use crate::lifecycle::{
    AppendOutcome, NewSellRequest, Page, SellRequest, SellRequestFilter, SellRequestStatus,
    SellRequestStore, StatusTally, StoreError, Transition, TransitionOutcome,
};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    requests: Vec<SellRequest>,
    accounts: Vec<Account>,
}

impl MemoryInner {
    fn request_mut(&mut self, id: i64) -> Option<&mut SellRequest> {
        self.requests.iter_mut().find(|request| request.id == id)
    }

    fn next_request_id(&self) -> i64 {
        self.requests.len() as i64 + 1
    }
}

#[async_trait]
impl SellRequestStore for MemoryStore {
    async fn insert(&self, request: NewSellRequest) -> Result<SellRequest, StoreError> {
        let mut inner = self.inner.lock().await;
        let duplicate = inner.requests.iter().any(|existing| {
            existing.status.is_live()
                && existing.user_id == request.user_id
                && existing.wallet_address == request.wallet_address
        });
        if duplicate {
            return Err(StoreError::Duplicate(format!(
                "live sell request for account {} and wallet {}",
                request.user_id, request.wallet_address
            )));
        }

        let created = SellRequest {
            id: inner.next_request_id(),
            user_id: request.user_id,
            wallet_address: request.wallet_address,
            amount: request.amount,
            price: request.price,
            status: SellRequestStatus::Pending,
            description: request.description,
            admin_notes: None,
            reviewed_by: None,
            review_date: None,
            completed_date: None,
            transaction_hash: None,
            source: request.source,
            documents: request.documents,
            submitted_date: request.submitted_date,
        };
        inner.requests.push(created.clone());
        Ok(created)
    }

    async fn find(&self, id: i64) -> Result<Option<SellRequest>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.requests.iter().find(|request| request.id == id).cloned())
    }

    async fn find_live(
        &self,
        user_id: i64,
        wallet_address: &str,
    ) -> Result<Option<SellRequest>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .requests
            .iter()
            .rev()
            .find(|request| {
                request.status.is_live()
                    && request.user_id == user_id
                    && request.wallet_address == wallet_address
            })
            .cloned())
    }

    async fn transition(
        &self,
        id: i64,
        expected: SellRequestStatus,
        transition: Transition,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(request) = inner.request_mut(id) else {
            return Ok(TransitionOutcome::Missing);
        };
        if request.status != expected {
            return Ok(TransitionOutcome::StatusMismatch(request.status));
        }
        transition.apply(request);
        Ok(TransitionOutcome::Applied(request.clone()))
    }

    async fn append_document(
        &self,
        id: i64,
        reference: String,
        max_documents: usize,
    ) -> Result<AppendOutcome, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(request) = inner.request_mut(id) else {
            return Ok(AppendOutcome::Missing);
        };
        if request.status.is_terminal() {
            return Ok(AppendOutcome::Terminal(request.status));
        }
        if request.documents.len() >= max_documents {
            return Ok(AppendOutcome::Full);
        }
        request.documents.push(reference);
        Ok(AppendOutcome::Appended(request.clone()))
    }

    async fn query(
        &self,
        filter: &SellRequestFilter,
        page: Page,
    ) -> Result<Vec<SellRequest>, StoreError> {
        let inner = self.inner.lock().await;
        let mut matches = inner
            .requests
            .iter()
            .filter(|request| filter.matches(request))
            .cloned()
            .collect::<Vec<_>>();
        matches.sort_by(|a, b| {
            b.submitted_date
                .cmp(&a.submitted_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(matches
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn tally(&self, filter: &SellRequestFilter) -> Result<Vec<StatusTally>, StoreError> {
        let inner = self.inner.lock().await;
        let tallies = SellRequestStatus::ALL
            .iter()
            .map(|status| {
                let (count, credits) = inner
                    .requests
                    .iter()
                    .filter(|request| request.status == *status && filter.matches(request))
                    .fold((0u64, 0u64), |(count, credits), request| {
                        (count + 1, credits.saturating_add(request.amount))
                    });
                StatusTally {
                    status: *status,
                    count,
                    credits,
                }
            })
            .filter(|tally| tally.count > 0)
            .collect();
        Ok(tallies)
    }

    async fn approved_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<SellRequest>, StoreError> {
        let inner = self.inner.lock().await;
        let mut stale = inner
            .requests
            .iter()
            .filter(|request| {
                request.status == SellRequestStatus::Approved
                    && request.review_date.is_some_and(|reviewed| reviewed < cutoff)
            })
            .cloned()
            .collect::<Vec<_>>();
        stale.sort_by_key(|request| (request.review_date, request.id));
        stale.truncate(limit as usize);
        Ok(stale)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner
            .accounts
            .iter()
            .any(|existing| existing.email == account.email)
        {
            return Err(StoreError::Duplicate(format!("email {}", account.email)));
        }
        let created = Account {
            id: inner.accounts.len() as i64 + 1,
            name: account.name,
            email: account.email,
            wallet_address: account.wallet_address,
            role: account.role,
            created_at: account.created_at,
        };
        inner.accounts.push(created.clone());
        Ok(created)
    }

    async fn find(&self, id: i64) -> Result<Option<Account>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.accounts.iter().find(|account| account.id == id).cloned())
    }
}
