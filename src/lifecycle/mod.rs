//! Sell-request lifecycle.
//!
//! A request moves `pending -> approved | rejected`, then `approved ->
//! completed`. Review is an off-chain judgment; settlement only records the
//! hash of a transaction the caller has already seen mined. The manager never
//! talks to the chain itself.
//!
//! Transitions are compare-and-set against the store, so two admins racing to
//! review the same request cannot both win: the loser gets
//! [`LifecycleError::InvalidState`] carrying the status the winner wrote.

mod error;
mod ports;
mod types;

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use crate::config::LifecycleConfig;
use crate::validation::{
    MAX_ADMIN_NOTES_LEN, MAX_DESCRIPTION_LEN, MAX_SELL_AMOUNT, canonicalize_document_ref,
    canonicalize_text,
    normalize_transaction_hash, normalize_wallet_address,
};

pub use error::LifecycleError;
#[cfg(test)]
pub use ports::ManualClock;
pub use ports::{Clock, IdentityProvider, SellRequestStore, StoreError, SystemClock};
pub use types::{
    AppendOutcome, LifecycleAction, NewSellRequest, Page, RequestSource, ReviewDecision,
    SellRequest, SellRequestFilter, SellRequestStats, SellRequestStatus, StatusTally, Transition,
    TransitionOutcome,
};

/// Unvalidated submission input.
#[derive(Debug, Clone, Default)]
pub struct SubmitSellRequest {
    pub user_id: i64,
    pub wallet_address: String,
    pub amount: i64,
    pub price: f64,
    pub description: Option<String>,
    pub documents: Vec<String>,
    pub source: RequestSource,
}

#[derive(Debug, Clone)]
pub struct ReviewSellRequest {
    pub reviewer_id: i64,
    pub decision: ReviewDecision,
    pub admin_notes: Option<String>,
}

/// Limits applied by the manager, resolved from configuration.
#[derive(Debug, Clone, Copy)]
pub struct LifecyclePolicy {
    pub max_documents: usize,
    pub default_query_limit: u64,
    pub max_query_limit: u64,
    pub stale_approval_after: Duration,
}

impl LifecyclePolicy {
    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self {
            max_documents: config.max_documents,
            default_query_limit: config.default_query_limit,
            max_query_limit: config.max_query_limit,
            stale_approval_after: Duration::hours(config.stale_approval_hours),
        }
    }

    fn page(&self, limit: Option<u64>, offset: Option<u64>) -> Page {
        let limit = limit
            .unwrap_or(self.default_query_limit)
            .clamp(1, self.max_query_limit);
        Page {
            limit,
            offset: offset.unwrap_or(0).min(i64::MAX as u64),
        }
    }
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            max_documents: 20,
            default_query_limit: 50,
            max_query_limit: 200,
            stale_approval_after: Duration::hours(72),
        }
    }
}

pub struct SellRequestManager {
    store: Arc<dyn SellRequestStore>,
    identities: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    policy: LifecyclePolicy,
}

impl SellRequestManager {
    pub fn new(
        store: Arc<dyn SellRequestStore>,
        identities: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        policy: LifecyclePolicy,
    ) -> Self {
        assert!(policy.max_documents > 0, "Document cap must be positive");
        assert!(
            policy.default_query_limit <= policy.max_query_limit,
            "Default query limit exceeds maximum"
        );
        Self {
            store,
            identities,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    pub async fn submit(&self, request: SubmitSellRequest) -> Result<SellRequest, LifecycleError> {
        if request.amount < 1 {
            return Err(LifecycleError::validation(
                "amount",
                "amount must be at least 1 credit",
            ));
        }
        if request.amount > MAX_SELL_AMOUNT {
            return Err(LifecycleError::validation(
                "amount",
                format!("amount cannot exceed {MAX_SELL_AMOUNT} credits"),
            ));
        }
        if !request.price.is_finite() || request.price < 0.0 {
            return Err(LifecycleError::validation(
                "price",
                "price must be a non-negative number",
            ));
        }
        let wallet_address = normalize_wallet_address(&request.wallet_address)
            .map_err(|err| LifecycleError::validation("wallet_address", err))?;
        let description = canonicalize_text(
            request.description.as_deref(),
            MAX_DESCRIPTION_LEN,
            "description",
        )
        .map_err(|err| LifecycleError::validation("description", err))?;

        if request.documents.len() > self.policy.max_documents {
            return Err(LifecycleError::validation(
                "documents",
                format!("at most {} documents may be attached", self.policy.max_documents),
            ));
        }
        let documents = request
            .documents
            .iter()
            .map(|reference| canonicalize_document_ref(reference))
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|err| LifecycleError::validation("documents", err))?;

        if self.identities.account(request.user_id).await?.is_none() {
            return Err(LifecycleError::validation(
                "user_id",
                format!("account {} does not exist", request.user_id),
            ));
        }

        if let Some(existing) = self
            .store
            .find_live(request.user_id, &wallet_address)
            .await?
        {
            return Err(LifecycleError::Conflict {
                existing_id: Some(existing.id),
            });
        }

        let draft = NewSellRequest {
            user_id: request.user_id,
            wallet_address,
            amount: request.amount as u64,
            price: request.price,
            description,
            documents,
            source: request.source,
            submitted_date: self.clock.now(),
        };

        let created = match self.store.insert(draft).await {
            Ok(created) => created,
            // Lost a race with a concurrent submission for the same pair.
            Err(StoreError::Duplicate(_)) => {
                return Err(LifecycleError::Conflict { existing_id: None });
            }
            Err(err) => return Err(err.into()),
        };

        assert_eq!(
            created.status,
            SellRequestStatus::Pending,
            "New sell requests start pending"
        );
        info!(
            "Sell request {} submitted by account {}: {} credits at {} from {} ({})",
            created.id,
            created.user_id,
            created.amount,
            created.price,
            created.wallet_address,
            created.source.as_str()
        );
        Ok(created)
    }

    pub async fn review(
        &self,
        id: i64,
        review: ReviewSellRequest,
    ) -> Result<SellRequest, LifecycleError> {
        let admin_notes = canonicalize_text(
            review.admin_notes.as_deref(),
            MAX_ADMIN_NOTES_LEN,
            "admin notes",
        )
        .map_err(|err| LifecycleError::validation("admin_notes", err))?;

        let reviewer = self.identities.account(review.reviewer_id).await?;
        if !reviewer.is_some_and(|account| account.is_admin()) {
            warn!(
                "Account {} attempted to review sell request {id} without admin role",
                review.reviewer_id
            );
            return Err(LifecycleError::Forbidden {
                account_id: review.reviewer_id,
            });
        }

        let transition = Transition::Reviewed {
            status: review.decision.target_status(),
            reviewed_by: review.reviewer_id,
            admin_notes,
            at: self.clock.now(),
        };
        let reviewed = self
            .apply(id, SellRequestStatus::Pending, transition, LifecycleAction::Review)
            .await?;

        info!(
            "Sell request {id} {} by admin {}",
            reviewed.status, review.reviewer_id
        );
        Ok(reviewed)
    }

    pub async fn settle(
        &self,
        id: i64,
        transaction_hash: &str,
    ) -> Result<SellRequest, LifecycleError> {
        let transaction_hash = normalize_transaction_hash(transaction_hash)
            .map_err(|err| LifecycleError::validation("transaction_hash", err))?;

        let transition = Transition::Settled {
            transaction_hash,
            at: self.clock.now(),
        };
        let settled = self
            .apply(id, SellRequestStatus::Approved, transition, LifecycleAction::Settle)
            .await?;

        info!(
            "Sell request {id} completed with transaction {}",
            settled.transaction_hash.as_deref().unwrap_or_default()
        );
        Ok(settled)
    }

    pub async fn attach_document(
        &self,
        id: i64,
        reference: &str,
    ) -> Result<SellRequest, LifecycleError> {
        let reference = canonicalize_document_ref(reference)
            .map_err(|err| LifecycleError::validation("reference", err))?;

        match self
            .store
            .append_document(id, reference, self.policy.max_documents)
            .await?
        {
            AppendOutcome::Appended(updated) => {
                info!(
                    "Document attached to sell request {id} ({} total)",
                    updated.documents.len()
                );
                Ok(updated)
            }
            AppendOutcome::Missing => Err(LifecycleError::NotFound { id }),
            AppendOutcome::Terminal(current) => Err(LifecycleError::InvalidState {
                id,
                current,
                attempted: LifecycleAction::AttachDocument,
            }),
            AppendOutcome::Full => Err(LifecycleError::validation(
                "reference",
                format!("at most {} documents may be attached", self.policy.max_documents),
            )),
        }
    }

    pub async fn get(&self, id: i64) -> Result<SellRequest, LifecycleError> {
        self.store
            .find(id)
            .await?
            .ok_or(LifecycleError::NotFound { id })
    }

    /// Never fails on an empty match; only store errors surface.
    pub async fn query(
        &self,
        filter: SellRequestFilter,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<Vec<SellRequest>, LifecycleError> {
        let filter = normalize_filter(filter);
        let page = self.policy.page(limit, offset);
        let requests = self.store.query(&filter, page).await?;
        assert!(
            requests.len() as u64 <= page.limit,
            "Store returned more requests than requested"
        );
        Ok(requests)
    }

    pub async fn stats(&self, filter: SellRequestFilter) -> Result<SellRequestStats, LifecycleError> {
        let filter = normalize_filter(filter);
        let tallies = self.store.tally(&filter).await?;
        Ok(SellRequestStats::from_tallies(&tallies))
    }

    /// Approved requests still waiting for settlement after `older_than`
    /// (the configured threshold when `None`).
    pub async fn stale_approvals(
        &self,
        older_than: Option<Duration>,
        limit: Option<u64>,
    ) -> Result<Vec<SellRequest>, LifecycleError> {
        let threshold = older_than.unwrap_or(self.policy.stale_approval_after);
        let cutoff = self.clock.now() - threshold;
        let page = self.policy.page(limit, None);
        Ok(self.store.approved_before(cutoff, page.limit).await?)
    }

    pub async fn ping(&self) -> Result<(), LifecycleError> {
        Ok(self.store.ping().await?)
    }

    async fn apply(
        &self,
        id: i64,
        expected: SellRequestStatus,
        transition: Transition,
        attempted: LifecycleAction,
    ) -> Result<SellRequest, LifecycleError> {
        let target = transition.target();
        match self.store.transition(id, expected, transition).await? {
            TransitionOutcome::Applied(updated) => {
                assert_eq!(updated.status, target, "Store applied a different status");
                assert!(
                    updated.metadata_consistent(),
                    "Transition left inconsistent review/settlement metadata"
                );
                Ok(updated)
            }
            TransitionOutcome::Missing => Err(LifecycleError::NotFound { id }),
            TransitionOutcome::StatusMismatch(current) => Err(LifecycleError::InvalidState {
                id,
                current,
                attempted,
            }),
        }
    }
}

/// Wallet filters match the stored lowercase form.
fn normalize_filter(mut filter: SellRequestFilter) -> SellRequestFilter {
    filter.wallet_address = filter
        .wallet_address
        .map(|wallet| wallet.trim().to_ascii_lowercase())
        .filter(|wallet| !wallet.is_empty());
    filter
}
