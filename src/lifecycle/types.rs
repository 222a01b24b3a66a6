use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SellRequestStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl SellRequestStatus {
    pub const ALL: [SellRequestStatus; 4] = [
        SellRequestStatus::Pending,
        SellRequestStatus::Approved,
        SellRequestStatus::Rejected,
        SellRequestStatus::Completed,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            SellRequestStatus::Pending => "pending",
            SellRequestStatus::Approved => "approved",
            SellRequestStatus::Rejected => "rejected",
            SellRequestStatus::Completed => "completed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            SellRequestStatus::Rejected | SellRequestStatus::Completed
        )
    }

    /// Pending or approved: still waiting on an admin or on settlement.
    pub const fn is_live(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for SellRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SellRequestStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(SellRequestStatus::Pending),
            "approved" => Ok(SellRequestStatus::Approved),
            "rejected" => Ok(SellRequestStatus::Rejected),
            "completed" => Ok(SellRequestStatus::Completed),
            other => Err(format!("Unknown sell request status: {other}")),
        }
    }
}

/// Where a request came from. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestSource {
    #[default]
    UserSubmission,
    BlockchainAudit,
    AdminRegistration,
}

impl RequestSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            RequestSource::UserSubmission => "user-submission",
            RequestSource::BlockchainAudit => "blockchain-audit",
            RequestSource::AdminRegistration => "admin-registration",
        }
    }
}

impl FromStr for RequestSource {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user-submission" => Ok(RequestSource::UserSubmission),
            "blockchain-audit" => Ok(RequestSource::BlockchainAudit),
            "admin-registration" => Ok(RequestSource::AdminRegistration),
            other => Err(format!("Unknown request source: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub const fn target_status(self) -> SellRequestStatus {
        match self {
            ReviewDecision::Approve => SellRequestStatus::Approved,
            ReviewDecision::Reject => SellRequestStatus::Rejected,
        }
    }
}

/// The operation a caller attempted, reported back on state conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Review,
    Settle,
    AttachDocument,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LifecycleAction::Review => "review",
            LifecycleAction::Settle => "settle",
            LifecycleAction::AttachDocument => "attach document to",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SellRequest {
    pub id: i64,
    pub user_id: i64,
    pub wallet_address: String,
    pub amount: u64,
    pub price: f64,
    pub status: SellRequestStatus,
    pub description: Option<String>,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<i64>,
    pub review_date: Option<DateTime<Utc>>,
    pub completed_date: Option<DateTime<Utc>>,
    pub transaction_hash: Option<String>,
    pub source: RequestSource,
    pub documents: Vec<String>,
    pub submitted_date: DateTime<Utc>,
}

impl SellRequest {
    /// Review metadata is present exactly when the request left `pending`;
    /// settlement metadata exactly when it is `completed`.
    pub fn metadata_consistent(&self) -> bool {
        let reviewed = self.reviewed_by.is_some() && self.review_date.is_some();
        let unreviewed = self.reviewed_by.is_none() && self.review_date.is_none();
        let settled = self.completed_date.is_some() && self.transaction_hash.is_some();
        let unsettled = self.completed_date.is_none() && self.transaction_hash.is_none();
        match self.status {
            SellRequestStatus::Pending => unreviewed && unsettled,
            SellRequestStatus::Approved | SellRequestStatus::Rejected => reviewed && unsettled,
            SellRequestStatus::Completed => reviewed && settled,
        }
    }
}

/// A validated submission, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSellRequest {
    pub user_id: i64,
    pub wallet_address: String,
    pub amount: u64,
    pub price: f64,
    pub description: Option<String>,
    pub documents: Vec<String>,
    pub source: RequestSource,
    pub submitted_date: DateTime<Utc>,
}

/// Status change plus the side-channel fields written with it.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Reviewed {
        status: SellRequestStatus,
        reviewed_by: i64,
        admin_notes: Option<String>,
        at: DateTime<Utc>,
    },
    Settled {
        transaction_hash: String,
        at: DateTime<Utc>,
    },
}

impl Transition {
    pub fn target(&self) -> SellRequestStatus {
        match self {
            Transition::Reviewed { status, .. } => *status,
            Transition::Settled { .. } => SellRequestStatus::Completed,
        }
    }

    pub fn apply(&self, request: &mut SellRequest) {
        match self {
            Transition::Reviewed {
                status,
                reviewed_by,
                admin_notes,
                at,
            } => {
                request.status = *status;
                request.reviewed_by = Some(*reviewed_by);
                request.review_date = Some(*at);
                request.admin_notes = admin_notes.clone();
            }
            Transition::Settled {
                transaction_hash,
                at,
            } => {
                request.status = SellRequestStatus::Completed;
                request.transaction_hash = Some(transaction_hash.clone());
                request.completed_date = Some(*at);
            }
        }
    }
}

/// Result of a compare-and-set transition against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(SellRequest),
    Missing,
    /// The stored status no longer matched the expected one.
    StatusMismatch(SellRequestStatus),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    Appended(SellRequest),
    Missing,
    Terminal(SellRequestStatus),
    Full,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SellRequestFilter {
    pub user_id: Option<i64>,
    pub wallet_address: Option<String>,
    pub status: Option<SellRequestStatus>,
}

impl SellRequestFilter {
    pub fn matches(&self, request: &SellRequest) -> bool {
        self.user_id.is_none_or(|user_id| request.user_id == user_id)
            && self
                .wallet_address
                .as_deref()
                .is_none_or(|wallet| request.wallet_address == wallet)
            && self.status.is_none_or(|status| request.status == status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTally {
    pub status: SellRequestStatus,
    pub count: u64,
    pub credits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellRequestStats {
    pub total_requests: u64,
    pub total_credits: u64,
    /// One entry per status, in lifecycle order.
    pub by_status: Vec<StatusTally>,
}

impl SellRequestStats {
    pub fn from_tallies(tallies: &[StatusTally]) -> Self {
        let by_status = SellRequestStatus::ALL
            .iter()
            .map(|status| {
                tallies
                    .iter()
                    .filter(|tally| tally.status == *status)
                    .fold(
                        StatusTally {
                            status: *status,
                            count: 0,
                            credits: 0,
                        },
                        |acc, tally| StatusTally {
                            status: acc.status,
                            count: acc.count + tally.count,
                            credits: acc.credits.saturating_add(tally.credits),
                        },
                    )
            })
            .collect::<Vec<_>>();
        let total_requests = by_status.iter().map(|tally| tally.count).sum();
        let total_credits = by_status
            .iter()
            .fold(0u64, |sum, tally| sum.saturating_add(tally.credits));
        Self {
            total_requests,
            total_credits,
            by_status,
        }
    }
}
