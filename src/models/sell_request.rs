use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::{
    RequestSource, ReviewDecision, SellRequest, SellRequestStats, SellRequestStatus, StatusTally,
};

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitSellRequestBody {
    pub user_id: i64,
    pub wallet_address: String,
    pub amount: i64,
    pub price: f64,
    pub description: Option<String>,
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub source: RequestSource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewSellRequestBody {
    pub reviewer_id: i64,
    pub decision: ReviewDecision,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettleSellRequestBody {
    pub transaction_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachDocumentBody {
    pub reference: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SellRequestQuery {
    pub user_id: Option<i64>,
    pub wallet_address: Option<String>,
    pub status: Option<SellRequestStatus>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsQuery {
    pub user_id: Option<i64>,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaleApprovalsQuery {
    pub older_than_hours: Option<i64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellRequestView {
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

impl From<SellRequest> for SellRequestView {
    fn from(request: SellRequest) -> Self {
        Self {
            id: request.id,
            user_id: request.user_id,
            wallet_address: request.wallet_address,
            amount: request.amount,
            price: request.price,
            status: request.status,
            description: request.description,
            admin_notes: request.admin_notes,
            reviewed_by: request.reviewed_by,
            review_date: request.review_date,
            completed_date: request.completed_date,
            transaction_hash: request.transaction_hash,
            source: request.source,
            documents: request.documents,
            submitted_date: request.submitted_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTallyView {
    pub status: SellRequestStatus,
    pub count: u64,
    pub credits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellRequestStatsView {
    pub total_requests: u64,
    pub total_credits: u64,
    pub by_status: Vec<StatusTallyView>,
}

impl From<SellRequestStats> for SellRequestStatsView {
    fn from(stats: SellRequestStats) -> Self {
        Self {
            total_requests: stats.total_requests,
            total_credits: stats.total_credits,
            by_status: stats
                .by_status
                .into_iter()
                .map(|StatusTally { status, count, credits }| StatusTallyView {
                    status,
                    count,
                    credits,
                })
                .collect(),
        }
    }
}
