use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Duration;

use crate::lifecycle::{ReviewSellRequest, SellRequestFilter, SubmitSellRequest};
use crate::models::sell_request::{
    AttachDocumentBody, ReviewSellRequestBody, SellRequestQuery, SellRequestStatsView,
    SellRequestView, SettleSellRequestBody, StaleApprovalsQuery, StatsQuery,
    SubmitSellRequestBody,
};
use crate::state::AppState;

use super::HttpError;

const MAX_STALE_THRESHOLD_HOURS: i64 = 24 * 365;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sell-requests", get(list_requests).post(submit_request))
        .route("/sell-requests/stats", get(request_stats))
        .route("/sell-requests/stale-approvals", get(stale_approvals))
        .route("/sell-requests/{id}", get(get_request))
        .route("/sell-requests/{id}/review", patch(review_request))
        .route("/sell-requests/{id}/settle", patch(settle_request))
        .route("/sell-requests/{id}/documents", post(attach_document))
}

async fn submit_request(
    State(state): State<AppState>,
    body: Result<Json<SubmitSellRequestBody>, JsonRejection>,
) -> Result<(StatusCode, Json<SellRequestView>), HttpError> {
    let Json(body) = body?;
    let created = state
        .requests
        .submit(SubmitSellRequest {
            user_id: body.user_id,
            wallet_address: body.wallet_address,
            amount: body.amount,
            price: body.price,
            description: body.description,
            documents: body.documents,
            source: body.source,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn list_requests(
    query: Result<Query<SellRequestQuery>, QueryRejection>,
    State(state): State<AppState>,
) -> Result<Json<Vec<SellRequestView>>, HttpError> {
    let Query(query) = query?;
    let filter = SellRequestFilter {
        user_id: query.user_id,
        wallet_address: query.wallet_address,
        status: query.status,
    };
    let requests = state
        .requests
        .query(filter, query.limit, query.offset)
        .await?;
    Ok(Json(requests.into_iter().map(Into::into).collect()))
}

async fn request_stats(
    query: Result<Query<StatsQuery>, QueryRejection>,
    State(state): State<AppState>,
) -> Result<Json<SellRequestStatsView>, HttpError> {
    let Query(query) = query?;
    let filter = SellRequestFilter {
        user_id: query.user_id,
        wallet_address: query.wallet_address,
        status: None,
    };
    let stats = state.requests.stats(filter).await?;
    Ok(Json(stats.into()))
}

async fn stale_approvals(
    query: Result<Query<StaleApprovalsQuery>, QueryRejection>,
    State(state): State<AppState>,
) -> Result<Json<Vec<SellRequestView>>, HttpError> {
    let Query(query) = query?;
    let older_than = match query.older_than_hours {
        Some(hours) if !(0..=MAX_STALE_THRESHOLD_HOURS).contains(&hours) => {
            return Err(HttpError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("older_than_hours must be between 0 and {MAX_STALE_THRESHOLD_HOURS}"),
            )
            .with_field("older_than_hours"));
        }
        Some(hours) => Some(Duration::hours(hours)),
        None => None,
    };
    let requests = state
        .requests
        .stale_approvals(older_than, query.limit)
        .await?;
    Ok(Json(requests.into_iter().map(Into::into).collect()))
}

async fn get_request(
    id: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
) -> Result<Json<SellRequestView>, HttpError> {
    let Path(id) = id?;
    let request = state.requests.get(id).await?;
    Ok(Json(request.into()))
}

async fn review_request(
    id: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
    body: Result<Json<ReviewSellRequestBody>, JsonRejection>,
) -> Result<Json<SellRequestView>, HttpError> {
    let Path(id) = id?;
    let Json(body) = body?;
    let reviewed = state
        .requests
        .review(
            id,
            ReviewSellRequest {
                reviewer_id: body.reviewer_id,
                decision: body.decision,
                admin_notes: body.admin_notes,
            },
        )
        .await?;
    Ok(Json(reviewed.into()))
}

async fn settle_request(
    id: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
    body: Result<Json<SettleSellRequestBody>, JsonRejection>,
) -> Result<Json<SellRequestView>, HttpError> {
    let Path(id) = id?;
    let Json(body) = body?;
    let settled = state
        .requests
        .settle(id, &body.transaction_hash)
        .await?;
    Ok(Json(settled.into()))
}

async fn attach_document(
    id: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
    body: Result<Json<AttachDocumentBody>, JsonRejection>,
) -> Result<Json<SellRequestView>, HttpError> {
    let Path(id) = id?;
    let Json(body) = body?;
    let updated = state
        .requests
        .attach_document(id, &body.reference)
        .await?;
    Ok(Json(updated.into()))
}
