use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::models::chain::{BalanceView, ChainHeadView};
use crate::state::AppState;
use crate::validation::normalize_wallet_address;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chain/head", get(chain_head))
        .route("/chain/balance/{address}", get(wallet_balance))
}

async fn chain_head(State(state): State<AppState>) -> Result<Json<ChainHeadView>, HttpError> {
    let block_number = state
        .rpc
        .fetch_latest_block_number()
        .await
        .map_err(|err| HttpError::new(StatusCode::BAD_GATEWAY, format!("{err:#}")))?;
    Ok(Json(ChainHeadView { block_number }))
}

async fn wallet_balance(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<BalanceView>, HttpError> {
    let address = normalize_wallet_address(&address).map_err(|err| {
        HttpError::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()).with_field("address")
    })?;

    let balance = state
        .rpc
        .fetch_balance(&address)
        .await
        .map_err(|err| HttpError::new(StatusCode::BAD_GATEWAY, format!("{err:#}")))?;

    Ok(Json(BalanceView {
        address,
        balance_wei: balance.to_string(),
    }))
}
