use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::accounts::RegisterAccount;
use crate::models::account::{AccountView, RegisterAccountBody};
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/accounts", post(register_account))
        .route("/accounts/{id}", get(get_account))
}

async fn register_account(
    State(state): State<AppState>,
    body: Result<Json<RegisterAccountBody>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountView>), HttpError> {
    let Json(body) = body?;
    let account = state
        .accounts
        .register(RegisterAccount {
            name: body.name,
            email: body.email,
            wallet_address: body.wallet_address,
            role: body.role,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(account.into())))
}

async fn get_account(
    id: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
) -> Result<Json<AccountView>, HttpError> {
    let Path(id) = id?;
    let account = state.accounts.get(id).await?;
    Ok(Json(account.into()))
}
