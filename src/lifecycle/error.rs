use std::fmt::Display;

use thiserror::Error;

use super::ports::StoreError;
use super::types::{LifecycleAction, SellRequestStatus};

/// Caller-recoverable lifecycle failures. None of these are retried inside
/// the manager.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("sell request {id} not found")]
    NotFound { id: i64 },

    #[error("cannot {attempted} sell request {id} while it is {current}")]
    InvalidState {
        id: i64,
        current: SellRequestStatus,
        attempted: LifecycleAction,
    },

    #[error("account {account_id} is not allowed to review sell requests")]
    Forbidden { account_id: i64 },

    #[error("a live sell request already exists for this account and wallet")]
    Conflict { existing_id: Option<i64> },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LifecycleError {
    pub fn validation(field: &'static str, message: impl Display) -> Self {
        LifecycleError::Validation {
            field,
            message: message.to_string(),
        }
    }
}
