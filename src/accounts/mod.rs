//! Account directory: registration, lookups and the identity capability the
//! lifecycle manager consults when a reviewer acts on a request.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::CacheConfig;
use crate::lifecycle::{Clock, IdentityProvider, StoreError};
use crate::validation::{canonicalize_account_name, normalize_email, normalize_wallet_address};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    #[default]
    User,
    Admin,
}

impl AccountRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            AccountRole::User => "user",
            AccountRole::Admin => "admin",
        }
    }
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(AccountRole::User),
            "admin" => Ok(AccountRole::Admin),
            other => Err(format!("Unknown account role: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub wallet_address: Option<String>,
    pub role: AccountRole,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.role == AccountRole::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub wallet_address: Option<String>,
    pub role: AccountRole,
    pub created_at: DateTime<Utc>,
}

/// Unvalidated registration input.
#[derive(Debug, Clone, Default)]
pub struct RegisterAccount {
    pub name: String,
    pub email: String,
    pub wallet_address: Option<String>,
    pub role: AccountRole,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the email is taken.
    async fn insert(&self, account: NewAccount) -> Result<Account, StoreError>;

    async fn find(&self, id: i64) -> Result<Option<Account>, StoreError>;
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("account {id} not found")]
    NotFound { id: i64 },

    #[error("email {email} is already registered")]
    DuplicateEmail { email: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct AccountDirectory {
    store: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
    cache: Cache<i64, Arc<Account>>,
}

impl AccountDirectory {
    pub fn new(store: Arc<dyn AccountStore>, clock: Arc<dyn Clock>, config: &CacheConfig) -> Self {
        assert!(
            config.accounts_max_capacity >= 10,
            "Account cache capacity threshold"
        );
        let cache = Cache::builder()
            .max_capacity(config.accounts_max_capacity)
            .time_to_live(Duration::from_secs(config.accounts_ttl_seconds))
            .build();
        Self {
            store,
            clock,
            cache,
        }
    }

    pub async fn register(&self, request: RegisterAccount) -> Result<Account, AccountError> {
        let name = canonicalize_account_name(&request.name).map_err(|err| {
            AccountError::Validation {
                field: "name",
                message: err.to_string(),
            }
        })?;
        let email = normalize_email(&request.email).map_err(|err| AccountError::Validation {
            field: "email",
            message: err.to_string(),
        })?;
        let wallet_address = request
            .wallet_address
            .as_deref()
            .map(normalize_wallet_address)
            .transpose()
            .map_err(|err| AccountError::Validation {
                field: "wallet_address",
                message: err.to_string(),
            })?;

        let draft = NewAccount {
            name,
            email: email.clone(),
            wallet_address,
            role: request.role,
            created_at: self.clock.now(),
        };

        let account = match self.store.insert(draft).await {
            Ok(account) => account,
            Err(StoreError::Duplicate(_)) => return Err(AccountError::DuplicateEmail { email }),
            Err(err) => return Err(err.into()),
        };

        info!("Registered {} account {}", account.role, account.id);
        self.cache.insert(account.id, Arc::new(account.clone())).await;
        Ok(account)
    }

    pub async fn get(&self, id: i64) -> Result<Account, AccountError> {
        self.lookup(id)
            .await?
            .map(|account| (*account).clone())
            .ok_or(AccountError::NotFound { id })
    }

    pub fn cached_entries(&self) -> u64 {
        self.cache.entry_count()
    }

    async fn lookup(&self, id: i64) -> Result<Option<Arc<Account>>, StoreError> {
        if let Some(cached) = self.cache.get(&id).await {
            return Ok(Some(cached));
        }
        let Some(account) = self.store.find(id).await? else {
            return Ok(None);
        };
        let account = Arc::new(account);
        self.cache.insert(id, Arc::clone(&account)).await;
        Ok(Some(account))
    }
}

#[async_trait]
impl IdentityProvider for AccountDirectory {
    async fn account(&self, id: i64) -> Result<Option<Account>, StoreError> {
        Ok(self.lookup(id).await?.map(|account| (*account).clone()))
    }
}
