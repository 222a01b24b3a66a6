use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::accounts::{Account, AccountRole};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterAccountBody {
    pub name: String,
    pub email: String,
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub role: AccountRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub wallet_address: Option<String>,
    pub role: AccountRole,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
            wallet_address: account.wallet_address,
            role: account.role,
            created_at: account.created_at,
        }
    }
}
