use std::sync::Arc;
use std::time::Instant;

use crate::accounts::AccountDirectory;
use crate::lifecycle::SellRequestManager;
use crate::rpc::RpcClient;

#[derive(Clone)]
pub struct AppState {
    pub requests: Arc<SellRequestManager>,
    pub accounts: Arc<AccountDirectory>,
    pub rpc: RpcClient,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        requests: Arc<SellRequestManager>,
        accounts: Arc<AccountDirectory>,
        rpc: RpcClient,
    ) -> Self {
        Self {
            requests,
            accounts,
            rpc,
            start_time: Instant::now(),
        }
    }
}
