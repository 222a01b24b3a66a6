//! Read-only JSON-RPC access to the chain node, used for balance reporting and
//! readiness. Settlement transactions are never built or sent from here.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;

#[derive(Clone)]
pub struct RpcClient {
    inner: HttpClient,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        assert!(!endpoint.is_empty(), "RPC endpoint must be provided");
        assert!(
            timeout >= Duration::from_millis(100),
            "Timeout below 100ms is unsafe"
        );

        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(endpoint)
            .with_context(|| format!("Failed to build RPC client for {endpoint}"))?;

        Ok(Self {
            inner: client,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        assert!(
            self.timeout <= Duration::from_secs(60),
            "Timeout exceeds maximum bound"
        );
        self.timeout
    }

    pub async fn fetch_latest_block_number(&self) -> Result<u64> {
        let raw: String = self
            .inner
            .request("eth_blockNumber", rpc_params![])
            .await
            .context("RPC call eth_blockNumber failed")?;
        let block_number = parse_quantity(&raw).context("Malformed eth_blockNumber response")?;
        u64::try_from(block_number).map_err(|_| anyhow!("Block height exceeds u64: {raw}"))
    }

    /// Balance in wei at the latest block. `address` must already be normalized.
    pub async fn fetch_balance(&self, address: &str) -> Result<u128> {
        let raw: String = self
            .inner
            .request("eth_getBalance", rpc_params![address, "latest"])
            .await
            .context("RPC call eth_getBalance failed")?;
        parse_quantity(&raw).context("Malformed eth_getBalance response")
    }
}

/// Parses an Ethereum JSON-RPC hex quantity (`0x`-prefixed, no leading zeros
/// beyond `0x0`).
fn parse_quantity(raw: &str) -> Result<u128> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| anyhow!("quantity {raw:?} lacks 0x prefix"))?;
    if digits.is_empty() {
        return Err(anyhow!("quantity {raw:?} has no digits"));
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return Err(anyhow!("quantity {raw:?} has leading zeros"));
    }
    if digits.len() > 32 {
        return Err(anyhow!("quantity {raw:?} exceeds 128 bits"));
    }
    u128::from_str_radix(digits, 16).map_err(|err| anyhow!("quantity {raw:?}: {err}"))
}
