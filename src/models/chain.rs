use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainHeadView {
    pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceView {
    pub address: String,
    /// Decimal string; wei amounts overflow JSON numbers.
    pub balance_wei: String,
}
