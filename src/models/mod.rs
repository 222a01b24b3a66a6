pub mod account;
pub mod chain;
pub mod sell_request;
