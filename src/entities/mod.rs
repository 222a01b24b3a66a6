pub mod account;
pub mod sell_request;
