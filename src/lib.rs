/// Coverpool Binary-Outcome Coverage Market
/// Exports all modules for use as a library crate

pub mod claim_token;
pub mod collateral;
pub mod error;
pub mod factory;
pub mod math;
pub mod pair;
pub mod router;
pub mod vault;

pub use claim_token::ClaimToken;
pub use collateral::Collateral;
pub use error::MarketError;
pub use factory::{Market, PoolCreated, PoolFactory};
pub use math::AMOUNT_DP;
pub use pair::{Asset, Pair, PairQuotes};
pub use router::{
    InitReceipt, LiquidityAction, LiquidityReceipt, Router, TradeAction, TradeReceipt,
};
pub use vault::Vault;
