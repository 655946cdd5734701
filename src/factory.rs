// ============================================================================
// Pool Factory - Coverpool Protocol Core
// ============================================================================
//
// Registry and deployer of markets. Each market is a (vault, pair, router)
// triple wired together at creation: the vault owns the two claim tokens,
// the pair prices them, and the router is the user-facing surface. Pools
// are addressed by creation index and never removed.
//
// ============================================================================

use crate::claim_token::ClaimToken;
use crate::collateral::Collateral;
use crate::error::MarketError;
use crate::pair::{Pair, PairQuotes};
use crate::router::{InitReceipt, LiquidityReceipt, Router, TradeReceipt};
use crate::vault::Vault;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Emitted once per create_pool; drained by the host application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolCreated {
    pub id: String,
    pub index: usize,
    pub name: String,
    pub creator: String,
    pub timestamp: i64,
}

/// One deployed market: vault, AMM pair, and router under a shared name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub name: String,
    pub vault: Vault,
    pub pair: Pair,
    pub router: Router,
}

impl Market {
    pub fn initialize(
        &mut self,
        collateral: &mut Collateral,
        caller: &str,
        amount: Decimal,
        risk_percent: u32,
    ) -> Result<InitReceipt, MarketError> {
        self.router
            .initialize(&mut self.vault, &mut self.pair, collateral, caller, amount, risk_percent)
    }

    pub fn buy_si(
        &mut self,
        collateral: &mut Collateral,
        caller: &str,
        amount: Decimal,
        min_out: Option<Decimal>,
    ) -> Result<TradeReceipt, MarketError> {
        self.router
            .buy_si(&mut self.vault, &mut self.pair, collateral, caller, amount, min_out)
    }

    pub fn buy_no(
        &mut self,
        collateral: &mut Collateral,
        caller: &str,
        amount: Decimal,
        min_out: Option<Decimal>,
    ) -> Result<TradeReceipt, MarketError> {
        self.router
            .buy_no(&mut self.vault, &mut self.pair, collateral, caller, amount, min_out)
    }

    pub fn sell_si(
        &mut self,
        collateral: &mut Collateral,
        caller: &str,
        amount: Decimal,
        min_out: Option<Decimal>,
    ) -> Result<TradeReceipt, MarketError> {
        self.router
            .sell_si(&mut self.vault, &mut self.pair, collateral, caller, amount, min_out)
    }

    pub fn sell_no(
        &mut self,
        collateral: &mut Collateral,
        caller: &str,
        amount: Decimal,
        min_out: Option<Decimal>,
    ) -> Result<TradeReceipt, MarketError> {
        self.router
            .sell_no(&mut self.vault, &mut self.pair, collateral, caller, amount, min_out)
    }

    pub fn add_liquidity(
        &mut self,
        collateral: &mut Collateral,
        caller: &str,
        amount: Decimal,
        min_shares: Option<Decimal>,
    ) -> Result<LiquidityReceipt, MarketError> {
        self.router
            .add_liquidity(&mut self.vault, &mut self.pair, collateral, caller, amount, min_shares)
    }

    pub fn remove_liquidity_zap(
        &mut self,
        collateral: &mut Collateral,
        caller: &str,
        shares: Decimal,
        min_out: Option<Decimal>,
    ) -> Result<LiquidityReceipt, MarketError> {
        self.router
            .remove_liquidity_zap(&mut self.vault, &mut self.pair, collateral, caller, shares, min_out)
    }

    pub fn resolve(&mut self, caller: &str, scale: Decimal) -> Result<(), MarketError> {
        self.vault.resolve(caller, scale)
    }

    pub fn claim(
        &mut self,
        collateral: &mut Collateral,
        caller: &str,
        amount: Decimal,
        is_si: bool,
    ) -> Result<Decimal, MarketError> {
        self.vault.claim(collateral, caller, amount, is_si)
    }

    pub fn quotes(&self) -> Option<PairQuotes> {
        self.pair.quotes()
    }

    pub fn liquidity_router(&self) -> &str {
        self.router.liquidity_router()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolFactory {
    /// External liquidity-infrastructure reference handed to every router
    pub liquidity_router: String,
    /// Swap fee applied to newly created pairs, in basis points
    pub fee_bps: u32,
    pools: Vec<Market>,
    events: Vec<PoolCreated>,
}

impl PoolFactory {
    pub fn new(liquidity_router: &str) -> Self {
        Self::with_fee(liquidity_router, 0)
    }

    pub fn with_fee(liquidity_router: &str, fee_bps: u32) -> Self {
        Self {
            liquidity_router: liquidity_router.to_string(),
            fee_bps,
            pools: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Deploy a new market. `caller` becomes the resolver of its vault.
    pub fn create_pool(
        &mut self,
        caller: &str,
        name: &str,
        symbol_si: &str,
        symbol_no: &str,
    ) -> Result<usize, MarketError> {
        if name.trim().is_empty() || symbol_si.trim().is_empty() || symbol_no.trim().is_empty() {
            return Err(MarketError::InvalidName);
        }

        let index = self.pools.len();
        let vault_account = format!("vault:{index}");
        let router_account = format!("router:{index}");
        let pair_account = format!("pair:{index}");

        let token_si = ClaimToken::new(&format!("{name} Coverage"), symbol_si, &vault_account);
        let token_no = ClaimToken::new(&format!("{name} Yield"), symbol_no, &vault_account);
        let vault = Vault::new(&vault_account, caller, token_si, token_no);
        let pair = Pair::new(&pair_account, self.fee_bps);
        let router = Router::new(&router_account, &self.liquidity_router);

        self.pools.push(Market {
            name: name.to_string(),
            vault,
            pair,
            router,
        });
        self.events.push(PoolCreated {
            id: Uuid::new_v4().to_string(),
            index,
            name: name.to_string(),
            creator: caller.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        });

        info!(index, name, creator = caller, "pool created");
        Ok(index)
    }

    pub fn pools_len(&self) -> usize {
        self.pools.len()
    }

    pub fn pool(&self, index: usize) -> Result<&Market, MarketError> {
        self.pools.get(index).ok_or(MarketError::IndexOutOfRange {
            index,
            len: self.pools.len(),
        })
    }

    pub fn pool_mut(&mut self, index: usize) -> Result<&mut Market, MarketError> {
        let len = self.pools.len();
        self.pools
            .get_mut(index)
            .ok_or(MarketError::IndexOutOfRange { index, len })
    }

    /// Take the pending creation events, leaving the queue empty
    pub fn drain_events(&mut self) -> Vec<PoolCreated> {
        std::mem::take(&mut self.events)
    }
}
