// ============================================================================
// Router - Coverpool Protocol Core
// ============================================================================
//
// Per-market façade composing Vault and Pair operations into single-asset
// user actions: buy/sell coverage or yield exposure with collateral only,
// and add/remove liquidity with collateral only (zaps). The router holds no
// state beyond its ledger account and the external liquidity-infrastructure
// reference.
//
// Every operation plans its sub-steps from read-only quotes before the
// first mutation, so a validation failure leaves all ledgers unchanged.
// Price-sensitive operations take an optional minimum-output bound and fail
// rather than under-deliver when the bound is violated. Callers should
// grant exact, single-use allowances to the router account per operation.
//
// ============================================================================

use crate::collateral::Collateral;
use crate::error::MarketError;
use crate::math;
use crate::pair::{Asset, Pair};
use crate::vault::Vault;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiquidityAction {
    Add,
    Remove,
}

/// Record of a completed buy or sell (the caller-facing analogue of a
/// swap result)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub id: String,
    pub trader: String,
    pub action: TradeAction,
    pub asset: Asset,
    /// Collateral spent (buy) or claim tokens sold (sell)
    pub amount_in: Decimal,
    /// Claim tokens delivered (buy) or collateral paid out (sell)
    pub amount_out: Decimal,
    /// Pair legs minted (buy) or redeemed (sell) through the vault
    pub pair_amount: Decimal,
    pub new_probability_si: Option<Decimal>,
    pub timestamp: i64,
}

/// Record of a completed liquidity zap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityReceipt {
    pub id: String,
    pub provider: String,
    pub action: LiquidityAction,
    pub collateral_in: Decimal,
    pub collateral_out: Decimal,
    pub shares: Decimal,
    /// Residual claim tokens returned to the provider
    pub dust_si: Decimal,
    pub dust_no: Decimal,
    pub timestamp: i64,
}

/// Record of the one-shot market seeding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitReceipt {
    pub id: String,
    pub caller: String,
    pub collateral_in: Decimal,
    pub risk_percent: u32,
    pub seeded_si: Decimal,
    pub seeded_no: Decimal,
    /// Complementary exposure handed back to the initializer
    pub leftover_si: Decimal,
    pub leftover_no: Decimal,
    pub shares: Decimal,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Router {
    /// Ledger account the router trades through
    pub account: String,
    /// External liquidity-infrastructure reference, for callers managing
    /// liquidity shares directly instead of through the zap helpers
    pub liquidity_router: String,
}

impl Router {
    pub fn new(account: &str, liquidity_router: &str) -> Self {
        Self {
            account: account.to_string(),
            liquidity_router: liquidity_router.to_string(),
        }
    }

    /// The external liquidity-router reference (manual LP fallback path)
    pub fn liquidity_router(&self) -> &str {
        &self.liquidity_router
    }

    // ------------------------------------------------------------------
    // Market seeding
    // ------------------------------------------------------------------

    /// Pull collateral from the caller, initialize the vault, and seed the
    /// pair with a `risk_percent` / `100 - risk_percent` reserve split. The
    /// split fixes the initial implied probability; the complementary
    /// leftovers go back to the caller.
    pub fn initialize(
        &self,
        vault: &mut Vault,
        pair: &mut Pair,
        collateral: &mut Collateral,
        caller: &str,
        amount: Decimal,
        risk_percent: u32,
    ) -> Result<InitReceipt, MarketError> {
        if vault.is_initialized() {
            return Err(MarketError::AlreadyInitialized);
        }
        if risk_percent > 100 {
            return Err(MarketError::InvalidScale(Decimal::from(risk_percent)));
        }
        let amount = math::positive_amount(amount)?;

        let hundred = Decimal::ONE_HUNDRED;
        let seeded_si = math::mul_div(amount, Decimal::from(risk_percent), hundred)?;
        let seeded_no = math::mul_div(amount, Decimal::from(100 - risk_percent), hundred)?;
        if seeded_si <= Decimal::ZERO || seeded_no <= Decimal::ZERO {
            // a one-sided pool cannot price anything
            return Err(MarketError::InsufficientLiquidity);
        }

        collateral.transfer_from(&self.account, caller, &self.account, amount)?;
        vault.initialize(collateral, &self.account, amount, &self.account)?;

        let (token_si, token_no) = vault.tokens_mut();
        let shares = pair.seed(token_si, token_no, &self.account, caller, seeded_si, seeded_no)?;

        let leftover_si = amount - seeded_si;
        let leftover_no = amount - seeded_no;
        if leftover_si > Decimal::ZERO {
            token_si.transfer(&self.account, caller, leftover_si)?;
        }
        if leftover_no > Decimal::ZERO {
            token_no.transfer(&self.account, caller, leftover_no)?;
        }

        info!(router = %self.account, caller, %amount, risk_percent, "market initialized");
        Ok(InitReceipt {
            id: Uuid::new_v4().to_string(),
            caller: caller.to_string(),
            collateral_in: amount,
            risk_percent,
            seeded_si,
            seeded_no,
            leftover_si,
            leftover_no,
            shares,
            timestamp: now(),
        })
    }

    // ------------------------------------------------------------------
    // Trading
    // ------------------------------------------------------------------

    /// Buy coverage exposure: mint a pair with the caller's collateral and
    /// swap the minted NO leg into additional SI.
    pub fn buy_si(
        &self,
        vault: &mut Vault,
        pair: &mut Pair,
        collateral: &mut Collateral,
        caller: &str,
        collateral_in: Decimal,
        min_out: Option<Decimal>,
    ) -> Result<TradeReceipt, MarketError> {
        self.execute_buy(vault, pair, collateral, caller, collateral_in, Asset::Si, min_out)
    }

    /// Buy yield exposure: the mirror of buy_si
    pub fn buy_no(
        &self,
        vault: &mut Vault,
        pair: &mut Pair,
        collateral: &mut Collateral,
        caller: &str,
        collateral_in: Decimal,
        min_out: Option<Decimal>,
    ) -> Result<TradeReceipt, MarketError> {
        self.execute_buy(vault, pair, collateral, caller, collateral_in, Asset::No, min_out)
    }

    /// Sell coverage tokens back to collateral: swap part of the position
    /// into NO so both legs match, then redeem the matched pair.
    pub fn sell_si(
        &self,
        vault: &mut Vault,
        pair: &mut Pair,
        collateral: &mut Collateral,
        caller: &str,
        token_in: Decimal,
        min_out: Option<Decimal>,
    ) -> Result<TradeReceipt, MarketError> {
        self.execute_sell(vault, pair, collateral, caller, token_in, Asset::Si, min_out)
    }

    /// Sell yield tokens back to collateral: the mirror of sell_si
    pub fn sell_no(
        &self,
        vault: &mut Vault,
        pair: &mut Pair,
        collateral: &mut Collateral,
        caller: &str,
        token_in: Decimal,
        min_out: Option<Decimal>,
    ) -> Result<TradeReceipt, MarketError> {
        self.execute_sell(vault, pair, collateral, caller, token_in, Asset::No, min_out)
    }

    fn execute_buy(
        &self,
        vault: &mut Vault,
        pair: &mut Pair,
        collateral: &mut Collateral,
        caller: &str,
        collateral_in: Decimal,
        want: Asset,
        min_out: Option<Decimal>,
    ) -> Result<TradeReceipt, MarketError> {
        vault.ensure_unresolved()?;
        let amount = math::positive_amount(collateral_in)?;

        let swapped = pair.quote_swap(amount, want.opposite())?;
        let total_out = amount + swapped;
        if let Some(bound) = min_out {
            if total_out < bound {
                return Err(MarketError::InsufficientOutput);
            }
        }

        collateral.transfer_from(&self.account, caller, &self.account, amount)?;
        vault.mint_pair(collateral, &self.account, &self.account, amount)?;
        {
            let (token_si, token_no) = vault.tokens_mut();
            pair.swap(token_si, token_no, &self.account, amount, want.opposite(), None)?;
            let token_out = match want {
                Asset::Si => token_si,
                Asset::No => token_no,
            };
            token_out.transfer(&self.account, caller, total_out)?;
        }

        info!(router = %self.account, trader = caller, %amount, ?want, out = %total_out, "buy executed");
        Ok(TradeReceipt {
            id: Uuid::new_v4().to_string(),
            trader: caller.to_string(),
            action: TradeAction::Buy,
            asset: want,
            amount_in: amount,
            amount_out: total_out,
            pair_amount: amount,
            new_probability_si: pair.quotes().map(|q| q.probability_si),
            timestamp: now(),
        })
    }

    fn execute_sell(
        &self,
        vault: &mut Vault,
        pair: &mut Pair,
        collateral: &mut Collateral,
        caller: &str,
        token_in: Decimal,
        asset: Asset,
        min_out: Option<Decimal>,
    ) -> Result<TradeReceipt, MarketError> {
        vault.ensure_unresolved()?;
        let amount = math::positive_amount(token_in)?;

        let (reserve_in, reserve_out) = pair.reserves_for(asset);
        let split = math::equalize_swap_input(amount, Decimal::ZERO, reserve_in, reserve_out)?;
        if split <= Decimal::ZERO {
            return Err(MarketError::InsufficientOutput);
        }
        let received = pair.quote_swap(split, asset)?;
        let matched = (amount - split).min(received);
        if matched <= Decimal::ZERO {
            return Err(MarketError::InsufficientOutput);
        }
        if let Some(bound) = min_out {
            if matched < bound {
                return Err(MarketError::InsufficientOutput);
            }
        }

        {
            let (token_si, token_no) = vault.tokens_mut();
            let token = match asset {
                Asset::Si => &mut *token_si,
                Asset::No => &mut *token_no,
            };
            token.transfer_from(&self.account, caller, &self.account, amount)?;
        }
        {
            let (token_si, token_no) = vault.tokens_mut();
            pair.swap(token_si, token_no, &self.account, split, asset, None)?;
        }
        vault.burn_pair(collateral, &self.account, matched)?;
        collateral.transfer(&self.account, caller, matched)?;

        // the equalizing split is fee-blind, so the legs can come out
        // slightly uneven; hand the residue back instead of stranding it
        let residual_sold = amount - split - matched;
        let residual_other = received - matched;
        {
            let (token_si, token_no) = vault.tokens_mut();
            let (token_sold, token_other) = match asset {
                Asset::Si => (&mut *token_si, &mut *token_no),
                Asset::No => (&mut *token_no, &mut *token_si),
            };
            if residual_sold > Decimal::ZERO {
                token_sold.transfer(&self.account, caller, residual_sold)?;
            }
            if residual_other > Decimal::ZERO {
                token_other.transfer(&self.account, caller, residual_other)?;
            }
        }

        info!(router = %self.account, trader = caller, %amount, ?asset, out = %matched, "sell executed");
        Ok(TradeReceipt {
            id: Uuid::new_v4().to_string(),
            trader: caller.to_string(),
            action: TradeAction::Sell,
            asset,
            amount_in: amount,
            amount_out: matched,
            pair_amount: matched,
            new_probability_si: pair.quotes().map(|q| q.probability_si),
            timestamp: now(),
        })
    }

    // ------------------------------------------------------------------
    // Liquidity zaps
    // ------------------------------------------------------------------

    /// Single-asset liquidity add: mint a pair, swap the surplus side to
    /// match the reserve ratio, deposit the balanced amounts, and hand the
    /// shares (plus any residual token dust) to the caller.
    pub fn add_liquidity(
        &self,
        vault: &mut Vault,
        pair: &mut Pair,
        collateral: &mut Collateral,
        caller: &str,
        collateral_in: Decimal,
        min_shares: Option<Decimal>,
    ) -> Result<LiquidityReceipt, MarketError> {
        vault.ensure_unresolved()?;
        let amount = math::positive_amount(collateral_in)?;
        if pair.total_shares <= Decimal::ZERO
            || pair.reserve_si <= Decimal::ZERO
            || pair.reserve_no <= Decimal::ZERO
        {
            return Err(MarketError::InsufficientLiquidity);
        }

        // plan against simulated reserves
        let (mut sim_si, mut sim_no) = (pair.reserve_si, pair.reserve_no);
        let (mut hold_si, mut hold_no) = (amount, amount);
        let mut swap_plan: Option<(Asset, Decimal)> = None;

        if sim_si > sim_no {
            // ratio wants more SI than NO: swap part of the NO leg in
            let split = math::deposit_swap_input(amount, sim_no, sim_si)?;
            if split > Decimal::ZERO {
                let out = Pair::swap_output(sim_no, sim_si, split, pair.fee_bps)?;
                hold_no -= split;
                hold_si += out;
                sim_no += split;
                sim_si -= out;
                swap_plan = Some((Asset::No, split));
            }
        } else if sim_no > sim_si {
            let split = math::deposit_swap_input(amount, sim_si, sim_no)?;
            if split > Decimal::ZERO {
                let out = Pair::swap_output(sim_si, sim_no, split, pair.fee_bps)?;
                hold_si -= split;
                hold_no += out;
                sim_si += split;
                sim_no -= out;
                swap_plan = Some((Asset::Si, split));
            }
        }

        // balanced deposit amounts against the post-swap ratio
        let mut dep_si = hold_si;
        let mut dep_no = math::mul_div(hold_si, sim_no, sim_si)?;
        if dep_no > hold_no {
            dep_no = hold_no;
            dep_si = math::mul_div(hold_no, sim_si, sim_no)?;
        }
        if dep_si <= Decimal::ZERO || dep_no <= Decimal::ZERO {
            return Err(MarketError::InsufficientOutput);
        }

        let by_si = math::mul_div(dep_si, pair.total_shares, sim_si)?;
        let by_no = math::mul_div(dep_no, pair.total_shares, sim_no)?;
        let planned_shares = by_si.min(by_no);
        if planned_shares <= Decimal::ZERO {
            return Err(MarketError::InsufficientOutput);
        }
        if let Some(bound) = min_shares {
            if planned_shares < bound {
                return Err(MarketError::InsufficientOutput);
            }
        }

        // execute the plan
        collateral.transfer_from(&self.account, caller, &self.account, amount)?;
        vault.mint_pair(collateral, &self.account, &self.account, amount)?;

        let dust_si = hold_si - dep_si;
        let dust_no = hold_no - dep_no;
        let shares;
        {
            let (token_si, token_no) = vault.tokens_mut();
            if let Some((asset, split)) = swap_plan {
                pair.swap(token_si, token_no, &self.account, split, asset, None)?;
            }
            shares = pair.add_liquidity(token_si, token_no, &self.account, dep_si, dep_no, caller)?;
            if dust_si > Decimal::ZERO {
                token_si.transfer(&self.account, caller, dust_si)?;
            }
            if dust_no > Decimal::ZERO {
                token_no.transfer(&self.account, caller, dust_no)?;
            }
        }

        info!(router = %self.account, provider = caller, %amount, %shares, "liquidity added");
        Ok(LiquidityReceipt {
            id: Uuid::new_v4().to_string(),
            provider: caller.to_string(),
            action: LiquidityAction::Add,
            collateral_in: amount,
            collateral_out: Decimal::ZERO,
            shares,
            dust_si,
            dust_no,
            timestamp: now(),
        })
    }

    /// Single-asset liquidity exit: withdraw pro-rata reserves, swap the
    /// surplus side until both legs match (skipped when the drained pool
    /// has no reserves left), redeem the matched pair, and pay collateral.
    /// Residual tokens go back to the caller rather than being stranded.
    pub fn remove_liquidity_zap(
        &self,
        vault: &mut Vault,
        pair: &mut Pair,
        collateral: &mut Collateral,
        caller: &str,
        shares_in: Decimal,
        min_out: Option<Decimal>,
    ) -> Result<LiquidityReceipt, MarketError> {
        vault.ensure_unresolved()?;
        let shares_in = math::positive_amount(shares_in)?;
        if pair.shares_of(caller) < shares_in {
            return Err(MarketError::InsufficientShares);
        }

        // plan against post-removal reserves
        let si_out = math::mul_div(pair.reserve_si, shares_in, pair.total_shares)?;
        let no_out = math::mul_div(pair.reserve_no, shares_in, pair.total_shares)?;
        let (sim_si, sim_no) = (pair.reserve_si - si_out, pair.reserve_no - no_out);
        let (mut hold_si, mut hold_no) = (si_out, no_out);
        let mut swap_plan: Option<(Asset, Decimal)> = None;

        if hold_si != hold_no && sim_si > Decimal::ZERO && sim_no > Decimal::ZERO {
            if hold_si > hold_no {
                let split = math::equalize_swap_input(hold_si, hold_no, sim_si, sim_no)?;
                if split > Decimal::ZERO {
                    let out = Pair::swap_output(sim_si, sim_no, split, pair.fee_bps)?;
                    hold_si -= split;
                    hold_no += out;
                    swap_plan = Some((Asset::Si, split));
                }
            } else {
                let split = math::equalize_swap_input(hold_no, hold_si, sim_no, sim_si)?;
                if split > Decimal::ZERO {
                    let out = Pair::swap_output(sim_no, sim_si, split, pair.fee_bps)?;
                    hold_no -= split;
                    hold_si += out;
                    swap_plan = Some((Asset::No, split));
                }
            }
        }

        let matched = hold_si.min(hold_no);
        if matched <= Decimal::ZERO {
            return Err(MarketError::InsufficientOutput);
        }
        if let Some(bound) = min_out {
            if matched < bound {
                return Err(MarketError::InsufficientOutput);
            }
        }

        // execute the plan
        {
            let (token_si, token_no) = vault.tokens_mut();
            pair.remove_liquidity(token_si, token_no, caller, shares_in, &self.account)?;
            if let Some((asset, split)) = swap_plan {
                pair.swap(token_si, token_no, &self.account, split, asset, None)?;
            }
        }
        vault.burn_pair(collateral, &self.account, matched)?;
        collateral.transfer(&self.account, caller, matched)?;

        let dust_si = hold_si - matched;
        let dust_no = hold_no - matched;
        {
            let (token_si, token_no) = vault.tokens_mut();
            if dust_si > Decimal::ZERO {
                token_si.transfer(&self.account, caller, dust_si)?;
            }
            if dust_no > Decimal::ZERO {
                token_no.transfer(&self.account, caller, dust_no)?;
            }
        }

        info!(router = %self.account, provider = caller, %shares_in, out = %matched, "liquidity removed");
        Ok(LiquidityReceipt {
            id: Uuid::new_v4().to_string(),
            provider: caller.to_string(),
            action: LiquidityAction::Remove,
            collateral_in: Decimal::ZERO,
            collateral_out: matched,
            shares: shares_in,
            dust_si,
            dust_no,
            timestamp: now(),
        })
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim_token::ClaimToken;
    use rust_decimal_macros::dec;

    fn setup() -> (Router, Vault, Pair, Collateral) {
        let si = ClaimToken::new("Test Coverage", "CT", "vault:0");
        let no = ClaimToken::new("Test Yield", "UT", "vault:0");
        let vault = Vault::new("vault:0", "ADMIN", si, no);
        let pair = Pair::new("pair:0", 0);
        let router = Router::new("router:0", "liquidity:0");

        let mut usdc = Collateral::new("USDC");
        usdc.mint("ALICE", dec!(1000)).unwrap();
        usdc.mint("BOB", dec!(1000)).unwrap();
        (router, vault, pair, usdc)
    }

    fn vault_invariant_holds(vault: &Vault) -> bool {
        vault.collateral_balance == vault.token_si.total_supply
            && vault.collateral_balance == vault.token_no.total_supply
    }

    #[test]
    fn test_initialize_splits_by_risk() {
        let (router, mut vault, mut pair, mut usdc) = setup();
        usdc.approve("ALICE", "router:0", dec!(100));

        let receipt = router
            .initialize(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(100), 80)
            .unwrap();
        assert_eq!(receipt.seeded_si, dec!(80));
        assert_eq!(receipt.seeded_no, dec!(20));
        assert_eq!(receipt.leftover_si, dec!(20));
        assert_eq!(receipt.leftover_no, dec!(80));
        assert_eq!(receipt.shares, dec!(40));

        assert_eq!(pair.reserve_si, dec!(80));
        assert_eq!(pair.reserve_no, dec!(20));
        assert_eq!(pair.shares_of("ALICE"), dec!(40));
        assert_eq!(vault.token_si.balance_of("ALICE"), dec!(20));
        assert_eq!(vault.token_no.balance_of("ALICE"), dec!(80));
        assert_eq!(pair.quotes().unwrap().probability_si, dec!(0.2));
        assert!(vault_invariant_holds(&vault));

        usdc.approve("ALICE", "router:0", dec!(100));
        assert_eq!(
            router.initialize(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(100), 80),
            Err(MarketError::AlreadyInitialized)
        );
    }

    #[test]
    fn test_initialize_rejects_one_sided_risk() {
        let (router, mut vault, mut pair, mut usdc) = setup();
        usdc.approve("ALICE", "router:0", dec!(200));
        assert_eq!(
            router.initialize(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(100), 100),
            Err(MarketError::InsufficientLiquidity)
        );
        assert_eq!(
            router.initialize(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(100), 101),
            Err(MarketError::InvalidScale(dec!(101)))
        );
        // failed attempts touched nothing
        assert_eq!(usdc.balance_of("ALICE"), dec!(1000));
        assert!(!vault.is_initialized());
    }

    #[test]
    fn test_buy_si_mints_and_swaps() {
        let (router, mut vault, mut pair, mut usdc) = setup();
        usdc.approve("ALICE", "router:0", dec!(100));
        router.initialize(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(100), 80).unwrap();

        usdc.approve("BOB", "router:0", dec!(10));
        let receipt = router
            .buy_si(&mut vault, &mut pair, &mut usdc, "BOB", dec!(10), None)
            .unwrap();

        // 10 minted directly plus 80*10/30 from the swap
        assert_eq!(receipt.amount_out, dec!(36.666666666666666666));
        assert_eq!(vault.token_si.balance_of("BOB"), dec!(36.666666666666666666));
        assert_eq!(pair.reserve_si, dec!(53.333333333333333334));
        assert_eq!(pair.reserve_no, dec!(30));
        assert!(vault_invariant_holds(&vault));
    }

    #[test]
    fn test_buy_min_out_leaves_state_untouched() {
        let (router, mut vault, mut pair, mut usdc) = setup();
        usdc.approve("ALICE", "router:0", dec!(100));
        router.initialize(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(100), 80).unwrap();

        usdc.approve("BOB", "router:0", dec!(10));
        assert_eq!(
            router.buy_si(&mut vault, &mut pair, &mut usdc, "BOB", dec!(10), Some(dec!(37))),
            Err(MarketError::InsufficientOutput)
        );
        assert_eq!(usdc.balance_of("BOB"), dec!(1000));
        assert_eq!(pair.reserve_si, dec!(80));
        assert_eq!(pair.reserve_no, dec!(20));
    }

    #[test]
    fn test_sell_si_round_trips_to_collateral() {
        let (router, mut vault, mut pair, mut usdc) = setup();
        usdc.approve("ALICE", "router:0", dec!(100));
        router.initialize(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(100), 50).unwrap();

        // ALICE sells 30 of her 50 leftover SI on the 50/50 pool
        vault.token_si.approve("ALICE", "router:0", dec!(30));
        let receipt = router
            .sell_si(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(30), None)
            .unwrap();

        // selling below par: payout is under 15 but above the worst case
        assert!(receipt.amount_out > dec!(12.7));
        assert!(receipt.amount_out < dec!(12.9));
        assert_eq!(usdc.balance_of("ALICE"), dec!(900) + receipt.amount_out);

        // residue from the fee-blind split comes back as tokens
        let si_left = vault.token_si.balance_of("ALICE");
        assert!(si_left >= dec!(20));
        assert!(si_left < dec!(20.000001));
        assert!(vault_invariant_holds(&vault));
    }

    #[test]
    fn test_trading_blocked_after_resolution() {
        let (router, mut vault, mut pair, mut usdc) = setup();
        usdc.approve("ALICE", "router:0", dec!(100));
        router.initialize(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(100), 50).unwrap();
        vault.resolve("ADMIN", dec!(1)).unwrap();

        usdc.approve("BOB", "router:0", dec!(10));
        assert_eq!(
            router.buy_si(&mut vault, &mut pair, &mut usdc, "BOB", dec!(10), None),
            Err(MarketError::Resolved)
        );
        vault.token_si.approve("ALICE", "router:0", dec!(10));
        assert_eq!(
            router.sell_si(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(10), None),
            Err(MarketError::Resolved)
        );
        usdc.approve("ALICE", "router:0", dec!(10));
        assert_eq!(
            router.add_liquidity(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(10), None),
            Err(MarketError::Resolved)
        );
        assert_eq!(
            router.remove_liquidity_zap(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(10), None),
            Err(MarketError::Resolved)
        );
    }

    #[test]
    fn test_balanced_zap_round_trip_is_exact() {
        let (router, mut vault, mut pair, mut usdc) = setup();
        usdc.approve("ALICE", "router:0", dec!(100));
        router.initialize(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(100), 50).unwrap();

        // a balanced pool needs no equalizing swap in either direction
        usdc.approve("BOB", "router:0", dec!(10));
        let added = router
            .add_liquidity(&mut vault, &mut pair, &mut usdc, "BOB", dec!(10), None)
            .unwrap();
        assert_eq!(added.shares, dec!(10));
        assert_eq!(added.dust_si, dec!(0));
        assert_eq!(added.dust_no, dec!(0));
        assert_eq!(pair.reserve_si, dec!(60));
        assert_eq!(pair.reserve_no, dec!(60));

        let removed = router
            .remove_liquidity_zap(&mut vault, &mut pair, &mut usdc, "BOB", dec!(10), None)
            .unwrap();
        assert_eq!(removed.collateral_out, dec!(10));
        assert_eq!(usdc.balance_of("BOB"), dec!(1000));
        assert_eq!(pair.shares_of("BOB"), dec!(0));
        assert!(vault_invariant_holds(&vault));
    }

    #[test]
    fn test_skewed_zap_add_swaps_toward_ratio() {
        let (router, mut vault, mut pair, mut usdc) = setup();
        usdc.approve("ALICE", "router:0", dec!(100));
        router.initialize(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(100), 80).unwrap();

        usdc.approve("BOB", "router:0", dec!(10));
        let receipt = router
            .add_liquidity(&mut vault, &mut pair, &mut usdc, "BOB", dec!(10), None)
            .unwrap();
        assert!(receipt.shares > dec!(11.9));
        assert!(receipt.shares < dec!(12));
        // residuals are sub-dust, not whole tokens
        assert!(receipt.dust_si + receipt.dust_no < dec!(0.000001));
        assert!(vault_invariant_holds(&vault));
    }

    #[test]
    fn test_zap_remove_min_out_bound() {
        let (router, mut vault, mut pair, mut usdc) = setup();
        usdc.approve("ALICE", "router:0", dec!(100));
        router.initialize(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(100), 50).unwrap();

        assert_eq!(
            router.remove_liquidity_zap(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(10), Some(dec!(11))),
            Err(MarketError::InsufficientOutput)
        );
        assert_eq!(pair.total_shares, dec!(50));
    }

    #[test]
    fn test_zap_remove_more_shares_than_held() {
        let (router, mut vault, mut pair, mut usdc) = setup();
        usdc.approve("ALICE", "router:0", dec!(100));
        router.initialize(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(100), 50).unwrap();

        assert_eq!(
            router.remove_liquidity_zap(&mut vault, &mut pair, &mut usdc, "BOB", dec!(1), None),
            Err(MarketError::InsufficientShares)
        );
    }

    #[test]
    fn test_full_supply_removal_drains_pool() {
        let (router, mut vault, mut pair, mut usdc) = setup();
        usdc.approve("ALICE", "router:0", dec!(100));
        router.initialize(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(100), 50).unwrap();

        // no equalizing swap is possible against empty reserves; matched
        // legs redeem and the holder keeps any imbalance as tokens
        let receipt = router
            .remove_liquidity_zap(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(50), None)
            .unwrap();
        assert_eq!(receipt.collateral_out, dec!(50));
        assert_eq!(pair.total_shares, dec!(0));
        assert_eq!(pair.reserve_si, dec!(0));
        assert_eq!(pair.reserve_no, dec!(0));
        assert!(vault_invariant_holds(&vault));
    }

    #[test]
    fn test_receipts_serialize() {
        let (router, mut vault, mut pair, mut usdc) = setup();
        usdc.approve("ALICE", "router:0", dec!(100));
        let receipt = router
            .initialize(&mut vault, &mut pair, &mut usdc, "ALICE", dec!(100), 80)
            .unwrap();

        let json = serde_json::to_string(&receipt).unwrap();
        let back: InitReceipt = serde_json::from_str(&json).unwrap();
        assert_eq!(back.seeded_si, receipt.seeded_si);
        assert_eq!(back.risk_percent, 80);
    }
}
