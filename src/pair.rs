// ============================================================================
// AMM Pair - Coverpool Protocol Core
// ============================================================================
//
// Constant Product Market Maker over the two claim tokens.
//
// Formula: reserve_si * reserve_no = k
//
// Price calculation:
//   Price(SI) = reserve_no / (reserve_si + reserve_no)
//   Price(NO) = reserve_si / (reserve_si + reserve_no)
//   Prices always sum to 1.0 and read as the implied event probability.
//
// An optional protocol fee (basis points) is skimmed from the input before
// the invariant computation; the fee accrues to the reserves, so k is
// exactly invariant for fee-less pools and non-decreasing otherwise.
// Token movements go through the claim-token ledgers, keeping
// reserve == pair account balance as a checkable invariant.
//
// ============================================================================

use crate::claim_token::ClaimToken;
use crate::error::MarketError;
use crate::math;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Which side of the pair an amount denominates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Asset {
    Si,
    No,
}

impl Asset {
    pub fn opposite(&self) -> Self {
        match self {
            Asset::Si => Asset::No,
            Asset::No => Asset::Si,
        }
    }
}

/// Read-only pricing snapshot derived from the reserves
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairQuotes {
    pub probability_si: Decimal,
    pub probability_no: Decimal,
    pub implied_yield_percent: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pair {
    /// Ledger account holding the pooled claim tokens
    pub account: String,
    pub reserve_si: Decimal,
    pub reserve_no: Decimal,
    /// Protocol fee on the swap input, in basis points
    pub fee_bps: u32,
    /// LP shares: account -> shares held
    pub shares: HashMap<String, Decimal>,
    pub total_shares: Decimal,
}

impl Pair {
    pub fn new(account: &str, fee_bps: u32) -> Self {
        Self {
            account: account.to_string(),
            reserve_si: Decimal::ZERO,
            reserve_no: Decimal::ZERO,
            fee_bps,
            shares: HashMap::new(),
            total_shares: Decimal::ZERO,
        }
    }

    pub fn shares_of(&self, account: &str) -> Decimal {
        self.shares.get(account).copied().unwrap_or(Decimal::ZERO)
    }

    /// (reserve_in, reserve_out) for a swap selling `asset_in`
    pub fn reserves_for(&self, asset_in: Asset) -> (Decimal, Decimal) {
        match asset_in {
            Asset::Si => (self.reserve_si, self.reserve_no),
            Asset::No => (self.reserve_no, self.reserve_si),
        }
    }

    // ------------------------------------------------------------------
    // Pricing
    // ------------------------------------------------------------------

    /// None while the pool is empty
    pub fn quotes(&self) -> Option<PairQuotes> {
        let total = self.reserve_si + self.reserve_no;
        if self.reserve_si <= Decimal::ZERO || self.reserve_no <= Decimal::ZERO {
            return None;
        }
        let probability_si = self.reserve_no / total;
        let probability_no = self.reserve_si / total;
        let implied_yield_percent =
            (Decimal::ONE - probability_no) / probability_no * Decimal::ONE_HUNDRED;
        Some(PairQuotes {
            probability_si,
            probability_no,
            implied_yield_percent,
        })
    }

    /// (price_si, price_no); the prices sum to one and double as the
    /// implied event probabilities
    pub fn spot_prices(&self) -> Option<(Decimal, Decimal)> {
        self.quotes().map(|q| (q.probability_si, q.probability_no))
    }

    /// Constant-product output for explicit reserves; lets the router plan
    /// against post-operation reserves before mutating anything.
    pub fn swap_output(
        reserve_in: Decimal,
        reserve_out: Decimal,
        amount_in: Decimal,
        fee_bps: u32,
    ) -> Result<Decimal, MarketError> {
        let amount_in = math::positive_amount(amount_in)?;
        if reserve_in <= Decimal::ZERO || reserve_out <= Decimal::ZERO {
            return Err(MarketError::InsufficientLiquidity);
        }

        let fee =
            math::floor_amount(amount_in * Decimal::from(fee_bps) / Decimal::from(10_000u32));
        let net_in = amount_in - fee;

        // out = reserve_out - (reserve_in * reserve_out) / (reserve_in + net_in)
        let amount_out = math::mul_div(reserve_out, net_in, reserve_in + net_in)?;
        if amount_out <= Decimal::ZERO {
            return Err(MarketError::InsufficientOutput);
        }
        Ok(amount_out)
    }

    /// Output of a constant-product swap without touching state
    pub fn quote_swap(&self, amount_in: Decimal, asset_in: Asset) -> Result<Decimal, MarketError> {
        let (reserve_in, reserve_out) = self.reserves_for(asset_in);
        Self::swap_output(reserve_in, reserve_out, amount_in, self.fee_bps)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// One-shot initial deposit. Shares issued at the geometric mean of the
    /// two amounts, credited to `shares_to`.
    pub fn seed(
        &mut self,
        token_si: &mut ClaimToken,
        token_no: &mut ClaimToken,
        from: &str,
        shares_to: &str,
        si_amount: Decimal,
        no_amount: Decimal,
    ) -> Result<Decimal, MarketError> {
        if self.total_shares > Decimal::ZERO {
            return Err(MarketError::AlreadySeeded);
        }
        let si_amount = math::positive_amount(si_amount)?;
        let no_amount = math::positive_amount(no_amount)?;

        let minted = math::sqrt(
            si_amount.checked_mul(no_amount).ok_or(MarketError::Overflow)?,
        )?;
        if minted <= Decimal::ZERO {
            return Err(MarketError::InsufficientLiquidity);
        }

        token_si.transfer(from, &self.account, si_amount)?;
        token_no.transfer(from, &self.account, no_amount)?;
        self.reserve_si = si_amount;
        self.reserve_no = no_amount;

        self.shares.insert(shares_to.to_string(), minted);
        self.total_shares = minted;

        info!(pair = %self.account, %si_amount, %no_amount, shares = %minted, "pair seeded");
        Ok(minted)
    }

    /// Constant-product swap. Moves the input from `caller` into the pool
    /// and pays the output back; fails rather than under-delivering when
    /// `min_out` is set.
    pub fn swap(
        &mut self,
        token_si: &mut ClaimToken,
        token_no: &mut ClaimToken,
        caller: &str,
        amount_in: Decimal,
        asset_in: Asset,
        min_out: Option<Decimal>,
    ) -> Result<Decimal, MarketError> {
        let amount_in = math::positive_amount(amount_in)?;
        let amount_out = self.quote_swap(amount_in, asset_in)?;
        if let Some(bound) = min_out {
            if amount_out < bound {
                return Err(MarketError::InsufficientOutput);
            }
        }

        let (token_in, token_out) = match asset_in {
            Asset::Si => (&mut *token_si, &mut *token_no),
            Asset::No => (&mut *token_no, &mut *token_si),
        };
        token_in.transfer(caller, &self.account, amount_in)?;
        token_out.transfer(&self.account, caller, amount_out)?;

        match asset_in {
            Asset::Si => {
                self.reserve_si += amount_in;
                self.reserve_no -= amount_out;
            }
            Asset::No => {
                self.reserve_no += amount_in;
                self.reserve_si -= amount_out;
            }
        }

        Ok(amount_out)
    }

    /// Standard liquidity add: shares minted proportional to the minimum of
    /// the two marginal contributions; any excess on the other side accrues
    /// to the pool.
    pub fn add_liquidity(
        &mut self,
        token_si: &mut ClaimToken,
        token_no: &mut ClaimToken,
        from: &str,
        si_amount: Decimal,
        no_amount: Decimal,
        shares_to: &str,
    ) -> Result<Decimal, MarketError> {
        if self.total_shares <= Decimal::ZERO {
            return Err(MarketError::InsufficientLiquidity);
        }
        let si_amount = math::positive_amount(si_amount)?;
        let no_amount = math::positive_amount(no_amount)?;

        let by_si = math::mul_div(si_amount, self.total_shares, self.reserve_si)?;
        let by_no = math::mul_div(no_amount, self.total_shares, self.reserve_no)?;
        let minted = by_si.min(by_no);
        if minted <= Decimal::ZERO {
            return Err(MarketError::InsufficientOutput);
        }

        token_si.transfer(from, &self.account, si_amount)?;
        token_no.transfer(from, &self.account, no_amount)?;
        self.reserve_si += si_amount;
        self.reserve_no += no_amount;

        *self.shares.entry(shares_to.to_string()).or_insert(Decimal::ZERO) += minted;
        self.total_shares += minted;

        Ok(minted)
    }

    /// Pro-rata withdrawal: burns `shares_in` of `owner`'s shares and pays
    /// the proportional reserves to `recipient`.
    pub fn remove_liquidity(
        &mut self,
        token_si: &mut ClaimToken,
        token_no: &mut ClaimToken,
        owner: &str,
        shares_in: Decimal,
        recipient: &str,
    ) -> Result<(Decimal, Decimal), MarketError> {
        let shares_in = math::positive_amount(shares_in)?;
        if self.shares_of(owner) < shares_in {
            return Err(MarketError::InsufficientShares);
        }

        let si_out = math::mul_div(self.reserve_si, shares_in, self.total_shares)?;
        let no_out = math::mul_div(self.reserve_no, shares_in, self.total_shares)?;

        let remaining = self.shares_of(owner) - shares_in;
        if remaining > Decimal::ZERO {
            self.shares.insert(owner.to_string(), remaining);
        } else {
            self.shares.remove(owner);
        }
        self.total_shares -= shares_in;

        if si_out > Decimal::ZERO {
            token_si.transfer(&self.account, recipient, si_out)?;
            self.reserve_si -= si_out;
        }
        if no_out > Decimal::ZERO {
            token_no.transfer(&self.account, recipient, no_out)?;
            self.reserve_no -= no_out;
        }

        Ok((si_out, no_out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn setup(si_reserve: Decimal, no_reserve: Decimal, fee_bps: u32) -> (Pair, ClaimToken, ClaimToken) {
        let mut si = ClaimToken::new("Test Coverage", "CT", "vault:0");
        let mut no = ClaimToken::new("Test Yield", "UT", "vault:0");
        si.mint("vault:0", "ALICE", dec!(10000)).unwrap();
        no.mint("vault:0", "ALICE", dec!(10000)).unwrap();

        let mut pair = Pair::new("pair:0", fee_bps);
        pair.seed(&mut si, &mut no, "ALICE", "ALICE", si_reserve, no_reserve).unwrap();
        (pair, si, no)
    }

    #[test]
    fn test_seed_once() {
        let (mut pair, mut si, mut no) = setup(dec!(80), dec!(20), 0);
        assert_eq!(pair.reserve_si, dec!(80));
        assert_eq!(pair.reserve_no, dec!(20));
        assert_eq!(pair.total_shares, dec!(40)); // sqrt(1600)

        assert_eq!(
            pair.seed(&mut si, &mut no, "ALICE", "ALICE", dec!(1), dec!(1)),
            Err(MarketError::AlreadySeeded)
        );
    }

    #[test]
    fn test_quotes_match_reserve_ratio() {
        let (pair, _, _) = setup(dec!(80), dec!(20), 0);
        let q = pair.quotes().unwrap();
        assert_eq!(q.probability_si, dec!(0.2));
        assert_eq!(q.probability_no, dec!(0.8));
        assert_eq!(q.implied_yield_percent, dec!(25));
        assert_eq!(pair.spot_prices(), Some((dec!(0.2), dec!(0.8))));
    }

    #[test]
    fn test_swap_constant_product() {
        let (mut pair, mut si, mut no) = setup(dec!(80), dec!(20), 0);
        let k_before = pair.reserve_si * pair.reserve_no;

        // sell 10 NO for SI: out = 80*10/30
        let out = pair.swap(&mut si, &mut no, "ALICE", dec!(10), Asset::No, None).unwrap();
        assert_eq!(out, dec!(26.666666666666666666));
        assert_eq!(pair.reserve_no, dec!(30));
        assert_eq!(pair.reserve_si, dec!(53.333333333333333334));

        let k_after = pair.reserve_si * pair.reserve_no;
        assert!(k_after >= k_before);

        // reserves mirror the pair's ledger balances
        assert_eq!(si.balance_of("pair:0"), pair.reserve_si);
        assert_eq!(no.balance_of("pair:0"), pair.reserve_no);
    }

    #[test]
    fn test_swap_with_fee_grows_k() {
        let (mut pair, mut si, mut no) = setup(dec!(100), dec!(100), 30);
        let k_before = pair.reserve_si * pair.reserve_no;
        pair.swap(&mut si, &mut no, "ALICE", dec!(10), Asset::Si, None).unwrap();
        let k_after = pair.reserve_si * pair.reserve_no;
        assert!(k_after > k_before);
    }

    #[test]
    fn test_swap_min_out_bound() {
        let (mut pair, mut si, mut no) = setup(dec!(80), dec!(20), 0);
        let result = pair.swap(&mut si, &mut no, "ALICE", dec!(10), Asset::No, Some(dec!(30)));
        assert_eq!(result, Err(MarketError::InsufficientOutput));
        // bound failure left reserves untouched
        assert_eq!(pair.reserve_si, dec!(80));
        assert_eq!(pair.reserve_no, dec!(20));
    }

    #[test]
    fn test_swap_empty_pool() {
        let mut pair = Pair::new("pair:0", 0);
        let mut si = ClaimToken::new("Test Coverage", "CT", "vault:0");
        let mut no = ClaimToken::new("Test Yield", "UT", "vault:0");
        assert_eq!(
            pair.swap(&mut si, &mut no, "ALICE", dec!(10), Asset::Si, None),
            Err(MarketError::InsufficientLiquidity)
        );
    }

    #[test]
    fn test_add_liquidity_min_rule() {
        let (mut pair, mut si, mut no) = setup(dec!(80), dec!(20), 0);

        // proportional add: +25% of both reserves mints +25% of shares
        let minted = pair
            .add_liquidity(&mut si, &mut no, "ALICE", dec!(20), dec!(5), "ALICE")
            .unwrap();
        assert_eq!(minted, dec!(10));
        assert_eq!(pair.total_shares, dec!(50));
        assert_eq!(pair.reserve_si, dec!(100));
        assert_eq!(pair.reserve_no, dec!(25));

        // lopsided add mints by the scarcer contribution
        let minted = pair
            .add_liquidity(&mut si, &mut no, "ALICE", dec!(100), dec!(2.5), "ALICE")
            .unwrap();
        assert_eq!(minted, dec!(5)); // min(100/100, 2.5/25) * 50
    }

    #[test]
    fn test_remove_liquidity_pro_rata() {
        let (mut pair, mut si, mut no) = setup(dec!(80), dec!(20), 0);

        let (si_out, no_out) = pair
            .remove_liquidity(&mut si, &mut no, "ALICE", dec!(20), "ALICE")
            .unwrap();
        assert_eq!(si_out, dec!(40));
        assert_eq!(no_out, dec!(10));
        assert_eq!(pair.total_shares, dec!(20));
        assert_eq!(pair.reserve_si, dec!(40));
        assert_eq!(pair.reserve_no, dec!(10));
    }

    #[test]
    fn test_remove_liquidity_insufficient_shares() {
        let (mut pair, mut si, mut no) = setup(dec!(80), dec!(20), 0);
        assert_eq!(
            pair.remove_liquidity(&mut si, &mut no, "BOB", dec!(1), "BOB"),
            Err(MarketError::InsufficientShares)
        );
    }

    #[test]
    fn test_k_non_decreasing_over_swap_sequence() {
        let (mut pair, mut si, mut no) = setup(dec!(500), dec!(500), 0);
        let mut k = pair.reserve_si * pair.reserve_no;

        for i in 1..20u32 {
            let asset = if i % 2 == 0 { Asset::Si } else { Asset::No };
            pair.swap(&mut si, &mut no, "ALICE", Decimal::from(i), asset, None).unwrap();
            let k_now = pair.reserve_si * pair.reserve_no;
            assert!(k_now >= k, "constant product shrank at step {}", i);
            k = k_now;
        }
    }
}
