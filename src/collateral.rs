// ============================================================================
// Collateral Asset - Coverpool Protocol Core
// ============================================================================
//
// The single fungible asset every market's vault custodies. Standard
// balance/allowance semantics plus an open faucet mint for development and
// tests (the deployed asset is expected to be a plain, non-rebasing,
// non-fee-on-transfer token; anything else is unsupported).
//
// The approve-then-spend pattern is two calls and is NOT atomic across them.
// Callers must grant exact, single-use allowances per operation rather than
// standing approvals.
//
// ============================================================================

use crate::error::MarketError;
use crate::math;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Fungible collateral ledger (account -> balance, owner -> spender -> allowance)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collateral {
    pub symbol: String,
    pub balances: HashMap<String, Decimal>,
    pub allowances: HashMap<String, HashMap<String, Decimal>>,
    pub total_supply: Decimal,
}

impl Collateral {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            balances: HashMap::new(),
            allowances: HashMap::new(),
            total_supply: Decimal::ZERO,
        }
    }

    pub fn balance_of(&self, account: &str) -> Decimal {
        self.balances.get(account).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn allowance(&self, owner: &str, spender: &str) -> Decimal {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Faucet mint: unrestricted supply for development and tests
    pub fn mint(&mut self, to: &str, amount: Decimal) -> Result<(), MarketError> {
        let amount = math::positive_amount(amount)?;
        *self.balances.entry(to.to_string()).or_insert(Decimal::ZERO) += amount;
        self.total_supply += amount;
        info!(symbol = %self.symbol, to, %amount, "collateral minted");
        Ok(())
    }

    /// Move `amount` from `from` to `to`. `from` is trusted in-process;
    /// allowance enforcement happens at the user boundary via transfer_from.
    pub fn transfer(&mut self, from: &str, to: &str, amount: Decimal) -> Result<(), MarketError> {
        let amount = math::positive_amount(amount)?;
        let from_bal = self.balance_of(from);
        if from_bal < amount {
            return Err(MarketError::InsufficientBalance);
        }
        self.balances.insert(from.to_string(), from_bal - amount);
        *self.balances.entry(to.to_string()).or_insert(Decimal::ZERO) += amount;
        Ok(())
    }

    pub fn approve(&mut self, owner: &str, spender: &str, amount: Decimal) {
        self.allowances
            .entry(owner.to_string())
            .or_default()
            .insert(spender.to_string(), math::floor_amount(amount.max(Decimal::ZERO)));
    }

    /// Allowance-gated transfer; decrements the allowance by the amount spent
    pub fn transfer_from(
        &mut self,
        spender: &str,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<(), MarketError> {
        let amount = math::positive_amount(amount)?;
        let allowed = self.allowance(from, spender);
        if allowed < amount {
            return Err(MarketError::InsufficientAllowance);
        }
        self.transfer(from, to, amount)?;
        if let Some(a) = self.allowances.get_mut(from).and_then(|m| m.get_mut(spender)) {
            *a = allowed - amount;
        }
        Ok(())
    }
}
