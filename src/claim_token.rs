// ============================================================================
// Claim Tokens - Coverpool Protocol Core
// ============================================================================
//
// Each market has two claim tokens: SI (coverage, pays if the covered event
// occurs) and NO (yield/underwriting, pays if it does not). Supply can only
// be changed by the owning vault, which mints and burns both sides in
// lockstep against collateral. The tokens themselves are plain fungible
// ledgers otherwise.
//
// ============================================================================

use crate::error::MarketError;
use crate::math;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fungible claim ledger; mint/burn gated to the owning vault account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimToken {
    pub name: String,
    pub symbol: String,
    /// Account allowed to mint and burn (the owning vault)
    pub owner: String,
    pub balances: HashMap<String, Decimal>,
    pub allowances: HashMap<String, HashMap<String, Decimal>>,
    pub total_supply: Decimal,
}

impl ClaimToken {
    pub fn new(name: &str, symbol: &str, owner: &str) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            owner: owner.to_string(),
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

    /// Owning vault only
    pub fn mint(&mut self, caller: &str, to: &str, amount: Decimal) -> Result<(), MarketError> {
        if caller != self.owner {
            return Err(MarketError::Unauthorized);
        }
        let amount = math::positive_amount(amount)?;
        *self.balances.entry(to.to_string()).or_insert(Decimal::ZERO) += amount;
        self.total_supply += amount;
        Ok(())
    }

    /// Owning vault only
    pub fn burn(&mut self, caller: &str, from: &str, amount: Decimal) -> Result<(), MarketError> {
        if caller != self.owner {
            return Err(MarketError::Unauthorized);
        }
        let amount = math::positive_amount(amount)?;
        let bal = self.balance_of(from);
        if bal < amount {
            return Err(MarketError::InsufficientBalance);
        }
        self.balances.insert(from.to_string(), bal - amount);
        self.total_supply -= amount;
        Ok(())
    }

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
