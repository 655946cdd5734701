// ============================================================================
// Vault - Coverpool Protocol Core
// ============================================================================
//
// Custodian of the collateral for one market. While unresolved, every unit
// of collateral backs exactly one SI and one NO unit:
//
//   collateral_balance == total_supply(SI) == total_supply(NO)
//
// mint_pair and burn_pair keep that coupling as a single operation so a
// partial application is structurally impossible. resolve() is a one-shot
// transition that fixes the settlement split; afterwards SI and NO decouple
// and holders drain the vault through claim():
//
//   1 SI  -> scale       collateral
//   1 NO  -> (1 - scale) collateral
//
// ============================================================================

use crate::claim_token::ClaimToken;
use crate::collateral::Collateral;
use crate::error::MarketError;
use crate::math;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vault {
    /// Ledger account holding the custodied collateral
    pub account: String,
    /// Account authorized to call resolve()
    pub resolver: String,
    pub token_si: ClaimToken,
    pub token_no: ClaimToken,
    pub collateral_balance: Decimal,
    pub initialized: bool,
    pub resolved: bool,
    /// Fraction of collateral allocated to SI claims; meaningful once resolved
    pub resolution_scale: Decimal,
}

impl Vault {
    pub fn new(account: &str, resolver: &str, token_si: ClaimToken, token_no: ClaimToken) -> Self {
        Self {
            account: account.to_string(),
            resolver: resolver.to_string(),
            token_si,
            token_no,
            collateral_balance: Decimal::ZERO,
            initialized: false,
            resolved: false,
            resolution_scale: Decimal::ZERO,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn ensure_unresolved(&self) -> Result<(), MarketError> {
        if self.resolved {
            return Err(MarketError::Resolved);
        }
        Ok(())
    }

    /// Split borrow of the two claim tokens for pair operations
    pub fn tokens_mut(&mut self) -> (&mut ClaimToken, &mut ClaimToken) {
        (&mut self.token_si, &mut self.token_no)
    }

    /// One-shot setup: pull `amount` collateral from `payer` and mint the
    /// full SI/NO pair to `recipient` (the router, which seeds the AMM).
    pub fn initialize(
        &mut self,
        collateral: &mut Collateral,
        payer: &str,
        amount: Decimal,
        recipient: &str,
    ) -> Result<(), MarketError> {
        if self.initialized {
            return Err(MarketError::AlreadyInitialized);
        }
        let amount = math::positive_amount(amount)?;

        collateral.transfer(payer, &self.account, amount)?;
        self.collateral_balance = amount;
        self.initialized = true;

        let vault = self.account.clone();
        self.token_si.mint(&vault, recipient, amount)?;
        self.token_no.mint(&vault, recipient, amount)?;

        info!(vault = %self.account, %amount, "vault initialized");
        Ok(())
    }

    /// Pull `amount` collateral from `payer`, mint `amount` SI and `amount`
    /// NO to `recipient`. The 1:1:1 coupling is the unresolved invariant.
    pub fn mint_pair(
        &mut self,
        collateral: &mut Collateral,
        payer: &str,
        recipient: &str,
        amount: Decimal,
    ) -> Result<(Decimal, Decimal), MarketError> {
        self.ensure_unresolved()?;
        let amount = math::positive_amount(amount)?;

        collateral.transfer(payer, &self.account, amount)?;
        self.collateral_balance += amount;

        let vault = self.account.clone();
        self.token_si.mint(&vault, recipient, amount)?;
        self.token_no.mint(&vault, recipient, amount)?;

        Ok((amount, amount))
    }

    /// Burn `amount` of both tokens held by `from` and pay back `amount`
    /// collateral. Requires both legs in full.
    pub fn burn_pair(
        &mut self,
        collateral: &mut Collateral,
        from: &str,
        amount: Decimal,
    ) -> Result<Decimal, MarketError> {
        self.ensure_unresolved()?;
        let amount = math::positive_amount(amount)?;

        if self.token_si.balance_of(from) < amount || self.token_no.balance_of(from) < amount {
            return Err(MarketError::InsufficientBalance);
        }
        if self.collateral_balance < amount {
            error!(vault = %self.account, %amount, balance = %self.collateral_balance,
                "burn_pair exceeds vault collateral: accounting invariant violated");
            return Err(MarketError::InsufficientCollateral);
        }

        let vault = self.account.clone();
        self.token_si.burn(&vault, from, amount)?;
        self.token_no.burn(&vault, from, amount)?;
        self.collateral_balance -= amount;
        collateral.transfer(&self.account, from, amount)?;

        Ok(amount)
    }

    /// Irreversible settlement. `scale` in [0, 1] is the collateral fraction
    /// allocated to SI claims; the remainder goes to NO claims.
    pub fn resolve(&mut self, caller: &str, scale: Decimal) -> Result<(), MarketError> {
        if caller != self.resolver {
            return Err(MarketError::Unauthorized);
        }
        if self.resolved {
            return Err(MarketError::AlreadyResolved);
        }
        if scale < Decimal::ZERO || scale > Decimal::ONE {
            return Err(MarketError::InvalidScale(scale));
        }

        self.resolved = true;
        self.resolution_scale = math::floor_amount(scale);
        info!(vault = %self.account, scale = %self.resolution_scale, "market resolved");
        Ok(())
    }

    /// Redeem claim tokens post-resolution. Burns the caller's SI or NO and
    /// pays out amount * scale (SI) or amount * (1 - scale) (NO).
    pub fn claim(
        &mut self,
        collateral: &mut Collateral,
        caller: &str,
        amount: Decimal,
        is_si: bool,
    ) -> Result<Decimal, MarketError> {
        if !self.resolved {
            return Err(MarketError::NotResolved);
        }
        let amount = math::positive_amount(amount)?;

        let token = if is_si { &self.token_si } else { &self.token_no };
        if token.balance_of(caller) < amount {
            return Err(MarketError::InsufficientBalance);
        }

        let rate = if is_si {
            self.resolution_scale
        } else {
            Decimal::ONE - self.resolution_scale
        };
        let payout = math::floor_amount(amount * rate);

        if payout > self.collateral_balance {
            // Should be unreachable while the accounting invariant holds;
            // alert rather than present as a routine user failure.
            error!(vault = %self.account, %payout, balance = %self.collateral_balance,
                "claim payout exceeds vault collateral: accounting invariant violated");
            return Err(MarketError::InsufficientCollateral);
        }

        let vault = self.account.clone();
        if is_si {
            self.token_si.burn(&vault, caller, amount)?;
        } else {
            self.token_no.burn(&vault, caller, amount)?;
        }

        if payout > Decimal::ZERO {
            self.collateral_balance -= payout;
            collateral.transfer(&self.account, caller, payout)?;
        }

        info!(vault = %self.account, claimer = caller, %amount, is_si, %payout, "claim paid");
        Ok(payout)
    }
}
