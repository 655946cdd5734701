// ============================================================================
// Error Taxonomy - Coverpool Protocol Core
// ============================================================================
//
// One crate-wide error enum covering the four failure families:
//   - Authorization: a non-owning caller invoked a privileged mutation
//   - State:         operation invoked in the wrong lifecycle phase
//   - Validation:    malformed caller input
//   - Resource:      insufficient funds/reserves for the requested operation
//
// All errors are synchronous and leave every ledger unchanged. The caller
// (a presentation layer) translates them into user-facing messages; the
// core only returns structured variants.
//
// InsufficientCollateral is special: it means the vault accounting invariant
// is broken. It is logged at error severity where raised and should be
// alerted on, not shown as a routine user mistake.
//
// ============================================================================

use rust_decimal::Decimal;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    // --- Authorization ---
    /// Caller is not the owner/resolver required for this mutation
    Unauthorized,

    // --- State ---
    /// Vault already initialized for this market
    AlreadyInitialized,
    /// Resolve was already called once
    AlreadyResolved,
    /// Claim attempted before resolution
    NotResolved,
    /// Unresolved-phase operation attempted after resolution
    Resolved,
    /// Pair already holds initial reserves
    AlreadySeeded,

    // --- Validation ---
    /// Empty market name or token symbol
    InvalidName,
    /// Resolution scale outside [0, 1] (or risk percent outside 0-100)
    InvalidScale(Decimal),
    /// Amount must be positive
    InvalidAmount(Decimal),
    /// Registry index past the end of the pool list
    IndexOutOfRange { index: usize, len: usize },

    // --- Resource ---
    /// Account holds less than the requested amount
    InsufficientBalance,
    /// Allowance does not cover the requested spend
    InsufficientAllowance,
    /// A pair reserve is empty (or the pool was never seeded)
    InsufficientLiquidity,
    /// Computed output is zero or below the caller's minimum bound
    InsufficientOutput,
    /// Caller holds fewer liquidity shares than requested
    InsufficientShares,
    /// Vault cannot cover a payout: accounting invariant violation
    InsufficientCollateral,

    /// Arithmetic overflow in AMM math
    Overflow,
}

impl fmt::Display for MarketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketError::Unauthorized => write!(f, "Caller is not authorized for this operation"),
            MarketError::AlreadyInitialized => write!(f, "Vault is already initialized"),
            MarketError::AlreadyResolved => write!(f, "Market is already resolved"),
            MarketError::NotResolved => write!(f, "Market is not resolved yet"),
            MarketError::Resolved => write!(f, "Operation not allowed after resolution"),
            MarketError::AlreadySeeded => write!(f, "Pair already holds initial reserves"),
            MarketError::InvalidName => write!(f, "Name and token symbols must be non-empty"),
            MarketError::InvalidScale(s) => write!(f, "Scale out of range: {}", s),
            MarketError::InvalidAmount(a) => write!(f, "Amount must be positive: {}", a),
            MarketError::IndexOutOfRange { index, len } => {
                write!(f, "Pool index {} out of range (length {})", index, len)
            }
            MarketError::InsufficientBalance => write!(f, "Insufficient token balance"),
            MarketError::InsufficientAllowance => write!(f, "Insufficient allowance"),
            MarketError::InsufficientLiquidity => write!(f, "Insufficient pool liquidity"),
            MarketError::InsufficientOutput => {
                write!(f, "Output is zero or below the minimum bound")
            }
            MarketError::InsufficientShares => write!(f, "Insufficient liquidity shares"),
            MarketError::InsufficientCollateral => {
                write!(f, "Vault collateral cannot cover payout (invariant violation)")
            }
            MarketError::Overflow => write!(f, "Arithmetic overflow"),
        }
    }
}

impl std::error::Error for MarketError {}
