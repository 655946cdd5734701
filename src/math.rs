// ============================================================================
// Fixed-Point Math - Coverpool Protocol Core
// ============================================================================
//
// All protocol amounts are `rust_decimal::Decimal` values truncated to 18
// fractional digits, the fixed-point width the claim tokens use. AMM outputs
// round toward zero so the constant product never shrinks from rounding.
//
// The two closed-form solvers here back the Router zaps: they compute the
// swap input that rebalances a one-sided holding against the pool, derived
// from the constant-product invariant (fee-less form).
//
// ============================================================================

use crate::error::MarketError;
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};

/// Fractional digits of every protocol amount
pub const AMOUNT_DP: u32 = 18;

/// Truncate toward zero to the protocol's 18-digit width
pub fn floor_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(AMOUNT_DP, RoundingStrategy::ToZero)
}

/// Normalize a caller-supplied amount and require it to be positive
pub fn positive_amount(value: Decimal) -> Result<Decimal, MarketError> {
    let amount = floor_amount(value);
    if amount <= Decimal::ZERO {
        return Err(MarketError::InvalidAmount(value));
    }
    Ok(amount)
}

/// `a * b / d`, truncated to 18 digits
pub fn mul_div(a: Decimal, b: Decimal, d: Decimal) -> Result<Decimal, MarketError> {
    if d <= Decimal::ZERO {
        return Err(MarketError::InsufficientLiquidity);
    }
    a.checked_mul(b)
        .and_then(|p| p.checked_div(d))
        .map(floor_amount)
        .ok_or(MarketError::Overflow)
}

/// Square root of a non-negative amount, truncated to 18 digits
pub fn sqrt(value: Decimal) -> Result<Decimal, MarketError> {
    value.sqrt().map(floor_amount).ok_or(MarketError::Overflow)
}

/// Swap input that balances an equal-sided holding against the pool ratio.
///
/// The caller holds `equal` of both assets and wants leftover holdings in the
/// current reserve ratio. `reserve_in` is the reserve of the asset swapped in
/// (the one held in surplus relative to the ratio), `reserve_out` the other.
///
/// From the invariant: s = sqrt(r_in * r_out * (e + r_in) / (e + r_out)) - r_in.
/// Returns zero when the reserves are already balanced.
pub fn deposit_swap_input(
    equal: Decimal,
    reserve_in: Decimal,
    reserve_out: Decimal,
) -> Result<Decimal, MarketError> {
    if reserve_in <= Decimal::ZERO || reserve_out <= Decimal::ZERO {
        return Err(MarketError::InsufficientLiquidity);
    }
    let num = reserve_in
        .checked_mul(reserve_out)
        .and_then(|p| p.checked_mul(equal + reserve_in))
        .ok_or(MarketError::Overflow)?;
    let root = sqrt(num.checked_div(equal + reserve_out).ok_or(MarketError::Overflow)?)?;
    let s = floor_amount(root - reserve_in);
    Ok(s.clamp(Decimal::ZERO, equal))
}

/// Swap input that equalizes an uneven two-sided holding.
///
/// The caller holds `surplus` of the asset swapped in and `deficit` of the
/// other; `reserve_in`/`reserve_out` are the matching pool reserves. Solves
/// s^2 + s*(r_in + r_out + deficit - surplus) - r_in*(surplus - deficit) = 0
/// for the positive root. With `deficit == 0` this is the sell-side split.
pub fn equalize_swap_input(
    surplus: Decimal,
    deficit: Decimal,
    reserve_in: Decimal,
    reserve_out: Decimal,
) -> Result<Decimal, MarketError> {
    if reserve_in <= Decimal::ZERO || reserve_out <= Decimal::ZERO {
        return Err(MarketError::InsufficientLiquidity);
    }
    if surplus <= deficit {
        return Ok(Decimal::ZERO);
    }
    let p = reserve_in + reserve_out + deficit - surplus;
    let disc = p
        .checked_mul(p)
        .and_then(|pp| {
            reserve_in
                .checked_mul(surplus - deficit)
                .and_then(|q| q.checked_mul(Decimal::from(4)))
                .and_then(|q| pp.checked_add(q))
        })
        .ok_or(MarketError::Overflow)?;
    let s = floor_amount((sqrt(disc)? - p) / Decimal::TWO);
    Ok(s.clamp(Decimal::ZERO, surplus))
}
