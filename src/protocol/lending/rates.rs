//! Kinked utilization-based interest-rate curve.

use super::types::{Reserve, ReserveConfig};
use crate::core::error::ArithmeticError;
use crate::math::Decimal;

/// Rates are fractions (0.05 = 5%) in WAD fixed point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RateResult {
    pub utilization: Decimal,
    pub borrow_apy: Decimal,
    pub supply_apy: Decimal,
}

pub fn compute_rates(reserve: &Reserve) -> Result<RateResult, ArithmeticError> {
    let available = Decimal::from(reserve.liquidity.available_amount);
    let borrowed = reserve.liquidity.borrowed_amount_wads;
    let utilization = utilization_rate(available, borrowed)?;
    let borrow_apy = borrow_rate(&reserve.config, utilization)?;
    let supply_apy = borrow_apy.try_mul(utilization)?;

    Ok(RateResult {
        utilization,
        borrow_apy,
        supply_apy,
    })
}

/// `borrowed / (available + borrowed)`, zero for an empty reserve.
pub fn utilization_rate(available: Decimal, borrowed: Decimal) -> Result<Decimal, ArithmeticError> {
    let total = available.try_add(borrowed)?;
    if total.is_zero() {
        return Ok(Decimal::zero());
    }
    borrowed.try_div(total)
}

/// Piecewise-linear borrow rate. A zero optimal utilization puts every
/// utilization above the kink.
pub fn borrow_rate(config: &ReserveConfig, utilization: Decimal) -> Result<Decimal, ArithmeticError> {
    let optimal = Decimal::from_percent(config.optimal_utilization_rate);
    let min_rate = Decimal::from_percent(config.min_borrow_rate);
    let optimal_rate = Decimal::from_percent(config.optimal_borrow_rate);

    if optimal == Decimal::one() || utilization < optimal {
        let normalized = utilization.try_div(optimal)?;
        lerp(min_rate, optimal_rate, normalized)
    } else {
        let max_rate = Decimal::from_percent(config.max_borrow_rate);
        let normalized = utilization
            .try_sub(optimal)?
            .try_div(Decimal::one().try_sub(optimal)?)?;
        lerp(optimal_rate, max_rate, normalized)
    }
}

// `from + t * (to - from)` without leaving the unsigned range when `to < from`.
fn lerp(from: Decimal, to: Decimal, t: Decimal) -> Result<Decimal, ArithmeticError> {
    if to >= from {
        from.try_add(to.try_sub(from)?.try_mul(t)?)
    } else {
        from.try_sub(from.try_sub(to)?.try_mul(t)?)
    }
}
