//! WAD fixed-point arithmetic.
//!
//! On-chain quantities (rates, cumulative factors, prices, value totals) are
//! stored as `u128` mantissas scaled by 10^18. All intermediate math runs on a
//! 192-bit integer so that `amount * WAD` cannot overflow for any `u128`
//! mantissa; `f64` only appears in the `to_*_f64` display helpers.

use crate::core::error::ArithmeticError;
use std::fmt;
use uint::construct_uint;

construct_uint! {
    pub struct U192(3);
}

/// Number of decimal places carried by a [`Decimal`].
pub const SCALE: usize = 18;
/// 10^18
pub const WAD: u64 = 1_000_000_000_000_000_000;
/// WAD / 100, one percentage point.
pub const PERCENT_SCALER: u64 = 10_000_000_000_000_000;

/// Unsigned fixed-point value with 18 decimal places.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decimal(U192);

impl Decimal {
    pub fn zero() -> Self {
        Self(U192::zero())
    }

    pub fn one() -> Self {
        Self(Self::wad())
    }

    fn wad() -> U192 {
        U192::from(WAD)
    }

    /// Wraps a raw WAD-scaled mantissa as read from account data.
    pub fn from_scaled_val(scaled_val: u128) -> Self {
        Self(U192::from(scaled_val))
    }

    /// Raw mantissa, for writing back into account-sized fields.
    pub fn to_scaled_val(&self) -> Result<u128, ArithmeticError> {
        if self.0.bits() > 128 {
            return Err(ArithmeticError::Overflow);
        }
        Ok(self.0.as_u128())
    }

    /// Integer percentage points (0-100 on chain) as a fraction.
    pub fn from_percent(percent: u8) -> Self {
        Self(U192::from(percent as u64 * PERCENT_SCALER))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn try_add(self, rhs: Self) -> Result<Self, ArithmeticError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(ArithmeticError::Overflow)
    }

    /// Fails with `Overflow` when `rhs > self`; the type has no negative range.
    pub fn try_sub(self, rhs: Self) -> Result<Self, ArithmeticError> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or(ArithmeticError::Overflow)
    }

    pub fn try_mul(self, rhs: Self) -> Result<Self, ArithmeticError> {
        self.0
            .checked_mul(rhs.0)
            .map(|product| Self(product / Self::wad()))
            .ok_or(ArithmeticError::Overflow)
    }

    /// `self^exp` by repeated squaring, rounding after every product.
    pub fn try_pow(self, mut exp: u64) -> Result<Self, ArithmeticError> {
        let mut base = self;
        let mut result = Self::one();
        while exp > 0 {
            if exp & 1 == 1 {
                result = result.try_mul(base)?;
            }
            exp >>= 1;
            if exp > 0 {
                base = base.try_mul(base)?;
            }
        }
        Ok(result)
    }

    /// `self / rhs`, result rescaled to WAD. Truncates toward zero.
    pub fn try_div(self, rhs: Self) -> Result<Self, ArithmeticError> {
        if rhs.0.is_zero() {
            return Err(ArithmeticError::DivisionByZero);
        }
        self.0
            .checked_mul(Self::wad())
            .map(|scaled| Self(scaled / rhs.0))
            .ok_or(ArithmeticError::Overflow)
    }

    pub fn try_div_u64(self, rhs: u64) -> Result<Self, ArithmeticError> {
        if rhs == 0 {
            return Err(ArithmeticError::DivisionByZero);
        }
        Ok(Self(self.0 / U192::from(rhs)))
    }

    /// Integer part, truncated.
    pub fn try_floor_u64(&self) -> Result<u64, ArithmeticError> {
        let floor = self.0 / Self::wad();
        if floor.bits() > 64 {
            return Err(ArithmeticError::Overflow);
        }
        Ok(floor.as_u64())
    }

    /// Lossy conversion for display. Never feed the result back into `Decimal` math.
    pub fn to_f64(&self) -> f64 {
        let int_part = self.0 / Self::wad();
        let frac_part = self.0 % Self::wad();
        u192_to_f64(int_part) + frac_part.as_u64() as f64 / WAD as f64
    }

    /// Treats the value as a native token amount and shifts it by the mint's
    /// decimals, e.g. a borrowed amount in WADs shown in human units.
    pub fn to_display_f64(&self, decimals: u8) -> f64 {
        self.to_f64() / 10f64.powi(decimals as i32)
    }
}

impl From<u64> for Decimal {
    fn from(val: u64) -> Self {
        Self(U192::from(val) * Self::wad())
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut digits = self.0.to_string();
        if digits.len() <= SCALE {
            digits = format!("{}{}", "0".repeat(SCALE - digits.len() + 1), digits);
        }
        digits.insert(digits.len() - SCALE, '.');
        f.write_str(&digits)
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal({})", self)
    }
}

fn u192_to_f64(value: U192) -> f64 {
    let U192(limbs) = value;
    limbs
        .iter()
        .rev()
        .fold(0.0, |acc, limb| acc * 18_446_744_073_709_551_616.0 + *limb as f64)
}

/// Human amount to native integer units, e.g. `1.5` USDC at 6 decimals -> `1_500_000`.
///
/// Rounds to the nearest unit; negative and non-finite inputs give zero.
pub fn to_native_amount(amount: f64, decimals: u8) -> u64 {
    if !amount.is_finite() || amount <= 0.0 {
        return 0;
    }
    (amount * 10f64.powi(decimals as i32)).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_scaled_val_round_trips_mantissa() {
        let raw = 123_456_789_000_000_000_000u128;
        assert_eq!(Decimal::from_scaled_val(raw).to_scaled_val().unwrap(), raw);
    }

    #[test]
    fn test_divide_rescales_to_wad() {
        let a = Decimal::from(100u64);
        let b = Decimal::from(1000u64);
        let q = a.try_div(b).unwrap();
        assert_eq!(q.to_scaled_val().unwrap(), 100_000_000_000_000_000);
    }

    #[test]
    fn test_divide_by_zero_is_rejected() {
        let err = Decimal::one().try_div(Decimal::zero()).unwrap_err();
        assert_eq!(err, ArithmeticError::DivisionByZero);
        assert_eq!(
            Decimal::one().try_div_u64(0).unwrap_err(),
            ArithmeticError::DivisionByZero
        );
    }

    #[test]
    fn test_pow() {
        assert_eq!(Decimal::from(2u64).try_pow(10).unwrap(), Decimal::from(1024u64));
        assert_eq!(Decimal::from(7u64).try_pow(0).unwrap(), Decimal::one());
        assert_eq!(Decimal::one().try_pow(u64::MAX).unwrap(), Decimal::one());
        assert_eq!(
            Decimal::from(u64::MAX).try_pow(4).unwrap_err(),
            ArithmeticError::Overflow
        );
    }

    #[test]
    fn test_subtract_underflow_is_rejected() {
        let err = Decimal::zero().try_sub(Decimal::one()).unwrap_err();
        assert_eq!(err, ArithmeticError::Overflow);
    }

    #[test]
    fn test_u128_max_times_wad_does_not_overflow() {
        let max = Decimal::from_scaled_val(u128::MAX);
        let q = max.try_div(Decimal::one()).unwrap();
        assert_eq!(q.to_scaled_val().unwrap(), u128::MAX);
    }

    #[test]
    fn test_from_percent() {
        assert_eq!(
            Decimal::from_percent(80).to_scaled_val().unwrap(),
            800_000_000_000_000_000
        );
        assert_eq!(Decimal::from_percent(100), Decimal::one());
    }

    #[test]
    fn test_display_float() {
        let borrowed = Decimal::from_scaled_val(500 * WAD as u128);
        assert!((borrowed.to_display_f64(6) - 0.0005).abs() < 1e-15);
        assert!((Decimal::from_scaled_val(1_500_000_000_000_000_000).to_f64() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_display_string() {
        assert_eq!(Decimal::from_percent(5).to_string(), "0.050000000000000000");
        assert_eq!(Decimal::from(12u64).to_string(), "12.000000000000000000");
    }

    #[test]
    fn test_to_native_amount() {
        assert_eq!(to_native_amount(1.5, 6), 1_500_000);
        assert_eq!(to_native_amount(0.1, 9), 100_000_000);
        assert_eq!(to_native_amount(-3.0, 6), 0);
        assert_eq!(to_native_amount(f64::NAN, 6), 0);
    }
}
