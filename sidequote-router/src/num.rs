//! Conversions between arbitrary-precision amounts and fixed-scale decimals.

use num_bigint::BigUint;
use num_traits::{FromPrimitive, ToPrimitive, Zero};
use rust_decimal::Decimal;

/// Converts an amount to a decimal, if it fits the decimal's 96-bit
/// mantissa. Amounts beyond that range have no faithful fixed-scale
/// representation and the caller must treat the conversion as a failed
/// evaluation.
pub fn decimal_from_biguint(value: &BigUint) -> Option<Decimal> {
    value.to_u128().and_then(Decimal::from_u128)
}

/// Multiplies an amount by a non-negative decimal ratio, truncating the
/// result towards zero.
pub fn mul_amount_by_decimal(amount: &BigUint, ratio: Decimal) -> BigUint {
    if ratio.is_sign_negative() {
        return BigUint::zero();
    }
    let mantissa = ratio.mantissa().unsigned_abs();
    let scale = BigUint::from(10u32).pow(ratio.scale());
    amount * BigUint::from(mantissa) / scale
}
