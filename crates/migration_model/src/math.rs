//! Closed-form liquidation and funding formulas - exact integer forms
//!
//! Liquidating a two-reserve pool position of `Q` pool tokens (total supply
//! `S`) in two sequential single-reserve redemptions must leave both legs
//! with equal proportional value:
//!
//! - x / S = (Q - x) / (S - x)
//! - x·S - x² = Q·S - x·S
//! - x² - 2S·x + Q·S = 0
//!
//! so the first leg redeems a root of that quadratic. The root is selected
//! in `(1, Q]` and reduced by one minor unit: the pool's min-return check
//! rejects redeeming the exact remaining balance in one call, and the spare
//! unit keeps the second leg (`Q - first`) redeemable.

use crate::MathError;

/// Floor integer square root (Newton's method)
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    // Initial guess 2^ceil(bits/2) >= sqrt(n); iterate until non-decreasing
    let bits = 128 - n.leading_zeros();
    let mut x = 1u128 << ((bits + 1) / 2);
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// Integer roots of `x² - 2S·x + Q·S = 0`, largest first
///
/// The discriminant over 4 is `S·(S - Q)`, so the real roots are
/// `S ± sqrt(S·(S - Q))`. Both are returned floored to integers (the lower
/// root subtracts the *ceiling* of the square root so that flooring is
/// exact rather than off by one).
///
/// # Errors
/// * `NegativeDiscriminant` - `S` or `Q` is zero, or `Q > S` (the held
///   quantity cannot exceed the supply; imaginary roots are not supported)
pub fn liquidation_roots(supply: u64, quantity: u64) -> Result<(u128, u128), MathError> {
    let s = supply as u128;
    let q = quantity as u128;
    if s == 0 || q == 0 || q > s {
        return Err(MathError::NegativeDiscriminant);
    }

    let d = s * (s - q);
    let root = isqrt(d);
    let root_ceil = if root * root == d { root } else { root + 1 };

    Ok((s + root, s - root_ceil))
}

/// First reserve's liquidation amount: in-range root minus one minor unit
///
/// Selects whichever root `r` of the quadratic satisfies `1 < r <= Q` and
/// returns `floor(r) - 1`. Range checks are decided on the exact
/// (irrational) roots via their squared forms, not on floored values:
///
/// - `S + sqrt(d) <= Q` only when `d == 0` and `Q == S` (both roots
///   collapse to `S`)
/// - `S - sqrt(d) > 1` iff `d < (S - 1)²`
/// - `S - sqrt(d) <= Q` always, since `(S - Q)² <= S·(S - Q)`
///
/// # Errors
/// * `NoValidRoot` - neither root is in `(1, Q]`; the supply/quantity pair
///   is numerically inconsistent and must not be silently approximated
pub fn first_liquidation_amount(supply: u64, quantity: u64) -> Result<u64, MathError> {
    let (x1, x2) = liquidation_roots(supply, quantity)?;
    let s = supply as u128;
    let q = quantity as u128;
    let d = s * (s - q);

    if d == 0 && s > 1 && s <= q {
        // Q == S: the double root S is exactly representable
        return Ok((x1 - 1) as u64);
    }
    if d < (s - 1) * (s - 1) {
        return Ok((x2 - 1) as u64);
    }

    Err(MathError::NoValidRoot { x1, x2 })
}

/// Two-reserve liquidation split: `(first, Q - first)`
///
/// The second reserve's leg is the complement by construction, so the two
/// amounts always sum to exactly `Q`. The closed form is defined for
/// exactly two reserves and does not generalize further.
pub fn liquidation_split(supply: u64, quantity: u64) -> Result<(u64, u64), MathError> {
    let first = first_liquidation_amount(supply, quantity)?;
    Ok((first, quantity - first))
}

/// Pool tokens returned for funding one reserve:
/// `floor(supply × contributed / reserve_balance)`
///
/// The caller takes the minimum across all reserves contributed in one
/// funding step (the constant-ratio constraint binds on the least
/// proportionally funded reserve). Rounding is always down so the minted
/// share never exceeds the contribution.
///
/// # Errors
/// * `DivideByZero` - the destination pool's reserve balance is zero
/// * `Overflow` - the result exceeds the minor-unit domain
pub fn fund_pool_return(
    supply: u64,
    contributed: u64,
    reserve_balance: u64,
) -> Result<u64, MathError> {
    if reserve_balance == 0 {
        return Err(MathError::DivideByZero);
    }

    let ret = (supply as u128 * contributed as u128) / reserve_balance as u128;
    if ret > u64::MAX as u128 {
        return Err(MathError::Overflow);
    }

    Ok(ret as u64)
}
