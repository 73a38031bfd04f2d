//! Migration Model - Pure liquidation/funding math for pool migrations
//!
//! This crate contains the closed-form formulas used by the migration
//! orchestrator: the quadratic liquidation split for two-reserve pools and
//! the constant-ratio funding return for the destination pool.
//!
//! All arithmetic is exact integer arithmetic on minor units (u128
//! intermediates, floor rounding). No floating point anywhere: whether a
//! root exists in range is decided exactly, never through float rounding.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

pub mod math;

pub use math::{
    first_liquidation_amount, fund_pool_return, isqrt, liquidation_roots, liquidation_split,
};

/// Error types for migration math
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    /// Supply or quantity outside the valid domain (zero, or Q > S)
    NegativeDiscriminant,
    /// Neither quadratic root falls in (1, Q]
    NoValidRoot {
        /// Larger root, floored to integer
        x1: u128,
        /// Smaller root, floored to integer
        x2: u128,
    },
    /// Reserve balance is zero
    DivideByZero,
    /// Result exceeds the minor-unit domain
    Overflow,
}
