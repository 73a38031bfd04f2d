//! Token and account primitives
//!
//! Symbols are 1-7 uppercase alphanumeric characters packed into a `u64`
//! raw code; assets carry an `i64` minor-unit amount plus a symbol with
//! its decimal precision. Account names are 1-13 characters of `a-z`,
//! `1-5` and dots. Raw codes key every per-migration store.

use arrayvec::ArrayString;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Maximum symbol code length
pub const MAX_SYMBOL_LEN: usize = 7;

/// Maximum account name length
pub const MAX_ACCOUNT_LEN: usize = 13;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("invalid symbol code: {0:?}")]
    BadSymbolCode(String),
    #[error("invalid account name: {0:?}")]
    BadAccountName(String),
    #[error("symbol precision out of range: {0}")]
    PrecisionOutOfRange(u8),
    #[error("asset amount overflow")]
    AmountOverflow,
    #[error("invalid asset: {0:?}")]
    BadAsset(String),
}

/// A token symbol code: 1-7 uppercase letters or digits packed into a u64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolCode(u64);

impl SymbolCode {
    pub fn new(code: &str) -> Result<Self, TypeError> {
        if code.is_empty() || code.len() > MAX_SYMBOL_LEN {
            return Err(TypeError::BadSymbolCode(code.to_string()));
        }
        let mut raw = 0u64;
        for (i, b) in code.bytes().enumerate() {
            if !b.is_ascii_uppercase() && !b.is_ascii_digit() {
                return Err(TypeError::BadSymbolCode(code.to_string()));
            }
            raw |= (b as u64) << (8 * i);
        }
        Ok(SymbolCode(raw))
    }

    /// Concatenate two codes, e.g. deriving a replacement pool symbol
    pub fn join(&self, other: &SymbolCode) -> Result<SymbolCode, TypeError> {
        let joined = format!("{}{}", self, other);
        SymbolCode::new(&joined)
    }
}

impl fmt::Display for SymbolCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut raw = self.0;
        while raw > 0 {
            write!(f, "{}", (raw & 0xff) as u8 as char)?;
            raw >>= 8;
        }
        Ok(())
    }
}

impl FromStr for SymbolCode {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SymbolCode::new(s)
    }
}

impl Serialize for SymbolCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SymbolCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CodeVisitor;

        impl Visitor<'_> for CodeVisitor {
            type Value = SymbolCode;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a 1-7 character uppercase alphanumeric symbol code")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<SymbolCode, E> {
                SymbolCode::new(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(CodeVisitor)
    }
}

/// Symbol code plus decimal precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSymbol {
    pub code: SymbolCode,
    pub precision: u8,
}

impl TokenSymbol {
    pub fn new(code: SymbolCode, precision: u8) -> Result<Self, TypeError> {
        if precision > 18 {
            return Err(TypeError::PrecisionOutOfRange(precision));
        }
        Ok(TokenSymbol { code, precision })
    }

    /// One minor unit of this symbol
    pub fn one_unit(&self) -> Asset {
        Asset {
            amount: 1,
            symbol: *self,
        }
    }
}

impl fmt::Display for TokenSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.precision, self.code)
    }
}

/// A token quantity in minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub amount: i64,
    pub symbol: TokenSymbol,
}

impl Asset {
    pub fn new(amount: i64, symbol: TokenSymbol) -> Self {
        Asset { amount, symbol }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Amount rendered at the symbol's precision, without the code
    /// (the form conversion memos carry as a minimum-return field)
    pub fn decimal_amount(&self) -> String {
        let p = self.symbol.precision as u32;
        let sign = if self.amount < 0 { "-" } else { "" };
        let mag = self.amount.unsigned_abs();
        if p == 0 {
            return format!("{}{}", sign, mag);
        }
        let scale = 10u64.pow(p);
        format!(
            "{}{}.{:0width$}",
            sign,
            mag / scale,
            mag % scale,
            width = p as usize
        )
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.decimal_amount(), self.symbol.code)
    }
}

impl FromStr for Asset {
    type Err = TypeError;

    /// Parse `"1.0500 BNT"`; the number of decimals fixes the precision
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || TypeError::BadAsset(s.to_string());
        let (amount_str, code_str) = s.split_once(' ').ok_or_else(bad)?;
        let code = SymbolCode::new(code_str)?;

        let (sign, digits) = match amount_str.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, amount_str),
        };
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(bad());
        }

        let symbol = TokenSymbol::new(code, frac_part.len() as u8)?;
        let mut amount: i64 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            if !b.is_ascii_digit() {
                return Err(bad());
            }
            amount = amount
                .checked_mul(10)
                .and_then(|a| a.checked_add((b - b'0') as i64))
                .ok_or(TypeError::AmountOverflow)?;
        }
        Ok(Asset::new(sign * amount, symbol))
    }
}

/// An account on the ledger host: 1-13 characters of `a-z`, `1-5`, `.`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountName(ArrayString<MAX_ACCOUNT_LEN>);

impl AccountName {
    pub fn new(name: &str) -> Result<Self, TypeError> {
        if name.is_empty() || name.len() > MAX_ACCOUNT_LEN {
            return Err(TypeError::BadAccountName(name.to_string()));
        }
        let valid = name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || (b'1'..=b'5').contains(&b) || b == b'.');
        if !valid {
            return Err(TypeError::BadAccountName(name.to_string()));
        }
        let mut s = ArrayString::new();
        s.push_str(name);
        Ok(AccountName(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountName {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountName::new(s)
    }
}
