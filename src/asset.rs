use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_traits::ToPrimitive;

/// Fixed-point scale of the native token: 4 decimal places.
pub const PRECISION: i64 = 4;
pub const SCALE: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Minor units.
    pub amount: u64,
    pub symbol: String,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum AssetError {
    #[error("asset `{0}` is not `<quantity> <SYMBOL>`")]
    Malformed(String),
    #[error("invalid quantity `{0}`")]
    Quantity(String),
    #[error("quantity `{0}` has more than 4 decimal places")]
    Precision(String),
    #[error("quantity `{0}` does not fit minor units")]
    OutOfRange(String),
}

/// Parses a decimal token quantity exactly and scales it to minor units.
pub fn parse_quantity(quantity: &str) -> Result<u64, AssetError> {
    let value = BigDecimal::from_str(quantity)
        .map_err(|_| AssetError::Quantity(quantity.to_string()))?;
    let (_, scale) = value.as_bigint_and_exponent();
    if scale > PRECISION {
        return Err(AssetError::Precision(quantity.to_string()));
    }
    (value * BigDecimal::from(SCALE))
        .to_u64()
        .ok_or_else(|| AssetError::OutOfRange(quantity.to_string()))
}

impl FromStr for Asset {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (quantity, symbol) = s
            .trim()
            .split_once(' ')
            .ok_or_else(|| AssetError::Malformed(s.to_string()))?;
        let symbol = symbol.trim();
        if symbol.is_empty() || symbol.contains(' ') {
            return Err(AssetError::Malformed(s.to_string()));
        }
        Ok(Self {
            amount: parse_quantity(quantity)?,
            symbol: symbol.to_string(),
        })
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:04} {}",
            self.amount / SCALE,
            self.amount % SCALE,
            self.symbol
        )
    }
}
