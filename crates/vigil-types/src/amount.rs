use crate::error::{Result, TypesError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const TOKEN_DECIMALS: u32 = 18;
pub const TOKEN_BASE_UNIT: u128 = 1_000_000_000_000_000_000; // 10^18
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Fixed-point token amount counted in base units (18 decimals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    pub const fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    /// Whole tokens.
    pub const fn from_tokens(tokens: u64) -> Self {
        Self(tokens as u128 * TOKEN_BASE_UNIT)
    }

    pub const fn to_base_units(&self) -> u128 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// `self * numerator / denominator`, rounded down.
    pub fn mul_div(&self, numerator: u128, denominator: u128) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        self.0.checked_mul(numerator).map(|v| Self(v / denominator))
    }

    /// Share expressed in basis points (10_000 = 100%), rounded down.
    pub fn bps(&self, bps: u32) -> Option<Self> {
        self.mul_div(bps as u128, BPS_DENOMINATOR)
    }

    pub fn checked_mul(&self, factor: u128) -> Option<Self> {
        self.0.checked_mul(factor).map(Self)
    }

    /// Decimal rendering without unit, trailing zeros trimmed: `12.5`, `50`.
    pub fn to_decimal_string(&self) -> String {
        let whole = self.0 / TOKEN_BASE_UNIT;
        let frac = self.0 % TOKEN_BASE_UNIT;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{:018}", frac);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} VGL", self.to_decimal_string())
    }
}

impl FromStr for TokenAmount {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        let input = s.trim();
        let input = input.strip_suffix("VGL").unwrap_or(input).trim();
        if input.is_empty() {
            return Err(TypesError::InvalidAmount(s.to_string()));
        }

        let (whole, frac) = match input.split_once('.') {
            Some((w, f)) => (w, f),
            None => (input, ""),
        };
        if frac.len() > TOKEN_DECIMALS as usize {
            return Err(TypesError::TooPrecise {
                input: s.to_string(),
                max: TOKEN_DECIMALS,
            });
        }
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || !all_digits(frac) {
            return Err(TypesError::InvalidAmount(s.to_string()));
        }

        let whole: u128 = whole
            .parse()
            .map_err(|_| TypesError::InvalidAmount(s.to_string()))?;
        let frac_units: u128 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<18}", frac);
            padded
                .parse()
                .map_err(|_| TypesError::InvalidAmount(s.to_string()))?
        };

        whole
            .checked_mul(TOKEN_BASE_UNIT)
            .and_then(|w| w.checked_add(frac_units))
            .map(Self)
            .ok_or(TypesError::Overflow)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bps_split() {
        let payout = TokenAmount::from_tokens(50);
        let worker = payout.bps(8_000).unwrap();
        let pool = payout.checked_sub(worker).unwrap();

        assert_eq!(worker, TokenAmount::from_tokens(40));
        assert_eq!(pool, TokenAmount::from_tokens(10));
    }

    #[test]
    fn test_decimal_parsing() {
        assert_eq!(
            "12.5".parse::<TokenAmount>().unwrap(),
            TokenAmount::from_base_units(12_500_000_000_000_000_000)
        );
        assert_eq!(
            "50 VGL".parse::<TokenAmount>().unwrap(),
            TokenAmount::from_tokens(50)
        );
        assert!(matches!(
            "1.0000000000000000001".parse::<TokenAmount>(),
            Err(TypesError::TooPrecise { .. })
        ));
        assert!("-3".parse::<TokenAmount>().is_err());
        assert!(".5".parse::<TokenAmount>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(TokenAmount::from_tokens(50).to_string(), "50 VGL");
        assert_eq!(
            TokenAmount::from_base_units(TOKEN_BASE_UNIT / 4).to_string(),
            "0.25 VGL"
        );
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&TokenAmount::from_tokens(3)).unwrap();
        assert_eq!(json, "\"3\"");
        let back: TokenAmount = serde_json::from_str("\"2.75\"").unwrap();
        assert_eq!(back.to_decimal_string(), "2.75");
    }

    proptest! {
        #[test]
        fn prop_split_conserves_total(units in 0u128..(1u128 << 100), bps in 0u32..=10_000) {
            let total = TokenAmount::from_base_units(units);
            let share = total.bps(bps).unwrap();
            let rest = total.checked_sub(share).unwrap();
            prop_assert!(share <= total);
            prop_assert_eq!(share.checked_add(rest).unwrap(), total);
        }
    }
}
