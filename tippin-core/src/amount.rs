//! Coin amounts as submitted through the faucet form and their conversion to atoms.
//!
//! `CoinAmount` holds the decimal value a visitor typed in, `Atoms` is the integer
//! amount in the smallest unit the node works with. One coin is 10^8 atoms and the
//! conversion truncates towards zero, which is the fixed-point convention of the node.
use std::{fmt, str::FromStr};

use crate::error::TippinCoreError;

pub const ATOMS_PER_COIN: u64 = 100_000_000;

/// Largest amount (in coins) a single invoice may request.
pub const DEFAULT_MAX_INVOICE_AMOUNT: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct CoinAmount(f64);

impl CoinAmount {
    pub fn coins(&self) -> f64 {
        self.0
    }

    pub fn exceeds(&self, max_coins: f64) -> bool {
        self.0 > max_coins
    }

    pub fn to_atoms(&self) -> Atoms {
        Atoms((self.0 * ATOMS_PER_COIN as f64) as u64)
    }
}

impl FromStr for CoinAmount {
    type Err = TippinCoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let coins = s
            .parse::<f64>()
            .map_err(|_| TippinCoreError::AmountNotNumber(s.to_owned()))?;

        // out of range values overflow to infinity, only an explicit infinity is a number
        if coins.is_nan() || (coins.is_infinite() && !is_infinity_literal(s)) {
            return Err(TippinCoreError::AmountNotNumber(s.to_owned()));
        }
        if coins < 0.0 {
            return Err(TippinCoreError::NegativeAmount(s.to_owned()));
        }
        Ok(Self(coins))
    }
}

fn is_infinity_literal(s: &str) -> bool {
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Atoms(pub u64);

impl fmt::Display for Atoms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} DCR", self.0 as f64 / ATOMS_PER_COIN as f64)
    }
}
