use std::{
    iter::Sum,
    ops::{Add, Sub},
};

use common::primitives::{Amount, SignedAmount};
use utils::newtype;

newtype! {
    #[derive(Debug, Eq, PartialEq, Ord, PartialOrd, Copy, Clone)]
    pub struct Fee(Amount)
}

impl Fee {
    pub const ZERO: Fee = Fee(Amount::ZERO);

    /// Apply a signed prioritisation delta. Negative deltas saturate at zero
    /// rather than wrapping, so a heavily deprioritised transaction simply
    /// counts as paying nothing.
    pub fn saturating_add_signed(self, delta: SignedAmount) -> Fee {
        Fee(self.0.add_signed(delta).unwrap_or(Amount::ZERO))
    }

    pub fn add_signed(self, delta: SignedAmount) -> Option<Fee> {
        self.0.add_signed(delta).map(Fee)
    }
}

impl Add for Fee {
    type Output = Option<Self>;

    fn add(self, rhs: Self) -> Self::Output {
        (self.0 + rhs.0).map(Self)
    }
}

impl Sub for Fee {
    type Output = Option<Self>;

    fn sub(self, rhs: Self) -> Self::Output {
        (self.0 - rhs.0).map(Self)
    }
}

impl Sum<Fee> for Option<Fee> {
    fn sum<I>(mut iter: I) -> Self
    where
        I: Iterator<Item = Fee>,
    {
        iter.try_fold(Fee(Amount::ZERO), Add::add)
    }
}

impl std::fmt::Display for Fee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
