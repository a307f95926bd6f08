//! Value objects shared across the marketplace schemas.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Money amount in USD, represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates a new Money amount from a dollar value.
    pub fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is an exact whole-dollar value.
    pub fn is_whole_dollars(&self) -> bool {
        self.0 % 100 == 0
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cents_part = self.0.abs() % 100;
        if self.0 < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), cents_part)
        } else {
            write!(f, "${}.{:02}", self.dollars(), cents_part)
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

/// The two flavors of collectible. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectibleKind {
    /// Bought for a price from the creator.
    Trade,
    /// Collected for free by redeeming a single-use code.
    Event,
}

impl CollectibleKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectibleKind::Trade => "trade",
            CollectibleKind::Event => "event",
        }
    }
}

impl std::fmt::Display for CollectibleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Finite stock counter of a collectible.
///
/// Invariant: `0 <= remaining <= initial`. `remaining` is only ever
/// mutated through atomic decrements (and the matching rollback
/// increments), never through read-modify-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub initial: u32,
    pub remaining: u32,
}

impl Stock {
    /// Creates a full stock of the given size.
    pub fn new(initial: u32) -> Self {
        Self {
            initial,
            remaining: initial,
        }
    }

    /// Returns true when no units are left.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Checks the stock invariant.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.remaining > self.initial {
            return Err(DomainError::StockExceedsInitial {
                initial: self.initial,
                remaining: self.remaining,
            });
        }
        Ok(())
    }
}
