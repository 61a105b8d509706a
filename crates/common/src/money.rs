use serde::{Deserialize, Serialize};

/// Money amount in integer cents to avoid floating point drift.
/// Serializes as the bare cents value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    /// Amount in cents (e.g. 1000 = $10.00).
    cents: i64,
}

impl Money {
    /// Creates an amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Zero amount.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Parses a decimal string such as `"12.35"` (carrier APIs quote
    /// prices this way). Truncates anything past two fraction digits.
    pub fn parse_decimal(s: &str) -> Option<Self> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        let whole: i64 = whole.parse().ok()?;
        let frac = &frac[..frac.len().min(2)];
        let mut frac_cents: i64 = if frac.is_empty() { 0 } else { frac.parse().ok()? };
        if frac.len() == 1 {
            frac_cents *= 10;
        }
        let sign = if s.starts_with('-') { -1 } else { 1 };
        Some(Self {
            cents: whole * 100 + sign * frac_cents,
        })
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Whole-currency portion.
    pub fn units(&self) -> i64 {
        self.cents / 100
    }

    /// Fractional portion after the whole units.
    pub fn subunits(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents * i64::from(quantity),
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-{}.{:02}", self.units().abs(), self.subunits())
        } else {
            write!(f, "{}.{:02}", self.units(), self.subunits())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents - rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_cents_splits_units() {
        let money = Money::from_cents(1234);
        assert_eq!(money.cents(), 1234);
        assert_eq!(money.units(), 12);
        assert_eq!(money.subunits(), 34);
    }

    #[test]
    fn parse_decimal_variants() {
        assert_eq!(Money::parse_decimal("12.35").unwrap().cents(), 1235);
        assert_eq!(Money::parse_decimal("12").unwrap().cents(), 1200);
        assert_eq!(Money::parse_decimal("12.5").unwrap().cents(), 1250);
        assert_eq!(Money::parse_decimal("0.05").unwrap().cents(), 5);
        assert_eq!(Money::parse_decimal("-3.25").unwrap().cents(), -325);
        assert!(Money::parse_decimal("abc").is_none());
    }

    #[test]
    fn display_formats_two_places() {
        assert_eq!(Money::from_cents(1234).to_string(), "12.34");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-12.34");
    }

    #[test]
    fn arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);
        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.multiply(3).cents(), 3000);
    }

    #[test]
    fn sum_of_amounts() {
        let total: Money = [100, 250, 50].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 400);
    }
}
