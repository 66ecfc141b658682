use std::fmt;

use serde::{Deserialize, Serialize};

/// Milliunits per cent in the budgeting service wire format.
const MILLIUNITS_PER_CENT: i64 = 10;

/// Signed money amount represented as **integer cents**.
///
/// Ledger amounts are decimals with two fractional digits; storing them as
/// cents keeps every sum exact. The budgeting service speaks *milliunits*
/// (dollars × 1000), see [`Money::checked_to_milliunits`].
///
/// # Examples
///
/// ```rust
/// use engine::Money;
///
/// let amount = Money::from_cents(1250);
/// assert_eq!(amount.checked_to_milliunits(), Some(12_500));
/// assert_eq!(amount.to_string(), "12.50");
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Creates a new amount from integer cents.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Converts to the wire representation (`round(dollars × 1000)`).
    ///
    /// Exact for every cent value; `None` when the result does not fit.
    #[must_use]
    pub const fn checked_to_milliunits(self) -> Option<i64> {
        self.0.checked_mul(MILLIUNITS_PER_CENT)
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}
