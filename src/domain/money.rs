//! Monetary types for price, size and percentage representation.

use rust_decimal::Decimal;

/// Price represented as a Decimal for precision.
pub type Price = Decimal;

/// Position size (in coin units) represented as a Decimal.
pub type Volume = Decimal;

/// Percentage in points, e.g. `-87.2` for a 87.2% loss.
pub type Percent = Decimal;
