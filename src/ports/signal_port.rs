//! External signal gate port trait.

use chrono::NaiveDate;

/// A boolean gate over trading days. An inactive day holds the portfolio flat.
pub trait SignalGate {
    fn is_active(&self, date: NaiveDate) -> bool;
}
