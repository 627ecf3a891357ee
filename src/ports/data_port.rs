//! Price and macro data access port trait.

use crate::domain::error::RebalanceError;
use crate::domain::prices::PriceTable;
use crate::domain::regime::MacroObservation;

pub trait DataPort {
    /// Adjusted close table for the requested instruments, in request order.
    fn load_prices(&self, instruments: &[String]) -> Result<PriceTable, RebalanceError>;

    /// Monthly macro series (e.g. unemployment rate), ordered by date.
    fn load_macro_series(&self) -> Result<Vec<MacroObservation>, RebalanceError>;
}
