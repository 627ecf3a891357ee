//! Weight expander: forward-fills each period's weights across its sessions.

use crate::domain::calendar::CalendarAligner;
use crate::domain::error::RebalanceError;
use crate::domain::partition::RebalancePeriod;
use crate::domain::weights::{DailyWeightSeries, WeightVector};

/// One row per trading session of every period, in `instruments` order.
/// Session counts come from the calendar, so holidays never shift rows.
pub fn expand(
    periods: &[(RebalancePeriod, WeightVector)],
    aligner: &CalendarAligner<'_>,
    instruments: &[String],
) -> Result<DailyWeightSeries, RebalanceError> {
    let mut dates = Vec::new();
    let mut rows = Vec::new();

    for (period, weights) in periods {
        let sessions = aligner.sessions_between(period.start, period.end)?;
        if let Some(last) = dates.last()
            && sessions[0] <= *last
        {
            return Err(RebalanceError::DataAlignment {
                reason: format!(
                    "period {} overlaps or precedes the previous period ending {}",
                    period, last
                ),
            });
        }
        let row = weights.aligned_to(instruments);
        rows.extend(std::iter::repeat_n(row, sessions.len()));
        dates.extend(sessions);
    }

    Ok(DailyWeightSeries {
        instruments: instruments.to_vec(),
        dates,
        rows,
    })
}
