//! Domain error types.

/// Why the optimizer could not produce a weight vector.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverFailure {
    #[error("no instrument has an expected return above the risk-free rate {risk_free_rate}")]
    NoPositiveExcessReturn { risk_free_rate: f64 },

    #[error("covariance matrix gives the optimal portfolio zero variance")]
    SingularCovariance,

    #[error("did not converge within {iterations} iterations")]
    NonConvergence { iterations: usize },

    #[error("optimizer stopped with status {status}")]
    Unsolved { status: String },

    #[error("solver returned {got} weights for {expected} instruments")]
    WrongLength { expected: usize, got: usize },

    #[error("solver returned a non-finite or negative weight")]
    InvalidWeight,
}

/// Top-level error type for rebalancer.
#[derive(Debug, thiserror::Error)]
pub enum RebalanceError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no trading sessions between {start} and {end}")]
    EmptyRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("date alignment error: {reason}")]
    DataAlignment { reason: String },

    #[error("insufficient data for {context}: have {observations} observations, need {minimum}")]
    InsufficientData {
        context: String,
        observations: usize,
        minimum: usize,
    },

    #[error("solver error for period starting {period_start}: {failure}")]
    Solver {
        period_start: chrono::NaiveDate,
        failure: SolverFailure,
    },

    #[error("discretization error: {reason}")]
    Discretization { reason: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RebalanceError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        RebalanceError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        RebalanceError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    pub(crate) fn data(reason: impl Into<String>) -> Self {
        RebalanceError::Data {
            reason: reason.into(),
        }
    }
}

impl From<&RebalanceError> for std::process::ExitCode {
    fn from(err: &RebalanceError) -> Self {
        let code: u8 = match err {
            RebalanceError::Io(_) => 1,
            RebalanceError::ConfigParse { .. }
            | RebalanceError::ConfigMissing { .. }
            | RebalanceError::ConfigInvalid { .. }
            | RebalanceError::EmptyRange { .. } => 2,
            RebalanceError::Data { .. } => 3,
            RebalanceError::DataAlignment { .. } => 4,
            RebalanceError::InsufficientData { .. } => 5,
            RebalanceError::Solver { .. } => 6,
            RebalanceError::Discretization { .. } => 7,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn solver_error_message_names_period() {
        let err = RebalanceError::Solver {
            period_start: NaiveDate::from_ymd_opt(2010, 1, 4).unwrap(),
            failure: SolverFailure::NonConvergence { iterations: 50 },
        };
        let msg = err.to_string();
        assert!(msg.contains("2010-01-04"));
        assert!(msg.contains("50 iterations"));
    }

    #[test]
    fn insufficient_data_message() {
        let err = RebalanceError::InsufficientData {
            context: "estimation window".into(),
            observations: 3,
            minimum: 6,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data for estimation window: have 3 observations, need 6"
        );
    }

    #[test]
    fn config_helpers_fill_section_and_key() {
        let err = RebalanceError::invalid("backtest", "period", "unknown period");
        assert!(
            matches!(err, RebalanceError::ConfigInvalid { ref section, ref key, .. } if section == "backtest" && key == "period")
        );
        let err = RebalanceError::missing("data", "prices");
        assert_eq!(err.to_string(), "missing config key [data] prices");
    }
}
