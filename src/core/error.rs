use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("unknown parameter field: {0}")]
    UnknownField(String),

    #[error("invalid value {value} for {field}: {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("simulation span of {years} years exceeds the maximum of {max}")]
    SpanTooLong { years: i64, max: i64 },

    #[error("engine already finished; advance_month is not allowed")]
    EngineFinished,

    #[error("duplicate scenario name: {0}")]
    DuplicateScenario(String),

    #[error("scenario name must not be empty")]
    EmptyScenarioName,
}
