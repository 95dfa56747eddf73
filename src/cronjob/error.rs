use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Field '{field}' has invalid cron schedule '{value}': {reason}")]
    InvalidSchedule {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error(
        "Field '{field}' must not carry a time zone prefix ('{value}'); set 'timeZone' instead"
    )]
    ScheduleTimeZonePrefix { field: &'static str, value: String },

    #[error("Field '{field}' must be greater than or equal to 0, got {value}")]
    Negative { field: &'static str, value: i64 },

    #[error("Field '{field}' must be greater than 0, got {value}")]
    NotPositive { field: &'static str, value: i64 },

    #[error("Field '{field}' must not exceed {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        max: i64,
    },

    #[error("Field '{field}' has invalid value '{value}'; expected one of: {}", allowed.join(", "))]
    InvalidEnumValue {
        field: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },

    #[error("Field '{field}' expects an integer, got '{value}'")]
    NotAnInteger { field: &'static str, value: String },

    #[error("Field '{field}' expects 'true' or 'false', got '{value}'")]
    NotABoolean { field: &'static str, value: String },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),
}

impl ConfigurationError {
    /// Name of the offending field, if the error is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigurationError::InvalidSchedule { field, .. }
            | ConfigurationError::ScheduleTimeZonePrefix { field, .. }
            | ConfigurationError::Negative { field, .. }
            | ConfigurationError::NotPositive { field, .. }
            | ConfigurationError::OutOfRange { field, .. }
            | ConfigurationError::InvalidEnumValue { field, .. }
            | ConfigurationError::NotAnInteger { field, .. }
            | ConfigurationError::NotABoolean { field, .. } => Some(field),
            ConfigurationError::UnknownKey(_) => None,
        }
    }
}
