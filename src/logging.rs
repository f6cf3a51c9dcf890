use std::fmt;
use std::str::FromStr;

use crate::error::ReductionError;

/// Severity names used by reduction scripts when reporting to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Notice,
    Warning,
    Error,
    Information,
    Debug,
}

impl LogLevel {
    pub fn log(self, message: &str) {
        match self {
            LogLevel::Notice | LogLevel::Information => tracing::info!("{message}"),
            LogLevel::Warning => tracing::warn!("{message}"),
            LogLevel::Error => tracing::error!("{message}"),
            LogLevel::Debug => tracing::debug!("{message}"),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Information => "information",
            LogLevel::Debug => "debug",
        };
        write!(f, "{name}")
    }
}

impl FromStr for LogLevel {
    type Err = ReductionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "notice" => Ok(LogLevel::Notice),
            "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "information" => Ok(LogLevel::Information),
            "debug" => Ok(LogLevel::Debug),
            _ => Err(ReductionError::invalid_value("log_level", value)),
        }
    }
}
