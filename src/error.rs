use std::fmt::{self, Display};
use std::io;

/// Provides `SimError` and maps other errors to
/// convert to a `SimError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum SimError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    /// Inputs that make a run meaningless: empty duration data, bad
    /// occupancy, a horizon that is not a finite non-negative number.
    ConfigError(String),
    /// A draw asked for more items than the pool holds.
    SamplingError(String),
    ReportError(String),
}

impl From<io::Error> for SimError {
    fn from(error: io::Error) -> Self {
        SimError::IoError(error)
    }
}

impl From<serde_json::Error> for SimError {
    fn from(error: serde_json::Error) -> Self {
        SimError::JsonError(error)
    }
}

impl From<csv::Error> for SimError {
    fn from(error: csv::Error) -> Self {
        SimError::CsvError(error)
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::IoError(error) => Some(error),
            SimError::JsonError(error) => Some(error),
            SimError::CsvError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimError::IoError(error) => write!(f, "I/O error: {error}"),
            SimError::JsonError(error) => write!(f, "invalid JSON: {error}"),
            SimError::CsvError(error) => write!(f, "invalid CSV: {error}"),
            SimError::ConfigError(message) => write!(f, "configuration error: {message}"),
            SimError::SamplingError(message) => write!(f, "sampling error: {message}"),
            SimError::ReportError(message) => write!(f, "report error: {message}"),
        }
    }
}
