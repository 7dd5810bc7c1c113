//! Error type shared by every layer of the simulation.
//!
//! There is a single error family. Configuration problems are reported
//! before the first event is processed; a run never fails half way through
//! for a configuration reason.

/// Errors returned by the simulation library.
#[derive(Debug, Clone, PartialEq)]
pub enum EpidemicError {
    /// A rate parameter, weight attribute, initial condition or horizon is
    /// invalid.
    Configuration {
        /// Name of the offending parameter.
        parameter: String,
        /// Human readable description of the problem.
        message: String,
    },
    /// An event was scheduled before the current simulation clock.
    InvalidTime {
        /// The requested event time.
        time: f64,
        /// The clock at the moment of scheduling.
        clock: f64,
    },
    /// A one-shot interface was used twice.
    Use(String),
}

impl EpidemicError {
    pub(crate) fn configuration(parameter: &str, message: impl Into<String>) -> Self {
        Self::Configuration {
            parameter: parameter.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EpidemicError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration { parameter, message } => {
                write!(f, "invalid configuration for {parameter}: {message}")
            }
            Self::InvalidTime { time, clock } => {
                write!(f, "cannot schedule event at {time}, clock is already at {clock}")
            }
            Self::Use(message) => write!(f, "invalid use: {message}"),
        }
    }
}

impl std::error::Error for EpidemicError {}
