use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The execution backend a context was initialized with.
///
/// Resolved once when the context is initialized; every integrator and method built on that
/// context picks its stepper implementation from it at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// Serial host implementation.
    Cpu,
    /// Parallel/accelerator implementation.
    Gpu,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid execution mode: '{0}' (expected 'cpu' or 'gpu')")]
pub struct InvalidExecutionMode(pub String);

impl FromStr for ExecutionMode {
    type Err = InvalidExecutionMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            _ => Err(InvalidExecutionMode(s.to_string())),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Gpu => f.write_str("gpu"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_modes_case_insensitively() {
        assert_eq!("cpu".parse::<ExecutionMode>(), Ok(ExecutionMode::Cpu));
        assert_eq!(" GPU ".parse::<ExecutionMode>(), Ok(ExecutionMode::Gpu));
    }

    #[test]
    fn rejects_unknown_modes() {
        let err = "opencl".parse::<ExecutionMode>().unwrap_err();
        assert_eq!(err, InvalidExecutionMode("opencl".to_string()));
        assert!(err.to_string().contains("Invalid execution mode"));
    }
}
