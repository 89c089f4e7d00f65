use super::config::ConfigError;
use super::ids::{ForceId, IntegratorId, MethodId};
use crate::core::exec::InvalidExecutionMode;
use crate::core::stepper::StepperError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrateError {
    #[error("Cannot create {what} before the simulation context is initialized")]
    UninitializedContext { what: &'static str },

    #[error("Internal consistency error (please report): {0}")]
    InternalConsistency(String),

    #[error(
        "Integrator '{integrator}' does not support integration methods, but {active} are enabled; remove them or use a different integrator"
    )]
    MethodNotSupported { integrator: String, active: usize },

    #[error("Integrator '{integrator}' requires one or more integration methods to be enabled")]
    NoMethodsConfigured { integrator: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown integration method: {0:?}")]
    UnknownMethod(MethodId),

    #[error("Unknown force: {0:?}")]
    UnknownForce(ForceId),

    #[error("Unknown integrator: {0:?}")]
    UnknownIntegrator(IntegratorId),

    #[error("Failed to update coefficients of force '{name}': {source}")]
    Force {
        name: String,
        #[source]
        source: StepperError,
    },

    #[error("Stepper failure: {source}")]
    Stepper {
        #[from]
        source: StepperError,
    },
}

impl From<ConfigError> for IntegrateError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<InvalidExecutionMode> for IntegrateError {
    fn from(err: InvalidExecutionMode) -> Self {
        Self::Configuration(err.to_string())
    }
}
