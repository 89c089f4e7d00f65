//! The interface of the external numerical engine.
//!
//! The coordinator never integrates anything itself. It asks a [`StepperFactory`] for stepper
//! objects, hands them parameters, and before every run wires the enabled forces and methods
//! into the active integrator stepper. Handles are shared: a method stepper is held both by
//! the coordinator and, while registered, by the integrator stepper it feeds.

use super::exec::ExecutionMode;
use super::group::Group;
use super::system::SystemDefinition;
use super::variant::Variant;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

pub type IntegratorHandle = Rc<RefCell<dyn IntegratorStepper>>;
pub type MethodHandle = Rc<RefCell<dyn MethodStepper>>;
pub type ForceHandle = Rc<RefCell<dyn ForceCompute>>;

#[derive(Debug, Error)]
pub enum StepperError {
    #[error("Coefficients not set for {force}: {detail}")]
    MissingCoefficients { force: String, detail: String },

    #[error("Backend '{backend}' could not create {what}: {reason}")]
    Creation {
        backend: ExecutionMode,
        what: &'static str,
        reason: String,
    },

    #[error("Run failed: {0}")]
    Run(String),
}

/// A per-step force contribution.
pub trait ForceCompute: fmt::Debug {
    fn name(&self) -> &str;

    /// Pushes the current user-set coefficients into the compute. Called for every enabled
    /// force right after it is registered with the integrator stepper.
    fn update_coeffs(&mut self) -> Result<(), StepperError>;
}

/// A group-scoped integration method stepper.
///
/// The setters form the union of what the method family needs; a stepper ignores setters for
/// properties it does not have.
pub trait MethodStepper: fmt::Debug {
    fn name(&self) -> &str;

    fn set_t(&mut self, _t: Variant) {}
    fn set_tau(&mut self, _tau: f64) {}
    fn set_p(&mut self, _p: Variant) {}
    fn set_tau_p(&mut self, _tau_p: f64) {}
    fn set_partial_scale(&mut self, _partial_scale: bool) {}
    fn set_limit(&mut self, _limit: f64) {}
    fn remove_limit(&mut self) {}
    fn set_zero_force(&mut self, _zero_force: bool) {}
    fn set_gamma(&mut self, _type_id: usize, _gamma: f64) {}

    /// Temperature setpoint, for methods that thermostat.
    fn t(&self) -> Option<&Variant> {
        None
    }
    fn p(&self) -> Option<&Variant> {
        None
    }
}

/// A top-level integrator stepper.
pub trait IntegratorStepper: fmt::Debug {
    fn name(&self) -> &str;

    fn add_force_compute(&mut self, force: ForceHandle);
    fn remove_force_computes(&mut self);
    fn add_integration_method(&mut self, method: MethodHandle);
    fn remove_all_integration_methods(&mut self);
    fn set_delta_t(&mut self, dt: f64);

    /// Advances the system `steps` timesteps starting at `first_step`.
    fn run(&mut self, first_step: u64, steps: u64) -> Result<(), StepperError>;

    // Energy-minimizer properties; ignored by steppers that do not minimize.
    fn set_nmin(&mut self, _nmin: u32) {}
    fn set_finc(&mut self, _finc: f64) {}
    fn set_fdec(&mut self, _fdec: f64) {}
    fn set_alpha_start(&mut self, _alpha_start: f64) {}
    fn set_falpha(&mut self, _falpha: f64) {}
    fn set_ftol(&mut self, _ftol: f64) {}
    fn set_etol(&mut self, _etol: f64) {}
    fn has_converged(&self) -> bool {
        false
    }
}

/// Creates steppers for one execution backend.
pub trait StepperFactory: fmt::Debug {
    fn backend(&self) -> ExecutionMode;

    fn two_step(&self, system: &SystemDefinition, dt: f64)
    -> Result<IntegratorHandle, StepperError>;

    fn fire_minimizer(
        &self,
        system: &SystemDefinition,
        group: &Group,
        dt: f64,
    ) -> Result<IntegratorHandle, StepperError>;

    fn nvt(
        &self,
        system: &SystemDefinition,
        group: &Group,
        tau: f64,
        t: Variant,
    ) -> Result<MethodHandle, StepperError>;

    fn npt(
        &self,
        system: &SystemDefinition,
        group: &Group,
        tau: f64,
        tau_p: f64,
        t: Variant,
        p: Variant,
    ) -> Result<MethodHandle, StepperError>;

    fn nve(&self, system: &SystemDefinition, group: &Group)
    -> Result<MethodHandle, StepperError>;

    fn bdnvt(
        &self,
        system: &SystemDefinition,
        group: &Group,
        t: Variant,
        seed: u32,
        gamma_diam: bool,
    ) -> Result<MethodHandle, StepperError>;
}
