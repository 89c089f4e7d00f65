use super::config::{FireParams, StandardParams};
use super::error::IntegrateError;
use super::force::ForceRegistry;
use super::method::MethodRegistry;
use crate::core::group::Group;
use crate::core::stepper::{IntegratorHandle, IntegratorStepper};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegratorKind {
    /// Standard time stepping; real motion is delegated to attached integration methods.
    Standard,
    /// FIRE energy minimization; self-contained and rejects integration methods.
    FireMinimizer,
}

impl IntegratorKind {
    pub fn supports_methods(self) -> bool {
        matches!(self, Self::Standard)
    }
}

impl fmt::Display for IntegratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => f.write_str("mode_standard"),
            Self::FireMinimizer => f.write_str("mode_minimize_fire"),
        }
    }
}

/// A top-level stepper configuration.
#[derive(Debug)]
pub struct Integrator {
    kind: IntegratorKind,
    group: Option<Group>,
    handle: Option<IntegratorHandle>,
}

impl Integrator {
    pub(crate) fn new(kind: IntegratorKind, group: Option<Group>, handle: IntegratorHandle) -> Self {
        Self {
            kind,
            group,
            handle: Some(handle),
        }
    }

    pub fn kind(&self) -> IntegratorKind {
        self.kind
    }

    pub fn supports_methods(&self) -> bool {
        self.kind.supports_methods()
    }

    /// The group a minimizer acts on; standard mode has none of its own.
    pub fn group(&self) -> Option<&Group> {
        self.group.as_ref()
    }

    pub fn handle(&self) -> Option<&IntegratorHandle> {
        self.handle.as_ref()
    }

    pub(crate) fn stepper(&self) -> Result<&IntegratorHandle, IntegrateError> {
        self.handle.as_ref().ok_or_else(|| {
            IntegrateError::InternalConsistency(format!("{} has no backing stepper", self.kind))
        })
    }

    fn stepper_name(&self) -> String {
        self.handle
            .as_ref()
            .map(|h| h.borrow().name().to_string())
            .unwrap_or_else(|| self.kind.to_string())
    }

    /// Rebuilds the stepper's force list from the enabled forces, refreshing each one's
    /// coefficients as it is registered. Returns the number of forces registered.
    pub fn update_forces(&self, forces: &ForceRegistry) -> Result<usize, IntegrateError> {
        let handle = self.stepper()?;
        let mut stepper = handle.borrow_mut();
        stepper.remove_force_computes();

        let mut registered = 0;
        for (_, force) in forces.enabled() {
            let compute = force.compute()?;
            debug!("Registering force '{}' with {}", force.name(), stepper.name());
            stepper.add_force_compute(compute.clone());
            compute
                .borrow_mut()
                .update_coeffs()
                .map_err(|source| IntegrateError::Force {
                    name: force.name().to_string(),
                    source,
                })?;
            registered += 1;
        }
        Ok(registered)
    }

    /// Rebuilds the stepper's method list from the active sequence, in order. Returns the
    /// number of methods registered.
    pub fn update_methods(&self, methods: &MethodRegistry) -> Result<usize, IntegrateError> {
        let handle = self.stepper()?;
        let active = methods.active();

        if !self.supports_methods() {
            if !active.is_empty() {
                return Err(IntegrateError::MethodNotSupported {
                    integrator: self.stepper_name(),
                    active: active.len(),
                });
            }
            return Ok(0);
        }

        let mut stepper = handle.borrow_mut();
        stepper.remove_all_integration_methods();
        if active.is_empty() {
            return Err(IntegrateError::NoMethodsConfigured {
                integrator: stepper.name().to_string(),
            });
        }

        for &id in active {
            let method = methods.get(id)?;
            let method_stepper = method.stepper()?;
            debug!(
                "Registering {} method on group '{}' with {}",
                method.kind(),
                method.group(),
                stepper.name()
            );
            stepper.add_integration_method(method_stepper.clone());
        }
        Ok(active.len())
    }

    pub(crate) fn apply_standard_params(&self, params: &StandardParams) -> Result<(), IntegrateError> {
        let handle = self.stepper()?;
        if self.kind != IntegratorKind::Standard {
            return Err(IntegrateError::Configuration(format!(
                "time step parameters apply to mode_standard, not to {}",
                self.kind
            )));
        }
        if let Some(dt) = params.dt {
            handle.borrow_mut().set_delta_t(dt);
        }
        Ok(())
    }

    pub(crate) fn apply_fire_params(&self, params: &FireParams) -> Result<(), IntegrateError> {
        let handle = self.stepper()?;
        if self.kind != IntegratorKind::FireMinimizer {
            return Err(IntegrateError::Configuration(format!(
                "FIRE parameters apply to mode_minimize_fire, not to {}",
                self.kind
            )));
        }
        let mut stepper = handle.borrow_mut();
        apply_fire(&mut *stepper, params);
        Ok(())
    }

    pub(crate) fn has_converged(&self) -> Result<bool, IntegrateError> {
        let handle = self.stepper()?;
        if self.kind != IntegratorKind::FireMinimizer {
            return Err(IntegrateError::Configuration(format!(
                "{} is not an energy minimizer and has no convergence state",
                self.kind
            )));
        }
        let converged = handle.borrow().has_converged();
        Ok(converged)
    }

    #[cfg(test)]
    pub(crate) fn detach(&mut self) {
        self.handle = None;
    }
}

fn apply_fire(stepper: &mut dyn IntegratorStepper, params: &FireParams) {
    if let Some(nmin) = params.nmin {
        stepper.set_nmin(nmin);
    }
    if let Some(finc) = params.finc {
        stepper.set_finc(finc);
    }
    if let Some(fdec) = params.fdec {
        stepper.set_fdec(fdec);
    }
    if let Some(alpha_start) = params.alpha_start {
        stepper.set_alpha_start(alpha_start);
    }
    if let Some(falpha) = params.falpha {
        stepper.set_falpha(falpha);
    }
    if let Some(ftol) = params.ftol {
        stepper.set_ftol(ftol);
    }
    if let Some(etol) = params.etol {
        stepper.set_etol(etol);
    }
}
