use super::config::{
    BdNvtConfig, BdNvtParams, Limit, MethodParams, NptConfig, NptParams, NveConfig, NveParams,
    NvtConfig, NvtParams,
};
use super::error::IntegrateError;
use super::ids::MethodId;
use crate::core::group::Group;
use crate::core::stepper::{MethodHandle, MethodStepper, StepperError, StepperFactory};
use crate::core::system::{ParticleTypes, SystemDefinition};
use slotmap::SlotMap;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// Constant-temperature (Nosé-Hoover) stepping.
    Nvt,
    /// Constant-temperature-and-pressure stepping.
    Npt,
    /// Energy-conserving stepping.
    Nve,
    /// Brownian (stochastic, damped) stepping.
    BdNvt,
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nvt => "nvt",
            Self::Npt => "npt",
            Self::Nve => "nve",
            Self::BdNvt => "bdnvt",
        };
        f.write_str(name)
    }
}

/// Construction record for any member of the method family.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodConfig {
    Nvt(NvtConfig),
    Npt(NptConfig),
    Nve(NveConfig),
    BdNvt(BdNvtConfig),
}

impl MethodConfig {
    pub fn kind(&self) -> MethodKind {
        match self {
            Self::Nvt(_) => MethodKind::Nvt,
            Self::Npt(_) => MethodKind::Npt,
            Self::Nve(_) => MethodKind::Nve,
            Self::BdNvt(_) => MethodKind::BdNvt,
        }
    }

    pub fn group(&self) -> &Group {
        match self {
            Self::Nvt(c) => &c.group,
            Self::Npt(c) => &c.group,
            Self::Nve(c) => &c.group,
            Self::BdNvt(c) => &c.group,
        }
    }

    /// Asks `factory` for the stepper and applies the construction-time settings the factory
    /// call does not take.
    pub(crate) fn create_stepper(
        &self,
        factory: &dyn StepperFactory,
        system: &SystemDefinition,
    ) -> Result<MethodHandle, StepperError> {
        match self {
            Self::Nvt(c) => factory.nvt(system, &c.group, c.tau, c.temperature.clone()),
            Self::Npt(c) => {
                let handle = factory.npt(
                    system,
                    &c.group,
                    c.tau,
                    c.tau_p,
                    c.temperature.clone(),
                    c.pressure.clone(),
                )?;
                handle.borrow_mut().set_partial_scale(c.partial_scale);
                Ok(handle)
            }
            Self::Nve(c) => {
                let handle = factory.nve(system, &c.group)?;
                {
                    let mut stepper = handle.borrow_mut();
                    if let Some(limit) = c.limit {
                        stepper.set_limit(limit);
                    }
                    stepper.set_zero_force(c.zero_force);
                }
                Ok(handle)
            }
            Self::BdNvt(c) => {
                let handle = factory.bdnvt(
                    system,
                    &c.group,
                    c.temperature.clone(),
                    c.seed,
                    c.gamma_diam,
                )?;
                if let Some(limit) = c.limit {
                    handle.borrow_mut().set_limit(limit);
                }
                Ok(handle)
            }
        }
    }
}

/// A toggleable, group-scoped integration method.
#[derive(Debug)]
pub struct IntegrationMethod {
    kind: MethodKind,
    group: Group,
    enabled: bool,
    handle: Option<MethodHandle>,
}

impl IntegrationMethod {
    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn handle(&self) -> Option<&MethodHandle> {
        self.handle.as_ref()
    }

    pub(crate) fn stepper(&self) -> Result<&MethodHandle, IntegrateError> {
        self.handle.as_ref().ok_or_else(|| {
            IntegrateError::InternalConsistency(format!(
                "{} method on group '{}' has no backing stepper",
                self.kind, self.group
            ))
        })
    }

    /// Forwards every set field of `params` to the stepper; unset fields are left alone.
    pub(crate) fn apply_params(&self, params: &MethodParams) -> Result<(), IntegrateError> {
        let expected = match params {
            MethodParams::Nvt(_) => MethodKind::Nvt,
            MethodParams::Npt(_) => MethodKind::Npt,
            MethodParams::Nve(_) => MethodKind::Nve,
            MethodParams::BdNvt(_) => MethodKind::BdNvt,
        };
        let handle = self.stepper()?;
        if expected != self.kind {
            return Err(IntegrateError::Configuration(format!(
                "{expected} parameters cannot be applied to the {} method on group '{}'",
                self.kind, self.group
            )));
        }

        let mut stepper = handle.borrow_mut();
        match params {
            MethodParams::Nvt(p) => apply_nvt(&mut *stepper, p),
            MethodParams::Npt(p) => apply_npt(&mut *stepper, p),
            MethodParams::Nve(p) => apply_nve(&mut *stepper, p),
            MethodParams::BdNvt(p) => apply_bdnvt(&mut *stepper, p),
        }
        Ok(())
    }

    /// Sets the drag coefficient of every declared type named `type_name`.
    ///
    /// Naming a type the system does not declare is not an error, so a single script can be
    /// shared between systems with different type sets. Returns whether any type matched.
    pub(crate) fn set_gamma(
        &self,
        types: &ParticleTypes,
        type_name: &str,
        gamma: f64,
    ) -> Result<bool, IntegrateError> {
        let handle = self.stepper()?;
        if self.kind != MethodKind::BdNvt {
            return Err(IntegrateError::Configuration(format!(
                "gamma can only be set on a bdnvt method, not on the {} method on group '{}'",
                self.kind, self.group
            )));
        }

        let mut matched = false;
        for (type_id, name) in types.iter() {
            if name == type_name {
                handle.borrow_mut().set_gamma(type_id, gamma);
                matched = true;
            }
        }
        if !matched {
            debug!("No particle type named '{type_name}'; gamma left unchanged");
        }
        Ok(matched)
    }

    #[cfg(test)]
    pub(crate) fn detach(&mut self) {
        self.handle = None;
    }
}

fn apply_limit(stepper: &mut dyn MethodStepper, limit: Limit) {
    match limit {
        Limit::Distance(distance) => stepper.set_limit(distance),
        Limit::Unlimited => stepper.remove_limit(),
    }
}

fn apply_nvt(stepper: &mut dyn MethodStepper, params: &NvtParams) {
    if let Some(t) = &params.temperature {
        stepper.set_t(t.clone());
    }
    if let Some(tau) = params.tau {
        stepper.set_tau(tau);
    }
}

fn apply_npt(stepper: &mut dyn MethodStepper, params: &NptParams) {
    if let Some(t) = &params.temperature {
        stepper.set_t(t.clone());
    }
    if let Some(tau) = params.tau {
        stepper.set_tau(tau);
    }
    if let Some(p) = &params.pressure {
        stepper.set_p(p.clone());
    }
    if let Some(tau_p) = params.tau_p {
        stepper.set_tau_p(tau_p);
    }
    if let Some(partial_scale) = params.partial_scale {
        stepper.set_partial_scale(partial_scale);
    }
}

fn apply_nve(stepper: &mut dyn MethodStepper, params: &NveParams) {
    if let Some(limit) = params.limit {
        apply_limit(stepper, limit);
    }
    if let Some(zero_force) = params.zero_force {
        stepper.set_zero_force(zero_force);
    }
}

fn apply_bdnvt(stepper: &mut dyn MethodStepper, params: &BdNvtParams) {
    if let Some(t) = &params.temperature {
        stepper.set_t(t.clone());
    }
    if let Some(limit) = params.limit {
        apply_limit(stepper, limit);
    }
}

/// All created methods plus the ordered sequence of the enabled ones.
///
/// A method is in `active` exactly when it is enabled. Enabling appends to the end of the
/// sequence, so order reflects toggle time rather than creation time.
#[derive(Debug, Default)]
pub struct MethodRegistry {
    methods: SlotMap<MethodId, IntegrationMethod>,
    active: Vec<MethodId>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks a freshly created method as enabled, at the end of the active sequence.
    pub(crate) fn insert(&mut self, config: &MethodConfig, handle: MethodHandle) -> MethodId {
        let id = self.methods.insert(IntegrationMethod {
            kind: config.kind(),
            group: config.group().clone(),
            enabled: true,
            handle: Some(handle),
        });
        self.active.push(id);
        id
    }

    pub fn get(&self, id: MethodId) -> Result<&IntegrationMethod, IntegrateError> {
        self.methods.get(id).ok_or(IntegrateError::UnknownMethod(id))
    }

    pub(crate) fn get_mut(&mut self, id: MethodId) -> Result<&mut IntegrationMethod, IntegrateError> {
        self.methods
            .get_mut(id)
            .ok_or(IntegrateError::UnknownMethod(id))
    }

    /// Returns `false` (after a warning) if the method was already enabled.
    pub fn enable(&mut self, id: MethodId) -> Result<bool, IntegrateError> {
        let method = self.get_mut(id)?;
        method.stepper()?;
        if method.enabled {
            warn!(
                "Ignoring command to enable the {} method on group '{}' that is already enabled",
                method.kind, method.group
            );
            return Ok(false);
        }
        method.enabled = true;
        self.active.push(id);
        Ok(true)
    }

    /// Returns `false` (after a warning) if the method was already disabled.
    pub fn disable(&mut self, id: MethodId) -> Result<bool, IntegrateError> {
        let method = self.get_mut(id)?;
        method.stepper()?;
        if !method.enabled {
            warn!(
                "Ignoring command to disable the {} method on group '{}' that is already disabled",
                method.kind, method.group
            );
            return Ok(false);
        }
        method.enabled = false;
        self.active.retain(|&active| active != id);
        Ok(true)
    }

    /// The enabled methods, in activation order.
    pub fn active(&self) -> &[MethodId] {
        &self.active
    }

    pub fn iter(&self) -> impl Iterator<Item = (MethodId, &IntegrationMethod)> {
        self.methods.iter()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::exec::ExecutionMode;
    use crate::core::recording::{Journal, RecordingFactory};
    use crate::engine::config::NvtConfig;

    fn system() -> SystemDefinition {
        SystemDefinition::new(ParticleTypes::new(["A", "B"]), ExecutionMode::Cpu)
    }

    fn registry_with(n: usize) -> (MethodRegistry, Vec<MethodId>) {
        let factory = RecordingFactory::new(ExecutionMode::Cpu, Journal::new());
        let mut registry = MethodRegistry::new();
        let ids = (0..n)
            .map(|_| {
                let config = MethodConfig::Nve(NveConfig::new(Group::all()));
                let handle = config.create_stepper(&factory, &system()).unwrap();
                registry.insert(&config, handle)
            })
            .collect();
        (registry, ids)
    }

    fn assert_active_matches_enabled(registry: &MethodRegistry) {
        for (id, method) in registry.iter() {
            assert_eq!(registry.active().contains(&id), method.is_enabled());
        }
        let mut deduped = registry.active().to_vec();
        deduped.dedup();
        assert_eq!(deduped.len(), registry.active().len());
    }

    #[test]
    fn created_methods_are_enabled_and_appended() {
        let (registry, ids) = registry_with(3);
        assert_eq!(registry.active(), ids.as_slice());
        assert_active_matches_enabled(&registry);
    }

    #[test]
    fn disable_removes_by_identity_and_enable_appends_at_the_end() {
        let (mut registry, ids) = registry_with(3);

        assert!(registry.disable(ids[0]).unwrap());
        assert_eq!(registry.active(), &[ids[1], ids[2]]);

        assert!(registry.enable(ids[0]).unwrap());
        assert_eq!(registry.active(), &[ids[1], ids[2], ids[0]]);
        assert_active_matches_enabled(&registry);
    }

    #[test]
    fn redundant_toggles_leave_state_unchanged() {
        let (mut registry, ids) = registry_with(2);

        assert!(!registry.enable(ids[1]).unwrap());
        assert_eq!(registry.active(), ids.as_slice());

        registry.disable(ids[1]).unwrap();
        assert!(!registry.disable(ids[1]).unwrap());
        assert_eq!(registry.active(), &[ids[0]]);
        assert!(!registry.get(ids[1]).unwrap().is_enabled());
    }

    #[test]
    fn arbitrary_toggle_sequences_keep_membership_in_sync() {
        let (mut registry, ids) = registry_with(4);
        let toggles = [
            (0, false),
            (2, false),
            (0, true),
            (0, true),
            (3, false),
            (2, true),
            (2, false),
            (1, false),
            (1, false),
            (3, true),
        ];
        for (index, enable) in toggles {
            if enable {
                registry.enable(ids[index]).unwrap();
            } else {
                registry.disable(ids[index]).unwrap();
            }
            assert_active_matches_enabled(&registry);
        }
        assert_eq!(registry.active(), &[ids[0], ids[3]]);
    }

    #[test]
    fn toggling_without_a_stepper_is_an_internal_error() {
        let (mut registry, ids) = registry_with(1);
        registry.get_mut(ids[0]).unwrap().detach();

        assert!(matches!(
            registry.disable(ids[0]),
            Err(IntegrateError::InternalConsistency(_))
        ));
        assert!(matches!(
            registry.enable(ids[0]),
            Err(IntegrateError::InternalConsistency(_))
        ));
        assert_eq!(registry.active(), ids.as_slice());
    }

    #[test]
    fn mismatched_params_are_rejected() {
        let (registry, ids) = registry_with(1);
        let method = registry.get(ids[0]).unwrap();
        let result = method.apply_params(&NvtParams::default().tau(1.0).into());
        assert!(matches!(result, Err(IntegrateError::Configuration(_))));
    }

    #[test]
    fn gamma_requires_a_brownian_method() {
        let factory = RecordingFactory::new(ExecutionMode::Cpu, Journal::new());
        let mut registry = MethodRegistry::new();
        let config = MethodConfig::Nvt(NvtConfig::new(Group::all(), 1.0, 0.5));
        let handle = config.create_stepper(&factory, &system()).unwrap();
        let id = registry.insert(&config, handle);

        let result = registry
            .get(id)
            .unwrap()
            .set_gamma(&system().particle_types, "A", 2.0);
        assert!(matches!(result, Err(IntegrateError::Configuration(_))));
    }
}
