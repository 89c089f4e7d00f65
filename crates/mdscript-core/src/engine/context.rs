use super::backend::Backends;
use super::config::{
    BdNvtConfig, FireConfig, FireParams, MethodParams, NptConfig, NveConfig, NvtConfig,
    StandardParams,
};
use super::error::IntegrateError;
use super::force::{Force, ForceRegistry};
use super::ids::{ForceId, IntegratorId, MethodId};
use super::integrator::{Integrator, IntegratorKind};
use super::method::{IntegrationMethod, MethodConfig, MethodRegistry};
use crate::core::stepper::{ForceHandle, StepperFactory};
use crate::core::system::SystemDefinition;
use slotmap::SlotMap;
use tracing::info;

/// Owns every integrator, method and force of one simulation, plus the single
/// "current integrator" slot the run loop reconciles against.
#[derive(Debug)]
pub struct SimulationContext {
    backends: Backends,
    system: Option<SystemDefinition>,
    forces: ForceRegistry,
    methods: MethodRegistry,
    integrators: SlotMap<IntegratorId, Integrator>,
    current: Option<IntegratorId>,
    timestep: u64,
}

impl SimulationContext {
    /// Creates an uninitialized context. Nothing that needs a stepper can be created until
    /// [`initialize`](Self::initialize) has been called.
    pub fn new(backends: Backends) -> Self {
        Self {
            backends,
            system: None,
            forces: ForceRegistry::new(),
            methods: MethodRegistry::new(),
            integrators: SlotMap::with_key(),
            current: None,
            timestep: 0,
        }
    }

    pub fn initialize(&mut self, system: SystemDefinition) -> Result<(), IntegrateError> {
        if self.system.is_some() {
            return Err(IntegrateError::Configuration(
                "the simulation context is already initialized".to_string(),
            ));
        }
        info!(
            "Initialized simulation context with {} particle type(s) on the {} backend",
            system.particle_types.len(),
            system.exec_mode
        );
        self.system = Some(system);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.system.is_some()
    }

    pub fn system(&self) -> Option<&SystemDefinition> {
        self.system.as_ref()
    }

    /// The stepper factory for the context's execution mode, and the system it builds for.
    fn factory(
        &self,
        what: &'static str,
    ) -> Result<(&dyn StepperFactory, &SystemDefinition), IntegrateError> {
        let system = self
            .system
            .as_ref()
            .ok_or(IntegrateError::UninitializedContext { what })?;
        let factory = self.backends.select(system.exec_mode)?;
        Ok((factory, system))
    }

    // -----------------------------------------------------------------------
    // Integrators
    // -----------------------------------------------------------------------

    /// Creates a standard time-stepping integrator and makes it current.
    pub fn mode_standard(&mut self, dt: f64) -> Result<IntegratorId, IntegrateError> {
        let handle = {
            let (factory, system) = self.factory("an integrator")?;
            factory.two_step(system, dt)?
        };
        Ok(self.install(Integrator::new(IntegratorKind::Standard, None, handle)))
    }

    /// Creates a FIRE energy minimizer over `config.group` and makes it current.
    pub fn mode_minimize_fire(&mut self, config: FireConfig) -> Result<IntegratorId, IntegrateError> {
        let handle = {
            let (factory, system) = self.factory("an integrator")?;
            factory.fire_minimizer(system, &config.group, config.dt)?
        };
        let integrator = Integrator::new(IntegratorKind::FireMinimizer, Some(config.group), handle);
        integrator.apply_fire_params(&config.params)?;
        Ok(self.install(integrator))
    }

    fn install(&mut self, integrator: Integrator) -> IntegratorId {
        let kind = integrator.kind();
        let id = self.integrators.insert(integrator);
        if let Some(previous) = self.current.replace(id) {
            info!(
                "{kind} supersedes integrator {previous:?}; the previous integrator will no longer be run"
            );
        }
        id
    }

    pub fn set_standard_params(
        &mut self,
        id: IntegratorId,
        params: StandardParams,
    ) -> Result<(), IntegrateError> {
        self.integrator(id)?.apply_standard_params(&params)
    }

    pub fn set_fire_params(
        &mut self,
        id: IntegratorId,
        params: FireParams,
    ) -> Result<(), IntegrateError> {
        self.integrator(id)?.apply_fire_params(&params)
    }

    /// Whether the FIRE minimizer `id` reports convergence.
    pub fn has_converged(&self, id: IntegratorId) -> Result<bool, IntegrateError> {
        self.integrator(id)?.has_converged()
    }

    pub fn current_integrator(&self) -> Option<IntegratorId> {
        self.current
    }

    pub fn integrator(&self, id: IntegratorId) -> Result<&Integrator, IntegrateError> {
        self.integrators
            .get(id)
            .ok_or(IntegrateError::UnknownIntegrator(id))
    }

    #[cfg(test)]
    pub(crate) fn integrator_mut(&mut self, id: IntegratorId) -> Result<&mut Integrator, IntegrateError> {
        self.integrators
            .get_mut(id)
            .ok_or(IntegrateError::UnknownIntegrator(id))
    }

    // -----------------------------------------------------------------------
    // Integration methods
    // -----------------------------------------------------------------------

    /// Creates a method, enabled and appended to the active sequence. Nothing is tracked if
    /// the stepper cannot be created.
    pub fn create_method(&mut self, config: MethodConfig) -> Result<MethodId, IntegrateError> {
        let handle = {
            let (factory, system) = self.factory("an integration method")?;
            config.create_stepper(factory, system)?
        };
        Ok(self.methods.insert(&config, handle))
    }

    pub fn create_nvt(&mut self, config: NvtConfig) -> Result<MethodId, IntegrateError> {
        self.create_method(MethodConfig::Nvt(config))
    }

    pub fn create_npt(&mut self, config: NptConfig) -> Result<MethodId, IntegrateError> {
        self.create_method(MethodConfig::Npt(config))
    }

    pub fn create_nve(&mut self, config: NveConfig) -> Result<MethodId, IntegrateError> {
        self.create_method(MethodConfig::Nve(config))
    }

    pub fn create_bdnvt(&mut self, config: BdNvtConfig) -> Result<MethodId, IntegrateError> {
        self.create_method(MethodConfig::BdNvt(config))
    }

    pub fn enable_method(&mut self, id: MethodId) -> Result<bool, IntegrateError> {
        self.methods.enable(id)
    }

    pub fn disable_method(&mut self, id: MethodId) -> Result<bool, IntegrateError> {
        self.methods.disable(id)
    }

    pub fn set_method_params(
        &mut self,
        id: MethodId,
        params: impl Into<MethodParams>,
    ) -> Result<(), IntegrateError> {
        self.methods.get(id)?.apply_params(&params.into())
    }

    /// Sets the drag coefficient of `type_name` on a Brownian method. Returns `false` if the
    /// system declares no such type.
    pub fn set_gamma(
        &mut self,
        id: MethodId,
        type_name: &str,
        gamma: f64,
    ) -> Result<bool, IntegrateError> {
        let system = self.system.as_ref().ok_or(IntegrateError::UninitializedContext {
            what: "a particle type lookup",
        })?;
        self.methods
            .get(id)?
            .set_gamma(&system.particle_types, type_name, gamma)
    }

    pub fn method(&self, id: MethodId) -> Result<&IntegrationMethod, IntegrateError> {
        self.methods.get(id)
    }

    pub fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    /// The enabled methods, in the order they will be registered on the next run.
    pub fn active_methods(&self) -> &[MethodId] {
        self.methods.active()
    }

    #[cfg(test)]
    pub(crate) fn methods_mut(&mut self) -> &mut MethodRegistry {
        &mut self.methods
    }

    // -----------------------------------------------------------------------
    // Forces
    // -----------------------------------------------------------------------

    /// Starts tracking an external force compute. New forces are enabled.
    pub fn add_force(&mut self, handle: ForceHandle) -> ForceId {
        self.forces.add(handle)
    }

    pub fn enable_force(&mut self, id: ForceId) -> Result<bool, IntegrateError> {
        self.forces.enable(id)
    }

    pub fn disable_force(&mut self, id: ForceId) -> Result<bool, IntegrateError> {
        self.forces.disable(id)
    }

    pub fn force(&self, id: ForceId) -> Result<&Force, IntegrateError> {
        self.forces.get(id)
    }

    pub fn forces(&self) -> &ForceRegistry {
        &self.forces
    }

    #[cfg(test)]
    pub(crate) fn forces_mut(&mut self) -> &mut ForceRegistry {
        &mut self.forces
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Steps completed by every run so far.
    pub fn timestep(&self) -> u64 {
        self.timestep
    }

    pub(crate) fn set_timestep(&mut self, timestep: u64) {
        self.timestep = timestep;
    }
}
