//! A reference engine that records what it is told instead of integrating.
//!
//! Every stepper the [`RecordingFactory`] creates is also kept in a shared [`Journal`], so a
//! dry run (or a test) can inspect afterwards exactly which forces and methods each integrator
//! had registered when it ran, and which parameters each method received.

use super::exec::ExecutionMode;
use super::group::Group;
use super::stepper::{
    ForceCompute, ForceHandle, IntegratorHandle, IntegratorStepper, MethodHandle, MethodStepper,
    StepperError, StepperFactory,
};
use super::system::SystemDefinition;
use super::variant::Variant;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Steps a recorded FIRE minimizer needs before it reports convergence when `nmin` is unset.
const DEFAULT_NMIN: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedIntegratorKind {
    TwoStep,
    FireMinimizer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedMethodKind {
    Nvt,
    Npt,
    Nve,
    BdNvt,
}

impl RecordedMethodKind {
    fn stepper_name(self) -> &'static str {
        match self {
            Self::Nvt => "TwoStepNVT",
            Self::Npt => "TwoStepNPT",
            Self::Nve => "TwoStepNVE",
            Self::BdNvt => "TwoStepBDNVT",
        }
    }
}

/// Parameters a recorded method has received so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodState {
    pub group: String,
    pub t: Option<Variant>,
    pub tau: Option<f64>,
    pub p: Option<Variant>,
    pub tau_p: Option<f64>,
    pub partial_scale: bool,
    pub limit: Option<f64>,
    pub zero_force: bool,
    pub seed: Option<u32>,
    pub gamma_diam: bool,
    pub gamma: BTreeMap<usize, f64>,
}

#[derive(Debug)]
pub struct RecordedMethod {
    name: String,
    kind: RecordedMethodKind,
    state: MethodState,
}

impl RecordedMethod {
    pub fn kind(&self) -> RecordedMethodKind {
        self.kind
    }

    pub fn state(&self) -> &MethodState {
        &self.state
    }
}

impl MethodStepper for RecordedMethod {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_t(&mut self, t: Variant) {
        self.state.t = Some(t);
    }

    fn set_tau(&mut self, tau: f64) {
        self.state.tau = Some(tau);
    }

    fn set_p(&mut self, p: Variant) {
        self.state.p = Some(p);
    }

    fn set_tau_p(&mut self, tau_p: f64) {
        self.state.tau_p = Some(tau_p);
    }

    fn set_partial_scale(&mut self, partial_scale: bool) {
        self.state.partial_scale = partial_scale;
    }

    fn set_limit(&mut self, limit: f64) {
        self.state.limit = Some(limit);
    }

    fn remove_limit(&mut self) {
        self.state.limit = None;
    }

    fn set_zero_force(&mut self, zero_force: bool) {
        self.state.zero_force = zero_force;
    }

    fn set_gamma(&mut self, type_id: usize, gamma: f64) {
        self.state.gamma.insert(type_id, gamma);
    }

    fn t(&self) -> Option<&Variant> {
        self.state.t.as_ref()
    }

    fn p(&self) -> Option<&Variant> {
        self.state.p.as_ref()
    }
}

/// A force compute that only counts coefficient refreshes.
#[derive(Debug)]
pub struct RecordedForce {
    name: String,
    coeffs_set: bool,
    refreshes: usize,
}

impl RecordedForce {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            coeffs_set: true,
            refreshes: 0,
        }
    }

    /// A force whose coefficient refresh fails, as a pair force with unset coefficients would.
    pub fn without_coeffs(name: impl Into<String>) -> Self {
        Self {
            coeffs_set: false,
            ..Self::new(name)
        }
    }

    /// Wraps the force into a shareable handle, returning the concrete handle as well so the
    /// caller can keep inspecting it.
    pub fn into_handles(self) -> (Rc<RefCell<RecordedForce>>, ForceHandle) {
        let concrete = Rc::new(RefCell::new(self));
        let handle: ForceHandle = concrete.clone();
        (concrete, handle)
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes
    }
}

impl ForceCompute for RecordedForce {
    fn name(&self) -> &str {
        &self.name
    }

    fn update_coeffs(&mut self) -> Result<(), StepperError> {
        if !self.coeffs_set {
            return Err(StepperError::MissingCoefficients {
                force: self.name.clone(),
                detail: "no coefficients were specified".to_string(),
            });
        }
        self.refreshes += 1;
        Ok(())
    }
}

/// What an integrator had registered when it executed one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub first_step: u64,
    pub steps: u64,
    pub methods: Vec<String>,
    pub forces: Vec<String>,
    /// Setpoints of each registered method, evaluated at `first_step`.
    pub samples: Vec<MethodSample>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSample {
    pub method: String,
    pub t: Option<f64>,
    pub p: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FireState {
    pub nmin: Option<u32>,
    pub finc: Option<f64>,
    pub fdec: Option<f64>,
    pub alpha_start: Option<f64>,
    pub falpha: Option<f64>,
    pub ftol: Option<f64>,
    pub etol: Option<f64>,
}

#[derive(Debug)]
pub struct RecordedIntegrator {
    name: String,
    kind: RecordedIntegratorKind,
    dt: f64,
    group: Option<String>,
    forces: Vec<ForceHandle>,
    methods: Vec<MethodHandle>,
    fire: FireState,
    runs: Vec<RunRecord>,
    steps_run: u64,
}

impl RecordedIntegrator {
    pub fn kind(&self) -> RecordedIntegratorKind {
        self.kind
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn fire(&self) -> &FireState {
        &self.fire
    }

    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    /// Names of the methods currently registered, in registration order.
    pub fn method_names(&self) -> Vec<String> {
        self.methods
            .iter()
            .map(|m| m.borrow().name().to_string())
            .collect()
    }

    fn sample_methods(&self, timestep: u64) -> Vec<MethodSample> {
        self.methods
            .iter()
            .map(|m| {
                let m = m.borrow();
                MethodSample {
                    method: m.name().to_string(),
                    t: m.t().map(|t| t.value_at(timestep)),
                    p: m.p().map(|p| p.value_at(timestep)),
                }
            })
            .collect()
    }

    /// Names of the forces currently registered, in registration order.
    pub fn force_names(&self) -> Vec<String> {
        self.forces
            .iter()
            .map(|f| f.borrow().name().to_string())
            .collect()
    }
}

impl IntegratorStepper for RecordedIntegrator {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_force_compute(&mut self, force: ForceHandle) {
        self.forces.push(force);
    }

    fn remove_force_computes(&mut self) {
        self.forces.clear();
    }

    fn add_integration_method(&mut self, method: MethodHandle) {
        self.methods.push(method);
    }

    fn remove_all_integration_methods(&mut self) {
        self.methods.clear();
    }

    fn set_delta_t(&mut self, dt: f64) {
        self.dt = dt;
    }

    fn run(&mut self, first_step: u64, steps: u64) -> Result<(), StepperError> {
        if self.kind == RecordedIntegratorKind::TwoStep && self.methods.is_empty() && steps > 0 {
            return Err(StepperError::Run(format!(
                "{} has no integration methods to advance",
                self.name
            )));
        }
        self.runs.push(RunRecord {
            first_step,
            steps,
            methods: self.method_names(),
            forces: self.force_names(),
            samples: self.sample_methods(first_step),
        });
        self.steps_run = self.steps_run.saturating_add(steps);
        Ok(())
    }

    fn set_nmin(&mut self, nmin: u32) {
        self.fire.nmin = Some(nmin);
    }

    fn set_finc(&mut self, finc: f64) {
        self.fire.finc = Some(finc);
    }

    fn set_fdec(&mut self, fdec: f64) {
        self.fire.fdec = Some(fdec);
    }

    fn set_alpha_start(&mut self, alpha_start: f64) {
        self.fire.alpha_start = Some(alpha_start);
    }

    fn set_falpha(&mut self, falpha: f64) {
        self.fire.falpha = Some(falpha);
    }

    fn set_ftol(&mut self, ftol: f64) {
        self.fire.ftol = Some(ftol);
    }

    fn set_etol(&mut self, etol: f64) {
        self.fire.etol = Some(etol);
    }

    /// A recorded minimizer "converges" once it has run at least `nmin` steps.
    fn has_converged(&self) -> bool {
        self.kind == RecordedIntegratorKind::FireMinimizer
            && self.steps_run >= u64::from(self.fire.nmin.unwrap_or(DEFAULT_NMIN))
    }
}

/// Every stepper created through the recording factories that share it, in creation order.
#[derive(Debug, Default)]
pub struct Journal {
    integrators: RefCell<Vec<Rc<RefCell<RecordedIntegrator>>>>,
    methods: RefCell<Vec<Rc<RefCell<RecordedMethod>>>>,
    serial: Cell<usize>,
}

impl Journal {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn integrators(&self) -> Vec<Rc<RefCell<RecordedIntegrator>>> {
        self.integrators.borrow().clone()
    }

    pub fn methods(&self) -> Vec<Rc<RefCell<RecordedMethod>>> {
        self.methods.borrow().clone()
    }

    pub fn integrator_named(&self, name: &str) -> Option<Rc<RefCell<RecordedIntegrator>>> {
        self.integrators
            .borrow()
            .iter()
            .find(|i| i.borrow().name == name)
            .cloned()
    }

    pub fn method_named(&self, name: &str) -> Option<Rc<RefCell<RecordedMethod>>> {
        self.methods
            .borrow()
            .iter()
            .find(|m| m.borrow().name == name)
            .cloned()
    }

    fn next_name(&self, base: &str, backend: ExecutionMode) -> String {
        let serial = self.serial.get();
        self.serial.set(serial + 1);
        let suffix = match backend {
            ExecutionMode::Cpu => "",
            ExecutionMode::Gpu => "GPU",
        };
        format!("{base}{suffix}#{serial}")
    }
}

/// A [`StepperFactory`] for one backend that records into a shared [`Journal`].
#[derive(Debug, Clone)]
pub struct RecordingFactory {
    backend: ExecutionMode,
    journal: Rc<Journal>,
}

impl RecordingFactory {
    pub fn new(backend: ExecutionMode, journal: Rc<Journal>) -> Self {
        Self { backend, journal }
    }

    fn integrator(
        &self,
        kind: RecordedIntegratorKind,
        dt: f64,
        group: Option<&Group>,
    ) -> IntegratorHandle {
        let base = match kind {
            RecordedIntegratorKind::TwoStep => "IntegratorTwoStep",
            RecordedIntegratorKind::FireMinimizer => "FIREEnergyMinimizer",
        };
        let recorded = Rc::new(RefCell::new(RecordedIntegrator {
            name: self.journal.next_name(base, self.backend),
            kind,
            dt,
            group: group.map(|g| g.name().to_string()),
            forces: Vec::new(),
            methods: Vec::new(),
            fire: FireState::default(),
            runs: Vec::new(),
            steps_run: 0,
        }));
        self.journal.integrators.borrow_mut().push(recorded.clone());
        recorded
    }

    fn method(&self, kind: RecordedMethodKind, state: MethodState) -> MethodHandle {
        let recorded = Rc::new(RefCell::new(RecordedMethod {
            name: self.journal.next_name(kind.stepper_name(), self.backend),
            kind,
            state,
        }));
        self.journal.methods.borrow_mut().push(recorded.clone());
        recorded
    }
}

impl StepperFactory for RecordingFactory {
    fn backend(&self) -> ExecutionMode {
        self.backend
    }

    fn two_step(
        &self,
        _system: &SystemDefinition,
        dt: f64,
    ) -> Result<IntegratorHandle, StepperError> {
        Ok(self.integrator(RecordedIntegratorKind::TwoStep, dt, None))
    }

    fn fire_minimizer(
        &self,
        _system: &SystemDefinition,
        group: &Group,
        dt: f64,
    ) -> Result<IntegratorHandle, StepperError> {
        Ok(self.integrator(RecordedIntegratorKind::FireMinimizer, dt, Some(group)))
    }

    fn nvt(
        &self,
        _system: &SystemDefinition,
        group: &Group,
        tau: f64,
        t: Variant,
    ) -> Result<MethodHandle, StepperError> {
        let state = MethodState {
            group: group.name().to_string(),
            t: Some(t),
            tau: Some(tau),
            ..MethodState::default()
        };
        Ok(self.method(RecordedMethodKind::Nvt, state))
    }

    fn npt(
        &self,
        _system: &SystemDefinition,
        group: &Group,
        tau: f64,
        tau_p: f64,
        t: Variant,
        p: Variant,
    ) -> Result<MethodHandle, StepperError> {
        let state = MethodState {
            group: group.name().to_string(),
            t: Some(t),
            tau: Some(tau),
            p: Some(p),
            tau_p: Some(tau_p),
            ..MethodState::default()
        };
        Ok(self.method(RecordedMethodKind::Npt, state))
    }

    fn nve(
        &self,
        _system: &SystemDefinition,
        group: &Group,
    ) -> Result<MethodHandle, StepperError> {
        let state = MethodState {
            group: group.name().to_string(),
            ..MethodState::default()
        };
        Ok(self.method(RecordedMethodKind::Nve, state))
    }

    fn bdnvt(
        &self,
        _system: &SystemDefinition,
        group: &Group,
        t: Variant,
        seed: u32,
        gamma_diam: bool,
    ) -> Result<MethodHandle, StepperError> {
        let state = MethodState {
            group: group.name().to_string(),
            t: Some(t),
            seed: Some(seed),
            gamma_diam,
            ..MethodState::default()
        };
        Ok(self.method(RecordedMethodKind::BdNvt, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::system::ParticleTypes;

    fn system() -> SystemDefinition {
        SystemDefinition::new(ParticleTypes::new(["A"]), ExecutionMode::Cpu)
    }

    #[test]
    fn names_carry_backend_suffix_and_creation_serial() {
        let journal = Journal::new();
        let cpu = RecordingFactory::new(ExecutionMode::Cpu, journal.clone());
        let gpu = RecordingFactory::new(ExecutionMode::Gpu, journal.clone());

        let a = cpu.nve(&system(), &Group::all()).unwrap();
        let b = gpu.nve(&system(), &Group::all()).unwrap();

        assert_eq!(a.borrow().name(), "TwoStepNVE#0");
        assert_eq!(b.borrow().name(), "TwoStepNVEGPU#1");
        assert_eq!(journal.methods().len(), 2);
    }

    #[test]
    fn run_snapshots_registered_methods_and_forces() {
        let journal = Journal::new();
        let factory = RecordingFactory::new(ExecutionMode::Cpu, journal.clone());
        let integrator = factory.two_step(&system(), 0.005).unwrap();
        let method = factory.nve(&system(), &Group::all()).unwrap();
        let (_, force) = RecordedForce::new("pair.lj").into_handles();

        {
            let mut stepper = integrator.borrow_mut();
            stepper.add_integration_method(method);
            stepper.add_force_compute(force);
            stepper.run(0, 100).unwrap();
        }

        let recorded = journal.integrator_named("IntegratorTwoStep#0").unwrap();
        let recorded = recorded.borrow();
        assert_eq!(
            recorded.runs(),
            &[RunRecord {
                first_step: 0,
                steps: 100,
                methods: vec!["TwoStepNVE#1".to_string()],
                forces: vec!["pair.lj".to_string()],
                samples: vec![MethodSample {
                    method: "TwoStepNVE#1".to_string(),
                    t: None,
                    p: None,
                }],
            }]
        );
    }

    #[test]
    fn minimizer_step_total_saturates() {
        let factory = RecordingFactory::new(ExecutionMode::Cpu, Journal::new());
        let minimizer = factory
            .fire_minimizer(&system(), &Group::all(), 0.01)
            .unwrap();
        let mut stepper = minimizer.borrow_mut();
        stepper.run(0, u64::MAX).unwrap();
        stepper.run(0, u64::MAX).unwrap();
        assert!(stepper.has_converged());
    }

    #[test]
    fn two_step_refuses_to_run_without_methods() {
        let factory = RecordingFactory::new(ExecutionMode::Cpu, Journal::new());
        let integrator = factory.two_step(&system(), 0.005).unwrap();
        let result = integrator.borrow_mut().run(0, 10);
        assert!(matches!(result, Err(StepperError::Run(_))));
    }

    #[test]
    fn force_without_coeffs_fails_to_refresh() {
        let (concrete, handle) = RecordedForce::without_coeffs("pair.lj").into_handles();
        let result = handle.borrow_mut().update_coeffs();
        assert!(matches!(
            result,
            Err(StepperError::MissingCoefficients { .. })
        ));
        assert_eq!(concrete.borrow().refreshes(), 0);
    }

    #[test]
    fn minimizer_converges_after_nmin_steps() {
        let factory = RecordingFactory::new(ExecutionMode::Cpu, Journal::new());
        let minimizer = factory
            .fire_minimizer(&system(), &Group::all(), 0.01)
            .unwrap();
        minimizer.borrow_mut().set_nmin(10);

        minimizer.borrow_mut().run(0, 5).unwrap();
        assert!(!minimizer.borrow().has_converged());
        minimizer.borrow_mut().run(5, 5).unwrap();
        assert!(minimizer.borrow().has_converged());
    }
}
