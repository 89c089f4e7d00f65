//! Pre-run reconciliation.
//!
//! Integrators hold no lasting view of forces or methods. Right before every run the current
//! integrator's registrations are rebuilt from the enabled sets tracked by the context, so
//! whatever was toggled between runs takes effect and nothing registered earlier lingers.

use super::context::SimulationContext;
use super::error::IntegrateError;
use super::ids::IntegratorId;
use tracing::{info, instrument, warn};

/// What a call to [`SimulationContext::run`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No integrator was current, so nothing was stepped.
    Skipped,
    Completed {
        integrator: IntegratorId,
        first_step: u64,
        steps: u64,
    },
}

/// Counts of what the current integrator had registered after reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub integrator: IntegratorId,
    pub forces: usize,
    pub methods: usize,
}

impl SimulationContext {
    /// Pushes the enabled forces and, when supported, the active methods into the current
    /// integrator. Superseded integrators are never touched. Returns `None` if no integrator
    /// is current.
    pub fn reconcile(&self) -> Result<Option<Reconciled>, IntegrateError> {
        let Some(id) = self.current_integrator() else {
            return Ok(None);
        };
        let integrator = self.integrator(id)?;
        let forces = integrator.update_forces(self.forces())?;
        let methods = integrator.update_methods(self.methods())?;
        Ok(Some(Reconciled {
            integrator: id,
            forces,
            methods,
        }))
    }

    /// Reconciles the current integrator and advances it by `steps`.
    ///
    /// Any reconciliation failure aborts before the stepper is asked to run.
    #[instrument(skip(self), fields(first_step = self.timestep()))]
    pub fn run(&mut self, steps: u64) -> Result<RunOutcome, IntegrateError> {
        let Some(reconciled) = self.reconcile()? else {
            warn!("No integrator has been created; skipping a run of {steps} step(s)");
            return Ok(RunOutcome::Skipped);
        };

        let first_step = self.timestep();
        let end = first_step.checked_add(steps).ok_or_else(|| {
            IntegrateError::Configuration(format!(
                "a run of {steps} step(s) from timestep {first_step} overflows the timestep counter"
            ))
        })?;
        let integrator = self.integrator(reconciled.integrator)?;
        let handle = integrator.stepper()?;
        info!(
            "Running {} for {steps} step(s) with {} method(s) and {} force(s)",
            integrator.kind(),
            reconciled.methods,
            reconciled.forces
        );
        handle.borrow_mut().run(first_step, steps)?;

        self.set_timestep(end);
        info!("Run finished at timestep {}", self.timestep());
        Ok(RunOutcome::Completed {
            integrator: reconciled.integrator,
            first_step,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::exec::ExecutionMode;
    use crate::core::group::Group;
    use crate::core::recording::{Journal, RecordedForce, RecordedIntegrator, RunRecord};
    use crate::core::system::{ParticleTypes, SystemDefinition};
    use crate::engine::backend::Backends;
    use crate::engine::config::{FireConfigBuilder, Limit, NveConfig, NveParams, NvtConfig};
    use crate::engine::ids::MethodId;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn context() -> (SimulationContext, Rc<Journal>) {
        let journal = Journal::new();
        let mut ctx = SimulationContext::new(Backends::recording(&journal));
        ctx.initialize(SystemDefinition::new(
            ParticleTypes::new(["A", "B"]),
            ExecutionMode::Cpu,
        ))
        .unwrap();
        (ctx, journal)
    }

    fn recorded(ctx: &SimulationContext, journal: &Journal, id: IntegratorId) -> Rc<RefCell<RecordedIntegrator>> {
        let integrator = ctx.integrator(id).unwrap();
        let name = integrator.handle().unwrap().borrow().name().to_string();
        journal.integrator_named(&name).unwrap()
    }

    fn method_name(ctx: &SimulationContext, id: MethodId) -> String {
        let method = ctx.method(id).unwrap();
        let name = method.handle().unwrap().borrow().name().to_string();
        name
    }

    fn last_run(ctx: &SimulationContext, journal: &Journal, id: IntegratorId) -> RunRecord {
        let integrator = recorded(ctx, journal, id);
        let runs = integrator.borrow().runs().to_vec();
        runs.last().cloned().unwrap()
    }

    #[test]
    fn run_without_an_integrator_is_skipped() {
        let (mut ctx, journal) = context();
        assert_eq!(ctx.run(100).unwrap(), RunOutcome::Skipped);
        assert_eq!(ctx.timestep(), 0);
        assert!(journal.integrators().is_empty());
    }

    #[test]
    fn disabled_method_is_replaced_by_a_new_one_between_runs() {
        let (mut ctx, journal) = context();
        let mode = ctx.mode_standard(0.005).unwrap();
        let nvt = ctx
            .create_nvt(NvtConfig::new(Group::all(), 1.2, 0.5))
            .unwrap();

        ctx.run(100).unwrap();
        assert_eq!(last_run(&ctx, &journal, mode).methods, vec![method_name(&ctx, nvt)]);

        ctx.disable_method(nvt).unwrap();
        let nve = ctx.create_nve(NveConfig::new(Group::all())).unwrap();
        let outcome = ctx.run(50).unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Completed {
                integrator: mode,
                first_step: 100,
                steps: 50,
            }
        );
        assert_eq!(last_run(&ctx, &journal, mode).methods, vec![method_name(&ctx, nve)]);
        assert_eq!(ctx.timestep(), 150);
    }

    #[test]
    fn reconciliation_follows_the_active_sequence_order() {
        let (mut ctx, journal) = context();
        let mode = ctx.mode_standard(0.005).unwrap();
        let a = ctx.create_nve(NveConfig::new(Group::of_type("A"))).unwrap();
        let b = ctx.create_nve(NveConfig::new(Group::of_type("B"))).unwrap();
        ctx.disable_method(a).unwrap();
        ctx.enable_method(a).unwrap();
        ctx.enable_method(a).unwrap();

        ctx.run(10).unwrap();
        assert_eq!(
            last_run(&ctx, &journal, mode).methods,
            vec![method_name(&ctx, b), method_name(&ctx, a)]
        );
    }

    #[test]
    fn minimizer_rejects_methods_before_any_step() {
        let (mut ctx, journal) = context();
        let config = FireConfigBuilder::new()
            .group(Group::all())
            .dt(0.01)
            .build()
            .unwrap();
        let fire = ctx.mode_minimize_fire(config).unwrap();
        ctx.create_nve(NveConfig::new(Group::all())).unwrap();

        let result = ctx.run(100);
        assert!(matches!(
            result,
            Err(IntegrateError::MethodNotSupported { active: 1, .. })
        ));
        assert!(recorded(&ctx, &journal, fire).borrow().runs().is_empty());
        assert_eq!(ctx.timestep(), 0);
    }

    #[test]
    fn minimizer_runs_with_forces_only() {
        let (mut ctx, journal) = context();
        let config = FireConfigBuilder::new()
            .group(Group::all())
            .dt(0.01)
            .build()
            .unwrap();
        let fire = ctx.mode_minimize_fire(config).unwrap();
        ctx.add_force(RecordedForce::new("pair.lj").into_handles().1);
        ctx.set_fire_params(fire, crate::engine::config::FireParams::default().nmin(20))
            .unwrap();

        ctx.run(10).unwrap();
        assert!(!ctx.has_converged(fire).unwrap());
        ctx.run(10).unwrap();
        assert!(ctx.has_converged(fire).unwrap());
        assert_eq!(last_run(&ctx, &journal, fire).forces, vec!["pair.lj"]);
    }

    #[test]
    fn standard_mode_without_methods_fails_to_run() {
        let (mut ctx, _) = context();
        ctx.mode_standard(0.005).unwrap();
        let nve = ctx.create_nve(NveConfig::new(Group::all())).unwrap();
        ctx.disable_method(nve).unwrap();

        assert!(matches!(
            ctx.run(10),
            Err(IntegrateError::NoMethodsConfigured { .. })
        ));
    }

    #[test]
    fn registered_forces_are_rebuilt_from_the_enabled_set() {
        let (mut ctx, journal) = context();
        let mode = ctx.mode_standard(0.005).unwrap();
        ctx.create_nve(NveConfig::new(Group::all())).unwrap();
        let (lj, lj_handle) = RecordedForce::new("pair.lj").into_handles();
        let lj_id = ctx.add_force(lj_handle);
        let bond = ctx.add_force(RecordedForce::new("bond.harmonic").into_handles().1);

        ctx.run(10).unwrap();
        assert_eq!(
            last_run(&ctx, &journal, mode).forces,
            vec!["pair.lj", "bond.harmonic"]
        );

        ctx.disable_force(lj_id).unwrap();
        ctx.run(10).unwrap();
        assert_eq!(last_run(&ctx, &journal, mode).forces, vec!["bond.harmonic"]);

        ctx.disable_force(bond).unwrap();
        ctx.enable_force(lj_id).unwrap();
        ctx.run(10).unwrap();
        assert_eq!(last_run(&ctx, &journal, mode).forces, vec!["pair.lj"]);
        assert_eq!(lj.borrow().refreshes(), 2);
    }

    #[test]
    fn force_refresh_failure_aborts_the_run() {
        let (mut ctx, journal) = context();
        let mode = ctx.mode_standard(0.005).unwrap();
        ctx.create_nve(NveConfig::new(Group::all())).unwrap();
        ctx.add_force(RecordedForce::without_coeffs("pair.lj").into_handles().1);

        assert!(matches!(ctx.run(10), Err(IntegrateError::Force { .. })));
        assert!(recorded(&ctx, &journal, mode).borrow().runs().is_empty());
    }

    #[test]
    fn orphaned_integrators_are_never_reconciled() {
        let (mut ctx, journal) = context();
        let orphan = ctx.mode_standard(0.005).unwrap();
        ctx.create_nve(NveConfig::new(Group::all())).unwrap();
        ctx.add_force(RecordedForce::new("pair.lj").into_handles().1);
        ctx.run(10).unwrap();

        let current = ctx.mode_standard(0.002).unwrap();
        ctx.add_force(RecordedForce::new("wall.lj").into_handles().1);
        ctx.run(10).unwrap();

        let orphaned = recorded(&ctx, &journal, orphan);
        assert_eq!(orphaned.borrow().runs().len(), 1);
        assert_eq!(orphaned.borrow().force_names(), vec!["pair.lj"]);
        assert_eq!(
            last_run(&ctx, &journal, current).forces,
            vec!["pair.lj", "wall.lj"]
        );
        assert_eq!(last_run(&ctx, &journal, current).first_step, 10);
    }

    #[test]
    fn nve_limit_can_be_removed_before_the_next_run() {
        let (mut ctx, journal) = context();
        ctx.mode_standard(0.005).unwrap();
        let nve = ctx.create_nve(NveConfig::new(Group::all())).unwrap();

        ctx.set_method_params(nve, NveParams::default().limit(Limit::Distance(0.01)))
            .unwrap();
        let method = journal.method_named(&method_name(&ctx, nve)).unwrap();
        assert_eq!(method.borrow().state().limit, Some(0.01));

        ctx.set_method_params(nve, NveParams::default().limit(Limit::Unlimited))
            .unwrap();
        ctx.run(10).unwrap();
        assert_eq!(method.borrow().state().limit, None);
    }

    #[test]
    fn unknown_gamma_type_leaves_coefficients_alone() {
        let (mut ctx, journal) = context();
        let id = ctx
            .create_bdnvt(
                crate::engine::config::BdNvtConfigBuilder::new()
                    .group(Group::all())
                    .temperature(1.0)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        ctx.set_gamma(id, "A", 1.5).unwrap();
        assert!(!ctx.set_gamma(id, "X", 7.0).unwrap());

        let method = journal.method_named(&method_name(&ctx, id)).unwrap();
        let gamma = method.borrow().state().gamma.clone();
        assert_eq!(gamma.into_iter().collect::<Vec<_>>(), vec![(0, 1.5)]);
    }

    #[test]
    fn force_without_compute_is_an_internal_error() {
        let (mut ctx, _) = context();
        ctx.mode_standard(0.005).unwrap();
        ctx.create_nve(NveConfig::new(Group::all())).unwrap();
        let lj = ctx.add_force(RecordedForce::new("pair.lj").into_handles().1);

        ctx.forces_mut().get_mut(lj).unwrap().detach();
        assert!(matches!(
            ctx.run(10),
            Err(IntegrateError::InternalConsistency(_))
        ));
    }

    #[test]
    fn method_without_stepper_is_an_internal_error() {
        let (mut ctx, _) = context();
        ctx.mode_standard(0.005).unwrap();
        let nve = ctx.create_nve(NveConfig::new(Group::all())).unwrap();

        ctx.methods_mut().get_mut(nve).unwrap().detach();
        assert!(matches!(
            ctx.run(10),
            Err(IntegrateError::InternalConsistency(_))
        ));
    }

    #[test]
    fn integrator_without_stepper_is_an_internal_error() {
        let (mut ctx, _) = context();
        let mode = ctx.mode_standard(0.005).unwrap();
        ctx.create_nve(NveConfig::new(Group::all())).unwrap();

        ctx.integrator_mut(mode).unwrap().detach();
        assert!(matches!(
            ctx.run(10),
            Err(IntegrateError::InternalConsistency(_))
        ));
        assert_eq!(ctx.timestep(), 0);
    }

    #[test]
    fn run_past_the_end_of_the_timestep_counter_is_refused() {
        let (mut ctx, journal) = context();
        let mode = ctx.mode_standard(0.005).unwrap();
        ctx.create_nve(NveConfig::new(Group::all())).unwrap();

        ctx.run(u64::MAX).unwrap();
        assert_eq!(ctx.timestep(), u64::MAX);

        assert!(matches!(
            ctx.run(1),
            Err(IntegrateError::Configuration(msg)) if msg.contains("overflows")
        ));
        assert_eq!(ctx.timestep(), u64::MAX);
        assert_eq!(recorded(&ctx, &journal, mode).borrow().runs().len(), 1);

        ctx.run(0).unwrap();
        assert_eq!(ctx.timestep(), u64::MAX);
    }

    #[test]
    fn temperature_ramp_is_sampled_at_the_first_step_of_each_run() {
        let (mut ctx, journal) = context();
        let mode = ctx.mode_standard(0.005).unwrap();
        let nvt = ctx
            .create_nvt(NvtConfig::new(Group::all(), [(0, 4.0), (1000, 1.0)], 0.5))
            .unwrap();
        let name = method_name(&ctx, nvt);

        ctx.run(500).unwrap();
        let first = last_run(&ctx, &journal, mode);
        ctx.run(500).unwrap();
        let second = last_run(&ctx, &journal, mode);

        assert_eq!(first.samples.len(), 1);
        assert_eq!(first.samples[0].method, name);
        assert_eq!(first.samples[0].t, Some(4.0));
        assert_eq!(first.samples[0].p, None);
        assert_eq!(second.first_step, 500);
        assert_eq!(second.samples[0].t, Some(2.5));
    }

    #[test]
    fn reconcile_reports_registration_counts() {
        let (mut ctx, _) = context();
        assert_eq!(ctx.reconcile().unwrap(), None);

        let mode = ctx.mode_standard(0.005).unwrap();
        ctx.create_nve(NveConfig::new(Group::all())).unwrap();
        ctx.add_force(RecordedForce::new("pair.lj").into_handles().1);
        assert_eq!(
            ctx.reconcile().unwrap(),
            Some(Reconciled {
                integrator: mode,
                forces: 1,
                methods: 1,
            })
        );
    }
}
