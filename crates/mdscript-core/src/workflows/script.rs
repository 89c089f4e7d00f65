use crate::core::stepper::ForceHandle;
use crate::engine::config::{FireConfig, FireParams, MethodParams, StandardParams};
use crate::engine::context::SimulationContext;
use crate::engine::error::IntegrateError;
use crate::engine::ids::{ForceId, IntegratorId, MethodId};
use crate::engine::integrator::IntegratorKind;
use crate::engine::method::{MethodConfig, MethodKind};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::sync::RunOutcome;
use std::collections::HashMap;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq)]
pub enum IntegratorSpec {
    Standard { dt: f64 },
    MinimizeFire(FireConfig),
}

impl IntegratorSpec {
    fn kind(&self) -> IntegratorKind {
        match self {
            Self::Standard { .. } => IntegratorKind::Standard,
            Self::MinimizeFire(_) => IntegratorKind::FireMinimizer,
        }
    }
}

/// A parameter update addressed to a named integrator or method.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamUpdate {
    Standard(StandardParams),
    Fire(FireParams),
    Method(MethodParams),
}

#[derive(Debug, Clone)]
pub enum Command {
    Integrator { name: String, spec: IntegratorSpec },
    Method { name: String, config: MethodConfig },
    Force { name: String, handle: ForceHandle },
    Enable { target: String },
    Disable { target: String },
    SetParams { target: String, update: ParamUpdate },
    SetGamma { target: String, type_name: String, gamma: f64 },
    Run { steps: u64 },
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub commands: Vec<Command>,
}

impl Script {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    /// Number of `run` commands.
    pub fn run_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Run { .. }))
            .count()
    }

    /// Checks every name reference without touching a context: names are unique, refer to
    /// something declared earlier, and each command targets an object that accepts it.
    pub fn validate(&self) -> Result<(), IntegrateError> {
        let mut declared: HashMap<&str, Declared> = HashMap::new();
        for (index, command) in self.commands.iter().enumerate() {
            let position = index + 1;
            match command {
                Command::Integrator { name, spec } => {
                    declare(&mut declared, name, Declared::Integrator(spec.kind()), position)?
                }
                Command::Method { name, config } => {
                    declare(&mut declared, name, Declared::Method(config.kind()), position)?
                }
                Command::Force { name, .. } => {
                    declare(&mut declared, name, Declared::Force, position)?
                }
                Command::Enable { target } | Command::Disable { target } => {
                    if let Declared::Integrator(_) = lookup(&declared, target, position)? {
                        return Err(command_error(
                            position,
                            format!("integrator '{target}' cannot be enabled or disabled"),
                        ));
                    }
                }
                Command::SetParams { target, update } => {
                    let found = lookup(&declared, target, position)?;
                    let accepted = match (found, update) {
                        (Declared::Integrator(kind), ParamUpdate::Standard(_)) => {
                            kind == IntegratorKind::Standard
                        }
                        (Declared::Integrator(kind), ParamUpdate::Fire(_)) => {
                            kind == IntegratorKind::FireMinimizer
                        }
                        (Declared::Method(kind), ParamUpdate::Method(params)) => {
                            kind == params_kind(params)
                        }
                        _ => false,
                    };
                    if !accepted {
                        return Err(command_error(
                            position,
                            format!("'{target}' does not accept these parameters"),
                        ));
                    }
                }
                Command::SetGamma { target, .. } => {
                    if lookup(&declared, target, position)? != Declared::Method(MethodKind::BdNvt) {
                        return Err(command_error(
                            position,
                            format!("'{target}' is not a bdnvt method"),
                        ));
                    }
                }
                Command::Run { .. } => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Declared {
    Integrator(IntegratorKind),
    Method(MethodKind),
    Force,
}

fn params_kind(params: &MethodParams) -> MethodKind {
    match params {
        MethodParams::Nvt(_) => MethodKind::Nvt,
        MethodParams::Npt(_) => MethodKind::Npt,
        MethodParams::Nve(_) => MethodKind::Nve,
        MethodParams::BdNvt(_) => MethodKind::BdNvt,
    }
}

fn command_error(position: usize, message: String) -> IntegrateError {
    IntegrateError::Configuration(format!("command {position}: {message}"))
}

fn declare<'s>(
    declared: &mut HashMap<&'s str, Declared>,
    name: &'s str,
    what: Declared,
    position: usize,
) -> Result<(), IntegrateError> {
    if declared.insert(name, what).is_some() {
        return Err(command_error(
            position,
            format!("the name '{name}' is already in use"),
        ));
    }
    Ok(())
}

fn lookup(
    declared: &HashMap<&str, Declared>,
    name: &str,
    position: usize,
) -> Result<Declared, IntegrateError> {
    declared
        .get(name)
        .copied()
        .ok_or_else(|| command_error(position, format!("nothing named '{name}' was declared")))
}

/// What one `run` command executed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Script name of the integrator that ran, or `None` if the run was skipped.
    pub integrator: Option<String>,
    /// Name the engine gave the integrator's stepper.
    pub stepper: Option<String>,
    pub first_step: u64,
    pub steps: u64,
    /// Script names of the registered methods, in registration order.
    pub methods: Vec<String>,
    /// Script names of the registered forces, in registration order.
    pub forces: Vec<String>,
    /// Convergence of a FIRE minimizer after the run.
    pub converged: Option<bool>,
}

impl RunReport {
    pub fn is_skipped(&self) -> bool {
        self.integrator.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptReport {
    pub runs: Vec<RunReport>,
    pub final_timestep: u64,
}

#[derive(Default)]
struct Names {
    integrators: HashMap<String, IntegratorId>,
    methods: HashMap<String, MethodId>,
    forces: HashMap<String, ForceId>,
    method_names: HashMap<MethodId, String>,
    force_names: HashMap<ForceId, String>,
    integrator_names: HashMap<IntegratorId, String>,
}

enum Target {
    Integrator(IntegratorId),
    Method(MethodId),
    Force(ForceId),
}

impl Names {
    fn resolve(&self, name: &str) -> Result<Target, IntegrateError> {
        if let Some(&id) = self.integrators.get(name) {
            return Ok(Target::Integrator(id));
        }
        if let Some(&id) = self.methods.get(name) {
            return Ok(Target::Method(id));
        }
        if let Some(&id) = self.forces.get(name) {
            return Ok(Target::Force(id));
        }
        Err(IntegrateError::Configuration(format!(
            "nothing named '{name}' was declared"
        )))
    }

    fn method(&self, name: &str) -> Result<MethodId, IntegrateError> {
        match self.resolve(name)? {
            Target::Method(id) => Ok(id),
            _ => Err(IntegrateError::Configuration(format!(
                "'{name}' is not an integration method"
            ))),
        }
    }
}

/// Validates `script`, then executes its commands in order against `ctx`.
///
/// The context must already be initialized before anything other than forces can be created;
/// the first failing command aborts the script.
#[instrument(skip_all, name = "script_workflow")]
pub fn run(
    ctx: &mut SimulationContext,
    script: &Script,
    reporter: &ProgressReporter,
) -> Result<ScriptReport, IntegrateError> {
    reporter.report(Progress::PhaseStart { name: "Validation" });
    script.validate()?;
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart { name: "Execution" });
    reporter.report(Progress::TaskStart {
        total_steps: script.commands.len() as u64,
    });
    info!(
        "Executing {} command(s) with {} run(s)",
        script.commands.len(),
        script.run_count()
    );

    let mut names = Names::default();
    let mut report = ScriptReport::default();
    for command in &script.commands {
        if let Some(run) = execute(ctx, &mut names, command)? {
            reporter.message(describe(&run, report.runs.len() + 1));
            report.runs.push(run);
        }
        reporter.report(Progress::TaskIncrement);
    }
    report.final_timestep = ctx.timestep();

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    info!(
        "Script complete after {} run(s) at timestep {}",
        report.runs.len(),
        report.final_timestep
    );
    Ok(report)
}

fn execute(
    ctx: &mut SimulationContext,
    names: &mut Names,
    command: &Command,
) -> Result<Option<RunReport>, IntegrateError> {
    match command {
        Command::Integrator { name, spec } => {
            let id = match spec {
                IntegratorSpec::Standard { dt } => ctx.mode_standard(*dt)?,
                IntegratorSpec::MinimizeFire(config) => ctx.mode_minimize_fire(config.clone())?,
            };
            names.integrators.insert(name.clone(), id);
            names.integrator_names.insert(id, name.clone());
        }
        Command::Method { name, config } => {
            let id = ctx.create_method(config.clone())?;
            names.methods.insert(name.clone(), id);
            names.method_names.insert(id, name.clone());
        }
        Command::Force { name, handle } => {
            let id = ctx.add_force(handle.clone());
            names.forces.insert(name.clone(), id);
            names.force_names.insert(id, name.clone());
        }
        Command::Enable { target } => {
            match names.resolve(target)? {
                Target::Method(id) => ctx.enable_method(id)?,
                Target::Force(id) => ctx.enable_force(id)?,
                Target::Integrator(_) => {
                    return Err(IntegrateError::Configuration(format!(
                        "integrator '{target}' cannot be enabled"
                    )));
                }
            };
        }
        Command::Disable { target } => {
            match names.resolve(target)? {
                Target::Method(id) => ctx.disable_method(id)?,
                Target::Force(id) => ctx.disable_force(id)?,
                Target::Integrator(_) => {
                    return Err(IntegrateError::Configuration(format!(
                        "integrator '{target}' cannot be disabled"
                    )));
                }
            };
        }
        Command::SetParams { target, update } => match (names.resolve(target)?, update) {
            (Target::Integrator(id), ParamUpdate::Standard(params)) => {
                ctx.set_standard_params(id, params.clone())?
            }
            (Target::Integrator(id), ParamUpdate::Fire(params)) => {
                ctx.set_fire_params(id, params.clone())?
            }
            (Target::Method(id), ParamUpdate::Method(params)) => {
                ctx.set_method_params(id, params.clone())?
            }
            _ => {
                return Err(IntegrateError::Configuration(format!(
                    "'{target}' does not accept these parameters"
                )));
            }
        },
        Command::SetGamma {
            target,
            type_name,
            gamma,
        } => {
            let id = names.method(target)?;
            ctx.set_gamma(id, type_name, *gamma)?;
        }
        Command::Run { steps } => return run_command(ctx, names, *steps).map(Some),
    }
    Ok(None)
}

fn run_command(
    ctx: &mut SimulationContext,
    names: &Names,
    steps: u64,
) -> Result<RunReport, IntegrateError> {
    let outcome = ctx.run(steps)?;
    let RunOutcome::Completed {
        integrator,
        first_step,
        steps,
    } = outcome
    else {
        return Ok(RunReport {
            integrator: None,
            stepper: None,
            first_step: ctx.timestep(),
            steps: 0,
            methods: Vec::new(),
            forces: Vec::new(),
            converged: None,
        });
    };

    let current = ctx.integrator(integrator)?;
    let stepper = current.handle().map(|h| h.borrow().name().to_string());
    let methods = if current.supports_methods() {
        ctx.active_methods()
            .iter()
            .map(|id| script_name(&names.method_names, id))
            .collect()
    } else {
        Vec::new()
    };
    let forces = ctx
        .forces()
        .enabled()
        .map(|(id, _)| script_name(&names.force_names, &id))
        .collect();
    let converged = match current.kind() {
        IntegratorKind::FireMinimizer => Some(ctx.has_converged(integrator)?),
        IntegratorKind::Standard => None,
    };

    Ok(RunReport {
        integrator: Some(script_name(&names.integrator_names, &integrator)),
        stepper,
        first_step,
        steps,
        methods,
        forces,
        converged,
    })
}

fn script_name<K: std::hash::Hash + Eq + std::fmt::Debug>(names: &HashMap<K, String>, id: &K) -> String {
    names.get(id).cloned().unwrap_or_else(|| format!("{id:?}"))
}

fn describe(run: &RunReport, index: usize) -> String {
    match &run.integrator {
        None => format!("Run {index}: skipped, no integrator"),
        Some(name) => format!(
            "Run {index}: {name} steps {}..{} with methods [{}] and forces [{}]",
            run.first_step,
            run.first_step.saturating_add(run.steps),
            run.methods.join(", "),
            run.forces.join(", ")
        ),
    }
}
