use crate::error::{CliError, Result};
use mdscript::core::exec::ExecutionMode;
use mdscript::core::group::Group;
use mdscript::core::recording::RecordedForce;
use mdscript::core::system::{ParticleTypes, SystemDefinition};
use mdscript::core::variant::Variant;
use mdscript::engine::config::{
    BdNvtConfigBuilder, BdNvtParams, FireConfigBuilder, FireParams, Limit, MethodParams,
    NptConfigBuilder, NptParams, NveConfig, NveParams, NvtConfig, NvtParams, StandardParams,
};
use mdscript::engine::method::{MethodConfig, MethodKind};
use mdscript::workflows::script::{Command, IntegratorSpec, ParamUpdate, Script};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSystem {
    pub particle_types: Vec<String>,
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_mode() -> String {
    "cpu".to_string()
}

/// `"all"`, a bare particle-type name, or a table naming the selector explicitly.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FileGroup {
    Name(String),
    Selector(FileGroupSelector),
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case", tag = "type")]
pub enum FileGroupSelector {
    All,
    ParticleType { name: String },
    Tags { name: String, first: u32, last: u32 },
}

impl From<FileGroup> for Group {
    fn from(group: FileGroup) -> Self {
        match group {
            FileGroup::Name(name) if name == "all" => Group::all(),
            FileGroup::Name(name) => Group::of_type(name),
            FileGroup::Selector(FileGroupSelector::All) => Group::all(),
            FileGroup::Selector(FileGroupSelector::ParticleType { name }) => Group::of_type(name),
            FileGroup::Selector(FileGroupSelector::Tags { name, first, last }) => {
                Group::tags(name, first, last)
            }
        }
    }
}

/// A displacement limit in distance units, or `false` to remove it.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(untagged)]
pub enum FileLimit {
    Distance(f64),
    Flag(bool),
}

impl FileLimit {
    fn into_limit(self) -> Result<Limit> {
        match self {
            FileLimit::Distance(distance) => Ok(Limit::Distance(distance)),
            FileLimit::Flag(false) => Ok(Limit::Unlimited),
            FileLimit::Flag(true) => Err(CliError::Config(
                "`limit = true` is not a distance; give a number or `false`".to_string(),
            )),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FileIntegratorMode {
    Standard,
    MinimizeFire,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FileMethodKind {
    Nvt,
    Npt,
    Nve,
    Bdnvt,
}

impl From<FileMethodKind> for MethodKind {
    fn from(kind: FileMethodKind) -> Self {
        match kind {
            FileMethodKind::Nvt => MethodKind::Nvt,
            FileMethodKind::Npt => MethodKind::Npt,
            FileMethodKind::Nve => MethodKind::Nve,
            FileMethodKind::Bdnvt => MethodKind::BdNvt,
        }
    }
}

/// Every tunable a `set-params` or creating command may carry. Which ones apply depends on the
/// kind of object addressed.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileParams {
    pub dt: Option<f64>,
    pub nmin: Option<u32>,
    pub finc: Option<f64>,
    pub fdec: Option<f64>,
    pub alpha_start: Option<f64>,
    pub falpha: Option<f64>,
    pub ftol: Option<f64>,
    pub etol: Option<f64>,
    pub temperature: Option<Variant>,
    pub tau: Option<f64>,
    pub pressure: Option<Variant>,
    pub tau_p: Option<f64>,
    pub partial_scale: Option<bool>,
    pub limit: Option<FileLimit>,
    pub zero_force: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case", tag = "type")]
pub enum FileCommand {
    Integrator {
        name: String,
        mode: FileIntegratorMode,
        dt: f64,
        group: Option<FileGroup>,
        nmin: Option<u32>,
        finc: Option<f64>,
        fdec: Option<f64>,
        alpha_start: Option<f64>,
        falpha: Option<f64>,
        ftol: Option<f64>,
        etol: Option<f64>,
    },
    Method {
        name: String,
        method: FileMethodKind,
        group: FileGroup,
        temperature: Option<Variant>,
        tau: Option<f64>,
        pressure: Option<Variant>,
        tau_p: Option<f64>,
        partial_scale: Option<bool>,
        limit: Option<f64>,
        zero_force: Option<bool>,
        seed: Option<u32>,
        gamma_diam: Option<bool>,
    },
    Force {
        name: String,
        /// Name of the external compute, e.g. `pair.lj`. Defaults to `name`.
        compute: Option<String>,
    },
    Enable {
        target: String,
    },
    Disable {
        target: String,
    },
    SetParams {
        target: String,
        params: FileParams,
    },
    SetGamma {
        target: String,
        particle_type: String,
        gamma: f64,
    },
    Run {
        steps: u64,
    },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScriptFile {
    pub system: FileSystem,
    #[serde(default)]
    pub commands: Vec<FileCommand>,
}

/// What a script name was declared as, so `set-params` knows which record to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Declared {
    Standard,
    Fire,
    Method(MethodKind),
    Force,
}

impl ScriptFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading script from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Resolves the system definition, applying a `--mode` override if given.
    pub fn system(&self, mode_override: Option<&str>) -> Result<SystemDefinition> {
        let mode_str = mode_override.unwrap_or(&self.system.mode);
        let exec_mode: ExecutionMode = mode_str
            .parse()
            .map_err(|e: mdscript::core::exec::InvalidExecutionMode| {
                CliError::Argument(e.to_string())
            })?;
        if self.system.particle_types.is_empty() {
            return Err(CliError::Config(
                "`system.particle-types` must declare at least one type".to_string(),
            ));
        }
        Ok(SystemDefinition::new(
            ParticleTypes::new(self.system.particle_types.iter().cloned()),
            exec_mode,
        ))
    }

    /// Converts the file commands into an executable script, one command at a time.
    pub fn to_script(&self) -> Result<Script> {
        let mut declared: HashMap<&str, Declared> = HashMap::new();
        let mut script = Script::default();

        for (index, file_command) in self.commands.iter().enumerate() {
            let command = convert_command(file_command, &declared).map_err(|e| match e {
                CliError::Config(msg) => CliError::Config(format!("command {}: {msg}", index + 1)),
                other => other,
            })?;
            match &command {
                Command::Integrator { name, spec } => {
                    let kind = match spec {
                        IntegratorSpec::Standard { .. } => Declared::Standard,
                        IntegratorSpec::MinimizeFire(_) => Declared::Fire,
                    };
                    declared.insert(name_of(file_command), kind);
                    debug!("Declared integrator '{name}'");
                }
                Command::Method { config, .. } => {
                    declared.insert(name_of(file_command), Declared::Method(config.kind()));
                }
                Command::Force { .. } => {
                    declared.insert(name_of(file_command), Declared::Force);
                }
                _ => {}
            }
            script.push(command);
        }
        Ok(script)
    }
}

fn name_of(command: &FileCommand) -> &str {
    match command {
        FileCommand::Integrator { name, .. }
        | FileCommand::Method { name, .. }
        | FileCommand::Force { name, .. } => name,
        FileCommand::Enable { target }
        | FileCommand::Disable { target }
        | FileCommand::SetParams { target, .. }
        | FileCommand::SetGamma { target, .. } => target,
        FileCommand::Run { .. } => "",
    }
}

fn required<T>(value: Option<T>, field: &str, what: &str) -> Result<T> {
    value.ok_or_else(|| CliError::Config(format!("`{field}` is required for {what}")))
}

fn convert_command(command: &FileCommand, declared: &HashMap<&str, Declared>) -> Result<Command> {
    let converted = match command {
        FileCommand::Integrator {
            name,
            mode,
            dt,
            group,
            nmin,
            finc,
            fdec,
            alpha_start,
            falpha,
            ftol,
            etol,
        } => {
            let spec = match mode {
                FileIntegratorMode::Standard => {
                    let has_fire_fields = group.is_some()
                        || nmin.is_some()
                        || finc.is_some()
                        || fdec.is_some()
                        || alpha_start.is_some()
                        || falpha.is_some()
                        || ftol.is_some()
                        || etol.is_some();
                    if has_fire_fields {
                        return Err(CliError::Config(format!(
                            "integrator '{name}' is in standard mode and takes only `dt`"
                        )));
                    }
                    IntegratorSpec::Standard { dt: *dt }
                }
                FileIntegratorMode::MinimizeFire => {
                    let params = FireParams {
                        nmin: *nmin,
                        finc: *finc,
                        fdec: *fdec,
                        alpha_start: *alpha_start,
                        falpha: *falpha,
                        ftol: *ftol,
                        etol: *etol,
                    };
                    let config = FireConfigBuilder::new()
                        .group(group.clone().map(Group::from).unwrap_or_else(Group::all))
                        .dt(*dt)
                        .params(params)
                        .build()
                        .map_err(|e| CliError::Config(e.to_string()))?;
                    IntegratorSpec::MinimizeFire(config)
                }
            };
            Command::Integrator {
                name: name.clone(),
                spec,
            }
        }
        FileCommand::Method {
            name,
            method,
            group,
            temperature,
            tau,
            pressure,
            tau_p,
            partial_scale,
            limit,
            zero_force,
            seed,
            gamma_diam,
        } => {
            let group = Group::from(group.clone());
            let what = format!("{} method '{name}'", MethodKind::from(*method));
            let config = match method {
                FileMethodKind::Nvt => MethodConfig::Nvt(NvtConfig::new(
                    group,
                    required(temperature.clone(), "temperature", &what)?,
                    required(*tau, "tau", &what)?,
                )),
                FileMethodKind::Npt => {
                    let mut builder = NptConfigBuilder::new().group(group);
                    if let Some(t) = temperature.clone() {
                        builder = builder.temperature(t);
                    }
                    if let Some(tau) = tau {
                        builder = builder.tau(*tau);
                    }
                    if let Some(p) = pressure.clone() {
                        builder = builder.pressure(p);
                    }
                    if let Some(tau_p) = tau_p {
                        builder = builder.tau_p(*tau_p);
                    }
                    if let Some(partial_scale) = partial_scale {
                        builder = builder.partial_scale(*partial_scale);
                    }
                    MethodConfig::Npt(builder.build().map_err(|e| CliError::Config(e.to_string()))?)
                }
                FileMethodKind::Nve => {
                    let mut config = NveConfig::new(group).zero_force(zero_force.unwrap_or(false));
                    if let Some(limit) = limit {
                        config = config.limit(*limit);
                    }
                    MethodConfig::Nve(config)
                }
                FileMethodKind::Bdnvt => {
                    let mut builder = BdNvtConfigBuilder::new().group(group);
                    if let Some(t) = temperature.clone() {
                        builder = builder.temperature(t);
                    }
                    if let Some(seed) = seed {
                        builder = builder.seed(*seed);
                    }
                    if let Some(gamma_diam) = gamma_diam {
                        builder = builder.gamma_diam(*gamma_diam);
                    }
                    if let Some(limit) = limit {
                        builder = builder.limit(*limit);
                    }
                    MethodConfig::BdNvt(
                        builder.build().map_err(|e| CliError::Config(e.to_string()))?,
                    )
                }
            };
            reject_unused(command, &config)?;
            Command::Method {
                name: name.clone(),
                config,
            }
        }
        FileCommand::Force { name, compute } => {
            let compute = compute.clone().unwrap_or_else(|| name.clone());
            Command::Force {
                name: name.clone(),
                handle: RecordedForce::new(compute).into_handles().1,
            }
        }
        FileCommand::Enable { target } => Command::Enable {
            target: target.clone(),
        },
        FileCommand::Disable { target } => Command::Disable {
            target: target.clone(),
        },
        FileCommand::SetParams { target, params } => {
            let kind = declared.get(target.as_str()).copied().ok_or_else(|| {
                CliError::Config(format!("nothing named '{target}' was declared"))
            })?;
            Command::SetParams {
                target: target.clone(),
                update: param_update(target, kind, params)?,
            }
        }
        FileCommand::SetGamma {
            target,
            particle_type,
            gamma,
        } => Command::SetGamma {
            target: target.clone(),
            type_name: particle_type.clone(),
            gamma: *gamma,
        },
        FileCommand::Run { steps } => Command::Run { steps: *steps },
    };
    Ok(converted)
}

/// Fails if a `method` command carries fields the chosen method does not take.
fn reject_unused(command: &FileCommand, config: &MethodConfig) -> Result<()> {
    let FileCommand::Method {
        name,
        pressure,
        tau,
        tau_p,
        partial_scale,
        limit,
        zero_force,
        seed,
        gamma_diam,
        temperature,
        ..
    } = command
    else {
        return Ok(());
    };
    let mut unused = Vec::new();
    let kind = config.kind();
    let mut check = |present: bool, field: &'static str, allowed: &[MethodKind]| {
        if present && !allowed.contains(&kind) {
            unused.push(field);
        }
    };
    use MethodKind::*;
    check(temperature.is_some(), "temperature", &[Nvt, Npt, BdNvt]);
    check(tau.is_some(), "tau", &[Nvt, Npt]);
    check(pressure.is_some(), "pressure", &[Npt]);
    check(tau_p.is_some(), "tau-p", &[Npt]);
    check(partial_scale.is_some(), "partial-scale", &[Npt]);
    check(limit.is_some(), "limit", &[Nve, BdNvt]);
    check(zero_force.is_some(), "zero-force", &[Nve]);
    check(seed.is_some(), "seed", &[BdNvt]);
    check(gamma_diam.is_some(), "gamma-diam", &[BdNvt]);

    if unused.is_empty() {
        Ok(())
    } else {
        Err(CliError::Config(format!(
            "{kind} method '{name}' does not take: {}",
            unused.join(", ")
        )))
    }
}

fn param_update(target: &str, kind: Declared, p: &FileParams) -> Result<ParamUpdate> {
    let fields: [(&'static str, bool); 15] = [
        ("dt", p.dt.is_some()),
        ("nmin", p.nmin.is_some()),
        ("finc", p.finc.is_some()),
        ("fdec", p.fdec.is_some()),
        ("alpha-start", p.alpha_start.is_some()),
        ("falpha", p.falpha.is_some()),
        ("ftol", p.ftol.is_some()),
        ("etol", p.etol.is_some()),
        ("temperature", p.temperature.is_some()),
        ("tau", p.tau.is_some()),
        ("pressure", p.pressure.is_some()),
        ("tau-p", p.tau_p.is_some()),
        ("partial-scale", p.partial_scale.is_some()),
        ("limit", p.limit.is_some()),
        ("zero-force", p.zero_force.is_some()),
    ];
    let accepted: &[&str] = match kind {
        Declared::Standard => &["dt"],
        Declared::Fire => &["nmin", "finc", "fdec", "alpha-start", "falpha", "ftol", "etol"],
        Declared::Method(MethodKind::Nvt) => &["temperature", "tau"],
        Declared::Method(MethodKind::Npt) => {
            &["temperature", "tau", "pressure", "tau-p", "partial-scale"]
        }
        Declared::Method(MethodKind::Nve) => &["limit", "zero-force"],
        Declared::Method(MethodKind::BdNvt) => &["temperature", "limit"],
        Declared::Force => {
            return Err(CliError::Config(format!(
                "force '{target}' has no parameters to set"
            )));
        }
    };
    let rejected: Vec<&str> = fields
        .iter()
        .filter(|(field, present)| *present && !accepted.contains(field))
        .map(|(field, _)| *field)
        .collect();
    if !rejected.is_empty() {
        return Err(CliError::Config(format!(
            "'{target}' does not take: {}",
            rejected.join(", ")
        )));
    }

    let limit = p.limit.map(FileLimit::into_limit).transpose()?;
    let update = match kind {
        Declared::Standard => ParamUpdate::Standard(StandardParams { dt: p.dt }),
        Declared::Fire => ParamUpdate::Fire(FireParams {
            nmin: p.nmin,
            finc: p.finc,
            fdec: p.fdec,
            alpha_start: p.alpha_start,
            falpha: p.falpha,
            ftol: p.ftol,
            etol: p.etol,
        }),
        Declared::Method(method) => ParamUpdate::Method(match method {
            MethodKind::Nvt => MethodParams::Nvt(NvtParams {
                temperature: p.temperature.clone(),
                tau: p.tau,
            }),
            MethodKind::Npt => MethodParams::Npt(NptParams {
                temperature: p.temperature.clone(),
                tau: p.tau,
                pressure: p.pressure.clone(),
                tau_p: p.tau_p,
                partial_scale: p.partial_scale,
            }),
            MethodKind::Nve => MethodParams::Nve(NveParams {
                limit,
                zero_force: p.zero_force,
            }),
            MethodKind::BdNvt => MethodParams::BdNvt(BdNvtParams {
                temperature: p.temperature.clone(),
                limit,
            }),
        }),
        Declared::Force => {
            return Err(CliError::Config(format!(
                "force '{target}' has no parameters to set"
            )));
        }
    };
    Ok(update)
}
