use crate::core::group::Group;
use crate::core::variant::Variant;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
}

/// A per-step displacement limit, or its explicit removal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Limit {
    /// No particle moves further than this in a single step.
    Distance(f64),
    /// Remove any previously set limit.
    Unlimited,
}

// ---------------------------------------------------------------------------
// Construction records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct NvtConfig {
    pub group: Group,
    pub temperature: Variant,
    pub tau: f64,
}

impl NvtConfig {
    pub fn new(group: Group, temperature: impl Into<Variant>, tau: f64) -> Self {
        Self {
            group,
            temperature: temperature.into(),
            tau,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NptConfig {
    pub group: Group,
    pub temperature: Variant,
    pub tau: f64,
    pub pressure: Variant,
    pub tau_p: f64,
    /// When set, box rescaling only moves particles of `group` instead of every particle.
    pub partial_scale: bool,
}

#[derive(Default)]
pub struct NptConfigBuilder {
    group: Option<Group>,
    temperature: Option<Variant>,
    tau: Option<f64>,
    pressure: Option<Variant>,
    tau_p: Option<f64>,
    partial_scale: Option<bool>,
}

impl NptConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, group: Group) -> Self {
        self.group = Some(group);
        self
    }
    pub fn temperature(mut self, temperature: impl Into<Variant>) -> Self {
        self.temperature = Some(temperature.into());
        self
    }
    pub fn tau(mut self, tau: f64) -> Self {
        self.tau = Some(tau);
        self
    }
    pub fn pressure(mut self, pressure: impl Into<Variant>) -> Self {
        self.pressure = Some(pressure.into());
        self
    }
    pub fn tau_p(mut self, tau_p: f64) -> Self {
        self.tau_p = Some(tau_p);
        self
    }
    pub fn partial_scale(mut self, partial_scale: bool) -> Self {
        self.partial_scale = Some(partial_scale);
        self
    }

    pub fn build(self) -> Result<NptConfig, ConfigError> {
        Ok(NptConfig {
            group: self.group.ok_or(ConfigError::MissingParameter("group"))?,
            temperature: self
                .temperature
                .ok_or(ConfigError::MissingParameter("temperature"))?,
            tau: self.tau.ok_or(ConfigError::MissingParameter("tau"))?,
            pressure: self
                .pressure
                .ok_or(ConfigError::MissingParameter("pressure"))?,
            tau_p: self.tau_p.ok_or(ConfigError::MissingParameter("tau_p"))?,
            partial_scale: self.partial_scale.unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NveConfig {
    pub group: Group,
    pub limit: Option<f64>,
    /// Integrate at constant velocity, ignoring the net force on the group.
    pub zero_force: bool,
}

impl NveConfig {
    pub fn new(group: Group) -> Self {
        Self {
            group,
            limit: None,
            zero_force: false,
        }
    }

    pub fn limit(mut self, limit: f64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn zero_force(mut self, zero_force: bool) -> Self {
        self.zero_force = zero_force;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BdNvtConfig {
    pub group: Group,
    pub temperature: Variant,
    /// Fixes the pseudo-random trajectory.
    pub seed: u32,
    /// Take each particle's drag coefficient from its diameter instead of per-type gammas.
    pub gamma_diam: bool,
    pub limit: Option<f64>,
}

#[derive(Default)]
pub struct BdNvtConfigBuilder {
    group: Option<Group>,
    temperature: Option<Variant>,
    seed: Option<u32>,
    gamma_diam: Option<bool>,
    limit: Option<f64>,
}

impl BdNvtConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, group: Group) -> Self {
        self.group = Some(group);
        self
    }
    pub fn temperature(mut self, temperature: impl Into<Variant>) -> Self {
        self.temperature = Some(temperature.into());
        self
    }
    pub fn seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn gamma_diam(mut self, gamma_diam: bool) -> Self {
        self.gamma_diam = Some(gamma_diam);
        self
    }
    pub fn limit(mut self, limit: f64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn build(self) -> Result<BdNvtConfig, ConfigError> {
        Ok(BdNvtConfig {
            group: self.group.ok_or(ConfigError::MissingParameter("group"))?,
            temperature: self
                .temperature
                .ok_or(ConfigError::MissingParameter("temperature"))?,
            seed: self.seed.unwrap_or(0),
            gamma_diam: self.gamma_diam.unwrap_or(false),
            limit: self.limit,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FireConfig {
    pub group: Group,
    pub dt: f64,
    pub params: FireParams,
}

#[derive(Default)]
pub struct FireConfigBuilder {
    group: Option<Group>,
    dt: Option<f64>,
    params: FireParams,
}

impl FireConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, group: Group) -> Self {
        self.group = Some(group);
        self
    }
    pub fn dt(mut self, dt: f64) -> Self {
        self.dt = Some(dt);
        self
    }
    pub fn params(mut self, params: FireParams) -> Self {
        self.params = params;
        self
    }

    pub fn build(self) -> Result<FireConfig, ConfigError> {
        Ok(FireConfig {
            group: self.group.ok_or(ConfigError::MissingParameter("group"))?,
            dt: self.dt.ok_or(ConfigError::MissingParameter("dt"))?,
            params: self.params,
        })
    }
}

// ---------------------------------------------------------------------------
// Parameter updates: every field is optional, unset fields leave the stepper untouched.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StandardParams {
    pub dt: Option<f64>,
}

impl StandardParams {
    pub fn dt(mut self, dt: f64) -> Self {
        self.dt = Some(dt);
        self
    }
}

/// FIRE minimizer tuning. Unset fields keep the engine's defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FireParams {
    pub nmin: Option<u32>,
    pub finc: Option<f64>,
    pub fdec: Option<f64>,
    pub alpha_start: Option<f64>,
    pub falpha: Option<f64>,
    pub ftol: Option<f64>,
    pub etol: Option<f64>,
}

impl FireParams {
    pub fn nmin(mut self, nmin: u32) -> Self {
        self.nmin = Some(nmin);
        self
    }
    pub fn finc(mut self, finc: f64) -> Self {
        self.finc = Some(finc);
        self
    }
    pub fn fdec(mut self, fdec: f64) -> Self {
        self.fdec = Some(fdec);
        self
    }
    pub fn alpha_start(mut self, alpha_start: f64) -> Self {
        self.alpha_start = Some(alpha_start);
        self
    }
    pub fn falpha(mut self, falpha: f64) -> Self {
        self.falpha = Some(falpha);
        self
    }
    pub fn ftol(mut self, ftol: f64) -> Self {
        self.ftol = Some(ftol);
        self
    }
    pub fn etol(mut self, etol: f64) -> Self {
        self.etol = Some(etol);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NvtParams {
    pub temperature: Option<Variant>,
    pub tau: Option<f64>,
}

impl NvtParams {
    pub fn temperature(mut self, temperature: impl Into<Variant>) -> Self {
        self.temperature = Some(temperature.into());
        self
    }
    pub fn tau(mut self, tau: f64) -> Self {
        self.tau = Some(tau);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NptParams {
    pub temperature: Option<Variant>,
    pub tau: Option<f64>,
    pub pressure: Option<Variant>,
    pub tau_p: Option<f64>,
    pub partial_scale: Option<bool>,
}

impl NptParams {
    pub fn temperature(mut self, temperature: impl Into<Variant>) -> Self {
        self.temperature = Some(temperature.into());
        self
    }
    pub fn tau(mut self, tau: f64) -> Self {
        self.tau = Some(tau);
        self
    }
    pub fn pressure(mut self, pressure: impl Into<Variant>) -> Self {
        self.pressure = Some(pressure.into());
        self
    }
    pub fn tau_p(mut self, tau_p: f64) -> Self {
        self.tau_p = Some(tau_p);
        self
    }
    pub fn partial_scale(mut self, partial_scale: bool) -> Self {
        self.partial_scale = Some(partial_scale);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NveParams {
    pub limit: Option<Limit>,
    pub zero_force: Option<bool>,
}

impl NveParams {
    pub fn limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }
    pub fn zero_force(mut self, zero_force: bool) -> Self {
        self.zero_force = Some(zero_force);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BdNvtParams {
    pub temperature: Option<Variant>,
    pub limit: Option<Limit>,
}

impl BdNvtParams {
    pub fn temperature(mut self, temperature: impl Into<Variant>) -> Self {
        self.temperature = Some(temperature.into());
        self
    }
    pub fn limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A parameter update addressed to one integration method.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodParams {
    Nvt(NvtParams),
    Npt(NptParams),
    Nve(NveParams),
    BdNvt(BdNvtParams),
}

impl From<NvtParams> for MethodParams {
    fn from(params: NvtParams) -> Self {
        Self::Nvt(params)
    }
}

impl From<NptParams> for MethodParams {
    fn from(params: NptParams) -> Self {
        Self::Npt(params)
    }
}

impl From<NveParams> for MethodParams {
    fn from(params: NveParams) -> Self {
        Self::Nve(params)
    }
}

impl From<BdNvtParams> for MethodParams {
    fn from(params: BdNvtParams) -> Self {
        Self::BdNvt(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npt_builder_fills_optional_defaults() {
        let config = NptConfigBuilder::new()
            .group(Group::all())
            .temperature(1.0)
            .tau(0.5)
            .pressure(2.0)
            .tau_p(1.0)
            .build()
            .unwrap();

        assert!(!config.partial_scale);
        assert_eq!(config.pressure, Variant::Constant(2.0));
    }

    #[test]
    fn npt_builder_reports_the_first_missing_parameter() {
        let result = NptConfigBuilder::new()
            .group(Group::all())
            .temperature(1.0)
            .tau(0.5)
            .build();
        assert_eq!(result, Err(ConfigError::MissingParameter("pressure")));
    }

    #[test]
    fn bdnvt_builder_defaults_seed_and_gamma_mode() {
        let config = BdNvtConfigBuilder::new()
            .group(Group::all())
            .temperature([(0, 4.0), (1000, 1.0)])
            .build()
            .unwrap();

        assert_eq!(config.seed, 0);
        assert!(!config.gamma_diam);
        assert_eq!(config.limit, None);
        assert!(!config.temperature.is_constant());
    }

    #[test]
    fn fire_builder_requires_group_and_dt() {
        let result = FireConfigBuilder::new().dt(0.01).build();
        assert_eq!(result, Err(ConfigError::MissingParameter("group")));

        let result = FireConfigBuilder::new().group(Group::all()).build();
        assert_eq!(result, Err(ConfigError::MissingParameter("dt")));
    }

    #[test]
    fn params_convert_into_method_params() {
        let params: MethodParams = NveParams::default().limit(Limit::Unlimited).into();
        assert_eq!(
            params,
            MethodParams::Nve(NveParams {
                limit: Some(Limit::Unlimited),
                zero_force: None,
            })
        );
    }
}
