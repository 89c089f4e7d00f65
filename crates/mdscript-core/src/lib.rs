//! # mdscript Core Library
//!
//! The integration-mode and method lifecycle coordinator of a particle simulation scripting
//! layer. It decides, for every forward-time-stepping run, which top-level stepper is active,
//! which per-group integration methods and force contributions feed it, and how time-varying
//! scalar parameters are threaded into that stepper.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same three-layer split throughout:
//!
//! - **[`core`]: The Boundary.** Value types the coordinator stores and forwards (`Variant`,
//!   `Group`, `SystemDefinition`) and the traits describing the external numerical engine
//!   (`IntegratorStepper`, `MethodStepper`, `ForceCompute`, `StepperFactory`). A recording
//!   engine implementing those traits ships alongside for dry runs and tests.
//!
//! - **[`engine`]: The Logic Core.** The explicit `SimulationContext` that owns the enabled
//!   sets of forces and methods and the single "current integrator" slot, together with the
//!   run synchronizer that reconciles them into the active stepper before each run.
//!
//! - **[`workflows`]: The Public API.** Executes a declarative configuration script against a
//!   context and reports what every run was handed.

pub mod core;
pub mod engine;
pub mod workflows;
