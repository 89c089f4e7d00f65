//! # Engine Module
//!
//! The stateful coordinator: who is the current integrator, which methods and forces are
//! enabled, and how both are reconciled into the active stepper before a run.
//!
//! ## Architecture
//!
//! - **Context** ([`context`]) - `SimulationContext`, the owner of every tracked object
//! - **Integrators** ([`integrator`]) - Standard stepping and FIRE minimization modes
//! - **Methods** ([`method`]) - NVT, NPT, NVE and Brownian integration methods
//! - **Forces** ([`force`]) - Enable/disable membership of external force computes
//! - **Synchronizer** ([`sync`]) - Pre-run reconciliation and run execution
//! - **Configuration** ([`config`]) - Construction records, builders and parameter updates
//! - **Backend switch** ([`backend`]) - Serial vs. parallel stepper factory selection
//! - **Progress** ([`progress`]) - Events reported to an optional front-end callback
//! - **Error Handling** ([`error`]) - `IntegrateError`
//!
//! All objects live in slot-map arenas owned by the context and are addressed by the typed
//! keys in [`ids`]. Integrators never own forces or methods; they are handed a fresh view of
//! the enabled sets at the start of every run.

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod force;
pub mod ids;
pub mod integrator;
pub mod method;
pub mod progress;
pub mod sync;
