//! # Workflows Module
//!
//! High-level entry points that drive a [`SimulationContext`](crate::engine::context::SimulationContext)
//! from a declarative description instead of individual calls.
//!
//! ## Architecture
//!
//! - **Script Workflow** ([`script`]) - An ordered list of configuration commands whose
//!   objects are referred to by name. Validated as a whole before the first command runs,
//!   then executed in order, with a report of what every run had registered.

pub mod script;
