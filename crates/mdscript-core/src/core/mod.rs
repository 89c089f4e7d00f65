//! # Core Module
//!
//! Value types and external-collaborator boundaries for the coordinator.
//!
//! ## Overview
//!
//! Nothing in this module performs numerics. It defines what the coordinator stores and
//! forwards, and the interface of the engine that does the actual per-step work:
//!
//! - **Scheduled scalars** ([`variant`]) - Constant or time-interpolated parameters
//! - **Particle subsets** ([`group`]) - Opaque, immutable group handles
//! - **System catalog** ([`system`]) - Particle types and the resolved execution backend
//! - **Backend selector** ([`exec`]) - Serial or parallel/accelerator execution
//! - **Engine boundary** ([`stepper`]) - Stepper traits, shared handles and the factory trait
//! - **Reference engine** ([`recording`]) - A call-recording implementation of the boundary

pub mod exec;
pub mod group;
pub mod recording;
pub mod stepper;
pub mod system;
pub mod variant;
