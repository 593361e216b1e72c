//! Shared primitives for the Stepwise action plan engine.
//!
//! The plan model lives here so every layer (locator, primitives, flow, service)
//! agrees on what a step is:
//! - [`LocatorCandidate`] / [`Target`]: ordered selector fallbacks for one logical element
//! - [`Step`]: one typed instruction, carrying only the fields its kind needs
//! - [`ActionPlan`]: the immutable, ordered list a single run consumes
//! - [`ExecutionResult`]: the caller-facing outcome of a run
//! - [`wire`]: the JSON format produced by external plan generators

mod errors;
mod locator;
mod plan;
mod result;
mod step;
pub mod wire;

pub use errors::PlanError;
pub use locator::{LocatorCandidate, SelectorMode, Target};
pub use plan::{ActionPlan, PlanEntry};
pub use result::ExecutionResult;
pub use step::{Step, StepKind, DEFAULT_PAUSE_MS, DEFAULT_TIMEOUT_MS};
