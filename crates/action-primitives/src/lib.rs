//! Action primitives - node-level operations of a plan step
//!
//! This crate provides the building blocks the step dispatcher composes:
//! - click with a synthetic-event fallback when the native click is rejected
//! - type / select with the input and change notifications reactive UIs listen for
//! - explicit waits for present or visible targets, and plain pauses
//! - settle waits that prefer a mutation-quiet signal over a fixed delay

pub mod errors;
mod primitives;
pub mod types;
mod waiting;

pub use errors::*;
pub use primitives::*;
pub use types::*;
pub use waiting::*;
