//! Element locator - resolves a logical target to a live node
//!
//! A [`Target`](stepwise_core_types::Target) is an ordered list of selector candidates. The
//! locator polls the document until one of them matches or the timeout budget runs out:
//! - `BudgetPolicy::Shared`: every poll round tries all candidates against one deadline
//! - `BudgetPolicy::PerCandidate`: each candidate gets `timeout / n` and is polled in turn
//!
//! The visible variant additionally requires a non-empty rendered box.

pub mod errors;
pub mod resolver;
pub mod types;

pub use errors::*;
pub use resolver::*;
pub use types::*;
