//! Plan execution layer
//!
//! Turns an [`ActionPlan`](stepwise_core_types::ActionPlan) into side effects on a live document:
//! - [`StepDispatcher`] maps one typed step onto the primitive (or workflow) it performs
//! - [`ObjectWorkflow`] opens the creation form for an object through the app launcher,
//!   with fallbacks at each stage
//! - [`PlanExecutor`] runs steps strictly in order with inter-step pacing and stops at the
//!   first failure, reporting its 1-based index

pub mod dispatcher;
pub mod errors;
pub mod executor;
pub mod types;
pub mod workflow;

pub use dispatcher::{StepDispatcher, StepOutcome};
pub use errors::{FlowError, WorkflowStage};
pub use executor::{DefaultPlanExecutor, PlanExecutor};
pub use types::{
    execution_result, EngineConfig, NoopObserver, PlanReport, RunObserver, SkippedEntry,
    StepRecord, WorkflowConfig,
};
pub use workflow::{CreationPath, ObjectWorkflow, ResultMatch, WorkflowReport};
