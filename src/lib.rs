//! Stepwise: executes structured action plans against asynchronously rendered web apps
//!
//! The engine itself lives in the workspace crates (`action-locator`,
//! `action-primitives`, `action-flow`); this crate wires it to a browser and
//! exposes it through the HTTP server, the message surface and the CLI.

pub mod cli;
pub mod config;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod server;
pub mod service;
pub mod status;
pub mod surface;

pub use config::Config;
pub use errors::ServiceError;
pub use service::{plan_from_body, EngineService};
pub use status::{RunStatus, StatusBoard};
pub use surface::{MessageSurface, SurfaceRequest, SurfaceResponse};
