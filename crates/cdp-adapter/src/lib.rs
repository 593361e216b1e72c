//! Stepwise live-document adapter.
//!
//! Higher layers never talk to a browser directly; they drive a [`Document`], the port through
//! which nodes are queried and poked. Two implementations live here:
//! - [`chromium::ChromiumDocument`]: a page of a real Chromium instance, driven over CDP
//! - [`memory::MemoryDocument`]: a scripted, in-memory document used by tests

pub mod chromium;
pub mod config;
mod document;
pub mod error;
pub mod memory;

pub use chromium::{BrowserSession, ChromiumDocument};
pub use config::{detect_chrome_executable, CdpConfig};
pub use document::{Document, DomEvent, NodeHandle, SettleSignal};
pub use error::{AdapterError, AdapterErrorKind};
