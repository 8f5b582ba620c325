//! Lifecycle subsystem: running drivers as a host would.
//!
//! # Data Flow
//! ```text
//! Hooks (runner.rs):
//!     store notification → mpsc channel → HookRunner → driver.handle(hook)
//!     one hook at a time, each to completion
//!
//! Shutdown (shutdown.rs):
//!     trigger() → broadcast → every runner stops and hands its driver back
//! ```
//!
//! # Design Decisions
//! - A runner owns its driver; no locking around driver state
//! - Handler errors are logged and do not stop the runner
//! - Hooks still queued at shutdown are dropped

pub mod runner;
pub mod shutdown;

pub use runner::HookRunner;
pub use shutdown::Shutdown;
