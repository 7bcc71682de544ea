//! Invigil - Cooperative Process-Cancellation Core
//!
//! Invigil is the cancellation subsystem of a simulated identity-verification
//! and exam-proctoring console: an in-memory registry tracking every
//! long-running simulated operation, with per-process and bulk cancellation,
//! idempotent teardown, and synchronous multi-listener notification.
//!
//! # Architecture
//!
//! - `registry` - the process registry, cancellable timers, and in-flight
//!   call primitives
//! - `features` - per-feature bindings (biometric verification, fraud
//!   full-scan, exam-hall monitoring) following the registration/teardown
//!   contract
//! - `services` - the mock service boundary producing simulated outcomes and
//!   the in-memory persistence stand-in
//! - `presentation` - the live process panel, notice log, and async
//!   confirmation gate
//! - `app` - application context wiring everything together
//! - `config` - TOML-backed timing, threshold, and simulation settings

pub mod app;
pub mod config;
pub mod features;
pub mod presentation;
pub mod registry;
pub mod services;

// Re-export key types
pub use app::App;
pub use config::InvigilConfig;
pub use registry::{
    CancellableTimer, ProcessId, ProcessKind, ProcessRegistry, ProcessSnapshot, RegistryError,
    TimerOutcome,
};

/// Invigil version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
