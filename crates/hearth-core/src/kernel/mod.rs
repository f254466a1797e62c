//! # Hearth Core Kernel
//!
//! The `kernel` module is the heart of the bridge: it bootstraps the
//! application context, wires the subsystem components together, and runs
//! them through a coordinated lifecycle.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Application Bootstrapping**: the [`Hearth`](bootstrap::Hearth)
//!   context from the `bootstrap` submodule constructs every subsystem,
//!   initializes and starts them in dependency order, and drives the run
//!   loop until a terminal event arrives.
//! - **Component Lifecycle**: the [`KernelComponent`](component::KernelComponent)
//!   trait plus the [`DependencyRegistry`](component::DependencyRegistry)
//!   for shared component access, both in the `component` submodule.
//! - **Core Constants**: storage namespaces, timing defaults, and
//!   application identity via the `constants` submodule.
//! - **Error Handling**: the aggregated [`Error`](error::Error) type and
//!   `Result` alias in the `error` submodule.

pub mod bootstrap;
pub mod component;
pub mod constants;
pub mod error;

pub use bootstrap::{Hearth, HearthConfig, RunOutcome};
pub use component::{DependencyRegistry, KernelComponent};
pub use error::{Error, Result};

// Test module declaration
#[cfg(test)]
mod tests;
