//! Coordinated teardown for the bridge runtime.
//!
//! The [`ShutdownCoordinator`] walks every shutdown, restart and update
//! through the same ordered phases so plugins, the protocol engine and the
//! store always quiesce in a known order. [`Scheduler`] abstracts the settle
//! delays between phases so tests can run the sequence without waiting on
//! wall-clock time.

pub mod coordinator;
pub mod scheduler;

pub use coordinator::{ResetAction, ShutdownCoordinator, ShutdownKind, ShutdownPhase};
pub use scheduler::{Scheduler, TokioScheduler};
