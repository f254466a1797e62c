//! Injectable time source for delays and polling loops.
//!
//! Production code uses [`TokioScheduler`]; tests substitute a recording or
//! zero-delay implementation so settle delays and retry backoffs do not slow
//! the suite down.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

/// Abstraction over waiting. Everything in the bridge that sleeps goes
/// through one of these.
#[async_trait]
pub trait Scheduler: Send + Sync + Debug {
    async fn sleep(&self, duration: Duration);
}

/// Real-time scheduler backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
