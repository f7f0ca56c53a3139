//! Shared provider traits for dependency injection.
//!
//! By abstracting waiting behind a trait, the retry loop can be tested
//! without real delays and with its schedule observable.

use async_trait::async_trait;
use std::time::Duration;

/// Trait for suspending the current task.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Default sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
