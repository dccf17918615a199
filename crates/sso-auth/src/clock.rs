//! Injectable time source
//!
//! The device-flow poll loop blocks for provider-controlled intervals
//! and must enforce a wall-clock deadline. Both go through this trait
//! so tests can simulate elapsed time without real waiting.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Time source used by the poll loop.
#[allow(async_fn_in_trait)]
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

/// Real wall clock backed by tokio's timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
