//! Local work performed by the terminal node.

use std::time::Duration;

use crate::context::ExecutionContext;
use crate::resilience::timeouts::Interrupted;

/// Emulated unit of work: a fixed, cancellable delay.
#[derive(Debug, Clone, Copy)]
pub struct LocalWork {
    delay: Duration,
}

impl LocalWork {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait out the delay unless `ctx` is cancelled or expires first.
    pub async fn perform(&self, ctx: &ExecutionContext) -> Result<(), Interrupted> {
        ctx.run(tokio::time::sleep(self.delay)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_work_takes_configured_delay() {
        let start = tokio::time::Instant::now();
        LocalWork::new(Duration::from_millis(100))
            .perform(&ExecutionContext::root())
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_cancelled_request_stops_work() {
        let ctx = ExecutionContext::root();
        ctx.cancel();
        let out = LocalWork::new(Duration::from_secs(60)).perform(&ctx).await;
        assert_eq!(out, Err(Interrupted::Cancelled));
    }
}
