//! Timeout enforcement.
//!
//! Every external call has a deadline. A call is raced against its
//! cancellation token and its deadline; whichever resolves first wins and the
//! call's future is dropped.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a bounded call did not produce its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// The earlier of an inherited deadline and `now + limit`.
pub fn tighter_deadline(inherited: Option<Instant>, limit: Duration) -> Instant {
    let local = Instant::now() + limit;
    match inherited {
        Some(deadline) if deadline < local => deadline,
        _ => local,
    }
}

/// Run `fut` until it completes, `cancel` fires, or `deadline` passes.
///
/// Cancellation takes priority over completion when both are ready.
pub async fn run_bounded<F>(
    cancel: &CancellationToken,
    deadline: Option<Instant>,
    fut: F,
) -> Result<F::Output, Interrupted>
where
    F: Future,
{
    let expiry = async {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        _ = expiry => Err(Interrupted::DeadlineExceeded),
        output = fut => Ok(output),
    }
}
