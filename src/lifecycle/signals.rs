//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGINT and SIGTERM
//! - Translate the first one into a cancelled interrupt token
//! - Exit immediately on the second one
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Multiple SIGTERM/SIGINT triggers forced shutdown

use tokio_util::sync::CancellationToken;

/// Exit code of a process killed by a repeated interrupt (128 + SIGINT).
pub const FORCED_EXIT_CODE: i32 = 130;

/// Token cancelled by the first SIGINT/SIGTERM.
///
/// Must be called from within a Tokio runtime.
pub fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let mut signals = match Signals::install() {
            Ok(signals) => signals,
            Err(e) => {
                tracing::error!(error = %e, "failed to install signal handlers");
                return;
            }
        };

        let name = signals.next().await;
        tracing::info!(signal = name, "interrupt received, starting graceful drain");
        trigger.cancel();

        let name = signals.next().await;
        tracing::warn!(signal = name, "second interrupt received, exiting immediately");
        std::process::exit(FORCED_EXIT_CODE);
    });

    token
}

struct Signals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl Signals {
    #[cfg(unix)]
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    #[cfg(unix)]
    async fn next(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    async fn next(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler failed");
            std::future::pending::<()>().await;
        }
        "SIGINT"
    }
}
