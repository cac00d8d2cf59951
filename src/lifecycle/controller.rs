//! Process lifecycle controller.
//!
//! Drives one node through
//! `Starting → Listening → Draining | Failed → Stopped`:
//!
//! - `Starting`: build telemetry, install logging, build the node, bind.
//!   A telemetry failure goes straight to `Failed`; no listener is opened.
//! - `Listening`: the server runs on its own task while the controller
//!   races it against the interrupt token.
//! - `Draining`: new connections are refused and in-flight requests get up
//!   to `drain_timeout_secs` to finish.
//! - `Stopped`: the root request context is cancelled and telemetry is
//!   flushed and shut down. Every error met on the way is merged into the
//!   returned [`LifecycleError`].

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::chain::ForwardError;
use crate::config::NodeConfig;
use crate::context::ExecutionContext;
use crate::http::NodeServer;
use crate::lifecycle::shutdown::ShutdownError;
use crate::lifecycle::startup;
use crate::observability::{DefaultExporters, ExporterFactory, LoggingError, PipelineError, Telemetry};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("telemetry startup failed: {0}")]
    Startup(#[from] PipelineError),

    #[error("logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error("node setup failed: {0}")]
    Node(#[from] ForwardError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("listener failed: {0}")]
    Listener(#[source] std::io::Error),

    #[error("drain did not finish within {0:?}")]
    DrainTimeout(Duration),

    #[error("telemetry teardown failed: {0}")]
    Teardown(#[from] ShutdownError),

    #[error("background task failed: {0}")]
    Task(#[from] JoinError),

    #[error("{}", join_lines(.0))]
    Multiple(Vec<LifecycleError>),
}

fn join_lines(errors: &[LifecycleError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl LifecycleError {
    /// Collapse collected errors into one outcome, preserving order.
    pub fn merge(mut errors: Vec<LifecycleError>) -> Result<(), LifecycleError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(LifecycleError::Multiple(errors)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Listening,
    Draining,
    Failed,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Listening => "listening",
            LifecycleState::Draining => "draining",
            LifecycleState::Failed => "failed",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Runs one node from startup to teardown.
pub struct Controller<F = DefaultExporters> {
    config: NodeConfig,
    exporters: F,
    interrupt: CancellationToken,
    listener: Option<TcpListener>,
    install_logging: bool,
    state: LifecycleState,
}

impl Controller<DefaultExporters> {
    /// Controller using the production exporters, stopped by `interrupt`.
    pub fn new(config: NodeConfig, interrupt: CancellationToken) -> Self {
        let exporters = DefaultExporters::from(&config.telemetry);
        Self {
            config,
            exporters,
            interrupt,
            listener: None,
            install_logging: true,
            state: LifecycleState::Starting,
        }
    }
}

impl<F> Controller<F>
where
    F: ExporterFactory + Clone + Send + 'static,
{
    pub fn with_exporters<G>(self, exporters: G) -> Controller<G>
    where
        G: ExporterFactory + Clone + Send + 'static,
    {
        Controller {
            config: self.config,
            exporters,
            interrupt: self.interrupt,
            listener: self.listener,
            install_logging: self.install_logging,
            state: self.state,
        }
    }

    /// Serve on an already bound listener instead of binding
    /// `listener.bind_address`.
    pub fn with_listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Whether to install the process-wide log subscriber (on by default).
    pub fn install_logging(mut self, install: bool) -> Self {
        self.install_logging = install;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    fn transition(&mut self, next: LifecycleState) {
        tracing::info!(
            service = %self.config.service_name,
            from = %self.state,
            to = %next,
            "lifecycle transition"
        );
        self.state = next;
    }

    /// Run the node until it is interrupted or its listener fails.
    pub async fn run(&mut self) -> Result<(), LifecycleError> {
        tracing::info!(
            service = %self.config.service_name,
            state = %self.state,
            terminal = self.config.is_terminal(),
            bind_address = %self.config.listener.bind_address,
            "node starting"
        );

        let telemetry = match startup::build_telemetry(&self.config, &self.exporters).await {
            Ok(telemetry) => telemetry,
            Err(err) => {
                tracing::error!(error = %err, "telemetry startup failed");
                self.transition(LifecycleState::Failed);
                self.transition(LifecycleState::Stopped);
                return Err(err);
            }
        };

        let root = ExecutionContext::root();
        let (server, listener) = match self.prepare(&telemetry, &root).await {
            Ok(prepared) => prepared,
            Err(err) => {
                tracing::error!(error = %err, "node startup failed");
                self.transition(LifecycleState::Failed);
                let mut errors = vec![err];
                if let Err(teardown) = teardown(telemetry).await {
                    errors.push(teardown);
                }
                self.transition(LifecycleState::Stopped);
                return LifecycleError::merge(errors);
            }
        };

        self.transition(LifecycleState::Listening);
        let drain = CancellationToken::new();
        let mut server_task = tokio::spawn(server.run(listener, drain.clone()));

        enum Race {
            ListenerExited(Result<std::io::Result<()>, JoinError>),
            Interrupted,
        }

        let interrupt = self.interrupt.clone();
        let race = tokio::select! {
            joined = &mut server_task => Race::ListenerExited(joined),
            () = interrupt.cancelled() => Race::Interrupted,
        };

        let mut errors = Vec::new();
        match race {
            Race::ListenerExited(joined) => match listener_outcome(joined) {
                Ok(()) => {
                    tracing::info!("listener closed");
                    self.transition(LifecycleState::Draining);
                }
                Err(err) => {
                    tracing::error!(error = %err, "listener failed");
                    self.transition(LifecycleState::Failed);
                    errors.push(err);
                }
            },
            Race::Interrupted => {
                self.transition(LifecycleState::Draining);
                drain.cancel();
                if let Err(err) = self.drain(&mut server_task).await {
                    tracing::warn!(error = %err, "drain incomplete");
                    errors.push(err);
                }
            }
        }

        // Interrupts work still running after the drain window.
        root.cancel();

        if let Err(err) = teardown(telemetry).await {
            tracing::warn!(error = %err, "telemetry teardown incomplete");
            errors.push(err);
        }

        self.transition(LifecycleState::Stopped);
        LifecycleError::merge(errors)
    }

    async fn prepare(
        &mut self,
        telemetry: &Telemetry,
        root: &ExecutionContext,
    ) -> Result<(NodeServer, TcpListener), LifecycleError> {
        if self.install_logging {
            startup::install_logging(&self.config, telemetry)?;
        }
        startup::log_telemetry(&self.config, telemetry);

        let server = NodeServer::new(&self.config, telemetry.clone(), root.clone())?;
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => startup::bind_listener(&self.config.listener.bind_address).await?,
        };
        Ok((server, listener))
    }

    async fn drain(&self, server_task: &mut JoinHandle<std::io::Result<()>>) -> Result<(), LifecycleError> {
        let Some(limit) = self.config.lifecycle.drain_timeout() else {
            return listener_outcome(server_task.await);
        };

        match tokio::time::timeout(limit, &mut *server_task).await {
            Ok(joined) => listener_outcome(joined),
            Err(_) => {
                server_task.abort();
                Err(LifecycleError::DrainTimeout(limit))
            }
        }
    }
}

fn listener_outcome(joined: Result<std::io::Result<()>, JoinError>) -> Result<(), LifecycleError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(LifecycleError::Listener(e)),
        Err(e) => Err(LifecycleError::Task(e)),
    }
}

/// Flush and shut down telemetry on a blocking thread.
pub async fn teardown(telemetry: Telemetry) -> Result<(), LifecycleError> {
    tokio::task::spawn_blocking(move || telemetry.shutdown()).await??;
    Ok(())
}
