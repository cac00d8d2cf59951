//! Shutdown coordination for telemetry teardown.
//!
//! Every exporter pipeline registers one teardown callback. Calling
//! [`ShutdownRegistry::shutdown`] runs all of them in registration order,
//! keeps going past failures, and empties the registry so later calls are
//! no-ops.

use std::error::Error as StdError;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;
type Teardown = Box<dyn FnOnce() -> Result<(), BoxError> + Send>;

/// One failed teardown callback.
#[derive(Debug)]
pub struct TeardownFailure {
    /// Name the callback was registered under.
    pub component: String,
    /// The error it returned.
    pub source: BoxError,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.component, self.source)
    }
}

/// Composite error of every failed teardown callback, in registration order.
#[derive(Debug, Error)]
#[error("{}", render(.failures))]
pub struct ShutdownError {
    failures: Vec<TeardownFailure>,
}

fn render(failures: &[TeardownFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl ShutdownError {
    pub fn failures(&self) -> &[TeardownFailure] {
        &self.failures
    }
}

/// Ordered registry of teardown callbacks.
#[derive(Default)]
pub struct ShutdownRegistry {
    callbacks: Mutex<Vec<(String, Teardown)>>,
}

impl ShutdownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback to run on shutdown.
    pub fn register<F, E>(&self, component: impl Into<String>, teardown: F)
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Into<BoxError>,
    {
        let teardown: Teardown = Box::new(move || teardown().map_err(Into::into));
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((component.into(), teardown));
    }

    /// Number of callbacks still pending.
    pub fn len(&self) -> usize {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every registered callback exactly once.
    ///
    /// The registry is drained before any callback runs, so a concurrent or
    /// repeated call sees an empty registry and returns `Ok(())`.
    pub fn shutdown(&self) -> Result<(), ShutdownError> {
        let callbacks = std::mem::take(
            &mut *self
                .callbacks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        let mut failures = Vec::new();
        for (component, teardown) in callbacks {
            match teardown() {
                Ok(()) => tracing::debug!(component = %component, "teardown complete"),
                Err(source) => {
                    tracing::warn!(component = %component, error = %source, "teardown failed");
                    failures.push(TeardownFailure { component, source });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ShutdownError { failures })
        }
    }
}

impl fmt::Debug for ShutdownRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownRegistry")
            .field("pending", &self.len())
            .finish()
    }
}
