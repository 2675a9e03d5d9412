//! A concurrent application runner that manages long-running processes with graceful shutdown.
//!
//! This runner orchestrates multiple named app processes and cleanup functions, providing:
//! - Concurrent execution of multiple processes
//! - Graceful shutdown on SIGTERM/SIGINT
//! - Configurable cleanup timeout
//! - Automatic cleanup execution regardless of process outcome
//!
//! # Example
//!
//! ```no_run
//! use uplink_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let runner = Runner::new()
//!         .with_app_process(|ctx| async move {
//!             loop {
//!                 tokio::select! {
//!                     _ = ctx.cancelled() => {
//!                         tracing::info!("Process stopping gracefully");
//!                         break;
//!                     }
//!                     _ = tokio::time::sleep(Duration::from_secs(1)) => {
//!                         tracing::info!("Process working...");
//!                     }
//!                 }
//!             }
//!             Ok(())
//!         })
//!         .with_closer(|| async move {
//!             tracing::info!("Cleaning up resources");
//!             Ok(())
//!         })
//!         .with_closer_timeout(Duration::from_secs(5));
//!
//!     runner.run().await;
//! }
//! ```

use anyhow::anyhow;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Type alias for an app process function.
/// Takes a cancellation token and returns a future that resolves to Result<(), anyhow::Error>
pub type AppProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>
        + Send,
>;

/// Type alias for a closer function.
/// Returns a future that resolves to Result<(), anyhow::Error>
pub type Closer =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>> + Send>;

/// A concurrent application runner that manages long-running processes with graceful shutdown.
///
/// - App processes run concurrently until one fails or a shutdown signal is received
/// - Closers execute afterward, regardless of process outcome
/// - Signal handling (SIGTERM/SIGINT) implements graceful shutdown
pub struct Runner {
    app_processes: Vec<(String, AppProcess)>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Creates a new Runner with a 10 second closer timeout and nothing to run.
    pub fn new() -> Self {
        Self {
            app_processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Adds an anonymous app process to the runner.
    ///
    /// App processes run concurrently. If any process returns an error,
    /// all processes are cancelled and closers are executed.
    pub fn with_app_process<F, Fut>(self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        let name = format!("process_{}", self.app_processes.len());
        self.with_named_process(name, Box::new(|token| Box::pin(process(token))))
    }

    /// Adds an already boxed app process under a name used in logs and errors.
    pub fn with_named_process(mut self, name: impl Into<String>, process: AppProcess) -> Self {
        self.app_processes.push((name.into(), process));
        self
    }

    /// Adds a closer to the runner.
    ///
    /// Closers are executed after all app processes have stopped,
    /// regardless of whether they stopped due to error or cancellation.
    /// All closers will attempt to execute even if some fail.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    /// Sets the timeout for executing closers.
    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Sets a custom cancellation token, allowing external control over shutdown.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Runs everything, then exits the application.
    ///
    /// Exit code is 1 when any process failed, 0 otherwise.
    pub async fn run(self) {
        Self::spawn_signal_handlers(self.cancellation_token.clone());

        match self.run_until_stopped().await {
            Ok(()) => {
                info!("Application exiting normally");
                std::process::exit(0);
            }
            Err(err) => {
                error!("Application exiting with error: {:#}", err);
                std::process::exit(1);
            }
        }
    }

    /// Runs all app processes until the token is cancelled or one of them
    /// fails, then runs the closers.
    ///
    /// Returns the first process error, if any. Does not install signal
    /// handlers.
    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        let token = self.cancellation_token;
        let closer_timeout = self.closer_timeout;
        let closers = self.closers;
        let mut join_set = JoinSet::new();

        for (name, process) in self.app_processes {
            let process_token = token.clone();
            join_set.spawn(async move {
                debug!(process = %name, "starting app process");
                let result = process(process_token).await;
                (name, result)
            });
        }

        let mut first_error = None;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok((name, Ok(()))) => {
                    debug!(process = %name, "App process completed successfully");
                }
                Ok((name, Err(err))) => {
                    if !token.is_cancelled() {
                        error!(process = %name, "App process error: {:#}", err);
                        first_error = Some(err.context(format!("process {name} failed")));
                        token.cancel();
                    }
                }
                Err(err) => {
                    error!("App process panicked: {}", err);
                    if !token.is_cancelled() {
                        first_error = Some(anyhow!("app process panicked: {err}"));
                        token.cancel();
                    }
                }
            }

            if token.is_cancelled() {
                break;
            }
        }

        // Remaining processes observe the cancelled token; give them the
        // chance to wind down before forcing them
        while let Ok(Some(result)) =
            tokio::time::timeout(closer_timeout, join_set.join_next()).await
        {
            if let Ok((name, Err(err))) = result {
                debug!(process = %name, "App process stopped with error during shutdown: {:#}", err);
            }
        }
        join_set.shutdown().await;

        if !closers.is_empty() {
            info!("Running closers with timeout of {:?}", closer_timeout);

            match tokio::time::timeout(closer_timeout, Self::run_closers(closers)).await {
                Ok(()) => info!("All closers completed"),
                Err(_) => error!("Closers timed out after {:?}", closer_timeout),
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn spawn_signal_handlers(token: CancellationToken) {
        let signal_token = token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    signal_token.cancel();
                }
                Err(err) => {
                    error!("Error setting up signal handler: {}", err);
                }
            }
        });

        #[cfg(unix)]
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("Received SIGTERM signal");
                    token.cancel();
                }
                Err(err) => {
                    error!("Error setting up SIGTERM handler: {}", err);
                }
            }
        });
    }

    /// Runs all closers concurrently.
    async fn run_closers(closers: Vec<Closer>) {
        let mut closer_set = JoinSet::new();

        for closer in closers {
            closer_set.spawn(async move { closer().await });
        }

        while let Some(result) = closer_set.join_next().await {
            match result {
                Ok(Ok(())) => debug!("Closer completed successfully"),
                Ok(Err(err)) => error!("Closer error: {:#}", err),
                Err(err) => error!("Closer panicked: {}", err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    fn wait_for_cancel() -> AppProcess {
        Box::new(|ctx| {
            Box::pin(async move {
                ctx.cancelled().await;
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn test_cancellation_stops_processes_and_runs_closers() {
        // Arrange
        let closer_called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&closer_called);
        let token = CancellationToken::new();

        let runner = Runner::new()
            .with_named_process("first", wait_for_cancel())
            .with_named_process("second", wait_for_cancel())
            .with_closer(move || async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .with_cancellation_token(token.clone())
            .with_closer_timeout(Duration::from_secs(5));

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        // Act
        let result = tokio::time::timeout(Duration::from_secs(5), runner.run_until_stopped())
            .await
            .unwrap();

        // Assert
        assert!(result.is_ok());
        assert!(closer_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failing_process_cancels_the_rest() {
        // Arrange
        let stopped = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&stopped);

        let runner = Runner::new()
            .with_named_process(
                "healthy",
                Box::new(move |ctx| {
                    Box::pin(async move {
                        ctx.cancelled().await;
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                }),
            )
            .with_named_process(
                "broken",
                Box::new(|_ctx| Box::pin(async { Err(anyhow!("boom")) })),
            );

        // Act
        let result = tokio::time::timeout(Duration::from_secs(5), runner.run_until_stopped())
            .await
            .unwrap();

        // Assert
        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("process broken failed"));
        assert!(format!("{:#}", err).contains("boom"));
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_anonymous_processes_get_generated_names() {
        let runner = Runner::new()
            .with_app_process(|_ctx| async { Ok(()) })
            .with_app_process(|_ctx| async { Err(anyhow!("late failure")) });

        let result = runner.run_until_stopped().await;

        assert!(format!("{:#}", result.unwrap_err()).contains("process_1"));
    }

    #[tokio::test]
    async fn test_closers_all_run_even_when_one_fails() {
        let ran = Arc::new(AtomicUsize::new(0));
        let first = Arc::clone(&ran);
        let second = Arc::clone(&ran);

        let closers: Vec<Closer> = vec![
            Box::new(move || {
                Box::pin(async move {
                    first.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow!("flush failed"))
                })
            }),
            Box::new(move || {
                Box::pin(async move {
                    second.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            }),
        ];

        Runner::run_closers(closers).await;

        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_closer_times_out() {
        let token = CancellationToken::new();
        token.cancel();

        let runner = Runner::new()
            .with_closer(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .with_cancellation_token(token)
            .with_closer_timeout(Duration::from_millis(50));

        let result = tokio::time::timeout(Duration::from_secs(5), runner.run_until_stopped())
            .await
            .unwrap();

        assert!(result.is_ok());
    }
}
