//! Runs a heartbeat and a flaky worker side by side until Ctrl+C or the worker fails.
//!
//! Run with: cargo run -p uplink_runner --example basic_runner

use std::time::Duration;
use uplink_runner::Runner;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let runner = Runner::new()
        .with_named_process(
            "heartbeat",
            Box::new(|ctx| {
                Box::pin(async move {
                    let mut beats = 0u64;
                    loop {
                        tokio::select! {
                            _ = ctx.cancelled() => break,
                            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                                beats += 1;
                                tracing::info!(beats, "heartbeat");
                            }
                        }
                    }
                    Ok(())
                })
            }),
        )
        .with_app_process(|ctx| async move {
            tokio::select! {
                _ = ctx.cancelled() => Ok(()),
                _ = tokio::time::sleep(Duration::from_secs(30)) => {
                    Err(anyhow::anyhow!("worker gave up after 30 seconds"))
                }
            }
        })
        .with_closer(|| async move {
            tracing::info!("flushing buffers");
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(5));

    tracing::info!("Press Ctrl+C to trigger graceful shutdown");
    runner.run().await;
}
