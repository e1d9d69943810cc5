mod config;
mod logging;

use std::time::Duration;

use client_core::{
    ClientError, ConnectionWatch, StatusFeed, SyncError, TransportStatus, cache_key,
};
use client_realtime::SyncRuntime;
use config::SmokeConfig;
use serde_json::json;
use tokio::time::timeout;
use tracing::{error, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    logging::init();

    let config = match SmokeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            std::process::exit(2);
        }
    };

    if let Err(err) = run(config).await {
        error!(code = err.code(), %err, "smoke run failed");
        eprintln!("Smoke run failed: {err}");
        std::process::exit(1);
    }
}

async fn run(config: SmokeConfig) -> Result<(), SyncError> {
    let runtime = SyncRuntime::new(&config.tuning);
    let feed = StatusFeed::default();
    runtime.attach_transport(feed.subscribe()).await?;

    let ready_delay = Duration::from_millis(config.ready_delay_ms);
    let readiness = runtime.spawn_readiness_task("player_id_sync", move || async move {
        tokio::time::sleep(ready_delay).await;
        Ok::<_, ClientError>("smoke-player")
    });

    let mut state_rx = runtime.connection().watch();
    for status in [TransportStatus::Joining, TransportStatus::Joined] {
        feed.publish(status)?;
    }
    if let Err(err) = wait_connected(&runtime, &mut state_rx, CONNECT_TIMEOUT).await {
        runtime.shutdown().await;
        return Err(err);
    }
    info!(
        indicator = runtime.connection_state().indicator().label(),
        "transport connected"
    );

    let waited = runtime.wait_until_ready().await?;
    let player_id = match readiness.await {
        Ok(Ok(player_id)) => player_id,
        Ok(Err(err)) => {
            warn!(code = err.code(), %err, "readiness work failed; continuing degraded");
            "anonymous"
        }
        Err(err) => {
            warn!(%err, "readiness task aborted; continuing degraded");
            "anonymous"
        }
    };
    info!(waited_ms = waited.as_millis() as u64, player_id, "boot complete");

    let key = cache_key("gamification", player_id);
    let mut fetches = 0_u32;
    for _ in 0..2 {
        runtime
            .fetch_cached(&key, || {
                fetches += 1;
                async { Ok::<_, ClientError>(json!({ "points": 0, "streak_days": 0 })) }
            })
            .await?;
    }

    println!(
        "boot waited {}ms, connection {}, backend fetches {} for 2 reads",
        waited.as_millis(),
        runtime.connection_state().indicator().label(),
        fetches
    );

    runtime.shutdown().await;
    Ok(())
}

/// Wait up to `limit` for the supervisor to report `Connected`.
async fn wait_connected(
    runtime: &SyncRuntime,
    state_rx: &mut ConnectionWatch,
    limit: Duration,
) -> Result<(), SyncError> {
    let connected = timeout(limit, state_rx.wait_for(|state| state.is_connected()))
        .await
        .is_ok_and(|waited| waited.is_ok());
    if connected {
        return Ok(());
    }

    let state = runtime.connection_state();
    warn!(?state, "transport did not connect in time");
    Err(SyncError::NotConnected { state })
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_core::SyncTuning;

    #[tokio::test(start_paused = true)]
    async fn connect_wait_gives_up_after_limit() {
        let runtime = SyncRuntime::new(&SyncTuning::default());
        let feed = StatusFeed::default();
        runtime
            .attach_transport(feed.subscribe())
            .await
            .expect("attach should work");
        let mut state_rx = runtime.connection().watch();
        feed.publish(TransportStatus::Joining).expect("publish");

        let err = wait_connected(&runtime, &mut state_rx, Duration::from_millis(200))
            .await
            .expect_err("transport never joins");
        assert!(matches!(err, SyncError::NotConnected { .. }));
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn connect_wait_returns_once_joined() {
        let runtime = SyncRuntime::new(&SyncTuning::default());
        let feed = StatusFeed::default();
        runtime
            .attach_transport(feed.subscribe())
            .await
            .expect("attach should work");
        let mut state_rx = runtime.connection().watch();
        feed.publish(TransportStatus::Joined).expect("publish");

        wait_connected(&runtime, &mut state_rx, Duration::from_secs(2))
            .await
            .expect("joined transport should connect");
        runtime.shutdown().await;
    }
}
