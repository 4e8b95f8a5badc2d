use anyhow::Result;
use prayerclock::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging. RUST_LOG overrides the default level.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // 2. Load the configuration from an optional file plus the environment.
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("prayerclock.toml"));
    let config = EngineConfig::load(Some(&path))?;
    info!("Configuration loaded (file: {}).", path.display());

    // 3. Wire the engine to the live provider and in-memory alerts.
    let alerts = MemoryAlertSink::new();
    let collaborators = Collaborators {
        provider: Arc::new(AladhanClient::new(&config.provider)?),
        sensor: Arc::new(NoSensor),
        alerts: Arc::new(alerts.clone()),
        store: Arc::new(MemoryPreferenceStore::new()),
        clock: Arc::new(SystemTimeSource),
    };
    let engine = PrayerClockEngine::new(config, collaborators);

    // 4. Spawn concurrent tasks to listen to the event streams.
    spawn_event_listeners(&engine);
    spawn_alert_delivery(&engine, alerts);

    // 5. Register a callback for every prayer.
    engine
        .on_prayer(None, |key, at| info!("[CALLBACK] {} at {}", key, at))
        .await;

    // 6. Fetch today's schedule, then run the engine.
    if let Err(e) = engine.refresh().await {
        warn!("Initial refresh failed: {}", e);
    }
    engine.run().await?;

    Ok(())
}

/// Spawns several tasks, each subscribing to a different event stream from the engine.
fn spawn_event_listeners(engine: &PrayerClockEngine) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            info!("[SYSTEM] => {:?}", event);
        }
    });

    let mut schedule_rx = engine.subscribe_schedule_events();
    tokio::spawn(async move {
        while let Ok(event) = schedule_rx.recv().await {
            match event {
                ScheduleEvent::Replaced { snapshot } => {
                    for key in snapshot.keys() {
                        info!("[SCHEDULE] {:<8} {}", key, snapshot.raw(key).unwrap_or("?"));
                    }
                }
                other => info!("[SCHEDULE] => {:?}", other),
            }
        }
    });

    let mut prayer_rx = engine.subscribe_prayer_events();
    tokio::spawn(async move {
        while let Ok(event) = prayer_rx.recv().await {
            info!("[PRAYER] => {:?}", event);
        }
    });

    let mut alert_rx = engine.subscribe_alert_events();
    tokio::spawn(async move {
        while let Ok(event) = alert_rx.recv().await {
            info!("[ALERTS] => {:?}", event);
        }
    });

    let mut countdown_rx = engine.subscribe_countdown_events();
    tokio::spawn(async move {
        let mut last_label = String::new();
        loop {
            match countdown_rx.recv().await {
                Ok(event) if event.state.label != last_label => {
                    info!("[COUNTDOWN] {}", event.state.label);
                    last_label = event.state.label;
                }
                Ok(_) | Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(_) => break,
            }
        }
    });
}

/// Plays the part of the operating system: delivers alerts once they are due.
fn spawn_alert_delivery(engine: &PrayerClockEngine, alerts: MemoryAlertSink) {
    let engine = engine.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            for alert in alerts.take_due(engine.now()) {
                info!("[DELIVERED] {} | {} ({})", alert.title, alert.body, alert.sound);
            }
        }
    });
}
