use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

use config::Config;
use dbus_interface::RollcallService;
use rollcall_core::OnnxDetector;
use rollcall_store::{AttendanceLog, FaceRegistry, JsonFileStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = Config::from_env();

    // Fail fast: the detector and store must be usable before we take
    // the bus name.
    let detector = OnnxDetector::load(&config.model_path_str())
        .with_context(|| format!("loading detector model {}", config.model_path.display()))?;

    let store = JsonFileStore::open(&config.store_path)
        .with_context(|| format!("opening store {}", config.store_path.display()))?;
    let registry = FaceRegistry::new(store.clone());
    let log = AttendanceLog::new(store);

    let engine = engine::spawn_engine(detector, registry, log, config.similarity_threshold);

    let _connection = zbus::connection::Builder::session()?
        .name("org.freedesktop.Rollcall1")?
        .serve_at("/org/freedesktop/Rollcall1", RollcallService::new(engine))?
        .build()
        .await
        .context("acquiring D-Bus name org.freedesktop.Rollcall1")?;

    tracing::info!(
        store = %config.store_path.display(),
        threshold = config.similarity_threshold,
        "rollcalld ready"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("rollcalld shutting down");

    Ok(())
}
