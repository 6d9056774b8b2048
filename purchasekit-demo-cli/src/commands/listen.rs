//! Listen command - run the update listener until interrupted

use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use crate::ui;

pub async fn run(storage_dir: &Path, duration_secs: Option<u64>, verbose: bool) -> Result<()> {
    ui::header("Listening for Store Updates");

    let store = super::open_store(storage_dir)?;
    let pending = store.pending_updates()?;
    let (manager, _observer) = super::build_manager(store, storage_dir, true, verbose)?;

    if pending > 0 {
        ui::info(&format!("{} queued update(s) will be delivered", pending));
    }
    match duration_secs {
        Some(secs) => ui::info(&format!("Stopping after {}s", secs)),
        None => ui::info("Press Ctrl+C to stop"),
    }
    ui::separator();

    let deadline = async {
        match duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = deadline => {}
    }

    manager.stop_listening();
    ui::separator();
    let metrics = manager.metrics();
    ui::key_value("Updates processed", &metrics.listener_events.to_string());
    ui::key_value("Finalized", &metrics.transactions_finalized.to_string());
    if verbose {
        ui::json(&serde_json::to_value(&metrics)?);
    }
    Ok(())
}
