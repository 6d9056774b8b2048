//! Restore command - list verified entitlements

use std::path::Path;

use anyhow::Result;

use crate::ui;

pub async fn run(storage_dir: &Path, verbose: bool) -> Result<()> {
    ui::header("Restore Purchases");

    let store = super::open_store(storage_dir)?;
    let (manager, _observer) = super::build_manager(store, storage_dir, false, verbose)?;

    let restored = manager.restore().await?;
    if restored.is_empty() {
        ui::info("Nothing to restore");
        return Ok(());
    }

    for tx in &restored {
        ui::separator();
        ui::transaction(tx, verbose);
    }
    Ok(())
}
