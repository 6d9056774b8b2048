//! Init command - seed the simulated store

use std::path::Path;

use anyhow::Result;
use purchasekit_lib::ManagerConfig;

use crate::store::SimulatedStore;
use crate::ui;

pub async fn run(storage_dir: &Path, write_config: bool, verbose: bool) -> Result<()> {
    ui::header("Initialize Simulated Store");

    let store = SimulatedStore::new(storage_dir);
    let existed = store.is_initialized();
    let catalog = SimulatedStore::demo_catalog();
    let count = catalog.len();
    store.seed_catalog(catalog)?;

    if existed {
        ui::info("Store already existed; catalog refreshed, transactions kept");
    }
    ui::success(&format!("Seeded {} products", count));
    ui::key_value("State file", &store.state_path().display().to_string());

    if write_config {
        let path = super::config_path(storage_dir);
        let json = serde_json::to_string_pretty(&ManagerConfig::default())?;
        std::fs::write(&path, json)?;
        ui::key_value("Config", &path.display().to_string());
    }

    if verbose {
        ui::separator();
        ui::info("Try: purchasekit-demo buy pro_plan");
    }
    Ok(())
}
