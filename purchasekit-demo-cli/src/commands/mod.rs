//! CLI command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use purchasekit_lib::{EntitlementStatus, ManagerConfig, ProductId, PurchaseKitError, Transaction};
use purchasekit_manager::{PurchaseManager, PurchaseObserver};

use crate::store::SimulatedStore;
use crate::ui;

pub mod buy;
pub mod init;
pub mod listen;
pub mod products;
pub mod restore;
pub mod simulate;
pub mod status;

/// Path of the optional manager configuration file.
pub fn config_path(storage_dir: &Path) -> PathBuf {
    storage_dir.join("config.json")
}

/// Load `config.json` from the storage directory, or defaults if it is absent.
pub fn load_config(storage_dir: &Path) -> Result<ManagerConfig> {
    let path = config_path(storage_dir);
    if !path.exists() {
        return Ok(ManagerConfig::default());
    }
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    ManagerConfig::from_json_str(&json).with_context(|| format!("Invalid config in {}", path.display()))
}

/// Open the simulated store, failing if `init` has not been run.
pub fn open_store(storage_dir: &Path) -> Result<Arc<SimulatedStore>> {
    let store = SimulatedStore::new(storage_dir);
    if !store.is_initialized() {
        anyhow::bail!("No simulated store found. Run 'purchasekit-demo init' first.");
    }
    Ok(Arc::new(store))
}

/// Build a manager over the store with a console observer attached.
///
/// The listener only runs when `listen` is true, whatever the config says.
pub fn build_manager(
    store: Arc<SimulatedStore>,
    storage_dir: &Path,
    listen: bool,
    verbose: bool,
) -> Result<(PurchaseManager, Arc<ConsoleObserver>)> {
    let config = load_config(storage_dir)?.with_start_listener(listen);
    let manager = PurchaseManager::builder(store)
        .config(config)
        .build()
        .context("Failed to create purchase manager")?;
    let observer = Arc::new(ConsoleObserver { verbose });
    manager.register_observer(&observer);
    Ok((manager, observer))
}

/// Observer that prints every notification.
pub struct ConsoleObserver {
    verbose: bool,
}

impl PurchaseObserver for ConsoleObserver {
    fn on_purchase_complete(&self, transaction: &Transaction) {
        ui::success(&format!(
            "Purchase complete: {} ({})",
            transaction.product_id, transaction.id
        ));
        if self.verbose {
            ui::transaction(transaction, true);
        }
    }

    fn on_purchase_failed(&self, error: &PurchaseKitError) {
        ui::error(&format!("Purchase failed [{}]: {}", error.code() as i32, error));
    }

    fn on_purchase_cancelled(&self) {
        ui::info("Purchase cancelled");
    }

    fn on_purchase_pending(&self) {
        ui::warning("Purchase pending approval");
    }

    fn on_restored(&self, transactions: &[Transaction]) {
        ui::success(&format!("Restored {} purchase(s)", transactions.len()));
    }

    fn on_status_updated(&self, status: &EntitlementStatus, product_id: &ProductId) {
        if self.verbose {
            ui::info(&format!("Status of {}: {}", product_id, status.label()));
        }
    }
}
