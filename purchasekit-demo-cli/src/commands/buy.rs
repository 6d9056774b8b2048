//! Buy command - run one purchase through the manager

use std::path::Path;

use anyhow::Result;
use purchasekit_lib::{ProductId, PurchaseOptions};
use purchasekit_manager::PurchaseOutcome;

use crate::store::SimulatedOutcome;
use crate::ui;

pub async fn run(
    storage_dir: &Path,
    product_id: &str,
    outcome: SimulatedOutcome,
    quantity: u32,
    account: bool,
    verbose: bool,
) -> Result<()> {
    ui::header(&format!("Buy {}", product_id));

    let store = super::open_store(storage_dir)?;
    store.set_next_outcome(outcome);
    let (manager, _observer) = super::build_manager(store, storage_dir, false, verbose)?;

    let product = manager.product(&ProductId::new(product_id)).await?;
    let mut options = PurchaseOptions::default().with_quantity(quantity);
    if account {
        options = options.with_app_account_token(uuid::Uuid::new_v4());
    }

    match manager.purchase_with(&product, &options).await {
        PurchaseOutcome::Success(tx) => {
            ui::transaction(&tx, verbose);
        }
        PurchaseOutcome::Pending => {
            ui::info("Run 'purchasekit-demo listen' to receive the approved transaction");
        }
        PurchaseOutcome::UserCancelled => {}
        PurchaseOutcome::Failure(err) => {
            if err.is_retryable() {
                ui::info("This failure is retryable");
            }
        }
    }

    if verbose {
        ui::separator();
        ui::json(&serde_json::to_value(manager.metrics())?);
    }
    Ok(())
}
