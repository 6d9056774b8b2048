//! Status command - resolve entitlement status per product

use std::path::Path;

use anyhow::Result;
use purchasekit_lib::ProductId;

use crate::store::SimulatedStore;
use crate::ui;

pub async fn run(storage_dir: &Path, ids: Vec<String>, verbose: bool) -> Result<()> {
    ui::header("Entitlement Status");

    let store = super::open_store(storage_dir)?;
    let (manager, _observer) = super::build_manager(store, storage_dir, false, verbose)?;

    let resolved = match ids.as_slice() {
        [single] => {
            let id = ProductId::new(single.as_str());
            let status = manager.status(&id).await?;
            vec![(id, status)]
        }
        [] => {
            let ids: Vec<ProductId> = SimulatedStore::demo_catalog()
                .into_iter()
                .map(|product| product.id)
                .collect();
            manager.statuses(&ids).await?
        }
        many => {
            let ids: Vec<ProductId> = many.iter().map(|id| ProductId::new(id.as_str())).collect();
            manager.statuses(&ids).await?
        }
    };

    for (id, status) in &resolved {
        println!("  {:<12} {}", id.to_string(), ui::status_badge(status));
        if verbose {
            if let Some(tx) = status.transaction() {
                ui::transaction(tx, false);
            }
        }
    }
    Ok(())
}
