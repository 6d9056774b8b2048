//! Products command - show the catalog

use std::path::Path;

use anyhow::Result;
use purchasekit_lib::ProductId;

use crate::ui;

pub async fn run(storage_dir: &Path, ids: Vec<String>, verbose: bool) -> Result<()> {
    ui::header("Products");

    let store = super::open_store(storage_dir)?;
    let ids: Vec<ProductId> = if ids.is_empty() {
        crate::store::SimulatedStore::demo_catalog()
            .into_iter()
            .map(|product| product.id)
            .collect()
    } else {
        ids.into_iter().map(ProductId::from).collect()
    };
    let (manager, _observer) = super::build_manager(store, storage_dir, false, verbose)?;

    let mut products = manager.products(&ids).await?;
    products.sort_by(|a, b| a.id.cmp(&b.id));
    if products.is_empty() {
        ui::info("No matching products");
        return Ok(());
    }

    for product in &products {
        ui::product(product);
    }

    let missing: Vec<_> = ids
        .iter()
        .filter(|id| !products.iter().any(|p| &p.id == *id))
        .map(|id| id.to_string())
        .collect();
    if !missing.is_empty() {
        ui::warning(&format!("Not in catalog: {}", missing.join(", ")));
    }
    Ok(())
}
