//! Storefront-side events: renewals and revocations
//!
//! These only change the simulated store. The resulting updates are
//! delivered the next time `listen` runs.

use std::path::Path;

use anyhow::Result;
use purchasekit_lib::{ProductId, TransactionId};

use crate::ui;

pub async fn renew(storage_dir: &Path, product_id: &str, unverified: bool, verbose: bool) -> Result<()> {
    ui::header(&format!("Renew {}", product_id));

    let store = super::open_store(storage_dir)?;
    let renewal = store.renew(&ProductId::new(product_id), !unverified)?;

    ui::success("Renewal queued");
    ui::transaction(&renewal, verbose);
    if unverified {
        ui::warning("The renewal will fail verification");
    }
    ui::info("Run 'purchasekit-demo listen' to deliver it");
    Ok(())
}

pub async fn revoke(storage_dir: &Path, transaction_id: &str, verbose: bool) -> Result<()> {
    ui::header(&format!("Revoke {}", transaction_id));

    let store = super::open_store(storage_dir)?;
    let revoked = store.revoke(&TransactionId::new(transaction_id))?;

    ui::success("Transaction revoked");
    ui::transaction(&revoked, verbose);
    Ok(())
}

pub async fn history(storage_dir: &Path, verbose: bool) -> Result<()> {
    ui::header("Store Transactions");

    let store = super::open_store(storage_dir)?;
    let transactions = store.transactions()?;
    if transactions.is_empty() {
        ui::info("No transactions yet");
        return Ok(());
    }

    for stored in &transactions {
        ui::separator();
        ui::transaction(&stored.transaction, verbose);
        ui::key_value("Verified", &stored.verified.to_string());
        ui::key_value("Finalized", &stored.finalized.to_string());
    }

    let pending = store.pending_updates()?;
    if pending > 0 {
        ui::separator();
        ui::info(&format!("{} update(s) waiting for 'listen'", pending));
    }
    Ok(())
}
