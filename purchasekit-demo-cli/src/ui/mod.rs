//! Terminal UI utilities

use colored::Colorize;
use console::Emoji;
use purchasekit_lib::{EntitlementStatus, Product, Transaction};

static CHECK: Emoji<'_, '_> = Emoji("✓", "+");
static CROSS: Emoji<'_, '_> = Emoji("✗", "x");
static INFO: Emoji<'_, '_> = Emoji("ℹ", "i");
static WARN: Emoji<'_, '_> = Emoji("⚠", "!");

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", CHECK.to_string().green().bold(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", CROSS.to_string().red().bold(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", INFO.to_string().blue().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", WARN.to_string().yellow().bold(), message);
}

/// Print a section header
pub fn header(text: &str) {
    println!("\n{}", text.bold().underline());
}

/// Print a key-value pair
pub fn key_value(key: &str, value: &str) {
    println!("  {}: {}", key.cyan(), value);
}

/// Print a separator line
pub fn separator() {
    println!("{}", "─".repeat(60).dimmed());
}

/// Print JSON prettily
pub fn json(value: &serde_json::Value) {
    if let Ok(pretty) = serde_json::to_string_pretty(value) {
        println!("{}", pretty);
    }
}

/// Print one catalog entry
pub fn product(product: &Product) {
    println!(
        "\n{} {}",
        product.display_name.bold(),
        format!("({})", product.id).dimmed()
    );
    key_value("Price", &format!("{} ({} {})", product.display_price, product.price, product.currency_code));
    key_value("Kind", product.kind.as_str());
    if !product.description.is_empty() {
        key_value("Description", &product.description);
    }
    if let Some(subscription) = &product.subscription {
        key_value(
            "Renews",
            &format!("every {} (group {})", subscription.period, subscription.group_id),
        );
    }
    if let Some(offer) = &product.introductory_offer {
        key_value(
            "Intro offer",
            &format!("{} for {} x {}", offer.display_price, offer.period_count, offer.period),
        );
    }
}

/// Print the fields of a transaction worth showing
pub fn transaction(tx: &Transaction, verbose: bool) {
    key_value("Transaction", tx.id.as_str());
    key_value("Product", tx.product_id.as_str());
    key_value("Purchased", &timestamp(tx.purchased_at));
    if let Some(expires_at) = tx.expires_at {
        key_value("Expires", &timestamp(expires_at));
    }
    if let Some(revoked_at) = tx.revoked_at {
        key_value("Revoked", &timestamp(revoked_at));
    }
    if verbose {
        key_value("Original", tx.original_id.as_str());
        key_value("Quantity", &tx.quantity.to_string());
        if let Some(token) = tx.app_account_token {
            key_value("Account token", &token.to_string());
        }
    }
}

/// Colored one-word rendering of an entitlement status
pub fn status_badge(status: &EntitlementStatus) -> String {
    match status {
        EntitlementStatus::Purchased(_) => "purchased".green().bold().to_string(),
        EntitlementStatus::Expired(_) => "expired".yellow().bold().to_string(),
        EntitlementStatus::Revoked(_) => "revoked".red().bold().to_string(),
        EntitlementStatus::NotPurchased => "not purchased".dimmed().to_string(),
    }
}

fn timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
