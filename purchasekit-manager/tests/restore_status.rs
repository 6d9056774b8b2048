//! Integration tests for restore and entitlement status resolution.

mod common;

use chrono::{Duration, Utc};
use common::{setup, Event};
use purchasekit_lib::test_utils::{
    active_subscription, expired_subscription, lifetime_purchase, unverified, verified,
};
use purchasekit_lib::{EntitlementStatus, ProductId, PurchaseKitErrorCode, Transaction};

// ============================================================================
// Restore
// ============================================================================

#[tokio::test]
async fn test_restore_collects_verified_entries() {
    let (store, manager, recorder) = setup();
    store.set_entitlements(vec![
        verified(active_subscription("sub-1")),
        unverified(lifetime_purchase("forged")),
        verified(lifetime_purchase("life-1")),
    ]);

    let restored = manager.restore().await.unwrap();

    let ids: Vec<_> = restored.iter().map(|tx| tx.id.as_str()).collect();
    assert_eq!(ids, vec!["sub-1", "life-1"]);
    assert_eq!(
        recorder.events(),
        vec![
            Event::Failed(PurchaseKitErrorCode::Verification),
            Event::Restored(vec!["sub-1".into(), "life-1".into()]),
        ]
    );
    // Entitlements are already finished transactions.
    assert!(store.finalized().is_empty());
    assert_eq!(manager.metrics().restores, 1);
}

#[tokio::test]
async fn test_restore_with_nothing_to_restore() {
    let (store, manager, recorder) = setup();
    store.set_entitlements(vec![unverified(lifetime_purchase("forged"))]);

    let restored = manager.restore().await.unwrap();

    assert!(restored.is_empty());
    assert_eq!(recorder.restores(), 0);
    assert_eq!(recorder.failures(), 1);
}

#[tokio::test]
async fn test_restore_enumeration_failure() {
    let (store, manager, recorder) = setup();
    store.fail_entitlements("store unavailable");

    let err = manager.restore().await.unwrap_err();

    assert_eq!(err.code(), PurchaseKitErrorCode::Provider);
    assert_eq!(
        recorder.events(),
        vec![Event::Failed(PurchaseKitErrorCode::Provider)]
    );
}

// ============================================================================
// Status
// ============================================================================

#[tokio::test]
async fn test_status_not_purchased() {
    let (store, manager, recorder) = setup();
    store.set_entitlements(vec![verified(lifetime_purchase("life-1"))]);
    let pro = ProductId::new("pro_plan");

    let status = manager.status(&pro).await.unwrap();

    assert_eq!(status, EntitlementStatus::NotPurchased);
    assert_eq!(recorder.events(), vec![Event::Status(pro, "not_purchased")]);
}

#[tokio::test]
async fn test_status_expired_and_active() {
    let (store, manager, _recorder) = setup();
    let pro = ProductId::new("pro_plan");

    store.set_entitlements(vec![verified(expired_subscription("old"))]);
    assert!(matches!(
        manager.status(&pro).await.unwrap(),
        EntitlementStatus::Expired(_)
    ));

    store.set_entitlements(vec![verified(active_subscription("new"))]);
    assert!(matches!(
        manager.status(&pro).await.unwrap(),
        EntitlementStatus::Purchased(_)
    ));
    assert!(manager.is_entitled(&pro).await.unwrap());
}

#[tokio::test]
async fn test_status_without_expiration_is_purchased() {
    let (store, manager, _recorder) = setup();
    store.set_entitlements(vec![verified(lifetime_purchase("life-1"))]);

    let status = manager.status(&ProductId::new("lifetime")).await.unwrap();
    assert_eq!(status.transaction().map(|tx| tx.id.as_str()), Some("life-1"));
    assert!(status.is_active());
}

#[tokio::test]
async fn test_status_revoked() {
    let (store, manager, recorder) = setup();
    let pro = ProductId::new("pro_plan");
    store.set_entitlements(vec![verified(
        active_subscription("refunded").with_revocation(Utc::now() - Duration::minutes(5)),
    )]);

    let status = manager.status(&pro).await.unwrap();

    assert!(matches!(status, EntitlementStatus::Revoked(_)));
    assert!(!manager.is_entitled(&pro).await.unwrap());
    assert_eq!(recorder.statuses(), 2);
}

#[tokio::test]
async fn test_status_skips_unverified_entries() {
    let (store, manager, recorder) = setup();
    let pro = ProductId::new("pro_plan");
    store.set_entitlements(vec![
        unverified(active_subscription("forged")),
        verified(expired_subscription("real")),
    ]);

    let status = manager.status(&pro).await.unwrap();

    assert_eq!(status.transaction().map(|tx| tx.id.as_str()), Some("real"));
    assert_eq!(
        recorder.events(),
        vec![
            Event::Failed(PurchaseKitErrorCode::Verification),
            Event::Status(pro, "expired"),
        ]
    );
}

#[tokio::test]
async fn test_status_at_boundary() {
    let (store, manager, _recorder) = setup();
    let pro = ProductId::new("pro_plan");
    let expiry = Utc::now() + Duration::days(3);
    store.set_entitlements(vec![verified(
        Transaction::new("1", "pro_plan").with_expiration(expiry),
    )]);

    let at_expiry = manager.status_at(&pro, expiry).await.unwrap();
    assert!(matches!(at_expiry, EntitlementStatus::Purchased(_)));

    let after = manager
        .status_at(&pro, expiry + Duration::seconds(1))
        .await
        .unwrap();
    assert!(matches!(after, EntitlementStatus::Expired(_)));
}

#[tokio::test]
async fn test_statuses_share_one_enumeration() {
    let (store, manager, recorder) = setup();
    store.set_entitlements(vec![
        verified(active_subscription("sub-1")),
        unverified(lifetime_purchase("forged")),
    ]);
    let ids = [
        ProductId::new("pro_plan"),
        ProductId::new("lifetime"),
        ProductId::new("coins_100"),
    ];

    let resolved = manager.statuses(&ids).await.unwrap();

    let labels: Vec<_> = resolved.iter().map(|(_, status)| status.label()).collect();
    assert_eq!(labels, vec!["purchased", "not_purchased", "not_purchased"]);
    assert_eq!(recorder.statuses(), 3);
    assert_eq!(recorder.failures(), 1);
}

#[tokio::test]
async fn test_status_enumeration_failure() {
    let (store, manager, recorder) = setup();
    store.fail_entitlements("store unavailable");

    assert!(manager.status(&ProductId::new("pro_plan")).await.is_err());
    assert!(manager
        .statuses(&[ProductId::new("pro_plan"), ProductId::new("lifetime")])
        .await
        .is_err());
    assert_eq!(recorder.statuses(), 0);
    assert_eq!(
        recorder.events(),
        vec![
            Event::Failed(PurchaseKitErrorCode::Provider),
            Event::Failed(PurchaseKitErrorCode::Provider),
        ]
    );
}
