mod common;

use std::sync::Arc;

use seoflow_content::{should_freeze, FreshnessMonitor};
use seoflow_core::{
    FeedClass, FreshnessConfig, FreshnessSourceConfig, FreshnessSourceKind, FreshnessState,
};
use seoflow_db::PipelineStore;

use common::{harness, seed_recent_data, PassingGenerator};

#[tokio::test]
async fn checks_are_read_only_and_snapshots_persist() {
    let h = harness(Arc::new(PassingGenerator));
    let store: Arc<dyn PipelineStore> = h.store.clone();
    let monitor = FreshnessMonitor::new(store, &FreshnessConfig::default());

    let statuses = monitor.check_all("acme").await.unwrap();
    assert!(statuses.iter().all(|s| s.status == FreshnessState::Missing));
    assert!(should_freeze(&statuses));
    assert!(h.store.snapshots().await.is_empty());

    monitor.record_snapshot("acme").await.unwrap();
    let snapshots = h.store.snapshots().await;
    assert_eq!(snapshots.len(), 3);
    assert!(snapshots.iter().all(|(org, _)| org == "acme"));
}

#[tokio::test]
async fn fresh_imports_and_topics_unfreeze_publishing() {
    let h = harness(Arc::new(PassingGenerator));
    seed_recent_data(&h).await;
    h.topics
        .propose(&seoflow_core::Caller::system(), "acme", Some(1))
        .await
        .unwrap();

    let store: Arc<dyn PipelineStore> = h.store.clone();
    let statuses = FreshnessMonitor::new(store, &FreshnessConfig::default())
        .check_all("acme")
        .await
        .unwrap();
    assert!(statuses.iter().all(|s| s.status == FreshnessState::Fresh), "{statuses:?}");
    assert!(!should_freeze(&statuses));
}

#[tokio::test]
async fn another_orgs_imports_do_not_keep_an_org_fresh() {
    let h = harness(Arc::new(PassingGenerator));
    seed_recent_data(&h).await;

    let store: Arc<dyn PipelineStore> = h.store.clone();
    let monitor = FreshnessMonitor::new(store, &FreshnessConfig::default());
    let acme = monitor.check_all("acme").await.unwrap();
    let beta = monitor.check_all("beta").await.unwrap();

    let booking = |statuses: &[seoflow_core::FreshnessStatus]| {
        statuses
            .iter()
            .find(|s| s.source == "booking_feed")
            .map(|s| s.status)
    };
    assert_eq!(booking(&acme), Some(FreshnessState::Fresh));
    assert_eq!(booking(&beta), Some(FreshnessState::Missing));
    assert!(beta.iter().all(|s| s.status == FreshnessState::Missing));
    assert!(should_freeze(&beta));
}

#[tokio::test]
async fn directory_sources_use_the_newest_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("engagement.csv"), "sessions\n10\n").unwrap();
    let config = FreshnessConfig {
        sources: vec![FreshnessSourceConfig {
            name: "engagement".to_string(),
            kind: FreshnessSourceKind::Directory,
            class: FeedClass::Daily,
            path: Some(dir.path().to_path_buf()),
        }],
    };
    let h = harness(Arc::new(PassingGenerator));
    let store: Arc<dyn PipelineStore> = h.store.clone();
    let statuses = FreshnessMonitor::new(store, &config)
        .check_all("acme")
        .await
        .unwrap();
    assert_eq!(statuses[0].status, FreshnessState::Fresh);
    assert!(statuses[0].last_updated.is_some());
}
