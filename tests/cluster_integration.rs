//! Integration tests against a real Redis Cluster.
//!
//! These tests require a Redis Cluster running on localhost.
//! All tests are marked with #[ignore] by default.
//!
//! Setup with Docker:
//! ```bash
//! docker run -d --name redis-cluster \
//!   -p 7000-7005:7000-7005 \
//!   grokzen/redis-cluster:latest
//! ```
//!
//! Run tests:
//! ```bash
//! cargo test --test cluster_integration -- --ignored
//! ```

use std::time::Duration;

use bytes::Bytes;
use muxprobe::{
    key_slot, ClusterConnection, ClusterEndpointConfig, ErrorKind, Mode, NodeAddress,
    ProbeRunner, StepName, StepStatus,
};

const SEEDS: &str = "127.0.0.1:7000,127.0.0.1:7001,127.0.0.1:7002";

fn seeds() -> Vec<NodeAddress> {
    SEEDS.split(',').map(|s| s.parse().unwrap()).collect()
}

#[tokio::test]
#[ignore]
async fn test_probe_healthy_cluster() {
    let config = ClusterEndpointConfig::builder()
        .seeds_from_str(SEEDS)
        .step_timeout(Some(Duration::from_secs(5)))
        .build()
        .unwrap();

    let report = ProbeRunner::cluster().run(&config).await.unwrap();

    assert!(report.is_ok(), "{report:#?}");
    assert_eq!(
        report.step(StepName::WriteRead).unwrap().detail(),
        "Redis Cluster Works!"
    );

    let mut conn = ClusterConnection::connect(&seeds(), false, None)
        .await
        .unwrap();
    assert_eq!(conn.get("test:hello").await.unwrap(), None);
    conn.close().await;
}

#[tokio::test]
#[ignore]
async fn test_probe_unique_keys_in_parallel() {
    let config = ClusterEndpointConfig::builder()
        .seeds_from_str(SEEDS)
        .unique_key(true)
        .build()
        .unwrap();

    let runner = ProbeRunner::cluster();
    let (a, b) = tokio::join!(runner.run(&config), runner.run(&config));

    assert!(a.unwrap().is_ok());
    assert!(b.unwrap().is_ok());
}

#[tokio::test]
#[ignore]
async fn test_probe_dead_seed_is_skipped() {
    let config = ClusterEndpointConfig::builder()
        .seeds_from_str(&format!("127.0.0.1:1,{SEEDS}"))
        .build()
        .unwrap();

    let report = ProbeRunner::cluster().run(&config).await.unwrap();
    assert!(report.is_ok(), "{report:#?}");
}

#[tokio::test]
#[ignore]
async fn test_probe_unreachable_cluster() {
    let config = ClusterEndpointConfig::builder()
        .seeds_from_str("127.0.0.1:1")
        .step_timeout(Some(Duration::from_secs(2)))
        .build()
        .unwrap();

    let report = ProbeRunner::cluster().run(&config).await.unwrap();

    assert!(!report.is_ok());
    let connect = report.step(StepName::Connect).unwrap();
    assert_eq!(connect.status(), StepStatus::Failed);
    assert_eq!(connect.error_kind(), Some(ErrorKind::Connectivity));
}

#[tokio::test]
#[ignore]
async fn test_cluster_topology() {
    let conn = ClusterConnection::connect(&seeds(), false, None)
        .await
        .unwrap();

    assert_eq!(conn.mode(), Mode::Cluster);
    assert!(conn.master_count() >= 3, "expected at least 3 masters");
    assert_eq!(conn.covered_slots(), 16384);
    conn.close().await;
}

#[tokio::test]
#[ignore]
async fn test_keys_across_slots() {
    let mut conn = ClusterConnection::connect(&seeds(), false, None)
        .await
        .unwrap();

    // Spread over several masters.
    let keys = ["integration:a", "integration:b", "integration:c", "integration:d"];
    for key in keys {
        conn.set(key, Bytes::from(key)).await.unwrap();
    }
    for key in keys {
        assert_eq!(conn.get(key).await.unwrap(), Some(Bytes::from(key)));
        assert_eq!(conn.del(key).await.unwrap(), 1);
    }
    assert!(conn.open_connections() >= 1);
    conn.close().await;
}

#[tokio::test]
#[ignore]
async fn test_hash_tags_share_a_node() {
    let mut conn = ClusterConnection::connect(&seeds(), false, None)
        .await
        .unwrap();

    assert_eq!(key_slot("{probe}:one"), key_slot("{probe}:two"));
    conn.set("{probe}:one", Bytes::from("1")).await.unwrap();
    conn.set("{probe}:two", Bytes::from("2")).await.unwrap();
    assert_eq!(conn.del("{probe}:one").await.unwrap(), 1);
    assert_eq!(conn.del("{probe}:two").await.unwrap(), 1);
    conn.close().await;
}
