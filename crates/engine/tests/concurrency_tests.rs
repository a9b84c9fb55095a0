//! Multi-threaded cache tests
//!
//! Many tasks on a multi-threaded runtime hammer one `DataLink`. Reads are
//! gated at the store so every request is registered before any read
//! settles.

use doclink_core::DocPath;
use doclink_core::value::Value;
use doclink_engine::{DataLink, LinkConfig, MemoryStore};
use std::sync::Arc;
use std::time::Duration;

fn seeded_store(paths: &[&str]) -> MemoryStore {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("doclink=debug")
        .with_test_writer()
        .try_init();
    let store = MemoryStore::new();
    for (i, path) in paths.iter().enumerate() {
        store.insert(path, [("n", Value::Int(i as i64))]).unwrap();
    }
    store
}

/// Wait until `expected` fetches have either issued or joined a read
async fn wait_for_requests(link: &DataLink, expected: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let stats = link.stats();
            if stats.reads + stats.joins >= expected {
                break;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("requests never registered");
}

// ============================================================================
// Deduplication
// ============================================================================

/// Test: N tasks fetching one path -> exactly one store read
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_path_single_read() {
    let store = seeded_store(&["users/1"]);
    let link = DataLink::new(LinkConfig::new(Arc::new(store.clone())));
    store.pause_reads();

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let link = link.clone();
            tokio::spawn(async move { link.fetch(&DocPath::new("users/1").unwrap()).await })
        })
        .collect();

    wait_for_requests(&link, 32).await;
    store.resume_reads();

    for handle in handles {
        let snapshot = handle.await.unwrap().unwrap();
        assert_eq!(snapshot.id(), "1");
    }
    assert_eq!(store.read_count("users/1"), 1);
    let stats = link.stats();
    assert_eq!(stats.reads, 1);
    assert_eq!(stats.joins, 31);
    assert_eq!(stats.in_flight, 0);
}

/// Test: interleaved paths -> one read per distinct path
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_paths_one_read_each() {
    let paths = ["a/1", "a/2", "a/3", "b/1"];
    let store = seeded_store(&paths);
    let link = DataLink::new(LinkConfig::new(Arc::new(store.clone())));
    store.pause_reads();

    let handles: Vec<_> = (0..40)
        .map(|i| {
            let link = link.clone();
            let path = DocPath::new(paths[i % paths.len()]).unwrap();
            tokio::spawn(async move { link.fetch(&path).await })
        })
        .collect();

    wait_for_requests(&link, 40).await;
    store.resume_reads();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    for path in paths {
        assert_eq!(store.read_count(path), 1, "path {path} read more than once");
    }
    assert_eq!(link.stats().entries, paths.len());
}

// ============================================================================
// Failure fan-out
// ============================================================================

/// Test: a failed shared read reaches every waiter and is not cached
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failure_reaches_all_waiters() {
    let store = seeded_store(&["users/1"]);
    store.fail_next_read("users/1", "unavailable");
    let link = DataLink::new(LinkConfig::new(Arc::new(store.clone())));
    store.pause_reads();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let link = link.clone();
            tokio::spawn(async move { link.fetch(&DocPath::new("users/1").unwrap()).await })
        })
        .collect();

    wait_for_requests(&link, 8).await;
    store.resume_reads();

    for handle in handles {
        assert!(handle.await.unwrap().is_err());
    }
    assert!(link.cached(&DocPath::new("users/1").unwrap()).is_none());

    // Next request issues a fresh read and succeeds.
    link.fetch(&DocPath::new("users/1").unwrap()).await.unwrap();
    assert_eq!(store.read_count("users/1"), 2);
    assert_eq!(link.stats().failures, 1);
}
