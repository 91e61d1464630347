//! Integration Tests for the Request Cache
//!
//! Exercises the public cache API end to end: coalescing, expiry, eviction,
//! failure propagation and synchronous reads.

use std::error::Error as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use request_cache::cache::{CacheEventKind, EntryStatus, RecordingObserver};
use request_cache::{CacheConfig, CacheError, RequestCache, Suspense};

// == Helper Functions ==

fn counting_fetch(
    calls: &Arc<AtomicUsize>,
    value: &'static str,
) -> impl FnOnce(String, String) -> std::future::Ready<Result<String, String>> {
    let calls = calls.clone();
    move |_key, _cid| {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Ok(value.to_string()))
    }
}

// == Eviction ==

#[tokio::test]
async fn test_oldest_entry_evicted_at_capacity() {
    let cache: RequestCache<String, String> =
        RequestCache::new(CacheConfig::default().with_max_size(2));
    let calls = Arc::new(AtomicUsize::new(0));

    for key in ["A", "B", "C"] {
        cache
            .get_or_fetch(key.to_string(), counting_fetch(&calls, "v"))
            .await
            .unwrap();
    }

    let stats = cache.stats();
    assert_eq!(stats.size, 2);
    assert!(!stats.contains_key("A"));
    assert!(stats.contains_key("B"));
    assert!(stats.contains_key("C"));
    assert!(!cache.exists(&"A".to_string()));
}

// == Expiry ==

#[tokio::test]
async fn test_expired_entry_is_refetched() {
    let cache: RequestCache<String, u32> =
        RequestCache::new(CacheConfig::default().with_ttl(Duration::from_millis(100)));
    let calls = Arc::new(AtomicUsize::new(0));

    let fetch = |calls: Arc<AtomicUsize>| {
        move |_key: String, _cid: String| async move {
            Ok::<_, String>(calls.fetch_add(1, Ordering::SeqCst) as u32 + 1)
        }
    };

    assert_eq!(cache.get_or_fetch("x".to_string(), fetch(calls.clone())).await.unwrap(), 1);
    assert_eq!(cache.get_or_fetch("x".to_string(), fetch(calls.clone())).await.unwrap(), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;

    // Stale values are invisible to reads
    assert_eq!(cache.peek(&"x".to_string()), None);
    assert!(!cache.exists(&"x".to_string()));

    assert_eq!(cache.get_or_fetch("x".to_string(), fetch(calls.clone())).await.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.stats().counters.expirations, 1);
}

// == Coalescing ==

#[tokio::test]
async fn test_concurrent_callers_share_one_fetch() {
    let cache: RequestCache<String, String> = RequestCache::new(CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_or_fetch("y".to_string(), move |_, _| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, String>("done".to_string())
                })
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "done");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().counters.coalesced, 4);
}

#[tokio::test]
async fn test_all_waiters_receive_the_same_error() {
    let cache: RequestCache<String, String> = RequestCache::new(CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..3 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_or_fetch("broken".to_string(), move |_, _| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Err::<String, _>("upstream unavailable")
                })
                .await
        }));
    }

    let mut correlation_ids = Vec::new();
    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, CacheError::Fetch { .. }));
        assert_eq!(err.source().unwrap().to_string(), "upstream unavailable");
        correlation_ids.push(err.correlation_id().unwrap().to_string());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    correlation_ids.dedup();
    assert_eq!(correlation_ids.len(), 1);
}

#[tokio::test]
async fn test_refresh_coalesces_with_racing_caller() {
    let cache: RequestCache<String, u32> = RequestCache::new(CacheConfig::default());
    let key = "r".to_string();
    cache
        .get_or_fetch(key.clone(), |_, _| async { Ok::<_, String>(1) })
        .await
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let (release, gate) = tokio::sync::oneshot::channel::<()>();

    let refresh = {
        let cache = cache.clone();
        let calls = calls.clone();
        let key = key.clone();
        tokio::spawn(async move {
            cache
                .refresh(key, move |_, _| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let _ = gate.await;
                    Ok::<_, String>(2)
                })
                .await
        })
    };
    while cache.entry_status(&key) != Some(EntryStatus::Pending) {
        tokio::task::yield_now().await;
    }

    let racer = {
        let cache = cache.clone();
        let calls = calls.clone();
        let key = key.clone();
        tokio::spawn(async move {
            cache
                .get_or_fetch(key, move |_, _| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(99)
                })
                .await
        })
    };
    while cache.stats().counters.coalesced == 0 {
        tokio::task::yield_now().await;
    }

    release.send(()).unwrap();

    assert_eq!(refresh.await.unwrap().unwrap(), 2);
    assert_eq!(racer.await.unwrap().unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.peek(&key), Some(2));
}

#[tokio::test]
async fn test_failure_is_not_cached() {
    let cache: RequestCache<String, String> = RequestCache::new(CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let result = cache
        .get_or_fetch("z".to_string(), |_, _| async { Err::<String, _>("first try fails") })
        .await;
    assert!(result.is_err());
    assert_eq!(cache.entry_status(&"z".to_string()), None);

    let value = cache
        .get_or_fetch("z".to_string(), counting_fetch(&calls, "second"))
        .await
        .unwrap();
    assert_eq!(value, "second");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// == Synchronous Reads ==

#[test]
fn test_get_or_suspend_from_plain_thread() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let cache: RequestCache<String, u32> = RequestCache::builder(CacheConfig::default())
        .runtime(runtime.handle().clone())
        .build();
    let calls = Arc::new(AtomicUsize::new(0));

    let fetch = |calls: Arc<AtomicUsize>| {
        move |_key: String, _cid: String| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<u32, String>(42)
        }
    };

    let first = cache.get_or_suspend("s".to_string(), fetch(calls.clone()));
    let handle = match first {
        Suspense::Pending(handle) => handle,
        other => panic!("expected a pending read, got ready={}", other.is_ready()),
    };
    assert_eq!(handle.key(), "s");

    // A second read while in flight joins the same fetch.
    assert!(cache.get_or_suspend("s".to_string(), fetch(calls.clone())).is_pending());
    assert_eq!(cache.entry_status(&"s".to_string()), Some(EntryStatus::Pending));

    assert_eq!(tokio_test::block_on(handle.wait()).unwrap(), 42);

    match cache.get_or_suspend("s".to_string(), fetch(calls.clone())) {
        Suspense::Ready(value) => assert_eq!(value, 42),
        other => panic!("expected a ready read, got pending={}", other.is_pending()),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// == Observability ==

#[tokio::test]
async fn test_events_share_the_flight_correlation_id() {
    let recorder = Arc::new(RecordingObserver::new());
    let cache: RequestCache<String, u32> = RequestCache::builder(CacheConfig::default())
        .operation("lookup")
        .observer(recorder.clone())
        .build();

    cache
        .get_or_fetch("k".to_string(), |_, _| async { Ok::<_, String>(1) })
        .await
        .unwrap();
    cache
        .get_or_fetch("k".to_string(), |_, _| async { Ok::<_, String>(2) })
        .await
        .unwrap();

    let events = recorder.events();
    let kinds: Vec<CacheEventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            CacheEventKind::CacheMiss,
            CacheEventKind::FetchSuccess,
            CacheEventKind::CacheHit
        ]
    );
    assert!(events[0].correlation_id.starts_with("lookup-"));
    assert!(events
        .iter()
        .all(|e| e.correlation_id == events[0].correlation_id));
}
