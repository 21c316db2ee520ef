use async_trait::async_trait;
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strata_dns_application::ports::{KvNode, KvStore, ServiceBackend};
use strata_dns_domain::DomainError;
use strata_dns_infrastructure::dns::backends::KvBackend;

/// Store with a fixed latency per fetch, counting round-trips.
struct SlowStore {
    fetches: Arc<AtomicUsize>,
    delay: Duration,
}

impl SlowStore {
    fn new(delay_ms: u64) -> Self {
        Self {
            fetches: Arc::new(AtomicUsize::new(0)),
            delay: Duration::from_millis(delay_ms),
        }
    }
}

#[async_trait]
impl KvStore for SlowStore {
    async fn fetch(&self, path: &str) -> Result<Vec<KvNode>, DomainError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if path != "/strata/org/example/a" {
            return Err(DomainError::NotFound);
        }
        Ok(vec![KvNode {
            key: "/strata/org/example/a".to_string(),
            value: r#"{"host":"10.0.0.7"}"#.to_string(),
            ttl: 0,
        }])
    }
}

#[tokio::test]
async fn concurrent_lookups_share_one_store_round_trip() {
    let store = Arc::new(SlowStore::new(50));
    let fetches = Arc::clone(&store.fetches);
    let backend = Arc::new(KvBackend::new(store, "strata", 300));

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let backend = Arc::clone(&backend);
            tokio::spawn(async move { backend.lookup("a.example.org.", false).await })
        })
        .collect();

    let results = join_all(tasks).await;

    assert_eq!(
        fetches.load(Ordering::SeqCst),
        1,
        "all concurrent lookups must share one store fetch"
    );
    for result in results {
        let services = result.unwrap().unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].host, "10.0.0.7");
    }
}

#[tokio::test]
async fn sequential_lookups_fetch_again() {
    let store = Arc::new(SlowStore::new(5));
    let fetches = Arc::clone(&store.fetches);
    let backend = KvBackend::new(store, "strata", 300);

    backend.lookup("a.example.org.", false).await.unwrap();
    backend.lookup("a.example.org.", false).await.unwrap();

    assert_eq!(
        fetches.load(Ordering::SeqCst),
        2,
        "coalescing must not cache completed fetches"
    );
}
