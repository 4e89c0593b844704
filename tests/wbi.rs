//! WBI signing and key caching through the public API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bilibili_fast::wbi::{default_store, mixin_key, sign_with_mixin_key};
use bilibili_fast::{
    CachedKeys, KeyPair, KeySource, KeyStore, MemoryKeyStore, ParamSet, RefreshError, Wbi,
};

const IMG_KEY: &str = "7cd084941338484aae1ad9425b84077c";
const SUB_KEY: &str = "4932caff0ff746eab6f01bf08b70ac45";

fn pair() -> KeyPair {
    KeyPair::new(IMG_KEY, SUB_KEY)
}

fn params(pairs: &[(&str, &str)]) -> ParamSet {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Key source that takes a while to answer and counts its calls.
struct SlowSource {
    calls: AtomicUsize,
    delay: Duration,
}

impl SlowSource {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySource for SlowSource {
    async fn fetch_keys(&self) -> Result<KeyPair, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(pair())
    }
}

// ============================================================================
// Pure signing
// ============================================================================

#[test]
fn mixin_key_known_vector() {
    let mixin = mixin_key(&format!("{IMG_KEY}{SUB_KEY}"));
    assert_eq!(mixin, "ea1db124af3c7062474693fa704f4ff8");
    assert_eq!(mixin, pair().mixin_key());
}

#[test]
fn signature_known_vector() {
    let signed = sign_with_mixin_key(
        &params(&[("foo", "114"), ("bar", "514"), ("zab", "1919810")]),
        UNIX_EPOCH + Duration::from_secs(1702204169),
        &pair().mixin_key(),
    );
    assert_eq!(signed["w_rid"], "8f6f2b5b3d485fe1886cec6a0be8c5d4");
    assert_eq!(signed["wts"], "1702204169");
}

// ============================================================================
// Key cache and refresh
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_signers_share_one_refresh() {
    let source = SlowSource::new(Duration::from_millis(50));
    let wbi = Arc::new(
        Wbi::builder()
            .with_store(Arc::new(MemoryKeyStore::new()))
            .with_source(source.clone())
            .build()
            .unwrap(),
    );
    let now = UNIX_EPOCH + Duration::from_secs(1702204169);

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let wbi = wbi.clone();
            tokio::spawn(async move {
                wbi.sign(
                    &params(&[("foo", "114"), ("bar", "514"), ("zab", "1919810")]),
                    now,
                )
                .await
            })
        })
        .collect();

    for task in tasks {
        let signed = task.await.unwrap().unwrap();
        assert_eq!(signed["w_rid"], "8f6f2b5b3d485fe1886cec6a0be8c5d4");
    }
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn signers_sharing_a_store_share_keys() {
    let store: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
    let source = SlowSource::new(Duration::ZERO);

    let first = Wbi::builder()
        .with_store(store.clone())
        .with_source(source.clone())
        .build()
        .unwrap();
    let second = Wbi::builder()
        .with_store(store.clone())
        .with_source(source.clone())
        .build()
        .unwrap();

    assert_eq!(first.keys().await.unwrap(), pair());
    assert_eq!(second.keys().await.unwrap(), pair());
    assert_eq!(source.calls(), 1);
    assert_eq!(store.get().map(|cached| cached.pair), Some(pair()));
}

#[tokio::test(start_paused = true)]
async fn stale_keys_refresh_after_interval() {
    let store = Arc::new(MemoryKeyStore::new());
    store.set(CachedKeys::new(KeyPair::new("old", "old")));
    let source = SlowSource::new(Duration::ZERO);

    let wbi = Wbi::builder()
        .with_store(store)
        .with_source(source.clone())
        .with_update_interval(Duration::from_secs(60))
        .build()
        .unwrap();

    assert_eq!(wbi.keys().await.unwrap(), KeyPair::new("old", "old"));
    assert_eq!(source.calls(), 0);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(wbi.keys().await.unwrap(), pair());
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn refresh_failure_is_returned_with_unsigned_params() {
    struct Down;

    #[async_trait]
    impl KeySource for Down {
        async fn fetch_keys(&self) -> Result<KeyPair, RefreshError> {
            Err(RefreshError::Api {
                code: -412,
                message: "请求被拦截".into(),
            })
        }
    }

    let wbi = Wbi::builder()
        .with_store(Arc::new(MemoryKeyStore::new()))
        .with_source(Arc::new(Down))
        .build()
        .unwrap();

    let input = params(&[("mid", "2")]);
    let err = wbi.sign(&input, SystemTime::now()).await.unwrap_err();
    assert!(matches!(
        err.refresh_error(),
        RefreshError::Api { code: -412, .. }
    ));
    assert_eq!(err.params(), &input);
}

#[test]
fn default_store_is_process_wide() {
    let a = default_store();
    let b = default_store();
    assert!(Arc::ptr_eq(&a, &b));
}
