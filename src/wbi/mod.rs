//! WBI request signing.
//!
//! Signed endpoints expect two extra query parameters: `wts`, the unix time in seconds, and
//! `w_rid`, an MD5 digest of the sorted, sanitized query string salted with a mixin key. The
//! mixin key is derived from two key fragments that the nav endpoint hands out and rotates,
//! so [`Wbi`] caches them and refreshes them when they age past the update interval.
//!
//! Refreshes are single-flight: however many tasks find the keys stale at the same time,
//! one nav request goes out and every task gets its result.
//!
//! Requests carrying a WBI signature must not send a `Referer` header; most signed endpoints
//! also want the caller's session cookies.
//!
//! ```no_run
//! # use std::time::SystemTime;
//! # use bilibili_fast::{ParamSet, Wbi};
//! # async fn run() -> Result<(), bilibili_fast::BiliError> {
//! let wbi = Wbi::new();
//! let mut params = ParamSet::new();
//! params.insert("mid".into(), "1850091".into());
//!
//! let signed = wbi.sign(&params, SystemTime::now()).await?;
//! assert!(signed.contains_key("w_rid"));
//! # Ok(())
//! # }
//! ```

mod mixin;
mod nav;
mod refresh;
mod store;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Client;
use tokio::time::Duration;
use url::Url;

use crate::cookies::Cookies;
use crate::env::BiliEnvironment;
use crate::error::{BiliError, RefreshError, SignError};
use crate::params::ParamSet;

pub use mixin::{KeyPair, MIXIN_KEY_ENC_TAB, MIXIN_KEY_LEN, mixin_key};
pub use nav::{DEFAULT_REFRESH_TIMEOUT, NavKeySource, key_from_url};
pub use refresh::KeySource;
pub use store::{CachedKeys, KeyStore, MemoryKeyStore, default_store};

pub(crate) use nav::BROWSER_USER_AGENT;

use refresh::RefreshCoordinator;

pub const WTS: &str = "wts";
pub const W_RID: &str = "w_rid";

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Characters the verifier rejects inside values.
const STRIPPED_CHARS: [char; 5] = ['!', '\'', '(', ')', '*'];

/// `encodeURIComponent`: everything but ASCII alphanumerics and `-_.~` (and the stripped
/// characters, which never reach the encoder) is escaped.
pub(crate) const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Builder for [`Wbi`].
pub struct WbiBuilder {
    env: BiliEnvironment,
    store: Option<Arc<dyn KeyStore>>,
    source: Option<Arc<dyn KeySource>>,
    update_interval: Duration,
    cookies: Cookies,
    http_client: Option<Client>,
}

impl WbiBuilder {
    fn new() -> Self {
        Self {
            env: BiliEnvironment::production(),
            store: None,
            source: None,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            cookies: Cookies::new(),
            http_client: None,
        }
    }

    pub fn with_env(mut self, env: BiliEnvironment) -> Self {
        self.env = env;
        self
    }

    /// Replace the process-wide default key store.
    pub fn with_store(mut self, store: Arc<dyn KeyStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Fetch keys from `source` instead of the nav endpoint. Cookie, environment and HTTP
    /// client settings only apply to the nav source.
    pub fn with_source(mut self, source: Arc<dyn KeySource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Keys older than this are refreshed before the next signature. Default: 60 minutes.
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    /// Cookies sent with nav refreshes. Without them the keys are fetched as a guest.
    pub fn with_cookies(mut self, cookies: Cookies) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_raw_cookies(self, raw: &str) -> Self {
        self.with_cookies(Cookies::parse(raw))
    }

    /// HTTP client for nav refreshes; its timeout bounds each refresh.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn build(self) -> Result<Wbi, BiliError> {
        let source = match self.source {
            Some(source) => source,
            None => {
                let nav = match self.http_client {
                    Some(client) => NavKeySource::with_http_client(&self.env, client)?,
                    None => NavKeySource::new(&self.env)?,
                };
                Arc::new(nav.with_cookies(self.cookies))
            }
        };
        let store = self.store.unwrap_or_else(default_store);

        Ok(Wbi {
            coordinator: RefreshCoordinator::new(source, store, self.update_interval),
            update_interval: self.update_interval,
        })
    }
}

/// WBI signer: key cache, single-flight refresh and the signing algorithm.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct Wbi {
    coordinator: RefreshCoordinator,
    update_interval: Duration,
}

impl Wbi {
    pub fn builder() -> WbiBuilder {
        WbiBuilder::new()
    }

    /// Signer for production that fetches keys as a guest and shares the default store.
    pub fn new() -> Self {
        Self::builder()
            .build()
            .expect("default wbi signer builder should not fail")
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Current key pair, refreshed first if absent or stale.
    pub async fn keys(&self) -> Result<KeyPair, RefreshError> {
        self.coordinator.keys().await
    }

    /// Seed the store with known keys, stamped as fresh.
    pub fn set_keys(&self, pair: KeyPair) {
        self.coordinator.store().set(CachedKeys::new(pair));
    }

    pub async fn mixin_key(&self) -> Result<String, RefreshError> {
        Ok(self.keys().await?.mixin_key())
    }

    /// Return a signed copy of `params` stamped with `now`.
    ///
    /// On failure the error hands back the untouched input; sending it unsigned will be
    /// rejected upstream.
    pub async fn sign(&self, params: &ParamSet, now: SystemTime) -> Result<ParamSet, SignError> {
        match self.mixin_key().await {
            Ok(mixin_key) => Ok(sign_with_mixin_key(params, now, &mixin_key)),
            Err(err) => Err(SignError::new(err, params.clone())),
        }
    }

    /// Sign ordered query pairs. Repeated keys keep their first value; the result is in
    /// key order.
    pub async fn sign_query<K, V>(
        &self,
        pairs: impl IntoIterator<Item = (K, V)>,
        now: SystemTime,
    ) -> Result<Vec<(String, String)>, SignError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = ParamSet::new();
        for (key, value) in pairs {
            params.entry(key.into()).or_insert_with(|| value.into());
        }
        Ok(self.sign(&params, now).await?.into_iter().collect())
    }

    /// Sign the query of `url` in place.
    pub async fn sign_url(&self, url: &mut Url, now: SystemTime) -> Result<(), SignError> {
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let signed: ParamSet = self.sign_query(pairs, now).await?.into_iter().collect();
        url.set_query(Some(&encode_query(&signed)));
        Ok(())
    }
}

impl Default for Wbi {
    fn default() -> Self {
        Self::new()
    }
}

/// Pure signing step: add `wts`, strip rejected characters, digest with `mixin_key`.
///
/// Existing `wts`/`w_rid` entries are replaced, never duplicated.
pub fn sign_with_mixin_key(params: &ParamSet, now: SystemTime, mixin_key: &str) -> ParamSet {
    let mut signed = params.clone();
    signed.remove(W_RID);
    signed.insert(WTS.to_string(), unix_seconds(now).to_string());
    for value in signed.values_mut() {
        sanitize(value);
    }

    let canonical = encode_query(&signed);
    let digest = Md5::digest(format!("{canonical}{mixin_key}").as_bytes());
    signed.insert(W_RID.to_string(), hex::encode(digest));
    signed
}

/// `k=v&k=v` in key order, percent-encoded the way the verifier expects.
///
/// This is not form encoding: a space becomes `%20`, never `+`, and `~` stays literal. The
/// REST client sends this exact string, so what goes on the wire is what was digested.
pub fn encode_query(params: &ParamSet) -> String {
    params
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(k, COMPONENT),
                utf8_percent_encode(v, COMPONENT)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn sanitize(value: &mut String) {
    value.retain(|c| !STRIPPED_CHARS.contains(&c));
}

fn unix_seconds(ts: SystemTime) -> i64 {
    match ts.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_secs() as i64,
        Err(before) => -(before.duration().as_secs() as i64),
    }
}
