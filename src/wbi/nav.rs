use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, COOKIE, ORIGIN, REFERER, USER_AGENT};
use serde::Deserialize;
use tokio::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::KeyPair;
use super::refresh::KeySource;
use crate::cookies::Cookies;
use crate::env::BiliEnvironment;
use crate::error::{BiliError, RefreshError};
use crate::types::Envelope;

pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";

#[derive(Debug, Clone, Default, Deserialize)]
struct NavData {
    #[serde(default)]
    wbi_img: WbiImg,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WbiImg {
    #[serde(default)]
    img_url: String,
    #[serde(default)]
    sub_url: String,
}

/// Fetches key pairs from the nav endpoint.
///
/// The endpoint answers logged-out sessions with an error code but still includes the key
/// URLs; that answer is accepted. Cookies set by the endpoint replace the ones sent, so later
/// refreshes keep the same session.
pub struct NavKeySource {
    http: Client,
    url: Url,
    web_origin: String,
    cookies: Mutex<Cookies>,
}

impl NavKeySource {
    /// Nav source with its own HTTP client and [`DEFAULT_REFRESH_TIMEOUT`].
    pub fn new(env: &BiliEnvironment) -> Result<Self, BiliError> {
        let http = Client::builder().timeout(DEFAULT_REFRESH_TIMEOUT).build()?;
        Self::with_http_client(env, http)
    }

    /// Nav source sharing `http`; its timeout bounds every refresh.
    pub fn with_http_client(env: &BiliEnvironment, http: Client) -> Result<Self, BiliError> {
        Ok(Self {
            http,
            url: env.nav_url()?,
            web_origin: env.web_origin.clone(),
            cookies: Mutex::new(Cookies::new()),
        })
    }

    pub fn with_cookies(self, cookies: Cookies) -> Self {
        *self.cookies.lock() = cookies;
        self
    }

    /// Cookies the next refresh will send.
    pub fn cookies(&self) -> Cookies {
        self.cookies.lock().clone()
    }
}

#[async_trait]
impl KeySource for NavKeySource {
    async fn fetch_keys(&self) -> Result<KeyPair, RefreshError> {
        let cookie_header = self.cookies.lock().to_string();

        let mut req = self
            .http
            .get(self.url.clone())
            .header(ACCEPT, "application/json")
            .header(ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9")
            .header(ORIGIN, self.web_origin.as_str())
            .header(REFERER, format!("{}/", self.web_origin))
            .header(USER_AGENT, BROWSER_USER_AGENT);
        if !cookie_header.is_empty() {
            req = req.header(COOKIE, cookie_header);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let set_cookies = Cookies::from_set_cookie_headers(resp.headers());
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            return Err(RefreshError::Status {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let envelope: Envelope<NavData> = serde_json::from_slice(&bytes)
            .map_err(|e| RefreshError::Malformed(format!("nav response: {e}")))?;
        let pair = key_pair_from(envelope)?;

        if !set_cookies.is_empty() {
            debug!(count = set_cookies.len(), "nav refresh replaced cookies");
            *self.cookies.lock() = set_cookies;
        }
        Ok(pair)
    }
}

fn key_pair_from(envelope: Envelope<NavData>) -> Result<KeyPair, RefreshError> {
    let wbi_img = envelope.data.map(|data| data.wbi_img).unwrap_or_default();

    if envelope.code != 0 {
        if wbi_img.img_url.is_empty() || wbi_img.sub_url.is_empty() {
            return Err(RefreshError::Api {
                code: envelope.code,
                message: envelope.message,
            });
        }
        warn!(
            code = envelope.code,
            message = %envelope.message,
            "nav returned an error code but carried key urls; using them"
        );
    }

    let img_key = key_from_url(&wbi_img.img_url)
        .ok_or_else(|| RefreshError::Malformed(format!("img_url {:?}", wbi_img.img_url)))?;
    let sub_key = key_from_url(&wbi_img.sub_url)
        .ok_or_else(|| RefreshError::Malformed(format!("sub_url {:?}", wbi_img.sub_url)))?;
    Ok(KeyPair::new(img_key, sub_key))
}

/// File stem of the last path segment: `https://i0.hdslb.com/bfs/wbi/abc.png` gives `abc`.
pub fn key_from_url(url: &str) -> Option<&str> {
    let file = url.rsplit('/').next()?;
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    (!stem.is_empty()).then_some(stem)
}
