use crate::cookies::Cookies;
use crate::env::BiliEnvironment;
use crate::error::BiliError;
use crate::params::{self, Body, ParamSet, RequestParams};
use crate::types::Envelope;
use crate::wbi::{self, BROWSER_USER_AGENT, Wbi};

use parking_lot::Mutex;
use reqwest::header::{COOKIE, HeaderMap, ORIGIN, REFERER};
use reqwest::multipart::Form;
use reqwest::{Client, Method, Proxy, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Cookie carrying the CSRF token of a logged-in session.
pub const CSRF_COOKIE: &str = "bili_jct";

/// Per-call switches for [`BiliRestClient::execute`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Add `wts`/`w_rid` to the query and drop the `Referer` header.
    pub wbi: bool,
    /// Add `csrf` and `csrf_token` from the `bili_jct` cookie.
    pub csrf: bool,
}

impl RequestOptions {
    pub const fn wbi() -> Self {
        Self {
            wbi: true,
            csrf: false,
        }
    }

    pub const fn csrf() -> Self {
        Self {
            wbi: false,
            csrf: true,
        }
    }
}

fn build_http_error(status: StatusCode, bytes: &[u8]) -> BiliError {
    BiliError::Http {
        status,
        raw_body: String::from_utf8_lossy(bytes).to_string(),
    }
}

fn unwrap_envelope<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, BiliError> {
    let envelope: Envelope<Value> = serde_json::from_slice(bytes)?;
    if !envelope.is_ok() {
        return Err(BiliError::Api {
            code: envelope.code,
            message: envelope.message,
        });
    }
    Ok(serde_json::from_value(envelope.data.unwrap_or(Value::Null))?)
}

/// Builder for [`BiliRestClient`] with transport and session customization.
pub struct BiliRestClientBuilder {
    env: BiliEnvironment,
    wbi: Option<Arc<Wbi>>,
    cookies: Cookies,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
    proxy: Option<Proxy>,
    http_client: Option<Client>,
}

impl BiliRestClientBuilder {
    fn new(env: BiliEnvironment) -> Self {
        Self {
            env,
            wbi: None,
            cookies: Cookies::new(),
            timeout: Some(DEFAULT_TIMEOUT),
            connect_timeout: None,
            user_agent: None,
            default_headers: None,
            proxy: None,
            http_client: None,
        }
    }

    /// Share a signer (and its key cache) instead of building one for this client.
    pub fn with_wbi(mut self, wbi: Arc<Wbi>) -> Self {
        self.wbi = Some(wbi);
        self
    }

    /// Session cookies, e.g. `SESSDATA=...; bili_jct=...`.
    pub fn with_raw_cookies(mut self, raw: &str) -> Self {
        self.cookies = Cookies::parse(raw);
        self
    }

    pub fn with_cookies(mut self, cookies: Cookies) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn with_proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn build(self) -> Result<BiliRestClient, BiliError> {
        let http = if let Some(client) = self.http_client {
            client
        } else {
            let mut builder = Client::builder()
                .user_agent(self.user_agent.as_deref().unwrap_or(BROWSER_USER_AGENT));
            if let Some(timeout) = self.timeout {
                builder = builder.timeout(timeout);
            }
            if let Some(timeout) = self.connect_timeout {
                builder = builder.connect_timeout(timeout);
            }
            if let Some(headers) = self.default_headers {
                builder = builder.default_headers(headers);
            }
            if let Some(proxy) = self.proxy {
                builder = builder.proxy(proxy);
            }
            builder.build()?
        };

        let wbi = match self.wbi {
            Some(wbi) => wbi,
            None => Arc::new(
                Wbi::builder()
                    .with_env(self.env.clone())
                    .with_cookies(self.cookies.clone())
                    .build()?,
            ),
        };

        Ok(BiliRestClient {
            http,
            api_origin: self.env.api_origin,
            web_origin: self.env.web_origin,
            wbi,
            cookies: Arc::new(Mutex::new(self.cookies)),
        })
    }
}

/// Async HTTP client for Bilibili's web APIs.
///
/// Every call goes through [`execute`](Self::execute): the request type is flattened by
/// [`params::encode`], optionally signed and given a CSRF token, and the `{code, message,
/// data}` envelope is unwrapped into `T`. Cookies set by responses are kept for later calls.
///
/// ```no_run
/// use bilibili_fast::{BiliEnvironment, BiliRestClient, RequestOptions, RequestParams};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct UserInfo {
///     mid: u64,
/// }
///
/// impl RequestParams for UserInfo {}
///
/// # async fn run() -> Result<(), bilibili_fast::BiliError> {
/// let client = BiliRestClient::builder(BiliEnvironment::production())
///     .with_raw_cookies("SESSDATA=...; bili_jct=...")
///     .build()?;
///
/// let info: serde_json::Value = client
///     .get("/x/space/wbi/acc/info", &UserInfo { mid: 2 }, RequestOptions::wbi())
///     .await?;
/// println!("{}", info["name"]);
/// # Ok(())
/// # }
/// ```
///
/// Paths are joined onto the environment's API origin; an absolute URL is used as-is, which
/// is how endpoints on other hosts (`api.live.bilibili.com`, ...) are reached.
#[derive(Clone)]
pub struct BiliRestClient {
    http: Client,
    api_origin: Url,
    web_origin: String,
    wbi: Arc<Wbi>,
    cookies: Arc<Mutex<Cookies>>,
}

impl BiliRestClient {
    /// Start a configurable client builder.
    pub fn builder(env: BiliEnvironment) -> BiliRestClientBuilder {
        BiliRestClientBuilder::new(env)
    }

    /// Guest client with default transport settings.
    pub fn new(env: BiliEnvironment) -> Self {
        Self::builder(env)
            .build()
            .expect("default rest client builder should not fail")
    }

    pub fn wbi(&self) -> &Arc<Wbi> {
        &self.wbi
    }

    /// Current session cookies, including any set by responses.
    pub fn cookies(&self) -> Cookies {
        self.cookies.lock().clone()
    }

    pub fn set_cookies(&self, cookies: Cookies) {
        *self.cookies.lock() = cookies;
    }

    fn build_url(&self, path: &str) -> Result<Url, BiliError> {
        Ok(self.api_origin.join(path)?)
    }

    fn csrf_token(&self) -> Result<String, BiliError> {
        self.cookies
            .lock()
            .get(CSRF_COOKIE)
            .filter(|token| !token.is_empty())
            .map(str::to_owned)
            .ok_or(BiliError::CsrfMissing)
    }

    pub async fn get<P, T>(&self, path: &str, params: &P, options: RequestOptions) -> Result<T, BiliError>
    where
        P: RequestParams + 'static,
        T: DeserializeOwned,
    {
        self.execute(Method::GET, path, params, options).await
    }

    pub async fn post<P, T>(&self, path: &str, params: &P, options: RequestOptions) -> Result<T, BiliError>
    where
        P: RequestParams + 'static,
        T: DeserializeOwned,
    {
        self.execute(Method::POST, path, params, options).await
    }

    /// Send one request and unwrap its envelope. No retries.
    pub async fn execute<P, T>(
        &self,
        method: Method,
        path: &str,
        params: &P,
        options: RequestOptions,
    ) -> Result<T, BiliError>
    where
        P: RequestParams + 'static,
        T: DeserializeOwned,
    {
        let mut url = self.build_url(path)?;
        let encoded = params::encode(params)?;

        let mut query: ParamSet = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        query.extend(encoded.query);

        if options.csrf {
            let token = self.csrf_token()?;
            query.insert("csrf".to_string(), token.clone());
            query.insert("csrf_token".to_string(), token);
        }
        if options.wbi {
            query = self.wbi.sign(&query, SystemTime::now()).await?;
        }

        if query.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&wbi::encode_query(&query)));
        }

        debug!(
            method = %method,
            path = url.path(),
            content_type = %encoded.content_type,
            signed = options.wbi,
            "sending request"
        );

        let mut req = self.http.request(method, url);
        if !options.wbi {
            req = req
                .header(ORIGIN, self.web_origin.as_str())
                .header(REFERER, format!("{}/", self.web_origin));
        }
        let cookie_header = self.cookies.lock().to_string();
        if !cookie_header.is_empty() {
            req = req.header(COOKIE, cookie_header);
        }
        req = match encoded.body {
            Body::Empty => req,
            Body::Json(map) => req.json(&map),
            Body::Multipart(fields) => {
                let form = fields
                    .into_iter()
                    .fold(Form::new(), |form, (key, value)| form.text(key, value));
                req.multipart(form)
            }
        };

        let resp = req.send().await?;
        let status = resp.status();
        let set_cookies = Cookies::from_set_cookie_headers(resp.headers());
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            return Err(build_http_error(status, &bytes));
        }
        if !set_cookies.is_empty() {
            self.cookies.lock().merge(set_cookies);
        }

        let result = unwrap_envelope(&bytes);
        if let Err(BiliError::Api { code, message }) = &result {
            debug!(code, message = %message, "api returned an error code");
        }
        result
    }
}
