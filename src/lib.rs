//! # bilibili-fast
//!
//! Async Rust client plumbing for Bilibili's web APIs: WBI request signing with a shared,
//! self-refreshing key cache, and typed request parameters flattened into query strings,
//! JSON bodies or multipart forms.
//!
//! ## Features
//!
//! - **WBI signing** ([`Wbi`]): `wts` + `w_rid` over the sorted, sanitized query
//! - **Single-flight key refresh**: concurrent signers share one nav request
//! - **Pluggable key storage** ([`KeyStore`]) and key sources ([`KeySource`])
//! - **Directive-driven parameters** ([`RequestParams`], [`params::encode`])
//! - **REST client** ([`BiliRestClient`]) with CSRF, cookie tracking and envelope unwrapping
//! - **APP signing** ([`app_sign`]) for the legacy `appkey`/`sign` endpoints
//!
//! ## Quick Start: signing
//!
//! ```no_run
//! use std::time::SystemTime;
//! use bilibili_fast::{ParamSet, Wbi};
//!
//! # async fn run() -> Result<(), bilibili_fast::BiliError> {
//! let wbi = Wbi::builder()
//!     .with_raw_cookies("SESSDATA=...")
//!     .build()?;
//!
//! let mut params = ParamSet::new();
//! params.insert("mid".into(), "2".into());
//! let signed = wbi.sign(&params, SystemTime::now()).await?;
//! println!("w_rid={}", signed["w_rid"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Quick Start: REST
//!
//! ```no_run
//! use bilibili_fast::{BiliEnvironment, BiliRestClient, RequestOptions, RequestParams};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct ArchiveList {
//!     mid: u64,
//!     pn: u32,
//!     ps: u32,
//! }
//!
//! impl RequestParams for ArchiveList {
//!     const DIRECTIVES: &'static [(&'static str, &'static str)] = &[
//!         ("pn", "query,default=1"),
//!         ("ps", "query,default=30"),
//!     ];
//! }
//!
//! # async fn run() -> Result<(), bilibili_fast::BiliError> {
//! let client = BiliRestClient::new(BiliEnvironment::production());
//! let page: serde_json::Value = client
//!     .get(
//!         "/x/space/wbi/arc/search",
//!         &ArchiveList { mid: 2, pn: 0, ps: 0 },
//!         RequestOptions::wbi(),
//!     )
//!     .await?;
//! println!("{}", page["page"]["count"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Signing failures hand back the unsigned parameters ([`SignError::into_params`]); a
//! request sent with them will be rejected upstream, so most callers just propagate the
//! error. Nothing in the crate retries.
//!
//! ## Logging
//!
//! Key refreshes and requests emit `tracing` events. The crate installs no subscriber.

pub mod app;
pub mod cookies;
pub mod env;
pub mod error;
pub mod params;
pub mod rest;
pub mod types;
pub mod wbi;

#[cfg(test)]
mod test_server;

pub use app::{app_sign, sign_app_params};
pub use cookies::Cookies;
pub use env::{API_ORIGIN, BiliEnvironment, NAV_PATH, WEB_ORIGIN};
pub use error::{BiliError, EncodeError, RefreshError, SignError};
pub use params::{Body, EncodedParams, ParamSet, RequestParams};
pub use rest::{BiliRestClient, BiliRestClientBuilder, RequestOptions};
pub use types::*;
pub use wbi::{
    CachedKeys, KeyPair, KeySource, KeyStore, MemoryKeyStore, NavKeySource, Wbi, WbiBuilder,
};
