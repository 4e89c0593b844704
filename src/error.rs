use std::fmt;
use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

use crate::params::ParamSet;

/// Failure while turning a request value into transport parameters.
///
/// Raised before any network activity; none of these are recoverable by retrying.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// The root value is not a struct, an `Option` of a struct, or empty.
    #[error("unsupported parameter type: {0}")]
    UnsupportedType(&'static str),
    /// A directive table entry contains a token the parser does not know.
    #[error("invalid directive on field `{field}`: unknown token `{token}`")]
    Directive { field: String, token: String },
    /// Both JSON and form-data fields were emitted for the same request.
    #[error("request mixes json and form-data body fields")]
    MixedBody,
    #[error("{0}")]
    Custom(String),
}

impl serde::ser::Error for EncodeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        EncodeError::Custom(msg.to_string())
    }
}

/// Failure while fetching a fresh WBI key pair.
///
/// Cloneable so a single refresh outcome can be handed to every caller that waited on it.
#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    #[error("key refresh transport error: {0}")]
    Transport(Arc<reqwest::Error>),
    #[error("key refresh timed out")]
    Timeout,
    #[error("key refresh failed with HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("key refresh returned a malformed body: {0}")]
    Malformed(String),
    /// Application error code and no usable key URLs.
    #[error("key refresh rejected, code {code}: {message}")]
    Api { code: i64, message: String },
    #[error("no key pair available after refresh")]
    Missing,
}

impl From<reqwest::Error> for RefreshError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RefreshError::Timeout
        } else {
            RefreshError::Transport(Arc::new(err))
        }
    }
}

/// Signing could not proceed because no key pair could be obtained.
///
/// The caller's parameters come back untouched through [`SignError::into_params`]; a request
/// must not be sent with them.
#[derive(Debug, Clone, Error)]
#[error("wbi signing failed: {source}")]
pub struct SignError {
    #[source]
    source: RefreshError,
    params: ParamSet,
}

impl SignError {
    pub(crate) fn new(source: RefreshError, params: ParamSet) -> Self {
        Self { source, params }
    }

    pub fn refresh_error(&self) -> &RefreshError {
        &self.source
    }

    /// The original, unsigned parameters.
    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    pub fn into_params(self) -> ParamSet {
        self.params
    }
}

/// Crate-level error returned by the REST client.
#[derive(Debug, Error)]
pub enum BiliError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Refresh(#[from] RefreshError),
    #[error(transparent)]
    Sign(#[from] SignError),
    #[error("HTTP {status}: {raw_body}")]
    Http {
        status: StatusCode,
        raw_body: String,
    },
    /// The response envelope carried a non-zero `code`.
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("header error: {0}")]
    Header(String),
    /// `bili_jct` is missing from the cookie header; the session is not logged in.
    #[error("csrf token missing from cookies (bili_jct)")]
    CsrfMissing,
    #[error("invalid params: {0}")]
    InvalidParams(String),
}
