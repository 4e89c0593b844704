use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// --- Content Type ---

/// How an encoded request travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    /// Nothing to send beyond the URL.
    #[default]
    None,
    /// Parameters only in the query string.
    Query,
    Json,
    Multipart,
}

impl ContentType {
    /// MIME type for the `Content-Type` header, if the request has one.
    pub fn mime(self) -> Option<&'static str> {
        match self {
            ContentType::None => None,
            ContentType::Query => Some("application/x-www-form-urlencoded"),
            ContentType::Json => Some("application/json"),
            ContentType::Multipart => Some("multipart/form-data"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::None => "none",
            ContentType::Query => "query",
            ContentType::Json => "json",
            ContentType::Multipart => "multipart",
        }
    }

    pub fn has_body(self) -> bool {
        matches!(self, ContentType::Json | ContentType::Multipart)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ContentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// --- Response Envelope ---

/// The `{code, message, data}` wrapper every Bilibili JSON response uses.
///
/// `data` is optional because error responses frequently omit it or send `null`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default, alias = "msg")]
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}
