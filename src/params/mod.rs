//! Typed request values to transport parameters.
//!
//! A request type derives [`serde::Serialize`] and implements [`RequestParams`], listing a
//! tag per field that needs one (see [`FieldDirective`] for the grammar). [`encode`] walks
//! the serialized fields and sorts each into the query string, a JSON body or a multipart
//! body.
//!
//! ```
//! use bilibili_fast::params::{encode, RequestParams};
//! use bilibili_fast::ContentType;
//! use serde::Serialize;
//!
//! #[derive(Serialize, Default)]
//! struct SearchParams {
//!     keyword: String,
//!     page: u32,
//!     order: String,
//! }
//!
//! impl RequestParams for SearchParams {
//!     const DIRECTIVES: &'static [(&'static str, &'static str)] = &[
//!         ("page", "query,default=1"),
//!         ("order", "query,omitempty"),
//!     ];
//! }
//!
//! let encoded = encode(&SearchParams { keyword: "rust".into(), ..Default::default() }).unwrap();
//! assert_eq!(encoded.content_type, ContentType::Query);
//! assert_eq!(encoded.query["keyword"], "rust");
//! assert_eq!(encoded.query["page"], "1");
//! assert!(!encoded.query.contains_key("order"));
//! ```

mod capture;
mod directive;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::EncodeError;
use crate::types::ContentType;

use capture::FieldValue;
pub use directive::{Container, FieldDirective, to_snake_case};

/// One request's flat parameters. Key order is irrelevant to callers; the sorted order is
/// what signing needs.
pub type ParamSet = BTreeMap<String, String>;

/// A request type the encoder can flatten.
///
/// `DIRECTIVES` pairs a serialized field name (after any `#[serde(rename)]`) with its tag.
/// Untagged fields go to the query string under their snake-cased name. Fields serde skips
/// are invisible to the encoder.
pub trait RequestParams: Serialize {
    const DIRECTIVES: &'static [(&'static str, &'static str)] = &[];
}

impl RequestParams for () {}

impl<T: RequestParams> RequestParams for Option<T> {
    const DIRECTIVES: &'static [(&'static str, &'static str)] = T::DIRECTIVES;
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    Json(Map<String, Value>),
    Multipart(ParamSet),
}

/// Output of [`encode`].
///
/// Query-container fields always land in `query`, even when a body is present.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EncodedParams {
    pub content_type: ContentType,
    pub query: ParamSet,
    pub body: Body,
}

impl EncodedParams {
    pub fn is_empty(&self) -> bool {
        self.query.is_empty() && matches!(self.body, Body::Empty)
    }
}

/// Flatten `params` according to its directives.
///
/// `None` and `()` produce an empty result with [`ContentType::None`]. A root that is not a
/// struct fails with [`EncodeError::UnsupportedType`]. When two fields resolve to the same
/// key in the same container, the later field wins.
pub fn encode<P: RequestParams + 'static>(params: &P) -> Result<EncodedParams, EncodeError> {
    let Some(fields) = capture::capture_fields(params)? else {
        return Ok(EncodedParams::default());
    };
    let shape = directive::shape_of::<P>()?;

    let mut query = ParamSet::new();
    let mut json = Map::new();
    let mut form = ParamSet::new();

    for (field, value) in fields {
        let directive = shape.directive(&field);
        if directive.container == Container::Excluded {
            continue;
        }
        let Some(value) = resolve(value, directive) else {
            continue;
        };

        let key = directive.key(&field);
        match directive.container {
            Container::Query => {
                query.insert(key, value.into_param_string());
            }
            Container::Json => {
                json.insert(key, value.into_json());
            }
            Container::FormData => {
                form.insert(key, value.into_param_string());
            }
            Container::Excluded => {}
        }
    }

    let (content_type, body) = match (json.is_empty(), form.is_empty()) {
        (false, false) => return Err(EncodeError::MixedBody),
        (false, true) => (ContentType::Json, Body::Json(json)),
        (true, false) => (ContentType::Multipart, Body::Multipart(form)),
        (true, true) if !query.is_empty() => (ContentType::Query, Body::Empty),
        (true, true) => (ContentType::None, Body::Empty),
    };

    Ok(EncodedParams {
        content_type,
        query,
        body,
    })
}

/// Apply default and omit rules. `None` drops the field.
///
/// A declared default beats `omitempty`.
fn resolve(value: FieldValue, directive: &FieldDirective) -> Option<FieldValue> {
    if !value.is_zero() {
        return Some(value);
    }
    match &directive.default {
        Some(default) => Some(FieldValue::Str(default.clone())),
        None if directive.omit_empty => None,
        None => Some(value),
    }
}
