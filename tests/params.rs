//! Encoding typed request values through the public API.

use bilibili_fast::params::{Container, FieldDirective, encode, to_snake_case};
use bilibili_fast::{Body, ContentType, EncodeError, RequestParams};
use serde::Serialize;
use serde_json::json;

// ============================================================================
// Realistic request types
// ============================================================================

#[derive(Serialize, Default)]
struct SearchArchives {
    mid: u64,
    keyword: String,
    pn: u32,
    ps: u32,
    order: String,
    #[serde(rename = "TagId")]
    tag_id: Option<u64>,
}

impl RequestParams for SearchArchives {
    const DIRECTIVES: &'static [(&'static str, &'static str)] = &[
        ("pn", "query,default=1"),
        ("ps", "query,default=30"),
        ("order", "query,default=pubdate"),
        ("keyword", "query,omitempty"),
        ("TagId", "omitempty"),
    ];
}

#[derive(Serialize)]
struct SendDanmaku {
    oid: u64,
    msg: String,
    mode: u8,
    color: u32,
    access_key: String,
}

impl RequestParams for SendDanmaku {
    const DIRECTIVES: &'static [(&'static str, &'static str)] = &[
        ("oid", "form-data"),
        ("msg", "form-data"),
        ("mode", "form-data,default=1"),
        ("color", "form-data,default=16777215"),
        ("access_key", "-"),
    ];
}

#[derive(Serialize)]
struct CreateDynamic {
    dyn_req: serde_json::Value,
    upload_id: String,
    platform: String,
}

impl RequestParams for CreateDynamic {
    const DIRECTIVES: &'static [(&'static str, &'static str)] = &[
        ("dyn_req", "json"),
        ("upload_id", "json,omitempty"),
        ("platform", "query,default=web"),
    ];
}

// ============================================================================
// Containers
// ============================================================================

#[test]
fn query_defaults_and_omissions() {
    let encoded = encode(&SearchArchives {
        mid: 2,
        ..Default::default()
    })
    .unwrap();

    assert_eq!(encoded.content_type, ContentType::Query);
    assert_eq!(encoded.body, Body::Empty);
    assert_eq!(encoded.query["mid"], "2");
    assert_eq!(encoded.query["pn"], "1");
    assert_eq!(encoded.query["ps"], "30");
    assert_eq!(encoded.query["order"], "pubdate");
    assert!(!encoded.query.contains_key("keyword"));
    assert!(!encoded.query.contains_key("tag_id"));
}

#[test]
fn set_values_override_defaults() {
    let encoded = encode(&SearchArchives {
        mid: 2,
        keyword: "rust".into(),
        pn: 3,
        ps: 50,
        order: "click".into(),
        tag_id: Some(0),
    })
    .unwrap();

    assert_eq!(encoded.query["keyword"], "rust");
    assert_eq!(encoded.query["pn"], "3");
    assert_eq!(encoded.query["ps"], "50");
    assert_eq!(encoded.query["order"], "click");
    // A present option counts as set even when it holds zero.
    assert_eq!(encoded.query["tag_id"], "0");
}

#[test]
fn form_data_request_is_multipart() {
    let encoded = encode(&SendDanmaku {
        oid: 1176840,
        msg: "hello".into(),
        mode: 0,
        color: 0,
        access_key: "secret".into(),
    })
    .unwrap();

    assert_eq!(encoded.content_type, ContentType::Multipart);
    assert!(encoded.query.is_empty());
    let Body::Multipart(form) = encoded.body else {
        panic!("expected a multipart body");
    };
    assert_eq!(form["oid"], "1176840");
    assert_eq!(form["msg"], "hello");
    assert_eq!(form["mode"], "1");
    assert_eq!(form["color"], "16777215");
    assert!(!form.contains_key("access_key"));
}

#[test]
fn json_request_keeps_nested_values_and_query_fields() {
    let encoded = encode(&CreateDynamic {
        dyn_req: json!({"content": {"contents": [{"raw_text": "hi", "type": 1}]}}),
        upload_id: String::new(),
        platform: String::new(),
    })
    .unwrap();

    assert_eq!(encoded.content_type, ContentType::Json);
    assert_eq!(encoded.query["platform"], "web");
    let Body::Json(body) = encoded.body else {
        panic!("expected a json body");
    };
    assert_eq!(
        body["dyn_req"]["content"]["contents"][0]["raw_text"],
        json!("hi")
    );
    assert!(!body.contains_key("upload_id"));
}

// ============================================================================
// Failures
// ============================================================================

#[derive(Serialize)]
struct Typo {
    mid: u64,
}

impl RequestParams for Typo {
    const DIRECTIVES: &'static [(&'static str, &'static str)] = &[("mid", "qeury")];
}

#[test]
fn unknown_directive_token_is_reported() {
    let err = encode(&Typo { mid: 1 }).unwrap_err();
    assert_eq!(
        err,
        EncodeError::Directive {
            field: "mid".into(),
            token: "qeury".into(),
        }
    );
}

#[derive(Serialize)]
struct Ids(Vec<u64>);

impl RequestParams for Ids {}

#[test]
fn non_struct_root_is_unsupported() {
    assert!(matches!(
        encode(&Ids(vec![1, 2])),
        Err(EncodeError::UnsupportedType(_))
    ));
}

#[test]
fn absent_root_encodes_to_nothing() {
    let encoded = encode(&None::<SearchArchives>).unwrap();
    assert!(encoded.is_empty());
    assert_eq!(encoded.content_type, ContentType::None);
}

// ============================================================================
// Directive grammar
// ============================================================================

#[test]
fn directive_parsing_and_key_naming() {
    let d = FieldDirective::parse("TestB", "field=tb,default=1").unwrap();
    assert_eq!(d.container, Container::Query);
    assert_eq!(d.key("TestB"), "tb");
    assert_eq!(d.default.as_deref(), Some("1"));

    let d = FieldDirective::parse("TestD", "-").unwrap();
    assert_eq!(d.container, Container::Excluded);

    assert_eq!(to_snake_case("TestA"), "test_a");
    assert_eq!(to_snake_case("upload_id"), "upload_id");
}
