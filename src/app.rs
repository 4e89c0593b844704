//! Legacy APP API signature (`appkey` + `sign`).

use std::time::{SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};
use percent_encoding::utf8_percent_encode;

use crate::params::ParamSet;
use crate::wbi::COMPONENT;

/// `sign` for an APP API request: MD5 of the sorted, form-encoded non-empty parameters with
/// `app_secret` appended, as lowercase hex.
pub fn app_sign(params: &ParamSet, app_secret: &str) -> String {
    let query = params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", form_escape(k), form_escape(v)))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Md5::digest(format!("{query}{app_secret}").as_bytes()))
}

/// Copy of `params` with `appkey`, `ts` (unix seconds) and `sign` filled in.
///
/// A caller-supplied `ts` is kept; an existing `sign` is recomputed.
pub fn sign_app_params(
    params: &ParamSet,
    app_key: &str,
    app_secret: &str,
    now: SystemTime,
) -> ParamSet {
    let mut signed = params.clone();
    signed.remove("sign");
    signed.insert("appkey".to_string(), app_key.to_string());
    signed.entry("ts".to_string()).or_insert_with(|| {
        now.duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
            .to_string()
    });
    let sign = app_sign(&signed, app_secret);
    signed.insert("sign".to_string(), sign);
    signed
}

fn form_escape(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT)
        .to_string()
        .replace("%20", "+")
}
