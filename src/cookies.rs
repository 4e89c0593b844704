use std::fmt;

use reqwest::header::{HeaderMap, SET_COOKIE};

/// In-memory cookie header: ordered `name=value` pairs, nothing persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    pairs: Vec<(String, String)>,
}

impl Cookies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw `Cookie` header value such as `"SESSDATA=abc; bili_jct=def"`.
    ///
    /// Fragments without `=` are ignored.
    pub fn parse(raw: &str) -> Self {
        let mut cookies = Self::new();
        for part in raw.split(';') {
            if let Some((name, value)) = part.trim().split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    cookies.set(name, value.trim());
                }
            }
        }
        cookies
    }

    /// Collect the `name=value` part of every `Set-Cookie` header.
    pub fn from_set_cookie_headers(headers: &HeaderMap) -> Self {
        let mut cookies = Self::new();
        for value in headers.get_all(SET_COOKIE) {
            let Ok(text) = value.to_str() else {
                continue;
            };
            let pair = text.split(';').next().unwrap_or_default();
            if let Some((name, value)) = pair.trim().split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    cookies.set(name, value.trim());
                }
            }
        }
        cookies
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or replace `name`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((name, value)),
        }
    }

    /// Overlay `other` onto `self`; cookies in `other` win.
    pub fn merge(&mut self, other: Cookies) {
        for (name, value) in other.pairs {
            self.set(name, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }
}

impl fmt::Display for Cookies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn parses_raw_header() {
        let cookies = Cookies::parse("buvid3=abc; b_nut=1712902068;bili_jct=tok ; junk");
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies.get("bili_jct"), Some("tok"));
        assert_eq!(cookies.get("junk"), None);
        assert_eq!(cookies.to_string(), "buvid3=abc; b_nut=1712902068; bili_jct=tok");
    }

    #[test]
    fn values_may_contain_equals() {
        let cookies = Cookies::parse("buvid4=66CC%3D%3D; x=a=b");
        assert_eq!(cookies.get("x"), Some("a=b"));
    }

    #[test]
    fn collects_set_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("buvid3=new; Path=/; Domain=.bilibili.com"),
        );
        headers.append(SET_COOKIE, HeaderValue::from_static("b_nut=42; HttpOnly"));

        let cookies = Cookies::from_set_cookie_headers(&headers);
        assert_eq!(cookies.to_string(), "buvid3=new; b_nut=42");
    }

    #[test]
    fn merge_overrides_existing() {
        let mut cookies = Cookies::parse("a=1; b=2");
        cookies.merge(Cookies::parse("b=3; c=4"));
        assert_eq!(cookies.to_string(), "a=1; b=3; c=4");
    }
}
