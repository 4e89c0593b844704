use url::Url;

pub const API_ORIGIN: &str = "https://api.bilibili.com";
pub const WEB_ORIGIN: &str = "https://www.bilibili.com";

/// Path of the nav endpoint that serves the WBI key URLs.
pub const NAV_PATH: &str = "/x/web-interface/nav";

/// Which hosts the client talks to.
///
/// Tests point `api_origin` at a local server; everything else uses
/// [`BiliEnvironment::production`].
#[derive(Debug, Clone)]
pub struct BiliEnvironment {
    pub api_origin: Url,
    /// Sent as `Origin`/`Referer` on unsigned browser-style requests.
    pub web_origin: String,
}

impl BiliEnvironment {
    pub fn production() -> Self {
        Self {
            api_origin: Url::parse(API_ORIGIN).expect("API_ORIGIN is a valid url"),
            web_origin: WEB_ORIGIN.to_string(),
        }
    }

    pub fn with_api_origin(api_origin: Url) -> Self {
        Self {
            api_origin,
            ..Self::production()
        }
    }

    pub fn nav_url(&self) -> Result<Url, url::ParseError> {
        self.api_origin.join(NAV_PATH)
    }
}

impl Default for BiliEnvironment {
    fn default() -> Self {
        Self::production()
    }
}
