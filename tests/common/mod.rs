use std::sync::Once;

use bilibili_fast::{BiliEnvironment, BiliRestClient};
use tokio::time::Duration;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(20);

static INIT: Once = Once::new();

fn init() {
    INIT.call_once(|| {
        let _ = dotenvy::dotenv();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Raw cookie header from `BILI_COOKIE`, if set.
pub fn cookie() -> Option<String> {
    init();
    std::env::var("BILI_COOKIE").ok().filter(|c| !c.is_empty())
}

pub fn guest_client() -> BiliRestClient {
    init();
    BiliRestClient::new(BiliEnvironment::production())
}

pub fn logged_in_client() -> Option<BiliRestClient> {
    let cookie = cookie()?;
    Some(
        BiliRestClient::builder(BiliEnvironment::production())
            .with_raw_cookies(&cookie)
            .build()
            .expect("client"),
    )
}
