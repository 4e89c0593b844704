mod client;

pub use client::{
    BiliRestClient, BiliRestClientBuilder, CSRF_COOKIE, DEFAULT_TIMEOUT, RequestOptions,
};
