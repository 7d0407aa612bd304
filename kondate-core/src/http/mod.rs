//! HTTP fetching with a fixed politeness delay.
//!
//! Every request the crawler makes (listing pages, detail pages, note images)
//! goes through an [`HttpClient`], so tests can swap in [`MockClient`].

pub(crate) mod charset;
mod client;
mod rate_limiter;

pub use charset::decode_bytes_to_utf8;
pub use client::{FetchedPage, HttpClient, MockClient, ReqwestClient, ReqwestClientBuilder};
pub use rate_limiter::RateLimiter;

/// Resolve `href` against `base`, returning an absolute URL.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match url::Url::parse(base) {
        Ok(base) => base.join(href).ok().map(String::from),
        Err(_) => url::Url::parse(href).ok().map(String::from),
    }
}

/// Last path segment of a URL, used as an attachment file name.
pub fn file_name_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(|s| s.to_string())
}
