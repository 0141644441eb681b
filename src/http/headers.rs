//! Proxy header rewriting.
//!
//! # Responsibilities
//! - Build the upstream URI from the backend base URL and the inbound URI
//! - Add X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host
//! - Point `Host` at the backend
//! - Strip hop-by-hop headers in both directions

use std::net::SocketAddr;

use axum::http::{
    header::{self, HeaderName},
    uri::InvalidUri,
    HeaderMap, HeaderValue, Uri,
};
use url::Url;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Headers that apply to a single transport hop and must not be forwarded.
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// `host[:port]` of a backend base URL.
pub fn authority(base: &Url) -> String {
    let host = base.host_str().unwrap_or_default();
    match base.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Join the backend base URL with the inbound path and query.
///
/// `http://b:3000/api` + `/users?id=1` → `http://b:3000/api/users?id=1`.
pub fn upstream_uri(base: &Url, inbound: &Uri) -> Result<Uri, InvalidUri> {
    let base_path = base.path().trim_end_matches('/');
    let path = inbound.path();

    let mut target = format!("{}://{}{}", base.scheme(), authority(base), base_path);
    if !path.starts_with('/') {
        target.push('/');
    }
    target.push_str(path);
    if let Some(query) = inbound.query() {
        target.push('?');
        target.push_str(query);
    }

    target.parse()
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Rewrite inbound request headers for forwarding to `upstream_authority`.
///
/// `original_host` is the host the client addressed (Host header or, for
/// HTTP/2, the URI authority).
pub fn rewrite_request_headers(
    headers: &mut HeaderMap,
    original_host: Option<HeaderValue>,
    client_addr: Option<SocketAddr>,
    upstream_authority: &str,
) {
    strip_hop_by_hop(headers);

    if let Some(addr) = client_addr {
        let ip = addr.ip().to_string();
        let forwarded_for = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{}, {}", prior, ip),
            None => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if !headers.contains_key(&X_FORWARDED_HOST) {
        if let Some(host) = original_host {
            headers.insert(X_FORWARDED_HOST, host);
        }
    }
    if !headers.contains_key(&X_FORWARDED_PROTO) {
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    }

    if let Ok(host) = HeaderValue::from_str(upstream_authority) {
        headers.insert(header::HOST, host);
    }
}
