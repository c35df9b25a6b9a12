//! Ingress-prefix HTML rewriting.
//!
//! The operator UI is typically reached through a reverse proxy that mounts
//! it under a sub-path (e.g. Home Assistant's ingress). The proxy tells us
//! that prefix via `X-Ingress-Path`; root-relative `href="/..."` and
//! `src="/..."` attributes in HTML responses are rewritten to carry it, so
//! the served page's links keep working behind the sub-path. Non-HTML
//! responses pass through untouched.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;

const INGRESS_HEADER: &str = "x-ingress-path";

/// `axum::middleware::map_response` hook: rewrites `href="/` and `src="/`
/// attributes in HTML bodies to be prefixed with the ingress path, when one
/// was supplied by the reverse proxy.
pub async fn rewrite_ingress_prefix(response: Response) -> Response {
    let Some(prefix) = ingress_prefix(response.headers()) else {
        return response;
    };
    if !is_html(response.headers()) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, usize::MAX).await else {
        return Response::from_parts(parts, Body::empty());
    };
    let Ok(html) = std::str::from_utf8(&bytes) else {
        return Response::from_parts(parts, Body::from(bytes));
    };

    let rewritten = rewrite_html(html, &prefix);
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(rewritten))
}

fn ingress_prefix(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(INGRESS_HEADER)?.to_str().ok()?.trim_end_matches('/');
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"))
}

fn rewrite_html(html: &str, prefix: &str) -> String {
    html.replace("href=\"/", &format!("href=\"{prefix}/")).replace("src=\"/", &format!("src=\"{prefix}/"))
}

#[allow(dead_code)]
fn ingress_header_value(prefix: &str) -> HeaderValue {
    HeaderValue::from_str(prefix).unwrap_or_else(|_| HeaderValue::from_static(""))
}
