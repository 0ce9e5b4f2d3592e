//! Request relay for the newsletter service.
//!
//! The gateway forwards the inbound request once and hands back whatever the
//! downstream answered: same status, filtered headers, body normalized to JSON.
//! Only a transport failure (nothing came back) is turned into a gateway error.

use actix_web::http::{header::HeaderValue, Method, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse};
use std::time::Instant;

use crate::error::GatewayError;
use crate::metrics::{status_class, PROXY_LATENCY, PROXY_REQUESTS};

/// Headers not copied from the client request.
const HEADERS_TO_STRIP: &[&str] = &[
    "host",
    "content-length", // Recomputed by the client for the relayed body
    "content-type",   // Always re-sent as application/json
    "connection",
    "keep-alive",
    "transfer-encoding",
    "accept-encoding", // The client does not decode, so ask for identity bodies
];

/// Headers not copied from the downstream response.
const RESPONSE_HEADERS_TO_STRIP: &[&str] = &[
    "content-encoding",
    "transfer-encoding",
    "connection",
    "content-length", // Recomputed for the relayed body
];

const JSON: &str = "application/json";

/// Join the downstream origin with the inbound path and query.
pub fn downstream_url(origin: &str, req: &HttpRequest) -> String {
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| req.path());
    format!("{}{}", origin.trim_end_matches('/'), path_and_query)
}

fn outbound_headers(req: &HttpRequest) -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();
    for (name, value) in req.headers() {
        let name_lower = name.as_str().to_ascii_lowercase();
        if HEADERS_TO_STRIP.contains(&name_lower.as_str()) {
            continue;
        }
        // actix and reqwest sit on different `http` major versions
        if let (Ok(n), Ok(v)) = (
            reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()),
            reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            headers.append(n, v);
        }
    }
    headers.insert(
        reqwest::header::CONTENT_TYPE,
        reqwest::header::HeaderValue::from_static(JSON),
    );
    headers
}

/// Normalize a downstream body to JSON.
///
/// Parseable JSON passes through untouched, other non-empty content becomes a
/// JSON string, and an empty body stays empty.
pub fn json_body(raw: &[u8]) -> Vec<u8> {
    if raw.is_empty() {
        return Vec::new();
    }
    if serde_json::from_slice::<serde::de::IgnoredAny>(raw).is_ok() {
        return raw.to_vec();
    }
    let text = String::from_utf8_lossy(raw);
    serde_json::to_vec(&text).unwrap_or_default()
}

/// Forward `req` to `origin` and relay the answer.
///
/// `OPTIONS` is answered locally with an empty 200.
pub async fn forward(
    client: &reqwest::Client,
    origin: &str,
    req: &HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, GatewayError> {
    if *req.method() == Method::OPTIONS {
        return Ok(HttpResponse::Ok().finish());
    }

    let url = downstream_url(origin, req);
    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
        .map_err(|_| GatewayError::BadRequest("Unsupported HTTP method".to_string()))?;

    let mut request_builder = client
        .request(method.clone(), &url)
        .headers(outbound_headers(req));
    if !body.is_empty() {
        request_builder = request_builder.body(body.to_vec());
    }

    let started = Instant::now();
    let result = relay(request_builder).await;
    let elapsed = started.elapsed().as_secs_f64();

    match &result {
        Ok(resp) => {
            let status = resp.status().as_u16();
            PROXY_REQUESTS
                .with_label_values(&["relayed", status_class(status)])
                .inc();
            PROXY_LATENCY.with_label_values(&["relayed"]).observe(elapsed);
            tracing::debug!(method = %method, url = %url, status, "relayed newsletter request");
        }
        Err(e) => {
            PROXY_REQUESTS
                .with_label_values(&["unavailable", "none"])
                .inc();
            PROXY_LATENCY
                .with_label_values(&["unavailable"])
                .observe(elapsed);
            tracing::error!(method = %method, url = %url, error = %e, "newsletter service unreachable");
        }
    }

    result
}

async fn relay(request_builder: reqwest::RequestBuilder) -> Result<HttpResponse, GatewayError> {
    let response = request_builder
        .send()
        .await
        .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;

    let status = response.status();
    let headers = response.headers().clone();
    let raw = response
        .bytes()
        .await
        .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;

    let mut builder = HttpResponse::build(
        StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
    );

    let mut has_content_type = false;
    for (name, value) in headers.iter() {
        let name_lower = name.as_str().to_ascii_lowercase();
        if RESPONSE_HEADERS_TO_STRIP.contains(&name_lower.as_str()) {
            continue;
        }
        if let Ok(v) = HeaderValue::from_bytes(value.as_bytes()) {
            has_content_type |= name_lower == "content-type";
            builder.append_header((name.as_str(), v));
        }
    }
    if !has_content_type {
        builder.insert_header(("content-type", JSON));
    }

    Ok(builder.body(json_body(&raw)))
}
