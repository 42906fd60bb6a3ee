//! Request forwarding

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use tracing::{debug, error};
use url::Url;

use crate::errors::BoardError;
use crate::proxy::ProxyState;

/// Largest request body the proxy buffers
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Headers that describe a single hop and are never forwarded
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// Answer preflights locally, forward everything else, then add CORS headers
pub async fn proxy_handler(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        match forward(&state, request).await {
            Ok(response) => response,
            Err(e) => {
                error!("Proxy request failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Proxy error: {}", e)).into_response()
            }
        }
    };

    apply_cors_headers(response.headers_mut());
    response
}

async fn forward(state: &ProxyState, request: Request) -> Result<Response, BoardError> {
    let (parts, body) = request.into_parts();
    let url = upstream_url(&state.target, parts.uri.path(), parts.uri.query());
    debug!("{} {}", parts.method, url);

    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| BoardError::ServerError(format!("reading request body: {}", e)))?;

    let upstream = state
        .client
        .request(parts.method, url)
        .headers(forwardable(&parts.headers))
        .body(body)
        .send()
        .await?;

    let status = upstream.status();
    let headers = forwardable(upstream.headers());
    let bytes = upstream.bytes().await?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response.headers_mut().remove(header::CONTENT_LENGTH);
    Ok(response)
}

/// Target URL for a request path, keeping any base path of the target
pub fn upstream_url(target: &Url, path: &str, query: Option<&str>) -> Url {
    let mut url = target.clone();
    let base = target.path().trim_end_matches('/');
    url.set_path(&format!("{}/{}", base, path.trim_start_matches('/')));
    url.set_query(query);
    url
}

fn forwardable(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if HOP_BY_HOP.contains(&name.as_str()) || name == header::CONTENT_LENGTH {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Permissive CORS headers added to every proxy response
pub fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
}
