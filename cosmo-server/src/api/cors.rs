//! Cross-origin policy
//!
//! Browsers on any localhost port, Netlify deployments and an optional
//! configured front end may call the API. The execution id header is exposed
//! so those callers can read it from a submission response.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, request::Parts};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::api::EXECUTION_ID_HEADER;

/// Whether a browser origin may call the API
pub fn origin_allowed(origin: &str, frontend_url: Option<&str>) -> bool {
    if frontend_url.is_some_and(|url| url.trim_end_matches('/') == origin) {
        return true;
    }

    if let Some(rest) = origin.strip_prefix("http://localhost") {
        return rest.is_empty()
            || rest
                .strip_prefix(':')
                .is_some_and(|port| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()));
    }

    origin
        .strip_prefix("https://")
        .and_then(|host| host.strip_suffix(".netlify.app"))
        .is_some_and(|sub| !sub.is_empty() && !sub.contains('/'))
}

pub fn cors_layer(frontend_url: Option<String>) -> CorsLayer {
    let allow = AllowOrigin::predicate(move |origin: &HeaderValue, _parts: &Parts| {
        origin
            .to_str()
            .is_ok_and(|origin| origin_allowed(origin, frontend_url.as_deref()))
    });

    CorsLayer::new()
        .allow_origin(allow)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(EXECUTION_ID_HEADER)])
        .max_age(Duration::from_secs(3600))
}
