//! CORS handling.
//!
//! Preflight `OPTIONS` requests on any path are answered with 204 directly.
//! Every other response gets the same headers added on the way out.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use url::Url;

use crate::config::Config;

const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const DEFAULT_ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Origin policy: permissive unless an allow-list or trusted domain is set.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    origins: Option<Vec<String>>,
    trusted_domain: Option<String>,
}

impl CorsPolicy {
    pub fn new(origins: Option<Vec<String>>, trusted_domain: Option<String>) -> Self {
        Self {
            origins,
            trusted_domain,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.cors_origins.clone(),
            config.cors_trusted_domain.clone(),
        )
    }

    fn is_permissive(&self) -> bool {
        match &self.origins {
            Some(list) => list.iter().any(|o| o == "*"),
            None => self.trusted_domain.is_none(),
        }
    }

    /// Value for `Access-Control-Allow-Origin`, or `None` if the origin is
    /// not allowed.
    pub fn allow_origin(&self, origin: Option<&str>) -> Option<String> {
        if self.is_permissive() {
            return Some("*".to_string());
        }
        let origin = origin?;
        let listed = self
            .origins
            .as_ref()
            .map(|list| list.iter().any(|o| o == origin))
            .unwrap_or(false);
        if listed || self.is_trusted_subdomain(origin) {
            Some(origin.to_string())
        } else {
            None
        }
    }

    fn is_trusted_subdomain(&self, origin: &str) -> bool {
        let Some(domain) = self.trusted_domain.as_deref() else {
            return false;
        };
        let Ok(url) = Url::parse(origin) else {
            return false;
        };
        url.scheme() == "https"
            && url
                .host_str()
                .map(|host| host.ends_with(&format!(".{}", domain)))
                .unwrap_or(false)
    }
}

/// Middleware applying [`CorsPolicy`].
pub async fn cors(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let allowed = policy.allow_origin(origin.as_deref());

    if *request.method() == Method::OPTIONS {
        let requested_headers = request
            .headers()
            .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
            .cloned();
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        apply_headers(headers, allowed.as_deref());
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            requested_headers.unwrap_or(HeaderValue::from_static(DEFAULT_ALLOW_HEADERS)),
        );
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static("86400"),
        );
        return response;
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    apply_headers(headers, allowed.as_deref());
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(DEFAULT_ALLOW_HEADERS),
    );
    response
}

fn apply_headers(headers: &mut HeaderMap, allowed: Option<&str>) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    let Some(allowed) = allowed else {
        return;
    };
    if let Ok(value) = HeaderValue::from_str(allowed) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    if allowed != "*" {
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_permissive() {
        let policy = CorsPolicy::default();
        assert_eq!(policy.allow_origin(None), Some("*".to_string()));
        assert_eq!(
            policy.allow_origin(Some("https://anything.example")),
            Some("*".to_string())
        );
    }

    #[test]
    fn test_allow_list_exact_match() {
        let policy = CorsPolicy::new(Some(vec!["https://app.example.com".into()]), None);
        assert_eq!(
            policy.allow_origin(Some("https://app.example.com")),
            Some("https://app.example.com".to_string())
        );
        assert_eq!(policy.allow_origin(Some("https://evil.example")), None);
        assert_eq!(policy.allow_origin(None), None);
    }

    #[test]
    fn test_wildcard_in_list() {
        let policy = CorsPolicy::new(Some(vec!["*".into()]), Some("vercel.app".into()));
        assert_eq!(
            policy.allow_origin(Some("https://x.example")),
            Some("*".to_string())
        );
    }

    #[test]
    fn test_trusted_subdomain() {
        let policy = CorsPolicy::new(None, Some("vercel.app".into()));
        assert_eq!(
            policy.allow_origin(Some("https://my-app-git-main.vercel.app")),
            Some("https://my-app-git-main.vercel.app".to_string())
        );
        assert_eq!(policy.allow_origin(Some("http://my-app.vercel.app")), None);
        assert_eq!(policy.allow_origin(Some("https://vercel.app.evil.com")), None);
        assert_eq!(policy.allow_origin(Some("https://evilvercel.app")), None);
    }
}
