use crate::errors::AppError;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Who is acting on a request, for the audit trail.
#[derive(Debug, Clone)]
pub struct Actor {
    pub email: String,
    pub ip: Option<String>,
}

impl Actor {
    pub fn system() -> Self {
        Self {
            email: "system".to_string(),
            ip: None,
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let email = header("x-user-email").unwrap_or("system").to_string();
        let ip = header("x-forwarded-for")
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .or_else(|| header("x-real-ip"))
            .map(str::to_string);

        Self { email, ip }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Treats `?key=` the same as an absent parameter.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn actor_defaults_to_system() {
        let actor = Actor::from_headers(&HeaderMap::new());
        assert_eq!(actor.email, "system");
        assert_eq!(actor.ip, None);
    }

    #[test]
    fn actor_takes_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-email", HeaderValue::from_static("case@worker.org"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.7, 172.16.0.1"));
        let actor = Actor::from_headers(&headers);
        assert_eq!(actor.email, "case@worker.org");
        assert_eq!(actor.ip.as_deref(), Some("10.0.0.7"));
    }

    #[test]
    fn blank_query_values_are_absent() {
        assert_eq!(non_empty(&Some("  ".to_string())), None);
        assert_eq!(non_empty(&Some(" Food ".to_string())), Some("Food"));
        assert_eq!(non_empty(&None), None);
    }
}
