use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::HOST, request::Parts},
};
use std::convert::Infallible;

const DEFAULT_HOST: &str = "localhost";

/// `<scheme>://<host>` of the incoming request, used to absolutize stored
/// file URLs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestOrigin(pub String);

impl RequestOrigin {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestOrigin
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let scheme = header("x-forwarded-proto")
            .filter(|s| s == "http" || s == "https")
            .unwrap_or_else(|| "http".to_string());
        let host = header(HOST.as_str())
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        Ok(RequestOrigin(format!("{}://{}", scheme, host)))
    }
}
