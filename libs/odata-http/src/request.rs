use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use odata_core::RequestContext;

/// The request origin as the server saw it; the pipeline rewrites it to the
/// advertised host before producing links.
#[derive(Debug, Clone)]
pub struct ODataRequest(pub RequestContext);

impl ODataRequest {
    pub fn from_parts(parts: &Parts) -> Self {
        let scheme = parts.uri.scheme_str().unwrap_or("http");
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| "localhost".to_string());

        let mut ctx = RequestContext::new(scheme, host, parts.uri.path());
        if let Some(q) = parts.uri.query() {
            ctx.query = url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect();
        }
        Self(ctx)
    }

    pub fn into_inner(self) -> RequestContext {
        self.0
    }
}

impl<S> FromRequestParts<S> for ODataRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}
