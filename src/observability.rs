use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::future::Future;
use tracing::Instrument;
use uuid::Uuid;

/// Header name for the request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request identifier carried through a request's task scope so error
/// envelopes and logs can reference it without plumbing.
#[derive(Clone, Debug)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(value: &str) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self(format!("req-{}", Uuid::new_v4().simple()))
    }
}

tokio::task_local! {
    static CURRENT_REQUEST_ID: RequestId;
}

/// Returns the request id for the current task scope, if inside one.
pub fn current_request_id() -> Option<RequestId> {
    CURRENT_REQUEST_ID.try_with(|rid| rid.clone()).ok()
}

/// Runs `fut` with `rid` installed as the current request id.
pub async fn scope_request_id<F, T>(rid: RequestId, fut: F) -> T
where
    F: Future<Output = T>,
{
    CURRENT_REQUEST_ID.scope(rid, fut).await
}

/// Middleware that echoes an incoming `x-request-id` or mints one, makes
/// it available to handlers, and stamps it on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(RequestId::new)
        .unwrap_or_default();

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        request
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    request.extensions_mut().insert(request_id.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id.as_str(),
        method = %request.method(),
        uri = %request.uri(),
    );

    let mut response =
        scope_request_id(request_id.clone(), async move { next.run(request).await })
            .instrument(span)
            .await;

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scoped_request_id_is_visible() {
        let rid = RequestId::new("req-test-1");
        let seen = scope_request_id(rid, async {
            current_request_id().map(|r| r.as_str().to_string())
        })
        .await;
        assert_eq!(seen.as_deref(), Some("req-test-1"));
    }

    #[test]
    fn outside_scope_there_is_no_request_id() {
        assert!(current_request_id().is_none());
    }
}
