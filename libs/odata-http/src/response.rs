use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use odata_core::{Envelope, Outcome, ResultPage};
use serde::Serialize;

use crate::error::bad_request;

/// 200 body: the page plus its envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsBody<T> {
    pub results: ResultPage<T>,
    pub envelope: Envelope,
}

/// Renders an [`Outcome`]: 200 with [`ResultsBody`], 404 with the bare zero
/// envelope, 400 with an `errorMessage` body.
#[derive(Debug, Clone)]
pub struct EnvelopeResponse<T>(pub Outcome<T>);

impl<T> From<Outcome<T>> for EnvelopeResponse<T> {
    fn from(outcome: Outcome<T>) -> Self {
        Self(outcome)
    }
}

impl<T: Serialize> IntoResponse for EnvelopeResponse<T> {
    fn into_response(self) -> Response {
        match self.0 {
            Outcome::Success { envelope, page } => (
                StatusCode::OK,
                Json(ResultsBody {
                    results: page,
                    envelope,
                }),
            )
                .into_response(),
            Outcome::NotFound(envelope) => (StatusCode::NOT_FOUND, Json(envelope)).into_response(),
            Outcome::BadRequest(message) => bad_request(message).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::{json, Value};

    async fn render<T: Serialize>(outcome: Outcome<T>) -> (StatusCode, Value) {
        let resp = EnvelopeResponse(outcome).into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn success_has_results_and_envelope() {
        let outcome = Outcome::Success {
            envelope: Envelope {
                count: 3,
                page_size: 2,
                total_pages: 2,
                current_page: 1,
                next_url: Some("http://h/x?$top=2&$skip=2".into()),
            },
            page: ResultPage::Typed(vec![1, 2]),
        };
        let (status, body) = render(outcome).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"], json!([1, 2]));
        assert_eq!(body["envelope"]["pageSize"], 2);
        assert_eq!(body["envelope"]["nextUrl"], "http://h/x?$top=2&$skip=2");
    }

    #[tokio::test]
    async fn success_omits_absent_next_url() {
        let outcome: Outcome<u8> = Outcome::Success {
            envelope: Envelope {
                count: 1,
                page_size: 10,
                total_pages: 1,
                current_page: 1,
                next_url: None,
            },
            page: ResultPage::Projected(vec![json!({"a": 1})]),
        };
        let (_, body) = render(outcome).await;
        assert!(body["envelope"].get("nextUrl").is_none());
        assert_eq!(body["results"], json!([{"a": 1}]));
    }

    #[tokio::test]
    async fn not_found_is_bare_zero_envelope() {
        let (status, body) = render(Outcome::<u8>::not_found()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            json!({"count": 0, "pageSize": 0, "totalPages": 0, "currentPage": 0, "nextUrl": ""})
        );
    }

    #[tokio::test]
    async fn bad_request_has_error_message() {
        let (status, body) = render(Outcome::<u8>::bad_request("nope")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"errorMessage": "nope"}));
    }
}
