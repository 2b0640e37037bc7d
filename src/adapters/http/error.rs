//! HTTP error mapping.
//!
//! Every failure leaves the API as the `{err_msg, err_code}` envelope with
//! `err_code` equal to the HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::str::FromStr;

use crate::application::EngineError;
use crate::domain::conversation::SUCCESS_MESSAGE;

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T: Serialize> {
    pub err_msg: String,
    pub err_code: u16,
    #[serde(flatten)]
    pub body: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(body: T) -> Self {
        Self {
            err_msg: SUCCESS_MESSAGE.to_string(),
            err_code: 0,
            body,
        }
    }
}

/// Bare envelope for responses with no payload.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Empty {}

/// `{"err_msg":"success","err_code":0}`.
pub fn ok() -> Json<Envelope<Empty>> {
    Json(Envelope::success(Empty {}))
}

/// Error type returned by every HTTP handler.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(EngineError::invalid(message))
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.err_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self.0, "Request rejected");
        }
        let body = Envelope {
            err_msg: self.0.to_string(),
            err_code: status.as_u16(),
            body: Empty {},
        };
        (status, Json(body)).into_response()
    }
}

/// Parses a path identifier, rejecting malformed values with 400.
pub fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid {}", what)))
}

/// Failure envelope for responses produced outside [`ApiError`].
pub fn failure(status: StatusCode, message: &str) -> Response {
    let body = Envelope {
        err_msg: message.to_string(),
        err_code: status.as_u16(),
        body: Empty {},
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_kinds_map_to_statuses() {
        let cases = [
            (EngineError::ConversationNotFound, StatusCode::NOT_FOUND),
            (EngineError::MessageNotFound, StatusCode::NOT_FOUND),
            (EngineError::QuotaExceeded, StatusCode::FORBIDDEN),
            (EngineError::invalid("x"), StatusCode::BAD_REQUEST),
            (EngineError::ProviderNotReady, StatusCode::INTERNAL_SERVER_ERROR),
            (EngineError::StorageNotReady, StatusCode::INTERNAL_SERVER_ERROR),
            (EngineError::SpeechProviderNotReady, StatusCode::INTERNAL_SERVER_ERROR),
            (EngineError::PersistenceFailure("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (EngineError::UpstreamFailure("x".into()), StatusCode::BAD_GATEWAY),
            (EngineError::EmptyResponse, StatusCode::BAD_GATEWAY),
            (EngineError::StreamAbnormalFinish("x".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }

    #[test]
    fn malformed_ids_are_bad_requests() {
        let err = parse_id::<i64>("abc", "conversation_id").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(parse_id::<i64>(" 42 ", "conversation_id").unwrap(), 42);
    }

    #[test]
    fn success_envelope_flattens_body() {
        #[derive(Serialize)]
        struct Body {
            title: &'static str,
        }
        let json = serde_json::to_value(Envelope::success(Body { title: "t" })).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"err_msg": "success", "err_code": 0, "title": "t"})
        );
    }

    #[test]
    fn empty_envelope_has_only_status_fields() {
        let json = serde_json::to_value(ok().0).unwrap();
        assert_eq!(json, serde_json::json!({"err_msg": "success", "err_code": 0}));
    }
}
