//! Handler-side error type.
//!
//! [`ServiceError`] is what a [`LineService`](crate::LineService) method
//! returns when it cannot complete a call. It converts into the wire form the
//! call's pattern expects:
//!
//! - unary: a non-200 HTTP status with a JSON `{"code","message"}` body
//! - streaming: HTTP 200 and an EndStream frame carrying the error

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
pub use linecall_core::Code;
use linecall_core::{Codec, CodecError, EndStream, EnvelopeError, SequenceError, Status};

/// Error returned by call handlers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceError {
    status: Status,
    http_status: Option<StatusCode>,
    abandoned: bool,
}

impl ServiceError {
    pub fn new<S: Into<String>>(code: Code, message: S) -> Self {
        Self {
            status: Status::new(code, message),
            http_status: None,
            abandoned: false,
        }
    }

    pub fn from_code(code: Code) -> Self {
        Self {
            status: Status::from_code(code),
            http_status: None,
            abandoned: false,
        }
    }

    pub fn new_unimplemented() -> Self {
        Self::new(
            Code::Unimplemented,
            "The requested service has not been implemented.",
        )
    }

    pub fn new_internal<S: Into<String>>(message: S) -> Self {
        Self::new(Code::Internal, message)
    }

    /// The initiator went away: its request direction broke off mid-call.
    ///
    /// Not a handler failure. The call is closed early and nothing is reported
    /// back, since nobody is left to read it.
    pub fn abandoned<S: Into<String>>(message: S) -> Self {
        Self {
            status: Status::new(Code::Canceled, message),
            http_status: None,
            abandoned: true,
        }
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    /// The request's content type is not one this protocol speaks.
    pub(crate) fn unsupported_media_type(content_type: &str) -> Self {
        Self {
            status: Status::unimplemented(format!("unsupported content type {content_type:?}")),
            http_status: Some(StatusCode::UNSUPPORTED_MEDIA_TYPE),
            abandoned: false,
        }
    }

    pub fn code(&self) -> Code {
        self.status.code()
    }

    pub fn message(&self) -> Option<&str> {
        self.status.message()
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn into_status(self) -> Status {
        self.status
    }

    /// Response for a streaming call that fails before emitting anything.
    pub fn into_streaming_response(self, codec: Codec) -> Response {
        if let Some(status) = self.http_status {
            return self.into_json_response(status);
        }

        let body = if self.abandoned {
            Body::empty()
        } else {
            Body::from(EndStream::failed(self.status).to_frame())
        };
        let mut response = Response::new(body);
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(codec.streaming_content_type()),
        );
        response
    }

    fn into_json_response(self, status: StatusCode) -> Response {
        let body = match serde_json::to_vec(&self.status) {
            Ok(body) => body,
            Err(_) => br#"{"code":"internal"}"#.to_vec(),
        };
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.status.fmt(f)
    }
}

impl std::error::Error for ServiceError {}

/// Unary error response. Streaming calls go through
/// [`ServiceError::into_streaming_response`] instead.
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self
            .http_status
            .unwrap_or_else(|| self.status.code().http_status());
        self.into_json_response(status)
    }
}

impl From<Status> for ServiceError {
    fn from(status: Status) -> Self {
        Self {
            status,
            http_status: None,
            abandoned: false,
        }
    }
}

impl From<Code> for ServiceError {
    fn from(code: Code) -> Self {
        Self::from_code(code)
    }
}

impl From<SequenceError> for ServiceError {
    fn from(err: SequenceError) -> Self {
        Status::from(err).into()
    }
}

impl From<EnvelopeError> for ServiceError {
    fn from(err: EnvelopeError) -> Self {
        Status::from(err).into()
    }
}

impl From<CodecError> for ServiceError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::JsonEncode(_) => Self::new_internal(err.to_string()),
            _ => Status::protocol_violation(Code::InvalidArgument, err.to_string()).into(),
        }
    }
}

impl From<std::convert::Infallible> for ServiceError {
    fn from(infallible: std::convert::Infallible) -> Self {
        match infallible {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unary_error_response() {
        let response = ServiceError::new(Code::NotFound, "missing").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let json = body_json(response).await;
        assert_eq!(json["code"], "not_found");
        assert_eq!(json["message"], "missing");
    }

    #[tokio::test]
    async fn test_unsupported_media_type_keeps_415() {
        let response = ServiceError::unsupported_media_type("text/plain")
            .into_streaming_response(Codec::Proto);
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let json = body_json(response).await;
        assert_eq!(json["code"], "unimplemented");
    }

    #[tokio::test]
    async fn test_streaming_error_is_end_stream_frame() {
        let response = ServiceError::new_internal("boom").into_streaming_response(Codec::Json);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/connect+json"
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes[0], linecall_core::envelope_flags::END_STREAM);
        let json: serde_json::Value = serde_json::from_slice(&bytes[5..]).unwrap();
        assert_eq!(json["error"]["code"], "internal");
    }

    #[test]
    fn test_sequence_error_conversion() {
        let err: ServiceError = SequenceError::ExtraRequest {
            kind: "server_stream",
        }
        .into();
        assert_eq!(err.code(), Code::InvalidArgument);
        assert!(err.status().is_protocol_violation());
        assert!(!err.is_abandoned());
    }

    #[tokio::test]
    async fn test_abandoned_call_reports_nothing() {
        let err = ServiceError::abandoned("request stream broke off");
        assert!(err.is_abandoned());
        assert_eq!(err.code(), Code::Canceled);

        let response = err.into_streaming_response(Codec::Proto);
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }
}
