//! Status codes and error types shared by both sides of a call.
//!
//! - [`Code`]: protocol status codes
//! - [`Status`]: the failure outcome of a call, as carried on the wire
//! - [`ErrorDetail`]: typed detail attached to a [`Status`]
//! - [`EnvelopeError`]: envelope framing errors
//! - [`SequenceError`]: a message or signal arrived out of the order its
//!   pattern allows

use std::str::FromStr;

use http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};

/// Status codes, matching the codes defined by the Connect protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    Ok = 0,
    Canceled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Code {
    /// Get the string representation of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::Ok => "ok",
            Code::Canceled => "canceled",
            Code::Unknown => "unknown",
            Code::InvalidArgument => "invalid_argument",
            Code::DeadlineExceeded => "deadline_exceeded",
            Code::NotFound => "not_found",
            Code::AlreadyExists => "already_exists",
            Code::PermissionDenied => "permission_denied",
            Code::ResourceExhausted => "resource_exhausted",
            Code::FailedPrecondition => "failed_precondition",
            Code::Aborted => "aborted",
            Code::OutOfRange => "out_of_range",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal",
            Code::Unavailable => "unavailable",
            Code::DataLoss => "data_loss",
            Code::Unauthenticated => "unauthenticated",
        }
    }

    /// HTTP status used when a unary call fails with this code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Code::Ok => StatusCode::OK,
            Code::Canceled => StatusCode::REQUEST_TIMEOUT,
            Code::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
            Code::InvalidArgument => StatusCode::BAD_REQUEST,
            Code::DeadlineExceeded => StatusCode::REQUEST_TIMEOUT,
            Code::NotFound => StatusCode::NOT_FOUND,
            Code::AlreadyExists => StatusCode::CONFLICT,
            Code::PermissionDenied => StatusCode::FORBIDDEN,
            Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
            Code::FailedPrecondition => StatusCode::BAD_REQUEST,
            Code::Aborted => StatusCode::CONFLICT,
            Code::OutOfRange => StatusCode::BAD_REQUEST,
            Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
            Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
            Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        }
    }

    /// Best-effort code for an HTTP status that arrived without an error body.
    pub fn from_http_status(status: StatusCode) -> Self {
        match status {
            StatusCode::OK => Code::Ok,
            StatusCode::BAD_REQUEST => Code::InvalidArgument,
            StatusCode::UNAUTHORIZED => Code::Unauthenticated,
            StatusCode::FORBIDDEN => Code::PermissionDenied,
            StatusCode::NOT_FOUND => Code::Unimplemented,
            StatusCode::CONFLICT => Code::Aborted,
            StatusCode::REQUEST_TIMEOUT => Code::DeadlineExceeded,
            StatusCode::UNSUPPORTED_MEDIA_TYPE => Code::Unimplemented,
            StatusCode::TOO_MANY_REQUESTS => Code::ResourceExhausted,
            StatusCode::NOT_IMPLEMENTED => Code::Unimplemented,
            StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => Code::Unavailable,
            _ => Code::Unknown,
        }
    }
}

/// Error returned when parsing a [`Code`] from a string fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseCodeError(());

impl std::fmt::Display for ParseCodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown error code")
    }
}

impl std::error::Error for ParseCodeError {}

impl FromStr for Code {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Code::Ok),
            "canceled" | "cancelled" => Ok(Code::Canceled),
            "unknown" => Ok(Code::Unknown),
            "invalid_argument" => Ok(Code::InvalidArgument),
            "deadline_exceeded" => Ok(Code::DeadlineExceeded),
            "not_found" => Ok(Code::NotFound),
            "already_exists" => Ok(Code::AlreadyExists),
            "permission_denied" => Ok(Code::PermissionDenied),
            "resource_exhausted" => Ok(Code::ResourceExhausted),
            "failed_precondition" => Ok(Code::FailedPrecondition),
            "aborted" => Ok(Code::Aborted),
            "out_of_range" => Ok(Code::OutOfRange),
            "unimplemented" => Ok(Code::Unimplemented),
            "internal" => Ok(Code::Internal),
            "unavailable" => Ok(Code::Unavailable),
            "data_loss" => Ok(Code::DataLoss),
            "unauthenticated" => Ok(Code::Unauthenticated),
            _ => Err(ParseCodeError(())),
        }
    }
}

// Unrecognized codes from a peer degrade to `unknown` instead of failing the
// whole error body.
impl<'de> Deserialize<'de> for Code {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().unwrap_or(Code::Unknown))
    }
}

/// Type of the detail marking a status raised for broken sequencing or
/// framing rather than by the handler's own logic.
pub const PROTOCOL_VIOLATION_DETAIL: &str = "linecall.v1.ProtocolViolation";

/// Typed detail attached to a [`Status`], as in the `details` array of a
/// Connect error body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    type_url: String,
    #[serde(default)]
    value: String,
}

impl ErrorDetail {
    pub fn new<S: Into<String>>(type_url: S) -> Self {
        Self {
            type_url: type_url.into(),
            value: String::new(),
        }
    }

    pub fn type_url(&self) -> &str {
        &self.type_url
    }
}

/// Failure outcome of a call.
///
/// This is the error data shared between client and server: what the handler
/// reports, and what the initiator receives. On the wire it is the JSON body
/// of a failed unary response or the `error` member of an EndStream frame.
///
/// # Example
///
/// ```
/// use linecall_core::{Code, Status};
///
/// let status = Status::not_found("no such line");
/// assert_eq!(status.code(), Code::NotFound);
/// assert_eq!(status.to_string(), "not_found: no such line");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    code: Code,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    details: Vec<ErrorDetail>,
}

impl Status {
    /// Create a new status with a code and message.
    pub fn new<S: Into<String>>(code: Code, message: S) -> Self {
        Self {
            code,
            message: Some(message.into()),
            details: Vec::new(),
        }
    }

    /// Create a new status with just a code.
    pub fn from_code(code: Code) -> Self {
        Self {
            code,
            message: None,
            details: Vec::new(),
        }
    }

    /// Get the error code.
    pub fn code(&self) -> Code {
        self.code
    }

    /// Get the error message.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn details(&self) -> &[ErrorDetail] {
        &self.details
    }

    pub fn with_detail(mut self, detail: ErrorDetail) -> Self {
        self.details.push(detail);
        self
    }

    /// A status for a call whose sequencing or framing was broken.
    pub fn protocol_violation(code: Code, message: impl Into<String>) -> Self {
        Self::new(code, message).with_detail(ErrorDetail::new(PROTOCOL_VIOLATION_DETAIL))
    }

    pub fn is_protocol_violation(&self) -> bool {
        self.details
            .iter()
            .any(|d| d.type_url() == PROTOCOL_VIOLATION_DETAIL)
    }

    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(Code::NotFound, message)
    }

    pub fn unimplemented<S: Into<String>>(message: S) -> Self {
        Self::new(Code::Unimplemented, message)
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(Code::Internal, message)
    }

    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::new(Code::Unavailable, message)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code.as_str())?;
        if let Some(msg) = &self.message {
            write!(f, ": {}", msg)?;
        }
        Ok(())
    }
}

impl std::error::Error for Status {}

/// Envelope framing errors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// Incomplete envelope header.
    #[error("incomplete envelope header: expected {expected} bytes, got {actual}")]
    IncompleteHeader { expected: usize, actual: usize },

    /// Invalid frame flags.
    #[error("invalid frame flags: 0x{0:02x}")]
    InvalidFlags(u8),

    /// Frame announces a payload larger than the reader accepts.
    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    /// The byte stream ended in the middle of a frame.
    #[error("stream ended with {0} bytes of incomplete frame data")]
    Truncated(usize),

    /// EndStream payload was not valid JSON.
    #[error("invalid EndStream payload: {0}")]
    InvalidEndStream(String),
}

/// A message or signal arrived that the call's pattern does not allow at that
/// point.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    #[error("{kind} call carries exactly one request, got another")]
    ExtraRequest { kind: &'static str },

    #[error("{kind} call carries exactly one reply, got another")]
    ExtraReply { kind: &'static str },

    #[error("{kind} call ended without its reply")]
    MissingReply { kind: &'static str },

    #[error("{kind} call ended without its request")]
    MissingRequest { kind: &'static str },

    #[error("client-stream call replied before end of input")]
    EarlyReply,

    #[error("send direction is {0} and accepts no more messages")]
    SendClosed(&'static str),

    #[error("receive direction is closed")]
    ReceiveClosed,

    #[error("handler cannot move from {from} to {to}")]
    InvalidPhase {
        from: &'static str,
        to: &'static str,
    },
}

impl From<SequenceError> for Status {
    fn from(err: SequenceError) -> Self {
        Status::protocol_violation(Code::InvalidArgument, format!("protocol violation: {err}"))
    }
}

impl From<EnvelopeError> for Status {
    fn from(err: EnvelopeError) -> Self {
        let code = match err {
            EnvelopeError::TooLarge { .. } => Code::ResourceExhausted,
            EnvelopeError::Truncated(_) => Code::DataLoss,
            _ => Code::InvalidArgument,
        };
        Status::protocol_violation(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_as_str() {
        assert_eq!(Code::Ok.as_str(), "ok");
        assert_eq!(Code::InvalidArgument.as_str(), "invalid_argument");
        assert_eq!(Code::Unauthenticated.as_str(), "unauthenticated");
    }

    #[test]
    fn test_code_from_str() {
        assert_eq!("ok".parse(), Ok(Code::Ok));
        assert_eq!("invalid_argument".parse(), Ok(Code::InvalidArgument));
        assert_eq!("cancelled".parse(), Ok(Code::Canceled));
        assert_eq!("unknown_code".parse::<Code>(), Err(ParseCodeError(())));
    }

    #[test]
    fn test_code_deserialize_unrecognized_is_unknown() {
        let code: Code = serde_json::from_str(r#""not_a_code""#).unwrap();
        assert_eq!(code, Code::Unknown);
        let code: Code = serde_json::from_str(r#""unavailable""#).unwrap();
        assert_eq!(code, Code::Unavailable);
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(Code::Internal.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(Code::Unimplemented.http_status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(
            Code::from_http_status(StatusCode::SERVICE_UNAVAILABLE),
            Code::Unavailable
        );
        assert_eq!(Code::from_http_status(StatusCode::IM_A_TEAPOT), Code::Unknown);
    }

    #[test]
    fn test_status_display() {
        let status = Status::not_found("resource missing");
        assert_eq!(status.to_string(), "not_found: resource missing");

        let status = Status::from_code(Code::Internal);
        assert_eq!(status.to_string(), "internal");
    }

    #[test]
    fn test_status_json_shape() {
        let status = Status::internal("boom");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["code"], "internal");
        assert_eq!(json["message"], "boom");

        let bare = serde_json::to_value(Status::from_code(Code::Aborted)).unwrap();
        assert!(bare.get("message").is_none());

        let parsed: Status = serde_json::from_str(r#"{"code":"data_loss"}"#).unwrap();
        assert_eq!(parsed.code(), Code::DataLoss);
        assert_eq!(parsed.message(), None);
    }

    #[test]
    fn test_sequence_error_is_invalid_argument() {
        let status: Status = SequenceError::ExtraRequest { kind: "unary" }.into();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(status.message().unwrap().starts_with("protocol violation"));
        assert!(status.is_protocol_violation());
        assert!(!Status::invalid_argument("bad name").is_protocol_violation());
    }

    #[test]
    fn test_protocol_violation_detail_survives_json() {
        let status: Status = EnvelopeError::Truncated(3).into();
        assert_eq!(status.code(), Code::DataLoss);
        assert_eq!(status.details().len(), 1);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["details"][0]["type"], PROTOCOL_VIOLATION_DETAIL);

        let parsed: Status = serde_json::from_value(json).unwrap();
        assert!(parsed.is_protocol_violation());
        assert_eq!(parsed, status);
    }

    #[test]
    fn test_envelope_error_display() {
        let err = EnvelopeError::IncompleteHeader {
            expected: 5,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "incomplete envelope header: expected 5 bytes, got 3"
        );
        assert_eq!(
            EnvelopeError::InvalidFlags(0xFF).to_string(),
            "invalid frame flags: 0xff"
        );
        let status: Status = EnvelopeError::Truncated(3).into();
        assert_eq!(status.code(), Code::DataLoss);
        assert_eq!(status.details().len(), 1);
    }
}
