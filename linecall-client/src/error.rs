//! Client-side error types.
//!
//! Every failed call surfaces as one [`ClientError`]. [`ClientError::kind`]
//! sorts it into the failure classes callers branch on.

use linecall_core::{Code, CodecError, EnvelopeError, SequenceError, Status};

/// Why a call failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The channel could not be opened or was lost mid-call.
    TransportUnavailable,
    /// Sequencing or framing broken: a second request, a missing reply, a bad
    /// frame, a stream that ended without EndStream.
    ProtocolViolation,
    /// The handler ended the call with an error status.
    HandlerFault,
    /// The caller's producer yielded an error.
    ProducerFailed,
    /// The call was cancelled before either side finished it.
    CallAbandoned,
}

/// Error of one client call.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ClientError {
    /// Status reported by the handler (or raised locally, e.g. a deadline).
    #[error("{0}")]
    Status(Status),

    /// Transport-level error (connection refused, reset, etc.).
    #[error("transport error: {0}")]
    Transport(String),

    /// Protocol error (malformed frames, bad sequencing, unexpected data).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Request message encoding error.
    #[error("encode error: {0}")]
    Encode(String),

    /// Reply message decoding error.
    #[error("decode error: {0}")]
    Decode(String),

    /// The request producer failed; the send direction was closed abnormally.
    #[error("producer failed: {0}")]
    Producer(String),
}

impl ClientError {
    pub fn new<S: Into<String>>(code: Code, message: S) -> Self {
        ClientError::Status(Status::new(code, message))
    }

    pub fn from_code(code: Code) -> Self {
        ClientError::Status(Status::from_code(code))
    }

    pub fn deadline_exceeded<S: Into<String>>(message: S) -> Self {
        Self::new(Code::DeadlineExceeded, message)
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ClientError::Status(status) if status.is_protocol_violation() => {
                FailureKind::ProtocolViolation
            }
            ClientError::Status(status) if status.code() == Code::Canceled => {
                FailureKind::CallAbandoned
            }
            ClientError::Status(_) => FailureKind::HandlerFault,
            ClientError::Transport(_) => FailureKind::TransportUnavailable,
            ClientError::Protocol(_) | ClientError::Encode(_) | ClientError::Decode(_) => {
                FailureKind::ProtocolViolation
            }
            ClientError::Producer(_) => FailureKind::ProducerFailed,
        }
    }

    /// Get the error code.
    ///
    /// For non-Status variants, returns an appropriate code:
    /// - Transport: `Unavailable`
    /// - Encode/Decode: `Internal`
    /// - Protocol: `InvalidArgument`
    /// - Producer: `Canceled`
    pub fn code(&self) -> Code {
        match self {
            ClientError::Status(status) => status.code(),
            ClientError::Transport(_) => Code::Unavailable,
            ClientError::Encode(_) | ClientError::Decode(_) => Code::Internal,
            ClientError::Protocol(_) => Code::InvalidArgument,
            ClientError::Producer(_) => Code::Canceled,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ClientError::Status(status) => status.message(),
            ClientError::Transport(msg)
            | ClientError::Protocol(msg)
            | ClientError::Encode(msg)
            | ClientError::Decode(msg)
            | ClientError::Producer(msg) => Some(msg),
        }
    }
}

impl From<Status> for ClientError {
    fn from(status: Status) -> Self {
        ClientError::Status(status)
    }
}

impl From<EnvelopeError> for ClientError {
    fn from(err: EnvelopeError) -> Self {
        ClientError::Protocol(err.to_string())
    }
}

impl From<SequenceError> for ClientError {
    fn from(err: SequenceError) -> Self {
        ClientError::Protocol(err.to_string())
    }
}

impl From<CodecError> for ClientError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::JsonEncode(_) => ClientError::Encode(err.to_string()),
            _ => ClientError::Decode(err.to_string()),
        }
    }
}
