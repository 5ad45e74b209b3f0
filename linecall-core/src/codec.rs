//! Message codecs.
//!
//! A call's messages are serialized either as protobuf or as JSON. The codec
//! is chosen by the initiator and announced through the content type; the
//! handler answers in the same codec.

use bytes::Bytes;
use prost::Message;
use serde::{Serialize, de::DeserializeOwned};

/// Content type of a unary call carrying protobuf.
pub const UNARY_PROTO: &str = "application/proto";
/// Content type of a unary call carrying JSON.
pub const UNARY_JSON: &str = "application/json";
/// Content type of a streaming call carrying protobuf.
pub const STREAM_PROTO: &str = "application/connect+proto";
/// Content type of a streaming call carrying JSON.
pub const STREAM_JSON: &str = "application/connect+json";

/// Header announcing the protocol version, sent on every call.
pub const PROTOCOL_VERSION_HEADER: &str = "connect-protocol-version";
/// The only protocol version spoken here.
pub const PROTOCOL_VERSION: &str = "1";

/// Serialization format for call messages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Codec {
    #[default]
    Proto,
    Json,
}

/// Failure to encode or decode a message.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("protobuf decoding failed: {0}")]
    ProtoDecode(#[from] prost::DecodeError),

    #[error("JSON decoding failed: {0}")]
    JsonDecode(serde_json::Error),

    #[error("JSON encoding failed: {0}")]
    JsonEncode(serde_json::Error),
}

impl Codec {
    /// Parse a codec name such as `proto` or `json`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "proto" | "protobuf" => Some(Codec::Proto),
            "json" => Some(Codec::Json),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Codec::Proto => "proto",
            Codec::Json => "json",
        }
    }

    /// Content type for unary calls.
    pub fn unary_content_type(&self) -> &'static str {
        match self {
            Codec::Proto => UNARY_PROTO,
            Codec::Json => UNARY_JSON,
        }
    }

    /// Content type for streaming calls.
    pub fn streaming_content_type(&self) -> &'static str {
        match self {
            Codec::Proto => STREAM_PROTO,
            Codec::Json => STREAM_JSON,
        }
    }

    pub fn encode<T>(&self, message: &T) -> Result<Bytes, CodecError>
    where
        T: Message + Serialize,
    {
        match self {
            Codec::Proto => Ok(Bytes::from(message.encode_to_vec())),
            Codec::Json => serde_json::to_vec(message)
                .map(Bytes::from)
                .map_err(CodecError::JsonEncode),
        }
    }

    pub fn decode<T>(&self, bytes: &[u8]) -> Result<T, CodecError>
    where
        T: Message + DeserializeOwned + Default,
    {
        match self {
            Codec::Proto => Ok(T::decode(bytes)?),
            // An empty JSON body stands for the default message.
            Codec::Json if bytes.is_empty() => Ok(T::default()),
            Codec::Json => serde_json::from_slice(bytes).map_err(CodecError::JsonDecode),
        }
    }
}

/// How a call is framed on the wire, detected from its content type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framing {
    /// Bare message body.
    Unary(Codec),
    /// Enveloped messages terminated by EndStream.
    Streaming(Codec),
}

impl Framing {
    /// Detect framing and codec from a content type header value.
    ///
    /// Returns `None` for content types this protocol does not speak.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            STREAM_PROTO => Some(Framing::Streaming(Codec::Proto)),
            STREAM_JSON => Some(Framing::Streaming(Codec::Json)),
            UNARY_PROTO => Some(Framing::Unary(Codec::Proto)),
            UNARY_JSON => Some(Framing::Unary(Codec::Json)),
            _ => None,
        }
    }

    pub fn codec(&self) -> Codec {
        match self {
            Framing::Unary(codec) | Framing::Streaming(codec) => *codec,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Framing::Unary(codec) => codec.unary_content_type(),
            Framing::Streaming(codec) => codec.streaming_content_type(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{HelloRequest, StreamSummary};

    #[test]
    fn test_framing_from_content_type() {
        assert_eq!(
            Framing::from_content_type("application/connect+proto"),
            Some(Framing::Streaming(Codec::Proto))
        );
        assert_eq!(
            Framing::from_content_type("application/json; charset=utf-8"),
            Some(Framing::Unary(Codec::Json))
        );
        assert_eq!(
            Framing::from_content_type("Application/Proto"),
            Some(Framing::Unary(Codec::Proto))
        );
        assert_eq!(Framing::from_content_type("text/plain"), None);
        assert_eq!(Framing::from_content_type("application/grpc"), None);
    }

    #[test]
    fn test_codec_from_name() {
        assert_eq!(Codec::from_name("JSON"), Some(Codec::Json));
        assert_eq!(Codec::from_name("protobuf"), Some(Codec::Proto));
        assert_eq!(Codec::from_name("xml"), None);
    }

    #[test]
    fn test_json_uses_camel_case_field_names() {
        let bytes = Codec::Json
            .encode(&StreamSummary { elapsed_seconds: 3 })
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["elapsedSeconds"], 3);
    }

    #[test]
    fn test_json_empty_body_is_default_message() {
        let req: HelloRequest = Codec::Json.decode(b"").unwrap();
        assert_eq!(req, HelloRequest::default());
    }

    #[test]
    fn test_proto_decode_error() {
        // Field 1 declared as length-delimited with a length past the buffer.
        let err = Codec::Proto.decode::<HelloRequest>(&[0x0a, 0x05, b'a']);
        assert!(matches!(err, Err(CodecError::ProtoDecode(_))));
    }
}
