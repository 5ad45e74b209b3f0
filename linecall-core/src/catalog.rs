//! Message catalog and logical call definitions of the line service.
//!
//! | pattern       | call           | request             | response            |
//! |---------------|----------------|---------------------|---------------------|
//! | unary         | `Greet`        | [`HelloRequest`]    | [`HelloReply`]      |
//! | server-stream | `FetchLines`   | [`FetchLinesRequest`] | stream [`TextLine`] |
//! | client-stream | `SubmitLines`  | stream [`TextLine`] | [`StreamSummary`]   |
//! | bidi-stream   | `ReverseLines` | stream [`TextLine`] | stream [`TextLine`] |

use serde::{Deserialize, Serialize};

use crate::call::PatternKind;

/// Fully-qualified service name.
pub const SERVICE_NAME: &str = "linecall.v1.LineService";

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HelloRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HelloReply {
    #[prost(string, tag = "1")]
    pub message: String,
}

/// Empty trigger of `FetchLines`.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct FetchLinesRequest {}

/// Payload unit of every streaming call.
#[derive(Clone, PartialEq, Eq, Hash, prost::Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextLine {
    #[prost(string, tag = "1")]
    pub line: String,
}

impl TextLine {
    pub fn new<S: Into<String>>(line: S) -> Self {
        Self { line: line.into() }
    }
}

impl From<&str> for TextLine {
    fn from(line: &str) -> Self {
        Self::new(line)
    }
}

impl From<String> for TextLine {
    fn from(line: String) -> Self {
        Self { line }
    }
}

/// Aggregate reply of `SubmitLines`.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamSummary {
    #[prost(int64, tag = "1")]
    pub elapsed_seconds: i64,
}

/// A logical call of the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Procedure {
    pub method: &'static str,
    pub kind: PatternKind,
}

impl Procedure {
    /// Request path, `/{service}/{method}`.
    pub fn path(&self) -> String {
        format!("/{SERVICE_NAME}/{}", self.method)
    }
}

pub const GREET: Procedure = Procedure {
    method: "Greet",
    kind: PatternKind::Unary,
};

pub const FETCH_LINES: Procedure = Procedure {
    method: "FetchLines",
    kind: PatternKind::ServerStream,
};

pub const SUBMIT_LINES: Procedure = Procedure {
    method: "SubmitLines",
    kind: PatternKind::ClientStream,
};

pub const REVERSE_LINES: Procedure = Procedure {
    method: "ReverseLines",
    kind: PatternKind::BidiStream,
};

/// Every call the service exposes.
pub const PROCEDURES: [Procedure; 4] = [GREET, FETCH_LINES, SUBMIT_LINES, REVERSE_LINES];
