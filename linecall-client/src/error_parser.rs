//! Error response parsing.
//!
//! A failed unary call answers with a non-200 status and a JSON body:
//!
//! ```json
//! { "code": "not_found", "message": "resource not found" }
//! ```
//!
//! Bodies that are not a status object fall back to the HTTP status.

use http::StatusCode;
use linecall_core::{Code, Status};

use crate::ClientError;

pub(crate) fn parse_error_body(status: StatusCode, body: &[u8]) -> ClientError {
    if let Ok(parsed) = serde_json::from_slice::<Status>(body) {
        return ClientError::Status(parsed);
    }

    let code = Code::from_http_status(status);
    let message = match std::str::from_utf8(body) {
        Ok(text) if !text.is_empty() => text.to_string(),
        _ => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };
    ClientError::new(code, message)
}
