//! Core protocol types for linecall.
//!
//! This crate provides shared types and functions used by both the server
//! (`linecall`) and client (`linecall-client`) crates.
//!
//! ## Modules
//!
//! - [`catalog`]: message types and logical call definitions
//! - [`call`]: call lifecycle state (directions, outcome, handler phase)
//! - [`codec`]: protobuf/JSON message codecs and content types
//! - [`envelope`]: streaming envelope framing
//! - [`error`]: status codes and error types

pub mod call;
pub mod catalog;
mod codec;
mod envelope;
mod error;

pub use call::{CallState, HandlerPhase, Outcome, PatternKind, RecvState, SendState};
pub use catalog::{
    FetchLinesRequest, HelloReply, HelloRequest, Procedure, StreamSummary, TextLine,
};
pub use codec::*;
pub use envelope::*;
pub use error::*;
