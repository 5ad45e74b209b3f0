//! Lifecycle of one logical call.
//!
//! A call has a pattern kind, a send direction, a receive direction and an
//! outcome. [`CallState`] tracks the initiator's view and rejects sequences
//! the pattern does not allow. [`HandlerPhase`] is the handler's view:
//!
//! ```text
//! AwaitingFirstMessage -> Processing -> EmittingFinal -> Closed   (unary, client-stream)
//! AwaitingFirstMessage -> Processing -> Streaming     -> Closed   (server-stream, bidi)
//! ```
//!
//! Any phase may jump to `Closed` when the call fails or is abandoned.

use crate::error::SequenceError;

/// The four interaction patterns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PatternKind {
    Unary,
    ServerStream,
    ClientStream,
    BidiStream,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Unary => "unary",
            PatternKind::ServerStream => "server_stream",
            PatternKind::ClientStream => "client_stream",
            PatternKind::BidiStream => "bidi_stream",
        }
    }

    /// Whether the initiator sends exactly one message.
    pub fn single_request(&self) -> bool {
        matches!(self, PatternKind::Unary | PatternKind::ServerStream)
    }

    /// Whether the handler replies with exactly one message.
    pub fn single_reply(&self) -> bool {
        matches!(self, PatternKind::Unary | PatternKind::ClientStream)
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendState {
    Open,
    /// End of input signaled; the peer may still be replying.
    HalfClosed,
    Closed,
}

impl SendState {
    fn as_str(&self) -> &'static str {
        match self {
            SendState::Open => "open",
            SendState::HalfClosed => "half-closed",
            SendState::Closed => "closed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecvState {
    Open,
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Completed,
    Failed,
}

/// Initiator-side state of one call.
#[derive(Clone, Debug)]
pub struct CallState {
    kind: PatternKind,
    send: SendState,
    recv: RecvState,
    outcome: Outcome,
    sent: usize,
    received: usize,
}

impl CallState {
    pub fn new(kind: PatternKind) -> Self {
        Self {
            kind,
            send: SendState::Open,
            recv: RecvState::Open,
            outcome: Outcome::Pending,
            sent: 0,
            received: 0,
        }
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn send_state(&self) -> SendState {
        self.send
    }

    pub fn recv_state(&self) -> RecvState {
        self.recv
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn received(&self) -> usize {
        self.received
    }

    /// Both directions closed and the outcome is final.
    pub fn is_finished(&self) -> bool {
        self.outcome != Outcome::Pending
    }

    /// Record one outgoing message.
    pub fn record_send(&mut self) -> Result<(), SequenceError> {
        if self.send != SendState::Open {
            return Err(SequenceError::SendClosed(self.send.as_str()));
        }
        if self.kind.single_request() && self.sent == 1 {
            return Err(SequenceError::ExtraRequest {
                kind: self.kind.as_str(),
            });
        }
        self.sent += 1;
        Ok(())
    }

    /// Signal end of input on the send direction.
    ///
    /// Single-request patterns close the direction outright; streaming
    /// patterns half-close it until the call completes.
    pub fn finish_send(&mut self) -> Result<(), SequenceError> {
        if self.send != SendState::Open {
            return Err(SequenceError::SendClosed(self.send.as_str()));
        }
        if self.kind.single_request() && self.sent == 0 {
            return Err(SequenceError::MissingRequest {
                kind: self.kind.as_str(),
            });
        }
        self.send = if self.kind.single_request() {
            SendState::Closed
        } else {
            SendState::HalfClosed
        };
        self.try_complete();
        Ok(())
    }

    /// Record one incoming message.
    pub fn record_receive(&mut self) -> Result<(), SequenceError> {
        if self.recv == RecvState::Closed {
            return Err(SequenceError::ReceiveClosed);
        }
        if self.kind == PatternKind::ClientStream && self.send == SendState::Open {
            return Err(SequenceError::EarlyReply);
        }
        if self.kind.single_reply() && self.received == 1 {
            return Err(SequenceError::ExtraReply {
                kind: self.kind.as_str(),
            });
        }
        self.received += 1;
        Ok(())
    }

    /// The peer signaled end of sequence on the receive direction.
    pub fn close_receive(&mut self) -> Result<(), SequenceError> {
        if self.recv == RecvState::Closed {
            return Err(SequenceError::ReceiveClosed);
        }
        if self.kind.single_reply() && self.received == 0 {
            return Err(SequenceError::MissingReply {
                kind: self.kind.as_str(),
            });
        }
        self.recv = RecvState::Closed;
        self.try_complete();
        Ok(())
    }

    /// Close both directions with a failure outcome.
    pub fn fail(&mut self) {
        self.send = SendState::Closed;
        self.recv = RecvState::Closed;
        self.outcome = Outcome::Failed;
    }

    fn try_complete(&mut self) {
        if self.send != SendState::Open && self.recv == RecvState::Closed {
            self.send = SendState::Closed;
            self.outcome = Outcome::Completed;
        }
    }
}

/// Handler-side phase of one call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerPhase {
    AwaitingFirstMessage,
    Processing,
    EmittingFinal,
    Streaming,
    Closed,
}

impl HandlerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerPhase::AwaitingFirstMessage => "awaiting_first_message",
            HandlerPhase::Processing => "processing",
            HandlerPhase::EmittingFinal => "emitting_final",
            HandlerPhase::Streaming => "streaming",
            HandlerPhase::Closed => "closed",
        }
    }

    /// Move to `next` if the pattern allows it from the current phase.
    pub fn advance(self, next: HandlerPhase, kind: PatternKind) -> Result<Self, SequenceError> {
        use HandlerPhase::*;

        let allowed = match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (AwaitingFirstMessage, Processing) => true,
            (Processing, EmittingFinal) => kind.single_reply(),
            (Processing, Streaming) => !kind.single_reply(),
            _ => false,
        };

        if allowed {
            Ok(next)
        } else {
            Err(SequenceError::InvalidPhase {
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}
