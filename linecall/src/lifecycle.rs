//! Handler-side call tracking.
//!
//! One [`CallTracker`] lives as long as the resources of one call. It walks
//! the call through its [`HandlerPhase`]s, logs each step, and records how the
//! call ended. Dropping a tracker that never reached `Closed` means the
//! initiator abandoned the call.

use std::time::Instant;

use linecall_core::{HandlerPhase, Procedure};

use crate::error::ServiceError;

#[derive(Debug)]
pub(crate) struct CallTracker {
    procedure: Procedure,
    phase: HandlerPhase,
    opened: Instant,
    emitted: usize,
}

impl CallTracker {
    pub(crate) fn open(procedure: Procedure) -> Self {
        tracing::info!(
            rpc.method = procedure.method,
            rpc.pattern = %procedure.kind,
            "call opened"
        );
        Self {
            procedure,
            phase: HandlerPhase::AwaitingFirstMessage,
            opened: Instant::now(),
            emitted: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> HandlerPhase {
        self.phase
    }

    pub(crate) fn advance(&mut self, next: HandlerPhase) {
        match self.phase.advance(next, self.procedure.kind) {
            Ok(phase) => {
                tracing::trace!(
                    rpc.method = self.procedure.method,
                    from = self.phase.as_str(),
                    to = phase.as_str(),
                    "call phase"
                );
                self.phase = phase;
            }
            Err(err) => {
                tracing::warn!(rpc.method = self.procedure.method, error = %err, "call phase rejected");
            }
        }
    }

    /// First message (or end of input) observed.
    pub(crate) fn processing(&mut self) {
        if self.phase == HandlerPhase::AwaitingFirstMessage {
            self.advance(HandlerPhase::Processing);
        }
    }

    pub(crate) fn record_emit(&mut self) {
        self.emitted += 1;
    }

    pub(crate) fn complete(mut self) {
        tracing::info!(
            rpc.method = self.procedure.method,
            rpc.pattern = %self.procedure.kind,
            emitted = self.emitted,
            elapsed_ms = self.opened.elapsed().as_millis() as u64,
            "call completed"
        );
        self.advance(HandlerPhase::Closed);
    }

    /// End the call with `err`. An abandoned call is left unclosed, so
    /// dropping the tracker logs it as abandoned rather than failed.
    pub(crate) fn fail(mut self, err: &ServiceError) {
        if err.is_abandoned() {
            return;
        }
        tracing::warn!(
            rpc.method = self.procedure.method,
            rpc.pattern = %self.procedure.kind,
            code = err.code().as_str(),
            error = %err,
            "call failed"
        );
        self.advance(HandlerPhase::Closed);
    }
}

impl Drop for CallTracker {
    fn drop(&mut self) {
        if self.phase != HandlerPhase::Closed {
            tracing::debug!(
                rpc.method = self.procedure.method,
                phase = self.phase.as_str(),
                emitted = self.emitted,
                "call abandoned by initiator"
            );
        }
    }
}
