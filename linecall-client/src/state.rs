//! Call state shared by the write and read activities of one call.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use linecall_core::{CallState, PatternKind};

use crate::ClientError;

#[derive(Clone, Debug)]
pub(crate) struct SharedCallState(Arc<Mutex<CallState>>);

impl SharedCallState {
    pub(crate) fn new(kind: PatternKind) -> Self {
        Self(Arc::new(Mutex::new(CallState::new(kind))))
    }

    fn lock(&self) -> MutexGuard<'_, CallState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> CallState {
        self.lock().clone()
    }

    pub(crate) fn record_send(&self) -> Result<(), ClientError> {
        Ok(self.lock().record_send()?)
    }

    pub(crate) fn finish_send(&self) -> Result<(), ClientError> {
        Ok(self.lock().finish_send()?)
    }

    pub(crate) fn record_receive(&self) -> Result<(), ClientError> {
        Ok(self.lock().record_receive()?)
    }

    pub(crate) fn close_receive(&self) -> Result<(), ClientError> {
        Ok(self.lock().close_receive()?)
    }

    pub(crate) fn fail(&self) {
        self.lock().fail();
    }
}
