//! Per-instance call state
//!
//! ```text
//! New ──execute──▶ Executing ──▶ Completed
//!  │                   │    └──▶ Failed
//!  └──cancel──▶ Canceled ◀──cancel┘
//! ```
//!
//! `New → Executing` happens at most once. Terminal states never change.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::task::AbortHandle;

/// Lifecycle of one call instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CallState {
    /// Not yet executed
    New = 0,
    /// Dispatched, result not yet delivered
    Executing = 1,
    /// Delivered a success
    Completed = 2,
    /// Delivered a failure
    Failed = 3,
    /// Canceled before delivering
    Canceled = 4,
}

impl CallState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => CallState::New,
            1 => CallState::Executing,
            2 => CallState::Completed,
            3 => CallState::Failed,
            4 => CallState::Canceled,
            // Only `CallState as u8` is ever stored
            other => unreachable!("call state byte {} is never stored", other),
        }
    }

    /// True for `Completed`, `Failed` and `Canceled`
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CallState::Completed | CallState::Failed | CallState::Canceled
        )
    }
}

/// State shared between a call, its execution and any cancel handles
#[derive(Debug)]
pub(crate) struct Shared {
    state: AtomicU8,
    abort: Mutex<Option<AbortHandle>>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Shared {
            state: AtomicU8::new(CallState::New as u8),
            abort: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> CallState {
        CallState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: CallState, to: CallState) -> Result<(), CallState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(CallState::from_u8)
    }

    /// `New → Executing`; on failure returns the state that was observed
    pub(crate) fn begin(&self) -> Result<(), CallState> {
        self.transition(CallState::New, CallState::Executing)
    }

    /// `Executing → terminal`; false if the call was canceled meanwhile
    pub(crate) fn finish(&self, terminal: CallState) -> bool {
        debug_assert!(terminal.is_terminal());
        self.transition(CallState::Executing, terminal).is_ok()
    }

    /// Record the task backing an execution so `cancel` can abort it
    pub(crate) fn arm(&self, handle: AbortHandle) {
        let mut slot = self.abort.lock();
        if self.state() == CallState::Canceled {
            handle.abort();
        } else {
            *slot = Some(handle);
        }
    }

    /// Move a non-terminal call to `Canceled`
    ///
    /// Returns true if this invocation performed the transition. Safe to call
    /// repeatedly and from any thread.
    pub(crate) fn cancel(&self) -> bool {
        let mut current = self.state();
        loop {
            if current.is_terminal() {
                return false;
            }
            match self.transition(current, CallState::Canceled) {
                Ok(()) => break,
                Err(observed) => current = observed,
            }
        }

        if let Some(handle) = self.abort.lock().take() {
            handle.abort();
        }
        true
    }
}
