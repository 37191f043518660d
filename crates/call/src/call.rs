//! Single-dispatch asynchronous calls
//!
//! A [`Call`] pairs an immutable [`Recipe`] (what to run, with which bound
//! parameters) with per-instance state (whether it already ran). The recipe
//! is shared by every clone; the state never is. That split is what makes
//! retry safe: `call.clone()` is a fresh, unexecuted call with the same
//! parameters, and cloning never touches the original.

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tracing::debug;

use spanstore_core::{Error, Result};

use crate::state::{CallState, Shared};

/// How to produce one result
///
/// Implementations hold everything needed to issue the operation again:
/// a shared factory (session + prepared statement) and bound values.
/// `Display` renders those parameters for diagnostics and must not include
/// secrets.
pub trait Recipe: fmt::Display + Send + Sync + 'static {
    /// Result of a successful dispatch
    type Output;

    /// Issue the operation
    ///
    /// Called once per execution of a call built from this recipe.
    fn dispatch(&self) -> BoxFuture<'static, Result<Self::Output>>;
}

/// A cancelable asynchronous operation that may be executed at most once
pub struct Call<T> {
    pub(crate) recipe: Arc<dyn Recipe<Output = T>>,
    shared: Arc<Shared>,
}

impl<T: Send + 'static> Call<T> {
    /// Create a call from a recipe
    pub fn new<R>(recipe: R) -> Self
    where
        R: Recipe<Output = T>,
    {
        Call {
            recipe: Arc::new(recipe),
            shared: Arc::new(Shared::new()),
        }
    }

    /// Current lifecycle state of this instance
    pub fn state(&self) -> CallState {
        self.shared.state()
    }

    /// True once `cancel` has taken effect
    pub fn is_canceled(&self) -> bool {
        self.state() == CallState::Canceled
    }

    /// Dispatch the operation on the current tokio runtime
    ///
    /// The operation starts immediately; the returned [`Execution`] resolves
    /// to its result. Dropping the execution does not cancel the operation.
    ///
    /// # Errors
    ///
    /// - `Error::AlreadyExecuted` if this instance was executed before
    /// - `Error::Canceled` if this instance was canceled before executing
    /// - `Error::Runtime` if called outside a tokio runtime
    pub fn execute(&self) -> Result<Execution<T>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Runtime(format!("{}: {}", self, e)))?;

        if let Err(observed) = self.shared.begin() {
            return Err(match observed {
                CallState::Canceled => Error::Canceled(self.to_string()),
                _ => Error::AlreadyExecuted(self.to_string()),
            });
        }

        let description = self.to_string();
        debug!(target: "spanstore::call", call = %description, "Call executing");

        let future = self.recipe.dispatch();
        let shared = Arc::clone(&self.shared);
        let task_description = description.clone();
        let handle = runtime.spawn(async move {
            let result = future.await;
            let terminal = if result.is_ok() {
                CallState::Completed
            } else {
                CallState::Failed
            };
            if shared.finish(terminal) {
                result
            } else {
                Err(Error::Canceled(task_description))
            }
        });
        self.shared.arm(handle.abort_handle());

        Ok(Execution {
            handle,
            shared: Arc::clone(&self.shared),
            description,
        })
    }

    /// Execute and wait for the result
    pub async fn run(&self) -> Result<T> {
        self.execute()?.await
    }

    /// Cancel this call
    ///
    /// If the operation has not delivered yet, its result is suppressed and
    /// the execution resolves to `Error::Canceled`. After completion this is
    /// a no-op. Idempotent.
    pub fn cancel(&self) {
        if self.shared.cancel() {
            debug!(target: "spanstore::call", call = %self, "Call canceled");
        }
    }

    /// A handle that cancels this instance from elsewhere, e.g. another task
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Clone for Call<T> {
    /// A fresh, unexecuted call sharing this call's recipe
    fn clone(&self) -> Self {
        Call {
            recipe: Arc::clone(&self.recipe),
            shared: Arc::new(Shared::new()),
        }
    }
}

impl<T> fmt::Display for Call<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.recipe, f)
    }
}

impl<T> fmt::Debug for Call<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("recipe", &self.recipe.to_string())
            .field("state", &self.shared.state())
            .finish()
    }
}

/// Cancels one call instance; cheap to clone and send across threads
#[derive(Debug, Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    /// Same as [`Call::cancel`]
    pub fn cancel(&self) {
        if self.shared.cancel() {
            debug!(target: "spanstore::call", "Call canceled via handle");
        }
    }

    /// Lifecycle state of the call this handle belongs to
    pub fn state(&self) -> CallState {
        self.shared.state()
    }
}

/// The in-flight result of [`Call::execute`]
#[must_use = "an execution does nothing observable unless awaited"]
pub struct Execution<T> {
    handle: JoinHandle<Result<T>>,
    shared: Arc<Shared>,
    description: String,
}

impl<T> Execution<T> {
    /// Cancel the call this execution belongs to
    pub fn cancel(&self) {
        self.shared.cancel();
    }
}

impl<T> Future for Execution<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.handle).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(e)) if e.is_cancelled() => {
                Poll::Ready(Err(Error::Canceled(this.description.clone())))
            }
            Poll::Ready(Err(e)) => {
                this.shared.finish(CallState::Failed);
                Poll::Ready(Err(Error::Runtime(format!(
                    "{} panicked: {}",
                    this.description, e
                ))))
            }
        }
    }
}

impl<T> fmt::Debug for Execution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Execution")
            .field("call", &self.description)
            .field("state", &self.shared.state())
            .finish()
    }
}
