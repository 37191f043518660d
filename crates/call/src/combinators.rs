//! Operators that build new calls out of existing ones
//!
//! Every combinator stores recipes, never call instances. Executing a
//! combined call dispatches fresh branch operations, so cloning a combined
//! call yields an independent retry of the whole tree.

use futures::future::{self, BoxFuture};
use std::fmt;
use std::sync::Arc;

use spanstore_core::Result;

use crate::call::{Call, Recipe};

type Source<T> = Arc<dyn Recipe<Output = T>>;

impl<T: Send + 'static> Call<T> {
    /// A call that succeeds with `value` without touching any session
    pub fn ready(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Call::new(Ready { value })
    }

    /// A call built from a closure that issues the operation
    ///
    /// `description` is what `Display` shows for the call.
    pub fn from_fn<F>(description: impl Into<String>, issue: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<T>> + Send + Sync + 'static,
    {
        Call::new(FromFn {
            description: description.into(),
            issue,
        })
    }

    /// Transform a successful result; failures pass through unchanged
    ///
    /// Consumes this handle; the returned call starts out `New`.
    pub fn map<U, F>(self, f: F) -> Call<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        Call::new(Mapped {
            source: self.recipe,
            f: Arc::new(f),
        })
    }

    /// Transform a successful result with a fallible function
    pub fn try_map<U, F>(self, f: F) -> Call<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Result<U> + Send + Sync + 'static,
    {
        Call::new(TryMapped {
            source: self.recipe,
            f: Arc::new(f),
        })
    }

    /// Run a follow-up call derived from this call's result
    ///
    /// The follow-up runs inside the same execution, so canceling the
    /// combined call cancels whichever stage is in flight.
    pub fn flat_map<U, F>(self, f: F) -> Call<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Call<U> + Send + Sync + 'static,
    {
        Call::new(FlatMapped {
            source: self.recipe,
            f: Arc::new(f),
        })
    }

    /// Run every call concurrently and collect results in input order
    ///
    /// All branches are issued before any is awaited. The first failure
    /// fails the combined call with that failure, and outstanding branches
    /// are dropped; results of branches that already finished are
    /// discarded. No branches yields an empty vector.
    pub fn fan_out(calls: Vec<Call<T>>) -> Call<Vec<T>> {
        Call::new(FanOut {
            branches: calls.into_iter().map(|call| call.recipe).collect(),
        })
    }
}

struct Ready<T> {
    value: T,
}

impl<T> Recipe for Ready<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = T;

    fn dispatch(&self) -> BoxFuture<'static, Result<T>> {
        Box::pin(future::ready(Ok(self.value.clone())))
    }
}

impl<T> fmt::Display for Ready<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ready")
    }
}

struct FromFn<F> {
    description: String,
    issue: F,
}

impl<T, F> Recipe for FromFn<F>
where
    F: Fn() -> BoxFuture<'static, Result<T>> + Send + Sync + 'static,
{
    type Output = T;

    fn dispatch(&self) -> BoxFuture<'static, Result<T>> {
        (self.issue)()
    }
}

impl<F> fmt::Display for FromFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

struct Mapped<T, U> {
    source: Source<T>,
    f: Arc<dyn Fn(T) -> U + Send + Sync>,
}

impl<T, U> Recipe for Mapped<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    type Output = U;

    fn dispatch(&self) -> BoxFuture<'static, Result<U>> {
        let pending = self.source.dispatch();
        let f = Arc::clone(&self.f);
        Box::pin(async move { pending.await.map(|value| f(value)) })
    }
}

impl<T, U> fmt::Display for Mapped<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mapped{{{}}}", self.source)
    }
}

struct TryMapped<T, U> {
    source: Source<T>,
    f: Arc<dyn Fn(T) -> Result<U> + Send + Sync>,
}

impl<T, U> Recipe for TryMapped<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    type Output = U;

    fn dispatch(&self) -> BoxFuture<'static, Result<U>> {
        let pending = self.source.dispatch();
        let f = Arc::clone(&self.f);
        Box::pin(async move { pending.await.and_then(|value| f(value)) })
    }
}

impl<T, U> fmt::Display for TryMapped<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TryMapped{{{}}}", self.source)
    }
}

struct FlatMapped<T, U> {
    source: Source<T>,
    f: Arc<dyn Fn(T) -> Call<U> + Send + Sync>,
}

impl<T, U> Recipe for FlatMapped<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    type Output = U;

    fn dispatch(&self) -> BoxFuture<'static, Result<U>> {
        let pending = self.source.dispatch();
        let f = Arc::clone(&self.f);
        Box::pin(async move {
            let value = pending.await?;
            let next = f(value);
            next.recipe.dispatch().await
        })
    }
}

impl<T, U> fmt::Display for FlatMapped<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlatMapped{{{}}}", self.source)
    }
}

struct FanOut<T> {
    branches: Vec<Source<T>>,
}

impl<T> Recipe for FanOut<T>
where
    T: Send + 'static,
{
    type Output = Vec<T>;

    fn dispatch(&self) -> BoxFuture<'static, Result<Vec<T>>> {
        let pending: Vec<_> = self.branches.iter().map(|branch| branch.dispatch()).collect();
        Box::pin(future::try_join_all(pending))
    }
}

impl<T> fmt::Display for FanOut<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FanOut{")?;
        for (i, branch) in self.branches.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", branch)?;
        }
        f.write_str("}")
    }
}
