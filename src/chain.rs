//! Chaining: `then`, `catch` and `finally`, each producing a child promise
//! whose settlement is driven by its parent.
use std::{cell::Cell, rc::Rc};

use crate::{Promise, Reject, Resolution, Resolve};

fn forward<U, E>(
    resolve: &Resolve<U, E>,
    reject: &Reject<U, E>,
    outcome: Result<Resolution<U, E>, E>,
) where
    U: Clone + 'static,
    E: Clone + 'static,
{
    match outcome {
        Ok(resolution) => resolve.resolve(resolution),
        Err(reason) => reject.reject(reason),
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Promise<T, E> {
    /// Registers one handler per outcome and returns the child promise they
    /// settle.
    ///
    /// Exactly one handler runs. `Ok` with a plain value fulfills the child,
    /// `Ok` with a thenable makes the child adopt its outcome, and `Err`
    /// rejects the child.
    pub fn then_with<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Resolution<U, E>, E> + 'static,
        R: FnOnce(E) -> Result<Resolution<U, E>, E> + 'static,
    {
        Promise::new(|resolve, reject| {
            let (resolve_fulfilled, reject_fulfilled) = (resolve.clone(), reject.clone());
            self.on_fulfilled(move |value| {
                forward(&resolve_fulfilled, &reject_fulfilled, on_fulfilled(value))
            });
            self.on_rejected(move |reason| forward(&resolve, &reject, on_rejected(reason)));
            Ok(())
        })
    }

    /// Maps the fulfilled value. Rejections pass through untouched; an `Err`
    /// from `on_fulfilled` rejects the child.
    ///
    /// ```
    /// use promise_chain::Promise;
    ///
    /// let promise: Promise<i32, String> = Promise::fulfilled(3);
    /// assert_eq!(promise.then(|v| Ok(v * 4)).outcome(), Some(Ok(12)));
    /// ```
    pub fn then<U, F>(&self, on_fulfilled: F) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<U, E> + 'static,
    {
        self.then_with(move |value| on_fulfilled(value).map(Resolution::Value), Err)
    }

    /// Like [`then`](Self::then), but the handler may hand back a promise (or
    /// any [`Resolution`]) whose outcome the child adopts.
    ///
    /// ```
    /// use promise_chain::{Promise, Status};
    ///
    /// let (resolve, _reject, later) = Promise::<i32, ()>::pending();
    /// let child: Promise<i32, ()> = Promise::fulfilled(1).and_then(move |_| Ok(later));
    /// assert_eq!(child.status(), Status::Pending);
    ///
    /// resolve.fulfill(2);
    /// assert_eq!(child.outcome(), Some(Ok(2)));
    /// ```
    pub fn and_then<U, R, F>(&self, on_fulfilled: F) -> Promise<U, E>
    where
        U: Clone + 'static,
        R: Into<Resolution<U, E>>,
        F: FnOnce(T) -> Result<R, E> + 'static,
    {
        self.then_with(move |value| on_fulfilled(value).map(Into::into), Err)
    }

    /// Recovers from a rejection. Fulfillment passes through untouched; an
    /// `Err` from `on_rejected` rejects the child with the new reason.
    pub fn catch<F>(&self, on_rejected: F) -> Promise<T, E>
    where
        F: FnOnce(E) -> Result<T, E> + 'static,
    {
        self.then_with(
            |value| Ok(Resolution::Value(value)),
            move |reason| on_rejected(reason).map(Resolution::Value),
        )
    }

    /// Like [`catch`](Self::catch), but the handler may hand back a promise to
    /// adopt.
    pub fn or_else<R, F>(&self, on_rejected: F) -> Promise<T, E>
    where
        R: Into<Resolution<T, E>>,
        F: FnOnce(E) -> Result<R, E> + 'static,
    {
        self.then_with(
            |value| Ok(Resolution::Value(value)),
            move |reason| on_rejected(reason).map(Into::into),
        )
    }

    /// Runs `on_finally` once the promise settles, either way, without
    /// letting it see the outcome.
    ///
    /// The child settles with the parent's outcome, unless `on_finally`
    /// fails, in which case it rejects with that error instead.
    ///
    /// ```
    /// use promise_chain::Promise;
    ///
    /// let promise: Promise<&str, &str> = Promise::reject("💥");
    /// assert_eq!(promise.finally(|| Ok(())).outcome(), Some(Err("💥")));
    /// assert_eq!(promise.finally(|| Err("🔥")).outcome(), Some(Err("🔥")));
    /// ```
    pub fn finally<F>(&self, on_finally: F) -> Promise<T, E>
    where
        F: FnOnce() -> Result<(), E> + 'static,
    {
        let on_fulfilled = Rc::new(Cell::new(Some(on_finally)));
        let on_rejected = Rc::clone(&on_fulfilled);
        self.then_with(
            move |value| {
                run_once(&on_fulfilled)?;
                Ok(Resolution::Value(value))
            },
            move |reason| {
                run_once(&on_rejected)?;
                Err(reason)
            },
        )
    }
}

fn run_once<F, E>(slot: &Cell<Option<F>>) -> Result<(), E>
where
    F: FnOnce() -> Result<(), E>,
{
    slot.take().map_or(Ok(()), |f| f())
}
