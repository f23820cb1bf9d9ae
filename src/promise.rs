//! The settlement core: the state machine behind every [`Promise`] and the
//! two continuation handles, [`Resolve`] and [`Reject`], that drive it.
use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt,
    future::Future,
    mem,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll, Waker},
};

use crate::{Error, Resolution};

/// Where a [`Promise`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Pending,
    Fulfilled,
    Rejected,
}

type Callback<A> = Box<dyn FnOnce(A)>;

enum State<T, E> {
    Pending,
    /// Resolved with a thenable. Only that thenable's outcome can settle it.
    Adopting,
    Fulfilled(T),
    Rejected(E),
}

struct Inner<T, E> {
    state: State<T, E>,
    abandoned: bool,
    on_fulfilled: Vec<Callback<T>>,
    on_rejected: Vec<Callback<E>>,
    wakers: Vec<Waker>,
}

impl<T, E> Inner<T, E> {
    fn status(&self) -> Status {
        match self.state {
            State::Pending | State::Adopting => Status::Pending,
            State::Fulfilled(_) => Status::Fulfilled,
            State::Rejected(_) => Status::Rejected,
        }
    }
}

/// A value or failure that is not known yet.
///
/// `Promise` is a handle; clones share the same state. It can only be settled
/// through the [`Resolve`] and [`Reject`] handles handed out at construction,
/// or by a thenable it was resolved with.
///
/// # Examples
///
/// ```
/// use promise_chain::{Promise, Status};
///
/// let (resolve, _reject, promise) = Promise::<&str, ()>::pending();
/// let seen = promise.then(|v| Ok(v.len()));
/// assert_eq!(seen.status(), Status::Pending);
///
/// resolve.fulfill("🍓");
/// resolve.fulfill("ignored");
/// assert_eq!(promise.outcome(), Some(Ok("🍓")));
/// assert_eq!(seen.outcome(), Some(Ok(4)));
/// ```
pub struct Promise<T, E> {
    inner: Rc<RefCell<Inner<T, E>>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("status", &self.status())
            .field("abandoned", &self.is_abandoned())
            .finish()
    }
}

impl<T, E> Promise<T, E> {
    fn unsettled() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: State::Pending,
                abandoned: false,
                on_fulfilled: Vec::new(),
                on_rejected: Vec::new(),
                wakers: Vec::new(),
            })),
        }
    }

    pub fn status(&self) -> Status {
        self.inner.borrow().status()
    }

    /// True once the promise is pending and nothing is left that could ever
    /// settle it.
    pub fn is_abandoned(&self) -> bool {
        self.inner.borrow().abandoned
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Moves a pending promise into the adopting state. Returns false if it
    /// was already resolved one way or another.
    fn lock_in(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        if !matches!(inner.state, State::Pending) {
            return false;
        }
        inner.state = State::Adopting;
        true
    }
}

impl<T: 'static, E: 'static> Promise<T, E> {
    /// Marks a still-unsettled promise as never settling. Its queued
    /// continuations are dropped, which abandons the children waiting on them.
    pub(crate) fn abandon(&self) {
        let (on_fulfilled, on_rejected, wakers) = {
            let mut inner = self.inner.borrow_mut();
            if inner.abandoned || inner.status() != Status::Pending {
                return;
            }
            inner.abandoned = true;
            (
                mem::take(&mut inner.on_fulfilled),
                mem::take(&mut inner.on_rejected),
                mem::take(&mut inner.wakers),
            )
        };
        tracing::debug!(
            dropped = on_fulfilled.len() + on_rejected.len(),
            waiters = wakers.len(),
            "Promise abandoned while pending"
        );
        for waker in wakers {
            waker.wake()
        }
        release(Box::new((on_fulfilled, on_rejected)));
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Promise<T, E> {
    /// Runs `executor` right away with the two continuations that settle the
    /// new promise. Whichever is called first wins; later calls do nothing.
    ///
    /// An `Err` returned by the executor rejects the promise, unless it was
    /// already resolved.
    ///
    /// ```
    /// use promise_chain::Promise;
    ///
    /// let promise = Promise::new(|resolve, _reject| {
    ///     resolve.fulfill(1);
    ///     Err("too late")
    /// });
    /// assert_eq!(promise.outcome(), Some(Ok(1)));
    ///
    /// let failed = Promise::<i32, _>::new(|_resolve, _reject| Err("💥"));
    /// assert_eq!(failed.outcome(), Some(Err("💥")));
    /// ```
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(Resolve<T, E>, Reject<T, E>) -> Result<(), E>,
    {
        let (resolve, reject, promise) = Self::pending();
        if let Err(reason) = executor(resolve, reject.clone()) {
            reject.reject(reason);
        }
        promise
    }

    /// A pending promise together with the continuations that settle it.
    ///
    /// Once both handles (and all their clones) are dropped without settling
    /// the promise, it is abandoned.
    pub fn pending() -> (Resolve<T, E>, Reject<T, E>, Self) {
        let promise = Self::unsettled();
        let settler = Rc::new(Settler {
            promise: promise.clone(),
        });
        (
            Resolve {
                settler: Rc::clone(&settler),
            },
            Reject { settler },
            promise,
        )
    }

    /// The settled value or reason, or `None` while pending.
    pub fn outcome(&self) -> Option<Result<T, E>> {
        match &self.inner.borrow().state {
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
            State::Pending | State::Adopting => None,
        }
    }

    /// Registers a continuation for fulfillment. It runs once, now if the
    /// promise is already fulfilled, and never if the promise rejects or is
    /// abandoned.
    ///
    /// A panic in a continuation unwinds out of the call that settled the
    /// promise. The promise stays fulfilled, and the continuations queued
    /// after the panicking one never run.
    pub fn on_fulfilled<F>(&self, callback: F)
    where
        F: FnOnce(T) + 'static,
    {
        match self.outcome() {
            Some(Ok(value)) => callback(value),
            Some(Err(_)) => {}
            None => {
                let mut inner = self.inner.borrow_mut();
                if !inner.abandoned {
                    inner.on_fulfilled.push(Box::new(callback));
                }
            }
        }
    }

    /// Registers a continuation for rejection. It runs once, now if the
    /// promise is already rejected, and never if the promise fulfills or is
    /// abandoned.
    ///
    /// A panic in a continuation unwinds out of the call that settled the
    /// promise. The promise stays rejected, and the continuations queued
    /// after the panicking one never run.
    pub fn on_rejected<F>(&self, callback: F)
    where
        F: FnOnce(E) + 'static,
    {
        match self.outcome() {
            Some(Err(reason)) => callback(reason),
            Some(Ok(_)) => {}
            None => {
                let mut inner = self.inner.borrow_mut();
                if !inner.abandoned {
                    inner.on_rejected.push(Box::new(callback));
                }
            }
        }
    }

    /// Settles the promise and drains the matching queue. `adopted` lets the
    /// outcome of an adopted thenable through the adopting state.
    fn settle(&self, outcome: Result<T, E>, adopted: bool) {
        let (on_fulfilled, on_rejected, wakers) = {
            let mut inner = self.inner.borrow_mut();
            match inner.state {
                State::Pending => {}
                State::Adopting if adopted => {}
                _ => {
                    trace_ignored(inner.status());
                    return;
                }
            }
            inner.state = match &outcome {
                Ok(value) => State::Fulfilled(value.clone()),
                Err(reason) => State::Rejected(reason.clone()),
            };
            (
                mem::take(&mut inner.on_fulfilled),
                mem::take(&mut inner.on_rejected),
                mem::take(&mut inner.wakers),
            )
        };
        match &outcome {
            Ok(_) => trace_settled(true, on_fulfilled.len()),
            Err(_) => trace_settled(false, on_rejected.len()),
        }
        for waker in wakers {
            waker.wake()
        }
        match outcome {
            Ok(value) => {
                drop(on_rejected);
                drain(on_fulfilled, value);
            }
            Err(reason) => {
                drop(on_fulfilled);
                drain(on_rejected, reason);
            }
        }
    }
}

fn drain<A: Clone>(callbacks: Vec<Callback<A>>, payload: A) {
    for callback in callbacks {
        callback(payload.clone())
    }
}

// Kept out of the generic `settle` so each link of a settling chain costs
// less stack.
#[inline(never)]
fn trace_settled(fulfilled: bool, continuations: usize) {
    tracing::trace!(fulfilled, continuations, "Promise settled");
}

#[inline(never)]
fn trace_ignored(status: Status) {
    tracing::trace!(status = ?status, "Promise already resolved, settlement ignored");
}

struct Releaser {
    queue: RefCell<VecDeque<Box<dyn Any>>>,
    active: Cell<bool>,
}

thread_local! {
    static RELEASER: Releaser = Releaser {
        queue: RefCell::new(VecDeque::new()),
        active: Cell::new(false),
    };
}

struct Deactivate;

impl Drop for Deactivate {
    fn drop(&mut self) {
        let _ = RELEASER.try_with(|releaser| releaser.active.set(false));
    }
}

/// Drops the queues of an abandoned promise. Dropping them abandons the
/// children, whose queues land here too; only the outermost call drops, in a
/// loop, so a long pending chain unwinds without recursing.
fn release(garbage: Box<dyn Any>) {
    let outermost = RELEASER.try_with(|releaser| {
        releaser.queue.borrow_mut().push_back(garbage);
        !releaser.active.replace(true)
    });
    if !matches!(outermost, Ok(true)) {
        return;
    }
    let _deactivate = Deactivate;
    while let Some(garbage) = RELEASER.with(|releaser| releaser.queue.borrow_mut().pop_front()) {
        drop(garbage);
    }
}

/// Shared by a promise's [`Resolve`] and [`Reject`] handles. The last one to
/// go abandons the promise if it never settled.
struct Settler<T: 'static, E: 'static> {
    promise: Promise<T, E>,
}

impl<T: 'static, E: 'static> Drop for Settler<T, E> {
    fn drop(&mut self) {
        self.promise.abandon()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Settler<T, E> {
    fn adopt(self: &Rc<Self>, resolution: Resolution<T, E>) {
        let promise = &self.promise;
        match resolution {
            Resolution::Value(value) => promise.settle(Ok(value), false),
            Resolution::Promise(source) => {
                if !promise.lock_in() {
                    tracing::trace!("Promise already resolved, adoption ignored");
                    return;
                }
                if source.ptr_eq(promise) {
                    tracing::warn!("Promise resolved with itself, it can never settle");
                    promise.abandon();
                    return;
                }
                tracing::trace!("Promise locked in to another promise");
                let fulfilled = Rc::clone(self);
                source.on_fulfilled(move |value| fulfilled.promise.settle(Ok(value), true));
                let rejected = Rc::clone(self);
                source.on_rejected(move |reason| rejected.promise.settle(Err(reason), true));
            }
            Resolution::Thenable(thenable) => {
                if !promise.lock_in() {
                    tracing::trace!("Promise already resolved, adoption ignored");
                    return;
                }
                tracing::trace!("Promise locked in to a thenable");
                let fulfilled = Rc::clone(self);
                let rejected = Rc::clone(self);
                thenable.on_settled(
                    Box::new(move |value| fulfilled.promise.settle(Ok(value), true)),
                    Box::new(move |reason| rejected.promise.settle(Err(reason), true)),
                );
            }
        }
    }
}

/// The fulfilling continuation of a [`Promise`].
pub struct Resolve<T: 'static, E: 'static> {
    settler: Rc<Settler<T, E>>,
}

impl<T: 'static, E: 'static> Clone for Resolve<T, E> {
    fn clone(&self) -> Self {
        Self {
            settler: Rc::clone(&self.settler),
        }
    }
}

impl<T: 'static, E: 'static> fmt::Debug for Resolve<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolve")
            .field("promise", &self.settler.promise)
            .finish()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Resolve<T, E> {
    /// Fulfills the promise with `value`, unless it is already resolved.
    pub fn fulfill(&self, value: T) {
        self.settler.promise.settle(Ok(value), false)
    }

    /// Fulfills the promise with a plain value, or locks it in to the
    /// eventual outcome of a thenable.
    pub fn resolve(&self, resolution: impl Into<Resolution<T, E>>) {
        self.settler.adopt(resolution.into())
    }
}

/// The rejecting continuation of a [`Promise`].
pub struct Reject<T: 'static, E: 'static> {
    settler: Rc<Settler<T, E>>,
}

impl<T: 'static, E: 'static> Clone for Reject<T, E> {
    fn clone(&self) -> Self {
        Self {
            settler: Rc::clone(&self.settler),
        }
    }
}

impl<T: 'static, E: 'static> fmt::Debug for Reject<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reject")
            .field("promise", &self.settler.promise)
            .finish()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Reject<T, E> {
    /// Rejects the promise with `reason`, unless it is already resolved.
    pub fn reject(&self, reason: E) {
        self.settler.promise.settle(Err(reason), false)
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Future for Promise<T, E> {
    type Output = Result<T, Error<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(outcome) = self.outcome() {
            return Poll::Ready(outcome.map_err(Error::Rejected));
        }
        let mut inner = self.inner.borrow_mut();
        if inner.abandoned {
            return Poll::Ready(Err(Error::Abandoned));
        }
        if !inner.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
            inner.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}
