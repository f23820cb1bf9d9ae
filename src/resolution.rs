//! What a promise can be resolved with, and the static constructors built on
//! it.
use std::fmt;

use crate::Promise;

/// Anything exposing a `then` with the two-continuation shape.
///
/// A promise resolved with a thenable takes on whatever outcome the thenable
/// reports. Implementations should call at most one of the continuations, at
/// most once; extra calls are ignored.
///
/// # Examples
///
/// ```
/// use promise_chain::{Promise, Resolution, Thenable};
///
/// struct Ready(u8);
///
/// impl Thenable<u8, String> for Ready {
///     fn on_settled(
///         self: Box<Self>,
///         on_fulfilled: Box<dyn FnOnce(u8)>,
///         _: Box<dyn FnOnce(String)>,
///     ) {
///         on_fulfilled(self.0)
///     }
/// }
///
/// let promise = Promise::resolve(Resolution::thenable(Ready(7)));
/// assert_eq!(promise.outcome(), Some(Ok(7)));
/// ```
pub trait Thenable<T, E> {
    fn on_settled(
        self: Box<Self>,
        on_fulfilled: Box<dyn FnOnce(T)>,
        on_rejected: Box<dyn FnOnce(E)>,
    );
}

impl<T: Clone + 'static, E: Clone + 'static> Thenable<T, E> for Promise<T, E> {
    fn on_settled(
        self: Box<Self>,
        on_fulfilled: Box<dyn FnOnce(T)>,
        on_rejected: Box<dyn FnOnce(E)>,
    ) {
        self.on_fulfilled(on_fulfilled);
        self.on_rejected(on_rejected);
    }
}

/// A plain value or a thenable whose outcome should be adopted.
pub enum Resolution<T, E> {
    Value(T),
    Promise(Promise<T, E>),
    Thenable(Box<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    pub fn thenable(thenable: impl Thenable<T, E> + 'static) -> Self {
        Resolution::Thenable(Box::new(thenable))
    }

    /// Whether resolving with this means adopting another outcome rather
    /// than fulfilling.
    pub fn is_thenable(&self) -> bool {
        !matches!(self, Resolution::Value(_))
    }
}

impl<T, E> From<Promise<T, E>> for Resolution<T, E> {
    fn from(promise: Promise<T, E>) -> Self {
        Resolution::Promise(promise)
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Promise(promise) => f.debug_tuple("Promise").field(promise).finish(),
            Resolution::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Promise<T, E> {
    /// A promise for `value`.
    ///
    /// A plain value gives an already fulfilled promise. A `Promise` is
    /// returned as is, since it already carries the outcome to adopt. Any
    /// other thenable gives a new promise locked in to it.
    pub fn resolve(value: impl Into<Resolution<T, E>>) -> Self {
        match value.into() {
            Resolution::Promise(promise) => promise,
            resolution => {
                let (resolve, _reject, promise) = Self::pending();
                resolve.resolve(resolution);
                promise
            }
        }
    }

    /// An already fulfilled promise.
    pub fn fulfilled(value: T) -> Self {
        Self::resolve(Resolution::Value(value))
    }

    /// An already rejected promise. `reason` is never adopted, even if it is
    /// a promise itself.
    pub fn reject(reason: E) -> Self {
        let (_resolve, reject, promise) = Self::pending();
        reject.reject(reason);
        promise
    }
}
