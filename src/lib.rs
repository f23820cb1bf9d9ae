//! Single-threaded, chainable promises.
//!
//! A [`Promise`] is a value or failure that is not known yet. It starts
//! pending, settles exactly once (fulfilled with a `T` or rejected with an
//! `E`), and runs every continuation registered on it in registration order.
//! Continuations registered after settlement run immediately.
//!
//! Everything runs synchronously on the caller's stack: the executor runs
//! inside [`Promise::new`], and continuations run inside the call that
//! settles the promise. There is no scheduler and no thread safety; the types
//! are `!Send`.
//!
//! Settling a promise runs its children's continuations, which settle the
//! grandchildren, and so on: settling the root of a pending chain takes one
//! nested call per link. Chains a few thousand links deep (a few hundred in
//! debug builds) can overflow the stack when their root settles. Dropping such
//! a chain unsettled is fine at any depth.
//!
//! # Examples
//!
//! ```
//! use promise_chain::{Promise, Status};
//!
//! let promise: Promise<i32, String> = Promise::fulfilled(3);
//! let child = promise
//!     .then(|v| if v > 2 { Err(format!("{}", v * 4)) } else { Ok(v) })
//!     .catch(|reason| reason.parse::<i32>().map_err(|e| e.to_string()));
//!
//! assert_eq!(child.status(), Status::Fulfilled);
//! assert_eq!(child.outcome(), Some(Ok(12)));
//! ```
//!
//! A promise is also a [`Future`](std::future::Future):
//!
//! ```
//! use promise_chain::{Error, Promise};
//! use futures::executor::block_on;
//!
//! let (resolve, reject, promise) = Promise::<String, String>::pending();
//! drop(reject);
//! let answer = block_on(async {
//!     let (value, _) = futures::join!(promise, async { resolve.fulfill("🍓".into()) });
//!     value
//! });
//! assert_eq!(answer, Ok(String::from("🍓")));
//!
//! let rejected: Promise<(), &str> = Promise::reject("💥");
//! assert_eq!(block_on(rejected), Err(Error::Rejected("💥")));
//! ```
mod chain;
mod combinators;
mod promise;
mod resolution;

pub use combinators::{AggregateError, Settled};
pub use promise::{Promise, Reject, Resolve, Status};
pub use resolution::{Resolution, Thenable};

use thiserror::Error;

/// Why awaiting a [`Promise`] did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error<E> {
    /// The promise settled rejected with this reason.
    #[error("Promise rejected")]
    Rejected(E),
    /// Every handle able to settle the promise was dropped while it was
    /// pending, so it never will settle.
    #[error("Promise abandoned before it settled")]
    Abandoned,
}

impl<E> Error<E> {
    /// The rejection reason, if there is one.
    pub fn into_reason(self) -> Option<E> {
        match self {
            Error::Rejected(reason) => Some(reason),
            Error::Abandoned => None,
        }
    }
}
