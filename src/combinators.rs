//! Combinators that fold a fixed collection of promises into one.
use std::{
    cell::{Cell, RefCell},
    iter,
    rc::Rc,
};

use thiserror::Error;

use crate::{Promise, Resolution, Status};

/// How one input of [`Promise::all_settled`] ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T, E> {
    Fulfilled { value: T },
    Rejected { reason: E },
}

impl<T, E> Settled<T, E> {
    pub fn status(&self) -> Status {
        match self {
            Settled::Fulfilled { .. } => Status::Fulfilled,
            Settled::Rejected { .. } => Status::Rejected,
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Settled::Fulfilled { value } => Ok(value),
            Settled::Rejected { reason } => Err(reason),
        }
    }
}

/// Rejection reason of [`Promise::any`] when no input fulfilled. `errors`
/// follows input order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("All {} promises were rejected", .errors.len())]
pub struct AggregateError<E> {
    pub errors: Vec<E>,
}

/// One slot per input, filled in whatever order the inputs settle.
struct Slots<V> {
    values: RefCell<Vec<Option<V>>>,
    remaining: Cell<usize>,
}

impl<V> Slots<V> {
    fn new(len: usize) -> Rc<Self> {
        Rc::new(Self {
            values: RefCell::new(iter::repeat_with(|| None).take(len).collect()),
            remaining: Cell::new(len),
        })
    }

    /// Stores `value` at `index`; returns every value, in order, once the
    /// last slot is filled.
    fn fill(&self, index: usize, value: V) -> Option<Vec<V>> {
        let mut values = self.values.borrow_mut();
        if values[index].replace(value).is_none() {
            self.remaining.set(self.remaining.get() - 1);
        }
        (self.remaining.get() == 0).then(|| values.drain(..).flatten().collect())
    }
}

fn coerce<T, E, I>(inputs: I) -> Vec<Promise<T, E>>
where
    T: Clone + 'static,
    E: Clone + 'static,
    I: IntoIterator,
    I::Item: Into<Resolution<T, E>>,
{
    inputs.into_iter().map(Promise::resolve).collect()
}

impl<T: Clone + 'static, E: Clone + 'static> Promise<T, E> {
    /// Fulfills with every input's value, in input order, once all of them
    /// fulfill. Rejects with the first rejection to arrive.
    ///
    /// An empty input fulfills right away with an empty `Vec`.
    ///
    /// ```
    /// use promise_chain::Promise;
    ///
    /// let all = Promise::<i32, ()>::all([Promise::fulfilled(1), Promise::fulfilled(2)]);
    /// assert_eq!(all.outcome(), Some(Ok(vec![1, 2])));
    /// ```
    pub fn all<I>(inputs: I) -> Promise<Vec<T>, E>
    where
        I: IntoIterator,
        I::Item: Into<Resolution<T, E>>,
    {
        let inputs = coerce(inputs);
        Promise::new(|resolve, reject| {
            if inputs.is_empty() {
                resolve.fulfill(Vec::new());
                return Ok(());
            }
            let slots = Slots::new(inputs.len());
            for (index, input) in inputs.iter().enumerate() {
                let (resolve, slots) = (resolve.clone(), Rc::clone(&slots));
                input.on_fulfilled(move |value| {
                    if let Some(values) = slots.fill(index, value) {
                        resolve.fulfill(values);
                    }
                });
                let reject = reject.clone();
                input.on_rejected(move |reason| reject.reject(reason));
            }
            Ok(())
        })
    }

    /// Waits for every input to settle and fulfills with how each one ended,
    /// in input order. Never rejects.
    ///
    /// An empty input fulfills right away with an empty `Vec`.
    pub fn all_settled<I>(inputs: I) -> Promise<Vec<Settled<T, E>>, E>
    where
        I: IntoIterator,
        I::Item: Into<Resolution<T, E>>,
    {
        let inputs = coerce(inputs);
        Promise::new(|resolve, _reject| {
            if inputs.is_empty() {
                resolve.fulfill(Vec::new());
                return Ok(());
            }
            let slots = Slots::new(inputs.len());
            for (index, input) in inputs.iter().enumerate() {
                let (fulfilled, fulfilled_slots) = (resolve.clone(), Rc::clone(&slots));
                input.on_fulfilled(move |value| {
                    let outcome = Settled::Fulfilled { value };
                    if let Some(outcomes) = fulfilled_slots.fill(index, outcome) {
                        fulfilled.fulfill(outcomes);
                    }
                });
                let (rejected, rejected_slots) = (resolve.clone(), Rc::clone(&slots));
                input.on_rejected(move |reason| {
                    let outcome = Settled::Rejected { reason };
                    if let Some(outcomes) = rejected_slots.fill(index, outcome) {
                        rejected.fulfill(outcomes);
                    }
                });
            }
            Ok(())
        })
    }

    /// Settles the same way as the first input to settle. Inputs are
    /// registered in order, so among inputs that are already settled the
    /// earliest one wins.
    ///
    /// An empty input never settles; the returned promise is abandoned.
    pub fn race<I>(inputs: I) -> Promise<T, E>
    where
        I: IntoIterator,
        I::Item: Into<Resolution<T, E>>,
    {
        let inputs = coerce(inputs);
        Promise::new(|resolve, reject| {
            for input in &inputs {
                let resolve = resolve.clone();
                input.on_fulfilled(move |value| resolve.fulfill(value));
                let reject = reject.clone();
                input.on_rejected(move |reason| reject.reject(reason));
            }
            Ok(())
        })
    }

    /// Fulfills with the first input to fulfill. Rejects with an
    /// [`AggregateError`] of every reason, in input order, once all inputs
    /// reject.
    ///
    /// An empty input rejects right away with an empty [`AggregateError`].
    ///
    /// ```
    /// use promise_chain::{AggregateError, Promise};
    ///
    /// let any = Promise::<(), i32>::any([Promise::reject(1), Promise::reject(2)]);
    /// assert_eq!(any.outcome(), Some(Err(AggregateError { errors: vec![1, 2] })));
    /// ```
    pub fn any<I>(inputs: I) -> Promise<T, AggregateError<E>>
    where
        I: IntoIterator,
        I::Item: Into<Resolution<T, E>>,
    {
        let inputs = coerce(inputs);
        Promise::new(|resolve, reject| {
            if inputs.is_empty() {
                reject.reject(AggregateError { errors: Vec::new() });
                return Ok(());
            }
            let slots = Slots::new(inputs.len());
            for (index, input) in inputs.iter().enumerate() {
                let resolve = resolve.clone();
                input.on_fulfilled(move |value| resolve.fulfill(value));
                let (reject, slots) = (reject.clone(), Rc::clone(&slots));
                input.on_rejected(move |reason| {
                    if let Some(errors) = slots.fill(index, reason) {
                        reject.reject(AggregateError { errors });
                    }
                });
            }
            Ok(())
        })
    }
}
