#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use promise_chain::{AggregateError, Error, Promise, Settled, Status};
    use std::{cell::RefCell, rc::Rc};
    use tracing_subscriber::EnvFilter;

    const DEFAULT_VALUE: &str = "default";

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn promise(value: &'static str, fail: bool) -> Promise<&'static str, &'static str> {
        Promise::new(|resolve, reject| {
            if fail {
                reject.reject(value)
            } else {
                resolve.fulfill(value)
            }
            Ok(())
        })
    }

    fn number(value: i32, fail: bool) -> Promise<i32, i32> {
        Promise::new(|resolve, reject| {
            if fail {
                reject.reject(value)
            } else {
                resolve.fulfill(value)
            }
            Ok(())
        })
    }

    #[test]
    fn test_then_with_no_chaining() {
        init_tracing();
        let child = promise(DEFAULT_VALUE, false).then(|v| Ok(v == DEFAULT_VALUE));
        assert_eq!(child.outcome(), Some(Ok(true)));
    }

    #[test]
    fn test_then_multiple_on_same_promise() {
        init_tracing();
        let main = promise(DEFAULT_VALUE, false);
        let first = main.then(|v| Ok(v.to_uppercase()));
        let second = main.then(|v| Ok(v.len()));
        assert_eq!(first.outcome(), Some(Ok("DEFAULT".to_string())));
        assert_eq!(second.outcome(), Some(Ok(7)));
    }

    #[test]
    fn test_then_with_chaining() {
        init_tracing();
        let child = number(3, false).then(|v| Ok(v * 4)).then(|v| Ok(v + 1));
        assert_eq!(child.outcome(), Some(Ok(13)));
    }

    #[test]
    fn test_thrown_error_is_caught() {
        init_tracing();
        let child = number(3, false).then(|v| Err::<i32, _>(v * 4)).catch(Ok);
        assert_eq!(child.outcome(), Some(Ok(12)));
    }

    #[test]
    fn test_catch_is_chainable() {
        init_tracing();
        let child = promise(DEFAULT_VALUE, true)
            .catch(|reason| Err(reason))
            .catch(|_| Err("second"))
            .catch(|reason| Ok(reason))
            .then(|v| Ok(v.len()));
        assert_eq!(child.outcome(), Some(Ok(6)));
    }

    #[test]
    fn test_catch_multiple_on_same_promise() {
        init_tracing();
        let main = promise(DEFAULT_VALUE, true);
        let first = main.catch(Ok);
        let second = main.catch(Ok);
        assert_eq!(first.outcome(), Some(Ok(DEFAULT_VALUE)));
        assert_eq!(second.outcome(), Some(Ok(DEFAULT_VALUE)));
    }

    #[test]
    fn test_finally_passthrough() {
        init_tracing();
        let calls = Rc::new(RefCell::new(0));
        let success = {
            let calls = calls.clone();
            promise(DEFAULT_VALUE, false).then(Ok).finally(move || {
                *calls.borrow_mut() += 1;
                Ok(())
            })
        };
        let failure = {
            let calls = calls.clone();
            promise(DEFAULT_VALUE, true).then(Ok).finally(move || {
                *calls.borrow_mut() += 1;
                Ok(())
            })
        };
        assert_eq!(success.outcome(), Some(Ok(DEFAULT_VALUE)));
        assert_eq!(failure.outcome(), Some(Err(DEFAULT_VALUE)));
        assert_eq!(*calls.borrow(), 2);
    }

    #[test]
    fn test_handler_returning_pending_promise_is_adopted() {
        init_tracing();
        let (resolve, _reject, later) = Promise::<i32, i32>::pending();
        let child: Promise<i32, i32> = number(1, false).and_then(move |_| Ok(later));
        let doubled = child.then(|v| Ok(v * 2));
        assert_eq!(child.status(), Status::Pending);
        assert_eq!(doubled.status(), Status::Pending);

        resolve.fulfill(21);
        assert_eq!(child.outcome(), Some(Ok(21)));
        assert_eq!(doubled.outcome(), Some(Ok(42)));
    }

    #[test]
    fn test_locked_in_promise_ignores_later_settlement() {
        init_tracing();
        let (inner_resolve, _inner_reject, inner) = Promise::<i32, i32>::pending();
        let (resolve, reject, outer) = Promise::<i32, i32>::pending();
        resolve.resolve(inner);
        resolve.fulfill(1);
        reject.reject(2);
        assert_eq!(outer.status(), Status::Pending);

        inner_resolve.fulfill(3);
        assert_eq!(outer.outcome(), Some(Ok(3)));
    }

    #[test]
    fn test_resolved_with_itself_is_abandoned() {
        init_tracing();
        let (resolve, _reject, promise) = Promise::<i32, ()>::pending();
        resolve.resolve(promise.clone());
        assert!(promise.is_abandoned());
        assert_eq!(block_on(promise), Err(Error::Abandoned));
    }

    #[test]
    fn test_static_resolve_and_reject() {
        init_tracing();
        let resolved = Promise::<&str, ()>::fulfilled(DEFAULT_VALUE).then(Ok);
        let rejected = Promise::<(), &str>::reject(DEFAULT_VALUE).catch(|_| Ok(()));
        assert_eq!(resolved.outcome(), Some(Ok(DEFAULT_VALUE)));
        assert_eq!(rejected.outcome(), Some(Ok(())));
    }

    #[test]
    fn test_all_with_success() {
        init_tracing();
        let all = Promise::<i32, i32>::all([number(1, false), number(2, false)]);
        assert_eq!(all.outcome(), Some(Ok(vec![1, 2])));
    }

    #[test]
    fn test_all_with_fail() {
        init_tracing();
        let all = Promise::<&str, &str>::all([promise(DEFAULT_VALUE, false), promise("E", true)]);
        assert_eq!(all.outcome(), Some(Err("E")));
    }

    #[test]
    fn test_all_empty_fulfills() {
        init_tracing();
        let all = Promise::<i32, i32>::all(Vec::<Promise<i32, i32>>::new());
        assert_eq!(all.outcome(), Some(Ok(Vec::new())));
    }

    #[test]
    fn test_all_settled() {
        init_tracing();
        let settled = Promise::<&str, &str>::all_settled([
            promise(DEFAULT_VALUE, false),
            promise(DEFAULT_VALUE, true),
        ]);
        assert_eq!(
            settled.outcome(),
            Some(Ok(vec![
                Settled::Fulfilled { value: DEFAULT_VALUE },
                Settled::Rejected { reason: DEFAULT_VALUE },
            ]))
        );
    }

    #[test]
    fn test_all_settled_empty_fulfills() {
        init_tracing();
        let settled = Promise::<i32, i32>::all_settled(Vec::<Promise<i32, i32>>::new());
        assert_eq!(settled.outcome(), Some(Ok(Vec::new())));
    }

    #[test]
    fn test_race_with_success() {
        init_tracing();
        let race = Promise::<i32, i32>::race([number(1, false), number(2, false)]);
        assert_eq!(race.outcome(), Some(Ok(1)));
    }

    #[test]
    fn test_race_with_fail() {
        init_tracing();
        let race = Promise::<i32, i32>::race([number(1, true), number(2, true)]);
        assert_eq!(race.outcome(), Some(Err(1)));
    }

    #[test]
    fn test_any_with_success() {
        init_tracing();
        let any = Promise::<i32, i32>::any([number(1, true), number(2, false)]);
        assert_eq!(any.outcome(), Some(Ok(2)));
    }

    #[test]
    fn test_any_with_fail() {
        init_tracing();
        let any = Promise::<i32, i32>::any([number(1, true), number(2, true)]);
        let errors = any.catch(|error| Err(error)).outcome().and_then(Result::err);
        assert_eq!(errors, Some(AggregateError { errors: vec![1, 2] }));
    }

    #[test]
    fn test_await_pending_promise() {
        init_tracing();
        let (resolve, _reject, parent) = Promise::<i32, String>::pending();
        let child = parent.then(|v| Ok(v * 4));
        let (value, _) = block_on(async { futures::join!(child, async { resolve.fulfill(3) }) });
        assert_eq!(value, Ok(12));
    }

    #[test]
    fn test_await_rejected_promise() {
        init_tracing();
        let result = block_on(number(7, true));
        assert_eq!(result, Err(Error::Rejected(7)));
        assert_eq!(result.map_err(Error::into_reason), Err(Some(7)));
    }

    #[test]
    fn test_await_abandoned_promise() {
        init_tracing();
        let (resolve, reject, parent) = Promise::<i32, ()>::pending();
        let child = parent.then(|v| Ok(v + 1));
        let (value, _) = block_on(async {
            futures::join!(child, async move {
                drop(resolve);
                drop(reject);
            })
        });
        assert_eq!(value, Err(Error::Abandoned));
        assert_eq!(parent.status(), Status::Pending);
    }
}
