//! Single-threaded deferred values.
//!
//! A [`Promise`] pairs a value that is not known yet with the
//! continuations waiting for it. Settlement happens exactly once; later
//! attempts are no-ops, which is what makes deferred-call correlation and
//! promise round-trips safe to drive from message handlers.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::RpcError;
use crate::value::Value;

type Settlement = Result<Value, RpcError>;
type Callback = Box<dyn FnOnce(&Settlement)>;

/// Observable lifecycle of a deferred value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Resolved,
    /// Settled with an error.
    Rejected,
}

struct PromiseInner {
    result: Option<Settlement>,
    callbacks: Vec<Callback>,
}

/// A deferred value with exactly-once settlement.
///
/// Clones share the same state; any clone may settle or observe it.
#[derive(Clone)]
pub struct Promise {
    inner: Rc<RefCell<PromiseInner>>,
}

impl Promise {
    /// Creates an unsettled promise.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            inner: Rc::new(RefCell::new(PromiseInner {
                result: None,
                callbacks: Vec::new(),
            })),
        }
    }

    /// Creates a promise already resolved with `value`.
    #[must_use]
    pub fn resolved(value: Value) -> Self {
        let promise = Self::pending();
        promise.resolve(value);
        promise
    }

    /// Creates a promise already rejected with `error`.
    #[must_use]
    pub fn rejected(error: RpcError) -> Self {
        let promise = Self::pending();
        promise.reject(error);
        promise
    }

    /// Resolves the promise. A no-op when already settled.
    pub fn resolve(&self, value: Value) {
        self.settle(Ok(value));
    }

    /// Rejects the promise. A no-op when already settled.
    pub fn reject(&self, error: RpcError) {
        self.settle(Err(error));
    }

    fn settle(&self, result: Settlement) {
        let callbacks = {
            let mut inner = self.inner.borrow_mut();
            if inner.result.is_some() {
                return;
            }
            inner.result = Some(result.clone());
            std::mem::take(&mut inner.callbacks)
        };
        // Continuations run outside the borrow; they may touch the
        // promise again.
        for callback in callbacks {
            callback(&result);
        }
    }

    /// Attaches a continuation, firing it immediately when the promise is
    /// already settled.
    pub fn on_settled(&self, f: impl FnOnce(&Settlement) + 'static) {
        let settled = self.inner.borrow().result.clone();
        match settled {
            Some(result) => f(&result),
            None => self.inner.borrow_mut().callbacks.push(Box::new(f)),
        }
    }

    /// The settlement, when one has happened.
    #[must_use]
    pub fn try_result(&self) -> Option<Settlement> {
        self.inner.borrow().result.clone()
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PromiseState {
        match &self.inner.borrow().result {
            None => PromiseState::Pending,
            Some(Ok(_)) => PromiseState::Resolved,
            Some(Err(_)) => PromiseState::Rejected,
        }
    }

    /// Whether the promise has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.inner.borrow().result.is_some()
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Promise({:?})", self.state())
    }
}
