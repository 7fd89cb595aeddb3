//! In-flight marker for a value that is being computed.
//!
//! A placeholder is inserted into the cache map by the first caller that asks
//! for a missing key. Concurrent callers for the same key wait on that
//! placeholder only, never on the map, and are handed the outcome of the one
//! computation.

use std::sync::{Arc, Condvar, Mutex};

use amudai_common::{Result, error::Error};

enum State<V> {
    Computing,
    Ready(V),
    Failed(Arc<Error>),
}

pub(crate) struct Placeholder<V> {
    state: Mutex<State<V>>,
    condvar: Condvar,
}

impl<V: Clone> Placeholder<V> {
    pub fn new() -> Placeholder<V> {
        Placeholder {
            state: Mutex::new(State::Computing),
            condvar: Condvar::new(),
        }
    }

    /// Publishes the computed value and wakes all waiters.
    pub fn fill(&self, value: V) {
        *self.state.lock().expect("placeholder lock") = State::Ready(value);
        self.condvar.notify_all();
    }

    /// Publishes a failure and wakes all waiters. Returns the shared error.
    pub fn fail(&self, error: Error) -> Arc<Error> {
        let error = Arc::new(error);
        *self.state.lock().expect("placeholder lock") = State::Failed(Arc::clone(&error));
        self.condvar.notify_all();
        error
    }

    /// Blocks until the computation completes.
    pub fn wait(&self) -> Result<V> {
        let guard = self.state.lock().expect("placeholder lock");
        let guard = self
            .condvar
            .wait_while(guard, |state| matches!(state, State::Computing))
            .expect("placeholder lock");
        match &*guard {
            State::Ready(value) => Ok(value.clone()),
            State::Failed(error) => Err(Error::shared(Arc::clone(error))),
            State::Computing => unreachable!("woken while still computing"),
        }
    }

    #[cfg(test)]
    pub fn is_computing(&self) -> bool {
        matches!(
            *self.state.lock().expect("placeholder lock"),
            State::Computing
        )
    }
}
