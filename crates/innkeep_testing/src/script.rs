// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// A scripted remote call: hands out pre-recorded outcomes in order and counts invocations.
///
/// Once the script runs out, the last outcome repeats forever.
///
/// ```ignore
/// let script = Arc::new(Script::new([Err(Timeout), Ok(42)]));
/// let op = || {
///     let script = Arc::clone(&script);
///     async move { script.next() }
/// };
/// ```
#[derive(Debug)]
pub struct Script<T, E> {
    outcomes: Mutex<VecDeque<Result<T, E>>>,
    last: Mutex<Option<Result<T, E>>>,
    calls: AtomicUsize,
}

impl<T: Clone, E: Clone> Script<T, E> {
    /// A script that produces `outcomes` in order, then repeats the last one.
    #[must_use]
    pub fn new(outcomes: impl IntoIterator<Item = Result<T, E>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// A script that always produces `outcome`.
    #[must_use]
    pub fn repeat(outcome: Result<T, E>) -> Self {
        Self::new([outcome])
    }

    /// Appends outcomes to the end of the script.
    pub fn push(&self, outcome: Result<T, E>) {
        self.outcomes.lock().push_back(outcome);
    }

    /// Produces the next outcome.
    ///
    /// # Panics
    ///
    /// Panics if the script was created empty.
    pub fn next(&self) -> Result<T, E> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let mut last = self.last.lock();
        if let Some(outcome) = self.outcomes.lock().pop_front() {
            *last = Some(outcome);
        }

        last.clone().expect("script has no outcomes")
    }

    /// How many times [`next`][Self::next] was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}
