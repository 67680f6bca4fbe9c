//! Deadline combinator for bounded external calls
//!
//! Races a call against a timer. Whichever settles first wins; the losing
//! future is dropped and its eventual result is never observed.

use std::future::Future;
use std::time::Duration;

/// Outcome of racing a call against its deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T> {
    /// The call settled first
    InTime(T),
    /// The timer fired first
    DeadlineElapsed,
}

impl<T> Settled<T> {
    pub fn in_time(self) -> Option<T> {
        match self {
            Settled::InTime(value) => Some(value),
            Settled::DeadlineElapsed => None,
        }
    }
}

/// Race `call` against `deadline`. A call that is ready at the same instant
/// as the timer wins.
pub async fn first_to_settle<F>(call: F, deadline: Duration) -> Settled<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        output = call => Settled::InTime(output),
        _ = tokio::time::sleep(deadline) => Settled::DeadlineElapsed,
    }
}
