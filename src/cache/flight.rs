//! Flight Module
//!
//! One flight is one invocation of a fetch function. Its terminal outcome is
//! broadcast over a `tokio::sync::watch` channel so that every caller joined to
//! the flight observes the same value or the same error.

use tokio::sync::watch;

use crate::error::{CacheError, Result};

type Outcome<V> = Option<Result<V>>;

/// Creates the two halves of a flight.
pub(crate) fn channel<V>(key: String, correlation_id: String) -> (FlightSender<V>, WaitHandle<V>) {
    let (tx, rx) = watch::channel(None);
    (
        FlightSender { tx },
        WaitHandle {
            key,
            correlation_id,
            rx,
        },
    )
}

// == Flight Sender ==
/// Settling side of a flight, owned by the task driving the fetch.
#[derive(Debug)]
pub(crate) struct FlightSender<V> {
    tx: watch::Sender<Outcome<V>>,
}

impl<V> FlightSender<V> {
    /// Publishes the terminal outcome to every current and future waiter.
    pub(crate) fn settle(self, outcome: Result<V>) {
        // send_replace succeeds even when no receiver is left.
        self.tx.send_replace(Some(outcome));
    }
}

// == Wait Handle ==
/// Subscription to the outcome of an in-flight fetch.
///
/// Cheap to clone; all clones observe the same outcome.
#[derive(Debug)]
pub struct WaitHandle<V> {
    key: String,
    correlation_id: String,
    rx: watch::Receiver<Outcome<V>>,
}

impl<V> Clone for WaitHandle<V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            correlation_id: self.correlation_id.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<V: Clone> WaitHandle<V> {
    /// Key of the flight, in display form.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Returns true once the flight has an outcome or its driver is gone.
    pub fn is_settled(&self) -> bool {
        self.rx.borrow().is_some() || self.rx.has_changed().is_err()
    }

    /// Returns the outcome without waiting, or None while the fetch runs.
    pub fn try_outcome(&self) -> Option<Result<V>> {
        if let Some(outcome) = self.rx.borrow().as_ref() {
            return Some(outcome.clone());
        }
        // Driver dropped without settling.
        self.rx.has_changed().is_err().then(|| Err(self.abandoned()))
    }

    /// Waits for the flight to settle and returns its outcome.
    pub async fn wait(mut self) -> Result<V> {
        let settled = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map(|outcome| outcome.clone());

        match settled {
            Ok(Some(outcome)) => outcome,
            _ => Err(self.abandoned()),
        }
    }

    /// Converts the handle into the synchronous read result.
    pub fn into_suspense(self) -> Suspense<V> {
        match self.try_outcome() {
            Some(Ok(value)) => Suspense::Ready(value),
            Some(Err(error)) => Suspense::Failed(error),
            None => Suspense::Pending(self),
        }
    }

    fn abandoned(&self) -> CacheError {
        CacheError::Abandoned {
            key: self.key.clone(),
            correlation_id: self.correlation_id.clone(),
        }
    }
}

// == Suspense ==
/// Result of a synchronous, non-blocking read.
///
/// `Pending` is not an error: the caller suspends in whatever way its execution
/// model allows, waits on the handle, then reads again.
#[derive(Debug)]
pub enum Suspense<V> {
    Ready(V),
    Failed(CacheError),
    Pending(WaitHandle<V>),
}

impl<V> Suspense<V> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Suspense::Ready(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Suspense::Pending(_))
    }

    /// Returns the ready value, if any.
    pub fn ready(self) -> Option<V> {
        match self {
            Suspense::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the wait handle when the read must suspend.
    pub fn pending(self) -> Option<WaitHandle<V>> {
        match self {
            Suspense::Pending(handle) => Some(handle),
            _ => None,
        }
    }
}
