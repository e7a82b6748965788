//! Debounced async calls with optional max-wait and cancellation.
//!
//! A [`Debounced`] wraps an async function. Calls arriving within the delay
//! window are coalesced: the function runs once with the newest arguments,
//! after the window has been quiet for `delay` (or once `max_wait` has elapsed
//! since the first call of the burst), and every caller of the burst receives
//! the same result.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Returned to pending callers by [`Debounced::cancel`] when
/// `reject_on_cancel` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("debounced call was cancelled")]
pub struct Cancelled;

/// Outcome delivered to a caller: `Ok(Some(v))` when the function ran,
/// `Ok(None)` when the burst was cancelled under the default policy.
pub type CallResult<T> = Result<Option<T>, Cancelled>;

#[derive(Debug, Clone, Copy, Default)]
pub struct DebounceOptions {
    /// Upper bound between the first call of a burst and the invocation.
    pub max_wait: Option<Duration>,
    /// Reject pending callers with [`Cancelled`] instead of resolving them
    /// with `None`.
    pub reject_on_cancel: bool,
}

type BoxFn<A, T> = dyn Fn(A) -> Pin<Box<dyn Future<Output = T> + Send>> + Send + Sync;

struct State<A, T> {
    args: Option<A>,
    waiters: Vec<oneshot::Sender<CallResult<T>>>,
    deadline: Option<Instant>,
    max_deadline: Option<Instant>,
    timer: Option<JoinHandle<()>>,
    // Bumped whenever a timer is spawned or cancelled so stale timers bail out.
    burst: u64,
}

struct Inner<A, T> {
    func: Box<BoxFn<A, T>>,
    delay: Duration,
    options: DebounceOptions,
    state: Mutex<State<A, T>>,
}

/// Cloneable handle to a debounced function. Clones share one timer state.
pub struct Debounced<A, T> {
    inner: Arc<Inner<A, T>>,
}

impl<A, T> Clone for Debounced<A, T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<A, T> Debounced<A, T>
where
    A: Send + 'static,
    T: Clone + Send + 'static,
{
    pub fn new<F, Fut>(func: F, delay: Duration) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::with_options(func, delay, DebounceOptions::default())
    }

    pub fn with_options<F, Fut>(func: F, delay: Duration, options: DebounceOptions) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let func: Box<BoxFn<A, T>> = Box::new(move |args| Box::pin(func(args)));
        Self {
            inner: Arc::new(Inner {
                func,
                delay,
                options,
                state: Mutex::new(State {
                    args: None,
                    waiters: Vec::new(),
                    deadline: None,
                    max_deadline: None,
                    timer: None,
                    burst: 0,
                }),
            }),
        }
    }

    /// Schedule an invocation with `args` and wait for the burst's result.
    pub async fn call(&self, args: A) -> CallResult<T> {
        if self.bypasses() {
            return Ok(Some((self.inner.func)(args).await));
        }

        let rx = {
            let mut state = self.inner.state.lock().unwrap();
            let now = Instant::now();
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            state.args = Some(args);
            state.deadline = Some(now + self.inner.delay);
            if let (Some(max), None) = (self.inner.options.max_wait, state.max_deadline) {
                state.max_deadline = Some(now + max);
            }
            if state.timer.is_none() {
                state.burst += 1;
                let burst = state.burst;
                let inner = self.inner.clone();
                state.timer = Some(tokio::spawn(run_timer(inner, burst)));
            }
            rx
        };

        // A dropped sender means the timer task died without settling us.
        rx.await.unwrap_or(Err(Cancelled))
    }

    /// Drop the pending burst. Callers waiting on it are settled according to
    /// `reject_on_cancel`. An invocation that already started keeps running.
    pub fn cancel(&self) {
        let waiters = {
            let mut state = self.inner.state.lock().unwrap();
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.burst += 1;
            state.args = None;
            state.deadline = None;
            state.max_deadline = None;
            std::mem::take(&mut state.waiters)
        };
        let reject = self.inner.options.reject_on_cancel;
        for tx in waiters {
            let _ = tx.send(if reject { Err(Cancelled) } else { Ok(None) });
        }
    }

    /// Whether a burst is waiting for its timer.
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().unwrap().timer.is_some()
    }

    fn bypasses(&self) -> bool {
        self.inner.delay.is_zero() || self.inner.options.max_wait.is_some_and(|m| m.is_zero())
    }
}

async fn run_timer<A, T>(inner: Arc<Inner<A, T>>, burst: u64)
where
    A: Send + 'static,
    T: Clone + Send + 'static,
{
    loop {
        let wake = {
            let state = inner.state.lock().unwrap();
            if state.burst != burst {
                return;
            }
            match (state.deadline, state.max_deadline) {
                (Some(d), Some(m)) => d.min(m),
                (Some(d), None) => d,
                (None, Some(m)) => m,
                (None, None) => return,
            }
        };

        sleep_until(wake).await;

        let batch = {
            let mut state = inner.state.lock().unwrap();
            if state.burst != burst {
                return;
            }
            let due = [state.deadline, state.max_deadline]
                .into_iter()
                .flatten()
                .any(|at| at <= Instant::now());
            if !due {
                // Deadline moved while we slept.
                continue;
            }
            state.deadline = None;
            state.max_deadline = None;
            // Detach: from here on the invocation belongs to this burst only and
            // a later `cancel` must not abort it.
            state.timer = None;
            state.args.take().map(|args| (args, std::mem::take(&mut state.waiters)))
        };

        let Some((args, waiters)) = batch else { return };
        let value = (inner.func)(args).await;
        for tx in waiters {
            let _ = tx.send(Ok(Some(value.clone())));
        }
        return;
    }
}
