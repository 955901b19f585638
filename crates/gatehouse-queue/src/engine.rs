//! The per-target admission and dispatch engine.
//!
//! Queues live in a concurrent map keyed by target id: exclusive write
//! on first insertion, shared reads on lookup. Each queue's mutable
//! state sits behind its own mutex, and every mutation is a short
//! critical section that is never held across an await point.
//!
//! Two paths can retire a waiting item — the deadline timer and head
//! promotion after the in-flight call finishes. Both run under the
//! queue's lock and both respect the item's `dequeued` reservation, so
//! an item's completion channel is consumed by exactly one of them.

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use gatehouse_core::TargetId;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::QueueError;

/// Admission limits, shared by every per-target queue.
#[derive(Debug, Clone, Copy)]
pub struct QueueLimits {
    /// Total budget per item, measured from admission. Covers queue wait
    /// and the upstream call together.
    pub timeout: Duration,
    /// Maximum number of waiting items per target.
    pub max_queue: usize,
    /// Maximum concurrent executors per target. The design value is 1.
    pub max_inflight: usize,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_queue: 10,
            max_inflight: 1,
        }
    }
}

/// A resolved item: the executor's value plus both timings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion<T> {
    /// What the executor returned.
    pub value: T,
    /// Milliseconds spent waiting for the execution slot.
    pub queue_wait_ms: u64,
    /// Milliseconds spent inside the executor.
    pub upstream_latency_ms: u64,
}

type ItemResult<T, E> = Result<Completion<T>, QueueError<E>>;

type Executor<T, E> =
    Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<T, E>> + Send>;

struct QueueItem<T, E> {
    seq: u64,
    executor: Executor<T, E>,
    completion: oneshot::Sender<ItemResult<T, E>>,
    enqueued_at: Instant,
    deadline: Instant,
    cancel: CancellationToken,
    /// Reservation guard. Set under the queue lock when the item leaves
    /// the waiting list; the deadline timer refuses to act on a dequeued
    /// item and promotion refuses to re-enter one.
    dequeued: bool,
}

struct QueueState<T, E> {
    waiting: VecDeque<QueueItem<T, E>>,
    inflight: usize,
    /// Cancellation handles of in-flight items, keyed by item sequence.
    active: HashMap<u64, CancellationToken>,
}

struct TargetQueue<T, E> {
    id: TargetId,
    state: Mutex<QueueState<T, E>>,
}

impl<T, E> TargetQueue<T, E> {
    fn new(id: TargetId) -> Self {
        Self {
            id,
            state: Mutex::new(QueueState {
                waiting: VecDeque::new(),
                inflight: 0,
                active: HashMap::new(),
            }),
        }
    }
}

/// Process-wide manager of per-target queues.
///
/// `T` is what executors resolve with and `E` is their error type; the
/// engine treats both as opaque. Construct one engine per server — and a
/// fresh one per test.
pub struct QueueEngine<T, E> {
    queues: DashMap<TargetId, Arc<TargetQueue<T, E>>>,
    limits: QueueLimits,
    next_seq: AtomicU64,
    shutting_down: AtomicBool,
}

impl<T, E> std::fmt::Debug for QueueEngine<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEngine")
            .field("limits", &self.limits)
            .field("queues", &self.queues.len())
            .finish_non_exhaustive()
    }
}

impl<T, E> QueueEngine<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Create an engine with the given limits.
    #[must_use]
    pub fn new(limits: QueueLimits) -> Self {
        Self {
            queues: DashMap::new(),
            limits,
            next_seq: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Admit a request for `target` and run `executor` when its turn
    /// comes, resolving with the value and both timings.
    ///
    /// The executor receives a cancellation token; it fires when the
    /// deadline elapses mid-call or the engine shuts down, and adapters
    /// are expected to abort their I/O promptly when it does.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Full`] when the target's waiting list is full.
    /// - [`QueueError::Timeout`] when the deadline elapses first.
    /// - [`QueueError::Executor`] carrying the executor's own error.
    /// - [`QueueError::Shutdown`] when the engine stops first.
    /// - [`QueueError::Crashed`] if the executor task dies.
    pub async fn enqueue<F, Fut>(
        &self,
        target: &TargetId,
        executor: F,
    ) -> ItemResult<T, E>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let rx = self.admit(target, Box::new(move |cancel| executor(cancel).boxed()))?;
        match rx.await {
            Ok(result) => result,
            // The run task never drops the sender without sending; if it
            // happens anyway the item must still complete exactly once.
            Err(_) => Err(QueueError::Crashed),
        }
    }

    /// Synchronous admission: reserve a slot or a waiting position and
    /// hand back the completion channel.
    fn admit(
        &self,
        target: &TargetId,
        executor: Executor<T, E>,
    ) -> Result<oneshot::Receiver<ItemResult<T, E>>, QueueError<E>> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(QueueError::Shutdown);
        }

        let queue = self
            .queues
            .entry(target.clone())
            .or_insert_with(|| Arc::new(TargetQueue::new(target.clone())))
            .clone();

        let now = Instant::now();
        let (tx, rx) = oneshot::channel();
        let mut item = QueueItem {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            executor,
            completion: tx,
            enqueued_at: now,
            deadline: now
                .checked_add(self.limits.timeout)
                .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30)),
            cancel: CancellationToken::new(),
            dequeued: false,
        };

        let mut state = queue.state.lock().expect("queue mutex poisoned");

        // Shutdown may have drained the map between the flag check and
        // the insert; refuse rather than run on a zombie queue.
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(QueueError::Shutdown);
        }

        if state.inflight < self.limits.max_inflight {
            // Free slot: skip the waiting list entirely.
            item.dequeued = true;
            state.inflight = state.inflight.saturating_add(1);
            state.active.insert(item.seq, item.cancel.clone());
            drop(state);
            tokio::spawn(run_item(queue, item, self.limits));
        } else {
            if state.waiting.len() >= self.limits.max_queue {
                return Err(QueueError::Full(target.clone()));
            }
            spawn_wait_timer(
                Arc::clone(&queue),
                item.seq,
                item.deadline,
                item.cancel.clone(),
            );
            state.waiting.push_back(item);
        }

        Ok(rx)
    }

    /// Cancel everything and refuse further admissions.
    ///
    /// Every active executor's token is fired and every waiting item is
    /// rejected with [`QueueError::Shutdown`]. This initiates
    /// cancellation and returns; it does not wait for executors to
    /// observe their tokens.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        tracing::debug!(queues = self.queues.len(), "cancelling all queues");

        for entry in self.queues.iter() {
            let queue = entry.value();
            let mut state = queue.state.lock().expect("queue mutex poisoned");
            for token in state.active.values() {
                token.cancel();
            }
            while let Some(item) = state.waiting.pop_front() {
                // Fires the item's wait timer so it exits early.
                item.cancel.cancel();
                let _ = item.completion.send(Err(QueueError::Shutdown));
            }
        }

        self.queues.clear();
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Number of items currently waiting for `target`.
    #[must_use]
    pub fn waiting_count(&self, target: &TargetId) -> usize {
        self.queues.get(target).map_or(0, |q| {
            q.state.lock().expect("queue mutex poisoned").waiting.len()
        })
    }

    /// Number of executors currently running for `target`.
    #[must_use]
    pub fn inflight_count(&self, target: &TargetId) -> usize {
        self.queues.get(target).map_or(0, |q| {
            q.state.lock().expect("queue mutex poisoned").inflight
        })
    }

    /// Number of queues created so far.
    #[must_use]
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Reject a still-waiting item when its deadline fires.
fn spawn_wait_timer<T, E>(
    queue: Arc<TargetQueue<T, E>>,
    seq: u64,
    deadline: Instant,
    cancel: CancellationToken,
) where
    T: Send + 'static,
    E: Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            // Item left the queue by another path; nothing to do.
            () = cancel.cancelled() => {}
            () = tokio::time::sleep_until(deadline) => {
                let timed_out = {
                    let mut state = queue.state.lock().expect("queue mutex poisoned");
                    state
                        .waiting
                        .iter()
                        .position(|item| item.seq == seq && !item.dequeued)
                        .and_then(|pos| state.waiting.remove(pos))
                };
                if let Some(item) = timed_out {
                    let _ = item
                        .completion
                        .send(Err(QueueError::Timeout(queue.id.clone())));
                }
            }
        }
    });
}

/// Run one item's executor, deliver its completion, and promote the
/// next waiting item.
async fn run_item<T, E>(queue: Arc<TargetQueue<T, E>>, item: QueueItem<T, E>, limits: QueueLimits)
where
    T: Send + 'static,
    E: Send + 'static,
{
    let QueueItem {
        seq,
        executor,
        completion,
        enqueued_at,
        deadline,
        cancel,
        ..
    } = item;

    let started = Instant::now();
    let queue_wait_ms = duration_ms(started.duration_since(enqueued_at));

    // A promoted item whose deadline already passed must never enter its
    // executor; `timeout_at` polls the inner future once before checking
    // the clock, so the expiry check has to come first.
    if started >= deadline {
        cancel.cancel();
        let _ = completion.send(Err(QueueError::Timeout(queue.id.clone())));
        promote_next(&queue, seq, limits);
        return;
    }

    let call = AssertUnwindSafe(executor(cancel.clone())).catch_unwind();
    let outcome = tokio::select! {
        // Biased so a shutdown-fired token deterministically rejects with
        // Shutdown instead of racing the executor's own cancel error.
        biased;
        () = cancel.cancelled() => Err(QueueError::Shutdown),
        result = tokio::time::timeout_at(deadline, call) => match result {
            Err(_elapsed) => {
                // Signal adapter-side work that may still be running.
                cancel.cancel();
                Err(QueueError::Timeout(queue.id.clone()))
            }
            Ok(Ok(Ok(value))) => Ok(Completion {
                value,
                queue_wait_ms,
                upstream_latency_ms: duration_ms(started.elapsed()),
            }),
            Ok(Ok(Err(err))) => Err(QueueError::Executor(err)),
            Ok(Err(_panic)) => Err(QueueError::Crashed),
        },
    };

    let _ = completion.send(outcome);
    // The executor has returned; firing the token now only wakes the
    // item's wait timer, which would otherwise sleep out the deadline.
    cancel.cancel();
    promote_next(&queue, seq, limits);
}

/// Release this item's slot and pull the head of the waiting list into
/// execution, both under one critical section.
fn promote_next<T, E>(queue: &Arc<TargetQueue<T, E>>, finished_seq: u64, limits: QueueLimits)
where
    T: Send + 'static,
    E: Send + 'static,
{
    let next = {
        let mut state = queue.state.lock().expect("queue mutex poisoned");
        state.active.remove(&finished_seq);
        state.inflight = state.inflight.saturating_sub(1);
        if state.inflight < limits.max_inflight {
            state.waiting.pop_front().map(|mut next| {
                next.dequeued = true;
                state.inflight = state.inflight.saturating_add(1);
                state.active.insert(next.seq, next.cancel.clone());
                next
            })
        } else {
            None
        }
    };

    if let Some(next) = next {
        tokio::spawn(run_item(Arc::clone(queue), next, limits));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    type TestEngine = QueueEngine<u32, String>;

    fn engine(timeout_ms: u64, max_queue: usize) -> Arc<TestEngine> {
        Arc::new(QueueEngine::new(QueueLimits {
            timeout: Duration::from_millis(timeout_ms),
            max_queue,
            max_inflight: 1,
        }))
    }

    fn target(name: &str) -> TargetId {
        TargetId::new(name)
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_dispatch_reports_zero_wait() {
        let engine = engine(1000, 10);
        let done = engine
            .enqueue(&target("a"), |_cancel| async { Ok(7_u32) })
            .await
            .unwrap();
        assert_eq!(done.value, 7);
        assert_eq!(done.queue_wait_ms, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_executor_error_carried_through() {
        let engine = engine(1000, 10);
        let err = engine
            .enqueue(&target("a"), |_cancel| async {
                Err::<u32, _>("upstream exploded".to_owned())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Executor(ref m) if m == "upstream exploded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_full_fails_fast() {
        let engine = engine(60_000, 2);
        let t = target("a");

        // One in flight plus two waiting fills the queue.
        let mut pending = Vec::new();
        for _ in 0..3 {
            let engine = Arc::clone(&engine);
            let t = t.clone();
            pending.push(tokio::spawn(async move {
                engine
                    .enqueue(&t, |_c| async {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok(0_u32)
                    })
                    .await
            }));
            tokio::task::yield_now().await;
        }

        assert_eq!(engine.inflight_count(&t), 1);
        assert_eq!(engine.waiting_count(&t), 2);

        let err = engine
            .enqueue(&t, |_c| async { Ok(0_u32) })
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Full(ref id) if id == &t));

        for handle in pending {
            assert!(handle.await.unwrap().is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_timeout_never_runs_executor() {
        let engine = engine(100, 10);
        let t = target("a");
        let ran = Arc::new(AtomicUsize::new(0));

        // Occupy the slot well past the second item's deadline.
        let first = {
            let engine = Arc::clone(&engine);
            let t = t.clone();
            tokio::spawn(async move {
                engine
                    .enqueue(&t, |_c| async {
                        tokio::time::sleep(Duration::from_millis(300)).await;
                        Ok(1_u32)
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        let ran_clone = Arc::clone(&ran);
        let err = engine
            .enqueue(&t, move |_c| async move {
                ran_clone.fetch_add(1, Ordering::SeqCst);
                Ok(2_u32)
            })
            .await
            .unwrap_err();

        assert!(matches!(err, QueueError::Timeout(_)));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        // The first item overruns its own deadline too.
        assert!(matches!(
            first.await.unwrap().unwrap_err(),
            QueueError::Timeout(_)
        ));
        // The timed-out waiter must have been removed, not left behind.
        assert_eq!(engine.waiting_count(&t), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inflight_cap_holds_under_load() {
        let engine = engine(60_000, 64);
        let t = target("a");
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let engine = Arc::clone(&engine);
            let t = t.clone();
            let live = Arc::clone(&live);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                engine
                    .enqueue(&t, move |_c| async move {
                        let now = live.fetch_add(1, Ordering::SeqCst).saturating_add(1);
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        live.fetch_sub(1, Ordering::SeqCst);
                        Ok(0_u32)
                    })
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_after_shutdown_refused() {
        let engine = engine(1000, 10);
        engine.shutdown();
        assert!(engine.is_shutdown());
        let err = engine
            .enqueue(&target("a"), |_c| async { Ok(0_u32) })
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Shutdown));
        assert_eq!(engine.queue_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crashing_executor_still_promotes_next() {
        let engine = engine(1000, 10);
        let t = target("a");

        let first = {
            let engine = Arc::clone(&engine);
            let t = t.clone();
            tokio::spawn(async move {
                engine
                    .enqueue(&t, |_c| async { panic!("executor bug") })
                    .await
            })
        };
        tokio::task::yield_now().await;

        let second = engine.enqueue(&t, |_c| async { Ok(5_u32) }).await;

        assert!(matches!(
            first.await.unwrap().unwrap_err(),
            QueueError::Crashed
        ));
        assert_eq!(second.unwrap().value, 5);
        assert_eq!(engine.inflight_count(&t), 0);
    }
}
