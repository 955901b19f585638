//! End-to-end engine scenarios: serial order, overflow, timeouts,
//! target isolation, and shutdown, all on virtual time.

#![allow(clippy::arithmetic_side_effects)]

use futures::future::join_all;
use gatehouse_core::TargetId;
use gatehouse_queue::{QueueEngine, QueueError, QueueLimits};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

type Engine = QueueEngine<u64, String>;

fn engine(timeout_ms: u64, max_queue: usize) -> Arc<Engine> {
    Arc::new(QueueEngine::new(QueueLimits {
        timeout: Duration::from_millis(timeout_ms),
        max_queue,
        max_inflight: 1,
    }))
}

async fn sleepy(ms: u64, value: u64) -> Result<u64, String> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Ok(value)
}

#[tokio::test(start_paused = true)]
async fn serial_execution_within_one_target() {
    let engine = engine(30_000, 10);
    let target = TargetId::new("target-a");

    let futures = (0..3_u64).map(|i| {
        let engine = Arc::clone(&engine);
        let target = target.clone();
        async move { engine.enqueue(&target, move |_c| sleepy(50, i)).await }
    });
    let results = join_all(futures).await;

    let completions: Vec<_> = results
        .into_iter()
        .map(|r| r.expect("no request may fail"))
        .collect();

    assert_eq!(completions[0].value, 0);
    assert_eq!(completions[0].queue_wait_ms, 0);
    assert_eq!(completions[1].queue_wait_ms, 50);
    assert_eq!(completions[2].queue_wait_ms, 100);
    for c in &completions {
        assert_eq!(c.upstream_latency_ms, 50);
    }
}

#[tokio::test(start_paused = true)]
async fn admission_overflow_rejects_fifth() {
    let engine = engine(30_000, 3);
    let target = TargetId::new("target-a");

    let mut admitted = Vec::new();
    for i in 0..4_u64 {
        let engine = Arc::clone(&engine);
        let target = target.clone();
        admitted.push(tokio::spawn(async move {
            engine.enqueue(&target, move |_c| sleepy(200, i)).await
        }));
        tokio::task::yield_now().await;
    }

    let err = engine
        .enqueue(&target, |_c| sleepy(200, 99))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Full(ref t) if t == &target));

    // The four admitted requests complete, in order.
    let mut values = Vec::new();
    for handle in admitted {
        values.push(handle.await.unwrap().unwrap().value);
    }
    assert_eq!(values, vec![0, 1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn deadline_covers_wait_and_execution() {
    let engine = engine(100, 10);
    let target = TargetId::new("target-a");

    let first = {
        let engine = Arc::clone(&engine);
        let target = target.clone();
        tokio::spawn(async move { engine.enqueue(&target, |_c| sleepy(300, 1)).await })
    };
    tokio::task::yield_now().await;

    // Admitted immediately behind the long call; its whole budget burns
    // in the waiting list.
    let second = engine.enqueue(&target, |_c| sleepy(10, 2)).await;

    assert!(matches!(
        first.await.unwrap().unwrap_err(),
        QueueError::Timeout(_)
    ));
    assert!(matches!(second.unwrap_err(), QueueError::Timeout(_)));
}

#[tokio::test(start_paused = true)]
async fn back_pressure_does_not_cross_targets() {
    let engine = engine(30_000, 1);
    let a = TargetId::new("target-a");
    let b = TargetId::new("target-b");

    // Fill target-a: one in flight, one waiting.
    let mut held = Vec::new();
    for i in 0..2_u64 {
        let engine = Arc::clone(&engine);
        let a = a.clone();
        held.push(tokio::spawn(async move {
            engine.enqueue(&a, move |_c| sleepy(500, i)).await
        }));
        tokio::task::yield_now().await;
    }
    let overflow = engine.enqueue(&a, |_c| sleepy(1, 9)).await;
    assert!(matches!(overflow.unwrap_err(), QueueError::Full(_)));

    // target-b is untouched by target-a's congestion.
    let b_done = engine.enqueue(&b, |_c| sleepy(5, 7)).await.unwrap();
    assert_eq!(b_done.value, 7);
    assert_eq!(b_done.queue_wait_ms, 0);

    for handle in held {
        assert!(handle.await.unwrap().is_ok());
    }
}

#[tokio::test(start_paused = true)]
async fn different_targets_proceed_concurrently() {
    let engine = engine(30_000, 10);
    let a = TargetId::new("target-a");
    let b = TargetId::new("target-b");

    let slow = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let out = engine.enqueue(&a, |_c| sleepy(100, 1)).await;
            (Instant::now(), out)
        })
    };
    tokio::task::yield_now().await;
    let fast = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let out = engine.enqueue(&b, |_c| sleepy(10, 2)).await;
            (Instant::now(), out)
        })
    };

    let (fast_done, fast_out) = fast.await.unwrap();
    let (slow_done, slow_out) = slow.await.unwrap();
    assert!(fast_out.is_ok());
    assert!(slow_out.is_ok());
    // The fast target finished while the slow one was still upstream.
    assert!(fast_done < slow_done);
}

#[tokio::test(start_paused = true)]
async fn execution_order_matches_admission_order() {
    let engine = engine(60_000, 64);
    let target = TargetId::new("target-a");
    let entered: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let mut rng = StdRng::seed_from_u64(2024);

    let futures: Vec<_> = (0..30_u64)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let target = target.clone();
            let entered = Arc::clone(&entered);
            let ms = rng.gen_range(1..6_u64);
            async move {
                engine
                    .enqueue(&target, move |_c| async move {
                        entered.lock().unwrap().push(i);
                        sleepy(ms, i).await
                    })
                    .await
            }
        })
        .collect();

    let results = join_all(futures).await;
    assert!(results.iter().all(Result::is_ok));

    let order = entered.lock().unwrap().clone();
    assert_eq!(order, (0..30).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn shutdown_rejects_pending_and_signals_inflight() {
    let engine = engine(30_000, 10);
    let target = TargetId::new("target-a");
    let signalled = Arc::new(AtomicBool::new(false));

    let mut pending = Vec::new();
    for i in 0..3_u64 {
        let engine = Arc::clone(&engine);
        let target = target.clone();
        let signalled = Arc::clone(&signalled);
        pending.push(tokio::spawn(async move {
            engine
                .enqueue(&target, move |cancel| async move {
                    // A well-behaved adapter watches the handle even while
                    // blocked on upstream I/O.
                    tokio::spawn(async move {
                        cancel.cancelled().await;
                        signalled.store(true, Ordering::SeqCst);
                    });
                    sleepy(1000, i).await
                })
                .await
        }));
        tokio::task::yield_now().await;
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    engine.shutdown();

    for handle in pending {
        assert!(matches!(
            handle.await.unwrap().unwrap_err(),
            QueueError::Shutdown
        ));
    }
    tokio::task::yield_now().await;
    assert!(signalled.load(Ordering::SeqCst));
    assert!(engine.is_shutdown());
    assert_eq!(engine.queue_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn every_admitted_item_completes_exactly_once() {
    let engine = engine(50, 8);
    let targets: Vec<TargetId> = (0..5).map(|i| TargetId::new(format!("t{i}"))).collect();
    let mut rng = StdRng::seed_from_u64(7);

    let futures: Vec<_> = (0..50_u64)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let target = targets[rng.gen_range(0..targets.len())].clone();
            // Durations straddle the 50 ms deadline on purpose.
            let ms = rng.gen_range(1..90_u64);
            let fail = rng.gen_range(0..4_u64) == 0;
            async move {
                engine
                    .enqueue(&target, move |_c| async move {
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                        if fail { Err(format!("boom {i}")) } else { Ok(i) }
                    })
                    .await
            }
        })
        .collect();

    let results = join_all(futures).await;
    assert_eq!(results.len(), 50);

    let (mut ok, mut timeout, mut exec, mut full) = (0, 0, 0, 0);
    for r in results {
        match r {
            Ok(_) => ok += 1,
            Err(QueueError::Timeout(_)) => timeout += 1,
            Err(QueueError::Executor(_)) => exec += 1,
            Err(QueueError::Full(_)) => full += 1,
            Err(other) => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!(ok + timeout + exec + full, 50);
    assert!(ok > 0, "workload should produce some successes");
    assert!(timeout > 0, "workload should produce some timeouts");

    // Everything drained.
    for t in &targets {
        assert_eq!(engine.waiting_count(t), 0);
        assert_eq!(engine.inflight_count(t), 0);
    }
}
