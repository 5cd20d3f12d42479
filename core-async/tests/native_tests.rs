//! Integration tests for core-async on native platforms.

#![cfg(not(target_arch = "wasm32"))]

use core_async::sync::{broadcast, watch, CancellationToken};
use core_async::task::{self, run_until_cancelled};
use core_async::time::{self, Duration, Instant};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[core_async::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    assert_eq!(handle.await.unwrap(), 42);
}

#[core_async::test]
async fn test_timeout_failure() {
    let result = time::timeout(Duration::from_millis(10), async {
        time::sleep(Duration::from_millis(200)).await;
        42
    })
    .await;

    assert!(result.is_err());
}

#[core_async::test(start_paused)]
async fn test_paused_clock_advances_instantly() {
    let start = Instant::now();
    time::sleep(Duration::from_secs(60)).await;
    assert!(start.elapsed() >= Duration::from_secs(60));
}

#[core_async::test(start_paused)]
async fn test_scoped_task_stops_on_drop() {
    let ticks = Arc::new(AtomicU32::new(0));
    let counter = ticks.clone();

    let ticker = task::spawn_scoped(move |_token| async move {
        loop {
            time::sleep(Duration::from_secs(1)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 3);

    drop(ticker);
    time::sleep(Duration::from_secs(10)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 3);
}

#[core_async::test(start_paused)]
async fn test_scoped_task_cancel_is_idempotent() {
    let ticker = task::spawn_scoped(|token| async move {
        token.cancelled().await;
    });

    ticker.cancel();
    ticker.cancel();
    assert!(ticker.is_cancelled());
    ticker.join().await;
}

#[core_async::test]
async fn test_run_until_cancelled() {
    let token = CancellationToken::new();
    assert_eq!(run_until_cancelled(&token, async { 5 }).await, Some(5));

    token.cancel();
    let pending = futures::future::pending::<()>();
    assert_eq!(run_until_cancelled(&token, pending).await, None);
}

#[core_async::test]
async fn test_watch_wait_for() {
    let (tx, mut rx) = watch::channel(0u32);

    let writer = task::spawn(async move {
        for _ in 0..3 {
            tx.send_modify(|value| *value += 1);
            task::yield_now().await;
        }
    });

    let seen = *rx.wait_for(|value| *value == 3).await.unwrap();
    assert_eq!(seen, 3);
    writer.await.unwrap();
}

#[core_async::test]
async fn test_broadcast_fan_out() {
    let (tx, mut rx1) = broadcast::channel(8);
    let mut rx2 = tx.subscribe();

    assert_eq!(tx.send("hello").unwrap(), 2);
    assert_eq!(rx1.recv().await.unwrap(), "hello");
    assert_eq!(rx2.recv().await.unwrap(), "hello");
}

#[core_async::test(start_paused)]
async fn test_interval_first_tick_waits_one_period() {
    let start = Instant::now();
    let mut ticker = time::interval(Duration::from_secs(1));

    ticker.tick().await;

    assert_eq!(start.elapsed(), Duration::from_secs(1));
}

#[core_async::test(start_paused)]
async fn test_interval_keeps_schedule_when_tick_is_abandoned() {
    let start = Instant::now();
    let mut ticker = time::interval(Duration::from_secs(1));

    // Abandon the pending tick twice, the way a select loop does.
    for _ in 0..2 {
        let raced = time::timeout(Duration::from_millis(400), ticker.tick()).await;
        assert!(raced.is_err());
    }

    ticker.tick().await;

    assert_eq!(start.elapsed(), Duration::from_secs(1));
}
