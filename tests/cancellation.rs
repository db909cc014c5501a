mod common;

use common::{status, ScriptedEndpoint};
use retryhook::{
    CallContext, CancelReason, CancellationToken, MemoryObserver, RetryError, RetryPolicy,
};
use std::time::Duration;
use tokio::time::Instant;

fn policy() -> RetryPolicy {
    RetryPolicy::builder().name("webhook").build().unwrap()
}

#[tokio::test(start_paused = true)]
async fn cancel_during_wait_ends_the_call() {
    let endpoint = ScriptedEndpoint::new((0..4).map(|_| status(500)));
    let mut ctx = CallContext::new();
    let cancel = ctx.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(6)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let err = policy().execute_with(&mut ctx, || endpoint.send()).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, RetryError::Cancelled { attempts: 2, reason: CancelReason::Signal }));
    assert_eq!(endpoint.calls(), 2);
    assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(12));
    assert_eq!(ctx.attempt_count(), 2);
    assert_eq!(ctx.total_wait(), Duration::from_secs(4));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(endpoint.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_token_cancels_child_calls() {
    let shutdown = CancellationToken::new();
    let endpoint = ScriptedEndpoint::new((0..4).map(|_| status(503)));
    let mut ctx = CallContext::new().with_cancellation(shutdown.child_token());

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = policy().execute_with(&mut ctx, || endpoint.send()).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.attempts(), Some(1));
    assert_eq!(endpoint.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn deadline_stops_before_an_overlong_wait() {
    let endpoint = ScriptedEndpoint::new((0..4).map(|_| status(500)));
    let mut ctx = CallContext::new().with_timeout(Duration::from_secs(10));

    let started = Instant::now();
    let err = policy().execute_with(&mut ctx, || endpoint.send()).await.unwrap_err();

    assert!(matches!(err, RetryError::Cancelled { attempts: 2, reason: CancelReason::Deadline }));
    assert_eq!(err.to_string(), "retry cancelled by deadline after 2 attempts");
    assert_eq!(endpoint.calls(), 2);
    assert_eq!(started.elapsed(), Duration::from_secs(4));
}

#[tokio::test]
async fn cancelled_token_does_not_block_a_first_success() {
    let endpoint = ScriptedEndpoint::new([status(200)]);
    let mut ctx = CallContext::new();
    ctx.cancellation_token().cancel();

    let response = policy().execute_with(&mut ctx, || endpoint.send()).await.unwrap();

    assert!(response.status().is_success());
    assert_eq!(ctx.attempt_count(), 1);
}

#[tokio::test]
async fn cancelled_token_stops_at_the_first_wait() {
    let endpoint = ScriptedEndpoint::new([status(500)]);
    let mut ctx = CallContext::new();
    ctx.cancellation_token().cancel();

    let err = policy().execute_with(&mut ctx, || endpoint.send()).await.unwrap_err();

    assert!(matches!(err, RetryError::Cancelled { attempts: 1, reason: CancelReason::Signal }));
    assert_eq!(endpoint.calls(), 1);
}

#[tokio::test]
async fn observer_is_silent_when_the_call_is_already_cancelled() {
    let endpoint = ScriptedEndpoint::new([status(500)]);
    let observer = MemoryObserver::new();
    let policy = RetryPolicy::builder().with_observer(observer.clone()).build().unwrap();
    let mut ctx = CallContext::new();
    ctx.cancellation_token().cancel();

    let err = policy.execute_with(&mut ctx, || endpoint.send()).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(observer.is_empty());
}
