mod common;

use common::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokenwarden::application_port::*;
use tokenwarden::domain_port::*;

#[tokio::test(start_paused = true)]
async fn concurrent_refreshes_share_one_rotation() {
    let h = Harness::new().await;
    let old = h.login().await.refresh_token.token;
    assert_eq!(h.store.creates(), 1);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let guard = h.guard.clone();
            let old = old.clone();
            tokio::spawn(async move { guard.refresh(&old).await })
        })
        .collect();

    let mut rotated = HashSet::new();
    for task in tasks {
        rotated.insert(task.await.unwrap().unwrap().refresh_token.token);
    }

    assert_eq!(rotated.len(), 1);
    assert_eq!(h.store.creates(), 2);
    let new = rotated.into_iter().next().unwrap();
    assert_ne!(new, old);

    assert!(h.store.find(&old).await.unwrap().is_some());
    tokio::time::sleep(LEEWAY + Duration::from_secs(1)).await;
    assert!(h.store.find(&old).await.unwrap().is_none());
    assert!(h.store.find(&new).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn two_callers_on_the_same_token_get_the_same_set() {
    let h = Harness::new().await;
    let r1 = h.login().await.refresh_token.token;

    let (a, b) = tokio::join!(h.guard.refresh(&r1), h.guard.refresh(&r1));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.refresh_token.token, b.refresh_token.token);
    assert_eq!(a.access_token.token, b.access_token.token);
    assert_eq!(h.store.creates(), 2);
}

#[tokio::test(start_paused = true)]
async fn late_refresh_within_cache_window_reuses_the_result() {
    let h = Harness::new().await;
    let r1 = h.login().await.refresh_token.token;

    let first = h.guard.refresh(&r1).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    let second = h.guard.refresh(&r1).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.store.creates(), 2);
}

#[tokio::test(start_paused = true)]
async fn refresh_after_leeway_finds_nothing() {
    let h = Harness::new().await;
    let r1 = h.login().await.refresh_token.token;

    h.guard.refresh(&r1).await.unwrap();
    tokio::time::sleep(LEEWAY + Duration::from_secs(1)).await;

    let err = h.guard.refresh(&r1).await.unwrap_err();
    assert!(matches!(err, AuthError::UnknownRefreshToken));
}

#[tokio::test(start_paused = true)]
async fn held_lock_times_out_after_the_poll_budget() {
    let h = Harness::builder().locks(Arc::new(HeldLock)).build().await;
    let r1 = h.login().await.refresh_token.token;

    let started = tokio::time::Instant::now();
    let err = h.guard.refresh(&r1).await.unwrap_err();

    assert!(matches!(err, AuthError::RotationTimeout));
    assert!(err.is_infrastructure());
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(1000));
    assert!(waited < Duration::from_millis(1100));
    assert_eq!(h.store.creates(), 1);
    assert!(h.store.find(&r1).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn unpublished_rotation_keeps_siblings_from_rotating_again() {
    let h = Harness::builder().cache(Arc::new(UnwritableCache)).build().await;
    let r1 = h.login().await.refresh_token.token;

    let (a, b) = tokio::join!(h.guard.refresh(&r1), h.guard.refresh(&r1));

    let (rotated, waited) = match (a, b) {
        (Ok(set), Err(e)) | (Err(e), Ok(set)) => (set, e),
        other => panic!("expected one rotation and one timeout, got {:?}", other),
    };
    assert!(matches!(waited, AuthError::RotationTimeout));
    assert_eq!(h.store.creates(), 2);
    assert!(h.store.find(&rotated.refresh_token.token).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn dropped_caller_still_completes_the_rotation() {
    let h = Harness::new().await;
    let r1 = h.login().await.refresh_token.token;

    let mut abandoned = Box::pin(h.guard.refresh(&r1));
    assert!(futures_util::poll!(abandoned.as_mut()).is_pending());
    drop(abandoned);
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(h.store.creates(), 2);

    let picked_up = h.guard.refresh(&r1).await.unwrap();
    assert_eq!(h.store.creates(), 2);
    assert!(h.store.find(&picked_up.refresh_token.token).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn scheduler_shutdown_flushes_pending_deletions() {
    let h = Harness::new().await;
    let r1 = h.login().await.refresh_token.token;

    h.guard.refresh(&r1).await.unwrap();
    assert!(h.store.find(&r1).await.unwrap().is_some());

    h.scheduler.shutdown().await;
    assert!(h.store.find(&r1).await.unwrap().is_none());
}
