//! Helpers for reading subscriptions in tests.

use std::time::Duration;

use revdb_core::{ChangeEvent, Subscription};

/// How long helpers wait for an event before giving up.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Waits for the next event.
///
/// # Panics
///
/// Panics on timeout, on an error item, or if the subscription ended.
pub async fn next_event(subscription: &mut Subscription) -> ChangeEvent {
    tokio::time::timeout(EVENT_TIMEOUT, subscription.next())
        .await
        .expect("Timed out waiting for change event")
        .expect("Subscription ended")
        .expect("Subscription yielded an error")
}

/// Collects exactly `count` events.
pub async fn next_events(subscription: &mut Subscription, count: usize) -> Vec<ChangeEvent> {
    let mut events = Vec::with_capacity(count);
    for _ in 0..count {
        events.push(next_event(subscription).await);
    }
    events
}

/// Asserts that nothing arrives within `quiet`.
///
/// # Panics
///
/// Panics if an item arrives.
pub async fn assert_quiet(subscription: &mut Subscription, quiet: Duration) {
    if let Ok(item) = tokio::time::timeout(quiet, subscription.next()).await {
        panic!("expected no events, got {item:?}");
    }
}
