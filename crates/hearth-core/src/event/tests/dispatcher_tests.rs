use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::event::dispatcher::{SharedEventDispatcher, sync_event_handler};
use crate::event::{BridgeEvent, EventKind, EventResult};

fn restart(reason: &str) -> BridgeEvent {
    BridgeEvent::Restart {
        reason: reason.to_string(),
    }
}

#[tokio::test]
async fn test_dispatch_reaches_matching_kind_only() {
    let dispatcher = SharedEventDispatcher::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let calls_clone = Arc::clone(&calls);
    dispatcher
        .register_handler(
            EventKind::Restart,
            sync_event_handler(move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                EventResult::Continue
            }),
        )
        .await;

    dispatcher.dispatch(&restart("first")).await;
    dispatcher
        .dispatch(&BridgeEvent::Shutdown {
            reason: "other kind".to_string(),
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1, "Only Restart is delivered");
}

#[tokio::test]
async fn test_stop_short_circuits_later_handlers() {
    let dispatcher = SharedEventDispatcher::new();
    let seen = Arc::new(StdMutex::new(Vec::new()));

    let seen_first = Arc::clone(&seen);
    dispatcher
        .register_handler(
            EventKind::Restart,
            sync_event_handler(move |_| {
                seen_first.lock().unwrap().push("first");
                EventResult::Stop
            }),
        )
        .await;

    let seen_second = Arc::clone(&seen);
    dispatcher
        .register_handler(
            EventKind::Restart,
            sync_event_handler(move |_| {
                seen_second.lock().unwrap().push("second");
                EventResult::Continue
            }),
        )
        .await;

    let result = dispatcher.dispatch(&restart("halt")).await;

    assert_eq!(result, EventResult::Stop);
    assert_eq!(*seen.lock().unwrap(), vec!["first"]);
}

#[tokio::test]
async fn test_unregister_handler() {
    let dispatcher = SharedEventDispatcher::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let calls_clone = Arc::clone(&calls);
    let id = dispatcher
        .register_handler(
            EventKind::Restart,
            sync_event_handler(move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                EventResult::Continue
            }),
        )
        .await;

    dispatcher.dispatch(&restart("before")).await;
    assert!(dispatcher.unregister_handler(id).await);
    dispatcher.dispatch(&restart("after")).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(
        !dispatcher.unregister_handler(id).await,
        "Second unregister finds nothing"
    );
}

#[tokio::test]
async fn test_queue_is_fifo() {
    let dispatcher = SharedEventDispatcher::new();
    let reasons = Arc::new(StdMutex::new(Vec::new()));

    let reasons_clone = Arc::clone(&reasons);
    dispatcher
        .register_handler(
            EventKind::Restart,
            sync_event_handler(move |event| {
                if let BridgeEvent::Restart { reason } = event {
                    reasons_clone.lock().unwrap().push(reason.clone());
                }
                EventResult::Continue
            }),
        )
        .await;

    dispatcher.queue_event(restart("one")).await;
    dispatcher.queue_event(restart("two")).await;
    dispatcher.queue_event(restart("three")).await;
    assert_eq!(dispatcher.queue_size().await, 3);

    let processed = dispatcher.process_queue().await;

    assert_eq!(processed, 3);
    assert_eq!(dispatcher.queue_size().await, 0);
    assert_eq!(*reasons.lock().unwrap(), vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_handlers_run_in_registration_order() {
    let dispatcher = SharedEventDispatcher::new();
    let order = Arc::new(StdMutex::new(Vec::new()));

    for tag in ["a", "b", "c"] {
        let order_clone = Arc::clone(&order);
        dispatcher
            .register_handler(
                EventKind::Shutdown,
                sync_event_handler(move |_| {
                    order_clone.lock().unwrap().push(tag);
                    EventResult::Continue
                }),
            )
            .await;
    }

    dispatcher
        .dispatch(&BridgeEvent::Shutdown {
            reason: "ordered".to_string(),
        })
        .await;

    assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
}
