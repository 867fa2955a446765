//! Countdown behaviour under paused Tokio time.

use std::time::Duration;

use skirmish_clock::{CountdownConfig, CountdownEvent, CountdownManager, CountdownNotice};
use tokio::sync::mpsc;
use tokio::time;

type Rx = mpsc::UnboundedReceiver<CountdownNotice<&'static str>>;

fn manager() -> (CountdownManager<&'static str>, Rx) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CountdownManager::new(tx), rx)
}

/// Collects current notices until `Expired` arrives.
async fn run_to_expiry(clock: &CountdownManager<&'static str>, rx: &mut Rx) -> Vec<CountdownEvent> {
    let mut seen = Vec::new();
    while let Some(notice) = rx.recv().await {
        if !clock.is_current(&notice) {
            continue;
        }
        seen.push(notice.event);
        if notice.event == CountdownEvent::Expired {
            break;
        }
    }
    seen
}

/// Drains whatever is already queued, keeping only current notices.
fn drain_current(clock: &CountdownManager<&'static str>, rx: &mut Rx) -> Vec<CountdownEvent> {
    let mut seen = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        if clock.is_current(&notice) {
            seen.push(notice.event);
        }
    }
    seen
}

// ===========================================================================
// Lifecycle
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn test_init_twice_is_a_no_op() {
    let (mut clock, _rx) = manager();
    assert!(clock.init("room", CountdownConfig::with_duration(5)));
    assert!(!clock.init("room", CountdownConfig::with_duration(99)));
    assert_eq!(clock.remaining(&"room"), Some(5));
}

#[tokio::test(start_paused = true)]
async fn test_start_ticks_down_then_expires() {
    let (mut clock, mut rx) = manager();
    clock.init("room", CountdownConfig::with_duration(3));
    assert!(clock.start(&"room"));

    let events = run_to_expiry(&clock, &mut rx).await;
    assert_eq!(
        events,
        vec![
            CountdownEvent::Tick { remaining: 2 },
            CountdownEvent::Tick { remaining: 1 },
            CountdownEvent::Tick { remaining: 0 },
            CountdownEvent::Expired,
        ]
    );
    assert_eq!(clock.remaining(&"room"), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_start_runs_pre_delay_before_countdown() {
    let (mut clock, mut rx) = manager();
    clock.init("room", CountdownConfig::with_duration(2).pre_delay(3));
    let began = time::Instant::now();
    clock.start(&"room");

    let events = run_to_expiry(&clock, &mut rx).await;
    assert_eq!(
        events,
        vec![
            CountdownEvent::DelayTick { remaining: 3 },
            CountdownEvent::DelayTick { remaining: 2 },
            CountdownEvent::DelayTick { remaining: 1 },
            CountdownEvent::Began,
            CountdownEvent::Tick { remaining: 1 },
            CountdownEvent::Tick { remaining: 0 },
            CountdownEvent::Expired,
        ]
    );
    assert_eq!(began.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_operations_on_unknown_key_report_false() {
    let (mut clock, _rx) = manager();
    assert!(!clock.start(&"nope"));
    assert!(!clock.resume(&"nope"));
    assert!(!clock.reset(&"nope"));
    assert!(!clock.delete(&"nope"));
    assert_eq!(clock.pause(&"nope"), None);
    assert_eq!(clock.remaining(&"nope"), None);
}

// ===========================================================================
// Cancellation
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn test_reset_before_expiry_suppresses_it() {
    let (mut clock, mut rx) = manager();
    clock.init("room", CountdownConfig::with_duration(2));
    clock.start(&"room");

    time::sleep(Duration::from_millis(1500)).await;
    assert!(clock.reset(&"room"));
    assert_eq!(clock.remaining(&"room"), Some(2));

    time::sleep(Duration::from_secs(10)).await;
    assert!(drain_current(&clock, &mut rx).is_empty());
    assert!(!clock.is_running(&"room"));
}

#[tokio::test(start_paused = true)]
async fn test_delete_cancels_pending_notices() {
    let (mut clock, mut rx) = manager();
    clock.init("room", CountdownConfig::with_duration(1));
    clock.start(&"room");
    assert!(clock.delete(&"room"));

    time::sleep(Duration::from_secs(5)).await;
    assert!(drain_current(&clock, &mut rx).is_empty());
    assert!(!clock.contains(&"room"));
}

#[tokio::test(start_paused = true)]
async fn test_restart_retires_previous_generation() {
    let (mut clock, mut rx) = manager();
    clock.init("room", CountdownConfig::with_duration(3));
    clock.start(&"room");

    time::sleep(Duration::from_millis(1500)).await;
    let stale = rx.try_recv().expect("one tick before restart");
    clock.start(&"room");
    assert!(!clock.is_current(&stale));

    let events = run_to_expiry(&clock, &mut rx).await;
    assert_eq!(events.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_start_with_replaces_duration() {
    let (mut clock, mut rx) = manager();
    clock.init("combat", CountdownConfig::with_duration(5));
    clock.start_with(&"combat", 3);

    let events = run_to_expiry(&clock, &mut rx).await;
    assert_eq!(events.first(), Some(&CountdownEvent::Tick { remaining: 2 }));

    clock.reset(&"combat");
    assert_eq!(clock.remaining(&"combat"), Some(3));
}

// ===========================================================================
// Pause / resume
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn test_pause_preserves_remaining_across_resume() {
    let (mut clock, mut rx) = manager();
    clock.init("room", CountdownConfig::with_duration(10));
    clock.start(&"room");

    time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(clock.pause(&"room"), Some(7));

    // Time spent paused does not count.
    time::sleep(Duration::from_secs(100)).await;
    assert_eq!(clock.remaining(&"room"), Some(7));
    drain_current(&clock, &mut rx);

    let resumed = time::Instant::now();
    assert!(clock.resume(&"room"));
    let events = run_to_expiry(&clock, &mut rx).await;
    let ticks = events
        .iter()
        .filter(|e| matches!(e, CountdownEvent::Tick { .. }))
        .count();
    assert_eq!(ticks, 7);
    assert_eq!(resumed.elapsed(), Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_resume_skips_pre_delay() {
    let (mut clock, mut rx) = manager();
    clock.init("room", CountdownConfig::with_duration(2).pre_delay(3));
    clock.resume(&"room");

    let events = run_to_expiry(&clock, &mut rx).await;
    assert!(
        events
            .iter()
            .all(|e| !matches!(e, CountdownEvent::DelayTick { .. } | CountdownEvent::Began))
    );
}

#[test]
fn test_validated_clamps_zero_tick() {
    let config = CountdownConfig {
        tick: Duration::ZERO,
        ..Default::default()
    }
    .validated();
    assert_eq!(config.tick, CountdownConfig::MIN_TICK);
}
