//! Integration tests for tomd
//!
//! These tests drive the engine end to end: configuration in, events out.

use std::io::Write;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::{Instant, timeout};
use tom_config::{DurationPolicy, load_config};
use tom_core::{
    EngineError, EngineEvent, EngineOptions, EngineStatus, PomoEngine, SessionKind,
    StateChangeEvent, TransitionCause,
};

const MINUTE: Duration = Duration::from_secs(60);

fn make_engine(max_rounds: u32, progress_interval: Duration) -> PomoEngine {
    let policy = DurationPolicy::new(max_rounds, MINUTE * 25, MINUTE * 5, MINUTE * 15).unwrap();
    PomoEngine::with_options(
        policy,
        EngineOptions {
            progress_interval,
            ..Default::default()
        },
    )
}

/// Receive events until the next state change; returns the change and
/// everything seen before it
async fn next_change(
    rx: &mut broadcast::Receiver<EngineEvent>,
) -> (StateChangeEvent, Vec<EngineEvent>) {
    let mut before = Vec::new();
    loop {
        match rx.recv().await.unwrap() {
            EngineEvent::StateChanged(change) => return (change, before),
            other => before.push(other),
        }
    }
}

fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
            Err(TryRecvError::Lagged(n)) => panic!("observer lagged by {n}"),
        }
    }
}

fn phase(change: &StateChangeEvent) -> (SessionKind, u32) {
    (change.kind, change.round_counter)
}

#[tokio::test]
async fn test_advance_walks_the_full_cycle() {
    let engine = make_engine(4, Duration::from_secs(1));
    let mut rx = engine.subscribe();
    engine.start().unwrap();

    let mut seen = Vec::new();
    let mut sessions_started = 0;
    for _ in 0..9 {
        engine.advance().unwrap();
        let (change, before) = timeout(Duration::from_secs(2), next_change(&mut rx))
            .await
            .expect("state change after advance");
        sessions_started += before
            .iter()
            .filter(|e| matches!(e, EngineEvent::SessionStarted { .. }))
            .count();
        assert_eq!(change.cause, TransitionCause::Advanced);
        seen.push(phase(&change));
    }

    assert_eq!(
        seen,
        vec![
            (SessionKind::Working, 0),
            (SessionKind::ShortBreak, 1),
            (SessionKind::Working, 1),
            (SessionKind::ShortBreak, 2),
            (SessionKind::Working, 2),
            (SessionKind::ShortBreak, 3),
            (SessionKind::Working, 3),
            (SessionKind::LongBreak, 4),
            (SessionKind::Working, 0),
        ]
    );
    assert_eq!(sessions_started, 1);

    engine.stop().await.unwrap();
}

#[tokio::test]
async fn test_session_started_precedes_first_state_change() {
    let engine = make_engine(4, Duration::from_secs(1));
    let mut rx = engine.subscribe();
    engine.start().unwrap();

    engine.advance().unwrap();
    let (change, before) = timeout(Duration::from_secs(2), next_change(&mut rx))
        .await
        .unwrap();

    assert_eq!(phase(&change), (SessionKind::Working, 0));
    assert_eq!(before.len(), 1);
    assert!(matches!(before[0], EngineEvent::SessionStarted { .. }));

    engine.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_repeated_advance_in_ready_starts_one_session() {
    let engine = make_engine(4, MINUTE);
    let mut rx = engine.subscribe();
    engine.start().unwrap();

    // The driver loop cannot run between these calls, so the second one hits
    // the retiring Ready state and is ignored
    engine.advance().unwrap();
    engine.advance().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let events = drain(&mut rx);
    let started = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::SessionStarted { .. }))
        .count();
    let changes: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::StateChanged(change) => Some(phase(change)),
            _ => None,
        })
        .collect();

    assert_eq!(started, 1);
    assert_eq!(changes, vec![(SessionKind::Working, 0)]);
    assert_eq!(engine.current_state(), SessionKind::Working);

    engine.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_timers_drive_the_cycle_without_input() {
    let engine = make_engine(4, MINUTE);
    let cycle = engine.policy().cycle_duration();
    let mut rx = engine.subscribe();
    engine.start().unwrap();
    engine.advance().unwrap();

    let (first, _) = next_change(&mut rx).await;
    assert_eq!(phase(&first), (SessionKind::Working, 0));
    let cycle_start = Instant::now();

    let mut current = phase(&first);
    let mut seen = Vec::new();
    let mut progress_count = 0;
    while seen.len() < 8 {
        match rx.recv().await.unwrap() {
            EngineEvent::Progress(progress) => {
                // Never a tick from a retired state
                assert_eq!((progress.kind, progress.round_counter), current);
                assert!(progress.ratio() < 1.0);
                progress_count += 1;
            }
            EngineEvent::StateChanged(change) => {
                assert_eq!(change.cause, TransitionCause::Completed);
                assert!(change.round_counter <= engine.policy().max_rounds());
                current = phase(&change);
                seen.push(current);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    assert_eq!(
        seen,
        vec![
            (SessionKind::ShortBreak, 1),
            (SessionKind::Working, 1),
            (SessionKind::ShortBreak, 2),
            (SessionKind::Working, 2),
            (SessionKind::ShortBreak, 3),
            (SessionKind::Working, 3),
            (SessionKind::LongBreak, 4),
            (SessionKind::Working, 0),
        ]
    );

    // One tick per minute of every phase in the cycle
    assert_eq!(progress_count, cycle.as_secs() / 60);

    let elapsed = cycle_start.elapsed();
    assert!(elapsed >= cycle, "cycle took {elapsed:?}");
    assert!(elapsed < cycle + MINUTE, "cycle took {elapsed:?}");

    engine.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_mid_phase_exits_promptly() {
    let engine = make_engine(4, MINUTE);
    let mut rx = engine.subscribe();
    engine.start().unwrap();
    engine.advance().unwrap();

    let (change, _) = next_change(&mut rx).await;
    assert_eq!(phase(&change), (SessionKind::Working, 0));
    let entered = Instant::now();

    tokio::time::sleep(MINUTE * 10).await;
    timeout(Duration::from_secs(5), engine.stop())
        .await
        .expect("stop within grace period")
        .unwrap();

    assert_eq!(engine.status(), EngineStatus::Stopped);
    assert!(entered.elapsed() < engine.policy().work_duration());

    // Everything buffered was produced by Working(0) before the stop
    let buffered = drain(&mut rx);
    assert!(!buffered.is_empty());
    for event in &buffered {
        match event {
            EngineEvent::Progress(p) => {
                assert_eq!((p.kind, p.round_counter), (SessionKind::Working, 0));
                assert!(p.elapsed <= MINUTE * 10, "tick after stop: {p:?}");
            }
            other => panic!("unexpected event before stop returned: {other:?}"),
        }
    }

    // Let the phase deadline pass; nothing may follow the stop
    tokio::time::sleep(MINUTE * 60).await;
    let after = drain(&mut rx);
    assert!(after.is_empty(), "events after stop: {after:?}");

    assert!(matches!(engine.advance(), Err(EngineError::NotRunning)));
}

#[tokio::test(start_paused = true)]
async fn test_skip_discards_partial_progress() {
    let engine = make_engine(4, MINUTE);
    let mut rx = engine.subscribe();
    engine.start().unwrap();
    engine.advance().unwrap();
    next_change(&mut rx).await;

    // Halfway through work, skip to the break
    tokio::time::sleep(MINUTE * 12 + Duration::from_secs(30)).await;
    engine.advance().unwrap();
    let (change, _) = next_change(&mut rx).await;
    assert_eq!(phase(&change), (SessionKind::ShortBreak, 1));
    let break_start = Instant::now();

    // The break still runs its full length
    let (change, _) = next_change(&mut rx).await;
    assert_eq!(phase(&change), (SessionKind::Working, 1));
    assert_eq!(change.cause, TransitionCause::Completed);
    assert!(break_start.elapsed() >= engine.policy().short_break_duration());

    engine.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_config_file_drives_engine() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
config_version = 1

[timer]
max_rounds = 2
work_seconds = 30
short_break_seconds = 5
long_break_seconds = 20
progress_interval_ms = 5000
"#
    )
    .unwrap();

    let settings = load_config(file.path()).unwrap();
    assert_eq!(settings.progress_interval, Duration::from_secs(5));
    let engine = PomoEngine::with_options(
        settings.timer,
        EngineOptions {
            progress_interval: settings.progress_interval,
            ..Default::default()
        },
    );

    let mut rx = engine.subscribe();
    engine.start().unwrap();
    engine.advance().unwrap();

    let mut seen = Vec::new();
    for _ in 0..5 {
        let (change, _) = next_change(&mut rx).await;
        seen.push(phase(&change));
    }

    assert_eq!(
        seen,
        vec![
            (SessionKind::Working, 0),
            (SessionKind::ShortBreak, 1),
            (SessionKind::Working, 1),
            (SessionKind::LongBreak, 2),
            (SessionKind::Working, 0),
        ]
    );

    engine.stop().await.unwrap();
}
