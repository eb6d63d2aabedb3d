//! Core pomodoro engine
//!
//! Hosts the driver loop:
//!
//! 1. Enter the active state (its timer runs inside the loop task)
//! 2. Concurrently wait for the next [`Notification`]
//! 3. Drop the retiring state's phase, swap in the new state, publish `StateChanged`
//!
//! Engine lifecycle: `Idle -> Running -> Stopping -> Stopped`.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tom_config::{DEFAULT_PROGRESS_INTERVAL, DurationPolicy, MIN_PROGRESS_INTERVAL_MS};
use tracing::{debug, error, info, warn};

use crate::{
    EngineError, EngineEvent, EngineResult, Notification, NotificationQueue,
    NotificationReceiver, QueueError, SessionKind, SessionState, StateChangeEvent,
};

/// Default broadcast buffer for observers
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Engine tuning knobs that are not part of the duration policy
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Cadence of progress events during timed phases
    pub progress_interval: Duration,
    /// Events buffered per observer before it starts lagging
    pub event_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Externally visible lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Idle,
    Running,
    Stopping,
    Stopped,
    /// The driver loop stopped on an unexpected fault; `stop()` reports it
    Faulted,
}

enum Lifecycle {
    Idle,
    Running {
        cancel: CancellationToken,
        handle: JoinHandle<EngineResult<()>>,
    },
    Stopping,
    Stopped,
}

/// State shared between the engine handle and its driver loop
struct Shared {
    active: RwLock<Arc<SessionState>>,
    queue: NotificationQueue,
    events: broadcast::Sender<EngineEvent>,
    faulted: AtomicBool,
}

impl Shared {
    fn active(&self) -> Arc<SessionState> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn fault(&self, message: String) {
        self.faulted.store(true, Ordering::Release);
        self.publish(EngineEvent::Faulted { message });
    }
}

/// The pomodoro engine.
///
/// Observers register once with [`subscribe`](Self::subscribe) and receive
/// progress from whichever state is active; a retired state's progress can
/// never reach them because its phase is dropped before the swap.
///
/// # Contract
///
/// - [`start`](Self::start) needs a Tokio runtime and works once.
/// - [`advance`](Self::advance) fails fast with [`EngineError::NotRunning`]
///   unless the engine is running.
/// - [`current_state`](Self::current_state) is readable in every lifecycle
///   state; before `start` it reports `Ready`, after `stop` the last phase.
pub struct PomoEngine {
    policy: Arc<DurationPolicy>,
    options: EngineOptions,
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
}

impl PomoEngine {
    /// Create a new engine in `Ready` with default options
    pub fn new(policy: DurationPolicy) -> Self {
        Self::with_options(policy, EngineOptions::default())
    }

    /// Create a new engine in `Ready`.
    ///
    /// `progress_interval` is floored at the smallest cadence the config
    /// layer accepts.
    pub fn with_options(policy: DurationPolicy, mut options: EngineOptions) -> Self {
        let min_interval = Duration::from_millis(MIN_PROGRESS_INTERVAL_MS);
        if options.progress_interval < min_interval {
            warn!(
                requested = ?options.progress_interval,
                used = ?min_interval,
                "Progress interval too small, clamping"
            );
            options.progress_interval = min_interval;
        }

        let policy = Arc::new(policy);
        let (events, _) = broadcast::channel(options.event_capacity.max(1));

        info!(
            max_rounds = policy.max_rounds(),
            work = ?policy.work_duration(),
            short_break = ?policy.short_break_duration(),
            long_break = ?policy.long_break_duration(),
            "Pomodoro engine initialized"
        );

        Self {
            shared: Arc::new(Shared {
                active: RwLock::new(Arc::new(SessionState::ready(policy.clone()))),
                queue: NotificationQueue::new(),
                events,
                faulted: AtomicBool::new(false),
            }),
            policy,
            options,
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    pub fn policy(&self) -> &DurationPolicy {
        &self.policy
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Register an observer for all engine events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }

    /// Kind of the active phase
    pub fn current_state(&self) -> SessionKind {
        self.shared.active().kind()
    }

    /// Round counter of the active phase
    pub fn current_round(&self) -> u32 {
        self.shared.active().round_counter()
    }

    pub fn status(&self) -> EngineStatus {
        let status = match *self.lock_lifecycle() {
            Lifecycle::Idle => EngineStatus::Idle,
            Lifecycle::Running { .. } => EngineStatus::Running,
            Lifecycle::Stopping => EngineStatus::Stopping,
            Lifecycle::Stopped => EngineStatus::Stopped,
        };
        if status != EngineStatus::Idle && self.shared.faulted.load(Ordering::Acquire) {
            return EngineStatus::Faulted;
        }
        status
    }

    /// Spawn the driver loop on the current Tokio runtime.
    ///
    /// Returns as soon as the loop is scheduled.
    pub fn start(&self) -> EngineResult<()> {
        let mut lifecycle = self.lock_lifecycle();
        if !matches!(*lifecycle, Lifecycle::Idle) {
            return Err(EngineError::AlreadyStarted);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| EngineError::NoRuntime(e.to_string()))?;
        let receiver = self
            .shared
            .queue
            .take_receiver()
            .ok_or(QueueError::ReceiverTaken)?;

        let cancel = CancellationToken::new();
        let driver = runtime.spawn(drive(
            self.shared.clone(),
            receiver,
            cancel.clone(),
            self.options.progress_interval,
        ));
        let handle = runtime.spawn(supervise(self.shared.clone(), driver));

        *lifecycle = Lifecycle::Running { cancel, handle };
        info!("Pomodoro engine started");
        Ok(())
    }

    /// Cancel the driver loop and wait for it to exit.
    ///
    /// Returns the loop's fault if it stopped on one.
    pub async fn stop(&self) -> EngineResult<()> {
        let (cancel, handle) = {
            let mut lifecycle = self.lock_lifecycle();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopping) {
                Lifecycle::Running { cancel, handle } => (cancel, handle),
                Lifecycle::Idle => {
                    *lifecycle = Lifecycle::Idle;
                    return Err(EngineError::NotStarted);
                }
                other => {
                    *lifecycle = other;
                    return Err(EngineError::AlreadyStopped);
                }
            }
        };

        info!("Stopping pomodoro engine");
        cancel.cancel();
        let joined = handle.await;
        *self.lock_lifecycle() = Lifecycle::Stopped;

        match joined {
            Ok(result) => {
                info!("Pomodoro engine stopped");
                result
            }
            Err(e) => {
                error!(error = %e, "Driver loop did not exit cleanly");
                Err(EngineError::LoopPanicked(e.to_string()))
            }
        }
    }

    /// Leave the active phase now.
    ///
    /// From `Ready` this starts a session and publishes `SessionStarted`
    /// before the transition is queued. Advancing a state whose transition is
    /// already in flight is a no-op.
    pub fn advance(&self) -> EngineResult<()> {
        // Held throughout so `stop` cannot begin mid-advance
        let lifecycle = self.lock_lifecycle();
        if !matches!(*lifecycle, Lifecycle::Running { .. })
            || self.shared.faulted.load(Ordering::Acquire)
        {
            return Err(EngineError::NotRunning);
        }

        // Hold the read lock so the loop cannot swap states under us
        let active = self
            .shared
            .active
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let produced = active
            .advance_with(&self.shared.queue, |state| {
                if state.kind() == SessionKind::Ready {
                    info!("Session started");
                    self.shared.publish(EngineEvent::SessionStarted {
                        at: tom_util::now(),
                    });
                }
            })
            .map_err(|e| match e {
                QueueError::Closed => EngineError::NotRunning,
                other => EngineError::Queue(other),
            })?;

        if produced {
            info!(from = %active.phase(), "Advance requested");
        } else {
            debug!(phase = %active.phase(), "Advance ignored, transition already in flight");
        }
        Ok(())
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PomoEngine {
    fn drop(&mut self) {
        if let Lifecycle::Running { cancel, .. } = &*self.lock_lifecycle() {
            warn!("Pomodoro engine dropped while running, cancelling driver loop");
            cancel.cancel();
        }
    }
}

/// Driver loop: runs until cancelled or faulted
async fn drive(
    shared: Arc<Shared>,
    mut receiver: NotificationReceiver,
    cancel: CancellationToken,
    progress_interval: Duration,
) -> EngineResult<()> {
    debug!("Driver loop running");

    let result = loop {
        match step(&shared, &mut receiver, &cancel, progress_interval).await {
            Ok(()) => {}
            Err(QueueError::Cancelled) => break Ok(()),
            Err(e) => {
                error!(error = %e, "Driver loop fault, stopping engine");
                shared.fault(e.to_string());
                break Err(EngineError::from(e));
            }
        }
    };

    debug!("Driver loop exited");
    result
}

/// Await the driver loop, turning a panic into the same fault a loop error gets
async fn supervise(
    shared: Arc<Shared>,
    driver: JoinHandle<EngineResult<()>>,
) -> EngineResult<()> {
    match driver.await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Driver loop panicked, stopping engine");
            shared.fault(e.to_string());
            Err(EngineError::LoopPanicked(e.to_string()))
        }
    }
}

/// One transition: run the active phase until a notification arrives, then swap
async fn step(
    shared: &Shared,
    receiver: &mut NotificationReceiver,
    cancel: &CancellationToken,
    progress_interval: Duration,
) -> Result<(), QueueError> {
    let active = shared.active();

    let notification: Notification = {
        let phase = active.enter(&shared.queue, cancel, progress_interval, |progress| {
            shared.publish(EngineEvent::Progress(progress));
        });
        tokio::pin!(phase);
        let mut phase_done = false;

        loop {
            tokio::select! {
                biased;

                notification = receiver.dequeue(cancel) => break notification?,

                entered = &mut phase, if !phase_done => {
                    entered?;
                    phase_done = true;
                }
            }
        }
        // The retiring phase is dropped here and can no longer report progress
    };

    let (next, cause) = notification.into_parts();
    let kind = next.kind();
    let round_counter = next.round_counter();
    let phase = next.phase();

    // Infallible: either fully applied or not attempted
    *shared.active.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);

    info!(from = %active.phase(), to = %phase, ?cause, "State changed");
    shared.publish(EngineEvent::StateChanged(StateChangeEvent {
        kind,
        round_counter,
        cause,
        at: tom_util::now(),
    }));

    Ok(())
}
