//! Shared run state
//!
//! One `RunState` record per process, guarded by a single mutex. Nothing
//! outside this module touches its fields: callers go through
//! [`SharedRunState`], whose methods lock, mutate, and publish a fresh
//! snapshot before releasing the lock. Publishing under the lock keeps
//! snapshots in mutation order.
//!
//! The single-slot run supervisor lives here as well: `active` holds the id
//! and cancellation token of the run that owns the slot. A run only folds its
//! outcome back into the record while it still owns the slot.

use chrono::{DateTime, Utc};
use portal_core::{
    cooldown, BusMessage, IndicatorState, Rejection, RunId, RunOutcome, RunPhase, ScenarioState,
    StatusSnapshot, TriggerSource,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::status::StatusPublisher;

/// The run that currently owns the slot
#[derive(Debug)]
struct ActiveRun {
    id: RunId,
    token: CancellationToken,
}

/// A standalone lighting effect (flicker without a scenario)
#[derive(Debug)]
struct ActiveEffect {
    id: u64,
    token: CancellationToken,
}

#[derive(Debug)]
struct RunState {
    running: bool,
    abort_requested: bool,
    active: Option<ActiveRun>,
    effect: Option<ActiveEffect>,
    next_run_id: u64,
    next_effect_id: u64,
    phase: Option<RunPhase>,
    /// Monotonic finish time of the last completed run; drives the cooldown
    last_finish: Option<Instant>,
    /// Wall clock of the same moment, for display
    last_finish_wall: Option<DateTime<Utc>>,
    last_source: Option<TriggerSource>,
    last_outcome: Option<RunOutcome>,
    total_triggers: u64,
    auto_trigger_enabled: bool,
    last_person_count: u32,
    indicator_state: Option<IndicatorState>,
    indicator_last_update: Option<DateTime<Utc>>,
    indicator_online: bool,
    lighting_available: bool,
    bus_connected: bool,
    last_bus_message: Option<BusMessage>,
    visitor_count: u64,
    uptime_start: DateTime<Utc>,
}

impl RunState {
    fn new() -> Self {
        Self {
            running: false,
            abort_requested: false,
            active: None,
            effect: None,
            next_run_id: 1,
            next_effect_id: 1,
            phase: None,
            last_finish: None,
            last_finish_wall: None,
            last_source: None,
            last_outcome: None,
            total_triggers: 0,
            auto_trigger_enabled: true,
            last_person_count: 0,
            indicator_state: None,
            indicator_last_update: None,
            indicator_online: false,
            lighting_available: false,
            bus_connected: false,
            last_bus_message: None,
            visitor_count: 0,
            uptime_start: Utc::now(),
        }
    }

    fn cooldown_remaining(&self, window: Duration) -> Duration {
        cooldown::remaining(self.last_finish, now(), window)
    }

    /// Admission rules; a running scenario wins over any cooldown value
    fn admission_check(&self, window: Duration) -> Result<(), Rejection> {
        if self.running {
            return Err(Rejection::AlreadyRunning);
        }
        let remaining = self.cooldown_remaining(window);
        if remaining > Duration::ZERO {
            return Err(Rejection::CooldownActive { remaining });
        }
        Ok(())
    }

    fn snapshot(&self, window: Duration) -> StatusSnapshot {
        let remaining = self.cooldown_remaining(window);
        let scenario_state = if self.running {
            ScenarioState::Active
        } else if remaining > Duration::ZERO {
            ScenarioState::Cooldown
        } else {
            ScenarioState::Waiting
        };

        StatusSnapshot {
            scenario_running: self.running,
            scenario_state,
            phase: self.phase,
            abort_requested: self.abort_requested,
            auto_trigger_enabled: self.auto_trigger_enabled,
            cooldown_remaining: cooldown::display_secs(remaining),
            last_trigger_time: self.last_finish_wall,
            last_trigger_source: self.last_source,
            last_outcome: self.last_outcome,
            total_triggers: self.total_triggers,
            last_person_count: self.last_person_count,
            indicator_state: self.indicator_state,
            indicator_last_update: self.indicator_last_update,
            indicator_online: self.indicator_online,
            lighting_available: self.lighting_available,
            bus_connected: self.bus_connected,
            last_bus_message: self.last_bus_message.clone(),
            visitor_count: self.visitor_count,
            uptime_start: self.uptime_start,
        }
    }

    fn cancel_effect(&mut self) {
        if let Some(effect) = self.effect.take() {
            debug!(effect_id = effect.id, "Cancelling lighting effect");
            effect.token.cancel();
        }
    }
}

/// Monotonic now, from tokio's clock so paused-time tests drive it
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Handle to the process-wide run state
#[derive(Debug, Clone)]
pub struct SharedRunState {
    inner: Arc<Mutex<RunState>>,
    publisher: StatusPublisher,
    cooldown: Duration,
}

impl SharedRunState {
    /// Fresh state: not running, no cooldown, counters at zero
    pub fn new(cooldown: Duration) -> Self {
        let state = RunState::new();
        let publisher = StatusPublisher::new(state.snapshot(cooldown));
        Self {
            inner: Arc::new(Mutex::new(state)),
            publisher,
            cooldown,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        // Critical sections are plain field writes; a panic elsewhere cannot
        // leave the record half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate under the lock and publish the result before unlocking
    fn update<R>(&self, f: impl FnOnce(&mut RunState) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state);
        self.publisher.publish(state.snapshot(self.cooldown));
        result
    }

    pub fn cooldown_window(&self) -> Duration {
        self.cooldown
    }

    pub fn publisher(&self) -> &StatusPublisher {
        &self.publisher
    }

    /// Consistent copy of the whole record
    pub fn snapshot(&self) -> StatusSnapshot {
        self.lock().snapshot(self.cooldown)
    }

    /// Re-publish the current state (cooldown countdown, new observer)
    pub fn publish(&self) {
        self.update(|_| ());
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Raw remaining cooldown; zero when none is active
    pub fn cooldown_remaining(&self) -> Duration {
        self.lock().cooldown_remaining(self.cooldown)
    }

    /// Admission verdict without side effects
    pub fn check_admission(&self) -> Result<(), Rejection> {
        self.lock().admission_check(self.cooldown)
    }

    // ----- run lifecycle (engine only) -----

    /// Check and claim the run slot in one critical section
    pub(crate) fn begin_run(
        &self,
        source: TriggerSource,
    ) -> Result<(RunId, CancellationToken), Rejection> {
        self.update(|state| {
            state.admission_check(self.cooldown)?;

            let id = RunId(state.next_run_id);
            state.next_run_id += 1;
            let token = CancellationToken::new();

            state.cancel_effect();
            state.running = true;
            state.abort_requested = false;
            state.phase = None;
            state.last_source = Some(source);
            state.total_triggers += 1;
            state.active = Some(ActiveRun {
                id,
                token: token.clone(),
            });
            Ok((id, token))
        })
    }

    /// Record a phase transition; ignored once the run lost its slot
    pub(crate) fn enter_phase(&self, id: RunId, phase: RunPhase) -> bool {
        self.update(|state| match &state.active {
            Some(active) if active.id == id => {
                state.phase = Some(phase);
                true
            }
            _ => false,
        })
    }

    /// Fold a finished run back into idle
    ///
    /// Returns `false` when the run no longer owned the slot (a reset
    /// declared it done already). In that case only the abort flag and the
    /// outcome are settled, and only if no newer run has started.
    pub(crate) fn finish_run(&self, id: RunId, outcome: RunOutcome) -> bool {
        self.update(|state| {
            let owns_slot = matches!(&state.active, Some(active) if active.id == id);
            if owns_slot {
                state.active = None;
                state.running = false;
                state.phase = None;
                state.abort_requested = false;
                state.last_outcome = Some(outcome);
                if outcome == RunOutcome::Completed {
                    state.last_finish = Some(now());
                    state.last_finish_wall = Some(Utc::now());
                }
                return true;
            }

            if state.active.is_none() {
                state.abort_requested = false;
                state.last_outcome = Some(outcome);
            }
            false
        })
    }

    /// Declare any run done, clear the cooldown, and signal the run to stop
    ///
    /// Does not wait for the run task: the caller is acknowledged at once
    /// while the task notices its cancelled token and unwinds on its own.
    /// Returns whether a run was active.
    pub(crate) fn reset_run(&self) -> bool {
        self.update(|state| {
            let was_running = state.running;
            if was_running {
                state.abort_requested = true;
            }
            if let Some(active) = state.active.take() {
                active.token.cancel();
            }
            state.cancel_effect();
            state.running = false;
            state.phase = None;
            state.last_finish = None;
            state.last_finish_wall = None;
            was_running
        })
    }

    /// Claim the effect slot for a standalone flicker
    pub(crate) fn begin_effect(&self) -> Result<(u64, CancellationToken), Rejection> {
        self.update(|state| {
            if state.running || state.effect.is_some() {
                return Err(Rejection::AlreadyRunning);
            }
            let id = state.next_effect_id;
            state.next_effect_id += 1;
            let token = CancellationToken::new();
            state.effect = Some(ActiveEffect {
                id,
                token: token.clone(),
            });
            Ok((id, token))
        })
    }

    pub(crate) fn finish_effect(&self, id: u64) {
        self.update(|state| {
            if state.effect.as_ref().is_some_and(|e| e.id == id) {
                state.effect = None;
            }
        });
    }

    // ----- operator controls -----

    /// Forget the last finish time so the next trigger is admitted
    pub fn clear_cooldown(&self) {
        self.update(|state| {
            state.last_finish = None;
            state.last_finish_wall = None;
        });
    }

    /// Flip the auto-trigger switch, returning the new value
    pub fn toggle_auto_trigger(&self) -> bool {
        self.update(|state| {
            state.auto_trigger_enabled = !state.auto_trigger_enabled;
            state.auto_trigger_enabled
        })
    }

    pub fn auto_trigger_enabled(&self) -> bool {
        self.lock().auto_trigger_enabled
    }

    // ----- observations -----

    pub fn record_bus_message(&self, topic: &str, payload: &str) {
        self.update(|state| {
            state.last_bus_message = Some(BusMessage {
                topic: topic.to_string(),
                payload: payload.to_string(),
                received_at: Utc::now(),
            });
        });
    }

    pub fn set_bus_connected(&self, connected: bool) {
        self.update(|state| state.bus_connected = connected);
    }

    pub fn record_person_count(&self, count: u32) {
        self.update(|state| state.last_person_count = count);
    }

    /// Store a reported indicator state, returning the previous one
    pub fn record_indicator_state(&self, new_state: IndicatorState) -> Option<IndicatorState> {
        self.update(|state| {
            let previous = state.indicator_state.replace(new_state);
            state.indicator_last_update = Some(Utc::now());
            trace!(?previous, current = ?new_state, "Indicator state recorded");
            previous
        })
    }

    pub fn set_health(&self, indicator_online: bool, lighting_available: bool) {
        self.update(|state| {
            state.indicator_online = indicator_online;
            state.lighting_available = lighting_available;
        });
    }

    pub fn set_lighting_available(&self, available: bool) {
        self.update(|state| state.lighting_available = available);
    }

    // ----- visitor counter -----

    pub fn visitor_count(&self) -> u64 {
        self.lock().visitor_count
    }

    pub(crate) fn set_visitor_count(&self, count: u64) {
        self.update(|state| state.visitor_count = count);
    }

    pub(crate) fn add_visitors(&self, count: u64) -> u64 {
        self.update(|state| {
            state.visitor_count = state.visitor_count.saturating_add(count);
            state.visitor_count
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn test_initial_state() {
        let state = SharedRunState::new(WINDOW);
        let snapshot = state.snapshot();
        assert!(!snapshot.scenario_running);
        assert_eq!(snapshot.scenario_state, ScenarioState::Waiting);
        assert_eq!(snapshot.total_triggers, 0);
        assert!(snapshot.auto_trigger_enabled);
        assert_eq!(state.check_admission(), Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_run_claims_slot() {
        let state = SharedRunState::new(WINDOW);
        let (id, _token) = state.begin_run(TriggerSource::Manual).unwrap();
        assert_eq!(id, RunId(1));
        assert!(state.is_running());
        assert_eq!(
            state.begin_run(TriggerSource::Camera).unwrap_err(),
            Rejection::AlreadyRunning
        );
        assert_eq!(state.snapshot().total_triggers, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_beats_cooldown() {
        let state = SharedRunState::new(WINDOW);
        let (first, _) = state.begin_run(TriggerSource::Manual).unwrap();
        assert!(state.finish_run(first, RunOutcome::Completed));
        assert!(state.cooldown_remaining() > Duration::ZERO);

        // Simulate a run admitted before the cooldown existed
        state.clear_cooldown();
        let (_second, _) = state.begin_run(TriggerSource::Manual).unwrap();
        state.update(|s| s.last_finish = Some(now()));
        assert_eq!(state.check_admission(), Err(Rejection::AlreadyRunning));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_run_starts_cooldown() {
        let state = SharedRunState::new(WINDOW);
        let (id, _) = state.begin_run(TriggerSource::Camera).unwrap();
        assert!(state.finish_run(id, RunOutcome::Completed));

        let snapshot = state.snapshot();
        assert!(!snapshot.scenario_running);
        assert_eq!(snapshot.scenario_state, ScenarioState::Cooldown);
        assert_eq!(snapshot.cooldown_remaining, 30.0);
        assert!(snapshot.last_trigger_time.is_some());
        assert_eq!(
            state.check_admission(),
            Err(Rejection::CooldownActive { remaining: WINDOW })
        );

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(state.check_admission(), Ok(()));
        assert_eq!(state.snapshot().scenario_state, ScenarioState::Waiting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_run_leaves_no_cooldown() {
        let state = SharedRunState::new(WINDOW);
        let (id, _) = state.begin_run(TriggerSource::Manual).unwrap();
        assert!(state.finish_run(id, RunOutcome::Aborted));
        assert_eq!(state.cooldown_remaining(), Duration::ZERO);
        assert_eq!(state.snapshot().last_outcome, Some(RunOutcome::Aborted));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_and_releases_slot() {
        let state = SharedRunState::new(WINDOW);
        let (id, token) = state.begin_run(TriggerSource::Manual).unwrap();

        assert!(state.reset_run());
        assert!(token.is_cancelled());
        let snapshot = state.snapshot();
        assert!(!snapshot.scenario_running);
        assert!(snapshot.abort_requested);

        // The unwinding run no longer owns the slot
        assert!(!state.enter_phase(id, RunPhase::Flicker));
        assert!(!state.finish_run(id, RunOutcome::Aborted));
        let snapshot = state.snapshot();
        assert!(!snapshot.abort_requested);
        assert_eq!(snapshot.last_outcome, Some(RunOutcome::Aborted));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_run_cannot_touch_newer_run() {
        let state = SharedRunState::new(WINDOW);
        let (old, _) = state.begin_run(TriggerSource::Manual).unwrap();
        state.reset_run();
        let (new, _) = state.begin_run(TriggerSource::Camera).unwrap();
        assert!(state.enter_phase(new, RunPhase::IndicatorAlert));

        assert!(!state.finish_run(old, RunOutcome::Completed));
        let snapshot = state.snapshot();
        assert!(snapshot.scenario_running);
        assert_eq!(snapshot.phase, Some(RunPhase::IndicatorAlert));
        assert_eq!(snapshot.last_outcome, None);
        assert_eq!(state.cooldown_remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_when_idle() {
        let state = SharedRunState::new(WINDOW);
        let (id, _) = state.begin_run(TriggerSource::Manual).unwrap();
        state.finish_run(id, RunOutcome::Completed);

        assert!(!state.reset_run());
        let snapshot = state.snapshot();
        assert!(!snapshot.scenario_running);
        assert!(!snapshot.abort_requested);
        assert_eq!(snapshot.cooldown_remaining, 0.0);
        assert_eq!(state.check_admission(), Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_uses_raw_cooldown() {
        let state = SharedRunState::new(WINDOW);
        let (id, _) = state.begin_run(TriggerSource::Manual).unwrap();
        state.finish_run(id, RunOutcome::Completed);

        tokio::time::advance(WINDOW - Duration::from_millis(20)).await;
        let snapshot = state.snapshot();
        assert_eq!(snapshot.cooldown_remaining, 0.0);
        assert_eq!(snapshot.scenario_state, ScenarioState::Cooldown);
        assert!(matches!(
            state.check_admission(),
            Err(Rejection::CooldownActive { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_publish() {
        let state = SharedRunState::new(WINDOW);
        let mut rx = state.publisher().subscribe();

        state.add_visitors(3);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().visitor_count, 3);

        assert!(!state.toggle_auto_trigger());
        assert!(!rx.borrow_and_update().auto_trigger_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_indicator_state_tracking() {
        let state = SharedRunState::new(WINDOW);
        assert_eq!(state.record_indicator_state(IndicatorState::Rotating), None);
        assert_eq!(
            state.record_indicator_state(IndicatorState::Alert),
            Some(IndicatorState::Rotating)
        );
        assert!(state.snapshot().indicator_last_update.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cancels_effect() {
        let state = SharedRunState::new(WINDOW);
        let (_effect, effect_token) = state.begin_effect().unwrap();
        assert_eq!(state.begin_effect().unwrap_err(), Rejection::AlreadyRunning);

        state.begin_run(TriggerSource::Manual).unwrap();
        assert!(effect_token.is_cancelled());
        assert_eq!(state.begin_effect().unwrap_err(), Rejection::AlreadyRunning);
    }
}
