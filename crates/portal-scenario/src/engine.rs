//! Scenario engine
//!
//! Admits runs, drives the choreography on a background task, and handles
//! the reset path. Collaborators are fixed at construction.
//!
//! A run goes through these phases in order:
//!
//! 1. indicator alert
//! 2. with lighting: scene off, flicker rounds, scene on
//!    without lighting: one degraded-mode wait
//! 3. indicator reset
//!
//! The run's cancellation token is checked between phases and raced against
//! every timed hold. A run that sees it cancelled ends as `Aborted` and does
//! not start the cooldown.

use portal_core::{
    Admission, IndicatorState, Rejection, RunId, RunOutcome, RunPhase, StatusSnapshot,
    TriggerSource,
};
use portal_devices::{IndicatorActuator, IndicatorReport, LightingActuator};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::flicker::run_flicker;
use crate::state::SharedRunState;
use crate::wait::hold;

/// Errors from direct device controls
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("Lighting is not configured")]
    LightingNotConfigured,

    #[error("Lighting is unavailable")]
    LightingUnavailable,

    #[error("{0}")]
    Rejected(Rejection),
}

/// Timing and entity names used by a run
#[derive(Debug, Clone)]
pub struct ScenarioSettings {
    pub cooldown: Duration,
    pub flicker_rounds: u32,
    /// Hold used instead of the lighting phases when lighting is down
    pub degraded_wait: Duration,
    pub flicker_light: String,
    pub scene_off: String,
    pub scene_on: String,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(30),
            flicker_rounds: 3,
            degraded_wait: Duration::from_secs(30),
            flicker_light: "light.ytterbelysning_entre".to_string(),
            scene_off: "scene.halloween_av".to_string(),
            scene_on: "scene.halloween_pa".to_string(),
        }
    }
}

/// Indicator commands available to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorCommand {
    Alert,
    Acknowledge,
    Reset,
}

impl IndicatorCommand {
    fn resulting_state(self) -> IndicatorState {
        match self {
            IndicatorCommand::Alert => IndicatorState::Alert,
            IndicatorCommand::Acknowledge => IndicatorState::Acknowledge,
            IndicatorCommand::Reset => IndicatorState::Rotating,
        }
    }
}

struct EngineInner {
    state: SharedRunState,
    indicator: Arc<dyn IndicatorActuator>,
    lighting: Option<Arc<dyn LightingActuator>>,
    settings: ScenarioSettings,
}

/// Handle to the scenario engine; cheap to clone
#[derive(Clone)]
pub struct ScenarioEngine {
    inner: Arc<EngineInner>,
}

impl ScenarioEngine {
    /// Build an engine with fresh run state
    ///
    /// `lighting` is `None` when no lighting controller is configured; runs
    /// then always take the degraded branch.
    pub fn new(
        settings: ScenarioSettings,
        indicator: Arc<dyn IndicatorActuator>,
        lighting: Option<Arc<dyn LightingActuator>>,
    ) -> Self {
        let state = SharedRunState::new(settings.cooldown);
        Self {
            inner: Arc::new(EngineInner {
                state,
                indicator,
                lighting,
                settings,
            }),
        }
    }

    pub fn state(&self) -> &SharedRunState {
        &self.inner.state
    }

    pub fn settings(&self) -> &ScenarioSettings {
        &self.inner.settings
    }

    pub fn indicator(&self) -> &Arc<dyn IndicatorActuator> {
        &self.inner.indicator
    }

    pub fn lighting(&self) -> Option<&Arc<dyn LightingActuator>> {
        self.inner.lighting.as_ref()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.inner.state.publisher().subscribe()
    }

    /// Admission verdict without claiming the run slot
    pub fn check_admission(&self) -> Result<(), Rejection> {
        self.inner.state.check_admission()
    }

    /// Admit a run and start it in the background
    ///
    /// Never blocks on the run. A rejected trigger is dropped, not queued.
    pub fn admit(&self, source: TriggerSource) -> Admission {
        match self.inner.state.begin_run(source) {
            Ok((id, token)) => {
                info!(run = %id, %source, "Scenario admitted");
                let engine = self.clone();
                tokio::spawn(async move {
                    engine.execute(id, token).await;
                });
                Admission::Admitted(id)
            }
            Err(rejection) => {
                info!(%source, reason = %rejection, "Trigger rejected");
                Admission::Rejected(rejection)
            }
        }
    }

    /// Put the indicator in alert, then admit
    ///
    /// Used by triggers that should show the alert themselves. The
    /// pre-check keeps a rejected trigger from leaving the indicator red.
    pub async fn trigger_with_alert(&self, source: TriggerSource) -> Admission {
        if let Err(rejection) = self.check_admission() {
            info!(%source, reason = %rejection, "Trigger rejected");
            return Admission::Rejected(rejection);
        }
        self.inner.indicator.alert().await;
        self.admit(source)
    }

    /// Stop any run, clear the cooldown, and put the devices back to idle
    ///
    /// Returns at once without waiting for the run task. Until that task
    /// notices its cancelled token it may still finish one in-flight device
    /// call; it can no longer change the run state.
    #[instrument(skip(self))]
    pub async fn reset(&self) -> bool {
        let was_running = self.inner.state.reset_run();
        if was_running {
            info!("Scenario aborted by reset");
        } else {
            info!("Reset with no active scenario");
        }

        self.inner.indicator.reset().await;
        if let Some(lighting) = &self.inner.lighting {
            lighting.activate_preset(&self.inner.settings.scene_on).await;
        }
        was_running
    }

    async fn execute(&self, id: RunId, token: CancellationToken) {
        let outcome = self.run_sequence(id, &token).await;
        let owned = self.inner.state.finish_run(id, outcome);
        match (outcome, owned) {
            (RunOutcome::Completed, true) => info!(run = %id, "Scenario completed"),
            (RunOutcome::Aborted, _) => info!(run = %id, "Scenario aborted"),
            (RunOutcome::Completed, false) => {
                debug!(run = %id, "Run finished after losing its slot")
            }
        }
    }

    fn enter(&self, id: RunId, phase: RunPhase) {
        if self.inner.state.enter_phase(id, phase) {
            info!(run = %id, ?phase, "Scenario phase");
        }
    }

    async fn run_sequence(&self, id: RunId, token: &CancellationToken) -> RunOutcome {
        let settings = &self.inner.settings;

        self.enter(id, RunPhase::IndicatorAlert);
        self.inner.indicator.alert().await;
        if token.is_cancelled() {
            return RunOutcome::Aborted;
        }

        let lighting = tokio::select! {
            biased;
            _ = token.cancelled() => return RunOutcome::Aborted,
            lighting = self.healthy_lighting() => lighting,
        };
        if token.is_cancelled() {
            return RunOutcome::Aborted;
        }

        match lighting {
            Some(lighting) => {
                self.enter(id, RunPhase::LightsOff);
                lighting.activate_preset(&settings.scene_off).await;
                if token.is_cancelled() {
                    return RunOutcome::Aborted;
                }

                self.enter(id, RunPhase::Flicker);
                let flicker = run_flicker(
                    lighting.as_ref(),
                    &settings.flicker_light,
                    settings.flicker_rounds,
                    token,
                )
                .await;
                if flicker.is_aborted() || token.is_cancelled() {
                    return RunOutcome::Aborted;
                }

                self.enter(id, RunPhase::LightsOn);
                lighting.activate_preset(&settings.scene_on).await;
            }
            None => {
                self.enter(id, RunPhase::DegradedWait);
                if hold(settings.degraded_wait, token).await.is_aborted() {
                    return RunOutcome::Aborted;
                }
            }
        }

        if token.is_cancelled() {
            return RunOutcome::Aborted;
        }
        self.enter(id, RunPhase::IndicatorReset);
        self.inner.indicator.reset().await;
        RunOutcome::Completed
    }

    /// The lighting controller, if configured and answering
    async fn healthy_lighting(&self) -> Option<Arc<dyn LightingActuator>> {
        let lighting = self.inner.lighting.as_ref()?;
        let healthy = lighting.health_check().await;
        self.inner.state.set_lighting_available(healthy);
        if healthy {
            Some(Arc::clone(lighting))
        } else {
            warn!("Lighting unavailable, running indicator-only scenario");
            None
        }
    }

    // ----- direct controls -----

    /// Send a command to the indicator, recording the new state on success
    pub async fn indicator_command(&self, command: IndicatorCommand) -> bool {
        let ok = match command {
            IndicatorCommand::Alert => self.inner.indicator.alert().await,
            IndicatorCommand::Acknowledge => self.inner.indicator.acknowledge().await,
            IndicatorCommand::Reset => self.inner.indicator.reset().await,
        };
        if ok {
            self.inner
                .state
                .record_indicator_state(command.resulting_state());
        }
        ok
    }

    pub async fn indicator_state(&self) -> Option<IndicatorReport> {
        self.inner.indicator.get_state().await
    }

    pub async fn lights_off(&self) -> Result<bool, ControlError> {
        let lighting = self.require_lighting()?;
        Ok(lighting.activate_preset(&self.inner.settings.scene_off).await)
    }

    pub async fn lights_on(&self) -> Result<bool, ControlError> {
        let lighting = self.require_lighting()?;
        Ok(lighting.activate_preset(&self.inner.settings.scene_on).await)
    }

    /// Play the flicker rounds on their own, in the background
    ///
    /// Refused when the lighting controller does not answer, or while a run
    /// or another flicker is active. A run admitted later, or a reset,
    /// cancels it.
    pub async fn start_flicker(&self) -> Result<(), ControlError> {
        let lighting = Arc::clone(self.require_lighting()?);
        let healthy = lighting.health_check().await;
        self.inner.state.set_lighting_available(healthy);
        if !healthy {
            warn!("Lighting unavailable, flicker not started");
            return Err(ControlError::LightingUnavailable);
        }
        let (effect_id, token) = self
            .inner
            .state
            .begin_effect()
            .map_err(ControlError::Rejected)?;

        info!("Standalone flicker started");
        let engine = self.clone();
        tokio::spawn(async move {
            let settings = &engine.inner.settings;
            let result = run_flicker(
                lighting.as_ref(),
                &settings.flicker_light,
                settings.flicker_rounds,
                &token,
            )
            .await;
            engine.inner.state.finish_effect(effect_id);
            debug!(aborted = result.is_aborted(), "Standalone flicker finished");
        });
        Ok(())
    }

    fn require_lighting(&self) -> Result<&Arc<dyn LightingActuator>, ControlError> {
        self.inner
            .lighting
            .as_ref()
            .ok_or(ControlError::LightingNotConfigured)
    }

    // ----- health and startup -----

    /// Probe both devices outside the lock, then publish the result
    pub async fn refresh_health(&self) -> StatusSnapshot {
        let indicator = self.inner.indicator.is_reachable();
        let lighting = async {
            match &self.inner.lighting {
                Some(lighting) => lighting.health_check().await,
                None => false,
            }
        };
        let (indicator_online, lighting_available) = tokio::join!(indicator, lighting);
        debug!(indicator_online, lighting_available, "Health refreshed");
        self.inner
            .state
            .set_health(indicator_online, lighting_available);
        self.inner.state.snapshot()
    }

    /// Bring the devices to their idle look at startup
    pub async fn apply_initial_state(&self) {
        if let Some(lighting) = &self.inner.lighting {
            if !lighting.activate_preset(&self.inner.settings.scene_on).await {
                warn!("Could not set initial lighting preset");
            }
        }
        if self.inner.indicator.reset().await {
            self.inner
                .state
                .record_indicator_state(IndicatorState::Rotating);
        } else {
            warn!("Could not reset indicator at startup");
        }
        self.refresh_health().await;
    }
}

impl std::fmt::Debug for ScenarioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioEngine")
            .field("settings", &self.inner.settings)
            .field("lighting", &self.inner.lighting.is_some())
            .finish_non_exhaustive()
    }
}
