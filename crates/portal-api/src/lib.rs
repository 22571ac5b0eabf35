//! Portal controller REST and WebSocket API
//!
//! Thin axum layer over the scenario engine. Every JSON answer carries a
//! `status` of `"ok"` or `"error"`; errors come with a `message` and an HTTP
//! status that tells the caller what to do (409 busy, 429 cooling down, 503
//! device unavailable, 400 bad input).

mod websocket;

pub use websocket::{IncomingMessage, OutgoingMessage};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use portal_core::{Admission, IndicatorState, Rejection, StatusSnapshot, TriggerSource};
use portal_scenario::{ControlError, IndicatorCommand, ScenarioEngine, VisitorCounter};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: ScenarioEngine,
    pub visitors: VisitorCounter,
}

/// Plain status + message answer
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub status: &'static str,
    pub message: String,
}

impl ApiMessage {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: "ok",
            message: message.into(),
        })
    }
}

/// Status + payload answer
#[derive(Debug, Serialize)]
pub struct ApiData<T> {
    pub status: &'static str,
    pub data: T,
}

/// Indicator state as read from the device
#[derive(Debug, Serialize)]
pub struct IndicatorStateView {
    pub state: i64,
    /// `None` when the device reports a code outside the protocol
    pub name: Option<IndicatorState>,
}

#[derive(Debug, Serialize)]
pub struct AutoTriggerResponse {
    pub status: &'static str,
    pub auto_trigger_enabled: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct VisitorResponse {
    pub status: &'static str,
    pub visitor_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

type ApiError = (StatusCode, Json<ApiMessage>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ApiMessage {
            status: "error",
            message: message.into(),
        }),
    )
}

fn rejection_error(rejection: Rejection) -> ApiError {
    let status = match rejection {
        Rejection::AlreadyRunning => StatusCode::CONFLICT,
        Rejection::CooldownActive { .. } => StatusCode::TOO_MANY_REQUESTS,
    };
    api_error(status, rejection.to_string())
}

fn control_error(error: ControlError) -> ApiError {
    match error {
        ControlError::LightingNotConfigured | ControlError::LightingUnavailable => {
            api_error(StatusCode::SERVICE_UNAVAILABLE, error.to_string())
        }
        ControlError::Rejected(rejection) => rejection_error(rejection),
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/websocket", get(websocket::ws_handler))
        .route("/api/health", get(health_check))
        .route("/api/status", get(get_status))
        // Scenario
        .route("/api/trigger-scenario", post(trigger_scenario))
        .route("/api/scenario/reset", post(reset_scenario))
        .route("/api/reset-cooldown", post(reset_cooldown))
        .route("/api/auto-trigger/toggle", post(toggle_auto_trigger))
        // Indicator
        .route("/api/indicator/state", get(indicator_state))
        .route("/api/indicator/alert", post(indicator_alert))
        .route("/api/indicator/acknowledge", post(indicator_acknowledge))
        .route("/api/indicator/reset", post(indicator_reset))
        // Lighting
        .route("/api/lighting/lights-off", post(lights_off))
        .route("/api/lighting/lights-on", post(lights_on))
        .route("/api/lighting/flicker", post(flicker))
        // Visitors
        .route("/api/visitors", get(get_visitors))
        .route("/api/visitors/add", post(add_visitors))
        .route("/api/visitors/reset", post(reset_visitors))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the API server, stopping when `shutdown` resolves
pub async fn start_server<F>(state: AppState, addr: &str, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

// ==================== Handlers ====================

/// GET /api/health
async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/status - Probes the devices, then returns the snapshot
async fn get_status(State(state): State<AppState>) -> Json<ApiData<StatusSnapshot>> {
    let snapshot = state.engine.refresh_health().await;
    Json(ApiData {
        status: "ok",
        data: snapshot,
    })
}

/// POST /api/trigger-scenario - Manual trigger
async fn trigger_scenario(State(state): State<AppState>) -> ApiResult<ApiMessage> {
    info!("Manual trigger requested");
    match state.engine.trigger_with_alert(TriggerSource::Manual).await {
        Admission::Admitted(_) => Ok(ApiMessage::ok("Scenario triggered manually")),
        Admission::Rejected(rejection) => Err(rejection_error(rejection)),
    }
}

/// POST /api/scenario/reset - Stop any run and clear the cooldown
async fn reset_scenario(State(state): State<AppState>) -> Json<ApiMessage> {
    if state.engine.reset().await {
        ApiMessage::ok("Scenario stopped and reset")
    } else {
        ApiMessage::ok("Scenario reset")
    }
}

/// POST /api/reset-cooldown
async fn reset_cooldown(State(state): State<AppState>) -> Json<ApiMessage> {
    state.engine.state().clear_cooldown();
    info!("Cooldown cleared");
    ApiMessage::ok("Cooldown timer reset")
}

/// POST /api/auto-trigger/toggle
async fn toggle_auto_trigger(State(state): State<AppState>) -> Json<AutoTriggerResponse> {
    let enabled = state.engine.state().toggle_auto_trigger();
    let label = if enabled { "enabled" } else { "disabled" };
    info!("Auto-trigger {}", label);
    Json(AutoTriggerResponse {
        status: "ok",
        auto_trigger_enabled: enabled,
        message: format!("Auto-trigger {}", label),
    })
}

/// GET /api/indicator/state
async fn indicator_state(State(state): State<AppState>) -> ApiResult<ApiData<IndicatorStateView>> {
    match state.engine.indicator_state().await {
        Some(report) => Ok(Json(ApiData {
            status: "ok",
            data: IndicatorStateView {
                state: report.state,
                name: report.parsed().ok(),
            },
        })),
        None => Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Failed to get indicator state",
        )),
    }
}

async fn indicator_command(
    state: &AppState,
    command: IndicatorCommand,
    done: &str,
    failed: &str,
) -> ApiResult<ApiMessage> {
    if state.engine.indicator_command(command).await {
        Ok(ApiMessage::ok(done))
    } else {
        Err(api_error(StatusCode::SERVICE_UNAVAILABLE, failed))
    }
}

/// POST /api/indicator/alert
async fn indicator_alert(State(state): State<AppState>) -> ApiResult<ApiMessage> {
    indicator_command(
        &state,
        IndicatorCommand::Alert,
        "Indicator alert triggered",
        "Failed to trigger indicator alert",
    )
    .await
}

/// POST /api/indicator/acknowledge
async fn indicator_acknowledge(State(state): State<AppState>) -> ApiResult<ApiMessage> {
    indicator_command(
        &state,
        IndicatorCommand::Acknowledge,
        "Indicator acknowledge triggered",
        "Failed to trigger indicator acknowledge",
    )
    .await
}

/// POST /api/indicator/reset
async fn indicator_reset(State(state): State<AppState>) -> ApiResult<ApiMessage> {
    indicator_command(
        &state,
        IndicatorCommand::Reset,
        "Indicator reset to rotating state",
        "Failed to reset indicator",
    )
    .await
}

/// POST /api/lighting/lights-off
async fn lights_off(State(state): State<AppState>) -> ApiResult<ApiMessage> {
    match state.engine.lights_off().await {
        Ok(true) => Ok(ApiMessage::ok("Lights turned off")),
        Ok(false) => Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Lighting controller did not accept the command",
        )),
        Err(e) => Err(control_error(e)),
    }
}

/// POST /api/lighting/lights-on
async fn lights_on(State(state): State<AppState>) -> ApiResult<ApiMessage> {
    match state.engine.lights_on().await {
        Ok(true) => Ok(ApiMessage::ok("Lights turned on")),
        Ok(false) => Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Lighting controller did not accept the command",
        )),
        Err(e) => Err(control_error(e)),
    }
}

/// POST /api/lighting/flicker - Runs in the background
async fn flicker(State(state): State<AppState>) -> ApiResult<ApiMessage> {
    state.engine.start_flicker().await.map_err(control_error)?;
    Ok(ApiMessage::ok("Flicker effect started"))
}

/// GET /api/visitors
async fn get_visitors(State(state): State<AppState>) -> Json<VisitorResponse> {
    Json(VisitorResponse {
        status: "ok",
        visitor_count: state.visitors.count(),
        added: None,
        message: None,
    })
}

/// POST /api/visitors/add - Body `{"count": n}`, count defaults to 1
async fn add_visitors(
    State(state): State<AppState>,
    body: Option<Json<Value>>,
) -> ApiResult<VisitorResponse> {
    let count = match body.as_ref().and_then(|Json(v)| v.get("count")) {
        None => 1,
        Some(value) => value.as_i64().ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                "Count must be an integer between 1 and 100",
            )
        })?,
    };

    let total = state
        .visitors
        .add(count)
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    Ok(Json(VisitorResponse {
        status: "ok",
        visitor_count: total,
        added: Some(count),
        message: None,
    }))
}

/// POST /api/visitors/reset
async fn reset_visitors(State(state): State<AppState>) -> Json<VisitorResponse> {
    state.visitors.reset().await;
    Json(VisitorResponse {
        status: "ok",
        visitor_count: 0,
        added: None,
        message: Some("Visitor count reset".to_string()),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{header, Request};
    use portal_devices::LightingActuator;
    use portal_scenario::testing::{CallLog, DeviceCall, FakeIndicator, FakeLighting};
    use portal_scenario::ScenarioSettings;
    use portal_storage::MemoryCounterStore;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    pub(crate) fn test_state(with_lighting: bool) -> (AppState, CallLog) {
        let log = CallLog::new();
        let lighting = with_lighting.then(|| {
            Arc::new(FakeLighting::with_log(log.clone(), true)) as Arc<dyn LightingActuator>
        });
        let engine = ScenarioEngine::new(
            ScenarioSettings {
                flicker_rounds: 1,
                degraded_wait: Duration::from_secs(5),
                ..ScenarioSettings::default()
            },
            Arc::new(FakeIndicator::with_log(log.clone())),
            lighting,
        );
        let visitors = VisitorCounter::new(
            engine.state().clone(),
            Arc::new(MemoryCounterStore::new(0)),
        );
        (AppState { engine, visitors }, log)
    }

    fn post(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn call(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health_check() {
        let (state, _) = test_state(false);
        let response = create_router(state).oneshot(get("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status() {
        let (state, _) = test_state(true);
        let (status, json) = call(&state, get("/api/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["data"]["scenario_running"], false);
        assert_eq!(json["data"]["indicator_online"], true);
        assert_eq!(json["data"]["lighting_available"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_conflict_and_cooldown() {
        let (state, _) = test_state(false);

        let (status, json) = call(&state, post("/api/trigger-scenario")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Scenario triggered manually");

        let (status, json) = call(&state, post("/api/trigger-scenario")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Scenario is already running");

        let mut rx = state.engine.subscribe();
        rx.wait_for(|s| !s.scenario_running).await.unwrap();

        let (status, json) = call(&state, post("/api/trigger-scenario")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json["message"], "Cooldown active. Wait 30.0s");

        let (status, _) = call(&state, post("/api/reset-cooldown")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&state, post("/api/trigger-scenario")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_messages() {
        let (state, _) = test_state(false);
        let (_, json) = call(&state, post("/api/scenario/reset")).await;
        assert_eq!(json["message"], "Scenario reset");

        call(&state, post("/api/trigger-scenario")).await;
        let (status, json) = call(&state, post("/api/scenario/reset")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Scenario stopped and reset");
        assert!(!state.engine.snapshot().scenario_running);
    }

    #[tokio::test]
    async fn test_toggle_auto_trigger() {
        let (state, _) = test_state(false);
        let (_, json) = call(&state, post("/api/auto-trigger/toggle")).await;
        assert_eq!(json["auto_trigger_enabled"], false);
        assert_eq!(json["message"], "Auto-trigger disabled");
        let (_, json) = call(&state, post("/api/auto-trigger/toggle")).await;
        assert_eq!(json["auto_trigger_enabled"], true);
    }

    #[tokio::test]
    async fn test_indicator_routes() {
        let (state, log) = test_state(false);
        let (status, _) = call(&state, post("/api/indicator/alert")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = call(&state, get("/api/indicator/state")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["state"], 2);
        assert_eq!(json["data"]["name"], "alert");

        let (status, _) = call(&state, post("/api/indicator/reset")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            log.calls(),
            vec![DeviceCall::IndicatorAlert, DeviceCall::IndicatorReset]
        );
    }

    #[tokio::test]
    async fn test_lighting_not_configured() {
        let (state, _) = test_state(false);
        for uri in [
            "/api/lighting/lights-off",
            "/api/lighting/lights-on",
            "/api/lighting/flicker",
        ] {
            let (status, json) = call(&state, post(uri)).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
            assert_eq!(json["message"], "Lighting is not configured");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lighting_routes() {
        let (state, log) = test_state(true);
        let (status, _) = call(&state, post("/api/lighting/lights-off")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            log.calls(),
            vec![DeviceCall::Preset("scene.halloween_av".into())]
        );

        let (status, _) = call(&state, post("/api/lighting/flicker")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&state, post("/api/lighting/flicker")).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_flicker_with_lighting_down() {
        let (state, _) = test_state(true);
        let lighting = Arc::new(FakeLighting::new(false));
        let engine = ScenarioEngine::new(
            state.engine.settings().clone(),
            Arc::new(FakeIndicator::new()),
            Some(lighting.clone() as Arc<dyn LightingActuator>),
        );
        let state = AppState { engine, ..state };

        let (status, json) = call(&state, post("/api/lighting/flicker")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["message"], "Lighting is unavailable");
        assert!(lighting.calls().is_empty());
    }

    #[tokio::test]
    async fn test_visitors() {
        let (state, _) = test_state(false);

        let (status, json) = call(&state, post("/api/visitors/add")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["visitor_count"], 1);
        assert_eq!(json["added"], 1);

        let (_, json) = call(&state, post_json("/api/visitors/add", r#"{"count": 4}"#)).await;
        assert_eq!(json["visitor_count"], 5);

        let (status, _) = call(&state, post_json("/api/visitors/add", r#"{"count": 0}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&state, post_json("/api/visitors/add", r#"{"count": "x"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&state, post_json("/api/visitors/add", r#"{"count": 101}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, json) = call(&state, get("/api/visitors")).await;
        assert_eq!(json["visitor_count"], 5);

        let (_, json) = call(&state, post("/api/visitors/reset")).await;
        assert_eq!(json["visitor_count"], 0);
        assert_eq!(state.engine.snapshot().visitor_count, 0);
    }
}
