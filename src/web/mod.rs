//! HTTP surface (§4.8): status, start/stop, and config CRUD endpoints;
//! static-asset serving with ingress-prefix rewriting; log retrieval.

mod ingress;

use crate::config::Config;
use crate::dynconfig::{ConfigStore, DataManagerConfig, GeneralConfig, InverterConfig, ManualConfig, StaticScheduleConfig};
use crate::logging::log_file_path_for_date;
use crate::supervisor::Supervisor;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, get_service};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<ConfigStore>>,
    pub supervisor: Arc<Mutex<Supervisor>>,
    pub logging_directory: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    msg: String,
}

fn error_response(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorBody { status: "error", msg: msg.into() })).into_response()
}

fn crate_error_response(err: crate::error::FusewattError) -> Response {
    match err {
        crate::error::FusewattError::Validation { .. } => error_response(StatusCode::BAD_REQUEST, err.to_string()),
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let supervisor = state.supervisor.lock().await;
    Json(supervisor.status())
}

#[derive(Debug, Deserialize)]
struct RunBody {
    running: bool,
}

async fn post_run(State(state): State<AppState>, Json(body): Json<RunBody>) -> Response {
    let mut supervisor = state.supervisor.lock().await;
    match supervisor.set_running(body.running).await {
        Ok(()) => Json(serde_json::json!({"status": "ok"})).into_response(),
        Err(e) => crate_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct LogBody {
    date: String,
}

async fn post_log(State(state): State<AppState>, Json(body): Json<LogBody>) -> Response {
    let path = log_file_path_for_date(&state.logging_directory, &body.date);
    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => Json(serde_json::json!({"status": "ok", "contents": contents})).into_response(),
        Err(_) => Json(serde_json::json!({"status": "not present"})).into_response(),
    }
}

async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.lock().await;
    Json(store.document().clone())
}

async fn get_general(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.lock().await;
    Json(store.general().clone())
}

async fn post_general(State(state): State<AppState>, Json(body): Json<GeneralConfig>) -> Response {
    let new_mode = body.mode;
    let mut store = state.store.lock().await;
    let previous_mode = store.general().mode;
    let result = store.set_general(body);
    drop(store);

    if let Err(e) = result {
        return crate_error_response(e);
    }

    if new_mode != previous_mode {
        let mut supervisor = state.supervisor.lock().await;
        if let Err(e) = supervisor.restart_for_mode_change().await {
            return crate_error_response(e);
        }
    }

    Json(serde_json::json!({"status": "ok"})).into_response()
}

async fn get_inverters(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.lock().await;
    Json(store.inverters().to_vec())
}

async fn post_inverters(State(state): State<AppState>, Json(body): Json<Vec<InverterConfig>>) -> Response {
    let mut store = state.store.lock().await;
    match store.set_inverters(body) {
        Ok(()) => Json(serde_json::json!({"status": "ok"})).into_response(),
        Err(e) => crate_error_response(e),
    }
}

async fn get_data_manager(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.lock().await;
    Json(store.data_manager().clone())
}

async fn post_data_manager(State(state): State<AppState>, Json(body): Json<DataManagerConfig>) -> Response {
    let mut store = state.store.lock().await;
    match store.set_data_manager(body) {
        Ok(()) => Json(serde_json::json!({"status": "ok"})).into_response(),
        Err(e) => crate_error_response(e),
    }
}

async fn get_mode_manual(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.lock().await;
    Json(store.mode_manual().clone())
}

async fn post_mode_manual(State(state): State<AppState>, Json(body): Json<ManualConfig>) -> Response {
    let mut store = state.store.lock().await;
    match store.set_mode_manual(body) {
        Ok(()) => Json(serde_json::json!({"status": "ok"})).into_response(),
        Err(e) => crate_error_response(e),
    }
}

async fn get_mode_static(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.lock().await;
    Json(store.mode_static().clone())
}

async fn post_mode_static(State(state): State<AppState>, Json(body): Json<StaticScheduleConfig>) -> Response {
    let mut store = state.store.lock().await;
    match store.set_mode_static(body) {
        Ok(()) => Json(serde_json::json!({"status": "ok"})).into_response(),
        Err(e) => crate_error_response(e),
    }
}

async fn get_mode_dynamic(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.lock().await;
    Json(store.mode_dynamic().clone())
}

async fn post_mode_dynamic(State(state): State<AppState>, Json(body): Json<serde_json::Value>) -> Response {
    let mut store = state.store.lock().await;
    match store.set_mode_dynamic(body) {
        Ok(()) => Json(serde_json::json!({"status": "ok"})).into_response(),
        Err(e) => crate_error_response(e),
    }
}

pub fn build_router(state: AppState, static_dir: &str) -> Router {
    Router::new()
        .route("/api/", get(get_status))
        .route("/api/run", axum::routing::post(post_run))
        .route("/api/log", axum::routing::post(post_log))
        .route("/config", get(get_config))
        .route("/config/general", get(get_general).post(post_general))
        .route("/config/inverters", get(get_inverters).post(post_inverters))
        .route("/config/data_manager", get(get_data_manager).post(post_data_manager))
        .route("/config/mode/manual", get(get_mode_manual).post(post_mode_manual))
        .route("/config/mode/static", get(get_mode_static).post(post_mode_static))
        .route("/config/mode/dynamic", get(get_mode_dynamic).post(post_mode_dynamic))
        .nest_service(
            "/",
            get_service(ServeDir::new(static_dir).append_index_html_on_directories(true))
                .handle_error(|_| async { StatusCode::INTERNAL_SERVER_ERROR }),
        )
        .with_state(state)
        .layer(axum::middleware::map_response(ingress::rewrite_ingress_prefix))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve the HTTP surface until the process is terminated.
pub async fn serve(state: AppState, config: &Config) -> anyhow::Result<()> {
    let logger = crate::logging::get_logger("web");
    let router = build_router(state, &config.web.static_dir);

    let addr: SocketAddr = match config.web.host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, config.web.port),
        Err(_) => {
            logger.warn(&format!("invalid host '{}'; falling back to 127.0.0.1", config.web.host));
            ([127, 0, 0, 1], config.web.port).into()
        }
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    logger.info(&format!("listening at http://{}:{}", addr.ip(), addr.port()));
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::tempdir;
    use tower::ServiceExt;

    async fn test_state() -> (AppState, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("fusewatt_config.json");
        let store = Arc::new(Mutex::new(ConfigStore::load_or_default(&config_path).unwrap()));
        let supervisor = Arc::new(Mutex::new(Supervisor::new(
            Arc::clone(&store),
            std::time::Duration::from_secs(1),
            std::time::Duration::from_secs(1),
        )));
        let state = AppState { store, supervisor, logging_directory: dir.path().to_string_lossy().to_string() };
        (state, dir)
    }

    #[tokio::test]
    async fn status_endpoint_reports_not_running_initially() {
        let (state, dir) = test_state().await;
        let router = build_router(state, &dir.path().to_string_lossy());
        let response = router
            .oneshot(Request::builder().uri("/api/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn post_config_general_then_get_round_trips() {
        let (state, dir) = test_state().await;
        let router = build_router(state, &dir.path().to_string_lossy());

        let body = serde_json::to_string(&GeneralConfig {
            mode: crate::dynconfig::Mode::Manual,
            autostart: true,
            debug: false,
            loop_delay_seconds: 7,
        })
        .unwrap();

        let post_response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/config/general")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(post_response.status(), StatusCode::OK);

        let get_response = router
            .oneshot(Request::builder().uri("/config/general").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(get_response.status(), StatusCode::OK);
        let bytes = http_body_util::BodyExt::collect(get_response.into_body()).await.unwrap().to_bytes();
        let parsed: GeneralConfig = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.loop_delay_seconds, 7);
        assert!(parsed.autostart);
    }

    #[tokio::test]
    async fn post_config_general_with_bad_loop_delay_is_400() {
        let (state, dir) = test_state().await;
        let router = build_router(state, &dir.path().to_string_lossy());

        let body = serde_json::to_string(&GeneralConfig {
            mode: crate::dynconfig::Mode::Idle,
            autostart: false,
            debug: false,
            loop_delay_seconds: 0,
        })
        .unwrap();

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/config/general")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_log_for_absent_date_reports_not_present() {
        let (state, dir) = test_state().await;
        let router = build_router(state, &dir.path().to_string_lossy());

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/log")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"date":"2026-01-01"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = http_body_util::BodyExt::collect(response.into_body()).await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["status"], "not present");
    }
}
