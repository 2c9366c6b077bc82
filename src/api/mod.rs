//! HTTP surface: health, task CRUD, the approval endpoint, and the alert
//! webhook.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::alert::{alert_webhook, Aggregator};
use crate::llm::{ChatMessage, LlmClient, Role};
use crate::skill::SkillRegistry;
use crate::store::{StoreError, TaskStore};
use crate::task::{DiagnosisTask, DiagnosisTaskSpec, TaskKey};
use crate::tools::ToolRouter;

/// Shared application state.
pub struct AppState {
    pub store: Arc<dyn TaskStore>,
    pub aggregator: Arc<Aggregator>,
    pub skills: Arc<SkillRegistry>,
    pub tools: Arc<ToolRouter>,
    /// Enables the connectivity ping endpoint when present.
    pub llm: Option<Arc<dyn LlmClient>>,
    /// Namespace used when a create request does not name one.
    pub default_namespace: String,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/v1/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/v1/tasks/:namespace/:name",
            get(get_task).delete(delete_task),
        )
        .route("/api/v1/tasks/:namespace/:name/approve", post(approve_task))
        .route("/api/v1/alerts/webhook", post(alert_webhook))
        .route("/api/v1/skills", get(list_skills))
        .route("/api/v1/config/tools", get(list_tools))
        .route("/api/v1/llm/ping", post(ping_llm))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until `shutdown` fires.
pub async fn serve(
    host: &str,
    port: u16,
    state: Arc<AppState>,
    shutdown: tokio_util::sync::CancellationToken,
) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    tracing::info!(%addr, "starting http server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

#[derive(Debug, Default, Deserialize)]
struct ListTasksParams {
    #[serde(default)]
    namespace: Option<String>,
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTasksParams>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let mut tasks = state.store.list().await.map_err(store_error)?;
    if let Some(namespace) = &params.namespace {
        tasks.retain(|t| &t.metadata.namespace == namespace);
    }
    Ok(Json(json!({
        "total": tasks.len(),
        "items": tasks,
    })))
}

async fn list_skills(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let skills: Vec<serde_json::Value> = state
        .skills
        .list()
        .into_iter()
        .map(|s| {
            json!({
                "name": s.name,
                "description": s.description,
                "allowed_tools": s.allowed_tools,
            })
        })
        .collect();
    Json(json!({"skills": skills}))
}

async fn list_tools(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let tools: Vec<serde_json::Value> = state
        .tools
        .list_tools()
        .await
        .into_iter()
        .map(|t| {
            json!({
                "name": t.name(),
                "description": t.description(),
                "safety_class": t.safety_class(),
            })
        })
        .collect();
    Json(json!({"tools": tools}))
}

/// Connectivity check against the configured chat provider.
async fn ping_llm(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let Some(llm) = &state.llm else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "no chat provider configured".to_string(),
        ));
    };

    let probe = [ChatMessage::new(Role::User, "Reply with the single word: pong")];
    match llm.chat(&probe, &[]).await {
        Ok(reply) => Ok(Json(json!({
            "status": "ok",
            "reply": reply.text_content().unwrap_or_default(),
        }))),
        Err(e) => Err((StatusCode::BAD_GATEWAY, e.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct CreateTaskRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    spec: DiagnosisTaskSpec,
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<DiagnosisTask>), (StatusCode, String)> {
    let namespace = req
        .namespace
        .unwrap_or_else(|| state.default_namespace.clone());
    let name = req.name.unwrap_or_else(|| {
        format!("task-{}", &Uuid::new_v4().to_string()[..8])
    });

    let created = state
        .store
        .create(DiagnosisTask::new(namespace, name, req.spec))
        .await
        .map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<DiagnosisTask>, (StatusCode, String)> {
    let key = TaskKey::new(namespace, name);
    match state.store.get(&key).await.map_err(store_error)? {
        Some(task) => Ok(Json(task)),
        None => Err((StatusCode::NOT_FOUND, format!("task {key} not found"))),
    }
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, String)> {
    let key = TaskKey::new(namespace, name);
    state.store.delete(&key).await.map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Flip `spec.approved`, releasing a task parked in `WaitingApproval`.
/// Retries once on a concurrent spec write.
async fn approve_task(
    State(state): State<Arc<AppState>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<DiagnosisTask>, (StatusCode, String)> {
    let key = TaskKey::new(namespace, name);
    for _ in 0..2 {
        let Some(mut task) = state.store.get(&key).await.map_err(store_error)? else {
            return Err((StatusCode::NOT_FOUND, format!("task {key} not found")));
        };
        task.spec.approved = true;
        match state.store.update_spec(task).await {
            Ok(updated) => return Ok(Json(updated)),
            Err(StoreError::Conflict(_)) => continue,
            Err(e) => return Err(store_error(e)),
        }
    }
    Err((
        StatusCode::CONFLICT,
        format!("task {key} kept changing; retry the approval"),
    ))
}

fn store_error(e: StoreError) -> (StatusCode, String) {
    let status = match e {
        StoreError::AlreadyExists(_) | StoreError::Conflict(_) => StatusCode::CONFLICT,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
    };
    (status, e.to_string())
}
