//! The HTTP surface: one workflow endpoint and the transcript downloads.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use staffer_agent::agents::export::EXPORT_SCOPE;
use staffer_agent::workflow::{WorkflowController, WorkflowRequest, WorkflowResult};
use staffer_core::TurnMessage;
use staffer_db::MetadataRepository;

#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<WorkflowController>,
    pub repository: Arc<dyn MetadataRepository>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("task must not be empty")]
    EmptyTask,
    #[error("not found")]
    NotFound,
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::EmptyTask => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct WorkflowBody {
    pub task: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Prior turns, oldest first; the active task is not among them.
    #[serde(default)]
    pub messages: Vec<TurnMessage>,
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/workflow", post(run_workflow))
        .route("/api/exports/{export_id}", get(download_export))
        .with_state(state)
}

async fn run_workflow(
    State(state): State<ApiState>,
    Json(body): Json<WorkflowBody>,
) -> Result<Json<WorkflowResult>, ApiError> {
    if body.task.trim().is_empty() {
        return Err(ApiError::EmptyTask);
    }

    info!(
        event_name = "api.workflow.request",
        conversation_id = body.conversation_id.as_deref().unwrap_or("none"),
    );

    let result = state
        .controller
        .run(WorkflowRequest {
            task: body.task,
            conversation_id: body.conversation_id,
            messages: body.messages,
            context: body.context,
        })
        .await;

    Ok(Json(result))
}

async fn download_export(
    State(state): State<ApiState>,
    Path(export_id): Path<String>,
) -> Result<Response, ApiError> {
    let stored = state
        .repository
        .get(EXPORT_SCOPE, &export_id)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .ok_or(ApiError::NotFound)?;

    let content = stored
        .get("content")
        .and_then(|v| v.as_str())
        .ok_or(ApiError::NotFound)?
        .to_string();

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        content,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::util::ServiceExt;

    use staffer_agent::agents::{AgentRegistry, SchedulerAgent};
    use staffer_agent::delivery::DisabledCalendar;
    use staffer_agent::llm::CompletionClient;
    use staffer_agent::testing::ScriptedLlm;
    use staffer_core::GateConfig;
    use staffer_db::repositories::InMemoryMetadataRepository;
    use staffer_db::{ConversationLocks, PendingStore};

    use super::*;

    fn test_state() -> ApiState {
        let repository: Arc<dyn MetadataRepository> =
            Arc::new(InMemoryMetadataRepository::default());
        let store = PendingStore::new(repository.clone());
        let llm: Arc<dyn CompletionClient> = Arc::new(ScriptedLlm::failing());

        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(SchedulerAgent::new(
            store,
            ConversationLocks::new(),
            Arc::new(DisabledCalendar),
            chrono_tz::UTC,
            GateConfig::default(),
        )));

        let controller = Arc::new(WorkflowController::new(
            staffer_agent::router::Router::new(llm.clone()),
            registry,
            llm,
            10,
        ));

        ApiState { controller, repository }
    }

    fn post_workflow(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/workflow")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn empty_task_is_rejected() {
        let app = router(test_state());

        let response = app
            .oneshot(post_workflow(json!({"task": "   "})))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn partial_scheduling_task_round_trips_a_clarification() {
        let app = router(test_state());

        let response = app
            .oneshot(post_workflow(json!({
                "task": "schedule a sync with Dana tomorrow",
                "conversation_id": "conv-1",
            })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload: Value = serde_json::from_slice(&bytes).expect("json");

        assert_eq!(payload["needs_clarification"], Value::Bool(true));
        assert!(payload["message"].as_str().expect("message").contains("I still need"));
    }

    #[tokio::test]
    async fn export_download_serves_stored_transcripts() {
        let state = test_state();
        state
            .repository
            .put(EXPORT_SCOPE, "abc-123", json!({"content": "User: hello"}))
            .await
            .expect("seed");
        let app = router(state);

        let found = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/exports/abc-123")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(found.status(), StatusCode::OK);
        let bytes = to_bytes(found.into_body(), usize::MAX).await.expect("body");
        assert_eq!(bytes.as_ref(), b"User: hello");

        let missing = app
            .oneshot(
                Request::builder()
                    .uri("/api/exports/nope")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
