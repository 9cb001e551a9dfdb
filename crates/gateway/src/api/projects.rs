//! Project lifecycle and project-scoped resources.
//!
//! - `POST   /projects`                      — create (409 on name clash)
//! - `DELETE /projects/:id`                  — delete + background cascade
//! - `POST   /projects/:id/folders`          — validated folder manifest
//! - `POST   /projects/:id/trainings`        — register + queue a scan job
//! - `POST   /projects/:id/data-sources`     — register provider credentials
//! - `POST   /projects/:id/gateways`         — create an MCP gateway

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::Value;

use arbor_broker::TrainingJobMessage;
use arbor_domain::model::{new_id, DataSource, FolderFile, FolderUpload, McpGateway, Project, Training};
use arbor_domain::uploads::{
    content_type_for, depth_of, parent_path_of, validate_folder, UploadEntry,
};
use arbor_providers::ProviderKind;

use crate::runtime::CleanupService;
use crate::state::AppState;

use super::error_response;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /projects
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ProjectCreate {
    pub organization_id: String,
    pub name: String,
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(body): Json<ProjectCreate>,
) -> impl IntoResponse {
    if body.name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "project name must not be empty" })),
        )
            .into_response();
    }

    let project = Project::new(&body.organization_id, body.name.trim());
    match state.store.insert_project(project.clone()) {
        Ok(_) => (StatusCode::CREATED, Json(serde_json::json!(project))).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /projects/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Remove the project document, then cascade-delete its resources in the
/// background.
pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> impl IntoResponse {
    if !state.store.projects.delete(&project_id) {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("project '{project_id}' not found") })),
        )
            .into_response();
    }

    let cleanup = CleanupService::new(
        state.store.clone(),
        state.artifacts.clone(),
        state.config.artifacts.clone(),
    );
    tokio::spawn(async move {
        let report = cleanup.cascade_delete(&project_id).await;
        tracing::info!(
            project_id = %report.project_id,
            status = ?report.status,
            errors = report.errors.len(),
            "project cleanup report"
        );
    });

    StatusCode::NO_CONTENT.into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /projects/:id/folders
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct FolderFileEntry {
    pub relative_path: String,
    pub file_size: u64,
}

#[derive(Debug, Deserialize)]
pub struct FolderUploadRequest {
    pub name: String,
    pub files: Vec<FolderFileEntry>,
}

/// Validate and register a folder manifest. File bodies are uploaded
/// separately against the returned s3 keys.
pub async fn upload_folder(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<FolderUploadRequest>,
) -> impl IntoResponse {
    if state.store.projects.get(&project_id).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("project '{project_id}' not found") })),
        )
            .into_response();
    }

    let entries: Vec<UploadEntry> = body
        .files
        .iter()
        .map(|f| UploadEntry {
            relative_path: f.relative_path.clone(),
            file_size: f.file_size,
        })
        .collect();
    if let Err(e) = validate_folder(&entries, &state.config.uploads) {
        return error_response(&e).into_response();
    }

    let upload_id = new_id();
    let files: Vec<FolderFile> = body
        .files
        .iter()
        .map(|f| {
            let filename = f
                .relative_path
                .rsplit('/')
                .next()
                .unwrap_or(&f.relative_path);
            FolderFile {
                relative_path: f.relative_path.clone(),
                file_size: f.file_size,
                content_type: content_type_for(filename).to_string(),
                s3_key: format!(
                    "artifacts/{project_id}/folders/{upload_id}/files/{}",
                    f.relative_path
                ),
                depth: depth_of(&f.relative_path),
                parent_path: parent_path_of(&f.relative_path),
            }
        })
        .collect();

    let mut upload = FolderUpload::new(&project_id, &body.name, files);
    upload.id = upload_id;
    match state.store.folder_uploads.insert(upload.clone()) {
        Ok(_) => (StatusCode::CREATED, Json(serde_json::json!(upload))).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /projects/:id/trainings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct TrainingCreate {
    #[serde(default)]
    pub data_source_ids: Vec<String>,
}

/// Register a training and queue the scan job. The scan itself runs in a
/// separate worker fleet; the gateway only publishes and tracks it.
pub async fn create_training(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<TrainingCreate>,
) -> impl IntoResponse {
    let Some(project) = state.store.projects.get(&project_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("project '{project_id}' not found") })),
        )
            .into_response();
    };

    let training = Training::new(&project_id, body.data_source_ids.clone());
    let training_id = training.id.clone();
    if let Err(e) = state.store.trainings.insert(training.clone()) {
        return error_response(&e).into_response();
    }

    if let Err(e) = state
        .broker
        .publish_training_job(TrainingJobMessage {
            training_id: training_id.clone(),
            project_id: project_id.to_lowercase(),
            project_name: project.name.clone(),
            data_source_ids: body.data_source_ids,
        })
        .await
    {
        // The document stays queued for a janitor sweep to republish.
        tracing::error!(training_id, error = %e, "training job publish failed");
        return error_response(&e).into_response();
    }

    (StatusCode::CREATED, Json(serde_json::json!(training))).into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /projects/:id/data-sources
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct DataSourceCreate {
    pub source_type: String,
    pub config: Value,
}

pub async fn create_data_source(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<DataSourceCreate>,
) -> impl IntoResponse {
    if state.store.projects.get(&project_id).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("project '{project_id}' not found") })),
        )
            .into_response();
    }
    if ProviderKind::parse(&body.source_type).is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("unknown provider type '{}'", body.source_type),
            })),
        )
            .into_response();
    }

    let source = DataSource::new(&project_id, &body.source_type, body.config);
    match state.store.data_sources.insert(source.clone()) {
        Ok(_) => (StatusCode::CREATED, Json(serde_json::json!(source))).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /projects/:id/gateways
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct GatewayCreate {
    pub name: String,
}

pub async fn create_gateway(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<GatewayCreate>,
) -> impl IntoResponse {
    if state.store.projects.get(&project_id).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("project '{project_id}' not found") })),
        )
            .into_response();
    }

    let gateway = McpGateway::new(&project_id, &body.name);
    match state.store.gateways.insert(gateway.clone()) {
        Ok(_) => (StatusCode::CREATED, Json(serde_json::json!(gateway))).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}
