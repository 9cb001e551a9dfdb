//! HTTP-level tests of the gateway router: status-code contracts for the
//! ACP surface, upload validation boundaries, and agent versioning.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use arbor_agent::testing::ScriptedSdk;
use arbor_broker::InMemoryBroker;
use arbor_cache::SessionCache;
use arbor_domain::config::Config;
use arbor_domain::model::{Agent, AgentState, Project};
use arbor_gateway::runtime::{ActiveRunnerMap, Dispatcher};
use arbor_gateway::state::AppState;
use arbor_gateway::workspace::WorkspaceManager;
use arbor_gateway::api;
use arbor_providers::ProviderRegistry;
use arbor_store::{InMemoryArtifactStore, Store};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fixture
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Api {
    app: Router,
    store: Arc<Store>,
    project_id: String,
    agent_id: String,
    _workspace_dir: tempfile::TempDir,
}

fn api() -> Api {
    let workspace_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.workspace.base_path = workspace_dir.path().to_path_buf();
    config.workspace.template_path = workspace_dir.path().join("no-template");
    let config = Arc::new(config);

    let store = Arc::new(Store::new());
    let broker = Arc::new(InMemoryBroker::new(3));
    let dispatcher = Arc::new(Dispatcher::new(store.clone(), broker.clone()));

    let project = Project::new("org", "alpha");
    let project_id = project.id.clone();
    let mut agent = Agent::new(&project_id, "helper");
    agent.state = AgentState::Enabled;
    let agent_id = agent.id.clone();
    store.insert_project(project).unwrap();
    store.agents.insert(agent).unwrap();

    let state = AppState {
        config: config.clone(),
        store: store.clone(),
        sessions: Arc::new(SessionCache::new(Duration::from_secs(3600))),
        broker,
        artifacts: Arc::new(InMemoryArtifactStore::new()),
        sdk: Arc::new(ScriptedSdk::new()),
        dispatcher,
        active_runners: Arc::new(ActiveRunnerMap::new()),
        workspaces: Arc::new(WorkspaceManager::new(config.workspace.clone())),
        providers: Arc::new(ProviderRegistry::new(
            store.clone(),
            Duration::from_secs(60),
            10,
        )),
    };

    Api {
        app: api::router(state),
        store,
        project_id,
        agent_id,
        _workspace_dir: workspace_dir,
    }
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ACP runs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn run_body(agent_id: &str, content: &str) -> serde_json::Value {
    serde_json::json!({
        "agent_name": agent_id,
        "input": [{ "parts": [{ "content_type": "text/plain", "content": content }] }],
        "mode": "async",
    })
}

#[tokio::test]
async fn acp_run_created_then_queryable() {
    let api = api();

    let response = api
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/runs",
            run_body(&api.agent_id, "hello"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["status"], "created");
    let run_id = body["run_id"].as_str().unwrap().to_string();

    let response = api
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/runs/{run_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "created");
    assert!(body["output"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn acp_unknown_agent_is_404() {
    let api = api();
    let response = api
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/runs",
            run_body("ghost", "hello"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn acp_second_submission_is_429() {
    let api = api();
    let first = api
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/runs",
            run_body(&api.agent_id, "first"),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = api
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/runs",
            run_body(&api.agent_id, "second"),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Folder upload boundaries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn folder_body(files: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "name": "upload", "files": files })
}

async fn upload(api: &Api, files: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = api
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/projects/{}/folders", api.project_id),
            folder_body(files),
        ))
        .await
        .unwrap();
    let status = response.status();
    (status, response_json(response).await)
}

#[tokio::test]
async fn upload_rejects_blocked_extension() {
    let api = api();
    let (status, body) = upload(
        &api,
        serde_json::json!([{ "relative_path": "tool.exe", "file_size": 10 }]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains(".exe"));
}

#[tokio::test]
async fn upload_rejects_1001_files() {
    let api = api();
    let files: Vec<serde_json::Value> = (0..1001)
        .map(|i| serde_json::json!({ "relative_path": format!("f{i}.txt"), "file_size": 1 }))
        .collect();
    let (status, body) = upload(&api, serde_json::Value::Array(files)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("too many files"));
}

#[tokio::test]
async fn upload_rejects_depth_eleven() {
    let api = api();
    let path = format!("{}file.txt", "d/".repeat(11));
    let (status, _) = upload(
        &api,
        serde_json::json!([{ "relative_path": path, "file_size": 1 }]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_rejects_path_traversal() {
    let api = api();
    let (status, body) = upload(
        &api,
        serde_json::json!([{ "relative_path": "../escape.txt", "file_size": 1 }]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("traversal"));
}

#[tokio::test]
async fn upload_happy_path_derives_manifest() {
    let api = api();
    let (status, body) = upload(
        &api,
        serde_json::json!([
            { "relative_path": "README.md", "file_size": 10 },
            { "relative_path": "src/main.rs", "file_size": 20 },
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["total_files"], 2);
    assert_eq!(body["total_size"], 30);
    assert_eq!(body["max_depth"], 1);

    let files = body["files"].as_array().unwrap();
    assert_eq!(files[0]["content_type"], "text/markdown");
    assert_eq!(files[1]["parent_path"], "src");
    assert!(files[1]["s3_key"]
        .as_str()
        .unwrap()
        .ends_with("/files/src/main.rs"));

    assert_eq!(api.store.folder_uploads.len(), 1);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Projects
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn duplicate_project_name_is_409() {
    let api = api();
    let body = serde_json::json!({ "organization_id": "org", "name": "alpha" });
    let response = api
        .app
        .clone()
        .oneshot(json_request("POST", "/projects", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn delete_project_returns_204_and_cascades() {
    let api = api();
    let response = api
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/projects/{}", api.project_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Background cascade removes the agent.
    for _ in 0..100 {
        if api.store.agents.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(api.store.agents.is_empty());
    assert!(api.store.projects.get(&api.project_id).is_none());
}

#[tokio::test]
async fn unknown_data_source_type_is_400() {
    let api = api();
    let response = api
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/projects/{}/data-sources", api.project_id),
            serde_json::json!({ "source_type": "snowflake", "config": {} }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent versioning
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn agent_update_records_versions_newest_first() {
    let api = api();
    api.store.agents.update(&api.agent_id, |a| {
        a.instructions = Some("v1".into());
    });

    for (revision, user) in [("v2", "alice"), ("v3", "bob")] {
        let response = api
            .app
            .clone()
            .oneshot(json_request(
                "PATCH",
                &format!("/projects/{}/agents/{}", api.project_id, api.agent_id),
                serde_json::json!({ "instructions": revision, "updated_by": user }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = api
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/projects/{}/agents/{}/versions",
                    api.project_id, api.agent_id
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["total_count"], 2);
    // Newest first: v2 snapshot (taken before v3 applied) leads.
    assert_eq!(body["versions"][0]["instructions"], "v2");
    assert_eq!(body["versions"][0]["updated_by"], "bob");
    assert_eq!(body["versions"][1]["instructions"], "v1");
}

#[tokio::test]
async fn oversized_instructions_rejected() {
    let api = api();
    let response = api
        .app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/projects/{}/agents/{}", api.project_id, api.agent_id),
            serde_json::json!({ "instructions": "x".repeat(20_001) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn interrupt_without_active_runner_is_404() {
    let api = api();
    let response = api
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/conversations/conv-1/interrupt",
            serde_json::json!({ "message_id": "msg-1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn disconnect_reports_cancelled_runner_count() {
    let api = api();
    let response = api
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/conversations/conv-1/session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["sessions_disconnected"], 0);
}
