//! End-to-end exercises of the dispatch → broker → worker pipeline and the
//! background orchestrators, against the in-memory broker/store/artifact
//! backends and a scripted SDK.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use arbor_agent::testing::ScriptedSdk;
use arbor_agent::TASK_CANCELLED_MESSAGE;
use arbor_broker::InMemoryBroker;
use arbor_cache::SessionCache;
use arbor_domain::config::Config;
use arbor_domain::model::{
    Agent, AgentState, Evaluation, EvaluationRun, EvaluationRunStatus, McpGateway, McpTool,
    McpToolStatus, Project, ProjectMdStatus, TaskStatus, TestCase, Training,
};
use arbor_domain::Error;
use arbor_gateway::runtime::{
    DocOrchestrator, Dispatcher, EvalOrchestrator, TaskWorker, ToolMetaOrchestrator,
};
use arbor_store::{ArtifactStore, InMemoryArtifactStore, Store};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fixture
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Platform {
    store: Arc<Store>,
    sdk: Arc<ScriptedSdk>,
    sessions: Arc<SessionCache>,
    artifacts: Arc<InMemoryArtifactStore>,
    broker: Arc<InMemoryBroker>,
    dispatcher: Arc<Dispatcher>,
    config: Arc<Config>,
    shutdown: Arc<Notify>,
    project_id: String,
    agent_id: String,
    _workspace_dir: tempfile::TempDir,
}

impl Platform {
    /// Build the whole pipeline with one running worker.
    fn start() -> Self {
        let workspace_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.workspace.base_path = workspace_dir.path().to_path_buf();
        config.workspace.template_path = workspace_dir.path().join("no-template");
        let config = Arc::new(config);

        let store = Arc::new(Store::new());
        let broker = Arc::new(InMemoryBroker::new(3));
        let sessions = Arc::new(SessionCache::new(Duration::from_secs(3600)));
        let artifacts = Arc::new(InMemoryArtifactStore::new());
        let sdk = Arc::new(ScriptedSdk::new());
        let dispatcher = Arc::new(Dispatcher::new(store.clone(), broker.clone()));

        let project = Project::new("org", "alpha");
        let project_id = project.id.clone();
        let mut agent = Agent::new(&project_id, "helper");
        agent.state = AgentState::Enabled;
        let agent_id = agent.id.clone();
        store.insert_project(project).unwrap();
        store.agents.insert(agent).unwrap();

        let worker = Arc::new(
            TaskWorker::new(
                store.clone(),
                broker.clone(),
                sessions.clone(),
                artifacts.clone(),
                sdk.clone(),
                config.clone(),
            )
            .with_cancel_check_interval(Duration::from_millis(1)),
        );
        let shutdown = Arc::new(Notify::new());
        tokio::spawn(worker.run(shutdown.clone()));

        Self {
            store,
            sdk,
            sessions,
            artifacts,
            broker,
            dispatcher,
            config,
            shutdown,
            project_id,
            agent_id,
            _workspace_dir: workspace_dir,
        }
    }

    /// Assemble an [`arbor_gateway::state::AppState`] over the same
    /// backends, for driving the HTTP surface.
    fn app_state(&self) -> arbor_gateway::state::AppState {
        arbor_gateway::state::AppState {
            config: self.config.clone(),
            store: self.store.clone(),
            sessions: self.sessions.clone(),
            broker: self.broker.clone(),
            artifacts: self.artifacts.clone(),
            sdk: self.sdk.clone(),
            dispatcher: self.dispatcher.clone(),
            active_runners: Arc::new(arbor_gateway::runtime::ActiveRunnerMap::new()),
            workspaces: Arc::new(arbor_gateway::workspace::WorkspaceManager::new(
                self.config.workspace.clone(),
            )),
            providers: Arc::new(arbor_providers::ProviderRegistry::new(
                self.store.clone(),
                Duration::from_secs(60),
                10,
            )),
        }
    }

    async fn wait_for_task(&self, task_id: &str) -> arbor_domain::model::Task {
        for _ in 0..500 {
            if let Some(task) = self.store.tasks.get(task_id) {
                if task.status.is_terminal() {
                    return task;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task {task_id} did not reach a terminal state");
    }
}

impl Drop for Platform {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatch pipeline
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn submitted_task_completes_and_caches_session() {
    let platform = Platform::start();
    platform.sdk.push_reply("hi", Some("S1"));

    let pair = platform
        .dispatcher
        .create_task(
            &platform.project_id,
            &platform.agent_id,
            "hello",
            Default::default(),
        )
        .await
        .unwrap();

    let assistant = platform.wait_for_task(&pair.assistant_task_id).await;
    assert_eq!(assistant.status, TaskStatus::Completed);
    assert_eq!(assistant.content, "hi");

    // Session id flowed from the SDK terminal event into the cache.
    assert_eq!(
        platform.sessions.get(&pair.assistant_task_id).as_deref(),
        Some("S1")
    );

    // User task untouched.
    let user = platform.store.tasks.get(&pair.user_task_id).unwrap();
    assert_eq!(user.status, TaskStatus::Queued);
}

#[tokio::test]
async fn second_submission_throttled_until_first_finishes() {
    let platform = Platform::start();
    // Slow the stream down so the first task is still live when the
    // second submission arrives.
    platform.sdk.set_event_delay(Duration::from_millis(50));
    platform.sdk.push_reply("first answer", None);

    let pair = platform
        .dispatcher
        .create_task(
            &platform.project_id,
            &platform.agent_id,
            "first",
            Default::default(),
        )
        .await
        .unwrap();

    // Immediate resubmission races the worker; whether the first task is
    // queued or processing, admission must reject it.
    let err = platform
        .dispatcher
        .create_task(
            &platform.project_id,
            &platform.agent_id,
            "second",
            Default::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Throttled(_)));

    // Exactly one assistant task reaches completed.
    platform.wait_for_task(&pair.assistant_task_id).await;
    let completed = platform.store.tasks.count(|t| {
        t.role == arbor_domain::model::TaskRole::Assistant && t.status == TaskStatus::Completed
    });
    assert_eq!(completed, 1);

    platform.sdk.push_reply("second answer", None);
    assert!(platform
        .dispatcher
        .create_task(
            &platform.project_id,
            &platform.agent_id,
            "second",
            Default::default(),
        )
        .await
        .is_ok());
}

#[tokio::test]
async fn cancellation_finalises_with_sentinel() {
    let platform = Platform::start();
    // A slow stream so the cancel flag lands mid-flight.
    platform.sdk.set_event_delay(Duration::from_millis(20));
    platform.sdk.push_script(vec![
        arbor_agent::AgentEvent::Assistant {
            content: vec![arbor_agent::ContentBlock::Text { text: "…".into() }],
        };
        50
    ]);

    let pair = platform
        .dispatcher
        .create_task(
            &platform.project_id,
            &platform.agent_id,
            "long task",
            Default::default(),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    platform.store.request_task_cancel(&pair.assistant_task_id);

    let assistant = platform.wait_for_task(&pair.assistant_task_id).await;
    assert_eq!(assistant.status, TaskStatus::Failed);
    assert_eq!(assistant.content, TASK_CANCELLED_MESSAGE);

    // Workspace tree is gone.
    let scope_dir = platform
        .config
        .workspace
        .base_path
        .join(&platform.project_id)
        .join(&pair.assistant_task_id);
    assert!(!scope_dir.exists());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Evaluation orchestration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn evaluation_run_aggregates_scores() {
    let platform = Platform::start();

    // Grading agent lives in the same project for this run.
    let mut grader = Agent::new(&platform.project_id, "grader");
    grader.state = AgentState::Enabled;
    let grader_id = grader.id.clone();
    platform.store.agents.insert(grader).unwrap();

    let test_cases = vec![
        TestCase {
            id: "tc-1".into(),
            task: "say A".into(),
            expected_output: "A".into(),
            evaluation_guideline: Some("exact".into()),
        },
        TestCase {
            id: "tc-2".into(),
            task: "say B".into(),
            expected_output: "B".into(),
            evaluation_guideline: None,
        },
        TestCase {
            id: "tc-3".into(),
            task: "say C".into(),
            expected_output: "C".into(),
            evaluation_guideline: None,
        },
    ];
    let evaluation = Evaluation::new(
        &platform.project_id,
        &platform.agent_id,
        "smoke",
        "be literal",
    )
    .with_test_cases(test_cases);
    let run = EvaluationRun::new(&evaluation, &grader_id, &platform.project_id);
    let run_id = run.id.clone();
    platform.store.evaluations.insert(evaluation).unwrap();
    platform.store.evaluation_runs.insert(run).unwrap();

    // Three target responses, then three grader verdicts (FIFO broker +
    // single worker keeps the pairing in order).
    platform.sdk.push_reply("A", None);
    platform.sdk.push_reply("B", None);
    platform.sdk.push_reply("C", None);
    platform.sdk.push_reply("Score: 1.0\nReasoning: exact", None);
    platform.sdk.push_reply("Score: 0.5\nReasoning: close", None);
    platform.sdk.push_reply("Score: 0.0\nReasoning: wrong", None);

    EvalOrchestrator::new(platform.store.clone(), platform.dispatcher.clone())
        .with_polling(Duration::from_millis(10), 1000)
        .run(&run_id)
        .await;

    let run = platform.store.evaluation_runs.get(&run_id).unwrap();
    assert_eq!(run.status, EvaluationRunStatus::Completed);
    assert_eq!(run.completed_test_cases, 3);
    assert_eq!(run.failed_test_cases, 0);
    let overall = run.overall_score.unwrap();
    assert!((overall - 0.5).abs() < 1e-9, "overall = {overall}");

    // Per-row bookkeeping.
    for row in &run.test_case_results {
        assert!(row.target_task_id.is_some());
        assert!(row.grader_task_id.is_some());
        assert!(row.target_response.is_some());
        assert!(row.grader_response.is_some());
        assert!(row.completed_at.is_some());
    }
    assert_eq!(run.test_case_results[0].score, Some(1.0));
    assert_eq!(run.test_case_results[1].score, Some(0.5));
    assert_eq!(run.test_case_results[2].score, Some(0.0));
}

#[tokio::test]
async fn evaluation_isolates_failed_test_case() {
    let platform = Platform::start();
    let mut grader = Agent::new(&platform.project_id, "grader");
    grader.state = AgentState::Enabled;
    let grader_id = grader.id.clone();
    platform.store.agents.insert(grader).unwrap();

    let evaluation = Evaluation::new(
        &platform.project_id,
        &platform.agent_id,
        "smoke",
        "be literal",
    )
    .with_test_cases(vec![
        TestCase {
            id: "tc-ok".into(),
            task: "say A".into(),
            expected_output: "A".into(),
            evaluation_guideline: None,
        },
        TestCase {
            id: "tc-bad".into(),
            task: "explode".into(),
            expected_output: "-".into(),
            evaluation_guideline: None,
        },
    ]);
    let run = EvaluationRun::new(&evaluation, &grader_id, &platform.project_id);
    let run_id = run.id.clone();
    platform.store.evaluations.insert(evaluation).unwrap();
    platform.store.evaluation_runs.insert(run).unwrap();

    // First target succeeds; second exhausts its three retries. Grader
    // runs only for the first.
    platform.sdk.push_reply("A", None);
    for _ in 0..3 {
        platform.sdk.push_reply("execution failed: boom", None);
    }
    platform.sdk.push_reply("Score: 1.0", None);

    EvalOrchestrator::new(platform.store.clone(), platform.dispatcher.clone())
        .with_polling(Duration::from_millis(10), 1000)
        .run(&run_id)
        .await;

    let run = platform.store.evaluation_runs.get(&run_id).unwrap();
    assert_eq!(run.status, EvaluationRunStatus::Completed);
    assert_eq!(run.completed_test_cases, 1);
    assert_eq!(run.failed_test_cases, 1);
    assert_eq!(run.overall_score, Some(1.0));

    let failed = run
        .test_case_results
        .iter()
        .find(|r| r.test_case_id == "tc-bad")
        .unwrap();
    assert!(failed.error_message.is_some());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Documentation generation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn projectmd_generation_uploads_artifact() {
    let platform = Platform::start();
    let training = Training::new(&platform.project_id, vec!["ds-1".into()]);
    let training_id = training.id.clone();
    platform.store.trainings.insert(training).unwrap();

    platform.sdk.push_reply("# docs", None);

    DocOrchestrator::new(
        platform.store.clone(),
        platform.dispatcher.clone(),
        platform.artifacts.clone(),
        platform.config.clone(),
    )
    .with_polling(Duration::from_millis(10), 1000)
    .generate(&training_id)
    .await;

    let training = platform.store.trainings.get(&training_id).unwrap();
    assert_eq!(training.projectmd.status, Some(ProjectMdStatus::Completed));
    assert!(training.projectmd.completed_at.is_some());

    // Documentation agent was created lazily in the project.
    let doc_agent_id = training.projectmd.documentation_agent_id.clone().unwrap();
    assert!(platform.store.agents.get(&doc_agent_id).is_some());

    // Artifact stored at the documented key with the body verbatim.
    let key = format!(
        "artifacts/{}/trainings/{}/projectmd.md",
        platform.project_id, training_id
    );
    let body = platform
        .artifacts
        .get(&platform.config.artifacts.artifact_bucket, &key)
        .await
        .unwrap()
        .expect("uploaded artifact");
    assert_eq!(body, b"# docs");
    assert_eq!(
        training.projectmd.s3_url.as_deref(),
        Some(format!("s3://{}/{key}", platform.config.artifacts.artifact_bucket).as_str())
    );

    // The HTTP surface serves the generated document verbatim.
    use tower::ServiceExt;
    let app = arbor_gateway::api::router(platform.app_state());
    let response = app
        .oneshot(
            axum::http::Request::builder()
                .uri(format!(
                    "/projects/{}/trainings/latest/projectmd",
                    platform.project_id
                ))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let served = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&served[..], b"# docs");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool metadata synthesis
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn platform_with_metadata_agent() -> (Platform, String) {
    let mut platform = Platform::start();

    let mut metadata_agent = Agent::new(&platform.project_id, "tool-metadata");
    metadata_agent.state = AgentState::Enabled;
    let metadata_agent_id = metadata_agent.id.clone();
    platform.store.agents.insert(metadata_agent).unwrap();

    let mut config = (*platform.config).clone();
    config.orchestration.metadata_agent_id = Some(metadata_agent_id.clone());
    config.orchestration.metadata_project_id = Some(platform.project_id.clone());
    platform.config = Arc::new(config);

    (platform, metadata_agent_id)
}

#[tokio::test]
async fn tool_metadata_synthesis_readies_tool() {
    let (platform, _) = platform_with_metadata_agent();

    // Source agent being published as a tool.
    let mut source = Agent::new(&platform.project_id, "sum");
    source.instructions = Some("add numbers".into());
    source.output_format = "number".into();
    let source_id = source.id.clone();
    platform.store.agents.insert(source).unwrap();

    let gateway = McpGateway::new(&platform.project_id, "main");
    let gateway_id = gateway.id.clone();
    platform.store.gateways.insert(gateway).unwrap();
    let tool = McpTool::new(&gateway_id, &source_id, "sum");
    let tool_id = tool.id.clone();
    platform.store.mcp_tools.insert(tool).unwrap();

    platform.sdk.push_reply(
        "Here you go:\n```json\n{\n  \"tool_name\": \"sum\",\n  \"description\": \"Adds \
         numbers.\",\n  \"input_schema\": {\"type\": \"object\", \"properties\": {\"numbers\": \
         {\"type\": \"array\"}}, \"required\": [\"numbers\"]},\n  \"output_format\": \"number\"\n}\n```",
        None,
    );

    ToolMetaOrchestrator::new(
        platform.store.clone(),
        platform.dispatcher.clone(),
        platform.config.clone(),
    )
    .with_polling(Duration::from_millis(10), 1000)
    .generate(&tool_id)
    .await;

    let tool = platform.store.mcp_tools.get(&tool_id).unwrap();
    assert_eq!(tool.status, McpToolStatus::Ready);
    assert!(tool.enabled);
    assert_eq!(tool.description, "Adds numbers.");
    assert_eq!(tool.input_schema["type"], "object");
    assert!(tool.input_schema["properties"].is_object());

    // Source agent's metadata gained the gateway link.
    let source = platform.store.agents.get(&source_id).unwrap();
    let links = source.metadata["mcp_gateways"].as_array().unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0]["gateway_id"], gateway_id.as_str());
    assert_eq!(links[0]["tool_id"], tool_id.as_str());
    assert!(links[0]["enabled_at"].is_string());
}

#[tokio::test]
async fn tool_metadata_missing_fields_fails_tool() {
    let (platform, _) = platform_with_metadata_agent();

    let source = Agent::new(&platform.project_id, "sum");
    let source_id = source.id.clone();
    platform.store.agents.insert(source).unwrap();
    let gateway = McpGateway::new(&platform.project_id, "main");
    let gateway_id = gateway.id.clone();
    platform.store.gateways.insert(gateway).unwrap();
    let tool = McpTool::new(&gateway_id, &source_id, "sum");
    let tool_id = tool.id.clone();
    platform.store.mcp_tools.insert(tool).unwrap();

    // Envelope lacking input_schema/output_format.
    platform
        .sdk
        .push_reply("{\"tool_name\": \"sum\", \"description\": \"adds\"}", None);

    ToolMetaOrchestrator::new(
        platform.store.clone(),
        platform.dispatcher.clone(),
        platform.config.clone(),
    )
    .with_polling(Duration::from_millis(10), 1000)
    .generate(&tool_id)
    .await;

    let tool = platform.store.mcp_tools.get(&tool_id).unwrap();
    assert_eq!(tool.status, McpToolStatus::Failed);
    assert!(!tool.enabled);
    assert!(tool.metadata["error_message"]
        .as_str()
        .unwrap()
        .contains("missing required fields"));
}
