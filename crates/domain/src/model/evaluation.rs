use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{impl_document, new_id};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Evaluation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One row of the evaluation's test-case CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    /// The query sent to the target agent.
    pub task: String,
    pub expected_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_guideline: Option<String>,
}

/// An evaluation definition: target agent, grading criteria, test cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: String,
    pub project_id: String,
    pub target_agent_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Natural-language grading criteria embedded into every grader prompt.
    pub criteria: String,
    /// Pointer to the uploaded test-case CSV, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_url: Option<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub test_case_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
impl_document!(Evaluation);

impl Evaluation {
    pub fn new(project_id: &str, target_agent_id: &str, name: &str, criteria: &str) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            project_id: project_id.to_string(),
            target_agent_id: target_agent_id.to_string(),
            name: name.to_string(),
            description: None,
            criteria: criteria.to_string(),
            s3_url: None,
            test_cases: Vec::new(),
            test_case_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_test_cases(mut self, test_cases: Vec<TestCase>) -> Self {
        self.test_case_count = test_cases.len();
        self.test_cases = test_cases;
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Evaluation run
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationRunStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl EvaluationRunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCaseRunStatus {
    Pending,
    RunningTarget,
    RunningGrader,
    Completed,
    Failed,
}

impl TestCaseRunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Per-test-case execution record inside an [`EvaluationRun`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub test_case_id: String,
    pub status: TestCaseRunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grader_task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grader_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TestCaseResult {
    pub fn pending(test_case_id: &str) -> Self {
        Self {
            test_case_id: test_case_id.to_string(),
            status: TestCaseRunStatus::Pending,
            target_task_id: None,
            grader_task_id: None,
            target_response: None,
            grader_response: None,
            score: None,
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// One execution of an [`Evaluation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRun {
    pub id: String,
    pub evaluation_id: String,
    pub project_id: String,
    pub target_agent_id: String,
    pub grading_agent_id: String,
    pub grading_agent_project_id: String,
    pub status: EvaluationRunStatus,
    #[serde(default)]
    pub test_case_results: Vec<TestCaseResult>,
    pub total_test_cases: usize,
    #[serde(default)]
    pub completed_test_cases: usize,
    #[serde(default)]
    pub failed_test_cases: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
impl_document!(EvaluationRun);

impl EvaluationRun {
    pub fn new(evaluation: &Evaluation, grading_agent_id: &str, grading_project_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            evaluation_id: evaluation.id.clone(),
            project_id: evaluation.project_id.clone(),
            target_agent_id: evaluation.target_agent_id.clone(),
            grading_agent_id: grading_agent_id.to_string(),
            grading_agent_project_id: grading_project_id.to_string(),
            status: EvaluationRunStatus::Queued,
            test_case_results: Vec::new(),
            total_test_cases: evaluation.test_case_count,
            completed_test_cases: 0,
            failed_test_cases: 0,
            overall_score: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mutate the result row for one test case. Terminal rows are never
    /// moved back to a running state.
    pub fn update_result<F>(&mut self, test_case_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut TestCaseResult),
    {
        if let Some(result) = self
            .test_case_results
            .iter_mut()
            .find(|r| r.test_case_id == test_case_id)
        {
            if result.status.is_terminal() {
                return false;
            }
            f(result);
            return true;
        }
        false
    }
}
