//! Evaluation runs: fan one target task out per test case, grade each
//! completed response with the grading agent, parse scores, aggregate.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use arbor_domain::model::{
    EvaluationRun, EvaluationRunStatus, TaskStatus, TestCase, TestCaseResult, TestCaseRunStatus,
};
use arbor_store::Store;

use super::dispatch::Dispatcher;

/// Poll cadence and ceiling: 1 s × 3600 iterations ≈ one hour.
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLLS: u32 = 3600;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Score parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Fold a raw numeric score onto `[0, 1]`: values ≤ 1 pass through,
/// 10-scales divide by 10, 100-scales divide by 100, anything larger is
/// unparseable.
fn normalize_score(value: f64) -> Option<f64> {
    if !(0.0..=100.0).contains(&value) {
        return None;
    }
    if value <= 1.0 {
        Some(value)
    } else if value <= 10.0 {
        Some(value / 10.0)
    } else {
        Some(value / 100.0)
    }
}

/// Extract a numeric score from a grader response.
///
/// The tagged form `Score: <n>` wins, including fractions (`Score: 7/10`).
/// Without the tag, the first numeric token that fits a known scale is
/// used. Returns `None` when nothing parses.
pub fn parse_score(response: &str) -> Option<f64> {
    let tagged =
        regex::Regex::new(r"(?i)Score:\s*([0-9]*\.?[0-9]+)(?:\s*/\s*([0-9]*\.?[0-9]+))?")
            .expect("static regex");
    if let Some(caps) = tagged.captures(response) {
        let value: f64 = caps.get(1)?.as_str().parse().ok()?;
        if let Some(denominator) = caps.get(2) {
            let denominator: f64 = denominator.as_str().parse().ok()?;
            if denominator > 0.0 {
                return Some((value / denominator).clamp(0.0, 1.0));
            }
            return None;
        }
        return normalize_score(value);
    }

    let numeric = regex::Regex::new(r"\b([0-9]*\.?[0-9]+)\b").expect("static regex");
    for caps in numeric.captures_iter(response) {
        if let Ok(value) = caps[1].parse::<f64>() {
            if let Some(score) = normalize_score(value) {
                return Some(score);
            }
        }
    }
    None
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Grader prompt
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn grading_prompt(
    task: &str,
    expected_output: &str,
    actual_output: &str,
    evaluation_guideline: &str,
    criteria: &str,
) -> String {
    format!(
        "You are an expert evaluator. Please evaluate the following response based on the \
         provided criteria and guidelines.\n\
         \n\
         **Task/Query:**\n{task}\n\
         \n\
         **Expected Output:**\n{expected_output}\n\
         \n\
         **Actual Response:**\n{actual_output}\n\
         \n\
         **Evaluation Guideline:**\n{evaluation_guideline}\n\
         \n\
         **Overall Criteria:**\n{criteria}\n\
         \n\
         **Instructions:**\n\
         1. Evaluate the actual response against the expected output and guidelines\n\
         2. Consider accuracy, completeness, helpfulness, and adherence to criteria\n\
         3. Provide a score between 0.0 and 1.0 (where 1.0 is perfect)\n\
         4. Include your reasoning for the score\n\
         \n\
         **Required Response Format:**\n\
         Score: [0.0-1.0]\n\
         Reasoning: [Your detailed explanation]\n\
         \n\
         Please provide your evaluation now."
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EvalOrchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct EvalOrchestrator {
    store: Arc<Store>,
    dispatcher: Arc<Dispatcher>,
    poll_interval: Duration,
    max_polls: u32,
}

impl EvalOrchestrator {
    pub fn new(store: Arc<Store>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            poll_interval: POLL_INTERVAL,
            max_polls: MAX_POLLS,
        }
    }

    /// Shrink the poll cadence/ceiling (tests).
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    /// Drive one evaluation run to a terminal state.
    pub async fn run(&self, run_id: &str) {
        let Some(run) = self.store.evaluation_runs.get(run_id) else {
            tracing::error!(run_id, "evaluation run not found");
            return;
        };
        let Some(evaluation) = self.store.evaluations.get(&run.evaluation_id) else {
            self.mark_failed(run_id, "evaluation not found");
            return;
        };

        tracing::info!(run_id, test_cases = evaluation.test_cases.len(), "starting evaluation run");

        // Transition queued → running and seed one pending row per case.
        let results: Vec<TestCaseResult> = evaluation
            .test_cases
            .iter()
            .map(|tc| TestCaseResult::pending(&tc.id))
            .collect();
        self.store.evaluation_runs.update(run_id, |r| {
            r.status = EvaluationRunStatus::Running;
            r.started_at = Some(Utc::now());
            r.test_case_results = results;
        });

        self.create_target_tasks(run_id, &run, &evaluation.test_cases)
            .await;

        // Poll loop.
        for _ in 0..self.max_polls {
            self.check_target_completion(run_id, &evaluation.test_cases, &evaluation.criteria)
                .await;
            self.check_grader_completion(run_id);

            let Some(current) = self.store.evaluation_runs.get(run_id) else {
                return;
            };
            if current
                .test_case_results
                .iter()
                .all(|r| r.status.is_terminal())
            {
                self.finalize(run_id);
                return;
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        self.mark_failed(run_id, "Evaluation timed out");
    }

    /// Fan out one target task per test case. A creation failure marks
    /// only that row failed.
    async fn create_target_tasks(&self, run_id: &str, run: &EvaluationRun, cases: &[TestCase]) {
        for case in cases {
            let metadata = correlation_metadata(run_id, &case.id);
            match self
                .dispatcher
                .enqueue_pair(&run.project_id, &run.target_agent_id, &case.task, metadata)
                .await
            {
                Ok(pair) => {
                    self.update_row(run_id, &case.id, |row| {
                        row.status = TestCaseRunStatus::RunningTarget;
                        row.target_task_id = Some(pair.assistant_task_id.clone());
                        row.started_at = Some(Utc::now());
                    });
                }
                Err(e) => {
                    tracing::error!(test_case = %case.id, error = %e, "target task creation failed");
                    self.update_row(run_id, &case.id, |row| {
                        row.status = TestCaseRunStatus::Failed;
                        row.error_message = Some(format!("Failed to create target task: {e}"));
                        row.completed_at = Some(Utc::now());
                    });
                }
            }
        }
    }

    /// Promote rows whose target task finished: completed targets get a
    /// grader task, failed targets fail the row.
    async fn check_target_completion(&self, run_id: &str, cases: &[TestCase], criteria: &str) {
        let Some(run) = self.store.evaluation_runs.get(run_id) else {
            return;
        };
        for row in run
            .test_case_results
            .iter()
            .filter(|r| r.status == TestCaseRunStatus::RunningTarget)
        {
            let Some(task_id) = &row.target_task_id else {
                continue;
            };
            let Some(task) = self.store.tasks.get(task_id) else {
                continue;
            };
            match task.status {
                TaskStatus::Completed => {
                    self.create_grader_task(run_id, &run, cases, &row.test_case_id, &task.content, criteria)
                        .await;
                }
                TaskStatus::Failed => {
                    let reason = task
                        .metadata
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or("target task failed")
                        .to_string();
                    self.update_row(run_id, &row.test_case_id, |r| {
                        r.status = TestCaseRunStatus::Failed;
                        r.error_message = Some(reason);
                        r.completed_at = Some(Utc::now());
                    });
                }
                _ => {}
            }
        }
    }

    async fn create_grader_task(
        &self,
        run_id: &str,
        run: &EvaluationRun,
        cases: &[TestCase],
        test_case_id: &str,
        target_response: &str,
        criteria: &str,
    ) {
        let Some(case) = cases.iter().find(|c| c.id == test_case_id) else {
            return;
        };
        let prompt = grading_prompt(
            &case.task,
            &case.expected_output,
            target_response,
            case.evaluation_guideline.as_deref().unwrap_or(""),
            criteria,
        );
        let metadata = correlation_metadata(run_id, test_case_id);

        match self
            .dispatcher
            .enqueue_pair(
                &run.grading_agent_project_id,
                &run.grading_agent_id,
                &prompt,
                metadata,
            )
            .await
        {
            Ok(pair) => {
                self.update_row(run_id, test_case_id, |row| {
                    row.status = TestCaseRunStatus::RunningGrader;
                    row.target_response = Some(target_response.to_string());
                    row.grader_task_id = Some(pair.assistant_task_id.clone());
                });
            }
            Err(e) => {
                tracing::error!(test_case = test_case_id, error = %e, "grader task creation failed");
                self.update_row(run_id, test_case_id, |row| {
                    row.status = TestCaseRunStatus::Failed;
                    row.error_message = Some(format!("Failed to create grader task: {e}"));
                    row.completed_at = Some(Utc::now());
                });
            }
        }
    }

    /// Complete rows whose grader task finished, parsing the score.
    fn check_grader_completion(&self, run_id: &str) {
        let Some(run) = self.store.evaluation_runs.get(run_id) else {
            return;
        };
        for row in run
            .test_case_results
            .iter()
            .filter(|r| r.status == TestCaseRunStatus::RunningGrader)
        {
            let Some(task_id) = &row.grader_task_id else {
                continue;
            };
            let Some(task) = self.store.tasks.get(task_id) else {
                continue;
            };
            match task.status {
                TaskStatus::Completed => {
                    let score = parse_score(&task.content);
                    if score.is_none() {
                        tracing::warn!(
                            test_case = %row.test_case_id,
                            preview = %task.content.chars().take(100).collect::<String>(),
                            "could not parse score from grader response"
                        );
                    }
                    self.update_row(run_id, &row.test_case_id, |r| {
                        r.status = TestCaseRunStatus::Completed;
                        r.grader_response = Some(task.content.clone());
                        r.score = score;
                        r.completed_at = Some(Utc::now());
                    });
                }
                TaskStatus::Failed => {
                    self.update_row(run_id, &row.test_case_id, |r| {
                        r.status = TestCaseRunStatus::Failed;
                        r.error_message = Some("grader task failed".into());
                        r.completed_at = Some(Utc::now());
                    });
                }
                _ => {}
            }
        }
    }

    /// Aggregate: mean of parsed scores over completed rows.
    fn finalize(&self, run_id: &str) {
        self.store.evaluation_runs.update(run_id, |run| {
            let completed = run
                .test_case_results
                .iter()
                .filter(|r| r.status == TestCaseRunStatus::Completed)
                .count();
            let failed = run
                .test_case_results
                .iter()
                .filter(|r| r.status == TestCaseRunStatus::Failed)
                .count();
            let scores: Vec<f64> = run
                .test_case_results
                .iter()
                .filter(|r| r.status == TestCaseRunStatus::Completed)
                .filter_map(|r| r.score)
                .collect();

            run.completed_test_cases = completed;
            run.failed_test_cases = failed;
            run.overall_score = if scores.is_empty() {
                None
            } else {
                Some(scores.iter().sum::<f64>() / scores.len() as f64)
            };
            run.status = EvaluationRunStatus::Completed;
            run.completed_at = Some(Utc::now());
        });

        if let Some(run) = self.store.evaluation_runs.get(run_id) {
            tracing::info!(
                run_id,
                overall_score = ?run.overall_score,
                completed = run.completed_test_cases,
                failed = run.failed_test_cases,
                "evaluation run completed"
            );
        }
    }

    fn mark_failed(&self, run_id: &str, error: &str) {
        tracing::error!(run_id, error, "evaluation run failed");
        self.store.evaluation_runs.update(run_id, |run| {
            run.status = EvaluationRunStatus::Failed;
            run.error_message = Some(error.to_string());
            run.completed_at = Some(Utc::now());
        });
    }

    fn update_row<F>(&self, run_id: &str, test_case_id: &str, patch: F)
    where
        F: FnOnce(&mut TestCaseResult),
    {
        self.store.evaluation_runs.update(run_id, |run| {
            run.update_result(test_case_id, patch);
        });
    }
}

fn correlation_metadata(run_id: &str, test_case_id: &str) -> serde_json::Map<String, Value> {
    let mut metadata = serde_json::Map::new();
    metadata.insert(
        "evaluation_run_id".into(),
        Value::String(run_id.to_string()),
    );
    metadata.insert("test_case_id".into(), Value::String(test_case_id.into()));
    metadata
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    // ── Score parser ────────────────────────────────────────────────

    #[test]
    fn tagged_decimal_score() {
        assert_eq!(parse_score("Score: 0.73\nReasoning: solid"), Some(0.73));
    }

    #[test]
    fn tagged_fraction_score() {
        assert_eq!(parse_score("Score: 7/10"), Some(0.7));
    }

    #[test]
    fn tagged_hundred_scale() {
        assert_eq!(parse_score("Score: 85"), Some(0.85));
    }

    #[test]
    fn fifty_divides_by_hundred() {
        // The ÷10-then-÷100 precedence makes 50 → 0.5, not 0.05.
        assert_eq!(parse_score("Score: 50"), Some(0.5));
    }

    #[test]
    fn ten_scale_division() {
        assert_eq!(parse_score("Score: 7"), Some(0.7));
        assert_eq!(parse_score("score: 1.0"), Some(1.0));
    }

    #[test]
    fn unparseable_yields_none() {
        assert_eq!(parse_score("n/a"), None);
        assert_eq!(parse_score("no verdict"), None);
    }

    #[test]
    fn untagged_numeric_fallback() {
        assert_eq!(parse_score("I would rate this 0.9 overall"), Some(0.9));
        assert_eq!(parse_score("around 8 out of ten"), Some(0.8));
    }

    #[test]
    fn out_of_range_rejected() {
        assert_eq!(parse_score("Score: 1500"), None);
    }

    #[test]
    fn case_insensitive_tag() {
        assert_eq!(parse_score("SCORE: 0.4"), Some(0.4));
    }

    // ── Grader prompt contract ──────────────────────────────────────

    #[test]
    fn grading_prompt_contains_contract_sections() {
        let prompt = grading_prompt("2+2?", "4", "4", "exact match", "arithmetic accuracy");
        for section in [
            "You are an expert evaluator.",
            "**Task/Query:**\n2+2?",
            "**Expected Output:**\n4",
            "**Actual Response:**\n4",
            "**Evaluation Guideline:**\nexact match",
            "**Overall Criteria:**\narithmetic accuracy",
            "**Required Response Format:**",
            "Score: [0.0-1.0]",
            "Reasoning: [Your detailed explanation]",
        ] {
            assert!(prompt.contains(section), "missing section: {section}");
        }
    }
}
