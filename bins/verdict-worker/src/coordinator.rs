/// Submission Coordinator - Worker-Side State Machine
///
/// **Core Responsibility:**
/// Consume one job, advance the submission through
/// `Pending → Running → {Success, WA, RE, TLE, Failed}`, persist after
/// every test case, and emit ordered progress events.
///
/// Redelivery discipline: `mark_running` only matches `Pending`, and
/// `finalize` only matches non-terminal documents, so a job redelivered
/// after a crash or a duplicate delivery cannot double-apply a terminal
/// transition. Terminal submissions emit no further events.
use crate::executor::{CaseClass, Executor};
use crate::progress::ProgressEmitter;
use crate::sandbox::Sandbox;
use tracing::{error, info, warn};
use verdict_common::store::SubmissionStore;
use verdict_common::types::{
    percent, Job, PerTestResult, Progress, ProgressEvent, SubmissionStatus,
};

pub struct Coordinator<S> {
    store: SubmissionStore,
    executor: Executor<S>,
    emitter: ProgressEmitter,
}

impl<S: Sandbox> Coordinator<S> {
    pub fn new(store: SubmissionStore, executor: Executor<S>, emitter: ProgressEmitter) -> Self {
        Self {
            store,
            executor,
            emitter,
        }
    }

    pub async fn handle_job(&self, job: &Job) {
        if let Err(e) = self.grade(job).await {
            error!(submission_id = %job.submission_id, error = %e, "grading failed");
            self.fail(job, &e.to_string()).await;
        }
    }

    async fn grade(&self, job: &Job) -> anyhow::Result<()> {
        let testcases = &job.problem.testcases;
        let total = testcases.len() as u32;

        let previous = self.store.mark_running(&job.submission_id).await?;
        if previous.is_none() {
            info!(
                submission_id = %job.submission_id,
                "submission already picked up or terminal, dropping job"
            );
            return Ok(());
        }

        if testcases.is_empty() {
            self.fail(job, "problem has no test cases").await;
            return Ok(());
        }

        self.emitter
            .emit(
                &job.user_id,
                &build_event(job, SubmissionStatus::Running, &[], total, ""),
            )
            .await;

        let prepared = match self
            .executor
            .prepare(&job.problem, &job.user_code, job.language)
        {
            Ok(prepared) => prepared,
            Err(e) => {
                self.fail(job, &e.to_string()).await;
                return Ok(());
            }
        };

        let mut results: Vec<PerTestResult> = Vec::with_capacity(testcases.len());
        let mut verdict_so_far = SubmissionStatus::Running;

        for testcase in testcases {
            let outcome = self.executor.run_case(&prepared, testcase).await;
            let class = outcome.class;
            let case_error = outcome.result.error.clone();
            results.push(outcome.result);

            if class.is_fatal() {
                Executor::<S>::fill_remaining(&mut results, testcases, &case_error);
                self.finish(job, class.verdict(), &results, total).await?;
                return Ok(());
            }

            if class == CaseClass::WrongAnswer {
                verdict_so_far = SubmissionStatus::Wa;
            }

            if results.len() == testcases.len() {
                let status = if verdict_so_far == SubmissionStatus::Running {
                    SubmissionStatus::Success
                } else {
                    verdict_so_far
                };
                self.finish(job, status, &results, total).await?;
                return Ok(());
            }

            let passed = passed_count(&results);
            self.store
                .record_progress(
                    &job.submission_id,
                    &results,
                    passed,
                    total,
                    percent(passed, total),
                )
                .await?;
            self.emitter
                .emit(
                    &job.user_id,
                    &build_event(job, verdict_so_far, &results, total, ""),
                )
                .await;
        }

        Ok(())
    }

    /// Terminal transition plus the final event. Skips the event when a
    /// terminal state already won the race.
    async fn finish(
        &self,
        job: &Job,
        status: SubmissionStatus,
        results: &[PerTestResult],
        total: u32,
    ) -> anyhow::Result<()> {
        let passed = passed_count(results);
        let updated = self
            .store
            .finalize(
                &job.submission_id,
                status,
                results,
                passed,
                total,
                percent(passed, total),
            )
            .await?;

        if updated.is_none() {
            warn!(
                submission_id = %job.submission_id,
                "already terminal, dropping duplicate finalize"
            );
            return Ok(());
        }

        info!(
            submission_id = %job.submission_id,
            status = %status,
            passed = passed,
            total = total,
            "submission graded"
        );
        self.emitter
            .emit(&job.user_id, &build_event(job, status, results, total, ""))
            .await;
        Ok(())
    }

    /// Last-resort transition for pre-execution and unhandled errors.
    /// Store failures here are logged and swallowed; the queue's retry
    /// policy owns what happens next.
    async fn fail(&self, job: &Job, message: &str) {
        let total = job.problem.testcases.len() as u32;
        match self
            .store
            .finalize(&job.submission_id, SubmissionStatus::Failed, &[], 0, total, 0)
            .await
        {
            Ok(Some(_)) => {
                self.emitter
                    .emit(
                        &job.user_id,
                        &build_event(job, SubmissionStatus::Failed, &[], total, message),
                    )
                    .await;
            }
            Ok(None) => {
                warn!(
                    submission_id = %job.submission_id,
                    "already terminal, dropping failure transition"
                );
            }
            Err(e) => {
                error!(
                    submission_id = %job.submission_id,
                    error = %e,
                    "could not persist failure"
                );
            }
        }
    }
}

fn passed_count(results: &[PerTestResult]) -> u32 {
    results.iter().filter(|r| r.passed).count() as u32
}

/// One progress event with cumulative results.
fn build_event(
    job: &Job,
    status: SubmissionStatus,
    results: &[PerTestResult],
    total: u32,
    error: &str,
) -> ProgressEvent {
    let passed = passed_count(results);
    ProgressEvent {
        submission_id: job.submission_id.clone(),
        status,
        progress: Progress {
            completed: results.len() as u32,
            total,
        },
        percent: percent(passed, total),
        passed_count: passed,
        total_count: total,
        results: results.to_vec(),
        error: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_common::types::{Language, Problem, TestCase};

    fn job_with_cases(count: usize) -> Job {
        Job {
            submission_id: "s1".to_string(),
            user_id: "u1".to_string(),
            problem_id: "p1".to_string(),
            language: Language::Python,
            user_code: "    pass".to_string(),
            problem: Problem {
                id: "p1".to_string(),
                title: "Sample".to_string(),
                testcases: (0..count)
                    .map(|i| TestCase {
                        id: format!("t{}", i + 1),
                        input: i.to_string(),
                        expected_output: i.to_string(),
                    })
                    .collect(),
                code_stubs: vec![],
            },
        }
    }

    fn passing_result(testcase: &TestCase) -> PerTestResult {
        PerTestResult {
            testcase: testcase.clone(),
            output: testcase.expected_output.clone(),
            passed: true,
            error: String::new(),
        }
    }

    #[test]
    fn test_percent_sequence_over_a_passing_run() {
        // Two test cases: Running event, then one per completed case.
        let job = job_with_cases(2);
        let mut results = Vec::new();

        let start = build_event(&job, SubmissionStatus::Running, &results, 2, "");
        assert_eq!(start.percent, 0);
        assert_eq!(start.progress.completed, 0);

        results.push(passing_result(&job.problem.testcases[0]));
        let mid = build_event(&job, SubmissionStatus::Running, &results, 2, "");
        assert_eq!(mid.percent, 50);
        assert_eq!(mid.progress.completed, 1);

        results.push(passing_result(&job.problem.testcases[1]));
        let done = build_event(&job, SubmissionStatus::Success, &results, 2, "");
        assert_eq!(done.percent, 100);
        assert_eq!(done.progress.completed, 2);
        assert_eq!(done.passed_count, 2);
    }

    #[test]
    fn test_progress_completed_is_non_decreasing() {
        let job = job_with_cases(3);
        let mut results = Vec::new();
        let mut last_completed = 0;

        for testcase in &job.problem.testcases {
            results.push(passing_result(testcase));
            let event = build_event(&job, SubmissionStatus::Running, &results, 3, "");
            assert!(event.progress.completed >= last_completed);
            last_completed = event.progress.completed;
        }
    }

    #[test]
    fn test_failed_event_carries_error_message() {
        let job = job_with_cases(2);
        let event = build_event(&job, SubmissionStatus::Failed, &[], 2, "stub not found");

        assert_eq!(event.status, SubmissionStatus::Failed);
        assert_eq!(event.error, "stub not found");
        assert!(event.results.is_empty());
        assert_eq!(event.percent, 0);
    }

    #[test]
    fn test_event_results_are_cumulative() {
        let job = job_with_cases(2);
        let results = vec![
            passing_result(&job.problem.testcases[0]),
            passing_result(&job.problem.testcases[1]),
        ];

        let event = build_event(&job, SubmissionStatus::Success, &results, 2, "");
        assert_eq!(event.results.len(), 2);
        assert_eq!(event.results[0].testcase.id, "t1");
        assert_eq!(event.results[1].testcase.id, "t2");
    }
}
