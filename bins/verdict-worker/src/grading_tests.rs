//! Integration tests for the worker-side grading state machine.
//!
//! These run the real coordinator against a live MongoDB with the
//! sandbox faked, and verify:
//! 1. Pending → Running → terminal transitions persist correctly
//! 2. Redelivered jobs for terminal submissions are no-ops
//! 3. Pre-execution failures land in `Failed`

use crate::coordinator::Coordinator;
use crate::executor::{Executor, ExecutorConfig};
use crate::progress::ProgressEmitter;
use crate::sandbox::testutil::FakeSandbox;
use crate::sandbox::{RunOutput, SandboxError};
use chrono::Utc;
use uuid::Uuid;
use verdict_common::store::SubmissionStore;
use verdict_common::types::{
    CodeStub, Job, Language, Problem, Submission, SubmissionStatus, TestCase,
};

/// Requires a running MongoDB instance.
async fn test_store() -> SubmissionStore {
    SubmissionStore::connect("mongodb://127.0.0.1:27017", "verdict_test")
        .await
        .expect("Failed to connect to MongoDB")
}

fn python_stub() -> CodeStub {
    CodeStub {
        language: Language::Python,
        start_snippet: "class Solution:".to_string(),
        user_snippet: "    def echo(self, n):".to_string(),
        end_snippet: String::new(),
    }
}

fn make_job(with_stub: bool) -> Job {
    let testcases = vec![
        TestCase {
            id: "t1".to_string(),
            input: "1".to_string(),
            expected_output: "1".to_string(),
        },
        TestCase {
            id: "t2".to_string(),
            input: "2".to_string(),
            expected_output: "2".to_string(),
        },
    ];
    Job {
        submission_id: Uuid::new_v4().to_string(),
        user_id: "u1".to_string(),
        problem_id: "p1".to_string(),
        language: Language::Python,
        user_code: "    def echo(self, n):\n        return n".to_string(),
        problem: Problem {
            id: "p1".to_string(),
            title: "Echo".to_string(),
            testcases,
            code_stubs: if with_stub { vec![python_stub()] } else { vec![] },
        },
    }
}

async fn seed_pending(store: &SubmissionStore, job: &Job) {
    let submission = Submission {
        id: job.submission_id.clone(),
        user_id: job.user_id.clone(),
        problem_id: job.problem_id.clone(),
        code: job.user_code.clone(),
        language: job.language,
        status: SubmissionStatus::Pending,
        results: vec![],
        passed_count: 0,
        total_count: job.problem.testcases.len() as u32,
        percent: 0,
        created_at: Utc::now(),
    };
    store.insert(&submission).await.expect("insert failed");
}

fn coordinator(
    store: SubmissionStore,
    responses: Vec<Result<RunOutput, SandboxError>>,
) -> Coordinator<FakeSandbox> {
    Coordinator::new(
        store,
        Executor::new(FakeSandbox::new(responses), ExecutorConfig::default()),
        ProgressEmitter::new(vec![]),
    )
}

#[tokio::test]
#[ignore] // Requires MongoDB
async fn test_full_pass_reaches_success() {
    let store = test_store().await;
    let job = make_job(true);
    seed_pending(&store, &job).await;

    coordinator(
        store.clone(),
        vec![FakeSandbox::ok("1\n"), FakeSandbox::ok("2\n")],
    )
    .handle_job(&job)
    .await;

    let submission = store
        .find_by_id(&job.submission_id)
        .await
        .unwrap()
        .expect("submission should exist");

    assert_eq!(submission.status, SubmissionStatus::Success);
    assert_eq!(submission.results.len(), 2);
    assert_eq!(submission.passed_count, 2);
    assert_eq!(submission.percent, 100);
    assert!(submission.results.iter().all(|r| r.passed));
}

#[tokio::test]
#[ignore] // Requires MongoDB
async fn test_timeout_reaches_tle_with_prefilled_results() {
    let store = test_store().await;
    let job = make_job(true);
    seed_pending(&store, &job).await;

    coordinator(store.clone(), vec![FakeSandbox::timeout()])
        .handle_job(&job)
        .await;

    let submission = store
        .find_by_id(&job.submission_id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(submission.status, SubmissionStatus::Tle);
    assert_eq!(submission.results.len(), 2);
    assert!(submission
        .results
        .iter()
        .all(|r| r.error == "Time Limit Exceeded"));
}

#[tokio::test]
#[ignore] // Requires MongoDB
async fn test_redelivery_of_terminal_submission_is_noop() {
    let store = test_store().await;
    let job = make_job(true);
    seed_pending(&store, &job).await;

    coordinator(
        store.clone(),
        vec![FakeSandbox::ok("1\n"), FakeSandbox::ok("2\n")],
    )
    .handle_job(&job)
    .await;

    // Second delivery would grade everything wrong if it ran.
    coordinator(
        store.clone(),
        vec![FakeSandbox::ok("wrong"), FakeSandbox::ok("wrong")],
    )
    .handle_job(&job)
    .await;

    let submission = store
        .find_by_id(&job.submission_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(submission.status, SubmissionStatus::Success);
    assert_eq!(submission.passed_count, 2);
}

#[tokio::test]
#[ignore] // Requires MongoDB
async fn test_missing_stub_reaches_failed() {
    let store = test_store().await;
    let job = make_job(false);
    seed_pending(&store, &job).await;

    coordinator(store.clone(), vec![]).handle_job(&job).await;

    let submission = store
        .find_by_id(&job.submission_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(submission.status, SubmissionStatus::Failed);
    assert!(submission.results.is_empty());
}
