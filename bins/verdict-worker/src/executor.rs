/// Executor - Per-Test-Case Orchestration
///
/// **Core Responsibility:**
/// For one `(problem, user code, language)` triple, drive the sandbox
/// once per test case and classify each raw run into a per-test result.
///
/// **Critical Architectural Boundary:**
/// - The executor receives only user code plus the stub struct; source
///   assembly happens in the harness
/// - The executor knows nothing about queues, the store, or progress
///   events (coordinator's job)
/// - The sandbox backend is generic, so tests run against an in-memory
///   fake
///
/// **Short-circuit policy (documented invariant):**
/// A test case classified `RE` or `TLE` stops further container
/// launches; the remaining results are pre-filled with the same error.
/// A `WA` case continues to the end so the submitter sees every failing
/// case. Test cases always run strictly sequentially.
use crate::harness::{self, Assembled};
use crate::sandbox::{ResourceLimits, RunOutput, RunSpec, Sandbox, SandboxError};
use anyhow::{Context, Result};
use std::time::Duration;
use verdict_common::config::Config;
use verdict_common::types::{Language, PerTestResult, Problem, SubmissionStatus, TestCase};

pub const TIMEOUT_SENTINEL: &str = "Time Limit Exceeded";
pub const IMAGE_UNAVAILABLE: &str = "image unavailable";

/// Classification of a single test-case run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseClass {
    Passed,
    WrongAnswer,
    RuntimeError,
    TimedOut,
}

impl CaseClass {
    pub fn is_fatal(self) -> bool {
        matches!(self, CaseClass::RuntimeError | CaseClass::TimedOut)
    }

    pub fn verdict(self) -> SubmissionStatus {
        match self {
            CaseClass::Passed => SubmissionStatus::Success,
            CaseClass::WrongAnswer => SubmissionStatus::Wa,
            CaseClass::RuntimeError => SubmissionStatus::Re,
            CaseClass::TimedOut => SubmissionStatus::Tle,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaseOutcome {
    pub result: PerTestResult,
    pub class: CaseClass,
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub test_timeout: Duration,
    pub compile_run_timeout: Duration,
    pub memory_bytes: i64,
    pub cpu_period: i64,
    pub cpu_quota: i64,
}

impl ExecutorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            test_timeout: Duration::from_millis(config.test_timeout_ms),
            compile_run_timeout: Duration::from_millis(config.compile_run_timeout_ms),
            memory_bytes: config.memory_limit_bytes(),
            cpu_period: config.cpu_period,
            cpu_quota: config.cpu_quota,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            test_timeout: Duration::from_secs(4),
            compile_run_timeout: Duration::from_secs(10),
            memory_bytes: 512 * 1024 * 1024,
            cpu_period: 100_000,
            cpu_quota: 50_000,
        }
    }
}

/// Assembled source plus the limits every case of this submission runs
/// under. Built once per submission.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub assembled: Assembled,
    pub limits: ResourceLimits,
}

pub struct Executor<S> {
    sandbox: S,
    config: ExecutorConfig,
}

impl<S: Sandbox> Executor<S> {
    pub fn new(sandbox: S, config: ExecutorConfig) -> Self {
        Self { sandbox, config }
    }

    /// Stub lookup and source assembly, once per submission.
    pub fn prepare(
        &self,
        problem: &Problem,
        user_code: &str,
        language: Language,
    ) -> Result<Prepared> {
        let stub = problem.stub_for(language).context("stub not found")?;
        let assembled = harness::assemble(language, stub, user_code)?;

        let wall_time = if assembled.combined_compile {
            self.config.compile_run_timeout
        } else {
            self.config.test_timeout
        };

        Ok(Prepared {
            assembled,
            limits: ResourceLimits {
                memory_bytes: self.config.memory_bytes,
                cpu_period: self.config.cpu_period,
                cpu_quota: self.config.cpu_quota,
                wall_time,
            },
        })
    }

    /// One sandbox invocation for one test case.
    pub async fn run_case(&self, prepared: &Prepared, testcase: &TestCase) -> CaseOutcome {
        let spec = RunSpec {
            image: prepared.assembled.image.to_string(),
            cmd: prepared.assembled.command.clone(),
            stdin: testcase.input.clone(),
            limits: prepared.limits.clone(),
        };

        match self.sandbox.run(&spec).await {
            Ok(output) => classify(testcase, &output),
            Err(SandboxError::ImageUnavailable { .. }) => {
                failure(testcase, "", IMAGE_UNAVAILABLE, CaseClass::RuntimeError)
            }
            Err(e) => failure(testcase, "", &e.to_string(), CaseClass::RuntimeError),
        }
    }

    /// The plain contract: all cases in order, honoring the
    /// short-circuit policy.
    pub async fn execute(
        &self,
        problem: &Problem,
        user_code: &str,
        language: Language,
    ) -> Result<Vec<PerTestResult>> {
        let prepared = self.prepare(problem, user_code, language)?;
        let mut results = Vec::with_capacity(problem.testcases.len());

        for testcase in &problem.testcases {
            let outcome = self.run_case(&prepared, testcase).await;
            let fatal = outcome.class.is_fatal();
            let error = outcome.result.error.clone();
            results.push(outcome.result);

            if fatal {
                Self::fill_remaining(&mut results, &problem.testcases, &error);
                break;
            }
        }

        Ok(results)
    }

    /// Pre-fill the cases skipped by a fatal short-circuit with the
    /// same error.
    pub fn fill_remaining(results: &mut Vec<PerTestResult>, testcases: &[TestCase], error: &str) {
        for testcase in &testcases[results.len()..] {
            results.push(PerTestResult {
                testcase: testcase.clone(),
                output: String::new(),
                passed: false,
                error: error.to_string(),
            });
        }
    }
}

/// Classify one raw run. Precedence: timeout, stderr/non-zero exit,
/// output mismatch. Actual and expected are both trimmed before the
/// bytewise compare.
fn classify(testcase: &TestCase, output: &RunOutput) -> CaseOutcome {
    let actual = output.stdout.trim();

    if output.timed_out {
        return failure(testcase, actual, TIMEOUT_SENTINEL, CaseClass::TimedOut);
    }

    let stderr = output.stderr.trim();
    if !stderr.is_empty() {
        return failure(testcase, actual, stderr, CaseClass::RuntimeError);
    }
    if output.exit_code != 0 {
        let error = format!("exit status {}", output.exit_code);
        return failure(testcase, actual, &error, CaseClass::RuntimeError);
    }

    if actual != testcase.expected_output.trim() {
        return CaseOutcome {
            result: PerTestResult {
                testcase: testcase.clone(),
                output: actual.to_string(),
                passed: false,
                error: String::new(),
            },
            class: CaseClass::WrongAnswer,
        };
    }

    CaseOutcome {
        result: PerTestResult {
            testcase: testcase.clone(),
            output: actual.to_string(),
            passed: true,
            error: String::new(),
        },
        class: CaseClass::Passed,
    }
}

fn failure(testcase: &TestCase, output: &str, error: &str, class: CaseClass) -> CaseOutcome {
    CaseOutcome {
        result: PerTestResult {
            testcase: testcase.clone(),
            output: output.to_string(),
            passed: false,
            error: error.to_string(),
        },
        class,
    }
}
