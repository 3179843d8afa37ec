use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported submission languages. The wire tag is the uppercase form used
/// by the problem catalog and the HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "JAVA")]
    Java,
    #[serde(rename = "PYTHON")]
    Python,
    #[serde(rename = "CPP")]
    Cpp,
}

impl Language {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "JAVA" => Some(Language::Java),
            "PYTHON" => Some(Language::Python),
            "CPP" => Some(Language::Cpp),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            Language::Java => "JAVA",
            Language::Python => "PYTHON",
            Language::Cpp => "CPP",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Language::Java => "java",
            Language::Python => "python",
            Language::Cpp => "cpp",
        };
        write!(f, "{}", name)
    }
}

/// Submission lifecycle states.
///
/// `Pending → Running → {Success, WA, RE, TLE, Failed}`; terminal states
/// are sinks and the store refuses terminal-to-terminal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Pending,
    Running,
    Success,
    #[serde(rename = "WA")]
    Wa,
    #[serde(rename = "RE")]
    Re,
    #[serde(rename = "TLE")]
    Tle,
    Failed,
}

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubmissionStatus::Pending | SubmissionStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "Pending",
            SubmissionStatus::Running => "Running",
            SubmissionStatus::Success => "Success",
            SubmissionStatus::Wa => "WA",
            SubmissionStatus::Re => "RE",
            SubmissionStatus::Tle => "TLE",
            SubmissionStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    #[serde(default)]
    pub id: String,
    pub input: String,
    pub expected_output: String,
}

/// Problem-supplied boilerplate framing user code for one language.
///
/// `start_snippet` opens the outer class and imports, `user_snippet` is the
/// solution method signature (the submitter replaces it with a filled-in
/// method), `end_snippet` closes the class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeStub {
    pub language: Language,
    pub start_snippet: String,
    pub user_snippet: String,
    pub end_snippet: String,
}

/// Read-only problem snapshot fetched from the catalog service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub testcases: Vec<TestCase>,
    #[serde(default)]
    pub code_stubs: Vec<CodeStub>,
}

impl Problem {
    pub fn stub_for(&self, language: Language) -> Option<&CodeStub> {
        self.code_stubs.iter().find(|s| s.language == language)
    }
}

/// Outcome of a single test case, embedded in the submission document and
/// in every progress event.
///
/// Invariant: `passed ⇔ error.is_empty() && output == expected_output`
/// (both sides trimmed).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerTestResult {
    pub testcase: TestCase,
    pub output: String,
    pub passed: bool,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub user_id: String,
    pub problem_id: String,
    pub code: String,
    pub language: Language,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub results: Vec<PerTestResult>,
    pub passed_count: u32,
    pub total_count: u32,
    pub percent: u32,
    pub created_at: DateTime<Utc>,
}

/// Queue payload. Carries the full problem snapshot so grading is pinned
/// to the catalog state at submission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub submission_id: String,
    pub user_id: String,
    pub problem_id: String,
    pub language: Language,
    pub user_code: String,
    pub problem: Problem,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Progress {
    pub completed: u32,
    pub total: u32,
}

/// Server-pushed grading update. `results` is cumulative and append-only
/// across the events of one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub submission_id: String,
    pub status: SubmissionStatus,
    pub progress: Progress,
    pub percent: u32,
    pub passed_count: u32,
    pub total_count: u32,
    pub results: Vec<PerTestResult>,
    /// Worker error message on `Failed` events; empty otherwise.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

/// Worker-to-endpoint push body for the `/internal/push` bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEnvelope {
    pub user_id: String,
    pub submission_id: String,
    pub data: ProgressEvent,
}

/// Percentage of passed cases, rounded to the nearest integer.
pub fn percent(passed: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    ((passed as f64) * 100.0 / (total as f64)).round() as u32
}
