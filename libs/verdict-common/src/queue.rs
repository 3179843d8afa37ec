use crate::types::Job;
use redis::{AsyncCommands, RedisResult};

/// Redis queue semantics - defines only semantics, not runtime logic.
/// Keeps the API and worker on the same key so they never drift.

pub const SUBMISSION_QUEUE: &str = "submission-queue";

/// Push a job onto the submission queue.
/// Uses RPUSH for FIFO semantics.
pub async fn push_job(
    conn: &mut redis::aio::ConnectionManager,
    job: &Job,
) -> RedisResult<()> {
    let payload = serde_json::to_string(job)
        .map_err(|e| redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string())))?;

    conn.rpush(SUBMISSION_QUEUE, payload).await
}

/// Pop the next job from the submission queue.
/// Uses BLPOP with a timeout so the worker loop can poll for shutdown.
pub async fn pop_job(
    conn: &mut redis::aio::ConnectionManager,
    timeout_seconds: f64,
) -> RedisResult<Option<Job>> {
    let result: Option<(String, String)> = conn.blpop(SUBMISSION_QUEUE, timeout_seconds).await?;

    match result {
        Some((_key, payload)) => {
            let job: Job = serde_json::from_str(&payload)
                .map_err(|e| redis::RedisError::from((redis::ErrorKind::TypeError, "deserialization error", e.to_string())))?;
            Ok(Some(job))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Language, Problem, TestCase};

    #[test]
    fn test_job_payload_roundtrip() {
        let job = Job {
            submission_id: "s1".to_string(),
            user_id: "u1".to_string(),
            problem_id: "p1".to_string(),
            language: Language::Cpp,
            user_code: "int f() { return 0; }".to_string(),
            problem: Problem {
                id: "p1".to_string(),
                title: "Sample".to_string(),
                testcases: vec![TestCase {
                    id: "t1".to_string(),
                    input: "1".to_string(),
                    expected_output: "1".to_string(),
                }],
                code_stubs: vec![],
            },
        };

        let payload = serde_json::to_string(&job).unwrap();
        let back: Job = serde_json::from_str(&payload).unwrap();

        assert_eq!(back.submission_id, "s1");
        assert_eq!(back.language, Language::Cpp);
        assert_eq!(back.problem.testcases.len(), 1);
    }

    #[test]
    fn test_queue_name() {
        assert_eq!(SUBMISSION_QUEUE, "submission-queue");
    }
}
