use crate::types::{PerTestResult, Submission, SubmissionStatus};
use futures_util::stream::TryStreamExt;
use mongodb::bson::{doc, to_bson, Bson};
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection};

/// Non-terminal states a grading transition is allowed to start from.
const NON_TERMINAL: [&str; 2] = ["Pending", "Running"];

/// Submission document store.
///
/// All mutations go through atomic `find_one_and_update` calls keyed by
/// submission id, so concurrent workers and redelivered jobs cannot race a
/// terminal transition.
#[derive(Clone)]
pub struct SubmissionStore {
    submissions: Collection<Submission>,
}

impl SubmissionStore {
    pub async fn connect(uri: &str, db: &str) -> mongodb::error::Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        Ok(Self {
            submissions: client.database(db).collection("submissions"),
        })
    }

    pub fn with_collection(submissions: Collection<Submission>) -> Self {
        Self { submissions }
    }

    pub async fn insert(&self, submission: &Submission) -> mongodb::error::Result<()> {
        self.submissions.insert_one(submission).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> mongodb::error::Result<Option<Submission>> {
        self.submissions.find_one(doc! { "id": id }).await
    }

    /// Owner's submissions, newest first.
    pub async fn find_by_user(&self, user_id: &str) -> mongodb::error::Result<Vec<Submission>> {
        let cursor = self
            .submissions
            .find(doc! { "userId": user_id })
            .sort(doc! { "createdAt": -1 })
            .await?;
        cursor.try_collect().await
    }

    /// Atomic `Pending → Running` transition. Returns the pre-image, or
    /// `None` when the submission is absent or already past `Pending` -
    /// the redelivery idempotency gate.
    pub async fn mark_running(&self, id: &str) -> mongodb::error::Result<Option<Submission>> {
        self.submissions
            .find_one_and_update(
                doc! { "id": id, "status": "Pending" },
                doc! { "$set": { "status": "Running" } },
            )
            .return_document(ReturnDocument::Before)
            .await
    }

    /// Incremental write of cumulative results while grading is in flight.
    /// The document status stays `Running`; verdict-so-far lives only in
    /// the progress events.
    pub async fn record_progress(
        &self,
        id: &str,
        results: &[PerTestResult],
        passed: u32,
        total: u32,
        percent: u32,
    ) -> mongodb::error::Result<()> {
        let results: Bson = to_bson(results)?;
        self.submissions
            .update_one(
                doc! { "id": id, "status": { "$in": NON_TERMINAL.to_vec() } },
                doc! { "$set": {
                    "results": results,
                    "passedCount": passed,
                    "totalCount": total,
                    "percent": percent,
                } },
            )
            .await?;
        Ok(())
    }

    /// Atomic terminal transition. Only matches non-terminal documents;
    /// `None` means a terminal state already won and this write was a
    /// no-op (redelivered job, crashed-and-recovered worker).
    pub async fn finalize(
        &self,
        id: &str,
        status: SubmissionStatus,
        results: &[PerTestResult],
        passed: u32,
        total: u32,
        percent: u32,
    ) -> mongodb::error::Result<Option<Submission>> {
        let results: Bson = to_bson(results)?;
        self.submissions
            .find_one_and_update(
                doc! { "id": id, "status": { "$in": NON_TERMINAL.to_vec() } },
                doc! { "$set": {
                    "status": status.as_str(),
                    "results": results,
                    "passedCount": passed,
                    "totalCount": total,
                    "percent": percent,
                } },
            )
            .return_document(ReturnDocument::After)
            .await
    }
}
