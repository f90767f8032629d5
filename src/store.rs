use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::stats::MatchStats;
use crate::domain::submission::{Submission, SubmissionStatus};
use crate::fields;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("match statistics document {0} does not exist")]
    MissingDocument(Uuid),
    #[error("stored document {0} could not be decoded")]
    CorruptDocument(Uuid, #[source] serde_json::Error),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// The persistence collaborator. Everything the core needs from the
/// surrounding application's document store.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// All submissions for the match whose status is exactly `approved`,
    /// in storage order.
    async fn list_approved(&self, match_id: Uuid) -> Result<Vec<Submission>, StoreError>;

    async fn get_match_stats(&self, uuid: Uuid) -> Result<Option<MatchStats>, StoreError>;

    /// Idempotent full-document write.
    async fn put_match_stats(&self, stats: &MatchStats) -> Result<(), StoreError>;

    /// Partial update: writes each dotted path into the stored document
    /// without disturbing sibling fields. Fails if the document does not
    /// exist.
    async fn patch_match_stats(
        &self,
        uuid: Uuid,
        updates: Vec<(String, Value)>,
    ) -> Result<(), StoreError>;
}

/// In-memory document store. Backs the test suite and embedders that
/// have no external store. Statistics documents are held as raw JSON so
/// patches are genuine nested-path writes against the persisted shape.
#[derive(Debug, Default)]
pub struct MemoryStore {
    submissions: RwLock<Vec<Submission>>,
    match_stats: RwLock<HashMap<Uuid, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a submission. Submission CRUD is outside the aggregation
    /// core, so this is an inherent method rather than part of the trait.
    pub async fn insert_submission(&self, submission: Submission) {
        self.submissions.write().await.push(submission);
    }

    /// Flips a submission's lifecycle status. Returns false if no
    /// submission with that id exists.
    pub async fn set_submission_status(&self, uuid: Uuid, status: SubmissionStatus) -> bool {
        let mut submissions = self.submissions.write().await;
        match submissions.iter_mut().find(|s| s.uuid == uuid) {
            Some(submission) => {
                submission.status = status;
                true
            }
            None => false,
        }
    }

    /// The raw stored document, for tests that assert on patch behavior.
    pub async fn raw_match_stats(&self, uuid: Uuid) -> Option<Value> {
        self.match_stats.read().await.get(&uuid).cloned()
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn list_approved(&self, match_id: Uuid) -> Result<Vec<Submission>, StoreError> {
        let submissions = self.submissions.read().await;
        Ok(submissions
            .iter()
            .filter(|s| s.match_id == match_id && s.is_approved())
            .cloned()
            .collect())
    }

    async fn get_match_stats(&self, uuid: Uuid) -> Result<Option<MatchStats>, StoreError> {
        let stats = self.match_stats.read().await;
        match stats.get(&uuid) {
            Some(doc) => serde_json::from_value(doc.clone())
                .map(Some)
                .map_err(|e| StoreError::CorruptDocument(uuid, e)),
            None => Ok(None),
        }
    }

    async fn put_match_stats(&self, stats: &MatchStats) -> Result<(), StoreError> {
        let doc = serde_json::to_value(stats).map_err(|e| StoreError::Backend(e.into()))?;
        self.match_stats.write().await.insert(stats.uuid, doc);
        Ok(())
    }

    async fn patch_match_stats(
        &self,
        uuid: Uuid,
        updates: Vec<(String, Value)>,
    ) -> Result<(), StoreError> {
        let mut stats = self.match_stats.write().await;
        let doc = stats
            .get_mut(&uuid)
            .ok_or(StoreError::MissingDocument(uuid))?;
        for (path, value) in updates {
            fields::set_path(doc, &path, value);
        }
        Ok(())
    }
}
