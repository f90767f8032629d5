use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use super::observation::ObservationData;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all="lowercase")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

/// One scout's observation record, wrapped with identity and review state.
///
/// Immutable once approved, except for the status and approval metadata.
/// Only submissions with `status == Approved` ever reach aggregation.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all="camelCase")]
pub struct Submission {
    pub uuid: Uuid,
    pub match_id: Uuid,
    pub data: ObservationData,
    pub created_by: Uuid,
    pub created_by_name: String,
    pub created_at: DateTime<Utc>,
    pub status: SubmissionStatus,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Submission {
    pub fn is_approved(&self) -> bool {
        self.status == SubmissionStatus::Approved
    }
}
