pub use crate::domain::observation::{
    Alliance, ClimbLevel, ObservationData, ObservationParseError, PhaseObservation,
};
pub use crate::domain::stats::{
    match_stats_uuid, ConflictField, FieldValueGroup, MatchStats, TeamMatchStats,
};
pub use crate::domain::submission::{Submission, SubmissionStatus};

pub use crate::aggregate::{AggregationError, AggregationOptions};
pub use crate::manager::StatsManager;
pub use crate::store::{MemoryStore, StatsStore, StoreError};

pub use uuid::Uuid;
