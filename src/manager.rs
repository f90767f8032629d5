use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

use crate::aggregate::{aggregate_match_stats, AggregationError, AggregationOptions};
use crate::domain::stats::{match_stats_uuid, MatchStats};
use crate::fields;
use crate::store::StatsStore;

/// Entry point for aggregation and conflict resolution against one store.
///
/// All operations on the same statistics document are serialized through
/// a per-document async mutex, so a resolution can never race a
/// re-aggregation (or another resolution) into a lost update. Operations
/// on different matches proceed concurrently.
pub struct StatsManager<S> {
    store: S,
    options: AggregationOptions,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl<S: StatsStore> StatsManager<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, AggregationOptions::default())
    }

    pub fn with_options(store: S, options: AggregationOptions) -> Self {
        StatsManager {
            store,
            options,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn document_lock(&self, uuid: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(uuid).or_default().clone()
    }

    /// Rebuilds the statistics document for a match from its approved
    /// submissions. `None` when the match has no approved submissions.
    pub async fn aggregate_match(
        &self,
        match_id: Uuid,
    ) -> Result<Option<MatchStats>, AggregationError> {
        let lock = self.document_lock(match_stats_uuid(match_id)).await;
        let _guard = lock.lock().await;

        match aggregate_match_stats(&self.store, match_id, &self.options).await {
            Ok(stats) => Ok(stats),
            Err(err) => {
                error!(%match_id, error = %err, "failed to aggregate match statistics");
                Err(err)
            }
        }
    }

    /// Marks one conflict resolved with a human-selected value, merges
    /// the value into the team's resolved record and patches only the
    /// affected team sub-record plus the match-level flag and timestamp.
    ///
    /// The selected value is trusted to be one of the conflict's recorded
    /// values; membership is enforced at the review-UI boundary, not here.
    pub async fn resolve_conflict(
        &self,
        stats_uuid: Uuid,
        team_number: &str,
        conflict_index: usize,
        selected_value: Value,
    ) -> Result<MatchStats, AggregationError> {
        let lock = self.document_lock(stats_uuid).await;
        let _guard = lock.lock().await;

        let result = self
            .apply_resolution(stats_uuid, team_number, conflict_index, selected_value)
            .await;
        if let Err(err) = &result {
            error!(%stats_uuid, team_number, conflict_index, error = %err, "failed to resolve conflict");
        }
        result
    }

    async fn apply_resolution(
        &self,
        stats_uuid: Uuid,
        team_number: &str,
        conflict_index: usize,
        selected_value: Value,
    ) -> Result<MatchStats, AggregationError> {
        let mut stats = self
            .store
            .get_match_stats(stats_uuid)
            .await?
            .ok_or(AggregationError::StatsNotFound(stats_uuid))?;

        let now = Utc::now();

        let team = stats
            .team_stats
            .get_mut(team_number)
            .ok_or_else(|| AggregationError::UnknownTeam {
                stats_uuid,
                team_number: team_number.to_string(),
            })?;

        let len = team.conflicts.len();
        let conflict = team.conflicts.get_mut(conflict_index).ok_or(
            AggregationError::ConflictIndexOutOfRange {
                team_number: team_number.to_string(),
                index: conflict_index,
                len,
            },
        )?;

        conflict.resolved = true;
        conflict.selected_value = Some(selected_value.clone());
        let field_path = conflict.field_path.clone();

        fields::set_path(&mut team.resolved_data, &field_path, selected_value);
        team.last_updated = now;

        let team_doc = serde_json::to_value(&*team).map_err(AggregationError::Encode)?;

        stats.recompute_unresolved_flag();
        stats.last_updated = now;

        self.store
            .patch_match_stats(
                stats_uuid,
                vec![
                    (format!("teamStats.{}", team_number), team_doc),
                    (
                        "hasUnresolvedConflicts".to_string(),
                        Value::Bool(stats.has_unresolved_conflicts),
                    ),
                    (
                        "lastUpdated".to_string(),
                        serde_json::to_value(now).map_err(AggregationError::Encode)?,
                    ),
                ],
            )
            .await?;

        info!(
            %stats_uuid,
            team_number,
            field = fields::field_label(&field_path),
            "conflict resolved"
        );

        Ok(stats)
    }
}
