use std::collections::HashMap;
use std::iter::zip;

use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::observation::ObservationData;
use crate::domain::stats::{
    match_stats_uuid, ConflictField, FieldValueGroup, MatchStats, TeamMatchStats,
};
use crate::domain::submission::Submission;
use crate::fields;
use crate::store::{StatsStore, StoreError};

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("observation data could not be serialized")]
    Encode(#[source] serde_json::Error),
    #[error("a team aggregate needs at least one submission")]
    EmptySubmissionGroup,
    #[error("no match statistics exist under id {0}")]
    StatsNotFound(Uuid),
    #[error("no statistics for team {team_number} in document {stats_uuid}")]
    UnknownTeam { stats_uuid: Uuid, team_number: String },
    #[error("conflict index {index} is out of range for team {team_number} ({len} conflicts)")]
    ConflictIndexOutOfRange {
        team_number: String,
        index: usize,
        len: usize,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct AggregationOptions {
    /// Carry previously resolved conflicts forward through re-aggregation
    /// when their distinct-value signature is unchanged. With this off,
    /// every run is a blind rebuild and human resolutions are lost.
    pub preserve_resolutions: bool,
}

impl Default for AggregationOptions {
    fn default() -> Self {
        AggregationOptions {
            preserve_resolutions: true,
        }
    }
}

/// Groups the distinct non-default values reported for one field across a
/// team's approved submissions. Values equal to the field's default are
/// skipped entirely; an empty result means every scout left the field
/// untouched. Groups appear in order of first occurrence.
pub fn detect_conflicts(
    submissions: &[Submission],
    field_path: &str,
) -> Result<Vec<FieldValueGroup>, AggregationError> {
    let docs = serialize_observations(submissions)?;
    Ok(detect_in_docs(submissions, &docs, field_path))
}

fn serialize_observations(submissions: &[Submission]) -> Result<Vec<Value>, AggregationError> {
    submissions
        .iter()
        .map(|s| serde_json::to_value(&s.data))
        .collect::<Result<_, _>>()
        .map_err(AggregationError::Encode)
}

fn detect_in_docs(
    submissions: &[Submission],
    docs: &[Value],
    field_path: &str,
) -> Vec<FieldValueGroup> {
    let mut groups: Vec<FieldValueGroup> = Vec::new();

    for (submission, doc) in zip(submissions, docs) {
        let Some(value) = fields::get_path(doc, field_path) else {
            continue;
        };
        if fields::is_default_value(field_path, value) {
            continue;
        }

        // Deep value equality, so equivalent values collapse into one
        // group regardless of submission order.
        let index = match groups.iter().position(|group| group.value == *value) {
            Some(index) => index,
            None => {
                groups.push(FieldValueGroup {
                    value: value.clone(),
                    submission_ids: Vec::new(),
                    submitted_by: Vec::new(),
                });
                groups.len() - 1
            }
        };

        let group = &mut groups[index];
        group.submission_ids.push(submission.uuid);
        if !group.submitted_by.contains(&submission.created_by_name) {
            group.submitted_by.push(submission.created_by_name.clone());
        }
    }

    groups
}

/// Builds the consolidated record for one team from its approved
/// submissions. The first submission supplies team number and alliance;
/// the rest are assumed to agree on those. Every stat field lands in
/// exactly one bucket: default-filled, single resolved value, or
/// unresolved conflict.
pub fn build_team_stats(
    match_id: Uuid,
    team_number: &str,
    submissions: &[Submission],
) -> Result<TeamMatchStats, AggregationError> {
    let first = submissions
        .first()
        .ok_or(AggregationError::EmptySubmissionGroup)?;
    let alliance = first.data.alliance;

    let docs = serialize_observations(submissions)?;

    let mut conflicts = Vec::new();
    let mut resolved_data = Value::Object(Map::new());

    for field_path in ObservationData::STAT_FIELD_PATHS {
        let mut groups = detect_in_docs(submissions, &docs, field_path);

        if groups.is_empty() {
            // Every observation was the default (or absent).
            if let Some(default) = fields::default_for_path(field_path) {
                fields::set_path(&mut resolved_data, field_path, default);
            }
        } else if groups.len() == 1 {
            let group = groups.remove(0);
            fields::set_path(&mut resolved_data, field_path, group.value);
        } else {
            conflicts.push(ConflictField {
                field_path: field_path.to_string(),
                values: groups,
                resolved: false,
                selected_value: None,
            });
        }
    }

    Ok(TeamMatchStats {
        match_id,
        team_number: team_number.to_string(),
        alliance,
        conflicts,
        resolved_data,
        last_updated: Utc::now(),
    })
}

/// Carries previously resolved conflicts into a freshly aggregated team
/// record. A resolution survives iff the same field still conflicts on
/// exactly the same set of distinct values; if new observations changed
/// the disagreement, the conflict reverts to unresolved for re-review.
pub fn carry_forward_resolutions(stats: &mut TeamMatchStats, previous: &TeamMatchStats) {
    for conflict in stats.conflicts.iter_mut() {
        let Some(prev) = previous
            .conflicts
            .iter()
            .find(|c| c.field_path == conflict.field_path)
        else {
            continue;
        };
        if !prev.resolved || prev.value_signature() != conflict.value_signature() {
            continue;
        }
        let Some(selected) = prev.selected_value.clone() else {
            continue;
        };
        conflict.resolved = true;
        conflict.selected_value = Some(selected.clone());
        fields::set_path(&mut stats.resolved_data, &conflict.field_path, selected);
    }
}

fn group_by_team(submissions: Vec<Submission>) -> Vec<(String, Vec<Submission>)> {
    let mut order: Vec<String> = Vec::new();
    let mut by_team: HashMap<String, Vec<Submission>> = HashMap::new();
    for submission in submissions {
        let team = submission.data.team_number.clone();
        if !by_team.contains_key(&team) {
            order.push(team.clone());
        }
        by_team.entry(team).or_default().push(submission);
    }
    order
        .into_iter()
        .filter_map(|team| {
            let group = by_team.remove(&team)?;
            Some((team, group))
        })
        .collect()
}

/// Rebuilds and persists the statistics document for a match from its
/// approved submissions. Returns `None`, writing nothing, when the match
/// has no approved submissions. Any store failure aborts the whole
/// operation.
pub async fn aggregate_match_stats<S: StatsStore>(
    store: &S,
    match_id: Uuid,
    options: &AggregationOptions,
) -> Result<Option<MatchStats>, AggregationError> {
    let submissions = store.list_approved(match_id).await?;

    if submissions.is_empty() {
        debug!(%match_id, "no approved submissions, nothing to aggregate");
        return Ok(None);
    }

    let uuid = match_stats_uuid(match_id);

    let previous = if options.preserve_resolutions {
        store.get_match_stats(uuid).await?
    } else {
        None
    };

    let mut team_stats = HashMap::new();
    for (team_number, group) in group_by_team(submissions) {
        let mut stats = build_team_stats(match_id, &team_number, &group)?;
        if let Some(prev_team) = previous.as_ref().and_then(|p| p.team_stats.get(&team_number)) {
            carry_forward_resolutions(&mut stats, prev_team);
        }
        team_stats.insert(team_number, stats);
    }

    let mut stats = MatchStats {
        uuid,
        match_id,
        team_stats,
        has_unresolved_conflicts: false,
        last_updated: Utc::now(),
    };
    stats.recompute_unresolved_flag();

    store.put_match_stats(&stats).await?;

    info!(
        %match_id,
        teams = stats.team_stats.len(),
        unresolved = stats.has_unresolved_conflicts,
        "aggregated match statistics"
    );

    Ok(Some(stats))
}


#[cfg(test)]
use crate::mock::make_approved_submission;
#[cfg(test)]
use crate::domain::observation::{Alliance, ClimbLevel};
#[cfg(test)]
use itertools::Itertools;
#[cfg(test)]
use serde_json::json;

#[cfg(test)]
fn observation(team_number: &str, auton_fuel_scored: u32) -> ObservationData {
    ObservationData {
        team_number: team_number.into(),
        alliance: Alliance::Red,
        auton: crate::domain::observation::PhaseObservation {
            fuel_scored: auton_fuel_scored,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_detect_conflicts_skips_defaults() -> Result<(), AggregationError> {
    let match_id = Uuid::from_u128(1);
    let submissions = vec![
        make_approved_submission(match_id, "Scout A", observation("1234", 0)),
        make_approved_submission(match_id, "Scout B", observation("1234", 0)),
    ];

    let groups = detect_conflicts(&submissions, "auton.fuelScored")?;
    assert_eq!(groups.len(), 0);
    Ok(())
}

#[test]
fn test_detect_conflicts_groups_by_value_with_provenance() -> Result<(), AggregationError> {
    let match_id = Uuid::from_u128(1);
    let submissions = vec![
        make_approved_submission(match_id, "Scout A", observation("1234", 5)),
        make_approved_submission(match_id, "Scout B", observation("1234", 5)),
        make_approved_submission(match_id, "Scout C", observation("1234", 7)),
    ];

    let groups = detect_conflicts(&submissions, "auton.fuelScored")?;
    assert_eq!(groups.len(), 2);

    assert_eq!(groups[0].value, json!(5));
    assert_eq!(
        groups[0].submission_ids,
        vec![submissions[0].uuid, submissions[1].uuid]
    );
    assert_eq!(groups[0].submitted_by, vec!["Scout A", "Scout B"]);

    assert_eq!(groups[1].value, json!(7));
    assert_eq!(groups[1].submission_ids, vec![submissions[2].uuid]);
    assert_eq!(groups[1].submitted_by, vec!["Scout C"]);
    Ok(())
}

#[test]
fn test_detect_conflicts_deduplicates_scout_names() -> Result<(), AggregationError> {
    let match_id = Uuid::from_u128(1);
    // The same scout submitting twice contributes two submission ids but
    // one display name.
    let submissions = vec![
        make_approved_submission(match_id, "Scout A", observation("1234", 5)),
        make_approved_submission(match_id, "Scout A", observation("1234", 5)),
    ];

    let groups = detect_conflicts(&submissions, "auton.fuelScored")?;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].submission_ids.len(), 2);
    assert_eq!(groups[0].submitted_by, vec!["Scout A"]);
    Ok(())
}

#[test]
fn test_single_nondefault_value_resolves_without_conflict() -> Result<(), AggregationError> {
    let match_id = Uuid::from_u128(1);
    let submissions = vec![
        make_approved_submission(match_id, "Scout A", observation("1234", 6)),
        make_approved_submission(match_id, "Scout B", observation("1234", 0)),
    ];

    let stats = build_team_stats(match_id, "1234", &submissions)?;
    assert!(stats.conflicts.is_empty());
    assert_eq!(
        fields::get_path(&stats.resolved_data, "auton.fuelScored"),
        Some(&json!(6))
    );
    Ok(())
}

#[test]
fn test_team_stats_partition_field_paths() -> Result<(), AggregationError> {
    let match_id = Uuid::from_u128(1);
    let mut disagreeing = observation("1234", 7);
    disagreeing.teleop.climb_level = ClimbLevel::High;
    let mut agreeing = observation("1234", 5);
    agreeing.teleop.climb_level = ClimbLevel::High;
    agreeing.team_penalties = 2;

    let submissions = vec![
        make_approved_submission(match_id, "Scout A", agreeing),
        make_approved_submission(match_id, "Scout B", disagreeing),
    ];

    let stats = build_team_stats(match_id, "1234", &submissions)?;

    // Exactly one conflict: the disagreeing fuel count.
    assert_eq!(
        stats.conflicts.iter().map(|c| c.field_path.as_str()).collect_vec(),
        vec!["auton.fuelScored"]
    );

    // Conflicted paths stay absent from the resolved record; every other
    // stat path is present (single value or default).
    for field_path in ObservationData::STAT_FIELD_PATHS {
        let present = fields::get_path(&stats.resolved_data, field_path).is_some();
        let conflicted = stats.conflicts.iter().any(|c| c.field_path == field_path);
        assert!(present != conflicted, "field {} must be in exactly one bucket", field_path);
    }

    // Identity fields are never walked.
    assert_eq!(fields::get_path(&stats.resolved_data, "teamNumber"), None);
    assert_eq!(fields::get_path(&stats.resolved_data, "alliance"), None);

    // Single observations resolve, defaults fill the rest.
    assert_eq!(
        fields::get_path(&stats.resolved_data, "teleop.climbLevel"),
        Some(&json!("high"))
    );
    assert_eq!(
        fields::get_path(&stats.resolved_data, "teamPenalties"),
        Some(&json!(2))
    );
    assert_eq!(
        fields::get_path(&stats.resolved_data, "auton.climbLevel"),
        Some(&json!("none"))
    );
    Ok(())
}

#[test]
fn test_build_team_stats_requires_a_submission() {
    let result = build_team_stats(Uuid::from_u128(1), "1234", &[]);
    assert!(matches!(result, Err(AggregationError::EmptySubmissionGroup)));
}

#[test]
fn test_carry_forward_keeps_resolution_with_unchanged_signature() -> Result<(), AggregationError> {
    let match_id = Uuid::from_u128(1);
    let submissions = vec![
        make_approved_submission(match_id, "Scout A", observation("1234", 5)),
        make_approved_submission(match_id, "Scout B", observation("1234", 7)),
    ];

    let mut previous = build_team_stats(match_id, "1234", &submissions)?;
    previous.conflicts[0].resolved = true;
    previous.conflicts[0].selected_value = Some(json!(7));

    let mut fresh = build_team_stats(match_id, "1234", &submissions)?;
    carry_forward_resolutions(&mut fresh, &previous);

    assert!(fresh.conflicts[0].resolved);
    assert_eq!(fresh.conflicts[0].selected_value, Some(json!(7)));
    assert_eq!(
        fields::get_path(&fresh.resolved_data, "auton.fuelScored"),
        Some(&json!(7))
    );
    Ok(())
}

#[test]
fn test_carry_forward_drops_resolution_when_values_changed() -> Result<(), AggregationError> {
    let match_id = Uuid::from_u128(1);
    let submissions = vec![
        make_approved_submission(match_id, "Scout A", observation("1234", 5)),
        make_approved_submission(match_id, "Scout B", observation("1234", 7)),
    ];

    let mut previous = build_team_stats(match_id, "1234", &submissions)?;
    previous.conflicts[0].resolved = true;
    previous.conflicts[0].selected_value = Some(json!(7));

    // A third scout reports a value nobody had seen before, so the old
    // decision no longer covers the disagreement.
    let mut wider = submissions.clone();
    wider.push(make_approved_submission(match_id, "Scout C", observation("1234", 9)));

    let mut fresh = build_team_stats(match_id, "1234", &wider)?;
    carry_forward_resolutions(&mut fresh, &previous);

    assert!(!fresh.conflicts[0].resolved);
    assert_eq!(fresh.conflicts[0].selected_value, None);
    assert_eq!(fields::get_path(&fresh.resolved_data, "auton.fuelScored"), None);
    Ok(())
}

#[test]
fn test_group_by_team_preserves_first_seen_order() {
    let match_id = Uuid::from_u128(1);
    let submissions = vec![
        make_approved_submission(match_id, "Scout A", observation("1234", 1)),
        make_approved_submission(match_id, "Scout B", observation("5678", 2)),
        make_approved_submission(match_id, "Scout C", observation("1234", 3)),
    ];

    let groups = group_by_team(submissions);
    assert_eq!(
        groups.iter().map(|(team, _)| team.as_str()).collect_vec(),
        vec!["1234", "5678"]
    );
    assert_eq!(groups[0].1.len(), 2);
    assert_eq!(groups[1].1.len(), 1);
}
