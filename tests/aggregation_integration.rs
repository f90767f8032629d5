use assert_matches::assert_matches;
use serde_json::json;

use scout_stats::fields;
use scout_stats::mock::{make_approved_submission, make_mock_submissions};
use scout_stats::prelude::*;

fn setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn observation(team_number: &str, alliance: Alliance) -> ObservationData {
    ObservationData {
        team_number: team_number.into(),
        alliance,
        ..Default::default()
    }
}

/// A store with three approved submissions for team 1234 reporting
/// auton.fuelScored 5, 5 and 7 (the worked example from the system
/// description).
async fn store_with_fuel_disagreement(match_id: Uuid) -> (MemoryStore, Vec<Uuid>) {
    let store = MemoryStore::new();
    let mut submission_ids = Vec::new();
    for (scout, fuel) in [("Scout A", 5), ("Scout B", 5), ("Scout C", 7)] {
        let mut data = observation("1234", Alliance::Red);
        data.auton.fuel_scored = fuel;
        let submission = make_approved_submission(match_id, scout, data);
        submission_ids.push(submission.uuid);
        store.insert_submission(submission).await;
    }
    (store, submission_ids)
}

#[tokio::test]
async fn test_fuel_disagreement_produces_one_conflict_with_two_groups() -> Result<(), AggregationError> {
    setup();
    let match_id = Uuid::from_u128(10);
    let (store, submission_ids) = store_with_fuel_disagreement(match_id).await;
    let manager = StatsManager::new(store);

    let stats = manager
        .aggregate_match(match_id)
        .await?
        .expect("three approved submissions must produce statistics");

    assert!(stats.has_unresolved_conflicts);
    assert_eq!(stats.uuid, match_stats_uuid(match_id));

    let team = &stats.team_stats["1234"];
    assert_eq!(team.alliance, Alliance::Red);
    assert_eq!(team.conflicts.len(), 1);

    let conflict = &team.conflicts[0];
    assert_eq!(conflict.field_path, "auton.fuelScored");
    assert!(!conflict.resolved);
    assert_eq!(conflict.values.len(), 2);
    assert_eq!(conflict.values[0].value, json!(5));
    assert_eq!(
        conflict.values[0].submission_ids,
        vec![submission_ids[0], submission_ids[1]]
    );
    assert_eq!(conflict.values[1].value, json!(7));
    assert_eq!(conflict.values[1].submission_ids, vec![submission_ids[2]]);

    // The conflicted field is not in the resolved record yet.
    assert_eq!(fields::get_path(&team.resolved_data, "auton.fuelScored"), None);
    Ok(())
}

#[tokio::test]
async fn test_all_default_observations_resolve_to_defaults() -> Result<(), AggregationError> {
    setup();
    let match_id = Uuid::from_u128(11);
    let store = MemoryStore::new();
    for scout in ["Scout A", "Scout B", "Scout C"] {
        // climbLevel "none" everywhere: the default, not an observation.
        store
            .insert_submission(make_approved_submission(
                match_id,
                scout,
                observation("1234", Alliance::Blue),
            ))
            .await;
    }
    let manager = StatsManager::new(store);

    let stats = manager.aggregate_match(match_id).await?.expect("stats");
    let team = &stats.team_stats["1234"];

    assert!(team.conflicts.is_empty());
    assert!(!stats.has_unresolved_conflicts);
    assert_eq!(
        fields::get_path(&team.resolved_data, "auton.climbLevel"),
        Some(&json!("none"))
    );
    assert_eq!(
        fields::get_path(&team.resolved_data, "teleop.fuelScored"),
        Some(&json!(0))
    );
    Ok(())
}

#[tokio::test]
async fn test_no_approved_submissions_writes_nothing() -> Result<(), AggregationError> {
    setup();
    let match_id = Uuid::from_u128(12);
    let store = MemoryStore::new();

    let mut pending = make_approved_submission(match_id, "Scout A", observation("1234", Alliance::Red));
    pending.status = SubmissionStatus::Pending;
    let mut rejected = make_approved_submission(match_id, "Scout B", observation("1234", Alliance::Red));
    rejected.status = SubmissionStatus::Rejected;
    store.insert_submission(pending).await;
    store.insert_submission(rejected).await;

    let manager = StatsManager::new(store);
    let stats = manager.aggregate_match(match_id).await?;

    assert!(stats.is_none());
    assert!(manager
        .store()
        .raw_match_stats(match_stats_uuid(match_id))
        .await
        .is_none());
    Ok(())
}

#[tokio::test]
async fn test_pending_submission_joins_after_approval() -> Result<(), AggregationError> {
    setup();
    let match_id = Uuid::from_u128(13);
    let store = MemoryStore::new();

    let mut data = observation("1234", Alliance::Red);
    data.teleop.fuel_scored = 12;
    let mut submission = make_approved_submission(match_id, "Scout A", data);
    submission.status = SubmissionStatus::Pending;
    let submission_uuid = submission.uuid;
    store.insert_submission(submission).await;

    let manager = StatsManager::new(store);
    assert!(manager.aggregate_match(match_id).await?.is_none());

    assert!(manager
        .store()
        .set_submission_status(submission_uuid, SubmissionStatus::Approved)
        .await);

    let stats = manager.aggregate_match(match_id).await?.expect("stats");
    assert_eq!(
        fields::get_path(&stats.team_stats["1234"].resolved_data, "teleop.fuelScored"),
        Some(&json!(12))
    );
    Ok(())
}

#[tokio::test]
async fn test_reaggregation_is_idempotent_ignoring_timestamps() -> Result<(), AggregationError> {
    setup();
    let match_id = Uuid::from_u128(14);
    let (store, _) = store_with_fuel_disagreement(match_id).await;
    let manager = StatsManager::new(store);

    let first = manager.aggregate_match(match_id).await?.expect("stats");
    let second = manager.aggregate_match(match_id).await?.expect("stats");

    assert_eq!(first.uuid, second.uuid);
    assert_eq!(first.has_unresolved_conflicts, second.has_unresolved_conflicts);
    for (team_number, team) in &first.team_stats {
        let other = &second.team_stats[team_number];
        assert_eq!(team.conflicts, other.conflicts);
        assert_eq!(team.resolved_data, other.resolved_data);
        assert_eq!(team.alliance, other.alliance);
    }
    Ok(())
}

#[tokio::test]
async fn test_resolving_the_worked_example() -> Result<(), AggregationError> {
    setup();
    let match_id = Uuid::from_u128(15);
    let (store, _) = store_with_fuel_disagreement(match_id).await;
    let manager = StatsManager::new(store);

    let stats = manager.aggregate_match(match_id).await?.expect("stats");
    assert!(stats.has_unresolved_conflicts);

    let resolved = manager
        .resolve_conflict(stats.uuid, "1234", 0, json!(7))
        .await?;

    let team = &resolved.team_stats["1234"];
    assert!(team.conflicts[0].resolved);
    assert_eq!(team.conflicts[0].selected_value, Some(json!(7)));
    assert_eq!(
        fields::get_path(&team.resolved_data, "auton.fuelScored"),
        Some(&json!(7))
    );
    assert!(!resolved.has_unresolved_conflicts);

    // The persisted document matches what the applier returned.
    let stored = manager
        .store()
        .get_match_stats(stats.uuid)
        .await?
        .expect("stored stats");
    assert!(!stored.has_unresolved_conflicts);
    assert!(stored.team_stats["1234"].conflicts[0].resolved);
    Ok(())
}

#[tokio::test]
async fn test_match_flag_stays_set_while_any_team_has_an_unresolved_conflict(
) -> Result<(), AggregationError> {
    setup();
    let match_id = Uuid::from_u128(16);
    let store = MemoryStore::new();

    for (team, fuel) in [("1234", 5), ("1234", 7), ("5678", 3), ("5678", 4)] {
        let mut data = observation(team, if team == "1234" { Alliance::Red } else { Alliance::Blue });
        data.auton.fuel_scored = fuel;
        store
            .insert_submission(make_approved_submission(match_id, "Scout", data))
            .await;
    }

    let manager = StatsManager::new(store);
    let stats = manager.aggregate_match(match_id).await?.expect("stats");
    assert!(stats.has_unresolved_conflicts);

    let after_first = manager
        .resolve_conflict(stats.uuid, "1234", 0, json!(7))
        .await?;
    // Team 5678 still disagrees, so the match-level flag stays set.
    assert!(after_first.has_unresolved_conflicts);

    let after_second = manager
        .resolve_conflict(stats.uuid, "5678", 0, json!(4))
        .await?;
    assert!(!after_second.has_unresolved_conflicts);
    Ok(())
}

#[tokio::test]
async fn test_resolution_patch_leaves_other_teams_untouched() -> Result<(), AggregationError> {
    setup();
    let match_id = Uuid::from_u128(17);
    let store = MemoryStore::new();

    for (team, fuel) in [("1234", 5), ("1234", 7), ("5678", 3), ("5678", 4)] {
        let mut data = observation(team, Alliance::Red);
        data.auton.fuel_scored = fuel;
        store
            .insert_submission(make_approved_submission(match_id, "Scout", data))
            .await;
    }

    let manager = StatsManager::new(store);
    let stats = manager.aggregate_match(match_id).await?.expect("stats");

    let before = manager
        .store()
        .raw_match_stats(stats.uuid)
        .await
        .expect("stored document");
    manager
        .resolve_conflict(stats.uuid, "1234", 0, json!(7))
        .await?;
    let after = manager
        .store()
        .raw_match_stats(stats.uuid)
        .await
        .expect("stored document");

    // The sibling team's sub-document is byte-identical to before.
    assert_eq!(
        fields::get_path(&before, "teamStats.5678"),
        fields::get_path(&after, "teamStats.5678")
    );
    assert_ne!(
        fields::get_path(&before, "teamStats.1234"),
        fields::get_path(&after, "teamStats.1234")
    );
    Ok(())
}

#[tokio::test]
async fn test_reaggregation_preserves_resolution_with_unchanged_signature(
) -> Result<(), AggregationError> {
    setup();
    let match_id = Uuid::from_u128(18);
    let (store, _) = store_with_fuel_disagreement(match_id).await;
    let manager = StatsManager::new(store);

    let stats = manager.aggregate_match(match_id).await?.expect("stats");
    manager
        .resolve_conflict(stats.uuid, "1234", 0, json!(7))
        .await?;

    // Another scout approves with a value already in the groups; the
    // signature {5, 7} is unchanged, so the decision survives.
    let mut data = observation("1234", Alliance::Red);
    data.auton.fuel_scored = 7;
    manager
        .store()
        .insert_submission(make_approved_submission(match_id, "Scout D", data))
        .await;

    let again = manager.aggregate_match(match_id).await?.expect("stats");
    let team = &again.team_stats["1234"];
    assert!(team.conflicts[0].resolved);
    assert_eq!(team.conflicts[0].selected_value, Some(json!(7)));
    assert_eq!(
        fields::get_path(&team.resolved_data, "auton.fuelScored"),
        Some(&json!(7))
    );
    assert!(!again.has_unresolved_conflicts);
    Ok(())
}

#[tokio::test]
async fn test_reaggregation_reopens_conflict_when_new_value_appears() -> Result<(), AggregationError>
{
    setup();
    let match_id = Uuid::from_u128(19);
    let (store, _) = store_with_fuel_disagreement(match_id).await;
    let manager = StatsManager::new(store);

    let stats = manager.aggregate_match(match_id).await?.expect("stats");
    manager
        .resolve_conflict(stats.uuid, "1234", 0, json!(7))
        .await?;

    // A value nobody had reported widens the disagreement; the old
    // decision no longer covers it.
    let mut data = observation("1234", Alliance::Red);
    data.auton.fuel_scored = 9;
    manager
        .store()
        .insert_submission(make_approved_submission(match_id, "Scout D", data))
        .await;

    let again = manager.aggregate_match(match_id).await?.expect("stats");
    let team = &again.team_stats["1234"];
    assert!(!team.conflicts[0].resolved);
    assert_eq!(team.conflicts[0].values.len(), 3);
    assert!(again.has_unresolved_conflicts);
    Ok(())
}

#[tokio::test]
async fn test_blind_rebuild_discards_resolutions_when_carry_forward_is_off(
) -> Result<(), AggregationError> {
    setup();
    let match_id = Uuid::from_u128(20);
    let (store, _) = store_with_fuel_disagreement(match_id).await;
    let manager = StatsManager::with_options(
        store,
        AggregationOptions {
            preserve_resolutions: false,
        },
    );

    let stats = manager.aggregate_match(match_id).await?.expect("stats");
    manager
        .resolve_conflict(stats.uuid, "1234", 0, json!(7))
        .await?;

    // Without carry-forward the rebuild forgets the human decision.
    let again = manager.aggregate_match(match_id).await?.expect("stats");
    let team = &again.team_stats["1234"];
    assert!(!team.conflicts[0].resolved);
    assert_eq!(team.conflicts[0].selected_value, None);
    assert!(again.has_unresolved_conflicts);
    Ok(())
}

#[tokio::test]
async fn test_resolution_error_cases() -> Result<(), AggregationError> {
    setup();
    let match_id = Uuid::from_u128(21);
    let (store, _) = store_with_fuel_disagreement(match_id).await;
    let manager = StatsManager::new(store);
    let stats = manager.aggregate_match(match_id).await?.expect("stats");

    let missing = Uuid::from_u128(999);
    assert_matches!(
        manager.resolve_conflict(missing, "1234", 0, json!(7)).await,
        Err(AggregationError::StatsNotFound(uuid)) if uuid == missing
    );

    assert_matches!(
        manager.resolve_conflict(stats.uuid, "4321", 0, json!(7)).await,
        Err(AggregationError::UnknownTeam { ref team_number, .. }) if team_number.as_str() == "4321"
    );

    assert_matches!(
        manager.resolve_conflict(stats.uuid, "1234", 5, json!(7)).await,
        Err(AggregationError::ConflictIndexOutOfRange { index: 5, len: 1, .. })
    );
    Ok(())
}

#[tokio::test]
async fn test_concurrent_resolutions_of_two_conflicts_both_survive() -> Result<(), AggregationError>
{
    setup();
    let match_id = Uuid::from_u128(22);
    let store = MemoryStore::new();

    // Two conflicts for the same team: fuel count and climb level.
    let mut first = observation("1234", Alliance::Red);
    first.auton.fuel_scored = 5;
    first.teleop.climb_level = ClimbLevel::Mid;
    let mut second = observation("1234", Alliance::Red);
    second.auton.fuel_scored = 7;
    second.teleop.climb_level = ClimbLevel::High;
    store
        .insert_submission(make_approved_submission(match_id, "Scout A", first))
        .await;
    store
        .insert_submission(make_approved_submission(match_id, "Scout B", second))
        .await;

    let manager = StatsManager::new(store);
    let stats = manager.aggregate_match(match_id).await?.expect("stats");
    assert_eq!(stats.team_stats["1234"].conflicts.len(), 2);

    // Conflicts are recorded in field-path order: auton.fuelScored first.
    let (a, b) = tokio::join!(
        manager.resolve_conflict(stats.uuid, "1234", 0, json!(7)),
        manager.resolve_conflict(stats.uuid, "1234", 1, json!("high")),
    );
    a?;
    b?;

    // Serialization per document means neither update is lost.
    let stored = manager
        .store()
        .get_match_stats(stats.uuid)
        .await?
        .expect("stored stats");
    let team = &stored.team_stats["1234"];
    assert!(team.conflicts[0].resolved);
    assert!(team.conflicts[1].resolved);
    assert_eq!(
        fields::get_path(&team.resolved_data, "auton.fuelScored"),
        Some(&json!(7))
    );
    assert_eq!(
        fields::get_path(&team.resolved_data, "teleop.climbLevel"),
        Some(&json!("high"))
    );
    assert!(!stored.has_unresolved_conflicts);
    Ok(())
}

#[tokio::test]
async fn test_resolution_racing_reaggregation_keeps_the_decision() -> Result<(), AggregationError> {
    setup();
    let match_id = Uuid::from_u128(23);
    let (store, _) = store_with_fuel_disagreement(match_id).await;
    let manager = StatsManager::new(store);
    let stats = manager.aggregate_match(match_id).await?.expect("stats");

    // Whichever order the lock grants: resolve-then-aggregate carries the
    // decision forward, aggregate-then-resolve applies it afterwards.
    let (resolved, aggregated) = tokio::join!(
        manager.resolve_conflict(stats.uuid, "1234", 0, json!(7)),
        manager.aggregate_match(match_id),
    );
    resolved?;
    aggregated?;

    let stored = manager
        .store()
        .get_match_stats(stats.uuid)
        .await?
        .expect("stored stats");
    let team = &stored.team_stats["1234"];
    assert!(team.conflicts[0].resolved);
    assert_eq!(team.conflicts[0].selected_value, Some(json!(7)));
    assert_eq!(
        fields::get_path(&team.resolved_data, "auton.fuelScored"),
        Some(&json!(7))
    );
    assert!(!stored.has_unresolved_conflicts);
    Ok(())
}

#[tokio::test]
async fn test_mock_match_aggregates_without_conflicts() -> Result<(), AggregationError> {
    setup();
    let match_id = Uuid::from_u128(24);
    let store = MemoryStore::new();
    for submission in make_mock_submissions(match_id) {
        store.insert_submission(submission).await;
    }

    let manager = StatsManager::new(store);
    let stats = manager.aggregate_match(match_id).await?.expect("stats");

    assert_eq!(stats.team_stats.len(), 6);
    assert!(!stats.has_unresolved_conflicts);
    assert!(stats.team_stats.values().all(|team| team.conflicts.is_empty()));
    Ok(())
}
