use chrono::Utc;
use itertools::Itertools;
use uuid::Uuid;

use faker_rand::en_us::names::FullName;

use crate::domain::observation::{Alliance, ClimbLevel, ObservationData, PhaseObservation};
use crate::domain::submission::{Submission, SubmissionStatus};

#[derive(Debug)]
pub struct MockOption {
    pub deterministic_uuids: bool,
    pub scouts_per_team: u32,
    pub use_random_names: bool,
    pub approve_all: bool,
}

impl Default for MockOption {
    fn default() -> Self {
        Self {
            deterministic_uuids: true,
            scouts_per_team: 3,
            use_random_names: false,
            approve_all: true,
        }
    }
}

/// An already-approved submission with fresh ids, for tests that build
/// their own observation data.
pub fn make_approved_submission(
    match_id: Uuid,
    scout_name: &str,
    data: ObservationData,
) -> Submission {
    let now = Utc::now();
    Submission {
        uuid: Uuid::new_v4(),
        match_id,
        data,
        created_by: Uuid::new_v4(),
        created_by_name: scout_name.to_string(),
        created_at: now,
        status: SubmissionStatus::Approved,
        approved_by: Some(Uuid::new_v4()),
        approved_at: Some(now),
        notes: None,
    }
}

pub fn make_mock_submissions(match_id: Uuid) -> Vec<Submission> {
    make_mock_submissions_with_options(match_id, Default::default())
}

/// Consistent submissions for a full six-team match.
///
/// Uuid ranges with deterministic_uuids:
///   Submissions: 1000
///   Scouts: 2000
///   Approvers: 3000
///
/// Every scout for a team reports identical values, so aggregation of
/// the raw output produces no conflicts; tests that need disagreement
/// tweak individual submissions afterwards.
pub fn make_mock_submissions_with_options(match_id: Uuid, options: MockOption) -> Vec<Submission> {
    assert!(options.scouts_per_team >= 1);

    let teams = [
        ("1234", Alliance::Red),
        ("2345", Alliance::Red),
        ("3456", Alliance::Red),
        ("4567", Alliance::Blue),
        ("5678", Alliance::Blue),
        ("6789", Alliance::Blue),
    ];

    teams
        .iter()
        .enumerate()
        .flat_map(|(team_idx, (team_number, alliance))| {
            let data = ObservationData {
                team_number: team_number.to_string(),
                alliance: *alliance,
                auton: PhaseObservation {
                    fuel_scored: 2 + team_idx as u32,
                    fuel_missed: team_idx as u32 % 2,
                    climb_level: ClimbLevel::None,
                },
                teleop: PhaseObservation {
                    fuel_scored: 8 + team_idx as u32,
                    fuel_missed: 1,
                    climb_level: if team_idx % 2 == 0 {
                        ClimbLevel::Mid
                    } else {
                        ClimbLevel::None
                    },
                },
                team_penalties: 0,
                opponent_penalties: team_idx as u32 % 3,
            };

            (0..options.scouts_per_team)
                .map(|scout_idx| {
                    let ordinal = (team_idx as u32) * options.scouts_per_team + scout_idx;
                    let uuid = if options.deterministic_uuids {
                        Uuid::from_u128(1000 + ordinal as u128)
                    } else {
                        Uuid::new_v4()
                    };
                    let scout_uuid = if options.deterministic_uuids {
                        Uuid::from_u128(2000 + ordinal as u128)
                    } else {
                        Uuid::new_v4()
                    };
                    let scout_name = if options.use_random_names {
                        rand::random::<FullName>().to_string()
                    } else {
                        format!("Scout {}", ordinal)
                    };

                    let now = Utc::now();
                    let status = if options.approve_all {
                        SubmissionStatus::Approved
                    } else {
                        SubmissionStatus::Pending
                    };

                    Submission {
                        uuid,
                        match_id,
                        data: data.clone(),
                        created_by: scout_uuid,
                        created_by_name: scout_name,
                        created_at: now,
                        status,
                        approved_by: if options.approve_all {
                            Some(Uuid::from_u128(3000))
                        } else {
                            None
                        },
                        approved_at: if options.approve_all { Some(now) } else { None },
                        notes: None,
                    }
                })
                .collect_vec()
        })
        .collect_vec()
}


#[test]
fn test_mock_submissions_are_deterministic_and_approved() {
    let match_id = Uuid::from_u128(7);
    let submissions = make_mock_submissions(match_id);

    assert_eq!(submissions.len(), 18);
    assert!(submissions.iter().all(|s| s.is_approved()));
    assert_eq!(submissions[0].uuid, Uuid::from_u128(1000));
    assert_eq!(
        submissions.iter().map(|s| &s.data.team_number).unique().count(),
        6
    );
}
