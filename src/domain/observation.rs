use std::fmt::Display;
use std::str::FromStr;

use serde::{Serialize, Deserialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObservationParseError {
    #[error("unknown alliance color: {0}")]
    UnknownAlliance(String),
    #[error("unknown climb level: {0}")]
    UnknownClimbLevel(String),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all="lowercase")]
pub enum Alliance {
    Red,
    Blue,
}

impl Alliance {
    pub fn to_str(&self) -> &'static str {
        match self {
            Alliance::Red => "red",
            Alliance::Blue => "blue",
        }
    }
}

impl FromStr for Alliance {
    type Err = ObservationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(Alliance::Red),
            "blue" => Ok(Alliance::Blue),
            _ => Err(ObservationParseError::UnknownAlliance(s.into())),
        }
    }
}

impl Display for Alliance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all="lowercase")]
pub enum ClimbLevel {
    #[default]
    None,
    Low,
    Mid,
    High,
    Traverse,
}

impl ClimbLevel {
    pub fn to_str(&self) -> &'static str {
        match self {
            ClimbLevel::None => "none",
            ClimbLevel::Low => "low",
            ClimbLevel::Mid => "mid",
            ClimbLevel::High => "high",
            ClimbLevel::Traverse => "traverse",
        }
    }
}

impl FromStr for ClimbLevel {
    type Err = ObservationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ClimbLevel::None),
            "low" => Ok(ClimbLevel::Low),
            "mid" => Ok(ClimbLevel::Mid),
            "high" => Ok(ClimbLevel::High),
            "traverse" => Ok(ClimbLevel::Traverse),
            _ => Err(ObservationParseError::UnknownClimbLevel(s.into())),
        }
    }
}

impl Display for ClimbLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

/// What one scout saw during a single game phase.
#[derive(Debug, PartialEq, Eq, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all="camelCase")]
pub struct PhaseObservation {
    pub fuel_scored: u32,
    pub fuel_missed: u32,
    pub climb_level: ClimbLevel,
}

/// A single scout's full observation of one team in one match.
///
/// Serialization names are camelCase so dotted field paths over the
/// serialized document match the persisted format exactly
/// (`auton.fuelScored`, `teamPenalties`, ...).
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all="camelCase")]
pub struct ObservationData {
    pub team_number: String,
    pub alliance: Alliance,
    pub auton: PhaseObservation,
    pub teleop: PhaseObservation,
    pub team_penalties: u32,
    pub opponent_penalties: u32,
}

impl Default for ObservationData {
    fn default() -> Self {
        ObservationData {
            team_number: String::new(),
            alliance: Alliance::Red,
            auton: PhaseObservation::default(),
            teleop: PhaseObservation::default(),
            team_penalties: 0,
            opponent_penalties: 0,
        }
    }
}

impl ObservationData {
    /// Every leaf field path of the observation tree, in declaration order.
    /// Must stay in sync with the struct fields above; the test at the
    /// bottom of `fields.rs` checks this against the runtime walker.
    pub const FIELD_PATHS: [&'static str; 10] = [
        "teamNumber",
        "alliance",
        "auton.fuelScored",
        "auton.fuelMissed",
        "auton.climbLevel",
        "teleop.fuelScored",
        "teleop.fuelMissed",
        "teleop.climbLevel",
        "teamPenalties",
        "opponentPenalties",
    ];

    /// Fields identifying the observed team. These are taken from the first
    /// submission in a group and never conflict-checked.
    pub const IDENTITY_FIELD_PATHS: [&'static str; 2] = ["teamNumber", "alliance"];

    /// The field paths that participate in aggregation.
    pub const STAT_FIELD_PATHS: [&'static str; 8] = [
        "auton.fuelScored",
        "auton.fuelMissed",
        "auton.climbLevel",
        "teleop.fuelScored",
        "teleop.fuelMissed",
        "teleop.climbLevel",
        "teamPenalties",
        "opponentPenalties",
    ];
}


#[test]
fn test_stat_paths_exclude_identity_fields() {
    for path in ObservationData::STAT_FIELD_PATHS {
        assert!(!ObservationData::IDENTITY_FIELD_PATHS.contains(&path));
    }
    assert_eq!(
        ObservationData::STAT_FIELD_PATHS.len() + ObservationData::IDENTITY_FIELD_PATHS.len(),
        ObservationData::FIELD_PATHS.len()
    );
}

#[test]
fn test_climb_level_round_trip() -> Result<(), ObservationParseError> {
    for level in [ClimbLevel::None, ClimbLevel::Low, ClimbLevel::Mid, ClimbLevel::High, ClimbLevel::Traverse] {
        assert_eq!(level.to_str().parse::<ClimbLevel>()?, level);
    }
    assert_eq!(
        "hanging".parse::<ClimbLevel>(),
        Err(ObservationParseError::UnknownClimbLevel("hanging".into()))
    );
    Ok(())
}

#[test]
fn test_observation_serializes_with_camel_case_paths() {
    let doc = serde_json::to_value(ObservationData::default()).unwrap();
    assert_eq!(doc["auton"]["climbLevel"], serde_json::json!("none"));
    assert_eq!(doc["teamPenalties"], serde_json::json!(0));
    assert_eq!(doc["alliance"], serde_json::json!("red"));
}
