use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use serde_json::Value;
use uuid::Uuid;

use super::observation::Alliance;

/// Namespace for deriving match-statistics document ids from match ids.
const MATCH_STATS_NAMESPACE: Uuid = Uuid::from_u128(0x8f2f1c56_9d0a_4b6e_b1a4_3c65d8a90b17);

/// The id of the statistics document for a match. Deterministic, so
/// re-running aggregation overwrites the same document instead of
/// creating duplicates.
pub fn match_stats_uuid(match_id: Uuid) -> Uuid {
    Uuid::new_v5(&MATCH_STATS_NAMESPACE, match_id.as_bytes())
}

/// One distinct observed value for a field, with its provenance.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all="camelCase")]
pub struct FieldValueGroup {
    pub value: Value,
    /// Contributing submissions, in submission order.
    pub submission_ids: Vec<Uuid>,
    /// Contributing scout display names, de-duplicated, first-seen order.
    pub submitted_by: Vec<String>,
}

/// A field path for which scouts reported two or more distinct
/// non-default values.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all="camelCase")]
pub struct ConflictField {
    pub field_path: String,
    pub values: Vec<FieldValueGroup>,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_value: Option<Value>,
}

impl ConflictField {
    /// The set of distinct observed values, as canonical JSON strings.
    /// Two conflicts with equal signatures disagree on exactly the same
    /// values, regardless of which submissions produced them or in what
    /// order the groups were recorded.
    pub fn value_signature(&self) -> BTreeSet<String> {
        self.values.iter().map(|group| group.value.to_string()).collect()
    }
}

/// Consolidated statistics for one team in one match.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all="camelCase")]
pub struct TeamMatchStats {
    pub match_id: Uuid,
    pub team_number: String,
    pub alliance: Alliance,
    pub conflicts: Vec<ConflictField>,
    /// The authoritative merged observation. Partial: a conflicted field
    /// stays absent until a human picks a value.
    pub resolved_data: Value,
    pub last_updated: DateTime<Utc>,
}

impl TeamMatchStats {
    pub fn has_unresolved_conflicts(&self) -> bool {
        self.conflicts.iter().any(|conflict| !conflict.resolved)
    }
}

/// Consolidated statistics for a whole match, one sub-record per team.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all="camelCase")]
pub struct MatchStats {
    pub uuid: Uuid,
    pub match_id: Uuid,
    pub team_stats: HashMap<String, TeamMatchStats>,
    pub has_unresolved_conflicts: bool,
    pub last_updated: DateTime<Utc>,
}

impl MatchStats {
    /// Recomputes the match-level flag from the team sub-records.
    pub fn recompute_unresolved_flag(&mut self) {
        self.has_unresolved_conflicts = self
            .team_stats
            .values()
            .any(|team| team.has_unresolved_conflicts());
    }
}


#[test]
fn test_match_stats_uuid_is_deterministic() {
    let match_id = Uuid::from_u128(42);
    assert_eq!(match_stats_uuid(match_id), match_stats_uuid(match_id));
    assert_ne!(match_stats_uuid(match_id), match_stats_uuid(Uuid::from_u128(43)));
    assert_ne!(match_stats_uuid(match_id), match_id);
}

#[test]
fn test_value_signature_ignores_group_order_and_provenance() {
    let make_group = |value: i64, sub: u128| FieldValueGroup {
        value: serde_json::json!(value),
        submission_ids: vec![Uuid::from_u128(sub)],
        submitted_by: vec![format!("Scout {}", sub)],
    };

    let a = ConflictField {
        field_path: "auton.fuelScored".into(),
        values: vec![make_group(5, 1), make_group(7, 2)],
        resolved: false,
        selected_value: None,
    };
    let b = ConflictField {
        field_path: "auton.fuelScored".into(),
        values: vec![make_group(7, 9), make_group(5, 8)],
        resolved: true,
        selected_value: Some(serde_json::json!(7)),
    };
    let c = ConflictField {
        field_path: "auton.fuelScored".into(),
        values: vec![make_group(5, 1), make_group(9, 2)],
        resolved: false,
        selected_value: None,
    };

    assert_eq!(a.value_signature(), b.value_signature());
    assert_ne!(a.value_signature(), c.value_signature());
}
