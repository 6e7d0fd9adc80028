use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-identity room index entry ("this user belongs to this room").
/// PK: uid, SK: room_id.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Membership {
    pub uid: String,
    pub room_id: String,
    pub added_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(uid: &str, room_id: &str, added_at: DateTime<Utc>) -> Self {
        Membership {
            uid: uid.to_string(),
            room_id: room_id.to_string(),
            added_at,
        }
    }
}

/// Most recently added membership for a room not in `known`. Timestamps
/// only order the new entries; they are written by other clients' clocks.
pub fn newest_unknown<'a>(
    memberships: &'a [Membership],
    known: &[String],
) -> Option<&'a Membership> {
    memberships
        .iter()
        .filter(|m| !known.contains(&m.room_id))
        .max_by_key(|m| m.added_at)
}

pub fn room_ids(memberships: &[Membership]) -> Vec<String> {
    memberships.iter().map(|m| m.room_id.clone()).collect()
}
