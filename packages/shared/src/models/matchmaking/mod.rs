use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::identity::UserIdentity;
use crate::models::room::{Player, RoomAssignment};

/// A player waiting in the matchmaking queue, keyed by `uid`.
/// The queue is consumed oldest-first by `timestamp`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MatchmakingEntry {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: String,
    pub timestamp: DateTime<Utc>,
}

impl MatchmakingEntry {
    pub fn from_identity(identity: &UserIdentity, timestamp: DateTime<Utc>) -> Self {
        MatchmakingEntry {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            display_name: identity.name(),
            avatar_url: identity.avatar_url.clone().unwrap_or_default(),
            timestamp,
        }
    }

    pub fn to_player(&self, joined_at: DateTime<Utc>) -> Player {
        Player {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
            joined_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchmakingOutcome {
    Waiting,
    Matched(RoomAssignment),
}

/// Client-side matchmaking state. `known_rooms` lists the rooms the caller
/// already belonged to when it joined the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchmakingState {
    Idle,
    Waiting {
        since: DateTime<Utc>,
        known_rooms: Vec<String>,
    },
    Matched(RoomAssignment),
}
