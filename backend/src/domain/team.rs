//! Team records and the roster read model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Error, TeamId, UserId};

/// Maximum accepted length for a team name, in characters.
pub const TEAM_NAME_MAX: usize = 80;

/// A team. Members are users whose `team_id` points here; the team does not
/// own a member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    /// Stable identifier.
    pub id: TeamId,
    /// Unique display name.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Manager back-reference; at most one per team.
    pub manager_id: Option<UserId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Request payload for creating a team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTeam {
    /// Display name; trimmed and validated.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Optional manager to assign on creation.
    pub manager_id: Option<UserId>,
}

impl NewTeam {
    /// Validate the payload, returning the trimmed name.
    pub(crate) fn validated_name(&self) -> Result<String, Error> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::invalid_request("team name must not be empty"));
        }
        if name.chars().count() > TEAM_NAME_MAX {
            return Err(Error::invalid_request(format!(
                "team name must be at most {TEAM_NAME_MAX} characters"
            )));
        }
        Ok(name.to_owned())
    }
}

/// A team together with the ids of its current members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRoster {
    /// The team record.
    pub team: Team,
    /// Users whose membership points at the team.
    pub members: Vec<UserId>,
}

/// Outcome of an atomic team deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDeletion {
    /// The deleted team.
    pub team_id: TeamId,
    /// Members whose membership was cleared.
    pub unassigned_members: Vec<UserId>,
    /// Manager reference cleared with the team, if any.
    pub cleared_manager: Option<UserId>,
}
