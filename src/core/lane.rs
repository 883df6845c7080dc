//! Lane data model.
//!
//! A lane is a column of a board mapped to one or more workflow states.
//! Positions are dense and zero-based within a board; the store keeps lanes
//! as [`LaneRecord`]s without a position and derives it from the board's lane
//! order when a view is read.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

use super::ids::{BoardId, LaneId, StateId};
use crate::{Error, Result};

pub const MAX_NAME_LENGTH: usize = 64;

/// Trim and check a board or lane name.
pub fn validate_name(kind: &str, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation(format!("{} name cannot be empty", kind)));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(Error::Validation(format!(
            "{} name cannot exceed {} characters",
            kind, MAX_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

fn validate_wip(wip_limit: Option<u32>) -> Result<()> {
    if wip_limit == Some(0) {
        return Err(Error::Validation(
            "WIP limit must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Canonical lane as the store returns it and as views present it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lane {
    pub id: LaneId,
    pub board_id: BoardId,
    pub name: String,
    pub position: u32,
    #[serde(default)]
    pub state_ids: BTreeSet<StateId>,
    pub wip_limit: Option<u32>,
}

/// Lane as held by the normalized store: everything but the position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneRecord {
    pub id: LaneId,
    pub board_id: BoardId,
    pub name: String,
    pub state_ids: BTreeSet<StateId>,
    pub wip_limit: Option<u32>,
}

impl LaneRecord {
    pub fn to_lane(&self, position: u32) -> Lane {
        Lane {
            id: self.id.clone(),
            board_id: self.board_id.clone(),
            name: self.name.clone(),
            position,
            state_ids: self.state_ids.clone(),
            wip_limit: self.wip_limit,
        }
    }
}

impl From<Lane> for LaneRecord {
    fn from(lane: Lane) -> Self {
        Self {
            id: lane.id,
            board_id: lane.board_id,
            name: lane.name,
            state_ids: lane.state_ids,
            wip_limit: lane.wip_limit,
        }
    }
}

/// Attributes of a lane to create. An unsubmitted `NewLane` is the
/// `Unsaved` stage of a lane's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLane {
    pub name: String,
    #[serde(default)]
    pub state_ids: BTreeSet<StateId>,
    pub wip_limit: Option<u32>,
    /// Insert at this position; appended when absent or past the end.
    pub position: Option<u32>,
}

impl NewLane {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StateId>,
    {
        self.state_ids = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_wip_limit(mut self, limit: u32) -> Self {
        self.wip_limit = Some(limit);
        self
    }

    pub fn at(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }

    /// Validated copy with the name trimmed.
    pub fn validated(&self) -> Result<Self> {
        validate_wip(self.wip_limit)?;
        Ok(Self {
            name: validate_name("Lane", &self.name)?,
            ..self.clone()
        })
    }

    pub fn into_record(self, id: LaneId, board_id: BoardId) -> LaneRecord {
        LaneRecord {
            id,
            board_id,
            name: self.name,
            state_ids: self.state_ids,
            wip_limit: self.wip_limit,
        }
    }
}

/// A present field, even `null`, is `Some`; an absent one stays `None` via
/// `#[serde(default)]`.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Option<u32>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<u32>::deserialize(deserializer).map(Some)
}

/// Partial lane update. `None` leaves a field untouched; `wip_limit:
/// Some(None)` clears the limit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_ids: Option<BTreeSet<StateId>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub wip_limit: Option<Option<u32>>,
}

impl LanePatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn states<I, S>(states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StateId>,
    {
        Self {
            state_ids: Some(states.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn wip_limit(limit: Option<u32>) -> Self {
        Self {
            wip_limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.state_ids.is_none() && self.wip_limit.is_none()
    }

    pub fn validated(&self) -> Result<Self> {
        if self.is_empty() {
            return Err(Error::Validation("Nothing to update".to_string()));
        }
        if let Some(limit) = self.wip_limit {
            validate_wip(limit)?;
        }
        let name = match &self.name {
            Some(name) => Some(validate_name("Lane", name)?),
            None => None,
        };
        Ok(Self {
            name,
            ..self.clone()
        })
    }

    /// Fold a later patch into this one; the later patch wins per field.
    pub fn merge(&mut self, later: LanePatch) {
        if later.name.is_some() {
            self.name = later.name;
        }
        if later.state_ids.is_some() {
            self.state_ids = later.state_ids;
        }
        if later.wip_limit.is_some() {
            self.wip_limit = later.wip_limit;
        }
    }

    pub fn apply(&self, record: &mut LaneRecord) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        if let Some(states) = &self.state_ids {
            record.state_ids = states.clone();
        }
        if let Some(limit) = self.wip_limit {
            record.wip_limit = limit;
        }
    }
}

/// Client-visible lifecycle of a lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneStatus {
    /// Attributes exist only as a `NewLane`, nothing submitted yet.
    Unsaved,
    /// Create in flight; the lane lives under a temporary id.
    Pending,
    /// Lane is known to the store under its real id.
    Confirmed,
    /// Delete in flight; already removed from the views.
    Deleting,
    /// Lane is gone.
    Removed,
}

impl std::fmt::Display for LaneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaneStatus::Unsaved => write!(f, "unsaved"),
            LaneStatus::Pending => write!(f, "pending"),
            LaneStatus::Confirmed => write!(f, "confirmed"),
            LaneStatus::Deleting => write!(f, "deleting"),
            LaneStatus::Removed => write!(f, "removed"),
        }
    }
}
