//! Board data model.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::ids::{BoardId, LaneId, ProjectId, SprintId, StateId};
use super::lane::{validate_name, Lane, NewLane};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BoardKind {
    #[default]
    Kanban,
    Scrum,
}

impl std::fmt::Display for BoardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoardKind::Kanban => write!(f, "kanban"),
            BoardKind::Scrum => write!(f, "scrum"),
        }
    }
}

impl std::str::FromStr for BoardKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "kanban" => Ok(BoardKind::Kanban),
            "scrum" => Ok(BoardKind::Scrum),
            other => Err(Error::Validation(format!("Unknown board type: {}", other))),
        }
    }
}

/// A board with its lanes in position order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: BoardId,
    pub project_id: ProjectId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: BoardKind,
    pub is_default: bool,
    pub sprint_id: Option<SprintId>,
    #[serde(default)]
    pub lanes: Vec<Lane>,
}

impl Board {
    pub fn lane(&self, id: &LaneId) -> Option<&Lane> {
        self.lanes.iter().find(|l| &l.id == id)
    }

    pub fn lane_named(&self, name: &str) -> Option<&Lane> {
        self.lanes.iter().find(|l| l.name == name)
    }

    pub fn lane_names(&self) -> Vec<&str> {
        self.lanes.iter().map(|l| l.name.as_str()).collect()
    }
}

/// Board fields as held by the normalized store; lanes are referenced by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRecord {
    pub id: BoardId,
    pub project_id: ProjectId,
    pub name: String,
    pub kind: BoardKind,
    pub is_default: bool,
    pub sprint_id: Option<SprintId>,
    pub lane_order: Vec<LaneId>,
}

impl BoardRecord {
    /// Split a board into its record and lanes in order.
    pub fn split(board: Board) -> (Self, Vec<Lane>) {
        let lane_order = board.lanes.iter().map(|l| l.id.clone()).collect();
        (
            Self {
                id: board.id,
                project_id: board.project_id,
                name: board.name,
                kind: board.kind,
                is_default: board.is_default,
                sprint_id: board.sprint_id,
                lane_order,
            },
            board.lanes,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBoard {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: BoardKind,
    #[serde(default)]
    pub is_default: bool,
    pub sprint_id: Option<SprintId>,
    #[serde(default)]
    pub lanes: Vec<NewLane>,
}

impl NewBoard {
    pub fn new(name: impl Into<String>, kind: BoardKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Self::default()
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn in_sprint(mut self, sprint: SprintId) -> Self {
        self.sprint_id = Some(sprint);
        self
    }

    pub fn with_lane(mut self, lane: NewLane) -> Self {
        self.lanes.push(lane);
        self
    }

    /// Validated copy. A state listed on several lanes stays only on the
    /// last of them, as if the lanes had been created one after another.
    pub fn validated(&self) -> Result<Self> {
        validate_sprint(self.kind, self.sprint_id.as_ref())?;
        let mut lanes = self
            .lanes
            .iter()
            .map(NewLane::validated)
            .collect::<Result<Vec<_>>>()?;
        let mut claimed: BTreeSet<StateId> = BTreeSet::new();
        for lane in lanes.iter_mut().rev() {
            lane.state_ids.retain(|state| !claimed.contains(state));
            claimed.extend(lane.state_ids.iter().cloned());
        }
        Ok(Self {
            name: validate_name("Board", &self.name)?,
            lanes,
            ..self.clone()
        })
    }
}

/// Only scrum boards follow a sprint.
pub fn validate_sprint(kind: BoardKind, sprint: Option<&SprintId>) -> Result<()> {
    if kind == BoardKind::Kanban && sprint.is_some() {
        return Err(Error::Validation(
            "Kanban boards cannot be assigned to a sprint".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
}

impl BoardPatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn make_default() -> Self {
        Self {
            is_default: Some(true),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.is_default.is_none()
    }

    pub fn validated(&self) -> Result<Self> {
        if self.is_empty() {
            return Err(Error::Validation("Nothing to update".to_string()));
        }
        let name = match &self.name {
            Some(name) => Some(validate_name("Board", name)?),
            None => None,
        };
        Ok(Self {
            name,
            is_default: self.is_default,
        })
    }

    pub fn merge(&mut self, later: BoardPatch) {
        if later.name.is_some() {
            self.name = later.name;
        }
        if later.is_default.is_some() {
            self.is_default = later.is_default;
        }
    }

    pub fn apply(&self, record: &mut BoardRecord) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        if let Some(is_default) = self.is_default {
            record.is_default = is_default;
        }
    }
}
