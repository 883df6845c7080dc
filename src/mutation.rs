//! Planning of board and lane mutations.
//!
//! A [`Mutation`] is what the user asked for. Planning it against the current
//! [`Store`] validates the input, enforces the temporary-id guard and produces
//! a [`Plan`]: the speculative [`Patch`] to apply right away plus the
//! [`Request`] to send, if any. Planning never touches the store.

use std::collections::BTreeSet;

use crate::backend::{CreateBoard, CreateLane, Request};
use crate::core::{
    validate_sprint, BoardId, BoardPatch, BoardRecord, ClientKey, LaneId, LanePatch, NewBoard,
    NewLane, ProjectId, SprintId, StateId,
};
use crate::store::{Change, Patch, Store};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateLane {
        key: ClientKey,
        board_id: BoardId,
        attrs: NewLane,
    },
    UpdateLane {
        lane_id: LaneId,
        patch: LanePatch,
    },
    DeleteLane {
        lane_id: LaneId,
    },
    ReorderLanes {
        board_id: BoardId,
        order: Vec<LaneId>,
    },
    CreateBoard {
        key: ClientKey,
        project_id: ProjectId,
        attrs: NewBoard,
    },
    UpdateBoard {
        board_id: BoardId,
        patch: BoardPatch,
    },
    DeleteBoard {
        board_id: BoardId,
    },
    MoveBoardToSprint {
        board_id: BoardId,
        sprint_id: Option<SprintId>,
    },
}

/// Edit made to a record that only exists locally, to be sent once the
/// record's create is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEdit {
    Lane(LaneId, LanePatch),
    Board(BoardId, BoardPatch),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub project_id: ProjectId,
    pub patch: Patch,
    pub dispatch: Dispatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Send to the store.
    Send(Request),
    /// Target is still pending; keep the edit locally.
    Hold(LocalEdit),
}

fn not_yet_created(kind: &'static str, name: &str) -> Error {
    Error::NotYetCreated {
        kind,
        name: name.to_string(),
    }
}

fn board<'a>(store: &'a Store, id: &BoardId) -> Result<&'a BoardRecord> {
    store
        .board_record(id)
        .ok_or_else(|| Error::BoardNotFound(id.to_string()))
}

/// Changes that remove `states` from every lane of the board but `keep`.
fn unmap_states(
    store: &Store,
    board_id: &BoardId,
    keep: &LaneId,
    states: &BTreeSet<StateId>,
) -> Vec<Change> {
    if states.is_empty() {
        return Vec::new();
    }
    store
        .lane_records(board_id)
        .into_iter()
        .filter(|lane| &lane.id != keep && !lane.state_ids.is_disjoint(states))
        .map(|lane| {
            let mut lane = lane.clone();
            lane.state_ids.retain(|s| !states.contains(s));
            Change::PutLane(lane)
        })
        .collect()
}

/// Changes that clear `is_default` on every other board of the project.
pub(crate) fn clear_default(
    store: &Store,
    project_id: &ProjectId,
    keep: &BoardId,
) -> Vec<Change> {
    store
        .board_ids(project_id)
        .iter()
        .filter(|id| *id != keep)
        .filter_map(|id| store.board_record(id))
        .filter(|record| record.is_default)
        .map(|record| {
            let mut record = record.clone();
            record.is_default = false;
            Change::PutBoardFields(record)
        })
        .collect()
}

impl Mutation {
    pub fn label(&self) -> &'static str {
        match self {
            Mutation::CreateLane { .. } => "create lane",
            Mutation::UpdateLane { .. } => "update lane",
            Mutation::DeleteLane { .. } => "delete lane",
            Mutation::ReorderLanes { .. } => "reorder lanes",
            Mutation::CreateBoard { .. } => "create board",
            Mutation::UpdateBoard { .. } => "update board",
            Mutation::DeleteBoard { .. } => "delete board",
            Mutation::MoveBoardToSprint { .. } => "move board to sprint",
        }
    }

    pub fn plan(&self, store: &Store) -> Result<Plan> {
        match self {
            Mutation::CreateLane {
                key,
                board_id,
                attrs,
            } => plan_create_lane(store, *key, board_id, attrs),
            Mutation::UpdateLane { lane_id, patch } => plan_update_lane(store, lane_id, patch),
            Mutation::DeleteLane { lane_id } => plan_delete_lane(store, lane_id),
            Mutation::ReorderLanes { board_id, order } => plan_reorder(store, board_id, order),
            Mutation::CreateBoard {
                key,
                project_id,
                attrs,
            } => plan_create_board(store, *key, project_id, attrs),
            Mutation::UpdateBoard { board_id, patch } => plan_update_board(store, board_id, patch),
            Mutation::DeleteBoard { board_id } => plan_delete_board(store, board_id),
            Mutation::MoveBoardToSprint {
                board_id,
                sprint_id,
            } => plan_move_to_sprint(store, board_id, sprint_id.clone()),
        }
    }
}

fn plan_create_lane(
    store: &Store,
    key: ClientKey,
    board_id: &BoardId,
    attrs: &NewLane,
) -> Result<Plan> {
    let attrs = attrs.validated()?;
    let record = board(store, board_id)?;
    if board_id.is_temp() {
        return Err(not_yet_created("Board", &record.name));
    }

    let id = LaneId::temp(key);
    let siblings = store.lane_records(board_id);
    let slot = attrs
        .position
        .map(|p| p as usize)
        .unwrap_or(siblings.len())
        .min(siblings.len());
    let after = slot.checked_sub(1).map(|i| siblings[i].id.clone());

    let mut patch = Patch::from(unmap_states(store, board_id, &id, &attrs.state_ids));
    patch.push(Change::PutLane(
        attrs.clone().into_record(id.clone(), board_id.clone()),
    ));
    patch.push(Change::AttachLane {
        board_id: board_id.clone(),
        lane_id: id,
        after,
        index: slot,
    });

    Ok(Plan {
        project_id: record.project_id.clone(),
        patch,
        dispatch: Dispatch::Send(Request::CreateLane(CreateLane {
            client_key: key,
            board_id: board_id.clone(),
            attrs,
        })),
    })
}

fn plan_update_lane(store: &Store, lane_id: &LaneId, patch: &LanePatch) -> Result<Plan> {
    let patch = patch.validated()?;
    let current = store
        .lane_record(lane_id)
        .ok_or_else(|| Error::LaneNotFound(lane_id.to_string()))?;
    let project_id = board(store, &current.board_id)?.project_id.clone();

    let mut updated = current.clone();
    patch.apply(&mut updated);
    let mut changes = match &patch.state_ids {
        Some(states) => unmap_states(store, &current.board_id, lane_id, states),
        None => Vec::new(),
    };
    changes.push(Change::PutLane(updated));

    let dispatch = if lane_id.is_temp() {
        Dispatch::Hold(LocalEdit::Lane(lane_id.clone(), patch))
    } else {
        Dispatch::Send(Request::UpdateLane {
            id: lane_id.clone(),
            patch,
        })
    };
    Ok(Plan {
        project_id,
        patch: Patch::from(changes),
        dispatch,
    })
}

fn plan_delete_lane(store: &Store, lane_id: &LaneId) -> Result<Plan> {
    let current = store
        .lane_record(lane_id)
        .ok_or_else(|| Error::LaneNotFound(lane_id.to_string()))?;
    if lane_id.is_temp() {
        return Err(not_yet_created("Lane", &current.name));
    }
    let record = board(store, &current.board_id)?;

    Ok(Plan {
        project_id: record.project_id.clone(),
        patch: Patch::from(vec![
            Change::RemoveLane(lane_id.clone()),
            Change::DetachLane {
                board_id: record.id.clone(),
                lane_id: lane_id.clone(),
            },
        ]),
        dispatch: Dispatch::Send(Request::DeleteLane {
            id: lane_id.clone(),
        }),
    })
}

fn plan_reorder(store: &Store, board_id: &BoardId, order: &[LaneId]) -> Result<Plan> {
    let record = board(store, board_id)?;
    if board_id.is_temp() {
        return Err(not_yet_created("Board", &record.name));
    }

    let current: Vec<&LaneId> = store
        .lane_records(board_id)
        .into_iter()
        .map(|lane| &lane.id)
        .collect();
    let requested: BTreeSet<&LaneId> = order.iter().collect();
    let existing: BTreeSet<&LaneId> = current.iter().copied().collect();
    if requested.len() != order.len() || requested != existing {
        return Err(Error::Validation(
            "Lane order must list every lane of the board exactly once".to_string(),
        ));
    }
    if let Some(pending) = order.iter().find(|id| id.is_temp()) {
        let name = store
            .lane_record(pending)
            .map(|lane| lane.name.as_str())
            .unwrap_or_default();
        return Err(not_yet_created("Lane", name));
    }

    Ok(Plan {
        project_id: record.project_id.clone(),
        patch: Patch::from(vec![Change::ArrangeLanes {
            board_id: board_id.clone(),
            order: order.to_vec(),
        }]),
        dispatch: Dispatch::Send(Request::ReorderLanes {
            board_id: board_id.clone(),
            order: order.to_vec(),
        }),
    })
}

fn plan_create_board(
    store: &Store,
    key: ClientKey,
    project_id: &ProjectId,
    attrs: &NewBoard,
) -> Result<Plan> {
    let attrs = attrs.validated()?;
    let id = BoardId::temp(key);

    let mut patch = Patch::new();
    let mut lane_order = Vec::with_capacity(attrs.lanes.len());
    for lane in &attrs.lanes {
        let lane_id = LaneId::temp(ClientKey::new());
        patch.push(Change::PutLane(
            lane.clone().into_record(lane_id.clone(), id.clone()),
        ));
        lane_order.push(lane_id);
    }
    if attrs.is_default {
        for change in clear_default(store, project_id, &id) {
            patch.push(change);
        }
    }
    patch.push(Change::PutBoard(BoardRecord {
        id: id.clone(),
        project_id: project_id.clone(),
        name: attrs.name.clone(),
        kind: attrs.kind,
        is_default: attrs.is_default,
        sprint_id: attrs.sprint_id.clone(),
        lane_order,
    }));
    let siblings = store.board_ids(project_id);
    patch.push(Change::AttachBoard {
        project_id: project_id.clone(),
        board_id: id,
        after: siblings.last().cloned(),
        index: siblings.len(),
    });

    Ok(Plan {
        project_id: project_id.clone(),
        patch,
        dispatch: Dispatch::Send(Request::CreateBoard(CreateBoard {
            client_key: key,
            project_id: project_id.clone(),
            attrs,
        })),
    })
}

fn plan_update_board(store: &Store, board_id: &BoardId, patch: &BoardPatch) -> Result<Plan> {
    let patch = patch.validated()?;
    let current = board(store, board_id)?;

    let mut updated = current.clone();
    patch.apply(&mut updated);
    let mut changes = if patch.is_default == Some(true) {
        clear_default(store, &current.project_id, board_id)
    } else {
        Vec::new()
    };
    changes.push(Change::PutBoardFields(updated));

    let dispatch = if board_id.is_temp() {
        Dispatch::Hold(LocalEdit::Board(board_id.clone(), patch))
    } else {
        Dispatch::Send(Request::UpdateBoard {
            id: board_id.clone(),
            patch,
        })
    };
    Ok(Plan {
        project_id: current.project_id.clone(),
        patch: Patch::from(changes),
        dispatch,
    })
}

fn plan_delete_board(store: &Store, board_id: &BoardId) -> Result<Plan> {
    let current = board(store, board_id)?;
    if board_id.is_temp() {
        return Err(not_yet_created("Board", &current.name));
    }

    let mut patch: Patch = current
        .lane_order
        .iter()
        .map(|id| Change::RemoveLane(id.clone()))
        .collect();
    patch.push(Change::RemoveBoard(board_id.clone()));
    patch.push(Change::DetachBoard {
        project_id: current.project_id.clone(),
        board_id: board_id.clone(),
    });

    Ok(Plan {
        project_id: current.project_id.clone(),
        patch,
        dispatch: Dispatch::Send(Request::DeleteBoard {
            id: board_id.clone(),
        }),
    })
}

fn plan_move_to_sprint(
    store: &Store,
    board_id: &BoardId,
    sprint_id: Option<SprintId>,
) -> Result<Plan> {
    let current = board(store, board_id)?;
    if board_id.is_temp() {
        return Err(not_yet_created("Board", &current.name));
    }
    validate_sprint(current.kind, sprint_id.as_ref())?;

    let mut updated = current.clone();
    updated.sprint_id = sprint_id.clone();
    Ok(Plan {
        project_id: current.project_id.clone(),
        patch: Patch::from(vec![Change::PutBoardFields(updated)]),
        dispatch: Dispatch::Send(Request::MoveBoardToSprint {
            id: board_id.clone(),
            sprint_id,
        }),
    })
}
