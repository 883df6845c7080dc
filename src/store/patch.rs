//! Reversible store edits.
//!
//! Every write to the [`Store`] goes through a [`Patch`]. Applying a patch
//! returns its inverse; applying the inverse to the state the patch produced
//! restores the state the patch started from. Changes whose target has
//! disappeared in the meantime are skipped, so a stale inverse is harmless.
//!
//! Speculative edits only touch what they are about. Attaching or detaching
//! one id, rearranging a lane order and rewriting board fields all leave the
//! rest of a list alone, so undoing one of them later keeps whatever other
//! mutations confirmed in between.

use crate::core::{BoardId, BoardRecord, LaneId, LaneRecord, ProjectId};

use super::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    PutBoard(BoardRecord),
    /// Overwrite name, kind, default flag and sprint; the lane order is kept.
    PutBoardFields(BoardRecord),
    RemoveBoard(BoardId),
    PutLane(LaneRecord),
    RemoveLane(LaneId),
    SetLaneOrder {
        board_id: BoardId,
        order: Vec<LaneId>,
    },
    /// Put the listed lanes first in the given order. Lanes of the board not
    /// listed follow in their current order; listed lanes no longer on the
    /// board are skipped.
    ArrangeLanes {
        board_id: BoardId,
        order: Vec<LaneId>,
    },
    /// Insert a lane right after `after` (at the front when `None`), or at
    /// `index` when `after` is gone.
    AttachLane {
        board_id: BoardId,
        lane_id: LaneId,
        after: Option<LaneId>,
        index: usize,
    },
    DetachLane {
        board_id: BoardId,
        lane_id: LaneId,
    },
    SetBoardList {
        project_id: ProjectId,
        boards: Vec<BoardId>,
    },
    AttachBoard {
        project_id: ProjectId,
        board_id: BoardId,
        after: Option<BoardId>,
        index: usize,
    },
    DetachBoard {
        project_id: ProjectId,
        board_id: BoardId,
    },
    ClearBoardList(ProjectId),
}

/// Remove `item`, returning its predecessor and index.
fn detach<T: PartialEq + Clone>(list: &mut Vec<T>, item: &T) -> Option<(Option<T>, usize)> {
    let index = list.iter().position(|x| x == item)?;
    list.remove(index);
    let after = index.checked_sub(1).map(|i| list[i].clone());
    Some((after, index))
}

/// Insert `item` after `after`; `false` if it is already listed.
fn attach<T: PartialEq>(list: &mut Vec<T>, item: T, after: Option<&T>, index: usize) -> bool {
    if list.contains(&item) {
        return false;
    }
    let slot = match after {
        None => 0,
        Some(after) => list
            .iter()
            .position(|x| x == after)
            .map(|i| i + 1)
            .unwrap_or_else(|| index.min(list.len())),
    };
    list.insert(slot, item);
    true
}

impl Change {
    /// Apply to the store, returning the change that undoes it.
    fn apply(self, store: &mut Store) -> Option<Change> {
        match self {
            Change::PutBoard(record) => {
                let id = record.id.clone();
                Some(match store.boards.insert(id.clone(), record) {
                    Some(previous) => Change::PutBoard(previous),
                    None => Change::RemoveBoard(id),
                })
            }
            Change::PutBoardFields(fields) => {
                let board = store.boards.get_mut(&fields.id)?;
                let previous = board.clone();
                board.name = fields.name;
                board.kind = fields.kind;
                board.is_default = fields.is_default;
                board.sprint_id = fields.sprint_id;
                Some(Change::PutBoardFields(previous))
            }
            Change::RemoveBoard(id) => store.boards.remove(&id).map(Change::PutBoard),
            Change::PutLane(record) => {
                let id = record.id.clone();
                Some(match store.lanes.insert(id.clone(), record) {
                    Some(previous) => Change::PutLane(previous),
                    None => Change::RemoveLane(id),
                })
            }
            Change::RemoveLane(id) => store.lanes.remove(&id).map(Change::PutLane),
            Change::SetLaneOrder { board_id, order } => {
                let board = store.boards.get_mut(&board_id)?;
                let previous = std::mem::replace(&mut board.lane_order, order);
                Some(Change::SetLaneOrder {
                    board_id,
                    order: previous,
                })
            }
            Change::ArrangeLanes { board_id, order } => {
                let board = store.boards.get_mut(&board_id)?;
                let previous = board.lane_order.clone();
                let rest: Vec<LaneId> = previous
                    .iter()
                    .filter(|id| !order.contains(id))
                    .cloned()
                    .collect();
                let mut next: Vec<LaneId> = order
                    .into_iter()
                    .filter(|id| previous.contains(id))
                    .collect();
                next.extend(rest);
                board.lane_order = next;
                Some(Change::ArrangeLanes {
                    board_id,
                    order: previous,
                })
            }
            Change::AttachLane {
                board_id,
                lane_id,
                after,
                index,
            } => {
                let board = store.boards.get_mut(&board_id)?;
                attach(&mut board.lane_order, lane_id.clone(), after.as_ref(), index)
                    .then_some(Change::DetachLane { board_id, lane_id })
            }
            Change::DetachLane { board_id, lane_id } => {
                let board = store.boards.get_mut(&board_id)?;
                let (after, index) = detach(&mut board.lane_order, &lane_id)?;
                Some(Change::AttachLane {
                    board_id,
                    lane_id,
                    after,
                    index,
                })
            }
            Change::SetBoardList { project_id, boards } => {
                Some(match store.projects.insert(project_id.clone(), boards) {
                    Some(previous) => Change::SetBoardList {
                        project_id,
                        boards: previous,
                    },
                    None => Change::ClearBoardList(project_id),
                })
            }
            Change::AttachBoard {
                project_id,
                board_id,
                after,
                index,
            } => {
                let Some(list) = store.projects.get_mut(&project_id) else {
                    store.projects.insert(project_id.clone(), vec![board_id]);
                    return Some(Change::ClearBoardList(project_id));
                };
                attach(list, board_id.clone(), after.as_ref(), index).then_some(
                    Change::DetachBoard {
                        project_id,
                        board_id,
                    },
                )
            }
            Change::DetachBoard {
                project_id,
                board_id,
            } => {
                let list = store.projects.get_mut(&project_id)?;
                let (after, index) = detach(list, &board_id)?;
                Some(Change::AttachBoard {
                    project_id,
                    board_id,
                    after,
                    index,
                })
            }
            Change::ClearBoardList(project_id) => {
                let previous = store.projects.remove(&project_id)?;
                Some(Change::SetBoardList {
                    project_id,
                    boards: previous,
                })
            }
        }
    }
}

/// Ordered list of changes applied as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    changes: Vec<Change>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn extend(&mut self, other: Patch) {
        self.changes.extend(other.changes);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Apply all changes in order and return the inverse patch.
    pub fn apply(self, store: &mut Store) -> Patch {
        let mut inverse: Vec<Change> = self
            .changes
            .into_iter()
            .filter_map(|change| change.apply(store))
            .collect();
        inverse.reverse();
        Patch { changes: inverse }
    }
}

impl From<Vec<Change>> for Patch {
    fn from(changes: Vec<Change>) -> Self {
        Self { changes }
    }
}

impl FromIterator<Change> for Patch {
    fn from_iter<I: IntoIterator<Item = Change>>(iter: I) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}
