//! Normalized client-side cache of boards and lanes.
//!
//! Boards and lanes are held once, keyed by id, and each project keeps an
//! ordered list of board ids. The two read views the UI consumes (board by
//! id, boards of a project) are assembled from the same records, so they can
//! never disagree. Lane positions are not stored: they are the index in the
//! board's lane order, which keeps them dense by construction.

mod patch;

pub use patch::{Change, Patch};

use std::collections::{BTreeSet, HashMap};

use crate::bslog_trace;
use crate::core::{Board, BoardId, BoardRecord, Lane, LaneId, LaneRecord, ProjectId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Store {
    boards: HashMap<BoardId, BoardRecord>,
    lanes: HashMap<LaneId, LaneRecord>,
    projects: HashMap<ProjectId, Vec<BoardId>>,
    stale: BTreeSet<ProjectId>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // Record access

    pub fn board_record(&self, id: &BoardId) -> Option<&BoardRecord> {
        self.boards.get(id)
    }

    pub fn lane_record(&self, id: &LaneId) -> Option<&LaneRecord> {
        self.lanes.get(id)
    }

    pub fn board_ids(&self, project_id: &ProjectId) -> &[BoardId] {
        self.projects
            .get(project_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn projects(&self) -> impl Iterator<Item = &ProjectId> {
        self.projects.keys()
    }

    /// Whether a board list has been fetched (or speculatively created) for the project.
    pub fn is_loaded(&self, project_id: &ProjectId) -> bool {
        self.projects.contains_key(project_id)
    }

    // Views

    /// Board by id with its lanes in position order.
    pub fn get_by_id(&self, id: &BoardId) -> Option<Board> {
        let record = self.boards.get(id)?;
        let lanes = record
            .lane_order
            .iter()
            .filter_map(|lane_id| self.lanes.get(lane_id))
            .enumerate()
            .map(|(position, lane)| lane.to_lane(position as u32))
            .collect();
        Some(Board {
            id: record.id.clone(),
            project_id: record.project_id.clone(),
            name: record.name.clone(),
            kind: record.kind,
            is_default: record.is_default,
            sprint_id: record.sprint_id.clone(),
            lanes,
        })
    }

    /// Boards of a project in list order.
    pub fn get_for_project(&self, project_id: &ProjectId) -> Vec<Board> {
        self.board_ids(project_id)
            .iter()
            .filter_map(|id| self.get_by_id(id))
            .collect()
    }

    pub fn lane(&self, id: &LaneId) -> Option<Lane> {
        let record = self.lanes.get(id)?;
        let position = self.lane_position(id)?;
        Some(record.to_lane(position as u32))
    }

    pub fn lane_position(&self, id: &LaneId) -> Option<usize> {
        let record = self.lanes.get(id)?;
        let board = self.boards.get(&record.board_id)?;
        board
            .lane_order
            .iter()
            .filter(|lane_id| self.lanes.contains_key(*lane_id))
            .position(|lane_id| lane_id == id)
    }

    /// Sibling lanes of a board in order.
    pub fn lane_records(&self, board_id: &BoardId) -> Vec<&LaneRecord> {
        self.boards
            .get(board_id)
            .map(|board| {
                board
                    .lane_order
                    .iter()
                    .filter_map(|id| self.lanes.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    // Keyed writes

    /// Replace a board aggregate with whatever `f` returns (`None` removes it).
    ///
    /// Lanes returned by `f` are ordered by their `position` field. The write
    /// goes through a [`Patch`]; the inverse is returned.
    pub fn set_board<F>(&mut self, id: &BoardId, f: F) -> Patch
    where
        F: FnOnce(Option<Board>) -> Option<Board>,
    {
        let current = self.get_by_id(id);
        let next = f(current.clone());
        let patch = self.diff_board(id, current.as_ref(), next, true);
        patch.apply(self)
    }

    /// Replace a project's board list with whatever `f` returns.
    pub fn set_project_boards<F>(&mut self, project_id: &ProjectId, f: F) -> Patch
    where
        F: FnOnce(Vec<Board>) -> Vec<Board>,
    {
        let current = self.get_for_project(project_id);
        let next = f(current.clone());

        let mut patch = Patch::new();
        for board in current.iter() {
            if !next.iter().any(|b| b.id == board.id) {
                patch.extend(self.diff_board(&board.id, Some(board), None, false));
            }
        }
        let mut ids = Vec::with_capacity(next.len());
        for mut board in next {
            board.project_id = project_id.clone();
            let id = board.id.clone();
            let existing = current.iter().find(|b| b.id == id);
            patch.extend(self.diff_board(&id, existing, Some(board), false));
            ids.push(id);
        }
        patch.push(Change::SetBoardList {
            project_id: project_id.clone(),
            boards: ids,
        });
        patch.apply(self)
    }

    fn diff_board(
        &self,
        id: &BoardId,
        current: Option<&Board>,
        next: Option<Board>,
        touch_list: bool,
    ) -> Patch {
        let mut patch = Patch::new();
        let Some(mut next) = next else {
            if let Some(current) = current {
                for lane in &current.lanes {
                    patch.push(Change::RemoveLane(lane.id.clone()));
                }
                patch.push(Change::RemoveBoard(id.clone()));
                if touch_list {
                    let boards = self
                        .board_ids(&current.project_id)
                        .iter()
                        .filter(|b| *b != id)
                        .cloned()
                        .collect();
                    patch.push(Change::SetBoardList {
                        project_id: current.project_id.clone(),
                        boards,
                    });
                }
            }
            return patch;
        };

        next.id = id.clone();
        next.lanes.sort_by_key(|lane| lane.position);
        for lane in next.lanes.iter_mut() {
            lane.board_id = id.clone();
        }
        let (record, lanes) = BoardRecord::split(next);

        if let Some(current) = current {
            for lane in &current.lanes {
                if !record.lane_order.contains(&lane.id) {
                    patch.push(Change::RemoveLane(lane.id.clone()));
                }
            }
        }
        for lane in lanes {
            let lane = LaneRecord::from(lane);
            if self.lanes.get(&lane.id) != Some(&lane) {
                patch.push(Change::PutLane(lane));
            }
        }
        let in_list = self.board_ids(&record.project_id).contains(id);
        if touch_list && !in_list {
            let mut boards = self.board_ids(&record.project_id).to_vec();
            boards.push(id.clone());
            patch.push(Change::SetBoardList {
                project_id: record.project_id.clone(),
                boards,
            });
        }
        if self.boards.get(id) != Some(&record) {
            patch.push(Change::PutBoard(record));
        }
        patch
    }

    // Freshness

    /// Mark a project's board list as needing a refetch.
    pub fn invalidate(&mut self, project_id: &ProjectId) {
        self.stale.insert(project_id.clone());
    }

    pub fn is_stale(&self, project_id: &ProjectId) -> bool {
        self.stale.contains(project_id)
    }

    /// Install a fetch result for a project.
    ///
    /// Confirmed records are replaced by the fetched ones. Boards and lanes
    /// still waiting on their create are kept after the fetched entries; temp
    /// lanes of a board the fetch no longer returns are dropped.
    pub fn hydrate(&mut self, project_id: &ProjectId, boards: Vec<Board>) {
        bslog_trace!(
            "Store::hydrate project={} boards={}",
            project_id,
            boards.len()
        );
        let previous = self.projects.get(project_id).cloned().unwrap_or_default();
        let mut pending_boards = Vec::new();
        let mut pending_lanes: HashMap<BoardId, Vec<LaneId>> = HashMap::new();

        for id in previous {
            if id.is_temp() {
                pending_boards.push(id);
                continue;
            }
            let Some(record) = self.boards.remove(&id) else {
                continue;
            };
            for lane_id in record.lane_order {
                if lane_id.is_temp() {
                    pending_lanes.entry(id.clone()).or_default().push(lane_id);
                } else {
                    self.lanes.remove(&lane_id);
                }
            }
        }

        let mut list = Vec::with_capacity(boards.len() + pending_boards.len());
        for mut board in boards {
            board.lanes.sort_by_key(|lane| lane.position);
            let (mut record, lanes) = BoardRecord::split(board);
            for lane in lanes {
                self.lanes.insert(lane.id.clone(), LaneRecord::from(lane));
            }
            if let Some(pending) = pending_lanes.remove(&record.id) {
                record.lane_order.extend(pending);
            }
            list.push(record.id.clone());
            self.boards.insert(record.id.clone(), record);
        }
        for orphan in pending_lanes.into_values().flatten() {
            self.lanes.remove(&orphan);
        }
        list.extend(pending_boards);

        self.projects.insert(project_id.clone(), list);
        self.stale.remove(project_id);
    }
}
