//! In-process backing store.
//!
//! Behaves like the real service as far as the coordinator can tell: it
//! issues ids, renumbers lane positions densely, enforces uniqueness and
//! default-board rules, and honours client keys so a retried create returns
//! the entity created the first time. It can be taken offline or told to
//! fail the next N requests, and persists to a JSON file for the CLI.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{Backend, Confirmed, CreateBoard, CreateLane, Deleted};
use crate::core::{
    validate_sprint, Board, BoardId, BoardPatch, ClientKey, Lane, LaneId, LanePatch, LaneRecord,
    ProjectId, SprintId, StateId,
};
use crate::util::{blocking, write_atomic};
use crate::{bslog_debug, Error, Result};

const STATE_VERSION: u32 = 1;

fn state_version() -> u32 {
    STATE_VERSION
}

/// Everything the store persists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerState {
    #[serde(default = "state_version")]
    pub version: u32,
    #[serde(default)]
    pub next_id: u64,
    #[serde(default)]
    pub boards: Vec<Board>,
    /// Entity id issued for each client key seen on a create.
    #[serde(default)]
    pub created: BTreeMap<ClientKey, String>,
}

fn rejected(message: impl Into<String>) -> Error {
    Error::Rejected(message.into())
}

fn renumber(lanes: &mut [Lane]) {
    for (position, lane) in lanes.iter_mut().enumerate() {
        lane.position = position as u32;
    }
}

/// Drop `states` from every lane of the board except `keep`.
fn unmap_states(lanes: &mut [Lane], keep: &LaneId, states: &std::collections::BTreeSet<StateId>) {
    for lane in lanes.iter_mut().filter(|l| &l.id != keep) {
        lane.state_ids.retain(|s| !states.contains(s));
    }
}

fn ensure_persisted(id: &str, is_temp: bool) -> Result<()> {
    if is_temp {
        return Err(rejected(format!("{} has not been created", id)));
    }
    Ok(())
}

impl ServerState {
    fn issue(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn board_index(&self, id: &BoardId) -> Result<usize> {
        self.boards
            .iter()
            .position(|b| &b.id == id)
            .ok_or_else(|| rejected(format!("Board {} does not exist", id)))
    }

    fn lane_index(&self, id: &LaneId) -> Option<(usize, usize)> {
        self.boards.iter().enumerate().find_map(|(b, board)| {
            board
                .lanes
                .iter()
                .position(|l| &l.id == id)
                .map(|l| (b, l))
        })
    }

    fn check_lane_name(board: &Board, name: &str, except: Option<&LaneId>) -> Result<()> {
        let taken = board
            .lanes
            .iter()
            .filter(|l| Some(&l.id) != except)
            .any(|l| l.name.eq_ignore_ascii_case(name));
        if taken {
            return Err(rejected(format!(
                "A lane named '{}' already exists on {}",
                name, board.name
            )));
        }
        Ok(())
    }

    fn check_board_name(
        &self,
        project: &ProjectId,
        name: &str,
        except: Option<&BoardId>,
    ) -> Result<()> {
        let taken = self
            .boards
            .iter()
            .filter(|b| &b.project_id == project && Some(&b.id) != except)
            .any(|b| b.name.eq_ignore_ascii_case(name));
        if taken {
            return Err(rejected(format!("A board named '{}' already exists", name)));
        }
        Ok(())
    }

    fn clear_default(&mut self, project: &ProjectId, keep: &BoardId) {
        for board in self
            .boards
            .iter_mut()
            .filter(|b| &b.project_id == project && &b.id != keep)
        {
            board.is_default = false;
        }
    }

    pub fn list_boards(&self, project: &ProjectId) -> Vec<Board> {
        self.boards
            .iter()
            .filter(|b| &b.project_id == project)
            .cloned()
            .collect()
    }

    pub fn find_board(&self, id: &BoardId) -> Option<&Board> {
        self.boards.iter().find(|b| &b.id == id)
    }

    pub fn create_board(&mut self, request: CreateBoard) -> Result<Confirmed<Board>> {
        let client_key = request.client_key;
        if let Some(id) = self.created.get(&client_key) {
            let id = BoardId::new(id.clone());
            if let Some(board) = self.find_board(&id) {
                return Ok(Confirmed {
                    client_key,
                    entity: board.clone(),
                });
            }
        }

        let attrs = request.attrs.validated()?;
        self.check_board_name(&request.project_id, &attrs.name, None)?;
        let first_in_project = !self.boards.iter().any(|b| b.project_id == request.project_id);

        let id = BoardId::new(self.issue("board"));
        let mut lanes = Vec::with_capacity(attrs.lanes.len());
        for new_lane in attrs.lanes {
            let lane_id = LaneId::new(self.issue("lane"));
            let lane = new_lane.into_record(lane_id, id.clone()).to_lane(0);
            if lanes.iter().any(|l: &Lane| l.name.eq_ignore_ascii_case(&lane.name)) {
                return Err(rejected(format!("Duplicate lane name '{}'", lane.name)));
            }
            lanes.push(lane);
        }
        renumber(&mut lanes);

        let board = Board {
            id: id.clone(),
            project_id: request.project_id.clone(),
            name: attrs.name,
            kind: attrs.kind,
            is_default: attrs.is_default || first_in_project,
            sprint_id: attrs.sprint_id,
            lanes,
        };
        if board.is_default {
            self.clear_default(&board.project_id, &id);
        }
        self.created.insert(client_key, id.0.clone());
        self.boards.push(board.clone());
        Ok(Confirmed {
            client_key,
            entity: board,
        })
    }

    pub fn update_board(&mut self, id: &BoardId, patch: BoardPatch) -> Result<Board> {
        ensure_persisted(id.as_str(), id.is_temp())?;
        let patch = patch.validated()?;
        let index = self.board_index(id)?;
        let project = self.boards[index].project_id.clone();
        if let Some(name) = &patch.name {
            self.check_board_name(&project, name, Some(id))?;
        }
        let board = &mut self.boards[index];
        if let Some(name) = patch.name {
            board.name = name;
        }
        if let Some(is_default) = patch.is_default {
            board.is_default = is_default;
        }
        let board = board.clone();
        if board.is_default {
            self.clear_default(&project, id);
        }
        Ok(board)
    }

    pub fn delete_board(&mut self, id: &BoardId) -> Result<Deleted> {
        ensure_persisted(id.as_str(), id.is_temp())?;
        let Some(index) = self.boards.iter().position(|b| &b.id == id) else {
            return Ok(Deleted { success: false });
        };
        if self.boards[index].is_default {
            return Err(rejected("Cannot delete the default board"));
        }
        self.boards.remove(index);
        Ok(Deleted { success: true })
    }

    pub fn move_board_to_sprint(
        &mut self,
        id: &BoardId,
        sprint: Option<SprintId>,
    ) -> Result<Board> {
        ensure_persisted(id.as_str(), id.is_temp())?;
        let index = self.board_index(id)?;
        let board = &mut self.boards[index];
        validate_sprint(board.kind, sprint.as_ref()).map_err(|e| rejected(e.to_string()))?;
        board.sprint_id = sprint;
        Ok(board.clone())
    }

    pub fn create_lane(&mut self, request: CreateLane) -> Result<Confirmed<Lane>> {
        let client_key = request.client_key;
        if let Some(id) = self.created.get(&client_key) {
            let id = LaneId::new(id.clone());
            if let Some((b, l)) = self.lane_index(&id) {
                return Ok(Confirmed {
                    client_key,
                    entity: self.boards[b].lanes[l].clone(),
                });
            }
        }

        ensure_persisted(request.board_id.as_str(), request.board_id.is_temp())?;
        let attrs = request.attrs.validated()?;
        let index = self.board_index(&request.board_id)?;
        Self::check_lane_name(&self.boards[index], &attrs.name, None)?;

        let id = LaneId::new(self.issue("lane"));
        let slot = attrs.position.map(|p| p as usize);
        let lane = attrs
            .into_record(id.clone(), request.board_id.clone())
            .to_lane(0);

        let board = &mut self.boards[index];
        let slot = slot.unwrap_or(board.lanes.len()).min(board.lanes.len());
        unmap_states(&mut board.lanes, &id, &lane.state_ids);
        board.lanes.insert(slot, lane);
        renumber(&mut board.lanes);
        let lane = board.lanes[slot].clone();

        self.created.insert(client_key, id.0.clone());
        Ok(Confirmed {
            client_key,
            entity: lane,
        })
    }

    pub fn update_lane(&mut self, id: &LaneId, patch: LanePatch) -> Result<Lane> {
        ensure_persisted(id.as_str(), id.is_temp())?;
        let patch = patch.validated()?;
        let (b, l) = self
            .lane_index(id)
            .ok_or_else(|| rejected(format!("Lane {} does not exist", id)))?;
        if let Some(name) = &patch.name {
            Self::check_lane_name(&self.boards[b], name, Some(id))?;
        }

        let board = &mut self.boards[b];
        let position = board.lanes[l].position;
        let mut record = LaneRecord::from(board.lanes[l].clone());
        patch.apply(&mut record);
        if patch.state_ids.is_some() {
            unmap_states(&mut board.lanes, id, &record.state_ids);
        }
        board.lanes[l] = record.to_lane(position);
        Ok(board.lanes[l].clone())
    }

    pub fn delete_lane(&mut self, id: &LaneId) -> Result<Deleted> {
        ensure_persisted(id.as_str(), id.is_temp())?;
        let Some((b, l)) = self.lane_index(id) else {
            return Ok(Deleted { success: false });
        };
        let lanes = &mut self.boards[b].lanes;
        lanes.remove(l);
        renumber(lanes);
        Ok(Deleted { success: true })
    }

    pub fn reorder_lanes(&mut self, board_id: &BoardId, order: Vec<LaneId>) -> Result<Vec<Lane>> {
        ensure_persisted(board_id.as_str(), board_id.is_temp())?;
        let index = self.board_index(board_id)?;
        let board = &mut self.boards[index];

        let mut current: Vec<&LaneId> = board.lanes.iter().map(|l| &l.id).collect();
        let mut requested: Vec<&LaneId> = order.iter().collect();
        current.sort();
        requested.sort();
        if current != requested {
            return Err(rejected(
                "Lane order must list every lane of the board exactly once",
            ));
        }

        let mut lanes = std::mem::take(&mut board.lanes);
        lanes.sort_by_key(|lane| order.iter().position(|id| id == &lane.id));
        renumber(&mut lanes);
        board.lanes = lanes;
        Ok(board.lanes.clone())
    }
}

pub struct MemoryBackend {
    state: Mutex<ServerState>,
    latency: Option<Duration>,
    offline: AtomicBool,
    fail_next: AtomicUsize,
    requests: AtomicUsize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_state(ServerState {
            version: STATE_VERSION,
            ..ServerState::default()
        })
    }

    pub fn with_state(state: ServerState) -> Self {
        Self {
            state: Mutex::new(state),
            latency: None,
            offline: AtomicBool::new(false),
            fail_next: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Option<Duration>) -> Self {
        self.latency = latency;
        self
    }

    /// Load persisted state; a missing file gives an empty store.
    pub async fn load(path: &Path) -> Result<Self> {
        let path = path.to_path_buf();
        let state = blocking(move || {
            bslog_debug!("MemoryBackend::load path={}", path.display());
            if !path.exists() {
                return Ok(ServerState {
                    version: STATE_VERSION,
                    ..ServerState::default()
                });
            }
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str::<ServerState>(&contents)?)
        })
        .await?;
        Ok(Self::with_state(state))
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(&*self.state.lock().await)?;
        let path = path.to_path_buf();
        blocking(move || {
            write_atomic(&path, &contents)?;
            bslog_debug!("MemoryBackend saved: {}", path.display());
            Ok(())
        })
        .await
    }

    pub async fn state(&self) -> ServerState {
        self.state.lock().await.clone()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next `n` requests as if the store were unreachable.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Number of requests that reached this backend.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    async fn begin(&self) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("store is offline".to_string()));
        }
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(Error::Unavailable("request failed".to_string()));
        }
        Ok(())
    }
}

impl Backend for MemoryBackend {
    fn list_boards<'a>(&'a self, project_id: &'a ProjectId) -> BoxFuture<'a, Result<Vec<Board>>> {
        Box::pin(async move {
            self.begin().await?;
            Ok(self.state.lock().await.list_boards(project_id))
        })
    }

    fn create_board(&self, request: CreateBoard) -> BoxFuture<'_, Result<Confirmed<Board>>> {
        Box::pin(async move {
            self.begin().await?;
            self.state.lock().await.create_board(request)
        })
    }

    fn update_board<'a>(
        &'a self,
        id: &'a BoardId,
        patch: BoardPatch,
    ) -> BoxFuture<'a, Result<Board>> {
        Box::pin(async move {
            self.begin().await?;
            self.state.lock().await.update_board(id, patch)
        })
    }

    fn delete_board<'a>(&'a self, id: &'a BoardId) -> BoxFuture<'a, Result<Deleted>> {
        Box::pin(async move {
            self.begin().await?;
            self.state.lock().await.delete_board(id)
        })
    }

    fn move_board_to_sprint<'a>(
        &'a self,
        id: &'a BoardId,
        sprint_id: Option<SprintId>,
    ) -> BoxFuture<'a, Result<Board>> {
        Box::pin(async move {
            self.begin().await?;
            self.state.lock().await.move_board_to_sprint(id, sprint_id)
        })
    }

    fn create_lane(&self, request: CreateLane) -> BoxFuture<'_, Result<Confirmed<Lane>>> {
        Box::pin(async move {
            self.begin().await?;
            self.state.lock().await.create_lane(request)
        })
    }

    fn update_lane<'a>(
        &'a self,
        id: &'a LaneId,
        patch: LanePatch,
    ) -> BoxFuture<'a, Result<Lane>> {
        Box::pin(async move {
            self.begin().await?;
            self.state.lock().await.update_lane(id, patch)
        })
    }

    fn delete_lane<'a>(&'a self, id: &'a LaneId) -> BoxFuture<'a, Result<Deleted>> {
        Box::pin(async move {
            self.begin().await?;
            self.state.lock().await.delete_lane(id)
        })
    }

    fn reorder_lanes<'a>(
        &'a self,
        board_id: &'a BoardId,
        order: Vec<LaneId>,
    ) -> BoxFuture<'a, Result<Vec<Lane>>> {
        Box::pin(async move {
            self.begin().await?;
            self.state.lock().await.reorder_lanes(board_id, order)
        })
    }
}
