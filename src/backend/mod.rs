//! Contract with the backing store.
//!
//! The coordinator never touches persistence itself: every mutation becomes a
//! [`Request`] handed to a [`Backend`], whose canonical answer comes back as a
//! [`Response`]. Create requests carry a [`ClientKey`] that the store echoes
//! in [`Confirmed`], which is how a placeholder record is matched to its
//! canonical replacement.

mod memory;

pub use memory::{MemoryBackend, ServerState};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::core::{
    Board, BoardId, BoardPatch, ClientKey, Lane, LaneId, LanePatch, NewBoard, NewLane, ProjectId,
    SprintId,
};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLane {
    pub client_key: ClientKey,
    pub board_id: BoardId,
    pub attrs: NewLane,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoard {
    pub client_key: ClientKey,
    pub project_id: ProjectId,
    pub attrs: NewBoard,
}

/// A created entity together with the key of the request that created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmed<T> {
    pub client_key: ClientKey,
    pub entity: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deleted {
    pub success: bool,
}

/// Request/response RPC surface of the store.
///
/// Errors are `Error::Rejected` when the store refuses the change and
/// `Error::Unavailable` when it cannot be reached.
pub trait Backend: Send + Sync {
    fn list_boards<'a>(&'a self, project_id: &'a ProjectId) -> BoxFuture<'a, Result<Vec<Board>>>;

    fn create_board(&self, request: CreateBoard) -> BoxFuture<'_, Result<Confirmed<Board>>>;

    fn update_board<'a>(
        &'a self,
        id: &'a BoardId,
        patch: BoardPatch,
    ) -> BoxFuture<'a, Result<Board>>;

    fn delete_board<'a>(&'a self, id: &'a BoardId) -> BoxFuture<'a, Result<Deleted>>;

    fn move_board_to_sprint<'a>(
        &'a self,
        id: &'a BoardId,
        sprint_id: Option<SprintId>,
    ) -> BoxFuture<'a, Result<Board>>;

    fn create_lane(&self, request: CreateLane) -> BoxFuture<'_, Result<Confirmed<Lane>>>;

    fn update_lane<'a>(&'a self, id: &'a LaneId, patch: LanePatch)
        -> BoxFuture<'a, Result<Lane>>;

    fn delete_lane<'a>(&'a self, id: &'a LaneId) -> BoxFuture<'a, Result<Deleted>>;

    fn reorder_lanes<'a>(
        &'a self,
        board_id: &'a BoardId,
        order: Vec<LaneId>,
    ) -> BoxFuture<'a, Result<Vec<Lane>>>;
}

/// A mutation as sent to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    CreateLane(CreateLane),
    UpdateLane {
        id: LaneId,
        patch: LanePatch,
    },
    DeleteLane {
        id: LaneId,
    },
    ReorderLanes {
        board_id: BoardId,
        order: Vec<LaneId>,
    },
    CreateBoard(CreateBoard),
    UpdateBoard {
        id: BoardId,
        patch: BoardPatch,
    },
    DeleteBoard {
        id: BoardId,
    },
    MoveBoardToSprint {
        id: BoardId,
        sprint_id: Option<SprintId>,
    },
}

impl Request {
    /// Short human description, used in notifications.
    pub fn label(&self) -> &'static str {
        match self {
            Request::CreateLane(_) => "create lane",
            Request::UpdateLane { .. } => "update lane",
            Request::DeleteLane { .. } => "delete lane",
            Request::ReorderLanes { .. } => "reorder lanes",
            Request::CreateBoard(_) => "create board",
            Request::UpdateBoard { .. } => "update board",
            Request::DeleteBoard { .. } => "delete board",
            Request::MoveBoardToSprint { .. } => "move board to sprint",
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, Request::CreateLane(_) | Request::CreateBoard(_))
    }
}

/// The store's answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    LaneCreated(Confirmed<Lane>),
    LaneUpdated(Lane),
    LaneDeleted(LaneId),
    LanesReordered { board_id: BoardId, lanes: Vec<Lane> },
    BoardCreated(Confirmed<Board>),
    BoardUpdated(Board),
    BoardDeleted(BoardId),
}

fn deleted(kind: &str, id: &str, result: Deleted) -> Result<()> {
    if result.success {
        Ok(())
    } else {
        Err(Error::Rejected(format!("{} {} was not deleted", kind, id)))
    }
}

/// Send a request and wrap the answer. `Deleted { success: false }` is an error.
pub async fn execute(backend: &dyn Backend, request: Request) -> Result<Response> {
    match request {
        Request::CreateLane(create) => backend.create_lane(create).await.map(Response::LaneCreated),
        Request::UpdateLane { id, patch } => {
            backend.update_lane(&id, patch).await.map(Response::LaneUpdated)
        }
        Request::DeleteLane { id } => {
            deleted("Lane", id.as_str(), backend.delete_lane(&id).await?)?;
            Ok(Response::LaneDeleted(id))
        }
        Request::ReorderLanes { board_id, order } => {
            let lanes = backend.reorder_lanes(&board_id, order).await?;
            Ok(Response::LanesReordered { board_id, lanes })
        }
        Request::CreateBoard(create) => {
            backend.create_board(create).await.map(Response::BoardCreated)
        }
        Request::UpdateBoard { id, patch } => {
            backend.update_board(&id, patch).await.map(Response::BoardUpdated)
        }
        Request::DeleteBoard { id } => {
            deleted("Board", id.as_str(), backend.delete_board(&id).await?)?;
            Ok(Response::BoardDeleted(id))
        }
        Request::MoveBoardToSprint { id, sprint_id } => backend
            .move_board_to_sprint(&id, sprint_id)
            .await
            .map(Response::BoardUpdated),
    }
}
