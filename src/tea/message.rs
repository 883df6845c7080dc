//! Messages for the TEA (The Elm Architecture) pattern.
//!
//! Messages are inputs to the update function. They are produced by the
//! tasks spawned for [`super::Command`]s, or by the coordinator itself.

use crate::backend::Response;
use crate::core::{Board, ProjectId};

use super::model::OpId;

#[derive(Debug)]
pub enum Message {
    // Fetch results
    Fetched {
        project_id: ProjectId,
        boards: Vec<Board>,
    },
    FetchFailed {
        project_id: ProjectId,
        error: String,
    },
    /// Mark a project stale and refetch it.
    Invalidate(ProjectId),

    // Mutation completions
    Completed {
        op: OpId,
        response: Response,
    },
    Failed {
        op: OpId,
        error: String,
    },
}
