//! Commands for the TEA (The Elm Architecture) pattern.
//!
//! Commands are outputs from the update function. The runtime turns each one
//! into a spawned task whose result comes back as a [`super::Message`].

use crate::backend::Request;
use crate::core::ProjectId;

use super::model::OpId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send a mutation to the store.
    Dispatch { op: OpId, request: Request },
    /// Fetch the project's board list.
    Fetch { project_id: ProjectId },
}
