//! Core domain types: ids, boards and lanes.

pub mod board;
pub mod ids;
pub mod lane;

pub use board::{validate_sprint, Board, BoardKind, BoardPatch, BoardRecord, NewBoard};
pub use ids::{BoardId, ClientKey, LaneId, ProjectId, SprintId, StateId, TEMP_PREFIX};
pub use lane::{validate_name, Lane, LanePatch, LaneRecord, LaneStatus, NewLane, MAX_NAME_LENGTH};
