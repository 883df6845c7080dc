//! The Elm Architecture (TEA) runtime of the coordinator.
//!
//! - `Model`: the store plus bookkeeping for in-flight mutations
//! - `Message`: completions coming back from spawned backend calls
//! - `Command`: side effects the runtime has to execute
//! - `update` / `submit`: state transitions, no IO

pub mod command;
pub mod message;
pub mod model;
pub mod update;

pub use command::Command;
pub use message::Message;
pub use model::{Aliases, InFlight, Model, Notification, NotificationLevel, OpId};
pub use update::{submit, update};
