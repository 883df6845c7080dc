pub mod config;
pub mod error;
pub mod log;
pub mod util;

// Domain and normalized cache
pub mod core;
pub mod store;

// Store contract and mutation planning
pub mod backend;
pub mod mutation;

// Optimistic coordinator runtime
pub mod app;
pub mod tea;
pub mod view;

pub use app::Coordinator;
pub use error::{Error, Result};
pub use view::ViewState;
