//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Seeding a memory store with a board and lanes
//! - Building a coordinator that has loaded the seeded project
//! - Reading lane order the way a UI renders it

use std::sync::Arc;

use boardsync::backend::{Backend, CreateBoard, MemoryBackend};
use boardsync::config::Config;
use boardsync::core::{Board, BoardId, BoardKind, ClientKey, LaneId, NewBoard, NewLane, ProjectId};
use boardsync::Coordinator;

pub const PROJECT: &str = "project-1";

/// A coordinator with one confirmed board loaded.
pub struct TestBoard {
    pub backend: Arc<MemoryBackend>,
    pub coordinator: Coordinator,
    pub project: ProjectId,
    pub board: BoardId,
}

impl TestBoard {
    /// Seed a kanban board with the given lanes and load it.
    pub async fn with_lanes(names: &[&str]) -> Self {
        Self::with_config(names, Config::default()).await
    }

    pub async fn with_config(names: &[&str], config: Config) -> Self {
        Self::with_backend(names, MemoryBackend::new(), config).await
    }

    /// Same, against a prepared store (e.g. one with latency).
    pub async fn with_backend(names: &[&str], backend: MemoryBackend, config: Config) -> Self {
        let backend = Arc::new(backend);
        let project = ProjectId::new(PROJECT);
        let mut attrs = NewBoard::new("Main", BoardKind::Kanban);
        for name in names {
            attrs = attrs.with_lane(NewLane::named(*name));
        }
        let board = backend
            .create_board(CreateBoard {
                client_key: ClientKey::new(),
                project_id: project.clone(),
                attrs,
            })
            .await
            .expect("Failed to seed board")
            .entity
            .id;

        let mut coordinator =
            Coordinator::new(backend.clone(), config).expect("Failed to build coordinator");
        coordinator.load_project(&project);
        coordinator.settle().await;

        Self {
            backend,
            coordinator,
            project,
            board,
        }
    }

    /// The board as the coordinator currently shows it.
    pub fn view(&self) -> Board {
        self.coordinator
            .board(&self.board)
            .expect("Board should be loaded")
    }

    /// The board as the store has it.
    pub async fn server_view(&self) -> Board {
        self.backend
            .state()
            .await
            .find_board(&self.board)
            .cloned()
            .expect("Board should exist in the store")
    }

    pub fn lane_id(&self, name: &str) -> LaneId {
        self.view()
            .lane_named(name)
            .map(|lane| lane.id.clone())
            .unwrap_or_else(|| panic!("No lane named {}", name))
    }
}

/// `name:position` for each lane, in order.
pub fn positions(board: &Board) -> Vec<String> {
    board
        .lanes
        .iter()
        .map(|lane| format!("{}:{}", lane.name, lane.position))
        .collect()
}

/// Positions are exactly 0..n-1 in order.
pub fn is_dense(board: &Board) -> bool {
    board
        .lanes
        .iter()
        .enumerate()
        .all(|(i, lane)| lane.position as usize == i)
}
