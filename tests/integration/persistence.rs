//! Data file and config round trips, as the CLI uses them.

use std::sync::Arc;

use boardsync::backend::MemoryBackend;
use boardsync::config::Config;
use boardsync::core::{BoardKind, NewBoard, NewLane, ProjectId};
use boardsync::Coordinator;
use tempfile::TempDir;

/// Test: Edits survive a restart
/// Given boards created through one coordinator and saved
/// When a new backend loads the file
/// Then a fresh coordinator sees the same boards
#[tokio::test]
async fn test_saved_edits_load_into_new_coordinator() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("boards.json");
    let project = ProjectId::new("p1");

    let backend = Arc::new(MemoryBackend::load(&path).await.unwrap());
    let mut coordinator = Coordinator::new(backend.clone(), Config::default()).unwrap();
    coordinator.load_project(&project);
    coordinator.settle().await;
    assert!(coordinator.boards(&project).is_empty());

    let board = coordinator
        .create_board(
            &project,
            NewBoard::new("Main", BoardKind::Kanban).with_lane(NewLane::named("Todo")),
        )
        .unwrap();
    coordinator.settle().await;
    coordinator
        .create_lane(&board, NewLane::named("Done").with_wip_limit(5))
        .unwrap();
    coordinator.settle().await;
    backend.save(&path).await.unwrap();
    let saved = coordinator.boards(&project);

    let reloaded = Arc::new(MemoryBackend::load(&path).await.unwrap());
    let mut fresh = Coordinator::new(reloaded, Config::default()).unwrap();
    fresh.load_project(&project);
    fresh.settle().await;

    assert_eq!(fresh.boards(&project), saved);
    assert_eq!(saved[0].lane_names(), vec!["Todo", "Done"]);
}

#[tokio::test]
async fn test_config_controls_refresh() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("boardsync.toml");
    std::fs::write(&path, "refresh_after_mutation = false\nlatency_ms = 1\n").unwrap();
    let config = Config::load_from(&path).unwrap();
    assert!(!config.refresh_after_mutation);

    let backend = Arc::new(MemoryBackend::new().with_latency(config.latency()));
    let project = ProjectId::new("p1");
    let mut coordinator = Coordinator::new(backend.clone(), config).unwrap();
    let board = coordinator
        .create_board(
            &project,
            NewBoard::new("Main", BoardKind::Kanban).with_lane(NewLane::named("A")),
        )
        .unwrap();
    coordinator.settle().await;
    let before = backend.request_count();

    let lane = coordinator.board(&board).unwrap().lanes[0].id.clone();
    coordinator
        .update_lane(&lane, boardsync::core::LanePatch::rename("B"))
        .unwrap();
    coordinator.settle().await;

    assert_eq!(backend.request_count(), before + 1, "No refetch when disabled");
    assert_eq!(coordinator.lane(&lane).unwrap().name, "B");
}
