//! Board lifecycle through the coordinator.

use boardsync::backend::{Backend, CreateLane};
use boardsync::core::{BoardKind, BoardPatch, ClientKey, NewBoard, NewLane, SprintId, StateId};
use boardsync::Error;
use tokio_test::assert_ok;

use crate::fixtures::{positions, TestBoard};

#[tokio::test]
async fn test_create_board_with_lanes() {
    let mut t = TestBoard::with_lanes(&["A"]).await;

    let temp = t
        .coordinator
        .create_board(
            &t.project,
            NewBoard::new("Sprint board", BoardKind::Scrum)
                .in_sprint(SprintId::new("sprint-1"))
                .with_lane(NewLane::named("Todo"))
                .with_lane(NewLane::named("Done")),
        )
        .unwrap();

    let speculative = t.coordinator.board(&temp).unwrap();
    assert!(speculative.lanes.iter().all(|lane| lane.id.is_temp()));
    assert_eq!(t.coordinator.boards(&t.project).len(), 2);

    t.coordinator.settle().await;

    let board = t.coordinator.board(&temp).expect("Temp id should resolve");
    assert!(!board.id.is_temp());
    assert!(board.lanes.iter().all(|lane| !lane.id.is_temp()));
    assert_eq!(positions(&board), vec!["Todo:0", "Done:1"]);
    assert_eq!(board.sprint_id, Some(SprintId::new("sprint-1")));
    assert_eq!(t.coordinator.boards(&t.project).len(), 2);
}

/// Test: One default board per project
/// Given a default board
/// When another board is made the default
/// Then the first one stops being the default, locally and in the store
#[tokio::test]
async fn test_default_board_is_exclusive() {
    let mut t = TestBoard::with_lanes(&["A"]).await;
    assert!(t.view().is_default);

    let second = t
        .coordinator
        .create_board(&t.project, NewBoard::new("Second", BoardKind::Kanban))
        .unwrap();
    t.coordinator.settle().await;
    assert!(t.view().is_default);
    assert!(!t.coordinator.board(&second).unwrap().is_default);

    assert_ok!(t
        .coordinator
        .update_board(&second, BoardPatch::make_default()));
    assert!(!t.view().is_default, "Sibling default cleared speculatively");

    t.coordinator.settle().await;
    let defaults = t
        .coordinator
        .boards(&t.project)
        .into_iter()
        .filter(|board| board.is_default)
        .count();
    assert_eq!(defaults, 1);
    assert!(t.coordinator.board(&second).unwrap().is_default);
    assert!(!t.server_view().await.is_default);
}

#[tokio::test]
async fn test_move_scrum_board_between_sprints() {
    let mut t = TestBoard::with_lanes(&[]).await;
    let board = t
        .coordinator
        .create_board(&t.project, NewBoard::new("Scrum", BoardKind::Scrum))
        .unwrap();
    t.coordinator.settle().await;

    assert_ok!(t
        .coordinator
        .move_board_to_sprint(&board, Some(SprintId::new("sprint-2"))));
    assert_eq!(
        t.coordinator.board(&board).unwrap().sprint_id,
        Some(SprintId::new("sprint-2"))
    );
    t.coordinator.settle().await;

    assert_ok!(t.coordinator.move_board_to_sprint(&board, None));
    t.coordinator.settle().await;
    assert_eq!(t.coordinator.board(&board).unwrap().sprint_id, None);
    assert!(t.coordinator.take_notifications().is_empty());
}

#[tokio::test]
async fn test_kanban_board_cannot_join_sprint() {
    let mut t = TestBoard::with_lanes(&["A"]).await;
    let before = t.backend.request_count();

    let err = t
        .coordinator
        .move_board_to_sprint(&t.board, Some(SprintId::new("sprint-1")))
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(t.backend.request_count(), before);
    assert_eq!(t.view().sprint_id, None);
}

#[tokio::test]
async fn test_delete_board_removes_its_lanes() {
    let mut t = TestBoard::with_lanes(&["A"]).await;
    let other = t
        .coordinator
        .create_board(
            &t.project,
            NewBoard::new("Other", BoardKind::Kanban).with_lane(NewLane::named("X")),
        )
        .unwrap();
    t.coordinator.settle().await;
    let lane = t.coordinator.board(&other).unwrap().lanes[0].id.clone();

    assert_ok!(t.coordinator.delete_board(&other));
    assert!(t.coordinator.board(&other).is_none());
    assert!(t.coordinator.lane(&lane).is_none());

    t.coordinator.settle().await;
    assert_eq!(t.coordinator.boards(&t.project).len(), 1);
    assert_eq!(t.backend.state().await.boards.len(), 1);
}

/// Test: Invalidate picks up changes made elsewhere
/// Given a loaded board
/// When another client adds a lane and the project is invalidated
/// Then the refetch shows the new lane
#[tokio::test]
async fn test_invalidate_refetches_external_changes() {
    let mut t = TestBoard::with_lanes(&["A"]).await;
    t.backend
        .create_lane(CreateLane {
            client_key: ClientKey::new(),
            board_id: t.board.clone(),
            attrs: NewLane::named("External"),
        })
        .await
        .unwrap();
    assert_eq!(positions(&t.view()), vec!["A:0"]);

    t.coordinator.invalidate(&t.project);
    assert!(t.coordinator.store().is_stale(&t.project));
    t.coordinator.settle().await;

    assert!(!t.coordinator.store().is_stale(&t.project));
    assert_eq!(positions(&t.view()), vec!["A:0", "External:1"]);
}

/// Test: Starting lanes respect state exclusivity
/// Given a new board whose two starting lanes both list "open"
/// When it is created
/// Then only the later lane holds "open", before and after confirmation
#[tokio::test]
async fn test_new_board_lanes_do_not_share_states() {
    let mut t = TestBoard::with_lanes(&[]).await;
    let open = StateId::from("open");
    let holders = |board: &boardsync::core::Board| -> Vec<String> {
        board
            .lanes
            .iter()
            .filter(|lane| lane.state_ids.contains(&open))
            .map(|lane| lane.name.clone())
            .collect()
    };

    let temp = t
        .coordinator
        .create_board(
            &t.project,
            NewBoard::new("Flow", BoardKind::Kanban)
                .with_lane(NewLane::named("Todo").with_states(["open", "triage"]))
                .with_lane(NewLane::named("Doing").with_states(["open"])),
        )
        .unwrap();
    assert_eq!(holders(&t.coordinator.board(&temp).unwrap()), vec!["Doing"]);

    t.coordinator.settle().await;
    let board = t.coordinator.board(&temp).unwrap();
    assert_eq!(holders(&board), vec!["Doing"]);
    let stored = t.backend.state().await;
    assert_eq!(stored.find_board(&board.id), Some(&board));
}
