//! Lane edits through the coordinator.
//!
//! Each test checks the speculative state right after the call and the
//! reconciled state after the store has answered.

use boardsync::core::{LanePatch, LaneStatus, NewLane};
use tokio_test::assert_ok;

use crate::fixtures::{is_dense, positions, TestBoard};

/// Test: Delete renumbers
/// Given lanes [A:0, B:1, C:2]
/// When B is deleted
/// Then both views show [A:0, C:1] before and after confirmation
#[tokio::test]
async fn test_delete_middle_lane_renumbers() {
    let mut t = TestBoard::with_lanes(&["A", "B", "C"]).await;
    let b = t.lane_id("B");

    assert_ok!(t.coordinator.delete_lane(&b));

    assert_eq!(positions(&t.view()), vec!["A:0", "C:1"]);
    let listed = t.coordinator.boards(&t.project);
    assert_eq!(listed, vec![t.view()], "Both views must agree");
    assert_eq!(t.coordinator.lane_status(&b), LaneStatus::Deleting);

    t.coordinator.settle().await;

    assert_eq!(positions(&t.view()), vec!["A:0", "C:1"]);
    assert_eq!(positions(&t.server_view().await), vec!["A:0", "C:1"]);
    assert_eq!(t.coordinator.lane_status(&b), LaneStatus::Removed);
    assert!(t.coordinator.take_notifications().is_empty());
}

/// Test: Create reconciles without duplicates
/// Given a board with 2 confirmed lanes
/// When lane D is created
/// Then 3 lanes show immediately with D at position 2 under a temp id,
/// and after success exactly 3 lanes remain with D under its real id
#[tokio::test]
async fn test_create_lane_reconciles_to_real_id() {
    let mut t = TestBoard::with_lanes(&["A", "B"]).await;

    let temp = t
        .coordinator
        .create_lane(&t.board, NewLane::named("D"))
        .unwrap();

    assert!(temp.is_temp());
    let view = t.view();
    assert_eq!(positions(&view), vec!["A:0", "B:1", "D:2"]);
    assert_eq!(view.lanes[2].id, temp);
    assert_eq!(t.coordinator.lane_status(&temp), LaneStatus::Pending);

    t.coordinator.settle().await;

    let view = t.view();
    assert_eq!(view.lanes.len(), 3);
    assert_eq!(positions(&view), vec!["A:0", "B:1", "D:2"]);
    assert!(!view.lanes[2].id.is_temp());
    assert_eq!(view.lanes[2].id, t.coordinator.resolve_lane(&temp));
    assert_eq!(t.coordinator.lane_status(&temp), LaneStatus::Confirmed);
    assert_eq!(view, t.server_view().await);
}

/// Test: Create round trip
/// Given a submitted lane with states and a WIP limit
/// When it is confirmed
/// Then reading it back gives the submitted fields under a new id
#[tokio::test]
async fn test_create_then_read_back() {
    let mut t = TestBoard::with_lanes(&["Todo"]).await;
    let attrs = NewLane::named("  Review ")
        .with_states(["review", "qa"])
        .with_wip_limit(3);

    let temp = t.coordinator.create_lane(&t.board, attrs).unwrap();
    t.coordinator.settle().await;

    let lane = t.coordinator.lane(&temp).expect("Lane should resolve");
    assert_ne!(lane.id, temp);
    assert_eq!(lane.name, "Review");
    assert_eq!(lane.wip_limit, Some(3));
    let states: Vec<&str> = lane.state_ids.iter().map(|s| s.as_str()).collect();
    assert_eq!(states, vec!["qa", "review"]);
    assert_eq!(lane.position, 1);
}

/// Test: Insert at a position
/// Given lanes [A, B, C]
/// When X is created at position 1
/// Then X is at 1 before and after confirmation
#[tokio::test]
async fn test_create_at_position_keeps_slot() {
    let mut t = TestBoard::with_lanes(&["A", "B", "C"]).await;

    t.coordinator
        .create_lane(&t.board, NewLane::named("X").at(1))
        .unwrap();
    assert_eq!(positions(&t.view()), vec!["A:0", "X:1", "B:2", "C:3"]);

    t.coordinator.settle().await;
    assert_eq!(positions(&t.view()), vec!["A:0", "X:1", "B:2", "C:3"]);
    assert_eq!(t.view(), t.server_view().await);
}

#[tokio::test]
async fn test_reorder_lanes() {
    let mut t = TestBoard::with_lanes(&["A", "B", "C"]).await;
    let order = vec![t.lane_id("C"), t.lane_id("A"), t.lane_id("B")];

    assert_ok!(t.coordinator.reorder_lanes(&t.board, order));
    assert_eq!(positions(&t.view()), vec!["C:0", "A:1", "B:2"]);

    t.coordinator.settle().await;
    assert_eq!(positions(&t.view()), vec!["C:0", "A:1", "B:2"]);
    assert_eq!(positions(&t.server_view().await), vec!["C:0", "A:1", "B:2"]);
}

/// Test: State mapping is exclusive
/// Given lane A mapped to "open"
/// When B is mapped to "open"
/// Then A loses the mapping, locally and in the store
#[tokio::test]
async fn test_state_moves_between_lanes() {
    let mut t = TestBoard::with_lanes(&["A", "B"]).await;
    let a = t.lane_id("A");
    let b = t.lane_id("B");
    t.coordinator
        .update_lane(&a, LanePatch::states(["open"]))
        .unwrap();
    t.coordinator.settle().await;

    t.coordinator
        .update_lane(&b, LanePatch::states(["open", "doing"]))
        .unwrap();
    assert!(t.view().lanes[0].state_ids.is_empty());

    t.coordinator.settle().await;
    let view = t.view();
    assert!(view.lanes[0].state_ids.is_empty());
    assert_eq!(view.lanes[1].state_ids.len(), 2);
    assert_eq!(view, t.server_view().await);
}

/// Test: Edit while creating
/// Given a lane whose create is still in flight
/// When it is renamed
/// Then nothing is sent until the create confirms, then the rename follows
#[tokio::test]
async fn test_rename_pending_lane_is_sent_after_create() {
    let mut t = TestBoard::with_lanes(&["A"]).await;
    let before = t.backend.request_count();

    let temp = t
        .coordinator
        .create_lane(&t.board, NewLane::named("Draft"))
        .unwrap();
    assert_ok!(t
        .coordinator
        .update_lane(&temp, LanePatch::rename("Final")));
    assert_eq!(positions(&t.view()), vec!["A:0", "Final:1"]);
    assert_eq!(t.coordinator.in_flight(), 1);

    t.coordinator.settle().await;

    // create, follow-up rename, refetch after the rename
    assert_eq!(t.backend.request_count(), before + 3);
    assert_eq!(positions(&t.view()), vec!["A:0", "Final:1"]);
    assert_eq!(positions(&t.server_view().await), vec!["A:0", "Final:1"]);
}

#[tokio::test]
async fn test_settled_positions_are_dense() {
    let mut t = TestBoard::with_lanes(&["A", "B", "C", "D"]).await;
    let b = t.lane_id("B");
    let d = t.lane_id("D");

    t.coordinator.delete_lane(&b).unwrap();
    t.coordinator
        .create_lane(&t.board, NewLane::named("E").at(0))
        .unwrap();
    t.coordinator.delete_lane(&d).unwrap();
    t.coordinator.settle().await;

    let view = t.view();
    assert!(is_dense(&view));
    assert_eq!(positions(&view), vec!["E:0", "A:1", "C:2"]);
    assert_eq!(view, t.server_view().await);
}
