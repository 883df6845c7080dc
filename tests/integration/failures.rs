//! Rollback, notifications and the temp-id guard.
//!
//! A mutation the store refuses, or never receives, must leave the cache
//! exactly as it was before the call and produce exactly one notification.

use boardsync::core::{BoardPatch, LanePatch, LaneStatus, NewLane};
use boardsync::tea::NotificationLevel;
use boardsync::Error;
use tokio_test::assert_err;

use crate::fixtures::{positions, TestBoard};

/// Test: Offline rename reverts
/// Given the store is offline
/// When a lane is renamed
/// Then the new name shows until the failure arrives, then the old name is
/// back and exactly one error notification is queued
#[tokio::test]
async fn test_offline_rename_reverts_with_one_notification() {
    let mut t = TestBoard::with_lanes(&["A", "B"]).await;
    let a = t.lane_id("A");
    t.backend.set_offline(true);

    t.coordinator
        .update_lane(&a, LanePatch::rename("Renamed"))
        .unwrap();
    assert_eq!(positions(&t.view()), vec!["Renamed:0", "B:1"]);

    t.coordinator.settle().await;

    assert_eq!(positions(&t.view()), vec!["A:0", "B:1"]);
    let notes = t.coordinator.take_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, NotificationLevel::Error);
    assert!(notes[0].message.starts_with("Failed to update lane"));
    assert!(notes[0].message.contains("offline"));
}

#[tokio::test]
async fn test_failed_delete_restores_store_exactly() {
    let mut t = TestBoard::with_lanes(&["A", "B", "C"]).await;
    let before = t.coordinator.store().clone();
    t.backend.fail_next(1);

    t.coordinator.delete_lane(&t.lane_id("B")).unwrap();
    assert_eq!(positions(&t.view()), vec!["A:0", "C:1"]);
    t.coordinator.settle().await;

    assert_eq!(t.coordinator.store(), &before);
    assert_eq!(positions(&t.view()), vec!["A:0", "B:1", "C:2"]);
    assert_eq!(t.coordinator.take_notifications().len(), 1);
}

#[tokio::test]
async fn test_failed_create_restores_store_exactly() {
    let mut t = TestBoard::with_lanes(&["A", "B"]).await;
    let before = t.coordinator.store().clone();
    t.backend.fail_next(1);

    let temp = t
        .coordinator
        .create_lane(&t.board, NewLane::named("C").with_states(["open"]))
        .unwrap();
    t.coordinator.settle().await;

    assert_eq!(t.coordinator.store(), &before);
    assert_eq!(t.coordinator.lane_status(&temp), LaneStatus::Removed);
    assert_eq!(t.coordinator.take_notifications().len(), 1);
}

/// Test: Temp-id guard
/// Given a lane whose create has not been confirmed
/// When it is deleted or used in a reorder
/// Then the call fails locally and nothing beyond the create is sent
#[tokio::test]
async fn test_structural_ops_on_pending_lane_send_nothing() {
    let mut t = TestBoard::with_lanes(&["A"]).await;
    let before = t.backend.request_count();
    let temp = t
        .coordinator
        .create_lane(&t.board, NewLane::named("New"))
        .unwrap();
    let a = t.lane_id("A");

    let err = t.coordinator.delete_lane(&temp).unwrap_err();
    assert!(matches!(err, Error::NotYetCreated { kind: "Lane", .. }));
    assert_err!(t
        .coordinator
        .reorder_lanes(&t.board, vec![temp.clone(), a]));
    assert_eq!(t.coordinator.in_flight(), 1);
    assert_eq!(positions(&t.view()), vec!["A:0", "New:1"]);

    let notes = t.coordinator.take_notifications();
    assert_eq!(notes.len(), 2);
    assert!(notes
        .iter()
        .all(|note| note.message.contains("is still being created")));

    t.coordinator.settle().await;
    assert_eq!(t.backend.request_count(), before + 1);
    assert_eq!(positions(&t.view()), vec!["A:0", "New:1"]);

    // Once confirmed, the same id can be deleted.
    t.coordinator.delete_lane(&temp).unwrap();
    t.coordinator.settle().await;
    assert_eq!(positions(&t.view()), vec!["A:0"]);
}

#[tokio::test]
async fn test_duplicate_lane_name_is_rolled_back() {
    let mut t = TestBoard::with_lanes(&["Todo", "Done"]).await;

    let temp = t
        .coordinator
        .create_lane(&t.board, NewLane::named("todo"))
        .unwrap();
    assert_eq!(t.view().lanes.len(), 3);
    t.coordinator.settle().await;

    assert_eq!(positions(&t.view()), vec!["Todo:0", "Done:1"]);
    assert_eq!(t.coordinator.lane_status(&temp), LaneStatus::Removed);
    let notes = t.coordinator.take_notifications();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].message.starts_with("Failed to create lane"));
    assert!(notes[0].message.contains("already exists"));
}

#[tokio::test]
async fn test_default_board_cannot_be_deleted() {
    let mut t = TestBoard::with_lanes(&["A"]).await;

    t.coordinator.delete_board(&t.board).unwrap();
    assert!(t.coordinator.board(&t.board).is_none());
    t.coordinator.settle().await;

    assert_eq!(positions(&t.view()), vec!["A:0"]);
    assert!(t.view().is_default);
    let notes = t.coordinator.take_notifications();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].message.starts_with("Failed to delete board"));
}

#[tokio::test]
async fn test_validation_errors_never_touch_the_cache() {
    let mut t = TestBoard::with_lanes(&["A"]).await;
    let before = t.coordinator.store().clone();
    let a = t.lane_id("A");

    let long_name = "x".repeat(65);
    assert!(matches!(
        t.coordinator.update_lane(&a, LanePatch::rename(long_name)),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        t.coordinator.update_lane(&a, LanePatch::wip_limit(Some(0))),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        t.coordinator.update_board(&t.board, BoardPatch::rename("  ")),
        Err(Error::Validation(_))
    ));

    assert_eq!(t.coordinator.store(), &before);
    assert_eq!(t.coordinator.in_flight(), 0);
    assert_eq!(t.coordinator.take_notifications().len(), 3);
}

/// Test: Failures are independent
/// Given two renames in flight
/// When only the first fails
/// Then only the first reverts
#[tokio::test]
async fn test_one_failure_does_not_revert_other_mutations() {
    let mut t = TestBoard::with_lanes(&["A", "B"]).await;
    t.backend.fail_next(1);

    t.coordinator
        .update_lane(&t.lane_id("A"), LanePatch::rename("A2"))
        .unwrap();
    t.coordinator
        .update_lane(&t.lane_id("B"), LanePatch::rename("B2"))
        .unwrap();
    t.coordinator.settle().await;

    assert_eq!(positions(&t.view()), vec!["A:0", "B2:1"]);
    assert_eq!(t.coordinator.take_notifications().len(), 1);
}
