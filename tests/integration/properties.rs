//! Random operation sequences against a flaky store.
//!
//! Whatever mix of creates, deletes, renames and reorders is applied, and
//! whichever of them fail, a settled board shows dense positions and agrees
//! with the store. Batches are submitted before anything is answered, so
//! completions and failures interleave with later speculative edits.

use std::collections::BTreeSet;
use std::time::Duration;

use boardsync::backend::MemoryBackend;
use boardsync::config::Config;
use boardsync::core::{Board, LanePatch, NewLane};
use proptest::prelude::*;

use crate::fixtures::{is_dense, TestBoard};

#[derive(Debug, Clone)]
enum Op {
    Create { name: usize, at: Option<u32> },
    Delete(usize),
    Rename { lane: usize, name: usize },
    Reorder(usize),
}

const NAMES: [&str; 6] = ["A", "B", "C", "D", "E", "F"];

fn op() -> impl Strategy<Value = (Op, bool)> {
    let op = prop_oneof![
        (0..NAMES.len(), proptest::option::of(0u32..6))
            .prop_map(|(name, at)| Op::Create { name, at }),
        (0usize..8).prop_map(Op::Delete),
        (0usize..8, 0..NAMES.len()).prop_map(|(lane, name)| Op::Rename { lane, name }),
        (0usize..8).prop_map(Op::Reorder),
    ];
    (op, proptest::bool::weighted(0.25))
}

async fn apply(t: &mut TestBoard, op: Op) {
    let lanes = t.view().lanes;
    let pick = |i: usize| lanes.get(i % lanes.len().max(1)).map(|lane| lane.id.clone());

    match op {
        Op::Create { name, at } => {
            let mut attrs = NewLane::named(NAMES[name]);
            if let Some(at) = at {
                attrs = attrs.at(at);
            }
            let _ = t.coordinator.create_lane(&t.board, attrs);
        }
        Op::Delete(i) => {
            if let Some(id) = pick(i) {
                let _ = t.coordinator.delete_lane(&id);
            }
        }
        Op::Rename { lane, name } => {
            if let Some(id) = pick(lane) {
                let _ = t.coordinator.update_lane(&id, LanePatch::rename(NAMES[name]));
            }
        }
        Op::Reorder(shift) => {
            let mut order: Vec<_> = lanes.iter().map(|lane| lane.id.clone()).collect();
            if !order.is_empty() {
                let len = order.len();
                order.rotate_left(shift % len);
                let _ = t.coordinator.reorder_lanes(&t.board, order);
            }
        }
    }
}

/// `(lane id, name)` pairs, ignoring order.
fn lane_set(board: &Board) -> BTreeSet<(String, String)> {
    board
        .lanes
        .iter()
        .map(|lane| (lane.id.to_string(), lane.name.clone()))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_settled_positions_are_dense(ops in proptest::collection::vec(op(), 1..16)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let mut t = TestBoard::with_lanes(&["A", "B", "C"]).await;

            for (op, fail) in ops {
                if fail {
                    t.backend.fail_next(1);
                }
                apply(&mut t, op).await;
                t.coordinator.settle().await;
                t.backend.fail_next(0);

                let view = t.view();
                assert!(is_dense(&view), "Positions not dense: {:?}", view.lanes);
                assert_eq!(t.coordinator.in_flight(), 0);
            }

            t.coordinator.invalidate(&t.project);
            t.coordinator.settle().await;
            let view = t.view();
            assert!(is_dense(&view));
            assert_eq!(view, t.server_view().await);
        });
    }

    #[test]
    fn prop_concurrent_batches_converge(
        batches in proptest::collection::vec(
            (proptest::collection::vec(op(), 1..5), 0usize..3),
            1..8,
        )
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let backend = MemoryBackend::new().with_latency(Some(Duration::from_millis(1)));
            let mut t =
                TestBoard::with_backend(&["A", "B", "C"], backend, Config::default()).await;

            for (batch, failures) in batches {
                t.backend.fail_next(failures);
                for (op, _) in batch {
                    apply(&mut t, op).await;
                }
                t.coordinator.settle().await;
                t.backend.fail_next(0);

                let view = t.view();
                assert!(is_dense(&view), "Positions not dense: {:?}", view.lanes);
                assert_eq!(t.coordinator.in_flight(), 0);
                assert!(view.lanes.iter().all(|lane| !lane.id.is_temp()));

                // An injected failure can land on the refetch itself.
                let refetch_failed = t
                    .coordinator
                    .take_notifications()
                    .iter()
                    .any(|note| note.message.starts_with("Failed to load"));
                if !refetch_failed {
                    assert_eq!(lane_set(&view), lane_set(&t.server_view().await));
                }
            }

            t.coordinator.invalidate(&t.project);
            t.coordinator.settle().await;
            assert_eq!(t.view(), t.server_view().await);
        });
    }
}
