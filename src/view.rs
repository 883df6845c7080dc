use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::Board;
use crate::tea::Notification;

static VERSION_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn next_version() -> u64 {
    VERSION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1
}

/// What a subscriber renders: every loaded board with speculative changes
/// applied, plus how many mutations are still unanswered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub version: u64,
    pub boards: Vec<Board>,
    pub in_flight: usize,
    pub notification: Option<Notification>,
}

impl ViewState {
    pub fn board(&self, id: &crate::core::BoardId) -> Option<&Board> {
        self.boards.iter().find(|board| &board.id == id)
    }
}
