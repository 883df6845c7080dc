use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::backend::{self, Backend};
use crate::config::Config;
use crate::core::{
    Board, BoardId, BoardPatch, ClientKey, Lane, LaneId, LanePatch, LaneStatus, NewBoard, NewLane,
    ProjectId, SprintId,
};
use crate::mutation::Mutation;
use crate::store::Store;
use crate::tea::{self, Command, Message, Model, Notification};
use crate::view::ViewState;
use crate::{bslog_debug, bslog_error, bslog_trace, Error, Result};

const MAX_BG_MESSAGES: usize = 50;

/// Optimistic front end for board and lane edits.
///
/// Every mutation is applied to the local store right away and sent to the
/// backend on a spawned task. Completions queue up on a channel and are
/// folded back in by [`Coordinator::pump`] or [`Coordinator::settle`]; a
/// failure reverts the speculative change and leaves one notification.
///
/// Must be created inside a tokio runtime.
pub struct Coordinator {
    model: Model,
    backend: Arc<dyn Backend>,
    runtime: Handle,
    msg_tx: mpsc::UnboundedSender<Message>,
    msg_rx: mpsc::UnboundedReceiver<Message>,
    /// Spawned tasks whose message has not been processed yet
    outstanding: usize,
    state_tx: Sender<ViewState>,
    state_rx: Receiver<ViewState>,
}

impl Coordinator {
    pub fn new(backend: Arc<dyn Backend>, config: Config) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| Error::NoRuntime(e.to_string()))?;
        let (msg_tx, msg_rx) = mpsc::unbounded_channel::<Message>();
        let (state_tx, state_rx) = crossbeam_channel::bounded::<ViewState>(1);
        bslog_debug!(
            "Coordinator::new refresh_after_mutation={}",
            config.refresh_after_mutation
        );
        Ok(Self {
            model: Model::new(config),
            backend,
            runtime,
            msg_tx,
            msg_rx,
            outstanding: 0,
            state_tx,
            state_rx,
        })
    }

    // Lanes

    /// Returns the temporary id the lane is shown under until confirmed.
    pub fn create_lane(&mut self, board_id: &BoardId, attrs: NewLane) -> Result<LaneId> {
        let key = ClientKey::new();
        self.submit(Mutation::CreateLane {
            key,
            board_id: board_id.clone(),
            attrs,
        })?;
        Ok(LaneId::temp(key))
    }

    pub fn update_lane(&mut self, lane_id: &LaneId, patch: LanePatch) -> Result<()> {
        self.submit(Mutation::UpdateLane {
            lane_id: lane_id.clone(),
            patch,
        })
    }

    pub fn delete_lane(&mut self, lane_id: &LaneId) -> Result<()> {
        self.submit(Mutation::DeleteLane {
            lane_id: lane_id.clone(),
        })
    }

    pub fn reorder_lanes(&mut self, board_id: &BoardId, order: Vec<LaneId>) -> Result<()> {
        self.submit(Mutation::ReorderLanes {
            board_id: board_id.clone(),
            order,
        })
    }

    // Boards

    /// Returns the temporary id the board is shown under until confirmed.
    pub fn create_board(&mut self, project_id: &ProjectId, attrs: NewBoard) -> Result<BoardId> {
        let key = ClientKey::new();
        self.submit(Mutation::CreateBoard {
            key,
            project_id: project_id.clone(),
            attrs,
        })?;
        Ok(BoardId::temp(key))
    }

    pub fn update_board(&mut self, board_id: &BoardId, patch: BoardPatch) -> Result<()> {
        self.submit(Mutation::UpdateBoard {
            board_id: board_id.clone(),
            patch,
        })
    }

    pub fn delete_board(&mut self, board_id: &BoardId) -> Result<()> {
        self.submit(Mutation::DeleteBoard {
            board_id: board_id.clone(),
        })
    }

    pub fn move_board_to_sprint(
        &mut self,
        board_id: &BoardId,
        sprint_id: Option<SprintId>,
    ) -> Result<()> {
        self.submit(Mutation::MoveBoardToSprint {
            board_id: board_id.clone(),
            sprint_id,
        })
    }

    // Fetching

    /// Start fetching the project's boards.
    pub fn load_project(&mut self, project_id: &ProjectId) {
        self.execute_command(Command::Fetch {
            project_id: project_id.clone(),
        });
    }

    /// Mark the project stale and refetch it.
    pub fn invalidate(&mut self, project_id: &ProjectId) {
        self.handle(Message::Invalidate(project_id.clone()));
        self.publish();
    }

    // Cache writes

    /// Overwrite a cached board with whatever `f` returns (`None` drops it).
    ///
    /// Nothing is sent to the backend; the next fetch of the project replaces
    /// the result.
    pub fn set_board<F>(&mut self, board_id: &BoardId, f: F)
    where
        F: FnOnce(Option<Board>) -> Option<Board>,
    {
        let id = self.model.aliases.board(board_id);
        let undo = self.model.store.set_board(&id, f);
        bslog_debug!("set_board {} changes={}", id, undo.len());
        self.model.dirty = true;
        self.publish();
    }

    /// Overwrite a project's cached board list with whatever `f` returns.
    pub fn set_project_boards<F>(&mut self, project_id: &ProjectId, f: F)
    where
        F: FnOnce(Vec<Board>) -> Vec<Board>,
    {
        let undo = self.model.store.set_project_boards(project_id, f);
        bslog_debug!("set_project_boards {} changes={}", project_id, undo.len());
        self.model.dirty = true;
        self.publish();
    }

    // Processing completions

    /// Process queued completions without waiting. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        for _ in 0..MAX_BG_MESSAGES {
            let Ok(msg) = self.msg_rx.try_recv() else {
                break;
            };
            self.outstanding = self.outstanding.saturating_sub(1);
            self.handle(msg);
            processed += 1;
        }
        self.publish();
        processed
    }

    /// Wait until every dispatched request (and any follow-up it caused) has
    /// been answered and processed.
    pub async fn settle(&mut self) {
        while self.outstanding > 0 {
            let Some(msg) = self.msg_rx.recv().await else {
                break;
            };
            self.outstanding = self.outstanding.saturating_sub(1);
            self.handle(msg);
            self.publish();
        }
    }

    // Reads

    pub fn board(&self, board_id: &BoardId) -> Option<Board> {
        let id = self.model.aliases.board(board_id);
        self.model.store.get_by_id(&id)
    }

    pub fn boards(&self, project_id: &ProjectId) -> Vec<Board> {
        self.model.store.get_for_project(project_id)
    }

    pub fn lane(&self, lane_id: &LaneId) -> Option<Lane> {
        let id = self.model.aliases.lane(lane_id);
        self.model.store.lane(&id)
    }

    pub fn lane_status(&self, lane_id: &LaneId) -> LaneStatus {
        self.model.lane_status(lane_id)
    }

    /// Canonical id of a lane, once its create has been confirmed.
    pub fn resolve_lane(&self, lane_id: &LaneId) -> LaneId {
        self.model.aliases.lane(lane_id)
    }

    pub fn resolve_board(&self, board_id: &BoardId) -> BoardId {
        self.model.aliases.board(board_id)
    }

    pub fn in_flight(&self) -> usize {
        self.model.in_flight.len()
    }

    pub fn store(&self) -> &Store {
        &self.model.store
    }

    pub fn config(&self) -> &Config {
        &self.model.config
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        let notes = self.model.take_notifications();
        self.publish();
        notes
    }

    /// Receiver of view snapshots. Only the latest unread snapshot is kept.
    pub fn subscribe(&self) -> Receiver<ViewState> {
        self.state_rx.clone()
    }

    fn submit(&mut self, mutation: Mutation) -> Result<()> {
        let result = tea::submit(&mut self.model, mutation).map(|cmds| {
            for cmd in cmds {
                self.execute_command(cmd);
            }
        });
        self.publish();
        result
    }

    fn handle(&mut self, msg: Message) {
        for cmd in tea::update(&mut self.model, msg) {
            self.execute_command(cmd);
        }
    }

    fn execute_command(&mut self, cmd: Command) {
        let tx = self.msg_tx.clone();
        let backend = self.backend.clone();
        self.outstanding += 1;

        match cmd {
            Command::Dispatch { op, request } => {
                bslog_debug!("Command::Dispatch op={} {}", op, request.label());
                self.runtime.spawn(async move {
                    let result = AssertUnwindSafe(backend::execute(backend.as_ref(), request))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| Err(panicked(panic)));
                    let msg = match result {
                        Ok(response) => Message::Completed { op, response },
                        Err(e) => Message::Failed {
                            op,
                            error: e.to_string(),
                        },
                    };
                    let _ = tx.send(msg);
                });
            }

            Command::Fetch { project_id } => {
                bslog_debug!("Command::Fetch project={}", project_id);
                self.runtime.spawn(async move {
                    let fetch = async { backend.list_boards(&project_id).await };
                    let result = AssertUnwindSafe(fetch)
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| Err(panicked(panic)));
                    let msg = match result {
                        Ok(boards) => Message::Fetched { project_id, boards },
                        Err(e) => Message::FetchFailed {
                            project_id,
                            error: e.to_string(),
                        },
                    };
                    let _ = tx.send(msg);
                });
            }
        }
    }

    /// Send a snapshot if anything changed, replacing an unread one.
    fn publish(&mut self) {
        if !self.model.dirty {
            return;
        }
        let _ = self.state_rx.try_recv();
        let snapshot = self.model.snapshot();
        bslog_trace!("publish version={}", snapshot.version);
        let _ = self.state_tx.try_send(snapshot);
        self.model.dirty = false;
    }
}

/// A spawned request that panics still has to answer, or `settle` waits forever.
fn panicked(panic: Box<dyn Any + Send>) -> Error {
    let reason = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    bslog_error!("backend task panicked: {}", reason);
    Error::TaskPanicked(reason)
}
