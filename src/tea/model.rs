//! Model for the TEA (The Elm Architecture) pattern.
//!
//! The Model is pure coordinator state - no channels, no handles, no runtime infrastructure.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::backend::Request;
use crate::config::Config;
use crate::core::{BoardId, BoardPatch, ClientKey, LaneId, LanePatch, LaneStatus, ProjectId};
use crate::store::{Patch, Store};
use crate::view::{next_version, ViewState};

/// Oldest notifications are dropped past this many undrained entries.
pub const MAX_NOTIFICATIONS: usize = 100;

/// Level of a notification message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// A mutation failed or was refused
    Error,
    /// A mutation was held back until a pending record is saved
    Info,
}

/// A notification message to display to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// The severity level of the notification
    pub level: NotificationLevel,
    /// The notification message text
    pub message: String,
}

/// Identifies one dispatched mutation until its completion arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpId(pub u64);

impl std::fmt::Display for OpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A dispatched mutation and the patch that undoes its speculative apply.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub project_id: ProjectId,
    pub request: Request,
    pub undo: Patch,
}

impl InFlight {
    /// Whether this is the create request issued with `key`.
    pub fn creates(&self, key: ClientKey) -> bool {
        match &self.request {
            Request::CreateLane(create) => create.client_key == key,
            Request::CreateBoard(create) => create.client_key == key,
            _ => false,
        }
    }
}

/// Temporary ids that have been confirmed, mapped to their canonical ids.
///
/// Callers keep the temp id returned by a create; resolving through here
/// lets them keep using it after the create settles.
#[derive(Debug, Clone, Default)]
pub struct Aliases {
    lanes: HashMap<LaneId, LaneId>,
    boards: HashMap<BoardId, BoardId>,
}

impl Aliases {
    pub fn lane(&self, id: &LaneId) -> LaneId {
        self.lanes.get(id).cloned().unwrap_or_else(|| id.clone())
    }

    pub fn board(&self, id: &BoardId) -> BoardId {
        self.boards.get(id).cloned().unwrap_or_else(|| id.clone())
    }

    pub fn confirm_lane(&mut self, temp: LaneId, id: LaneId) {
        self.lanes.insert(temp, id);
    }

    pub fn confirm_board(&mut self, temp: BoardId, id: BoardId) {
        self.boards.insert(temp, id);
    }

    /// Drop entries pointing at a lane the store confirmed deleted.
    pub fn forget_lane(&mut self, id: &LaneId) {
        self.lanes.retain(|_, real| real != id);
    }

    pub fn forget_board(&mut self, id: &BoardId) {
        self.boards.retain(|_, real| real != id);
    }

    /// Keep only entries whose canonical record is still cached.
    pub fn retain_live(&mut self, store: &Store) {
        self.lanes.retain(|_, real| store.lane_record(real).is_some());
        self.boards.retain(|_, real| store.board_record(real).is_some());
    }
}

/// Coordinator state - the single source of truth.
pub struct Model {
    // Cached server state with speculative changes applied
    pub store: Store,

    // Mutation bookkeeping
    pub in_flight: BTreeMap<OpId, InFlight>,
    /// Edits made to lanes whose create has not been confirmed yet
    pub pending_lane_edits: HashMap<LaneId, LanePatch>,
    pub pending_board_edits: HashMap<BoardId, BoardPatch>,
    pub aliases: Aliases,

    // Toasts, oldest first
    pub notifications: VecDeque<Notification>,
    pub notification: Option<Notification>,

    // Dirty flag - set when state changes and a snapshot should be published
    pub dirty: bool,

    // Config (immutable after init)
    pub config: Config,
    next_op: u64,
}

impl Model {
    pub fn new(config: Config) -> Self {
        Self {
            store: Store::new(),
            in_flight: BTreeMap::new(),
            pending_lane_edits: HashMap::new(),
            pending_board_edits: HashMap::new(),
            aliases: Aliases::default(),
            notifications: VecDeque::new(),
            notification: None,
            dirty: true,
            config,
            next_op: 0,
        }
    }

    pub fn next_op(&mut self) -> OpId {
        self.next_op += 1;
        OpId(self.next_op)
    }

    /// Whether any dispatched mutation of the project is still unanswered.
    pub fn has_in_flight(&self, project_id: &ProjectId) -> bool {
        self.in_flight
            .values()
            .any(|flight| &flight.project_id == project_id)
    }

    /// The in-flight create issued with `key`, if any.
    pub fn pending_create(&mut self, key: ClientKey) -> Option<&mut InFlight> {
        self.in_flight.values_mut().find(|flight| flight.creates(key))
    }

    pub fn push_notification(&mut self, notification: Notification) {
        if self.notifications.len() == MAX_NOTIFICATIONS {
            self.notifications.pop_front();
        }
        self.notifications.push_back(notification.clone());
        self.notification = Some(notification);
        self.dirty = true;
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notification = None;
        self.dirty = true;
        self.notifications.drain(..).collect()
    }

    pub fn lane_status(&self, id: &LaneId) -> LaneStatus {
        let id = self.aliases.lane(id);
        let deleting = self
            .in_flight
            .values()
            .any(|flight| {
                matches!(&flight.request, Request::DeleteLane { id: target } if *target == id)
            });
        if deleting {
            return LaneStatus::Deleting;
        }
        match self.store.lane_record(&id) {
            Some(_) if id.is_temp() => LaneStatus::Pending,
            Some(_) => LaneStatus::Confirmed,
            None => LaneStatus::Removed,
        }
    }

    /// Create an immutable snapshot for subscribers.
    ///
    /// Each snapshot gets a monotonically increasing version number so a
    /// subscriber can tell whether it has already seen a state.
    pub fn snapshot(&self) -> ViewState {
        let mut projects: Vec<&ProjectId> = self.store.projects().collect();
        projects.sort();
        ViewState {
            version: next_version(),
            boards: projects
                .into_iter()
                .flat_map(|project| self.store.get_for_project(project))
                .collect(),
            in_flight: self.in_flight.len(),
            notification: self.notification.clone(),
        }
    }
}
