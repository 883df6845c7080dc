//! Update functions for the TEA (The Elm Architecture) pattern.
//!
//! `submit` turns a user mutation into a speculative store change plus a
//! dispatch command. `update` folds completions back in: confirmed creates
//! swap their temporary records for canonical ones, failures apply the undo
//! patch captured at submit time.

use crate::backend::{Confirmed, Response};
use crate::core::{Board, BoardId, BoardRecord, ClientKey, Lane, LaneId, LaneRecord, ProjectId};
use crate::mutation::{clear_default, Dispatch, LocalEdit, Mutation};
use crate::store::{Change, Patch, Store};
use crate::{bslog, bslog_debug, bslog_warn, Error, Result};

use super::command::Command;
use super::message::Message;
use super::model::{InFlight, Model, Notification, NotificationLevel};

/// Helper to push an error notification and mark model as dirty.
fn set_error(model: &mut Model, message: String) {
    bslog_warn!("Coordinator error: {}", message);
    model.push_notification(Notification {
        level: NotificationLevel::Error,
        message,
    });
}

/// Tell the user why a mutation was not even attempted.
fn refuse(model: &mut Model, label: &str, err: &Error) {
    match err {
        Error::NotYetCreated { .. } => {
            bslog_debug!("Refused {}: {}", label, err);
            model.push_notification(Notification {
                level: NotificationLevel::Info,
                message: format!("{}; try again once it is saved", err),
            });
        }
        _ => set_error(model, format!("Failed to {}: {}", label, err)),
    }
}

/// Rewrite temp ids that have since been confirmed to their canonical ids.
fn resolve(model: &Model, mutation: Mutation) -> Mutation {
    let aliases = &model.aliases;
    match mutation {
        Mutation::CreateLane {
            key,
            board_id,
            attrs,
        } => Mutation::CreateLane {
            key,
            board_id: aliases.board(&board_id),
            attrs,
        },
        Mutation::UpdateLane { lane_id, patch } => Mutation::UpdateLane {
            lane_id: aliases.lane(&lane_id),
            patch,
        },
        Mutation::DeleteLane { lane_id } => Mutation::DeleteLane {
            lane_id: aliases.lane(&lane_id),
        },
        Mutation::ReorderLanes { board_id, order } => Mutation::ReorderLanes {
            board_id: aliases.board(&board_id),
            order: order.iter().map(|id| aliases.lane(id)).collect(),
        },
        Mutation::UpdateBoard { board_id, patch } => Mutation::UpdateBoard {
            board_id: aliases.board(&board_id),
            patch,
        },
        Mutation::DeleteBoard { board_id } => Mutation::DeleteBoard {
            board_id: aliases.board(&board_id),
        },
        Mutation::MoveBoardToSprint {
            board_id,
            sprint_id,
        } => Mutation::MoveBoardToSprint {
            board_id: aliases.board(&board_id),
            sprint_id,
        },
        create @ Mutation::CreateBoard { .. } => create,
    }
}

/// Apply a mutation speculatively and return the command that sends it.
///
/// Local refusals (validation, unknown ids, records still being created)
/// leave the store untouched, push one notification and return the error.
/// Edits to a record that only exists locally produce no command; they are
/// sent as a follow-up once the record's create is confirmed.
pub fn submit(model: &mut Model, mutation: Mutation) -> Result<Vec<Command>> {
    let mutation = resolve(model, mutation);
    let label = mutation.label();
    let plan = match mutation.plan(&model.store) {
        Ok(plan) => plan,
        Err(err) => {
            refuse(model, label, &err);
            return Err(err);
        }
    };

    let changes = plan.patch.len();
    let undo = plan.patch.apply(&mut model.store);
    model.dirty = true;

    match plan.dispatch {
        Dispatch::Hold(edit) => {
            bslog_debug!("submit {} held until create confirms", label);
            hold(model, edit, undo);
            Ok(Vec::new())
        }
        Dispatch::Send(request) => {
            let op = model.next_op();
            bslog_debug!(
                "submit op={} {} project={} changes={}",
                op,
                label,
                plan.project_id,
                changes
            );
            model.in_flight.insert(
                op,
                InFlight {
                    project_id: plan.project_id,
                    request: request.clone(),
                    undo,
                },
            );
            Ok(vec![Command::Dispatch { op, request }])
        }
    }
}

/// Key of the create that has to confirm before `lane_id` can be sent.
fn creating_key(store: &Store, lane_id: &LaneId) -> Option<ClientKey> {
    let board_id = &store.lane_record(lane_id)?.board_id;
    if board_id.is_temp() {
        board_id.client_key()
    } else {
        lane_id.client_key()
    }
}

fn hold(model: &mut Model, edit: LocalEdit, undo: Patch) {
    let key = match &edit {
        LocalEdit::Lane(id, _) => creating_key(&model.store, id),
        LocalEdit::Board(id, _) => id.client_key(),
    };
    match edit {
        LocalEdit::Lane(id, patch) => match model.pending_lane_edits.get_mut(&id) {
            Some(existing) => existing.merge(patch),
            None => {
                model.pending_lane_edits.insert(id, patch);
            }
        },
        LocalEdit::Board(id, patch) => match model.pending_board_edits.get_mut(&id) {
            Some(existing) => existing.merge(patch),
            None => {
                model.pending_board_edits.insert(id, patch);
            }
        },
    }

    // A failed create has to undo the held edit too, newest first.
    let Some(key) = key else {
        return;
    };
    if let Some(flight) = model.pending_create(key) {
        let mut combined = undo;
        combined.extend(std::mem::take(&mut flight.undo));
        flight.undo = combined;
    }
}

/// Submit an edit made while its target was still being created.
fn follow_up(model: &mut Model, mutation: Mutation, cmds: &mut Vec<Command>) {
    match submit(model, mutation) {
        Ok(more) => cmds.extend(more),
        Err(err) => bslog_warn!("Follow-up edit dropped: {}", err),
    }
}

fn drop_orphaned_edits(model: &mut Model) {
    let store = &model.store;
    model
        .pending_lane_edits
        .retain(|id, _| store.lane_record(id).is_some());
    model
        .pending_board_edits
        .retain(|id, _| store.board_record(id).is_some());
}

/// Refetch a stale project once nothing of it is in flight anymore.
fn refresh_if_settled(model: &Model, project_id: &ProjectId, cmds: &mut Vec<Command>) {
    if model.store.is_stale(project_id) && !model.has_in_flight(project_id) {
        cmds.push(Command::Fetch {
            project_id: project_id.clone(),
        });
    }
}

/// Pure update function: Model + Message → Commands
pub fn update(model: &mut Model, msg: Message) -> Vec<Command> {
    let mut cmds = Vec::new();

    match msg {
        Message::Fetched { project_id, boards } => {
            bslog_debug!(
                "Message::Fetched project={} boards={}",
                project_id,
                boards.len()
            );
            model.store.hydrate(&project_id, boards);
            drop_orphaned_edits(model);
            model.aliases.retain_live(&model.store);
            model.dirty = true;
        }

        Message::FetchFailed { project_id, error } => {
            set_error(
                model,
                format!("Failed to load boards of {}: {}", project_id, error),
            );
        }

        Message::Invalidate(project_id) => {
            bslog_debug!("Message::Invalidate project={}", project_id);
            model.store.invalidate(&project_id);
            cmds.push(Command::Fetch { project_id });
        }

        Message::Completed { op, response } => {
            let Some(flight) = model.in_flight.remove(&op) else {
                bslog_warn!("Message::Completed for unknown op={}", op);
                return cmds;
            };
            bslog!("op={} {} confirmed", op, flight.request.label());
            reconcile(model, response, &mut cmds);
            model.dirty = true;

            if !flight.request.is_create() && model.config.refresh_after_mutation {
                model.store.invalidate(&flight.project_id);
            }
            refresh_if_settled(model, &flight.project_id, &mut cmds);
        }

        Message::Failed { op, error } => {
            let Some(InFlight {
                project_id,
                request,
                undo,
            }) = model.in_flight.remove(&op)
            else {
                bslog_warn!("Message::Failed for unknown op={}", op);
                return cmds;
            };
            bslog_warn!("op={} {} failed: {}", op, request.label(), error);
            undo.apply(&mut model.store);
            drop_orphaned_edits(model);
            set_error(model, format!("Failed to {}: {}", request.label(), error));
            refresh_if_settled(model, &project_id, &mut cmds);
        }
    }

    cmds
}

/// Write a canonical response into the store.
fn reconcile(model: &mut Model, response: Response, cmds: &mut Vec<Command>) {
    match response {
        Response::LaneCreated(Confirmed { client_key, entity }) => {
            let temp = LaneId::temp(client_key);
            let id = entity.id.clone();
            bslog_debug!("lane key={} confirmed as {}", client_key.short(), id);
            swap_lane(&mut model.store, &temp, entity);
            model.aliases.confirm_lane(temp.clone(), id.clone());
            if let Some(patch) = model.pending_lane_edits.remove(&temp) {
                follow_up(model, Mutation::UpdateLane { lane_id: id, patch }, cmds);
            }
        }

        Response::BoardCreated(Confirmed { client_key, entity }) => {
            let temp = BoardId::temp(client_key);
            let id = entity.id.clone();
            bslog_debug!("board key={} confirmed as {}", client_key.short(), id);
            let lanes = swap_board(&mut model.store, &temp, entity);
            model.aliases.confirm_board(temp.clone(), id.clone());
            for (temp_lane, lane_id) in lanes {
                model
                    .aliases
                    .confirm_lane(temp_lane.clone(), lane_id.clone());
                if let Some(patch) = model.pending_lane_edits.remove(&temp_lane) {
                    follow_up(model, Mutation::UpdateLane { lane_id, patch }, cmds);
                }
            }
            if let Some(patch) = model.pending_board_edits.remove(&temp) {
                follow_up(model, Mutation::UpdateBoard { board_id: id, patch }, cmds);
            }
        }

        Response::LaneUpdated(lane) => {
            if model.store.lane_record(&lane.id).is_some() {
                let patch = Patch::from(vec![Change::PutLane(LaneRecord::from(lane))]);
                patch.apply(&mut model.store);
            }
        }

        Response::LanesReordered { board_id, mut lanes } => {
            let Some(record) = model.store.board_record(&board_id) else {
                return;
            };
            lanes.sort_by_key(|lane| lane.position);
            lanes.retain(|lane| model.store.lane_record(&lane.id).is_some());
            let mut order: Vec<LaneId> = lanes.iter().map(|lane| lane.id.clone()).collect();
            order.extend(record.lane_order.iter().filter(|id| id.is_temp()).cloned());

            let mut patch: Patch = lanes
                .into_iter()
                .map(|lane| Change::PutLane(LaneRecord::from(lane)))
                .collect();
            patch.push(Change::SetLaneOrder { board_id, order });
            patch.apply(&mut model.store);
        }

        Response::BoardUpdated(board) => {
            let Some(current) = model.store.board_record(&board.id) else {
                return;
            };
            let mut record = current.clone();
            record.name = board.name;
            record.kind = board.kind;
            record.is_default = board.is_default;
            record.sprint_id = board.sprint_id;

            let mut patch = Patch::new();
            if record.is_default {
                patch.extend(Patch::from(clear_default(
                    &model.store,
                    &record.project_id,
                    &record.id,
                )));
            }
            patch.push(Change::PutBoardFields(record));
            patch.apply(&mut model.store);
        }

        Response::LaneDeleted(id) => model.aliases.forget_lane(&id),
        Response::BoardDeleted(id) => model.aliases.forget_board(&id),
    }
}

/// Replace a temp lane with its canonical record, keeping its slot.
fn swap_lane(store: &mut Store, temp: &LaneId, lane: Lane) {
    let mut patch = Patch::from(vec![Change::RemoveLane(temp.clone())]);
    if let Some(board) = store.board_record(&lane.board_id) {
        let mut order = board.lane_order.clone();
        if order.contains(&lane.id) {
            order.retain(|id| id != temp);
        } else if let Some(slot) = order.iter().position(|id| id == temp) {
            order[slot] = lane.id.clone();
        } else {
            order.push(lane.id.clone());
        }
        patch.push(Change::SetLaneOrder {
            board_id: lane.board_id.clone(),
            order,
        });
        patch.push(Change::PutLane(LaneRecord::from(lane)));
    }
    patch.apply(store);
}

/// Replace a temp board and its temp lanes with the canonical aggregate.
///
/// Returns the temp lane ids paired with the canonical ids that replaced them.
fn swap_board(store: &mut Store, temp: &BoardId, mut board: Board) -> Vec<(LaneId, LaneId)> {
    board.lanes.sort_by_key(|lane| lane.position);
    let project_id = board.project_id.clone();

    let mut patch = Patch::new();
    let mut replaced = Vec::new();
    if let Some(record) = store.board_record(temp) {
        replaced = record
            .lane_order
            .iter()
            .cloned()
            .zip(board.lanes.iter().map(|lane| lane.id.clone()))
            .collect();
        for lane_id in &record.lane_order {
            patch.push(Change::RemoveLane(lane_id.clone()));
        }
        patch.push(Change::RemoveBoard(temp.clone()));
    }

    let mut list = store.board_ids(&project_id).to_vec();
    if list.contains(&board.id) {
        list.retain(|id| id != temp);
    } else if let Some(slot) = list.iter().position(|id| id == temp) {
        list[slot] = board.id.clone();
    } else {
        list.push(board.id.clone());
    }

    if board.is_default {
        for change in clear_default(store, &project_id, &board.id) {
            if !matches!(&change, Change::PutBoardFields(record) if &record.id == temp) {
                patch.push(change);
            }
        }
    }
    let (record, lanes) = BoardRecord::split(board);
    for lane in lanes {
        patch.push(Change::PutLane(LaneRecord::from(lane)));
    }
    patch.push(Change::PutBoard(record));
    patch.push(Change::SetBoardList {
        project_id,
        boards: list,
    });
    patch.apply(store);
    replaced
}
