//! The list driver: single owner of a collection and its scheduling state.
//!
//! Public handles talk to the driver over a command channel; item listeners
//! forward their notifications over a second channel. Commands take priority.
//! Every aggregation pass and admission decision runs here, one at a time.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};

use super::aggregate::{Reported, Tally, derive_title, reported_status};
use super::dispatch::spawn_download;
use super::EventHandlers;
use crate::collection::{Collection, ItemSubscriptions};
use crate::config::Config;
use crate::item::{MetadataNotification, StatusNotification};
use crate::types::{DownloadState, Event, ItemId, ListId, ListSnapshot};

/// Requests from [`DownloadList`](super::DownloadList) handles
#[derive(Debug)]
pub(super) enum Command {
    Start { skip_if_downloaded: bool },
    Delete,
    Snapshot(oneshot::Sender<ListSnapshot>),
}

/// Item notifications forwarded by listeners
#[derive(Debug)]
pub(super) enum Notification {
    Status(StatusNotification),
    Metadata(MetadataNotification),
}

pub(super) struct ListDriver {
    id: ListId,
    config: Config,
    collection: Collection,
    /// Last status each attached item reported
    reported: Reported,
    /// Items handed to `download` that have not yet left `Initialized`
    dispatched: HashSet<ItemId>,
    skip_if_downloaded: bool,
    started_at: Option<DateTime<Utc>>,
    event_tx: broadcast::Sender<Event>,
    handlers: EventHandlers,
    commands: mpsc::UnboundedReceiver<Command>,
    notify_tx: mpsc::UnboundedSender<Notification>,
    notifications: mpsc::UnboundedReceiver<Notification>,
}

impl ListDriver {
    pub(super) fn new(
        id: ListId,
        config: Config,
        collection: Collection,
        event_tx: broadcast::Sender<Event>,
        handlers: EventHandlers,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let (notify_tx, notifications) = mpsc::unbounded_channel();
        Self {
            id,
            config,
            collection,
            reported: Reported::new(),
            dispatched: HashSet::new(),
            skip_if_downloaded: false,
            started_at: None,
            event_tx,
            handlers,
            commands,
            notify_tx,
            notifications,
        }
    }

    /// Run until every handle is dropped, then delete the collection
    pub(super) async fn run(mut self) {
        tracing::debug!(list_id = self.id.0, items = self.collection.len(), "List driver started");

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(notification) = self.notifications.recv() => {
                    self.handle_notification(notification);
                }
            }
        }

        if !self.collection.is_deleted() {
            tracing::debug!(list_id = self.id.0, "All handles dropped, deleting list");
            self.delete();
        }
        tracing::debug!(list_id = self.id.0, "List driver stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { skip_if_downloaded } => self.start(skip_if_downloaded),
            Command::Delete => self.delete(),
            Command::Snapshot(reply) => {
                reply.send(self.snapshot()).ok();
            }
        }
    }

    fn handle_notification(&mut self, notification: Notification) {
        if self.collection.is_deleted() {
            return;
        }
        match notification {
            Notification::Status(status) => {
                if !self.collection.contains(status.item) {
                    tracing::trace!(
                        list_id = self.id.0,
                        item_id = status.item.0,
                        "Ignoring status from item no longer in the list"
                    );
                    return;
                }
                self.on_item_status(status);
            }
            Notification::Metadata(metadata) => {
                if !self.collection.contains(metadata.item) {
                    return;
                }
                self.emit(Event::MetadataAvailable {
                    list: self.id,
                    item: metadata.item,
                    metadata: metadata.metadata,
                    media_type: self.config.media_type,
                });
            }
        }
    }

    fn start(&mut self, skip_if_downloaded: bool) {
        if self.collection.is_deleted() {
            tracing::debug!(list_id = self.id.0, "Start on deleted list");
            self.delete();
            return;
        }
        if self.collection.state == DownloadState::AllFinished {
            tracing::warn!(list_id = self.id.0, "Start after list finished, ignoring");
            return;
        }
        if self.collection.is_empty() {
            tracing::debug!(list_id = self.id.0, "Start on empty list, nothing to do");
            return;
        }
        if self.started_at.is_some() {
            tracing::debug!(list_id = self.id.0, "List already started, ignoring");
            return;
        }

        self.collection.title = derive_title(&self.collection).unwrap_or_default();
        self.started_at = Some(Utc::now());
        self.skip_if_downloaded = skip_if_downloaded;

        tracing::info!(
            list_id = self.id.0,
            title = %self.collection.title,
            items = self.collection.len(),
            concurrency_limit = self.config.concurrency_limit,
            media_type = %self.config.media_type,
            "Starting download list"
        );

        self.collection.state = DownloadState::BatchStarted;
        self.collection.progress = 0.0;
        self.emit_status(None, DownloadState::BatchStarted);

        for item in self.collection.items() {
            self.reported.insert(item.id(), (item.state(), item.progress()));
            let status_tx = self.notify_tx.clone();
            let metadata_tx = self.notify_tx.clone();
            let subscriptions = ItemSubscriptions {
                status: Some(item.subscribe_status(std::sync::Arc::new(
                    move |n: StatusNotification| {
                        status_tx.send(Notification::Status(n)).ok();
                    },
                ))),
                metadata: Some(item.subscribe_metadata(std::sync::Arc::new(
                    move |n: MetadataNotification| {
                        metadata_tx.send(Notification::Metadata(n)).ok();
                    },
                ))),
            };
            self.collection.attach(item.id(), subscriptions);
        }

        self.admit_next();
    }

    /// One aggregation pass for a status notification from a member item
    fn on_item_status(&mut self, status: StatusNotification) {
        if status.state == DownloadState::Removed {
            self.collection.detach(status.item);
            self.reported.remove(&status.item);
            self.dispatched.remove(&status.item);
            tracing::info!(
                list_id = self.id.0,
                item_id = status.item.0,
                remaining = self.collection.len(),
                "Item removed from list"
            );
            self.refill();
            return;
        }

        self.reported.insert(status.item, (status.state, status.progress));

        if self.collection.len() == 1 && status.state == DownloadState::TitleChanged {
            if let Some(item) = self.collection.get(0) {
                self.collection.title = item.title();
            }
        }

        if self.collection.state == DownloadState::AllFinished {
            tracing::trace!(
                list_id = self.id.0,
                item_id = status.item.0,
                state = %status.state,
                "Ignoring status after list finished"
            );
            return;
        }

        let reported = &self.reported;
        self.dispatched.retain(|id| {
            reported
                .get(id)
                .is_none_or(|(state, _)| *state == DownloadState::Initialized)
        });

        let tally = Tally::of(&self.collection, &self.reported, &self.dispatched);

        let state = if tally.all_finished() {
            DownloadState::AllFinished
        } else {
            status.state
        };

        if status.state == DownloadState::ProgressChanged || state == DownloadState::AllFinished {
            self.collection.progress = tally.average_progress;
        }
        self.collection.state = state;

        tracing::debug!(
            list_id = self.id.0,
            item_id = status.item.0,
            item_state = %status.state,
            state = %state,
            active = tally.active,
            finished = tally.finished,
            progress = self.collection.progress,
            "Aggregated item status"
        );

        self.emit_status(Some(status.item), state);

        if state == DownloadState::AllFinished {
            tracing::info!(
                list_id = self.id.0,
                title = %self.collection.title,
                items = tally.total,
                "Download list finished"
            );
            return;
        }

        if tally.active < self.config.concurrency_limit {
            self.admit_next();
        }
    }

    /// Admit the first idle item, if any
    fn admit_next(&mut self) {
        if self.collection.is_deleted() || self.collection.state == DownloadState::AllFinished {
            return;
        }

        let next = self
            .collection
            .iter()
            .find(|item| {
                reported_status(&self.reported, item).0 == DownloadState::Initialized
                    && !self.dispatched.contains(&item.id())
            })
            .cloned();

        let Some(item) = next else {
            return;
        };

        let item_id = item.id();
        self.dispatched.insert(item_id);
        tracing::debug!(
            list_id = self.id.0,
            item_id = item_id.0,
            skip_if_downloaded = self.skip_if_downloaded,
            "Admitting item"
        );
        spawn_download(
            self.id,
            item,
            self.config.media_type,
            self.skip_if_downloaded,
        );
    }

    /// Admit an item if a slot is free
    fn refill(&mut self) {
        if self.started_at.is_none() {
            return;
        }
        let tally = Tally::of(&self.collection, &self.reported, &self.dispatched);
        if tally.active < self.config.concurrency_limit {
            self.admit_next();
        }
    }

    fn delete(&mut self) {
        let first = !self.collection.is_deleted();
        self.collection.delete();
        self.reported.clear();
        self.dispatched.clear();

        if first {
            tracing::info!(list_id = self.id.0, "Download list deleted");
            self.emit_status(None, DownloadState::Removed);
        }
    }

    fn snapshot(&self) -> ListSnapshot {
        let tally = Tally::of(&self.collection, &self.reported, &self.dispatched);
        ListSnapshot {
            id: self.id,
            title: self.collection.title.clone(),
            state: self.collection.state,
            progress: self.collection.progress,
            execution_status: self.collection.execution_status(),
            item_count: tally.total,
            active_count: tally.active,
            finished_count: tally.finished,
            started_at: self.started_at,
        }
    }

    fn emit_status(&self, item: Option<ItemId>, state: DownloadState) {
        self.emit(Event::StatusChanged {
            list: self.id,
            title: self.collection.title.clone(),
            item,
            state,
            progress: self.collection.progress,
        });
    }

    fn emit(&self, event: Event) {
        let handler = match &event {
            Event::StatusChanged { .. } => self.handlers.on_status.as_ref(),
            Event::MetadataAvailable { .. } => self.handlers.on_metadata.as_ref(),
        };
        if let Some(handler) = handler {
            handler(&event);
        }
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}
