//! Playlist Service - runs a controller on its own task
//!
//! All mutation of the controller happens on that task. Commands from any
//! number of [`PlaylistHandle`]s, events from the player, and load
//! completions are multiplexed into one loop.

use crate::{
    controller::PlaylistController,
    events::{MessageBus, PlaylistEvent},
    Direction, Error, Result,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Point-in-time view of the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSnapshot {
    pub playlist_id: String,
    pub count: usize,
    pub current_index: Option<usize>,
    pub current_entry_id: Option<String>,
    pub loop_enabled: bool,
    pub auto_continue: bool,
    pub recover_on_error: bool,
    pub direction: Direction,
    pub loading: bool,
    pub preloading: Vec<String>,
    pub countdown_active: bool,
}

impl PlaylistSnapshot {
    fn capture(controller: &PlaylistController) -> Self {
        Self {
            playlist_id: controller.playlist().id.clone(),
            count: controller.len(),
            current_index: controller.current_index(),
            current_entry_id: controller.current_entry().map(|e| e.id.clone()),
            loop_enabled: controller.is_loop_enabled(),
            auto_continue: controller.is_auto_continue(),
            recover_on_error: controller.is_recover_on_error(),
            direction: controller.direction(),
            loading: controller.is_loading(),
            preloading: controller.preloading_ids(),
            countdown_active: controller.countdown().is_some_and(|c| c.is_active()),
        }
    }
}

enum Command {
    PlayNext(oneshot::Sender<Result<()>>),
    PlayPrev(oneshot::Sender<Result<()>>),
    PlayItem(usize, oneshot::Sender<Result<()>>),
    Replay(oneshot::Sender<Result<()>>),
    Reset(oneshot::Sender<()>),
    PreloadNext(oneshot::Sender<bool>),
    DisableCountdown(oneshot::Sender<()>),
    SetLoop(bool, oneshot::Sender<()>),
    SetAutoContinue(bool, oneshot::Sender<()>),
    SetRecoverOnError(bool, oneshot::Sender<()>),
    Snapshot(oneshot::Sender<PlaylistSnapshot>),
}

/// Owner of a running controller
pub struct PlaylistService {
    controller: PlaylistController,
    commands: mpsc::Receiver<Command>,
}

impl PlaylistService {
    /// Commands that may queue before senders wait
    const COMMAND_CAPACITY: usize = 64;

    /// Move the controller onto a new task and return a handle to it
    pub fn spawn(controller: PlaylistController) -> (PlaylistHandle, JoinHandle<()>) {
        let (tx, commands) = mpsc::channel(Self::COMMAND_CAPACITY);
        let bus = controller.bus().clone();
        let events = controller.player().subscribe();

        let service = Self { controller, commands };
        let task = tokio::spawn(service.run(events));

        (PlaylistHandle { tx, bus }, task)
    }

    async fn run(mut self, mut events: broadcast::Receiver<crate::PlayerEvent>) {
        info!(playlist_id = %self.controller.playlist().id, "Playlist service started");
        let mut events_open = true;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.execute(command),
                    None => break,
                },
                event = events.recv(), if events_open => match event {
                    Ok(event) => self.controller.handle_player_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Player events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Player event stream closed");
                        events_open = false;
                    }
                },
                Some(completion) = self.controller.next_completion() => {
                    self.controller.apply_completion(completion);
                }
            }
        }

        info!("All playlist handles dropped, service stopped");
    }

    fn execute(&mut self, command: Command) {
        let controller = &mut self.controller;
        match command {
            Command::PlayNext(reply) => {
                let _ = reply.send(controller.play_next());
            }
            Command::PlayPrev(reply) => {
                let _ = reply.send(controller.play_prev());
            }
            Command::PlayItem(index, reply) => {
                let _ = reply.send(controller.play_item(index));
            }
            Command::Replay(reply) => {
                let _ = reply.send(controller.replay());
            }
            Command::Reset(reply) => {
                controller.reset();
                let _ = reply.send(());
            }
            Command::PreloadNext(reply) => {
                let _ = reply.send(controller.preload_next());
            }
            Command::DisableCountdown(reply) => {
                controller.disable_countdown_for_current_item();
                let _ = reply.send(());
            }
            Command::SetLoop(enabled, reply) => {
                controller.set_loop(enabled);
                let _ = reply.send(());
            }
            Command::SetAutoContinue(enabled, reply) => {
                controller.set_auto_continue(enabled);
                let _ = reply.send(());
            }
            Command::SetRecoverOnError(enabled, reply) => {
                controller.set_recover_on_error(enabled);
                let _ = reply.send(());
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(PlaylistSnapshot::capture(controller));
            }
        }
    }
}

/// Cloneable handle to a running [`PlaylistService`]
#[derive(Clone)]
pub struct PlaylistHandle {
    tx: mpsc::Sender<Command>,
    bus: MessageBus,
}

impl PlaylistHandle {
    /// Subscribe to playlist events
    pub fn subscribe(&self) -> broadcast::Receiver<PlaylistEvent> {
        self.bus.subscribe()
    }

    #[instrument(skip(self))]
    pub async fn play_next(&self) -> Result<()> {
        self.request(Command::PlayNext).await?
    }

    #[instrument(skip(self))]
    pub async fn play_prev(&self) -> Result<()> {
        self.request(Command::PlayPrev).await?
    }

    #[instrument(skip(self))]
    pub async fn play_item(&self, index: usize) -> Result<()> {
        self.request(|reply| Command::PlayItem(index, reply)).await?
    }

    pub async fn replay(&self) -> Result<()> {
        self.request(Command::Replay).await?
    }

    pub async fn reset(&self) -> Result<()> {
        self.request(Command::Reset).await
    }

    pub async fn preload_next(&self) -> Result<bool> {
        self.request(Command::PreloadNext).await
    }

    pub async fn disable_countdown_for_current_item(&self) -> Result<()> {
        self.request(Command::DisableCountdown).await
    }

    pub async fn set_loop(&self, enabled: bool) -> Result<()> {
        self.request(|reply| Command::SetLoop(enabled, reply)).await
    }

    pub async fn set_auto_continue(&self, enabled: bool) -> Result<()> {
        self.request(|reply| Command::SetAutoContinue(enabled, reply)).await
    }

    pub async fn set_recover_on_error(&self, enabled: bool) -> Result<()> {
        self.request(|reply| Command::SetRecoverOnError(enabled, reply)).await
    }

    pub async fn snapshot(&self) -> Result<PlaylistSnapshot> {
        self.request(Command::Snapshot).await
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| Error::ServiceClosed)?;
        rx.await.map_err(|_| Error::ServiceClosed)
    }
}
