//! Background task that owns one channel
//!
//! All channel state lives here. The public handle only enqueues commands,
//! so caller calls never block and never race a transition.

use std::collections::VecDeque;
use std::future::pending;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use pushfeed_core::TargetId;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::dispatcher::FrameDispatcher;
use super::listeners::Listeners;
use super::machine::{Action, ChannelMachine};
use super::registry::SubscriptionRegistry;
use super::transport::{Connector, Transport};
use super::types::{ChannelError, ChannelResult, ChannelState};

/// Requests from the handle to the driver
#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Close,
    Reconnect,
    SetTargets(Vec<TargetId>),
}

enum Event {
    Command(Command),
    Shutdown,
    ConnectDone(ChannelResult<Box<dyn Transport>>),
    Inbound(ChannelResult<Option<Vec<u8>>>),
    TimerFired,
}

pub(crate) struct Driver {
    machine: ChannelMachine,
    registry: SubscriptionRegistry,
    connector: Arc<dyn Connector>,
    dispatcher: FrameDispatcher,
    state_tx: watch::Sender<ChannelState>,
    failures: Listeners<ChannelError>,
    failure: Arc<RwLock<Option<ChannelError>>>,
    socket: Option<Box<dyn Transport>>,
    connecting: Option<BoxFuture<'static, ChannelResult<Box<dyn Transport>>>>,
    deadline: Option<Instant>,
}

impl Driver {
    pub fn new(
        machine: ChannelMachine,
        connector: Arc<dyn Connector>,
        dispatcher: FrameDispatcher,
        state_tx: watch::Sender<ChannelState>,
        failures: Listeners<ChannelError>,
        failure: Arc<RwLock<Option<ChannelError>>>,
    ) -> Self {
        Self {
            machine,
            registry: SubscriptionRegistry::new(),
            connector,
            dispatcher,
            state_tx,
            failures,
            failure,
            socket: None,
            connecting: None,
            deadline: None,
        }
    }

    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let event = tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(command) => Event::Command(command),
                    None => Event::Shutdown,
                },
                result = wait_connect(&mut self.connecting) => Event::ConnectDone(result),
                inbound = wait_inbound(&mut self.socket) => Event::Inbound(inbound),
                _ = wait_deadline(self.deadline) => Event::TimerFired,
            };

            match event {
                Event::Shutdown => {
                    debug!("All channel handles dropped, shutting down");
                    let actions = self.machine.close();
                    self.apply(actions).await;
                    return;
                }
                Event::Command(command) => self.handle_command(command).await,
                Event::ConnectDone(result) => {
                    self.connecting = None;
                    match result {
                        Ok(socket) => {
                            self.socket = Some(socket);
                            *self.failure.write() = None;
                            info!(targets = self.registry.len(), "Channel connected");
                            let actions = self.machine.opened();
                            self.apply(actions).await;
                        }
                        Err(e) => {
                            warn!(error = %e, attempt = self.machine.attempt(), "Connect attempt failed");
                            let actions = self.machine.lost();
                            self.apply(actions).await;
                        }
                    }
                }
                Event::Inbound(Ok(Some(payload))) => {
                    self.dispatcher.dispatch_bytes(&payload);
                }
                Event::Inbound(Ok(None)) => {
                    info!("Channel closed by peer");
                    let actions = self.machine.lost();
                    self.apply(actions).await;
                }
                Event::Inbound(Err(e)) => {
                    warn!(error = %e, "Channel transport error");
                    let actions = self.machine.lost();
                    self.apply(actions).await;
                }
                Event::TimerFired => {
                    self.deadline = None;
                    let actions = self.machine.timer_fired();
                    self.apply(actions).await;
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => {
                let actions = self.machine.connect();
                self.apply(actions).await;
            }
            Command::Close => {
                let actions = self.machine.close();
                self.apply(actions).await;
            }
            Command::Reconnect => {
                let actions = self.machine.reconnect();
                self.apply(actions).await;
            }
            Command::SetTargets(ids) => {
                self.registry.set_targets(ids);
                if self.machine.state().is_connected() {
                    self.apply(vec![Action::SendTargets]).await;
                } else {
                    debug!(targets = self.registry.len(), "Targets buffered until connected");
                }
            }
        }
    }

    async fn apply(&mut self, actions: Vec<Action>) {
        let mut queue: VecDeque<Action> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                Action::Open => {
                    let connector = Arc::clone(&self.connector);
                    self.connecting = Some(Box::pin(async move { connector.connect().await }));
                }
                Action::SendTargets => {
                    if let Err(e) = self.send_targets().await {
                        warn!(error = %e, "Failed to send subscription");
                        queue.extend(self.machine.lost());
                    }
                }
                Action::Schedule(delay) => {
                    info!(
                        attempt = self.machine.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "Reconnect scheduled"
                    );
                    self.deadline = Some(Instant::now() + delay);
                }
                Action::CancelTimer => {
                    self.deadline = None;
                }
                Action::CloseSocket => {
                    self.connecting = None;
                    if let Some(mut socket) = self.socket.take() {
                        socket.close().await;
                    }
                }
                Action::Fail(e) => {
                    // Failure must be visible before Closed is published
                    error!(error = %e, "Channel giving up");
                    *self.failure.write() = Some(e.clone());
                    self.failures.emit(&e);
                    self.publish_state();
                }
            }
        }
        self.publish_state();
    }

    async fn send_targets(&mut self) -> ChannelResult<()> {
        let message = self.registry.subscribe_message();
        let text =
            serde_json::to_string(&message).map_err(|e| ChannelError::Encode(e.to_string()))?;
        let socket = self.socket.as_mut().ok_or(ChannelError::Closed)?;
        debug!(targets = self.registry.len(), "Sending subscription");
        socket.send_text(text).await
    }

    fn publish_state(&self) {
        let state = self.machine.state().clone();
        self.state_tx.send_if_modified(|current| {
            if *current != state {
                *current = state;
                true
            } else {
                false
            }
        });
    }
}

async fn wait_connect(
    connecting: &mut Option<BoxFuture<'static, ChannelResult<Box<dyn Transport>>>>,
) -> ChannelResult<Box<dyn Transport>> {
    match connecting {
        Some(future) => future.await,
        None => pending().await,
    }
}

async fn wait_inbound(socket: &mut Option<Box<dyn Transport>>) -> ChannelResult<Option<Vec<u8>>> {
    match socket {
        Some(socket) => socket.recv().await,
        None => pending().await,
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending().await,
    }
}
