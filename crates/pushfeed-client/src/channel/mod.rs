//! Reconnecting push channel
//!
//! A [`Channel`] keeps one logical, always-on duplex connection to the
//! dashboard backend. It reconnects with bounded exponential backoff, replays
//! the desired target set after every (re)connect and maintains a
//! latest-value view of the frames the server pushes.
//!
//! # Example
//!
//! ```no_run
//! use pushfeed_client::channel::Channel;
//! use pushfeed_client::ChannelConfig;
//!
//! # async fn example() {
//! let channel = Channel::websocket(ChannelConfig::new("ws://localhost:8080/ws"));
//! channel.on_update(|frame| println!("{} -> {:?}", frame.target_id, frame.fields));
//! channel.on_failure(|err| eprintln!("gave up: {}", err));
//!
//! channel.set_targets(["web-1", "web-2"]);
//! channel.connect();
//!
//! // Later: read the latest known value of a target
//! let latest = channel.latest("web-1");
//! # }
//! ```

mod backoff;
mod dispatcher;
mod driver;
mod listeners;
mod machine;
mod registry;
mod store;
mod transport;
mod types;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use pushfeed_core::{Frame, TargetId};
use tokio::sync::{broadcast, mpsc, watch};

pub use backoff::Backoff;
pub use dispatcher::FrameDispatcher;
pub use listeners::Listeners;
pub use registry::SubscriptionRegistry;
pub use store::LatestValueStore;
pub use transport::{Connector, Transport, WsConnector};
pub use types::{ChannelError, ChannelResult, ChannelState, ListenerId};

use driver::{Command, Driver};
use machine::ChannelMachine;

use crate::config::ChannelConfig;

/// Handle to one logical reconnecting channel
///
/// Creating a channel spawns its driver task, so it must happen inside a
/// tokio runtime. Dropping the handle closes the channel and ends the task.
pub struct Channel {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ChannelState>,
    dispatcher: FrameDispatcher,
    failures: Listeners<ChannelError>,
    failure: Arc<RwLock<Option<ChannelError>>>,
    targets: RwLock<Vec<TargetId>>,
}

impl Channel {
    /// Create a disconnected channel using the given connector
    pub fn new<C: Connector>(config: ChannelConfig, connector: C) -> Self {
        Self::with_connector(config, Arc::new(connector))
    }

    /// Create a disconnected WebSocket channel for `config.url`
    pub fn websocket(config: ChannelConfig) -> Self {
        let connector = WsConnector::new(config.url.clone());
        Self::new(config, connector)
    }

    /// Create a disconnected channel sharing an existing connector
    pub fn with_connector(config: ChannelConfig, connector: Arc<dyn Connector>) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ChannelState::Disconnected);
        let dispatcher = FrameDispatcher::new(config.accepted_types.clone(), config.update_buffer);
        let failures = Listeners::new();
        let failure = Arc::new(RwLock::new(None));

        let driver = Driver::new(
            ChannelMachine::new(Backoff::from_config(&config.backoff)),
            connector,
            dispatcher.clone(),
            state_tx,
            failures.clone(),
            Arc::clone(&failure),
        );
        tokio::spawn(driver.run(command_rx));

        Self {
            commands,
            state,
            dispatcher,
            failures,
            failure,
            targets: RwLock::new(Vec::new()),
        }
    }

    /// Open the connection; no-op while connecting or connected
    pub fn connect(&self) {
        self.send(Command::Connect);
    }

    /// Close the connection and cancel any pending reconnect; idempotent
    pub fn close(&self) {
        self.send(Command::Close);
    }

    /// Close, reset the retry budget, and connect again
    pub fn reconnect(&self) {
        self.send(Command::Reconnect);
    }

    /// Replace the desired target set
    ///
    /// Sent immediately in full when connected, otherwise on the next connect.
    pub fn set_targets<I, T>(&self, ids: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<TargetId>,
    {
        let ids: Vec<TargetId> = ids.into_iter().map(Into::into).collect();
        let sorted: BTreeSet<TargetId> = ids.iter().cloned().collect();
        *self.targets.write() = sorted.into_iter().collect();
        self.send(Command::SetTargets(ids));
    }

    /// Current desired target set, sorted
    pub fn targets(&self) -> Vec<TargetId> {
        self.targets.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    pub fn state(&self) -> ChannelState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state transition
    pub fn state_changes(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Wait until the channel reaches a state matching `predicate`
    ///
    /// Returns `None` on timeout or if the driver stopped.
    pub async fn wait_for_state<F>(&self, timeout: Duration, predicate: F) -> Option<ChannelState>
    where
        F: FnMut(&ChannelState) -> bool,
    {
        let mut state = self.state.clone();
        let matched = match tokio::time::timeout(timeout, state.wait_for(predicate)).await {
            Ok(Ok(matched)) => Some(matched.clone()),
            _ => None,
        };
        matched
    }

    /// Latest accepted frame for a target
    pub fn latest(&self, id: impl Into<TargetId>) -> Option<Frame> {
        self.dispatcher.store().get(&id.into())
    }

    /// Copy of the whole latest-value view
    pub fn snapshot(&self) -> HashMap<TargetId, Frame> {
        self.dispatcher.store().snapshot()
    }

    /// Register a callback run synchronously for every accepted frame
    pub fn on_update<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Frame) + Send + Sync + 'static,
    {
        self.dispatcher.listeners().add(listener)
    }

    /// Remove an update listener; returns whether it was registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.dispatcher.listeners().remove(id)
    }

    /// Receiver of every accepted frame, for async consumers
    pub fn updates(&self) -> broadcast::Receiver<Frame> {
        self.dispatcher.subscribe()
    }

    /// Register a callback run once each time the retry budget is exhausted
    pub fn on_failure<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ChannelError) + Send + Sync + 'static,
    {
        self.failures.add(listener)
    }

    /// Terminal failure since the last successful connect, if any
    pub fn failure(&self) -> Option<ChannelError> {
        self.failure.read().clone()
    }

    /// Number of inbound frames dropped as malformed
    pub fn dropped_frames(&self) -> u64 {
        self.dispatcher.dropped()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("Channel driver is not running");
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("state", &*self.state.borrow())
            .field("targets", &*self.targets.read())
            .finish()
    }
}
