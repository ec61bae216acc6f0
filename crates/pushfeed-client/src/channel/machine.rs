//! Channel state machine
//!
//! Pure transition logic: every input returns the side effects the driver
//! must perform, so the policy can be tested without sockets or timers.
//! A reconnect timer is pending exactly when the state is `Reconnecting`.

use std::time::Duration;

use super::backoff::Backoff;
use super::types::{ChannelError, ChannelState};

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    /// Start a physical connect
    Open,
    /// Send the full desired target set
    SendTargets,
    /// Arm the reconnect timer
    Schedule(Duration),
    /// Disarm the reconnect timer
    CancelTimer,
    /// Drop any in-flight connect and close the socket
    CloseSocket,
    /// Surface a terminal failure to the caller
    Fail(ChannelError),
}

#[derive(Debug)]
pub(crate) struct ChannelMachine {
    state: ChannelState,
    attempt: u32,
    backoff: Backoff,
}

impl ChannelMachine {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            state: ChannelState::Disconnected,
            attempt: 0,
            backoff,
        }
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Caller or timer asked for a connection
    pub fn connect(&mut self) -> Vec<Action> {
        match self.state {
            ChannelState::Connecting | ChannelState::Connected => Vec::new(),
            ChannelState::Reconnecting { .. } => {
                self.state = ChannelState::Connecting;
                vec![Action::CancelTimer, Action::Open]
            }
            ChannelState::Disconnected | ChannelState::Closed => {
                self.state = ChannelState::Connecting;
                vec![Action::Open]
            }
        }
    }

    /// The in-flight connect succeeded
    pub fn opened(&mut self) -> Vec<Action> {
        if self.state != ChannelState::Connecting {
            return vec![Action::CloseSocket];
        }
        self.state = ChannelState::Connected;
        self.attempt = 0;
        vec![Action::SendTargets]
    }

    /// The in-flight connect failed or the open socket was lost
    pub fn lost(&mut self) -> Vec<Action> {
        match self.state {
            ChannelState::Connecting | ChannelState::Connected => {}
            _ => return Vec::new(),
        }

        let mut actions = vec![Action::CloseSocket];
        if self.backoff.allows(self.attempt) {
            let delay = self.backoff.delay_for(self.attempt);
            self.attempt += 1;
            self.state = ChannelState::Reconnecting {
                attempt: self.attempt,
                delay,
            };
            actions.push(Action::Schedule(delay));
        } else {
            self.state = ChannelState::Closed;
            actions.push(Action::Fail(ChannelError::RetriesExhausted {
                attempts: self.attempt,
            }));
        }
        actions
    }

    /// The reconnect timer expired
    pub fn timer_fired(&mut self) -> Vec<Action> {
        match self.state {
            ChannelState::Reconnecting { .. } => {
                self.state = ChannelState::Connecting;
                vec![Action::Open]
            }
            _ => Vec::new(),
        }
    }

    /// Caller closed the channel
    pub fn close(&mut self) -> Vec<Action> {
        let actions = match self.state {
            ChannelState::Closed => return Vec::new(),
            ChannelState::Reconnecting { .. } => vec![Action::CancelTimer, Action::CloseSocket],
            _ => vec![Action::CloseSocket],
        };
        self.state = ChannelState::Closed;
        actions
    }

    /// Caller forced a fresh connection with a reset attempt budget
    pub fn reconnect(&mut self) -> Vec<Action> {
        let mut actions = self.close();
        self.attempt = 0;
        actions.extend(self.connect());
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn machine() -> ChannelMachine {
        ChannelMachine::new(Backoff::default())
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_connect_is_noop_while_in_flight_or_connected() {
        let mut m = machine();
        assert_eq!(m.connect(), vec![Action::Open]);
        assert_eq!(m.connect(), vec![]);
        m.opened();
        assert_eq!(m.connect(), vec![]);
        assert_eq!(m.state(), &ChannelState::Connected);
    }

    #[test]
    fn test_open_resets_attempt_and_sends_targets() {
        let mut m = machine();
        m.connect();
        m.lost();
        m.timer_fired();
        m.lost();
        assert_eq!(m.attempt(), 2);
        m.timer_fired();
        assert_eq!(m.opened(), vec![Action::SendTargets]);
        assert_eq!(m.attempt(), 0);
        assert!(m.state().is_connected());
    }

    #[test]
    fn test_loss_schedules_growing_delays() {
        let mut m = machine();
        m.connect();
        let expected = [1, 2, 4, 8, 16, 30, 30, 30, 30, 30];
        for (i, delay) in expected.iter().enumerate() {
            assert_eq!(
                m.lost(),
                vec![Action::CloseSocket, Action::Schedule(secs(*delay))]
            );
            assert_eq!(
                m.state(),
                &ChannelState::Reconnecting {
                    attempt: i as u32 + 1,
                    delay: secs(*delay)
                }
            );
            assert_eq!(m.timer_fired(), vec![Action::Open]);
        }
        assert_eq!(
            m.lost(),
            vec![
                Action::CloseSocket,
                Action::Fail(ChannelError::RetriesExhausted { attempts: 10 })
            ]
        );
        assert!(m.state().is_closed());
        assert_eq!(m.timer_fired(), vec![]);
        assert_eq!(m.lost(), vec![]);
    }

    #[test]
    fn test_close_cancels_pending_timer_and_is_idempotent() {
        let mut m = machine();
        m.connect();
        m.lost();
        assert_eq!(m.close(), vec![Action::CancelTimer, Action::CloseSocket]);
        assert_eq!(m.close(), vec![]);
        assert_eq!(m.timer_fired(), vec![]);
        assert!(m.state().is_closed());
    }

    #[test]
    fn test_connect_during_backoff_replaces_timer() {
        let mut m = machine();
        m.connect();
        m.lost();
        assert_eq!(m.connect(), vec![Action::CancelTimer, Action::Open]);
        assert_eq!(m.state(), &ChannelState::Connecting);
    }

    #[test]
    fn test_reconnect_resets_budget() {
        let mut m = machine();
        m.connect();
        m.lost();
        m.timer_fired();
        m.lost();
        assert_eq!(
            m.reconnect(),
            vec![Action::CancelTimer, Action::CloseSocket, Action::Open]
        );
        assert_eq!(m.attempt(), 0);
        assert_eq!(m.lost(), vec![Action::CloseSocket, Action::Schedule(secs(1))]);
    }

    #[test]
    fn test_connect_after_close_reopens() {
        let mut m = machine();
        m.connect();
        m.opened();
        m.close();
        assert_eq!(m.connect(), vec![Action::Open]);
    }

    #[test]
    fn test_stale_open_is_closed() {
        let mut m = machine();
        m.connect();
        m.close();
        assert_eq!(m.opened(), vec![Action::CloseSocket]);
        assert!(m.state().is_closed());
    }
}
