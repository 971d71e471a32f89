//! Pure connection lifecycle state machine.
//!
//! The worker task reports what happened (`Dial`, `Opened`, `Dropped`) and the handle
//! reports `Stop`. Every event goes through [`Lifecycle::apply`], which is the single
//! place transitions are decided. Keeping it free of I/O lets the invariants be checked
//! exhaustively in tests:
//!
//! - at most one socket is open or opening at any moment
//! - `Closed` is terminal and absorbs every later event
//! - a timer is armed only in the state that owns it

use models::ConnectionState;

/// Events fed into the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A connection attempt is about to start.
    Dial,
    /// The socket finished its handshake.
    Opened,
    /// The socket failed to open, errored, or was closed by the peer.
    Dropped,
    /// The owner asked to stop.
    Stop,
}

/// Timer currently armed by the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmedTimer {
    None,
    Heartbeat,
    Reconnect,
}

/// Result of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The event moved the machine from one state to another.
    Applied {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// Ignored because the machine is `Closed`.
    Suppressed,
    /// Not legal from the current state; nothing changed.
    Invalid,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: ConnectionState,
    timer: ArmedTimer,
    open_sockets: u8,
    connect_attempts: u64,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            timer: ArmedTimer::None,
            open_sockets: 0,
            connect_attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn timer(&self) -> ArmedTimer {
        self.timer
    }

    /// Sockets open or in the middle of opening (0 or 1).
    pub fn open_sockets(&self) -> u8 {
        self.open_sockets
    }

    /// Number of `Dial` events accepted so far.
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts
    }

    pub fn apply(&mut self, event: LifecycleEvent) -> Transition {
        use ConnectionState::*;

        let from = self.state;

        if from == Closed {
            // A socket being torn down after stop still reports its drop.
            if event == LifecycleEvent::Dropped {
                self.open_sockets = 0;
            }
            return Transition::Suppressed;
        }

        match (from, event) {
            (Disconnected | ReconnectPending, LifecycleEvent::Dial) if self.open_sockets == 0 => {
                self.state = Connecting;
                self.timer = ArmedTimer::None;
                self.open_sockets = 1;
                self.connect_attempts += 1;
            }
            (Connecting, LifecycleEvent::Opened) => {
                self.state = Connected;
                self.timer = ArmedTimer::Heartbeat;
            }
            (Connecting | Connected, LifecycleEvent::Dropped) => {
                self.state = ReconnectPending;
                self.timer = ArmedTimer::Reconnect;
                self.open_sockets = 0;
            }
            (_, LifecycleEvent::Stop) => {
                self.state = Closed;
                self.timer = ArmedTimer::None;
            }
            _ => return Transition::Invalid,
        }

        Transition::Applied {
            from,
            to: self.state,
        }
    }
}
