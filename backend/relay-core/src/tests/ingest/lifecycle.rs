// Unit tests for the connection lifecycle state machine
// Covers the normal cycle, stop from every state, and an exhaustive walk of short
// event sequences checking the invariants on every step.

use crate::ingest::{ArmedTimer, Lifecycle, LifecycleEvent, Transition};

use models::ConnectionState;

const EVENTS: [LifecycleEvent; 4] = [
    LifecycleEvent::Dial,
    LifecycleEvent::Opened,
    LifecycleEvent::Dropped,
    LifecycleEvent::Stop,
];

fn run(events: &[LifecycleEvent]) -> Lifecycle {
    let mut lifecycle = Lifecycle::new();
    for event in events {
        lifecycle.apply(*event);
    }
    lifecycle
}

/// **VALUE**: Verifies the happy path Disconnected → Connecting → Connected.
///
/// **BUG THIS CATCHES**: Would catch the heartbeat timer not being armed on open.
#[test]
fn given_new_lifecycle_when_dial_and_open_then_connected_with_heartbeat() {
    // GIVEN: A fresh lifecycle
    let mut lifecycle = Lifecycle::new();
    assert_eq!(lifecycle.state(), ConnectionState::Disconnected);

    // WHEN: Dialing and opening
    let dial = lifecycle.apply(LifecycleEvent::Dial);
    let open = lifecycle.apply(LifecycleEvent::Opened);

    // THEN: Connected, one socket, heartbeat armed
    assert_eq!(
        dial,
        Transition::Applied {
            from: ConnectionState::Disconnected,
            to: ConnectionState::Connecting
        }
    );
    assert!(open.is_applied());
    assert_eq!(lifecycle.state(), ConnectionState::Connected);
    assert_eq!(lifecycle.open_sockets(), 1);
    assert_eq!(lifecycle.timer(), ArmedTimer::Heartbeat);
    assert_eq!(lifecycle.connect_attempts(), 1);
}

/// **VALUE**: Verifies a drop schedules a reconnect and clears the heartbeat.
///
/// **WHY THIS MATTERS**: A heartbeat left running on a dead socket would error forever.
#[test]
fn given_connected_when_dropped_then_reconnect_pending() {
    let mut lifecycle = run(&[LifecycleEvent::Dial, LifecycleEvent::Opened]);

    lifecycle.apply(LifecycleEvent::Dropped);

    assert_eq!(lifecycle.state(), ConnectionState::ReconnectPending);
    assert_eq!(lifecycle.timer(), ArmedTimer::Reconnect);
    assert_eq!(lifecycle.open_sockets(), 0);
}

/// **VALUE**: Verifies a failed connect goes straight to ReconnectPending.
#[test]
fn given_connecting_when_dropped_then_reconnect_pending() {
    let lifecycle = run(&[LifecycleEvent::Dial, LifecycleEvent::Dropped]);

    assert_eq!(lifecycle.state(), ConnectionState::ReconnectPending);
    assert_eq!(lifecycle.open_sockets(), 0);
}

/// **VALUE**: Verifies the full reconnect cycle counts attempts.
#[test]
fn given_reconnect_pending_when_dial_then_connecting_again() {
    let lifecycle = run(&[
        LifecycleEvent::Dial,
        LifecycleEvent::Opened,
        LifecycleEvent::Dropped,
        LifecycleEvent::Dial,
    ]);

    assert_eq!(lifecycle.state(), ConnectionState::Connecting);
    assert_eq!(lifecycle.connect_attempts(), 2);
}

/// **VALUE**: Verifies stop reaches Closed from every reachable state.
///
/// **BUG THIS CATCHES**: Would catch a state where stop is rejected as invalid.
#[test]
fn given_any_state_when_stop_then_closed_without_timer() {
    let prefixes: [&[LifecycleEvent]; 4] = [
        &[],
        &[LifecycleEvent::Dial],
        &[LifecycleEvent::Dial, LifecycleEvent::Opened],
        &[LifecycleEvent::Dial, LifecycleEvent::Dropped],
    ];

    for prefix in prefixes {
        let mut lifecycle = run(prefix);

        let transition = lifecycle.apply(LifecycleEvent::Stop);

        assert!(transition.is_applied(), "prefix {prefix:?}");
        assert_eq!(lifecycle.state(), ConnectionState::Closed);
        assert_eq!(lifecycle.timer(), ArmedTimer::None);
    }
}

/// **VALUE**: Verifies Closed absorbs every event, including a repeated stop.
///
/// **WHY THIS MATTERS**: Stop must be idempotent and nothing may reconnect afterwards.
#[test]
fn given_closed_when_any_event_then_suppressed() {
    let mut lifecycle = run(&[LifecycleEvent::Stop]);

    for event in EVENTS {
        assert_eq!(lifecycle.apply(event), Transition::Suppressed);
        assert_eq!(lifecycle.state(), ConnectionState::Closed);
    }
}

/// **VALUE**: Verifies a socket torn down after stop is still accounted for.
///
/// **BUG THIS CATCHES**: Would catch a socket count stuck at 1 after stop while connected.
#[test]
fn given_stopped_while_connected_when_dropped_then_socket_count_cleared() {
    let mut lifecycle = run(&[
        LifecycleEvent::Dial,
        LifecycleEvent::Opened,
        LifecycleEvent::Stop,
    ]);
    assert_eq!(lifecycle.open_sockets(), 1);

    lifecycle.apply(LifecycleEvent::Dropped);

    assert_eq!(lifecycle.open_sockets(), 0);
    assert_eq!(lifecycle.state(), ConnectionState::Closed);
}

/// **VALUE**: Verifies a second dial while a socket is open is refused.
///
/// **WHY THIS MATTERS**: Two sockets for one account would deliver every frame twice.
#[test]
fn given_connected_when_dial_then_invalid() {
    let mut lifecycle = run(&[LifecycleEvent::Dial, LifecycleEvent::Opened]);

    assert_eq!(lifecycle.apply(LifecycleEvent::Dial), Transition::Invalid);
    assert_eq!(lifecycle.connect_attempts(), 1);
}

/// **VALUE**: Walks every event sequence up to length 7 and checks the invariants on
/// each step.
///
/// **WHY THIS MATTERS**: Races between the handle and the worker can deliver events in
/// any order; the invariants must hold for all of them.
///
/// **BUG THIS CATCHES**: Would catch any ordering that opens a second socket, leaves
/// Closed, or arms a timer in the wrong state.
#[test]
fn given_every_event_sequence_when_applied_then_invariants_hold() {
    const MAX_LEN: u32 = 7;
    let mut checked = 0usize;

    for len in 0..=MAX_LEN {
        for mut index in 0..EVENTS.len().pow(len) {
            let mut lifecycle = Lifecycle::new();
            let mut was_closed = false;

            for _ in 0..len {
                let event = EVENTS[index % EVENTS.len()];
                index /= EVENTS.len();

                let before_attempts = lifecycle.connect_attempts();
                let transition = lifecycle.apply(event);

                assert!(lifecycle.open_sockets() <= 1);

                if was_closed {
                    assert_eq!(transition, Transition::Suppressed);
                    assert_eq!(lifecycle.state(), ConnectionState::Closed);
                    assert_eq!(lifecycle.connect_attempts(), before_attempts);
                }

                match lifecycle.state() {
                    ConnectionState::Connected => {
                        assert_eq!(lifecycle.timer(), ArmedTimer::Heartbeat)
                    }
                    ConnectionState::ReconnectPending => {
                        assert_eq!(lifecycle.timer(), ArmedTimer::Reconnect);
                        assert_eq!(lifecycle.open_sockets(), 0);
                    }
                    ConnectionState::Connecting => {
                        assert_eq!(lifecycle.timer(), ArmedTimer::None);
                        assert_eq!(lifecycle.open_sockets(), 1);
                    }
                    ConnectionState::Disconnected | ConnectionState::Closed => {
                        assert_eq!(lifecycle.timer(), ArmedTimer::None)
                    }
                }

                was_closed = lifecycle.state().is_closed();
            }

            checked += 1;
        }
    }

    assert!(checked > 20_000);
}
