//! Connection lifecycle state machine
//! States: Disconnected, Connecting, Connected, Disconnecting

use crate::error::ErrorKind;
use crate::types::SessionState;
use log::info;
use statig::prelude::*;

// Input events to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleInput {
    ConnectRequested,
    ConnectSucceeded,
    ConnectFailed,
    DisconnectRequested,
    DisconnectCompleted,
    LinkLost,
}

// Output events from the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutput {
    StateChanged { from: SessionState, to: SessionState },
    Rejected(ErrorKind),
}

#[derive(Debug, Default)]
pub struct LifecycleContext {
    outputs: heapless::Vec<LifecycleOutput, 4>,
}

impl LifecycleContext {
    fn reject(&mut self, kind: ErrorKind) {
        let _ = self.outputs.push(LifecycleOutput::Rejected(kind));
    }
}

#[derive(Debug, Default)]
pub struct SessionLifecycle;

#[state_machine(
    initial = "State::disconnected()",
    state(derive(Debug)),
    on_transition = "Self::on_transition"
)]
impl SessionLifecycle {
    #[state]
    fn disconnected(context: &mut LifecycleContext, event: &LifecycleInput) -> Response<State> {
        use Response::*;

        match event {
            LifecycleInput::ConnectRequested => Transition(State::connecting()),
            LifecycleInput::DisconnectRequested => {
                context.reject(ErrorKind::NotConnected);
                Handled
            }
            // Late completions and link drops have nothing left to act on
            _ => Handled,
        }
    }

    #[state]
    fn connecting(context: &mut LifecycleContext, event: &LifecycleInput) -> Response<State> {
        use Response::*;

        match event {
            LifecycleInput::ConnectSucceeded => Transition(State::connected()),
            LifecycleInput::ConnectFailed | LifecycleInput::LinkLost => {
                Transition(State::disconnected())
            }
            LifecycleInput::ConnectRequested => {
                context.reject(ErrorKind::AlreadyConnecting);
                Handled
            }
            // No cooperative cancellation of an in-flight connect
            LifecycleInput::DisconnectRequested => {
                context.reject(ErrorKind::NotConnected);
                Handled
            }
            _ => Handled,
        }
    }

    #[state]
    fn connected(context: &mut LifecycleContext, event: &LifecycleInput) -> Response<State> {
        use Response::*;

        match event {
            LifecycleInput::DisconnectRequested => Transition(State::disconnecting()),
            LifecycleInput::LinkLost => Transition(State::disconnected()),
            LifecycleInput::ConnectRequested => {
                context.reject(ErrorKind::AlreadyConnected);
                Handled
            }
            _ => Handled,
        }
    }

    #[state]
    fn disconnecting(context: &mut LifecycleContext, event: &LifecycleInput) -> Response<State> {
        use Response::*;

        match event {
            LifecycleInput::DisconnectCompleted | LifecycleInput::LinkLost => {
                Transition(State::disconnected())
            }
            LifecycleInput::ConnectRequested => {
                context.reject(ErrorKind::AlreadyConnected);
                Handled
            }
            LifecycleInput::DisconnectRequested => {
                context.reject(ErrorKind::NotConnected);
                Handled
            }
            _ => Handled,
        }
    }
}

impl SessionLifecycle {
    fn on_transition(&mut self, source: &State, target: &State) {
        info!(
            "🔄 Scale session: {:?} -> {:?}",
            Self::session_state(source),
            Self::session_state(target)
        );
    }

    fn session_state(state: &State) -> SessionState {
        match state {
            State::Disconnected {} => SessionState::Disconnected,
            State::Connecting {} => SessionState::Connecting,
            State::Connected {} => SessionState::Connected,
            State::Disconnecting {} => SessionState::Disconnecting,
        }
    }
}

/// Owns the machine and its context; the session's only view of it.
pub struct LifecycleController {
    machine: StateMachine<SessionLifecycle>,
    context: LifecycleContext,
}

impl LifecycleController {
    pub fn new() -> Self {
        Self {
            machine: SessionLifecycle::default().state_machine(),
            context: LifecycleContext::default(),
        }
    }

    /// Process an input event and return output events
    pub fn handle_input(&mut self, input: LifecycleInput) -> heapless::Vec<LifecycleOutput, 4> {
        self.context.outputs.clear();

        let previous_state = self.state();
        let _ = self.machine.handle_with_context(&input, &mut self.context);
        let new_state = self.state();

        if previous_state != new_state {
            let _ = self.context.outputs.push(LifecycleOutput::StateChanged {
                from: previous_state,
                to: new_state,
            });
        }

        std::mem::take(&mut self.context.outputs)
    }

    pub fn state(&self) -> SessionState {
        SessionLifecycle::session_state(self.machine.state())
    }
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(outputs: &[LifecycleOutput]) -> Option<ErrorKind> {
        outputs.iter().find_map(|output| match output {
            LifecycleOutput::Rejected(kind) => Some(*kind),
            _ => None,
        })
    }

    #[test]
    fn test_starts_disconnected() {
        assert_eq!(LifecycleController::new().state(), SessionState::Disconnected);
    }

    #[test]
    fn test_full_cycle() {
        let mut lifecycle = LifecycleController::new();

        let outputs = lifecycle.handle_input(LifecycleInput::ConnectRequested);
        assert_eq!(
            outputs.as_slice(),
            &[LifecycleOutput::StateChanged {
                from: SessionState::Disconnected,
                to: SessionState::Connecting
            }]
        );

        lifecycle.handle_input(LifecycleInput::ConnectSucceeded);
        assert_eq!(lifecycle.state(), SessionState::Connected);

        lifecycle.handle_input(LifecycleInput::DisconnectRequested);
        assert_eq!(lifecycle.state(), SessionState::Disconnecting);

        lifecycle.handle_input(LifecycleInput::DisconnectCompleted);
        assert_eq!(lifecycle.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_failed_connect_returns_to_disconnected() {
        let mut lifecycle = LifecycleController::new();
        lifecycle.handle_input(LifecycleInput::ConnectRequested);
        lifecycle.handle_input(LifecycleInput::ConnectFailed);
        assert_eq!(lifecycle.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_reentrant_connect_is_rejected() {
        let mut lifecycle = LifecycleController::new();
        lifecycle.handle_input(LifecycleInput::ConnectRequested);

        let outputs = lifecycle.handle_input(LifecycleInput::ConnectRequested);
        assert_eq!(rejected(&outputs), Some(ErrorKind::AlreadyConnecting));
        assert_eq!(lifecycle.state(), SessionState::Connecting);

        lifecycle.handle_input(LifecycleInput::ConnectSucceeded);
        let outputs = lifecycle.handle_input(LifecycleInput::ConnectRequested);
        assert_eq!(rejected(&outputs), Some(ErrorKind::AlreadyConnected));
        assert_eq!(lifecycle.state(), SessionState::Connected);
    }

    #[test]
    fn test_disconnect_requires_connection() {
        let mut lifecycle = LifecycleController::new();
        let outputs = lifecycle.handle_input(LifecycleInput::DisconnectRequested);
        assert_eq!(rejected(&outputs), Some(ErrorKind::NotConnected));
        assert_eq!(outputs.len(), 1);

        lifecycle.handle_input(LifecycleInput::ConnectRequested);
        let outputs = lifecycle.handle_input(LifecycleInput::DisconnectRequested);
        assert_eq!(rejected(&outputs), Some(ErrorKind::NotConnected));
        assert_eq!(lifecycle.state(), SessionState::Connecting);
    }

    #[test]
    fn test_link_loss_skips_disconnecting() {
        let mut lifecycle = LifecycleController::new();
        lifecycle.handle_input(LifecycleInput::ConnectRequested);
        lifecycle.handle_input(LifecycleInput::ConnectSucceeded);

        let outputs = lifecycle.handle_input(LifecycleInput::LinkLost);
        assert_eq!(
            outputs.as_slice(),
            &[LifecycleOutput::StateChanged {
                from: SessionState::Connected,
                to: SessionState::Disconnected
            }]
        );

        let outputs = lifecycle.handle_input(LifecycleInput::LinkLost);
        assert!(outputs.is_empty());
    }
}
