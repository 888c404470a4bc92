//! Named scale commands and the session methods that send them.

use crate::ble::Transport;
use crate::error::ScaleError;
use crate::protocol::{
    encode_command, OPCODE_AUTO_OFF, OPCODE_BEEP, OPCODE_FLOW_SMOOTHING, RESET_TIMER_COMMAND,
    START_TIMER_COMMAND, STOP_TIMER_COMMAND, TARE_AND_START_COMMAND, TARE_COMMAND,
};
use crate::session::ScaleSession;
use crate::types::COMMAND_FRAME_LEN;
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Tare,
    TareAndStart,
    StartTimer,
    StopTimer,
    ResetTimer,
    SetBeep { level: u8 },
    SetAutoOff { minutes: u8 },
    SetFlowSmoothing { enabled: bool },
}

impl Command {
    pub fn frame(&self) -> [u8; COMMAND_FRAME_LEN] {
        match *self {
            Command::Tare => TARE_COMMAND,
            Command::TareAndStart => TARE_AND_START_COMMAND,
            Command::StartTimer => START_TIMER_COMMAND,
            Command::StopTimer => STOP_TIMER_COMMAND,
            Command::ResetTimer => RESET_TIMER_COMMAND,
            Command::SetBeep { level } => encode_command(OPCODE_BEEP, level),
            Command::SetAutoOff { minutes } => encode_command(OPCODE_AUTO_OFF, minutes),
            Command::SetFlowSmoothing { enabled } => {
                encode_command(OPCODE_FLOW_SMOOTHING, enabled as u8)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Tare => "tare",
            Command::TareAndStart => "tare and start",
            Command::StartTimer => "start timer",
            Command::StopTimer => "stop timer",
            Command::ResetTimer => "reset timer",
            Command::SetBeep { .. } => "set beep",
            Command::SetAutoOff { .. } => "set auto-off",
            Command::SetFlowSmoothing { .. } => "set flow smoothing",
        }
    }
}

// One write per call; the scale has no acknowledgement to retry on.
impl<T: Transport> ScaleSession<T> {
    pub async fn send(&mut self, command: Command) -> Result<(), ScaleError> {
        let frame = command.frame();
        info!("Sending {} command: {:02X?}", command.name(), frame);
        self.write_command(&frame).await
    }

    pub async fn tare(&mut self) -> Result<(), ScaleError> {
        self.send(Command::Tare).await
    }

    pub async fn tare_and_start(&mut self) -> Result<(), ScaleError> {
        self.send(Command::TareAndStart).await
    }

    pub async fn start_timer(&mut self) -> Result<(), ScaleError> {
        self.send(Command::StartTimer).await
    }

    pub async fn stop_timer(&mut self) -> Result<(), ScaleError> {
        self.send(Command::StopTimer).await
    }

    pub async fn reset_timer(&mut self) -> Result<(), ScaleError> {
        self.send(Command::ResetTimer).await
    }

    pub async fn set_beep(&mut self, level: u8) -> Result<(), ScaleError> {
        self.send(Command::SetBeep { level }).await
    }

    pub async fn set_auto_off(&mut self, minutes: u8) -> Result<(), ScaleError> {
        self.send(Command::SetAutoOff { minutes }).await
    }

    pub async fn set_flow_smoothing(&mut self, enabled: bool) -> Result<(), ScaleError> {
        self.send(Command::SetFlowSmoothing { enabled }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::DeviceFilter;
    use crate::sim::SimulatedTransport;
    use crate::system::events::{drain, SessionEventChannel};
    use embassy_futures::block_on;
    use std::sync::Arc;

    #[test]
    fn test_fixed_frames() {
        assert_eq!(Command::Tare.frame(), [0x03, 0x0A, 0x01, 0x00, 0x00, 0x08]);
        assert_eq!(Command::TareAndStart.frame(), [0x03, 0x0A, 0x07, 0x00, 0x00, 0x00]);
        assert_eq!(Command::StartTimer.frame(), [0x03, 0x0A, 0x04, 0x00, 0x00, 0x0A]);
        assert_eq!(Command::StopTimer.frame(), [0x03, 0x0A, 0x05, 0x00, 0x00, 0x0D]);
        assert_eq!(Command::ResetTimer.frame(), [0x03, 0x0A, 0x06, 0x00, 0x00, 0x0C]);
    }

    #[test]
    fn test_computed_frames() {
        assert_eq!(
            Command::SetBeep { level: 3 }.frame(),
            [0x03, 0x0A, 0x02, 0x03, 0x00, 0x08]
        );
        assert_eq!(
            Command::SetAutoOff { minutes: 30 }.frame(),
            [0x03, 0x0A, 0x03, 0x1E, 0x00, 0x03 ^ 0x0A ^ 0x03 ^ 0x1E]
        );
        assert_eq!(
            Command::SetFlowSmoothing { enabled: true }.frame(),
            [0x03, 0x0A, 0x08, 0x01, 0x00, 0x00]
        );
        assert_eq!(
            Command::SetFlowSmoothing { enabled: false }.frame(),
            [0x03, 0x0A, 0x08, 0x00, 0x00, 0x01]
        );
    }

    #[test]
    fn test_command_from_json() {
        let command: Command = serde_json::from_str(r#"{"type":"set_beep","level":4}"#).unwrap();
        assert_eq!(command, Command::SetBeep { level: 4 });

        let command: Command = serde_json::from_str(r#"{"type":"tare_and_start"}"#).unwrap();
        assert_eq!(command, Command::TareAndStart);
    }

    #[test]
    fn test_commands_reach_the_wire() {
        let (transport, scale) = SimulatedTransport::with_bookoo();
        let channel = Arc::new(SessionEventChannel::new());
        let mut session = ScaleSession::new(transport, Arc::clone(&channel));

        block_on(async {
            session.connect(&DeviceFilter::bookoo()).await.unwrap();
            session.tare().await.unwrap();
            session.start_timer().await.unwrap();
            session.set_beep(2).await.unwrap();
        });

        assert_eq!(
            scale.written_frames(),
            vec![
                TARE_COMMAND.to_vec(),
                START_TIMER_COMMAND.to_vec(),
                encode_command(OPCODE_BEEP, 2).to_vec(),
            ]
        );
        drain(&channel);
    }

    #[test]
    fn test_command_without_connection() {
        let (transport, scale) = SimulatedTransport::with_bookoo();
        let channel = Arc::new(SessionEventChannel::new());
        let mut session = ScaleSession::new(transport, Arc::clone(&channel));

        let result = block_on(session.reset_timer());
        assert_eq!(result, Err(ScaleError::NotConnected));
        assert!(scale.written_frames().is_empty());
        assert!(drain(&channel).is_empty());
    }
}
