use core::time::Duration;
use serde::{Deserialize, Serialize};

/// One decoded telemetry frame from the scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub elapsed_ms: u32,
    pub weight_g: f32,
    pub flow_rate_g_per_s: f32,
    pub battery_percent: u8,
    pub standby_minutes: u16,
    pub buzzer_level: u8,
    pub flow_smoothing: bool,
    pub weight_unit: u8,
    pub weight_sign: u8,
    pub flow_sign: u8,
}

impl Reading {
    /// Scale timer value.
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms as u64)
    }
}

/// Connection lifecycle state of a [`ScaleSession`](crate::session::ScaleSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Disconnecting => "disconnecting",
        }
    }
}

pub const TELEMETRY_FRAME_LEN: usize = 20;
pub const COMMAND_FRAME_LEN: usize = 6;
