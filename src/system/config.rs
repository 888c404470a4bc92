//! Connection settings for a scale session.

use crate::ble::{DeviceFilter, GattProfile};
use crate::commands::Command;
use crate::protocol::{COMMAND_CHAR_UUID, SERVICE_UUID, TELEMETRY_CHAR_UUID};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Only accept devices whose advertised name starts with this.
    pub name_prefix: Option<String>,
    pub service_uuid: Uuid,
    pub command_uuid: Uuid,
    pub telemetry_uuid: Uuid,
    /// Sent once, in order, right after a successful connect.
    pub startup_commands: Vec<Command>,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            name_prefix: None,
            service_uuid: SERVICE_UUID,
            command_uuid: COMMAND_CHAR_UUID,
            telemetry_uuid: TELEMETRY_CHAR_UUID,
            startup_commands: Vec::new(),
        }
    }
}

impl ScaleConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn device_filter(&self) -> DeviceFilter {
        DeviceFilter {
            name_prefix: self.name_prefix.clone(),
            service_uuid: Some(self.service_uuid),
        }
    }

    pub fn gatt_profile(&self) -> GattProfile {
        GattProfile {
            service: self.service_uuid,
            command: self.command_uuid,
            telemetry: self.telemetry_uuid,
        }
    }
}
