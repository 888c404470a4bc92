//! Transport boundary between the scale session and a BLE stack.
//!
//! A real radio stack and [`SimulatedTransport`](crate::sim::SimulatedTransport)
//! both implement [`Transport`]; the session never knows which one it owns.

use crate::error::TransportError;
use crate::protocol::{COMMAND_CHAR_UUID, SERVICE_UUID, TELEMETRY_CHAR_UUID};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Criteria used to pick the scale during discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFilter {
    pub name_prefix: Option<String>,
    pub service_uuid: Option<Uuid>,
}

impl DeviceFilter {
    /// Matches any device advertising the Bookoo scale service.
    pub fn bookoo() -> Self {
        Self {
            name_prefix: None,
            service_uuid: Some(SERVICE_UUID),
        }
    }

    pub fn matches(&self, name: Option<&str>, services: &[Uuid]) -> bool {
        if let Some(ref prefix) = self.name_prefix {
            match name {
                Some(name) if name.starts_with(prefix.as_str()) => {}
                _ => return false,
            }
        }

        match self.service_uuid {
            Some(service) => services.contains(&service),
            None => true,
        }
    }
}

/// GATT identifiers used to select the scale's channels once connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GattProfile {
    pub service: Uuid,
    pub command: Uuid,
    pub telemetry: Uuid,
}

impl Default for GattProfile {
    fn default() -> Self {
        Self {
            service: SERVICE_UUID,
            command: COMMAND_CHAR_UUID,
            telemetry: TELEMETRY_CHAR_UUID,
        }
    }
}

/// Something delivered by the telemetry channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Raw notification payload, not yet validated.
    Notification(Vec<u8>),
    /// The remote end dropped the link without being asked to.
    Disconnected,
}

pub trait BleDevice {
    fn name(&self) -> Option<&str>;
}

/// Writable command characteristic.
#[allow(async_fn_in_trait)]
pub trait CommandChannel {
    async fn write(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    async fn close(&mut self);
}

/// Notify characteristic plus the link's out-of-band disconnect signal.
#[allow(async_fn_in_trait)]
pub trait TelemetryChannel {
    /// Enables notifications on the characteristic.
    async fn subscribe(&mut self) -> Result<(), TransportError>;

    /// Waits for the next notification or link loss, in arrival order.
    async fn next_event(&mut self) -> LinkEvent;

    async fn close(&mut self);
}

// Sessions run on a single-threaded executor, so no Send bound is required
#[allow(async_fn_in_trait)]
pub trait Transport {
    type Device: BleDevice;
    type Link;
    type Commands: CommandChannel;
    type Telemetry: TelemetryChannel;

    async fn discover(&mut self, filter: &DeviceFilter) -> Result<Self::Device, TransportError>;

    async fn connect(&mut self, device: &Self::Device) -> Result<Self::Link, TransportError>;

    async fn open_command_channel(
        &mut self,
        link: &Self::Link,
        profile: &GattProfile,
    ) -> Result<Self::Commands, TransportError>;

    async fn open_telemetry_channel(
        &mut self,
        link: &Self::Link,
        profile: &GattProfile,
    ) -> Result<Self::Telemetry, TransportError>;

    async fn disconnect(&mut self, link: Self::Link) -> Result<(), TransportError>;
}
