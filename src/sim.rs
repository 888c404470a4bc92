//! In-memory scale used by tests and the demo binary.
//!
//! [`SimulatedTransport`] is handed to a session; the paired [`SimulatedScale`]
//! handle stays with the caller to inject telemetry, drop the link, script
//! failures and inspect what the session wrote.

use crate::ble::{
    BleDevice, CommandChannel, DeviceFilter, GattProfile, LinkEvent, TelemetryChannel, Transport,
};
use crate::error::TransportError;
use crate::protocol::{checksum, PRODUCT_ID, SERVICE_UUID, TELEMETRY_FRAME_TYPE};
use crate::types::{Reading, TELEMETRY_FRAME_LEN};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

pub type LinkEventChannel = Channel<CriticalSectionRawMutex, LinkEvent, 32>;

/// Transport operation that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    Discover,
    Connect,
    CommandChannel,
    TelemetryChannel,
    Subscribe,
    Write,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedDevice {
    pub name: Option<String>,
    pub services: Vec<Uuid>,
}

impl SimulatedDevice {
    pub fn new(name: &str, services: Vec<Uuid>) -> Self {
        Self {
            name: Some(name.to_string()),
            services,
        }
    }

    pub fn bookoo(name: &str) -> Self {
        Self::new(name, vec![SERVICE_UUID])
    }
}

impl BleDevice for SimulatedDevice {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[derive(Debug, Default)]
struct SimState {
    failures: HashMap<FailurePoint, TransportError>,
    stall_discovery: bool,
    linked: bool,
    open_commands: usize,
    open_telemetry: usize,
    written: Vec<Vec<u8>>,
    disconnect_calls: usize,
}

struct Shared {
    state: Mutex<SimState>,
    events: LinkEventChannel,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, point: FailurePoint) -> Result<(), TransportError> {
        match self.lock().failures.get(&point) {
            Some(e) => {
                debug!("Simulated {:?} failure: {}", point, e);
                Err(e.clone())
            }
            None => Ok(()),
        }
    }
}

/// Test-side handle onto a [`SimulatedTransport`].
#[derive(Clone)]
pub struct SimulatedScale {
    shared: Arc<Shared>,
}

impl SimulatedScale {
    /// Queues a notification; false when the link event queue is full.
    pub fn push_frame(&self, bytes: &[u8]) -> bool {
        self.shared
            .events
            .try_send(LinkEvent::Notification(bytes.to_vec()))
            .is_ok()
    }

    pub fn push_reading(&self, reading: &Reading) -> bool {
        self.push_frame(&telemetry_frame(reading))
    }

    /// Simulates the scale walking out of range or powering off.
    pub fn drop_link(&self) {
        self.shared.lock().linked = false;
        if self.shared.events.try_send(LinkEvent::Disconnected).is_err() {
            debug!("Link event queue full - disconnect signal not queued");
        }
    }

    /// Makes every later call at `point` fail with `error` until cleared.
    pub fn fail(&self, point: FailurePoint, error: TransportError) {
        self.shared.lock().failures.insert(point, error);
    }

    pub fn clear_failures(&self) {
        let mut state = self.shared.lock();
        state.failures.clear();
        state.stall_discovery = false;
    }

    /// Discovery never resolves, like a device chooser nobody answers.
    pub fn stall_discovery(&self) {
        self.shared.lock().stall_discovery = true;
    }

    pub fn written_frames(&self) -> Vec<Vec<u8>> {
        self.shared.lock().written.clone()
    }

    /// Currently open (command, telemetry) channels.
    pub fn open_channels(&self) -> (usize, usize) {
        let state = self.shared.lock();
        (state.open_commands, state.open_telemetry)
    }

    pub fn is_linked(&self) -> bool {
        self.shared.lock().linked
    }

    pub fn disconnect_calls(&self) -> usize {
        self.shared.lock().disconnect_calls
    }
}

pub struct SimulatedTransport {
    devices: Vec<SimulatedDevice>,
    profile: GattProfile,
    shared: Arc<Shared>,
}

impl SimulatedTransport {
    pub fn new(devices: Vec<SimulatedDevice>) -> (Self, SimulatedScale) {
        let shared = Arc::new(Shared {
            state: Mutex::new(SimState::default()),
            events: Channel::new(),
        });
        let transport = Self {
            devices,
            profile: GattProfile::default(),
            shared: Arc::clone(&shared),
        };
        (transport, SimulatedScale { shared })
    }

    /// A single Bookoo scale in range.
    pub fn with_bookoo() -> (Self, SimulatedScale) {
        Self::new(vec![SimulatedDevice::bookoo("BOOKOO_SC 2F1A")])
    }
}

pub struct SimulatedLink {
    device_name: Option<String>,
}

pub struct SimulatedCommands {
    shared: Arc<Shared>,
    open: bool,
}

impl SimulatedCommands {
    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.shared.lock().open_commands -= 1;
        }
    }
}

impl CommandChannel for SimulatedCommands {
    async fn write(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::WriteFailed("channel closed".to_string()));
        }
        self.shared.check(FailurePoint::Write)?;
        self.shared.lock().written.push(frame.to_vec());
        Ok(())
    }

    async fn close(&mut self) {
        self.release();
    }
}

impl Drop for SimulatedCommands {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct SimulatedTelemetry {
    shared: Arc<Shared>,
    open: bool,
}

impl SimulatedTelemetry {
    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.shared.lock().open_telemetry -= 1;
        }
    }
}

impl TelemetryChannel for SimulatedTelemetry {
    async fn subscribe(&mut self) -> Result<(), TransportError> {
        self.shared.check(FailurePoint::Subscribe)
    }

    async fn next_event(&mut self) -> LinkEvent {
        self.shared.events.receive().await
    }

    async fn close(&mut self) {
        self.release();
    }
}

impl Drop for SimulatedTelemetry {
    fn drop(&mut self) {
        self.release();
    }
}

impl Transport for SimulatedTransport {
    type Device = SimulatedDevice;
    type Link = SimulatedLink;
    type Commands = SimulatedCommands;
    type Telemetry = SimulatedTelemetry;

    async fn discover(&mut self, filter: &DeviceFilter) -> Result<SimulatedDevice, TransportError> {
        if self.shared.lock().stall_discovery {
            core::future::pending::<()>().await;
        }
        self.shared.check(FailurePoint::Discover)?;

        self.devices
            .iter()
            .find(|device| filter.matches(device.name(), &device.services))
            .cloned()
            .ok_or_else(|| TransportError::ConnectionFailed("no device matched filter".to_string()))
    }

    async fn connect(&mut self, device: &SimulatedDevice) -> Result<SimulatedLink, TransportError> {
        self.shared.check(FailurePoint::Connect)?;
        self.shared.lock().linked = true;
        info!("Simulated link up: {:?}", device.name);
        Ok(SimulatedLink {
            device_name: device.name.clone(),
        })
    }

    async fn open_command_channel(
        &mut self,
        _link: &SimulatedLink,
        profile: &GattProfile,
    ) -> Result<SimulatedCommands, TransportError> {
        self.shared.check(FailurePoint::CommandChannel)?;
        if profile.service != self.profile.service || profile.command != self.profile.command {
            return Err(TransportError::ConnectionFailed(format!(
                "command characteristic {} not found",
                profile.command
            )));
        }

        self.shared.lock().open_commands += 1;
        Ok(SimulatedCommands {
            shared: Arc::clone(&self.shared),
            open: true,
        })
    }

    async fn open_telemetry_channel(
        &mut self,
        _link: &SimulatedLink,
        profile: &GattProfile,
    ) -> Result<SimulatedTelemetry, TransportError> {
        self.shared.check(FailurePoint::TelemetryChannel)?;
        if profile.service != self.profile.service || profile.telemetry != self.profile.telemetry {
            return Err(TransportError::ConnectionFailed(format!(
                "telemetry characteristic {} not found",
                profile.telemetry
            )));
        }

        // Nothing queued before this link belongs to it
        self.shared.events.clear();
        self.shared.lock().open_telemetry += 1;
        Ok(SimulatedTelemetry {
            shared: Arc::clone(&self.shared),
            open: true,
        })
    }

    async fn disconnect(&mut self, link: SimulatedLink) -> Result<(), TransportError> {
        {
            let mut state = self.shared.lock();
            state.disconnect_calls += 1;
            state.linked = false;
        }
        info!("Simulated link down: {:?}", link.device_name);
        self.shared.check(FailurePoint::Disconnect)
    }
}

/// Encodes a reading the way the scale firmware would send it.
pub fn telemetry_frame(reading: &Reading) -> [u8; TELEMETRY_FRAME_LEN] {
    let weight_raw = ((reading.weight_g.abs() * 100.0).round() as u32).min(0x00FF_FFFF);
    let flow_raw = (reading.flow_rate_g_per_s.abs() * 100.0).round() as u16;

    let mut frame = [0u8; TELEMETRY_FRAME_LEN];
    frame[0] = PRODUCT_ID;
    frame[1] = TELEMETRY_FRAME_TYPE;
    frame[2..5].copy_from_slice(&(reading.elapsed_ms & 0x00FF_FFFF).to_be_bytes()[1..]);
    frame[5] = reading.weight_unit;
    frame[6] = (reading.weight_g < 0.0) as u8;
    frame[7..10].copy_from_slice(&weight_raw.to_be_bytes()[1..]);
    frame[10] = (reading.flow_rate_g_per_s < 0.0) as u8;
    frame[11..13].copy_from_slice(&flow_raw.to_be_bytes());
    frame[13] = reading.battery_percent;
    frame[14..16].copy_from_slice(&reading.standby_minutes.to_be_bytes());
    frame[16] = reading.buzzer_level;
    frame[17] = reading.flow_smoothing as u8;
    frame[19] = checksum(&frame);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode_telemetry;
    use embassy_futures::block_on;

    #[test]
    fn test_frame_decodes_back() {
        let reading = Reading {
            elapsed_ms: 27_300,
            weight_g: -3.25,
            flow_rate_g_per_s: 2.1,
            battery_percent: 64,
            standby_minutes: 15,
            buzzer_level: 4,
            flow_smoothing: true,
            weight_unit: 0,
            weight_sign: 1,
            flow_sign: 0,
        };
        assert_eq!(decode_telemetry(&telemetry_frame(&reading)), Some(reading));
    }

    #[test]
    fn test_scripted_failure_until_cleared() {
        let (mut transport, scale) = SimulatedTransport::with_bookoo();
        scale.fail(FailurePoint::Discover, TransportError::NotAvailable("adapter off".to_string()));

        let result = block_on(transport.discover(&DeviceFilter::bookoo()));
        assert_eq!(result.unwrap_err(), TransportError::NotAvailable("adapter off".to_string()));

        scale.clear_failures();
        let device = block_on(transport.discover(&DeviceFilter::bookoo())).unwrap();
        assert_eq!(device.name(), Some("BOOKOO_SC 2F1A"));
    }

    #[test]
    fn test_unknown_characteristic() {
        let (mut transport, scale) = SimulatedTransport::with_bookoo();
        let profile = GattProfile {
            telemetry: Uuid::from_u128(0x0000_FF99_0000_1000_8000_00805F9B34FB),
            ..GattProfile::default()
        };

        block_on(async {
            let device = transport.discover(&DeviceFilter::bookoo()).await.unwrap();
            let link = transport.connect(&device).await.unwrap();
            assert!(transport.open_telemetry_channel(&link, &profile).await.is_err());
        });
        assert_eq!(scale.open_channels(), (0, 0));
    }

    #[test]
    fn test_dropped_channels_are_released() {
        let (mut transport, scale) = SimulatedTransport::with_bookoo();
        let profile = GattProfile::default();

        block_on(async {
            let device = transport.discover(&DeviceFilter::bookoo()).await.unwrap();
            let link = transport.connect(&device).await.unwrap();
            let commands = transport.open_command_channel(&link, &profile).await.unwrap();
            let telemetry = transport.open_telemetry_channel(&link, &profile).await.unwrap();
            assert_eq!(scale.open_channels(), (1, 1));
            drop(commands);
            drop(telemetry);
        });
        assert_eq!(scale.open_channels(), (0, 0));
    }
}
