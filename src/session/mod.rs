//! Scale session: owns one transport and drives the connect, notify and
//! disconnect lifecycle, publishing decoded telemetry to the caller.

pub mod lifecycle;

use crate::ble::{
    BleDevice, CommandChannel, DeviceFilter, GattProfile, LinkEvent, TelemetryChannel, Transport,
};
use crate::error::{ScaleError, TransportError};
use crate::protocol::decode_telemetry;
use crate::system::events::{EventPublisher, SessionEventChannel};
use crate::types::{Reading, SessionState};
use lifecycle::{LifecycleController, LifecycleInput, LifecycleOutput};
use log::{debug, error, info, warn};
use std::sync::Arc;

// Everything that only exists while Connected
struct ActiveLink<T: Transport> {
    link: T::Link,
    commands: T::Commands,
    telemetry: T::Telemetry,
}

pub struct ScaleSession<T: Transport> {
    transport: T,
    profile: GattProfile,
    lifecycle: LifecycleController,
    active: Option<ActiveLink<T>>,
    events: EventPublisher,
    device_name: Option<String>,
    last_reading: Option<Reading>,
}

impl<T: Transport> ScaleSession<T> {
    pub fn new(transport: T, events: Arc<SessionEventChannel>) -> Self {
        Self::with_profile(transport, GattProfile::default(), events)
    }

    pub fn with_profile(
        transport: T,
        profile: GattProfile,
        events: Arc<SessionEventChannel>,
    ) -> Self {
        Self {
            transport,
            profile,
            lifecycle: LifecycleController::new(),
            active: None,
            events: EventPublisher::new(events),
            device_name: None,
            last_reading: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    /// Most recent successfully decoded reading, kept across reconnects.
    pub fn last_reading(&self) -> Option<&Reading> {
        self.last_reading.as_ref()
    }

    /// Discover, connect, open both channels and subscribe to telemetry.
    ///
    /// Only valid while disconnected. Any failure tears down whatever was
    /// opened, leaves the session disconnected and is reported once as an
    /// error event.
    pub async fn connect(&mut self, filter: &DeviceFilter) -> Result<(), ScaleError> {
        self.request(LifecycleInput::ConnectRequested)?;
        info!("🔗 Connecting to scale ({:?})", filter);

        match self.establish(filter).await {
            Ok((device_name, active)) => {
                self.active = Some(active);
                self.device_name = device_name.clone();
                self.lifecycle.handle_input(LifecycleInput::ConnectSucceeded);
                info!("✅ Connected to {}", device_name.as_deref().unwrap_or("scale"));
                self.events.connected(device_name);
                Ok(())
            }
            Err(e) => {
                error!("Scale connection failed: {}", e);
                self.lifecycle.handle_input(LifecycleInput::ConnectFailed);
                self.events.error(e.kind(), e.to_string());
                Err(ScaleError::from(e))
            }
        }
    }

    async fn establish(
        &mut self,
        filter: &DeviceFilter,
    ) -> Result<(Option<String>, ActiveLink<T>), TransportError> {
        let device = self.transport.discover(filter).await?;
        let device_name = device.name().map(str::to_string);
        debug!("Discovered {:?}", device_name);

        let link = self.transport.connect(&device).await?;

        let mut commands = match self.transport.open_command_channel(&link, &self.profile).await {
            Ok(commands) => commands,
            Err(e) => {
                self.release(link).await;
                return Err(e);
            }
        };

        let mut telemetry = match self
            .transport
            .open_telemetry_channel(&link, &self.profile)
            .await
        {
            Ok(telemetry) => telemetry,
            Err(e) => {
                commands.close().await;
                self.release(link).await;
                return Err(e);
            }
        };

        if let Err(e) = telemetry.subscribe().await {
            telemetry.close().await;
            commands.close().await;
            self.release(link).await;
            return Err(e);
        }

        Ok((
            device_name,
            ActiveLink {
                link,
                commands,
                telemetry,
            },
        ))
    }

    async fn release(&mut self, link: T::Link) {
        if let Err(e) = self.transport.disconnect(link).await {
            warn!("Failed to release link after partial connect: {}", e);
        }
    }

    /// Explicit disconnect; only valid while connected.
    pub async fn disconnect(&mut self) -> Result<(), ScaleError> {
        self.request(LifecycleInput::DisconnectRequested)?;

        if let Some(mut active) = self.active.take() {
            active.telemetry.close().await;
            active.commands.close().await;
            if let Err(e) = self.transport.disconnect(active.link).await {
                // Continue with cleanup even if disconnect fails
                warn!("Failed to disconnect cleanly: {}", e);
            }
        }

        self.lifecycle.handle_input(LifecycleInput::DisconnectCompleted);
        self.device_name = None;
        info!("📱 Scale disconnected");
        self.events.disconnected();
        Ok(())
    }

    /// Writes one command frame. A failed write is reported but does not
    /// change the connection state.
    pub async fn write_command(&mut self, frame: &[u8]) -> Result<(), ScaleError> {
        if !self.is_connected() {
            return Err(ScaleError::NotConnected);
        }
        let Some(active) = self.active.as_mut() else {
            return Err(ScaleError::NotConnected);
        };

        if let Err(e) = active.commands.write(frame).await {
            error!("Command write failed: {}", e);
            self.events.error(e.kind(), e.to_string());
            return Err(ScaleError::from(e));
        }

        debug!("Command written: {:02X?}", frame);
        Ok(())
    }

    /// Waits for the next telemetry notification or link loss and handles it.
    pub async fn next_link_event(&mut self) -> Result<(), ScaleError> {
        let Some(active) = self.active.as_mut() else {
            return Err(ScaleError::NotConnected);
        };

        let event = active.telemetry.next_event().await;
        self.handle_link_event(event);
        Ok(())
    }

    /// Processes one event from the transport, synchronously and in order.
    pub fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Notification(bytes) => self.on_notification(bytes),
            LinkEvent::Disconnected => self.on_link_lost(),
        }
    }

    fn on_notification(&mut self, bytes: Vec<u8>) {
        if !self.is_connected() {
            debug!("Ignoring {} byte notification while {}", bytes.len(), self.state().as_str());
            return;
        }

        let reading = decode_telemetry(&bytes);
        self.events.raw(bytes);

        if let Some(reading) = reading {
            debug!(
                "Weight: {:.2}g, flow: {:.2}g/s, battery: {}%",
                reading.weight_g, reading.flow_rate_g_per_s, reading.battery_percent
            );
            self.last_reading = Some(reading);
            self.events.data(reading);
        }
    }

    fn on_link_lost(&mut self) {
        if !self.is_connected() {
            debug!("Ignoring link loss while {}", self.state().as_str());
            return;
        }

        warn!("BLE connection lost");
        // The remote end is gone; drop channels without talking to it
        self.active = None;
        self.device_name = None;
        self.lifecycle.handle_input(LifecycleInput::LinkLost);
        self.events.disconnected();
    }

    fn request(&mut self, input: LifecycleInput) -> Result<(), ScaleError> {
        let outputs = self.lifecycle.handle_input(input);
        for output in outputs {
            if let LifecycleOutput::Rejected(kind) = output {
                debug!("{:?} rejected while {}: {:?}", input, self.state().as_str(), kind);
                return Err(ScaleError::from(kind));
            }
        }
        Ok(())
    }
}
