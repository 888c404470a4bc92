pub mod ble;
pub mod brew;
pub mod commands;
pub mod error;
pub mod protocol;
pub mod session;
pub mod sim;
pub mod system;
pub mod types;

pub use ble::{DeviceFilter, GattProfile, LinkEvent, Transport};
pub use commands::Command;
pub use error::{ErrorKind, ScaleError, TransportError};
pub use session::ScaleSession;
pub use system::{ScaleConfig, SessionEvent, SessionEventChannel};
pub use types::*;
