use crate::types::{Reading, COMMAND_FRAME_LEN, TELEMETRY_FRAME_LEN};
use log::debug;
use uuid::Uuid;

// Bookoo scales advertise 16-bit ids; these are the Bluetooth base expansions.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_0FFE_0000_1000_8000_00805F9B34FB);
pub const TELEMETRY_CHAR_UUID: Uuid = Uuid::from_u128(0x0000_FF11_0000_1000_8000_00805F9B34FB);
pub const COMMAND_CHAR_UUID: Uuid = Uuid::from_u128(0x0000_FF12_0000_1000_8000_00805F9B34FB);

pub const PRODUCT_ID: u8 = 0x03;
pub const TELEMETRY_FRAME_TYPE: u8 = 0x0B;
pub const COMMAND_GROUP: u8 = 0x0A;

pub const OPCODE_TARE: u8 = 0x01;
pub const OPCODE_BEEP: u8 = 0x02;
pub const OPCODE_AUTO_OFF: u8 = 0x03;
pub const OPCODE_START_TIMER: u8 = 0x04;
pub const OPCODE_STOP_TIMER: u8 = 0x05;
pub const OPCODE_RESET_TIMER: u8 = 0x06;
pub const OPCODE_TARE_AND_START: u8 = 0x07;
pub const OPCODE_FLOW_SMOOTHING: u8 = 0x08;

// Literal frames as the scale firmware expects them. Timer and tare+start
// checksums do not follow the XOR rule; keep them verbatim.
pub const TARE_COMMAND: [u8; COMMAND_FRAME_LEN] = [0x03, 0x0A, 0x01, 0x00, 0x00, 0x08];
pub const TARE_AND_START_COMMAND: [u8; COMMAND_FRAME_LEN] = [0x03, 0x0A, 0x07, 0x00, 0x00, 0x00];
pub const START_TIMER_COMMAND: [u8; COMMAND_FRAME_LEN] = [0x03, 0x0A, 0x04, 0x00, 0x00, 0x0A];
pub const STOP_TIMER_COMMAND: [u8; COMMAND_FRAME_LEN] = [0x03, 0x0A, 0x05, 0x00, 0x00, 0x0D];
pub const RESET_TIMER_COMMAND: [u8; COMMAND_FRAME_LEN] = [0x03, 0x0A, 0x06, 0x00, 0x00, 0x0C];

/// XOR of every byte except the last one (the checksum slot).
pub fn checksum(data: &[u8]) -> u8 {
    match data.split_last() {
        Some((_, payload)) => payload.iter().fold(0, |acc, &byte| acc ^ byte),
        None => 0,
    }
}

pub fn verify_checksum(data: &[u8]) -> bool {
    match data.last() {
        Some(&expected) => checksum(data) == expected,
        None => false,
    }
}

fn be24(b: &[u8]) -> u32 {
    (b[0] as u32) << 16 | (b[1] as u32) << 8 | b[2] as u32
}

fn signed_hundredths(sign: u8, magnitude: u32) -> f32 {
    let raw = magnitude as i32;
    let value = if sign == 1 { -raw } else { raw };
    value as f32 / 100.0
}

/// Decodes a 20-byte telemetry notification.
///
/// Returns `None` for anything that is not a well formed frame: wrong length,
/// checksum mismatch, or an unexpected product/type header. Malformed frames
/// are routine radio noise, so they are only logged at debug level.
pub fn decode_telemetry(data: &[u8]) -> Option<Reading> {
    if data.len() != TELEMETRY_FRAME_LEN {
        debug!(
            "Dropping frame: expected {} bytes, got {}",
            TELEMETRY_FRAME_LEN,
            data.len()
        );
        return None;
    }

    if !verify_checksum(data) {
        debug!("Dropping frame: checksum mismatch {:02X?}", data);
        return None;
    }

    if data[0] != PRODUCT_ID || data[1] != TELEMETRY_FRAME_TYPE {
        debug!(
            "Dropping frame: unexpected header [{:02X}, {:02X}]",
            data[0], data[1]
        );
        return None;
    }

    let weight_sign = data[6];
    let flow_sign = data[10];
    let raw_flow = u16::from_be_bytes([data[11], data[12]]) as u32;

    Some(Reading {
        elapsed_ms: be24(&data[2..5]),
        weight_unit: data[5],
        weight_sign,
        weight_g: signed_hundredths(weight_sign, be24(&data[7..10])),
        flow_sign,
        flow_rate_g_per_s: signed_hundredths(flow_sign, raw_flow),
        battery_percent: data[13],
        standby_minutes: u16::from_be_bytes([data[14], data[15]]),
        buzzer_level: data[16],
        flow_smoothing: data[17] != 0,
    })
}

/// Builds a command frame with a computed XOR checksum.
///
/// The argument occupies a single byte; callers holding wider values
/// truncate them (`as u8`) before calling, the codec does not range check.
pub fn encode_command(opcode: u8, argument: u8) -> [u8; COMMAND_FRAME_LEN] {
    let mut frame = [PRODUCT_ID, COMMAND_GROUP, opcode, argument, 0x00, 0x00];
    frame[COMMAND_FRAME_LEN - 1] = checksum(&frame);
    frame
}
