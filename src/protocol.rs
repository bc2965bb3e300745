//! ThinkGear wire-format constants, code table, and frame encoding helpers.
//!
//! A ThinkGear packet on the serial link looks like:
//!
//! ```text
//! [0xAA] [0xAA] [PLENGTH] [PAYLOAD … PLENGTH bytes] [CHKSUM]
//! ```
//!
//! `CHKSUM` is the one's complement of the low byte of the payload sum.
//! The payload is a concatenation of data rows:
//!
//! ```text
//! [0x55 …]  zero or more extended-code-level bytes
//! [CODE]
//! [VLENGTH] only present when CODE >= 0x80
//! [VALUE …] 1 byte for CODE < 0x80, VLENGTH bytes otherwise
//! ```

// ── Framing ──────────────────────────────────────────────────────────────────

/// Synchronisation byte.  Two consecutive sync bytes open a packet.
pub const SYNC: u8 = 0xAA;

/// Extended-code-level prefix byte inside a payload.
pub const EXCODE: u8 = 0x55;

/// Largest payload length the protocol allows.
///
/// A length byte of `0xAA` (170) is read as another sync byte; anything
/// above 170 is corruption.
pub const MAX_PAYLOAD_LENGTH: usize = 169;

/// Codes at or above this value carry an explicit length byte.
pub const MULTI_BYTE_CODE_THRESHOLD: u8 = 0x80;

// ── Data codes (extended code level 0) ────────────────────────────────────────

/// Battery / device power level, 1 byte.
pub const CODE_BATTERY: u8 = 0x01;
/// Poor-signal quality, 1 byte.  0 = good contact, 200 = off-head.
pub const CODE_POOR_SIGNAL: u8 = 0x02;
/// Heart rate, 1 byte.
pub const CODE_HEART_RATE: u8 = 0x03;
/// eSense attention meter, 1 byte (0–100).
pub const CODE_ATTENTION: u8 = 0x04;
/// eSense meditation meter, 1 byte (0–100).
pub const CODE_MEDITATION: u8 = 0x05;
/// Blink strength, 1 byte.
pub const CODE_BLINK_STRENGTH: u8 = 0x16;
/// Raw EEG sample, 2 bytes big-endian signed.
pub const CODE_RAW_SIGNAL: u8 = 0x80;
/// ASIC EEG band powers, 8 × 3-byte big-endian unsigned.
pub const CODE_ASIC_EEG_POWER: u8 = 0x83;

/// Dongle reports the headset is connected.
pub const CODE_HEADSET_CONNECTED: u8 = 0xD0;
/// Dongle could not find the headset.
pub const CODE_HEADSET_NOT_FOUND: u8 = 0xD1;
/// Dongle is in standby and waits for an autoconnect command.
pub const CODE_STANDBY: u8 = 0xD4;

/// Byte length of a [`CODE_ASIC_EEG_POWER`] value.
pub const ASIC_EEG_POWER_LENGTH: usize = 24;

// ── Host → dongle commands ───────────────────────────────────────────────────

/// Ask the dongle to disconnect from the headset.
pub const COMMAND_DISCONNECT: u8 = 0xC1;
/// Ask the dongle to auto-connect to any headset in range.
pub const COMMAND_AUTOCONNECT: u8 = 0xC2;

/// Message carried by the error event for [`CODE_HEADSET_NOT_FOUND`].
pub const HEADSET_NOT_FOUND_MESSAGE: &str = "Headset not found";

// ── Serial defaults ───────────────────────────────────────────────────────────

/// Baud rate of the MindWave / MindSet serial link.
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// Platform default device path of the headset's serial port.
#[cfg(target_os = "linux")]
pub const DEFAULT_PORT: &str = "/dev/rfcomm0";
#[cfg(target_os = "macos")]
pub const DEFAULT_PORT: &str = "/dev/tty.MindWave";
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub const DEFAULT_PORT: &str = "COM5";

/// Bytes read from the device per poll.
pub const READ_BUFFER_SIZE: usize = 512;

// ── Encoding helpers ──────────────────────────────────────────────────────────

/// Compute the packet checksum of `payload`.
///
/// ```
/// # use thinkgear_rs::protocol::checksum;
/// assert_eq!(checksum(&[0x02, 0x20]), 0xDD);
/// ```
pub fn checksum(payload: &[u8]) -> u8 {
    let sum = payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    !sum
}

/// Encode one extended-code-level-0 data row.
///
/// Codes below [`MULTI_BYTE_CODE_THRESHOLD`] only use `value[0]`; an empty
/// value is encoded as a single zero byte.
pub fn encode_row(code: u8, value: &[u8]) -> Vec<u8> {
    if code < MULTI_BYTE_CODE_THRESHOLD {
        vec![code, value.first().copied().unwrap_or(0)]
    } else {
        let mut row = Vec::with_capacity(value.len() + 2);
        row.push(code);
        row.push(value.len() as u8);
        row.extend_from_slice(value);
        row
    }
}

/// Wrap `payload` in sync bytes, length and checksum.
///
/// Returns `None` when the payload is longer than [`MAX_PAYLOAD_LENGTH`].
///
/// ```
/// # use thinkgear_rs::protocol::encode_packet;
/// assert_eq!(
///     encode_packet(&[0x02, 0x20]).unwrap(),
///     vec![0xAA, 0xAA, 0x02, 0x02, 0x20, 0xDD]
/// );
/// ```
pub fn encode_packet(payload: &[u8]) -> Option<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_LENGTH {
        return None;
    }
    let mut packet = Vec::with_capacity(payload.len() + 4);
    packet.extend_from_slice(&[SYNC, SYNC, payload.len() as u8]);
    packet.extend_from_slice(payload);
    packet.push(checksum(payload));
    Some(packet)
}

/// Encode eight band magnitudes as an [`CODE_ASIC_EEG_POWER`] value.
///
/// Only the low 24 bits of each magnitude are kept.
pub fn encode_eeg_power(bands: [u32; 8]) -> Vec<u8> {
    bands
        .iter()
        .flat_map(|v| {
            let [_, hi, mid, lo] = v.to_be_bytes();
            [hi, mid, lo]
        })
        .collect()
}
