//! Byte-stream decoders for the ThinkGear serial protocol.
//!
//! Everything here is pure (no I/O) and safe to call from any context.
//!
//! | Item | Purpose |
//! |---|---|
//! | [`FrameDecoder`] | resumable state machine: bytes in, checksummed [`DataRow`]s out |
//! | [`parse_payload`] | split a verified payload into its data rows |
//! | [`decode_unsigned_24bit`] | 24-bit big-endian unsigned array |
//! | [`read_i16_be`] | 16-bit big-endian signed value |
//!
//! Transport noise is expected on a Bluetooth serial link, so nothing in
//! this module returns an error: corrupt packets are logged at `debug` level
//! and dropped, and the decoder resynchronises on the next pair of sync bytes.

use log::debug;

use crate::protocol::{EXCODE, MAX_PAYLOAD_LENGTH, MULTI_BYTE_CODE_THRESHOLD, SYNC};
use crate::types::DataRow;

// ── Value decoders ────────────────────────────────────────────────────────────

/// Decode a 24-bit unsigned big-endian array (3 bytes per value).
///
/// Returns one `u32` per complete 3-byte group; partial trailing bytes are ignored.
pub fn decode_unsigned_24bit(data: &[u8]) -> Vec<u32> {
    data.chunks_exact(3)
        .map(|c| u32::from_be_bytes([0, c[0], c[1], c[2]]))
        .collect()
}

/// Read a big-endian signed 16-bit integer from the start of `data`.
///
/// Returns `None` if `data` is shorter than 2 bytes.
pub fn read_i16_be(data: &[u8]) -> Option<i16> {
    match data {
        [hi, lo, ..] => Some(i16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

// ── Payload rows ──────────────────────────────────────────────────────────────

/// Split a checksum-verified payload into data rows.
///
/// Each row is `[0x55 …] CODE [VLENGTH] VALUE…`.  Codes below `0x80` have a
/// one-byte value and no length byte.  A row that claims more bytes than the
/// payload holds ends parsing; rows before it are still returned.
pub fn parse_payload(payload: &[u8]) -> Vec<DataRow> {
    let mut rows = Vec::new();
    let mut i = 0;

    while i < payload.len() {
        let mut excode_level = 0u8;
        while payload.get(i) == Some(&EXCODE) {
            excode_level = excode_level.saturating_add(1);
            i += 1;
        }

        let Some(&code) = payload.get(i) else {
            debug!("payload ends inside extended-code prefix (level {excode_level})");
            break;
        };
        i += 1;

        let len = if code >= MULTI_BYTE_CODE_THRESHOLD {
            let Some(&len) = payload.get(i) else {
                debug!("payload ends before length byte of code 0x{code:02X}");
                break;
            };
            i += 1;
            len as usize
        } else {
            1
        };

        let end = i + len;
        if end > payload.len() {
            debug!(
                "row 0x{code:02X} declares {len} bytes but only {} remain; dropping rest of payload",
                payload.len() - i
            );
            break;
        }

        rows.push(DataRow {
            excode_level,
            code,
            value: payload[i..end].to_vec(),
        });
        i = end;
    }

    rows
}

// ── Frame decoder ─────────────────────────────────────────────────────────────

/// Position of a [`FrameDecoder`] inside the packet grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DecoderState {
    /// Waiting for the first `0xAA`.
    SeekSync,
    /// Got one `0xAA`, waiting for the second.
    SecondSync,
    /// Got both sync bytes, waiting for the payload length.
    ReadLength,
    /// Collecting `expected` payload bytes.
    ReadPayload { payload: Vec<u8>, expected: usize },
    /// Payload complete, waiting for the checksum byte.
    ReadChecksum { payload: Vec<u8> },
}

/// Running counters kept by a [`FrameDecoder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Packets whose checksum matched.
    pub packets: u64,
    /// Packets dropped because the checksum did not match.
    pub checksum_errors: u64,
    /// Packets dropped because the length byte was out of range.
    pub length_errors: u64,
}

/// Incremental ThinkGear packet decoder.
///
/// Feed it bytes in whatever chunks the serial port delivers (including one
/// at a time); it keeps its position across calls and returns the data rows
/// of every packet whose checksum verifies.
///
/// ```
/// # use thinkgear_rs::parse::FrameDecoder;
/// let mut dec = FrameDecoder::new();
/// assert!(dec.feed(&[0xAA, 0xAA, 0x02]).is_empty());   // incomplete
/// let rows = dec.feed(&[0x02, 0x20, 0xDD]);              // poor signal = 32
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].code, 0x02);
/// assert_eq!(rows[0].value, vec![0x20]);
/// ```
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: DecoderState,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::SeekSync,
            stats: DecoderStats::default(),
        }
    }

    /// Discard any partially received packet.  Counters are kept.
    pub fn reset(&mut self) {
        self.state = DecoderState::SeekSync;
    }

    /// `true` when no packet is partially received.
    pub fn is_idle(&self) -> bool {
        self.state == DecoderState::SeekSync
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Feed a chunk of bytes and return the rows of all packets it completes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<DataRow> {
        let mut rows = Vec::new();
        for &byte in bytes {
            if let Some(packet_rows) = self.push(byte) {
                rows.extend(packet_rows);
            }
        }
        rows
    }

    /// Advance the state machine by one byte.
    ///
    /// Returns `Some(rows)` when `byte` completes a packet with a valid
    /// checksum (`rows` may be empty for an empty payload), `None` otherwise.
    pub fn push(&mut self, byte: u8) -> Option<Vec<DataRow>> {
        let state = std::mem::replace(&mut self.state, DecoderState::SeekSync);

        let (next, rows) = match state {
            DecoderState::SeekSync => {
                let next = if byte == SYNC {
                    DecoderState::SecondSync
                } else {
                    DecoderState::SeekSync
                };
                (next, None)
            }

            DecoderState::SecondSync => {
                let next = if byte == SYNC {
                    DecoderState::ReadLength
                } else {
                    DecoderState::SeekSync
                };
                (next, None)
            }

            DecoderState::ReadLength => {
                let len = byte as usize;
                let next = if byte == SYNC {
                    // A run of sync bytes: keep waiting for the length.
                    DecoderState::ReadLength
                } else if len > MAX_PAYLOAD_LENGTH {
                    debug!("packet length {len} out of range, resyncing");
                    self.stats.length_errors += 1;
                    DecoderState::SeekSync
                } else if len == 0 {
                    DecoderState::ReadChecksum {
                        payload: Vec::new(),
                    }
                } else {
                    DecoderState::ReadPayload {
                        payload: Vec::with_capacity(len),
                        expected: len,
                    }
                };
                (next, None)
            }

            DecoderState::ReadPayload {
                mut payload,
                expected,
            } => {
                payload.push(byte);
                let next = if payload.len() == expected {
                    DecoderState::ReadChecksum { payload }
                } else {
                    DecoderState::ReadPayload { payload, expected }
                };
                (next, None)
            }

            DecoderState::ReadChecksum { payload } => {
                let expected = crate::protocol::checksum(&payload);
                if byte == expected {
                    self.stats.packets += 1;
                    (DecoderState::SeekSync, Some(parse_payload(&payload)))
                } else {
                    debug!(
                        "checksum mismatch: got 0x{byte:02X}, expected 0x{expected:02X} \
                         ({} payload bytes dropped)",
                        payload.len()
                    );
                    self.stats.checksum_errors += 1;
                    (DecoderState::SeekSync, None)
                }
            }
        };

        self.state = next;
        rows
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
