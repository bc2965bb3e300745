//! A synthetic ThinkGear headset that speaks the real wire protocol.
//!
//! Useful for demos and end-to-end tests without hardware:
//!
//! 1. On open the dongle reports standby (`0xD4`).
//! 2. When the host writes the autoconnect command (`0xC2`) it reports
//!    the headset as connected (`0xD0`) and starts streaming.
//! 3. Every poll (`available()` call) produces one tick of data:
//!    [`RAW_PER_TICK`] raw-sample packets, and every [`TICKS_PER_SECOND`]
//!    ticks one eSense packet (poor signal, EEG powers, attention,
//!    meditation).  A blink is reported every few seconds.
//! 4. Writing the disconnect command (`0xC1`) stops the stream.
//!
//! Output is fully deterministic: it depends only on the tick count.

use std::collections::VecDeque;
use std::f64::consts::PI;

use log::debug;

use crate::device::{ByteStream, DeviceError};
use crate::protocol::{
    encode_eeg_power, encode_packet, encode_row, CODE_ASIC_EEG_POWER, CODE_ATTENTION,
    CODE_BLINK_STRENGTH, CODE_HEADSET_CONNECTED, CODE_MEDITATION, CODE_POOR_SIGNAL,
    CODE_RAW_SIGNAL, CODE_STANDBY, COMMAND_AUTOCONNECT, COMMAND_DISCONNECT,
};

/// Raw-sample packets produced per tick.
pub const RAW_PER_TICK: usize = 10;

/// Ticks between eSense packets.
pub const TICKS_PER_SECOND: u64 = 50;

/// Encoded size of one tick of raw packets (`AA AA 04 80 02 hi lo chk`).
const TICK_BYTES: usize = RAW_PER_TICK * 8;

/// Raw sample rate the simulator pretends to run at.
const RAW_HZ: f64 = RAW_PER_TICK as f64 * TICKS_PER_SECOND as f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Closed,
    Standby,
    Streaming,
}

/// Synthetic headset implementing [`ByteStream`].
#[derive(Debug)]
pub struct SimulatedHeadset {
    state: LinkState,
    output: VecDeque<u8>,
    tick: u64,
    sample: u64,
}

impl SimulatedHeadset {
    pub fn new() -> Self {
        Self {
            state: LinkState::Closed,
            output: VecDeque::new(),
            tick: 0,
            sample: 0,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.state == LinkState::Streaming
    }

    fn queue(&mut self, payload: &[u8]) {
        if let Some(packet) = encode_packet(payload) {
            self.output.extend(packet);
        }
    }

    fn queue_tick(&mut self) {
        for _ in 0..RAW_PER_TICK {
            let t = self.sample as f64 / RAW_HZ;
            let raw = sim_raw(t);
            self.queue(&encode_row(CODE_RAW_SIGNAL, &raw.to_be_bytes()));
            self.sample += 1;
        }

        self.tick += 1;
        if self.tick % TICKS_PER_SECOND == 0 {
            let secs = (self.tick / TICKS_PER_SECOND) as f64;
            let mut payload = encode_row(CODE_POOR_SIGNAL, &[0]);
            payload.extend(encode_row(
                CODE_ASIC_EEG_POWER,
                &encode_eeg_power(sim_bands(secs)),
            ));
            payload.extend(encode_row(CODE_ATTENTION, &[sim_esense(secs, 0.0)]));
            payload.extend(encode_row(CODE_MEDITATION, &[sim_esense(secs, 1.3)]));
            self.queue(&payload);

            if (self.tick / TICKS_PER_SECOND) % 4 == 0 {
                let strength = 60 + ((secs * 7.0) as u64 % 120) as u8;
                self.queue(&encode_row(CODE_BLINK_STRENGTH, &[strength]));
            }
        }
    }
}

impl Default for SimulatedHeadset {
    fn default() -> Self {
        Self::new()
    }
}

/// Synthetic raw sample at time `t` seconds: alpha + theta + beta sinusoids.
fn sim_raw(t: f64) -> i16 {
    let alpha = 120.0 * (2.0 * PI * 10.0 * t).sin();
    let theta = 80.0 * (2.0 * PI * 6.0 * t + 0.7).sin();
    let beta = 30.0 * (2.0 * PI * 22.0 * t + 1.9).sin();
    (alpha + theta + beta).round() as i16
}

/// Band magnitudes at `secs`, wandering slowly around typical values.
fn sim_bands(secs: f64) -> [u32; 8] {
    const BASE: [f64; 8] = [
        600_000.0, 400_000.0, 30_000.0, 50_000.0, 25_000.0, 30_000.0, 12_000.0, 8_000.0,
    ];
    let mut out = [0u32; 8];
    for (i, (slot, base)) in out.iter_mut().zip(BASE).enumerate() {
        let wobble = 1.0 + 0.4 * (0.2 * secs + i as f64 * 0.8).sin();
        *slot = (base * wobble) as u32;
    }
    out
}

/// eSense meter in the 20–80 range.
fn sim_esense(secs: f64, phase: f64) -> u8 {
    (50.0 + 30.0 * (0.1 * secs + phase).sin()).round() as u8
}

impl ByteStream for SimulatedHeadset {
    fn open(&mut self, path: &str, baud_rate: u32) -> Result<(), DeviceError> {
        debug!("Simulated headset opened as {path} @ {baud_rate}");
        self.state = LinkState::Standby;
        self.output.clear();
        self.queue(&encode_row(CODE_STANDBY, &[]));
        Ok(())
    }

    fn available(&mut self) -> Result<usize, DeviceError> {
        match self.state {
            LinkState::Closed => return Err(DeviceError::NotOpen),
            // No new data while the reader is more than a tick behind.
            LinkState::Streaming if self.output.len() < TICK_BYTES => self.queue_tick(),
            LinkState::Streaming | LinkState::Standby => {}
        }
        Ok(self.output.len())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        if self.state == LinkState::Closed {
            return Err(DeviceError::NotOpen);
        }
        let n = buf.len().min(self.output.len());
        for (slot, byte) in buf.iter_mut().zip(self.output.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), DeviceError> {
        match (self.state, byte) {
            (LinkState::Closed, _) => return Err(DeviceError::NotOpen),
            (LinkState::Standby, COMMAND_AUTOCONNECT) => {
                self.queue(&encode_row(CODE_HEADSET_CONNECTED, &[]));
                self.state = LinkState::Streaming;
            }
            (_, COMMAND_DISCONNECT) => self.state = LinkState::Standby,
            (_, other) => debug!("Simulated headset ignoring command 0x{other:02X}"),
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn discard_input(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn close(&mut self) {
        self.state = LinkState::Closed;
        self.output.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::FrameDecoder;

    fn drain(sim: &mut SimulatedHeadset) -> Vec<u8> {
        let n = sim.available().unwrap();
        let mut buf = vec![0u8; n];
        let read = sim.read_bytes(&mut buf).unwrap();
        buf.truncate(read);
        buf
    }

    #[test]
    fn handshake_then_stream() {
        let mut sim = SimulatedHeadset::new();
        assert!(sim.available().is_err());
        sim.open("sim", 57_600).unwrap();

        let rows = FrameDecoder::new().feed(&drain(&mut sim));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].code, CODE_STANDBY);
        assert!(drain(&mut sim).is_empty());

        sim.write_byte(COMMAND_AUTOCONNECT).unwrap();
        assert!(sim.is_streaming());

        let rows = FrameDecoder::new().feed(&drain(&mut sim));
        assert_eq!(rows[0].code, CODE_HEADSET_CONNECTED);
        assert_eq!(rows.len(), 1 + RAW_PER_TICK);
        assert!(rows[1..].iter().all(|r| r.code == CODE_RAW_SIGNAL));
    }

    #[test]
    fn esense_packet_once_per_second() {
        let mut sim = SimulatedHeadset::new();
        sim.open("sim", 57_600).unwrap();
        sim.write_byte(COMMAND_AUTOCONNECT).unwrap();

        let mut dec = FrameDecoder::new();
        let mut rows = Vec::new();
        for _ in 0..TICKS_PER_SECOND {
            rows.extend(dec.feed(&drain(&mut sim)));
        }
        let eeg = rows.iter().filter(|r| r.code == CODE_ASIC_EEG_POWER).count();
        assert_eq!(eeg, 1);
        assert_eq!(dec.stats().checksum_errors, 0);
    }

    #[test]
    fn disconnect_stops_stream() {
        let mut sim = SimulatedHeadset::new();
        sim.open("sim", 57_600).unwrap();
        sim.write_byte(COMMAND_AUTOCONNECT).unwrap();
        sim.write_byte(COMMAND_DISCONNECT).unwrap();
        assert!(!sim.is_streaming());
        sim.close();
        assert!(sim.write_byte(COMMAND_AUTOCONNECT).is_err());
    }

    #[test]
    fn bands_stay_positive() {
        for s in 0..100 {
            assert!(sim_bands(s as f64).iter().all(|&v| v > 0 && v < 0x0100_0000));
        }
    }

    #[test]
    fn unread_output_stays_bounded() {
        let mut sim = SimulatedHeadset::new();
        sim.open("sim", 57_600).unwrap();
        sim.write_byte(COMMAND_AUTOCONNECT).unwrap();

        let first = sim.available().unwrap();
        for _ in 0..1_000 {
            assert_eq!(sim.available().unwrap(), first);
        }
        assert!(first < 2 * TICK_BYTES);

        // Reading catches up and the stream resumes.
        let mut buf = vec![0u8; first];
        sim.read_bytes(&mut buf).unwrap();
        let rows = FrameDecoder::new().feed(&drain(&mut sim));
        assert_eq!(rows.len(), RAW_PER_TICK);
    }
}
