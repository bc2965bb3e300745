use log::{debug, info, warn};

use crate::bands::BandPowers;
use crate::device::{ByteStream, DeviceError};
use crate::events::{EventBus, SubscriberId, Subscription};
use crate::interpret::interpret;
use crate::parse::{DecoderStats, FrameDecoder};
use crate::protocol::{COMMAND_DISCONNECT, DEFAULT_BAUD_RATE, DEFAULT_PORT, READ_BUFFER_SIZE};
use crate::types::{DataRow, EventKind, Observation, ThinkGearEvent};

// ── ThinkGearConfig ───────────────────────────────────────────────────────────

/// Configuration for [`ThinkGearSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkGearConfig {
    /// Serial device path, e.g. `/dev/rfcomm0` or `COM5`.
    /// Default: [`DEFAULT_PORT`] for the target platform.
    pub port: String,
    /// Default: `57600`, the MindWave / MindSet rate.
    pub baud_rate: u32,
    /// Maximum bytes read from the device per [`ThinkGearSession::poll`].
    /// Default: `512`.
    pub read_buffer_size: usize,
}

impl Default for ThinkGearConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_buffer_size: READ_BUFFER_SIZE,
        }
    }
}

// ── SessionState ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The device will be opened on the next [`ThinkGearSession::poll`].
    NotConnected,
    Connected,
    /// Shut down by [`ThinkGearSession::close`]; polls do nothing until
    /// [`ThinkGearSession::reopen`].
    Closed,
}

// ── ThinkGearSession ──────────────────────────────────────────────────────────

/// One headset session: device, decoder, current observation, band powers,
/// and subscribers.
///
/// The session is poll-driven and single-threaded.  Call [`poll`] from your
/// own loop; it opens the device lazily, reads whatever is available, decodes
/// it, and dispatches events before returning.
///
/// ```no_run
/// use thinkgear_rs::prelude::*;
///
/// let mut session = ThinkGearSession::new(SerialDevice::new(), ThinkGearConfig::default());
/// let mut sub = session.subscribe(&[EventKind::Attention]);
/// loop {
///     session.poll();
///     while let Ok(ev) = sub.rx.try_recv() {
///         if let ThinkGearEvent::Attention(o) = ev {
///             println!("attention {}", o.attention);
///         }
///     }
///     std::thread::sleep(std::time::Duration::from_millis(20));
/// }
/// ```
///
/// [`poll`]: ThinkGearSession::poll
pub struct ThinkGearSession<D: ByteStream> {
    device: D,
    config: ThinkGearConfig,
    state: SessionState,
    decoder: FrameDecoder,
    observation: Observation,
    bands: BandPowers,
    bus: EventBus,
    buffer: Vec<u8>,
    open_failures: u32,
}

impl<D: ByteStream> ThinkGearSession<D> {
    /// Create a session.  The device is not opened until the first poll.
    pub fn new(device: D, config: ThinkGearConfig) -> Self {
        let buffer = vec![0u8; config.read_buffer_size.max(1)];
        Self {
            device,
            config,
            state: SessionState::NotConnected,
            decoder: FrameDecoder::new(),
            observation: Observation::default(),
            bands: BandPowers::new(),
            bus: EventBus::new(),
            buffer,
            open_failures: 0,
        }
    }

    /// Change the port and baud rate used by the next open.
    ///
    /// An already-open connection is left alone.
    pub fn setup(&mut self, port: &str, baud_rate: u32) {
        info!("ThinkGear setup: {port} @ {baud_rate} baud");
        self.config.port = port.to_owned();
        self.config.baud_rate = baud_rate;
    }

    // ── Poll loop ─────────────────────────────────────────────────────────────

    /// Run one read / decode / dispatch cycle.
    ///
    /// Opens the device first if needed; an open failure is logged and the
    /// next poll tries again.  Reads at most `read_buffer_size` bytes.  A
    /// read error closes the device handle so the next poll reopens it.
    ///
    /// Returns the number of data rows decoded.
    pub fn poll(&mut self) -> usize {
        match self.state {
            SessionState::Closed => return 0,
            SessionState::NotConnected => {
                if !self.connect() {
                    return 0;
                }
            }
            SessionState::Connected => {}
        }

        match self.read_available() {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Lost {}: {e}; reconnecting on next poll", self.config.port);
                self.device.close();
                self.decoder.reset();
                self.state = SessionState::NotConnected;
                0
            }
        }
    }

    fn connect(&mut self) -> bool {
        let port = &self.config.port;
        let baud_rate = self.config.baud_rate;
        match self.device.open(port, baud_rate) {
            Ok(()) => {
                if let Err(e) = self.device.discard_input() {
                    debug!("Could not discard stale input on {port}: {e}");
                }
                info!("Opened {port} @ {baud_rate} baud");
                self.decoder.reset();
                self.open_failures = 0;
                self.state = SessionState::Connected;
                true
            }
            Err(e) => {
                self.open_failures = self.open_failures.saturating_add(1);
                if self.open_failures == 1 {
                    warn!("{e}; retrying on every poll");
                } else {
                    debug!("open attempt {} failed: {e}", self.open_failures);
                }
                false
            }
        }
    }

    fn read_available(&mut self) -> Result<usize, DeviceError> {
        let available = self.device.available()?;
        if available == 0 {
            return Ok(0);
        }
        let want = available.min(self.buffer.len());
        let n = self.device.read_bytes(&mut self.buffer[..want])?;

        let mut decoded = 0;
        for i in 0..n.min(want) {
            let byte = self.buffer[i];
            if let Some(rows) = self.decoder.push(byte) {
                for row in &rows {
                    self.handle_row(row)?;
                }
                decoded += rows.len();
            }
        }
        Ok(decoded)
    }

    /// Interpret one row: mutate the observation, update band powers for EEG
    /// rows, dispatch the event, then perform any device write it requests.
    fn handle_row(&mut self, row: &DataRow) -> Result<(), DeviceError> {
        let out = interpret(&mut self.observation, row);

        if let Some(event) = &out.event {
            if event.kind() == EventKind::Eeg {
                self.bands.feed(&self.observation.eeg);
            }
            self.bus.dispatch(event);
        }

        if let Some(command) = out.command {
            debug!("Writing command 0x{command:02X}");
            self.device.write_byte(command)?;
        }
        Ok(())
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Shut the session down.
    ///
    /// If connected, sends the disconnect command, flushes and releases the
    /// device.  Any partially decoded packet is dropped.  Further polls do
    /// nothing until [`reopen`](Self::reopen) is called.
    pub fn close(&mut self) {
        if self.state == SessionState::Connected {
            if let Err(e) = self.device.write_byte(COMMAND_DISCONNECT) {
                warn!("Could not send disconnect to {}: {e}", self.config.port);
            }
            if let Err(e) = self.device.flush() {
                warn!("Could not flush {}: {e}", self.config.port);
            }
            self.device.close();
            info!("Closed {}", self.config.port);
        }
        self.decoder.reset();
        self.state = SessionState::Closed;
    }

    /// Allow a closed session to connect again on the next poll.
    pub fn reopen(&mut self) {
        if self.state == SessionState::Closed {
            self.state = SessionState::NotConnected;
        }
    }

    /// Push pending output, drop unread input and any partial packet.
    pub fn flush(&mut self) {
        if self.state != SessionState::Connected {
            return;
        }
        if let Err(e) = self.device.flush().and_then(|()| self.device.discard_input()) {
            warn!("Could not flush {}: {e}", self.config.port);
        }
        self.decoder.reset();
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn config(&self) -> &ThinkGearConfig {
        &self.config
    }

    /// The latest value of every signal.
    pub fn observation(&self) -> &Observation {
        &self.observation
    }

    /// Relative band powers, updated on every non-zero EEG packet.
    pub fn bands(&self) -> &BandPowers {
        &self.bands
    }

    pub fn decoder_stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    // ── Subscriptions ─────────────────────────────────────────────────────────

    /// Receive events of the given kinds.
    pub fn subscribe(&mut self, kinds: &[EventKind]) -> Subscription {
        self.bus.subscribe(kinds)
    }

    pub fn subscribe_all(&mut self) -> Subscription {
        self.bus.subscribe_all()
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Dispatch an event produced outside the decoder (e.g. by the host app).
    pub fn notify(&mut self, event: &ThinkGearEvent) -> usize {
        self.bus.dispatch(event)
    }
}

impl<D: ByteStream> Drop for ThinkGearSession<D> {
    fn drop(&mut self) {
        self.close();
    }
}
