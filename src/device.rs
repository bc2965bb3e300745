//! Byte-stream devices the session reads ThinkGear packets from.
//!
//! [`ByteStream`] is the seam between the decoder and the transport.  Three
//! implementations ship with the crate:
//!
//! | Type | Use |
//! |---|---|
//! | [`SerialDevice`] | real hardware via the `serialport` crate (RFCOMM / USB dongle) |
//! | [`MemoryDevice`] | scripted input and an operation log, for tests and playback |
//! | [`crate::sim::SimulatedHeadset`] | synthetic headset, no hardware needed |

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open {path} at {baud_rate} baud: {reason}")]
    Open {
        path: String,
        baud_rate: u32,
        reason: String,
    },
    #[error("device is not open")]
    NotOpen,
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bidirectional byte stream with no framing or delivery guarantees.
///
/// Reads may return any number of bytes, including zero, and may split a
/// packet anywhere.
pub trait ByteStream {
    /// Open the stream.  Calling `open` on an open stream reopens it.
    fn open(&mut self, path: &str, baud_rate: u32) -> Result<(), DeviceError>;

    /// Number of bytes that can be read without blocking.
    fn available(&mut self) -> Result<usize, DeviceError>;

    /// Read up to `buf.len()` bytes; returns how many were read.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError>;

    fn write_byte(&mut self, byte: u8) -> Result<(), DeviceError>;

    /// Push any buffered output to the device.
    fn flush(&mut self) -> Result<(), DeviceError>;

    /// Drop any input received but not yet read.
    fn discard_input(&mut self) -> Result<(), DeviceError>;

    /// Release the stream.  Closing a closed stream does nothing.
    fn close(&mut self);
}

impl<T: ByteStream + ?Sized> ByteStream for &mut T {
    fn open(&mut self, path: &str, baud_rate: u32) -> Result<(), DeviceError> {
        (**self).open(path, baud_rate)
    }
    fn available(&mut self) -> Result<usize, DeviceError> {
        (**self).available()
    }
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        (**self).read_bytes(buf)
    }
    fn write_byte(&mut self, byte: u8) -> Result<(), DeviceError> {
        (**self).write_byte(byte)
    }
    fn flush(&mut self) -> Result<(), DeviceError> {
        (**self).flush()
    }
    fn discard_input(&mut self) -> Result<(), DeviceError> {
        (**self).discard_input()
    }
    fn close(&mut self) {
        (**self).close()
    }
}

impl<T: ByteStream + ?Sized> ByteStream for Box<T> {
    fn open(&mut self, path: &str, baud_rate: u32) -> Result<(), DeviceError> {
        (**self).open(path, baud_rate)
    }
    fn available(&mut self) -> Result<usize, DeviceError> {
        (**self).available()
    }
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        (**self).read_bytes(buf)
    }
    fn write_byte(&mut self, byte: u8) -> Result<(), DeviceError> {
        (**self).write_byte(byte)
    }
    fn flush(&mut self) -> Result<(), DeviceError> {
        (**self).flush()
    }
    fn discard_input(&mut self) -> Result<(), DeviceError> {
        (**self).discard_input()
    }
    fn close(&mut self) {
        (**self).close()
    }
}

// ── Serial port ───────────────────────────────────────────────────────────────

/// Read timeout used when `available()` over-reports.
const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// A serial port opened through the `serialport` crate.
#[derive(Default)]
pub struct SerialDevice {
    port: Option<Box<dyn SerialPort>>,
}

impl SerialDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, DeviceError> {
        self.port.as_mut().ok_or(DeviceError::NotOpen)
    }
}

impl ByteStream for SerialDevice {
    fn open(&mut self, path: &str, baud_rate: u32) -> Result<(), DeviceError> {
        self.close();
        let port = serialport::new(path, baud_rate)
            .timeout(SERIAL_READ_TIMEOUT)
            .open()
            .map_err(|e| DeviceError::Open {
                path: path.to_owned(),
                baud_rate,
                reason: e.to_string(),
            })?;
        self.port = Some(port);
        Ok(())
    }

    fn available(&mut self) -> Result<usize, DeviceError> {
        Ok(self.port()?.bytes_to_read()? as usize)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        match self.port()?.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), DeviceError> {
        self.port()?.write_all(&[byte])?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DeviceError> {
        self.port()?.flush()?;
        Ok(())
    }

    fn discard_input(&mut self) -> Result<(), DeviceError> {
        self.port()?.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn close(&mut self) {
        // Dropping the boxed port closes the file descriptor / handle.
        self.port = None;
    }
}

// ── In-memory device ──────────────────────────────────────────────────────────

/// One call made on a [`MemoryDevice`], recorded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOp {
    Open { path: String, baud_rate: u32 },
    Read(usize),
    Write(u8),
    Flush,
    DiscardInput,
    Close,
}

/// Scripted in-memory device.
///
/// Bytes queued with [`MemoryDevice::push_input`] are handed out by
/// `read_bytes`; every open / read / write / flush / close is recorded so
/// tests can assert on the exact sequence of operations.
#[derive(Debug, Default)]
pub struct MemoryDevice {
    input: VecDeque<u8>,
    ops: Vec<DeviceOp>,
    is_open: bool,
    failing_opens: usize,
    max_chunk: Option<usize>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device whose first `n` open attempts fail.
    pub fn failing_opens(n: usize) -> Self {
        Self {
            failing_opens: n,
            ..Self::default()
        }
    }

    /// Limit how many bytes `available` reports at once, to mimic a link that
    /// delivers data in small fragments.
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = Some(max_chunk);
        self
    }

    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn ops(&self) -> &[DeviceOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// All bytes written so far, in order.
    pub fn written(&self) -> Vec<u8> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DeviceOp::Write(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    fn ensure_open(&self) -> Result<(), DeviceError> {
        if self.is_open {
            Ok(())
        } else {
            Err(DeviceError::NotOpen)
        }
    }
}

impl ByteStream for MemoryDevice {
    fn open(&mut self, path: &str, baud_rate: u32) -> Result<(), DeviceError> {
        self.ops.push(DeviceOp::Open {
            path: path.to_owned(),
            baud_rate,
        });
        if self.failing_opens > 0 {
            self.failing_opens -= 1;
            return Err(DeviceError::Open {
                path: path.to_owned(),
                baud_rate,
                reason: "scripted failure".to_owned(),
            });
        }
        self.is_open = true;
        Ok(())
    }

    fn available(&mut self) -> Result<usize, DeviceError> {
        self.ensure_open()?;
        let n = self.input.len();
        Ok(self.max_chunk.map_or(n, |max| n.min(max)))
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        self.ensure_open()?;
        let n = buf.len().min(self.input.len());
        for (slot, byte) in buf.iter_mut().zip(self.input.drain(..n)) {
            *slot = byte;
        }
        self.ops.push(DeviceOp::Read(n));
        Ok(n)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.ops.push(DeviceOp::Write(byte));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.ops.push(DeviceOp::Flush);
        Ok(())
    }

    fn discard_input(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.ops.push(DeviceOp::DiscardInput);
        Ok(())
    }

    fn close(&mut self) {
        if self.is_open {
            self.ops.push(DeviceOp::Close);
            self.is_open = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_device_hands_out_scripted_bytes() {
        let mut dev = MemoryDevice::new().with_max_chunk(3);
        dev.push_input(&[1, 2, 3, 4, 5]);
        assert!(matches!(dev.available(), Err(DeviceError::NotOpen)));

        dev.open("/dev/null", 57_600).unwrap();
        assert_eq!(dev.available().unwrap(), 3);

        let mut buf = [0u8; 4];
        assert_eq!(dev.read_bytes(&mut buf).unwrap(), 4);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(dev.pending_input(), 1);
    }

    #[test]
    fn memory_device_records_operations() {
        let mut dev = MemoryDevice::new();
        dev.open("/dev/rfcomm0", 57_600).unwrap();
        dev.write_byte(0xC1).unwrap();
        dev.flush().unwrap();
        dev.close();
        dev.close();
        assert_eq!(
            dev.ops(),
            &[
                DeviceOp::Open {
                    path: "/dev/rfcomm0".into(),
                    baud_rate: 57_600
                },
                DeviceOp::Write(0xC1),
                DeviceOp::Flush,
                DeviceOp::Close,
            ]
        );
        assert_eq!(dev.written(), vec![0xC1]);
    }

    #[test]
    fn scripted_open_failures() {
        let mut dev = MemoryDevice::failing_opens(1);
        let err = dev.open("COM5", 9600).unwrap_err();
        assert!(err.to_string().contains("COM5"));
        assert!(!dev.is_open());
        dev.open("COM5", 9600).unwrap();
        assert!(dev.is_open());
    }

    #[test]
    fn serial_device_reports_not_open() {
        let mut dev = SerialDevice::new();
        assert!(matches!(dev.write_byte(0), Err(DeviceError::NotOpen)));
        dev.close();
    }
}
