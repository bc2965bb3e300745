//! # thinkgear-rs
//!
//! Rust library and CLI for streaming telemetry from NeuroSky
//! [ThinkGear](https://developer.neurosky.com/) headsets (MindWave, MindSet,
//! MindWave Mobile) over a serial link: an RFCOMM Bluetooth port or the USB
//! dongle.
//!
//! ## Data flow
//!
//! ```text
//! serial bytes ──► FrameDecoder ──► DataRow ──► interpret ──► Observation
//!                  (sync, length,              (code table)    │
//!                   checksum)                                  ├─► ThinkGearEvent ──► subscribers
//!                                                              └─► BandPowers (on EEG rows)
//! ```
//!
//! Everything runs inside [`session::ThinkGearSession::poll`]; there are no
//! background threads.  The dongle's standby notice is answered with the
//! autoconnect command automatically.
//!
//! ## Quick start
//!
//! ```no_run
//! use thinkgear_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut session = ThinkGearSession::new(SerialDevice::new(), ThinkGearConfig::default());
//!     let mut sub = session.subscribe_all();
//!     let mut tick = tokio::time::interval(std::time::Duration::from_millis(20));
//!
//!     loop {
//!         tick.tick().await;
//!         session.poll();
//!         while let Ok(event) = sub.rx.try_recv() {
//!             match event {
//!                 ThinkGearEvent::Attention(o) => println!("attention {}", o.attention),
//!                 ThinkGearEvent::Eeg(_) => println!("{}", session.bands()),
//!                 _ => {}
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`prelude`] | One-line glob import of the most commonly needed types |
//! | [`session`] | [`session::ThinkGearSession`]: lazy open, poll loop, close / reopen |
//! | [`device`] | The [`device::ByteStream`] seam, serial port and in-memory devices |
//! | [`sim`] | A synthetic headset that speaks the wire protocol |
//! | [`parse`] | Packet framing state machine and payload row splitting |
//! | [`interpret`] | Code table: data rows to observation updates and events |
//! | [`bands`] | Relative band powers and their stable ranking |
//! | [`events`] | Kind-filtered fan-out of events to subscribers |
//! | [`types`] | Observation, event and data-row types |
//! | [`protocol`] | Wire constants and packet encoding helpers |

pub mod bands;
pub mod device;
pub mod events;
pub mod interpret;
pub mod parse;
pub mod protocol;
pub mod session;
pub mod sim;
pub mod types;

// ── Prelude ───────────────────────────────────────────────────────────────────

/// Convenience re-exports for downstream crates.
///
/// ```no_run
/// use thinkgear_rs::prelude::*;
///
/// let mut session = ThinkGearSession::new(SimulatedHeadset::new(), ThinkGearConfig::default());
/// let mut sub = session.subscribe(&[EventKind::Meditation]);
/// session.poll();
/// while let Ok(ev) = sub.rx.try_recv() {
///     println!("{ev:?}");
/// }
/// ```
pub mod prelude {
    // ── Session ───────────────────────────────────────────────────────────────
    pub use crate::session::{SessionState, ThinkGearConfig, ThinkGearSession};

    // ── Devices ───────────────────────────────────────────────────────────────
    pub use crate::device::{ByteStream, DeviceError, MemoryDevice, SerialDevice};
    pub use crate::sim::SimulatedHeadset;

    // ── Events and data types ─────────────────────────────────────────────────
    pub use crate::bands::{BandEntry, BandPowers};
    pub use crate::events::{SubscriberId, Subscription};
    pub use crate::types::{BandKind, DataRow, EegPower, EventKind, Observation, ThinkGearEvent};

    // ── Protocol constants ────────────────────────────────────────────────────
    pub use crate::protocol::{DEFAULT_BAUD_RATE, DEFAULT_PORT};
}
