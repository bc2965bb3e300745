use std::fmt;

use serde::Serialize;

/// The eight ASIC EEG band magnitudes, in wire order.
///
/// Each value is a 24-bit unsigned integer stored in a `u32`; the upper byte
/// is always zero for values decoded from the headset.  The magnitudes have
/// no physical unit and are only meaningful relative to each other.
///
/// | Field | Band | Typical range |
/// |---|---|---|
/// | `delta` | 0.5–2.75 Hz | 100 000 – 1 500 000 |
/// | `theta` | 3.5–6.75 Hz | 300 000 – 600 000 |
/// | `low_alpha` | 7.5–9.25 Hz | 2 500 – 75 000 |
/// | `high_alpha` | 10–11.75 Hz | 2 500 – 150 000 |
/// | `low_beta` | 13–16.75 Hz | 1 500 – 60 000 |
/// | `high_beta` | 18–29.75 Hz | 2 500 – 60 000 |
/// | `low_gamma` | 31–39.75 Hz | 5 000 – 300 000 |
/// | `mid_gamma` | 41–49.75 Hz | 5 000 – 300 000 |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EegPower {
    pub delta: u32,
    pub theta: u32,
    pub low_alpha: u32,
    pub high_alpha: u32,
    pub low_beta: u32,
    pub high_beta: u32,
    pub low_gamma: u32,
    pub mid_gamma: u32,
}

impl EegPower {
    /// Build from magnitudes in [`BandKind::ALL`] order.
    pub fn from_array(v: [u32; 8]) -> Self {
        Self {
            delta: v[0],
            theta: v[1],
            low_alpha: v[2],
            high_alpha: v[3],
            low_beta: v[4],
            high_beta: v[5],
            low_gamma: v[6],
            mid_gamma: v[7],
        }
    }

    /// Magnitudes in [`BandKind::ALL`] order.
    pub fn to_array(&self) -> [u32; 8] {
        [
            self.delta,
            self.theta,
            self.low_alpha,
            self.high_alpha,
            self.low_beta,
            self.high_beta,
            self.low_gamma,
            self.mid_gamma,
        ]
    }

    pub fn get(&self, kind: BandKind) -> u32 {
        self.to_array()[kind.index()]
    }

    /// Sum of all eight magnitudes.  Cannot overflow: 8 × 2³² fits in `u64`.
    pub fn total(&self) -> u64 {
        self.to_array().iter().map(|&v| v as u64).sum()
    }
}

/// One of the eight EEG frequency bands reported by the headset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BandKind {
    Delta,
    Theta,
    LowAlpha,
    HighAlpha,
    LowBeta,
    HighBeta,
    LowGamma,
    MidGamma,
}

impl BandKind {
    /// All bands in wire order.
    pub const ALL: [BandKind; 8] = [
        BandKind::Delta,
        BandKind::Theta,
        BandKind::LowAlpha,
        BandKind::HighAlpha,
        BandKind::LowBeta,
        BandKind::HighBeta,
        BandKind::LowGamma,
        BandKind::MidGamma,
    ];

    /// Position in [`BandKind::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short label used in compact displays (`D`, `T`, `LA`, …).
    pub fn abbreviation(self) -> &'static str {
        match self {
            BandKind::Delta => "D",
            BandKind::Theta => "T",
            BandKind::LowAlpha => "LA",
            BandKind::HighAlpha => "HA",
            BandKind::LowBeta => "LB",
            BandKind::HighBeta => "HB",
            BandKind::LowGamma => "LG",
            BandKind::MidGamma => "MG",
        }
    }
}

impl fmt::Display for BandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// The most recent value of every signal the headset reports.
///
/// Each field is overwritten independently whenever its data row is decoded;
/// a change to one field says nothing about the others.  Events carry a copy
/// of this struct taken right after the triggering field was written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Observation {
    /// Raw EEG sample, −32768 … 32767, at 128 or 512 Hz depending on the chip.
    pub raw: i16,
    /// Device power level.
    pub power: u8,
    /// Contact quality: 0 is good, 200 means the electrodes are off the skin.
    pub poor_signal: u8,
    /// Heart rate, 0–255.
    pub heart_rate: u8,
    pub blink_strength: u8,
    /// eSense attention: 0 = unable to calculate, 40–60 = neutral.
    pub attention: u8,
    /// eSense meditation: 0 = unable to calculate, 40–60 = neutral.
    pub meditation: u8,
    pub eeg: EegPower,
}

/// One `(extended code level, code, value)` data row extracted from a
/// checksummed packet payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRow {
    /// Number of `0x55` prefix bytes before the code.
    pub excode_level: u8,
    pub code: u8,
    /// Value bytes exactly as they appeared on the wire.
    pub value: Vec<u8>,
}

impl DataRow {
    /// Declared value length.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// Discriminant of [`ThinkGearEvent`], used to choose which events a
/// subscriber receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Raw,
    Power,
    PoorSignal,
    HeartRate,
    BlinkStrength,
    Attention,
    Meditation,
    Eeg,
    Connecting,
    Ready,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::Raw,
        EventKind::Power,
        EventKind::PoorSignal,
        EventKind::HeartRate,
        EventKind::BlinkStrength,
        EventKind::Attention,
        EventKind::Meditation,
        EventKind::Eeg,
        EventKind::Connecting,
        EventKind::Ready,
        EventKind::Error,
    ];
}

/// All events emitted by [`crate::session::ThinkGearSession`].
///
/// Every data variant carries the full [`Observation`] as it stood right
/// after the corresponding field was updated.  Consumers receive these through
/// the receiver returned by [`crate::session::ThinkGearSession::subscribe`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ThinkGearEvent {
    /// A raw EEG sample (code `0x80`).
    Raw(Observation),
    /// Device power level (code `0x01`).
    Power(Observation),
    /// Contact quality (code `0x02`).
    PoorSignal(Observation),
    /// Heart rate (code `0x03`).
    HeartRate(Observation),
    /// Blink strength (code `0x16`).
    BlinkStrength(Observation),
    /// eSense attention (code `0x04`).
    Attention(Observation),
    /// eSense meditation (code `0x05`).
    Meditation(Observation),
    /// All eight band magnitudes were replaced (code `0x83`).
    Eeg(Observation),
    /// The dongle is in standby; the autoconnect command has been sent.
    Connecting(Observation),
    /// The headset is connected and data will follow.
    Ready(Observation),
    /// The dongle reported a problem.  Not fatal to the session.
    Error(String),
}

impl ThinkGearEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ThinkGearEvent::Raw(_) => EventKind::Raw,
            ThinkGearEvent::Power(_) => EventKind::Power,
            ThinkGearEvent::PoorSignal(_) => EventKind::PoorSignal,
            ThinkGearEvent::HeartRate(_) => EventKind::HeartRate,
            ThinkGearEvent::BlinkStrength(_) => EventKind::BlinkStrength,
            ThinkGearEvent::Attention(_) => EventKind::Attention,
            ThinkGearEvent::Meditation(_) => EventKind::Meditation,
            ThinkGearEvent::Eeg(_) => EventKind::Eeg,
            ThinkGearEvent::Connecting(_) => EventKind::Connecting,
            ThinkGearEvent::Ready(_) => EventKind::Ready,
            ThinkGearEvent::Error(_) => EventKind::Error,
        }
    }

    /// The observation snapshot, or `None` for [`ThinkGearEvent::Error`].
    pub fn observation(&self) -> Option<&Observation> {
        match self {
            ThinkGearEvent::Raw(o)
            | ThinkGearEvent::Power(o)
            | ThinkGearEvent::PoorSignal(o)
            | ThinkGearEvent::HeartRate(o)
            | ThinkGearEvent::BlinkStrength(o)
            | ThinkGearEvent::Attention(o)
            | ThinkGearEvent::Meditation(o)
            | ThinkGearEvent::Eeg(o)
            | ThinkGearEvent::Connecting(o)
            | ThinkGearEvent::Ready(o) => Some(o),
            ThinkGearEvent::Error(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eeg_power_array_order_matches_band_kinds() {
        let p = EegPower::from_array([1, 2, 3, 4, 5, 6, 7, 8]);
        for (i, kind) in BandKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(p.get(*kind), i as u32 + 1);
        }
        assert_eq!(p.total(), 36);
        assert_eq!(p.to_array(), [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn total_does_not_overflow() {
        let p = EegPower::from_array([u32::MAX; 8]);
        assert_eq!(p.total(), u32::MAX as u64 * 8);
    }

    #[test]
    fn event_serializes_with_tag() {
        let json = serde_json::to_value(ThinkGearEvent::Error("boom".into())).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["data"], "boom");

        let obs = Observation {
            attention: 55,
            ..Default::default()
        };
        let json = serde_json::to_value(ThinkGearEvent::Attention(obs)).unwrap();
        assert_eq!(json["event"], "attention");
        assert_eq!(json["data"]["attention"], 55);
    }
}
