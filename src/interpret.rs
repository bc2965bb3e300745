//! Code table: turns one decoded [`DataRow`] into an [`Observation`] update
//! plus the event (and, for standby, the command byte) it implies.
//!
//! | Code | Field | Decode | Event |
//! |---|---|---|---|
//! | `0x01` | `power` | byte 0 | [`ThinkGearEvent::Power`] |
//! | `0x02` | `poor_signal` | byte 0 | [`ThinkGearEvent::PoorSignal`] |
//! | `0x03` | `heart_rate` | byte 0 | [`ThinkGearEvent::HeartRate`] |
//! | `0x04` | `attention` | byte 0 | [`ThinkGearEvent::Attention`] |
//! | `0x05` | `meditation` | byte 0 | [`ThinkGearEvent::Meditation`] |
//! | `0x16` | `blink_strength` | byte 0 | [`ThinkGearEvent::BlinkStrength`] |
//! | `0x80` | `raw` | i16 BE | [`ThinkGearEvent::Raw`] |
//! | `0x83` | `eeg` | 8 × u24 BE | [`ThinkGearEvent::Eeg`] |
//! | `0xD4` | — | — | [`ThinkGearEvent::Connecting`] + write `0xC2` |
//! | `0xD0` | — | — | [`ThinkGearEvent::Ready`] |
//! | `0xD1` | — | — | [`ThinkGearEvent::Error`] |
//!
//! Only extended code level 0 is interpreted.  Anything else, and any
//! unknown code, is logged at `debug` level and dropped.

use log::{debug, info};

use crate::parse::{decode_unsigned_24bit, read_i16_be};
use crate::protocol::{
    ASIC_EEG_POWER_LENGTH, CODE_ASIC_EEG_POWER, CODE_ATTENTION, CODE_BATTERY,
    CODE_BLINK_STRENGTH, CODE_HEADSET_CONNECTED, CODE_HEADSET_NOT_FOUND, CODE_HEART_RATE,
    CODE_MEDITATION, CODE_POOR_SIGNAL, CODE_RAW_SIGNAL, CODE_STANDBY, COMMAND_AUTOCONNECT,
    HEADSET_NOT_FOUND_MESSAGE,
};
use crate::types::{DataRow, EegPower, Observation, ThinkGearEvent};

/// Outcome of interpreting one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interpretation {
    /// Event to dispatch, already carrying the post-update snapshot.
    pub event: Option<ThinkGearEvent>,
    /// Byte the caller must write to the device.
    pub command: Option<u8>,
}

impl Interpretation {
    fn event(event: ThinkGearEvent) -> Self {
        Self {
            event: Some(event),
            command: None,
        }
    }

    fn ignored() -> Self {
        Self::default()
    }
}

/// Apply `row` to `obs` and return what should be dispatched and written.
///
/// The observation is mutated before the snapshot is taken, so the event
/// always reflects the new value.  Rows too short for their code leave `obs`
/// untouched.
pub fn interpret(obs: &mut Observation, row: &DataRow) -> Interpretation {
    if row.excode_level != 0 {
        debug!(
            "ignoring extended code level {} code 0x{:02X} ({} bytes)",
            row.excode_level,
            row.code,
            row.len()
        );
        return Interpretation::ignored();
    }

    match row.code {
        CODE_BATTERY => set_byte(obs, row, |o| &mut o.power, ThinkGearEvent::Power),
        CODE_POOR_SIGNAL => set_byte(obs, row, |o| &mut o.poor_signal, ThinkGearEvent::PoorSignal),
        CODE_HEART_RATE => set_byte(obs, row, |o| &mut o.heart_rate, ThinkGearEvent::HeartRate),
        CODE_ATTENTION => set_byte(obs, row, |o| &mut o.attention, ThinkGearEvent::Attention),
        CODE_MEDITATION => set_byte(obs, row, |o| &mut o.meditation, ThinkGearEvent::Meditation),
        // Blink rows never trigger the standby handshake.
        CODE_BLINK_STRENGTH => set_byte(
            obs,
            row,
            |o| &mut o.blink_strength,
            ThinkGearEvent::BlinkStrength,
        ),

        CODE_RAW_SIGNAL => match read_i16_be(&row.value) {
            Some(raw) => {
                obs.raw = raw;
                Interpretation::event(ThinkGearEvent::Raw(*obs))
            }
            None => short_row(row, 2),
        },

        CODE_ASIC_EEG_POWER => {
            if row.len() < ASIC_EEG_POWER_LENGTH {
                return short_row(row, ASIC_EEG_POWER_LENGTH);
            }
            let values = decode_unsigned_24bit(&row.value[..ASIC_EEG_POWER_LENGTH]);
            let mut bands = [0u32; 8];
            bands.copy_from_slice(&values);
            obs.eeg = EegPower::from_array(bands);
            Interpretation::event(ThinkGearEvent::Eeg(*obs))
        }

        CODE_STANDBY => {
            info!("Dongle in standby, requesting autoconnect");
            Interpretation {
                event: Some(ThinkGearEvent::Connecting(*obs)),
                command: Some(COMMAND_AUTOCONNECT),
            }
        }

        CODE_HEADSET_CONNECTED => {
            info!("Headset connected");
            Interpretation::event(ThinkGearEvent::Ready(*obs))
        }

        CODE_HEADSET_NOT_FOUND => {
            info!("Dongle reports: {HEADSET_NOT_FOUND_MESSAGE}");
            Interpretation::event(ThinkGearEvent::Error(HEADSET_NOT_FOUND_MESSAGE.to_owned()))
        }

        code => {
            let bytes: Vec<String> = row.value.iter().map(|b| format!("{b:02X}")).collect();
            debug!(
                "unhandled code 0x{code:02X} level {} length {}: [{}]",
                row.excode_level,
                row.len(),
                bytes.join(" ")
            );
            Interpretation::ignored()
        }
    }
}

/// Store byte 0 of `row` in the field chosen by `field` and wrap the snapshot.
fn set_byte(
    obs: &mut Observation,
    row: &DataRow,
    field: impl FnOnce(&mut Observation) -> &mut u8,
    event: fn(Observation) -> ThinkGearEvent,
) -> Interpretation {
    match row.value.first() {
        Some(&b) => {
            *field(obs) = b;
            Interpretation::event(event(*obs))
        }
        None => short_row(row, 1),
    }
}

fn short_row(row: &DataRow, needed: usize) -> Interpretation {
    debug!(
        "code 0x{:02X} needs {needed} bytes, got {}; dropped",
        row.code,
        row.len()
    );
    Interpretation::ignored()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_eeg_power;

    fn row(code: u8, value: &[u8]) -> DataRow {
        DataRow {
            excode_level: 0,
            code,
            value: value.to_vec(),
        }
    }

    #[test]
    fn poor_signal_sets_field_and_emits_once() {
        let mut obs = Observation::default();
        let out = interpret(&mut obs, &row(CODE_POOR_SIGNAL, &[200]));
        assert_eq!(obs.poor_signal, 200);
        assert_eq!(out.command, None);
        match out.event {
            Some(ThinkGearEvent::PoorSignal(snapshot)) => assert_eq!(snapshot.poor_signal, 200),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn single_byte_codes_touch_only_their_field() {
        let cases: [(u8, fn(&Observation) -> u8); 6] = [
            (CODE_BATTERY, |o| o.power),
            (CODE_POOR_SIGNAL, |o| o.poor_signal),
            (CODE_HEART_RATE, |o| o.heart_rate),
            (CODE_ATTENTION, |o| o.attention),
            (CODE_MEDITATION, |o| o.meditation),
            (CODE_BLINK_STRENGTH, |o| o.blink_strength),
        ];
        for (code, getter) in cases {
            let mut obs = Observation::default();
            let out = interpret(&mut obs, &row(code, &[42]));
            assert_eq!(getter(&obs), 42, "code 0x{code:02X}");
            let fields = [
                obs.power,
                obs.poor_signal,
                obs.heart_rate,
                obs.attention,
                obs.meditation,
                obs.blink_strength,
            ];
            assert_eq!(fields.iter().filter(|&&v| v == 42).count(), 1);
            assert_eq!(obs.raw, 0);
            assert_eq!(obs.eeg, EegPower::default());
            assert_eq!(out.event.as_ref().and_then(|e| e.observation()), Some(&obs));
            assert_eq!(out.command, None);
        }
    }

    #[test]
    fn raw_is_signed_big_endian() {
        let mut obs = Observation::default();
        let out = interpret(&mut obs, &row(CODE_RAW_SIGNAL, &[0xFF, 0x38]));
        assert_eq!(obs.raw, -200);
        assert!(matches!(out.event, Some(ThinkGearEvent::Raw(o)) if o.raw == -200));
    }

    #[test]
    fn eeg_power_updates_all_bands() {
        let mut obs = Observation::default();
        let value = encode_eeg_power([1, 2, 3, 4, 5, 6, 7, 0x00AB_CDEF]);
        let out = interpret(&mut obs, &row(CODE_ASIC_EEG_POWER, &value));
        assert_eq!(obs.eeg.to_array(), [1, 2, 3, 4, 5, 6, 7, 0x00AB_CDEF]);
        assert!(matches!(out.event, Some(ThinkGearEvent::Eeg(o)) if o.eeg.delta == 1));
    }

    #[test]
    fn spec_eeg_record_decodes_to_one_through_eight() {
        let value = [0, 0, 1, 0, 0, 2, 0, 0, 3, 0, 0, 4, 0, 0, 5, 0, 0, 6, 0, 0, 7, 0, 0, 8];
        let mut obs = Observation::default();
        interpret(&mut obs, &row(CODE_ASIC_EEG_POWER, &value));
        assert_eq!(obs.eeg.to_array(), [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn standby_requests_autoconnect() {
        let mut obs = Observation::default();
        let out = interpret(&mut obs, &row(CODE_STANDBY, &[]));
        assert_eq!(out.command, Some(COMMAND_AUTOCONNECT));
        assert!(matches!(out.event, Some(ThinkGearEvent::Connecting(_))));
        assert_eq!(obs, Observation::default());
    }

    #[test]
    fn headset_connected_is_ready() {
        let mut obs = Observation::default();
        let out = interpret(&mut obs, &row(CODE_HEADSET_CONNECTED, &[0x12, 0x34]));
        assert!(matches!(out.event, Some(ThinkGearEvent::Ready(_))));
        assert_eq!(out.command, None);
    }

    #[test]
    fn headset_not_found_is_error_without_mutation() {
        let mut obs = Observation {
            attention: 33,
            ..Default::default()
        };
        let before = obs;
        let out = interpret(&mut obs, &row(CODE_HEADSET_NOT_FOUND, &[0x00]));
        assert_eq!(obs, before);
        assert_eq!(
            out.event,
            Some(ThinkGearEvent::Error("Headset not found".to_owned()))
        );
        assert_eq!(out.command, None);
    }

    #[test]
    fn blink_does_not_fall_through_to_standby() {
        let mut obs = Observation::default();
        let out = interpret(&mut obs, &row(CODE_BLINK_STRENGTH, &[120]));
        assert_eq!(obs.blink_strength, 120);
        assert!(matches!(out.event, Some(ThinkGearEvent::BlinkStrength(_))));
        assert_eq!(out.command, None);
    }

    #[test]
    fn unknown_codes_and_levels_are_ignored() {
        let mut obs = Observation::default();
        assert_eq!(interpret(&mut obs, &row(0x06, &[9])), Interpretation::default());
        assert_eq!(interpret(&mut obs, &row(0x90, &[1, 2, 3])), Interpretation::default());

        let extended = DataRow {
            excode_level: 1,
            code: CODE_ATTENTION,
            value: vec![99],
        };
        assert_eq!(interpret(&mut obs, &extended), Interpretation::default());
        assert_eq!(obs, Observation::default());
    }

    #[test]
    fn short_rows_are_dropped() {
        let mut obs = Observation::default();
        assert_eq!(interpret(&mut obs, &row(CODE_RAW_SIGNAL, &[0x01])), Interpretation::default());
        assert_eq!(
            interpret(&mut obs, &row(CODE_ASIC_EEG_POWER, &[0; 23])),
            Interpretation::default()
        );
        assert_eq!(interpret(&mut obs, &row(CODE_ATTENTION, &[])), Interpretation::default());
        assert_eq!(obs, Observation::default());
    }
}
