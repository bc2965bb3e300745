//! Relative band power: normalised ratios and a ranked view of the eight
//! ASIC EEG bands.
//!
//! The headset reports absolute band magnitudes whose scale drifts with
//! contact quality, so consumers usually care about each band's share of the
//! total and about which bands dominate.  [`BandPowers`] keeps one
//! [`BandEntry`] per band with one step of history, and a ranking sorted by
//! magnitude.

use std::fmt;

use serde::Serialize;

use crate::types::{BandKind, EegPower};

/// Current and previous magnitude and ratio of one band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandEntry {
    pub kind: BandKind,
    pub value: u32,
    pub previous_value: u32,
    /// `value / total` of the last non-zero feed.
    pub ratio: f64,
    pub previous_ratio: f64,
}

impl BandEntry {
    pub fn new(kind: BandKind) -> Self {
        Self {
            kind,
            value: 0,
            previous_value: 0,
            ratio: 0.0,
            previous_ratio: 0.0,
        }
    }

    fn feed(&mut self, value: u32, total: u64) {
        self.previous_value = self.value;
        self.previous_ratio = self.ratio;
        self.value = value;
        self.ratio = value as f64 / total as f64;
    }

    /// Change in magnitude since the previous feed.
    pub fn value_delta(&self) -> i64 {
        self.value as i64 - self.previous_value as i64
    }

    /// Change in ratio since the previous feed.
    pub fn ratio_delta(&self) -> f64 {
        self.ratio - self.previous_ratio
    }
}

/// Renders as `LA=12.5(3000)`: abbreviation, percentage share, raw magnitude.
impl fmt::Display for BandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}({})", self.kind, self.ratio * 100.0, self.value)
    }
}

/// The eight [`BandEntry`]s of a session plus their ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandPowers {
    entries: [BandEntry; 8],
    /// Band indices sorted descending by `value`.
    ranking: [usize; 8],
}

impl BandPowers {
    pub fn new() -> Self {
        Self {
            entries: BandKind::ALL.map(BandEntry::new),
            ranking: [0, 1, 2, 3, 4, 5, 6, 7],
        }
    }

    /// Update every band from a fresh set of magnitudes.
    ///
    /// When the magnitudes sum to zero (typical right after connecting, before
    /// the first real EEG packet) nothing changes: values, ratios and ranking
    /// all keep their last state.  Returns `true` if the entries were updated.
    pub fn feed(&mut self, power: &EegPower) -> bool {
        let total = power.total();
        if total == 0 {
            return false;
        }

        for (entry, value) in self.entries.iter_mut().zip(power.to_array()) {
            entry.feed(value, total);
        }

        // `sort_by` is stable: equal magnitudes keep their previous order.
        let entries = &self.entries;
        self.ranking
            .sort_by(|&a, &b| entries[b].value.cmp(&entries[a].value));
        true
    }

    pub fn get(&self, kind: BandKind) -> &BandEntry {
        &self.entries[kind.index()]
    }

    /// Entries in wire order (delta first).
    pub fn entries(&self) -> &[BandEntry; 8] {
        &self.entries
    }

    /// Entries from the strongest band to the weakest.
    pub fn ranked(&self) -> impl Iterator<Item = &BandEntry> + '_ {
        self.ranking.iter().map(move |&i| &self.entries[i])
    }

    /// Band kinds from the strongest to the weakest.
    pub fn ranked_kinds(&self) -> [BandKind; 8] {
        self.ranking.map(|i| self.entries[i].kind)
    }

    /// The band with the largest magnitude after the last non-zero feed.
    pub fn dominant(&self) -> &BandEntry {
        &self.entries[self.ranking[0]]
    }
}

impl Default for BandPowers {
    fn default() -> Self {
        Self::new()
    }
}

/// Ranked entries separated by spaces, e.g. `MG=22.2(8) LG=19.4(7) …`.
impl fmt::Display for BandPowers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.ranked().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn power(v: [u32; 8]) -> EegPower {
        EegPower::from_array(v)
    }

    #[test]
    fn ratios_and_ranking() {
        let mut bands = BandPowers::new();
        assert!(bands.feed(&power([1, 2, 3, 4, 5, 6, 7, 8])));

        let sum: f64 = bands.entries().iter().map(|e| e.ratio).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        for (i, entry) in bands.entries().iter().enumerate() {
            assert!((entry.ratio - (i as f64 + 1.0) / 36.0).abs() < 1e-12);
        }

        assert_eq!(
            bands.ranked_kinds(),
            [
                BandKind::MidGamma,
                BandKind::LowGamma,
                BandKind::HighBeta,
                BandKind::LowBeta,
                BandKind::HighAlpha,
                BandKind::LowAlpha,
                BandKind::Theta,
                BandKind::Delta,
            ]
        );
        assert_eq!(bands.dominant().kind, BandKind::MidGamma);
    }

    #[test]
    fn zero_total_is_a_no_op() {
        let mut bands = BandPowers::new();
        bands.feed(&power([1, 2, 3, 4, 5, 6, 7, 8]));
        let before = bands.clone();

        assert!(!bands.feed(&EegPower::default()));
        assert_eq!(bands, before);
    }

    #[test]
    fn zero_total_before_any_data_keeps_zero_ratios() {
        let mut bands = BandPowers::new();
        assert!(!bands.feed(&EegPower::default()));
        assert!(bands.entries().iter().all(|e| e.ratio == 0.0 && e.value == 0));
    }

    #[test]
    fn history_shifts_one_step() {
        let mut bands = BandPowers::new();
        bands.feed(&power([10, 0, 0, 0, 0, 0, 0, 10]));
        bands.feed(&power([30, 0, 0, 0, 0, 0, 0, 10]));

        let delta = bands.get(BandKind::Delta);
        assert_eq!(delta.value, 30);
        assert_eq!(delta.previous_value, 10);
        assert!((delta.ratio - 0.75).abs() < 1e-12);
        assert!((delta.previous_ratio - 0.5).abs() < 1e-12);
        assert_eq!(delta.value_delta(), 20);
        assert!((delta.ratio_delta() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn ties_keep_previous_order() {
        let mut bands = BandPowers::new();
        bands.feed(&power([5, 5, 1, 1, 1, 1, 1, 1]));
        assert_eq!(bands.ranked_kinds()[..2], [BandKind::Delta, BandKind::Theta]);

        // Theta overtakes delta, then they tie again: theta stays ahead.
        bands.feed(&power([5, 9, 1, 1, 1, 1, 1, 1]));
        bands.feed(&power([7, 7, 1, 1, 1, 1, 1, 1]));
        assert_eq!(bands.ranked_kinds()[..2], [BandKind::Theta, BandKind::Delta]);
    }

    #[test]
    fn display_uses_abbreviations() {
        let mut bands = BandPowers::new();
        bands.feed(&power([1, 0, 0, 0, 0, 0, 0, 3]));
        assert_eq!(bands.get(BandKind::MidGamma).to_string(), "MG=75(3)");
        assert!(bands.to_string().starts_with("MG=75(3) D=25(1)"));
    }
}
