//! Scan position and brightness gating.
//!
//! A single free-running master counter is sliced into three fields, low to
//! high: the brightness phase (`hold_power` bits), the row (2 bits) and the
//! column (2 bits). The phase changes fastest, so each cell is held for
//! `2^hold_power` ticks before the scan moves on, and the column changes
//! slowest.
//!
//! ```text
//!  msb                                   lsb
//!  [ column:2 ][ row:2 ][ phase:hold_power ]
//! ```

use crate::config::{ConfigError, MachineConfig};
use crate::counter::BitCounter;
use serde::Serialize;

/// Row that gets the full-intensity threshold. Every other row is dim.
pub const FULL_ROW: u8 = 3;

/// The cell currently selected by the master counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanCoordinates {
    pub row: u8,
    pub column: u8,
    pub phase: u32,
}

// ── ScanPositionDecoder ──────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanPositionDecoder {
    hold_power: u32,
    master: BitCounter,
}

impl ScanPositionDecoder {
    pub fn new(config: &MachineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            hold_power: config.hold_power,
            master: BitCounter::new(config.scan_counter())?,
        })
    }

    /// Slice a master count into its fields.
    ///
    /// A phase field wider than the count takes every bit, leaving row and
    /// column at 0.
    pub fn decode(hold_power: u32, count: u32) -> ScanCoordinates {
        let phase_mask = 1u64.checked_shl(hold_power).map_or(u64::MAX, |p| p - 1);
        let count = u64::from(count);
        let field = |shift: u32| count.checked_shr(shift).unwrap_or(0) & 0b11;
        ScanCoordinates {
            phase: (count & phase_mask) as u32,
            row: field(hold_power) as u8,
            column: field(hold_power.saturating_add(2)) as u8,
        }
    }

    pub fn coordinates(&self) -> ScanCoordinates {
        Self::decode(self.hold_power, self.master.count())
    }

    pub fn hold_power(&self) -> u32 {
        self.hold_power
    }

    /// Ticks in one full pass over every (phase, row, column).
    pub fn sweep_ticks(&self) -> u64 {
        16u64 << self.hold_power
    }

    pub fn tick(&mut self) {
        self.master.tick(false);
    }
}

// ── IntensityGate ────────────────────────────────────────────────────

/// Two PWM-style brightness levels multiplexed into the scan.
///
/// A cell may light during the phases below its row's threshold. An absent
/// threshold always passes, and so does one at or above the phase range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntensityGate {
    hold_power: u32,
    full_intensity: Option<u32>,
    dim_intensity: Option<u32>,
}

impl IntensityGate {
    pub const fn new(
        hold_power: u32,
        full_intensity: Option<u32>,
        dim_intensity: Option<u32>,
    ) -> Self {
        Self {
            hold_power,
            full_intensity,
            dim_intensity,
        }
    }

    pub fn from_config(config: &MachineConfig) -> Self {
        Self::new(
            config.hold_power,
            config.full_intensity,
            config.dim_intensity,
        )
    }

    pub fn may_light_full(&self, phase: u32) -> bool {
        self.full_intensity.is_none_or(|threshold| phase < threshold)
    }

    pub fn may_light_dim(&self, phase: u32) -> bool {
        self.dim_intensity.is_none_or(|threshold| phase < threshold)
    }

    /// Gate for the cell currently being scanned.
    pub fn may_light(&self, coords: ScanCoordinates) -> bool {
        if coords.row == FULL_ROW {
            self.may_light_full(coords.phase)
        } else {
            self.may_light_dim(coords.phase)
        }
    }

    /// Fraction of a cell's hold time during which `row` passes the gate.
    pub fn duty(&self, row: u8) -> f32 {
        let threshold = if row == FULL_ROW {
            self.full_intensity
        } else {
            self.dim_intensity
        };
        match (threshold, 1u64.checked_shl(self.hold_power)) {
            (None, _) => 1.0,
            (Some(t), Some(phases)) => u64::from(t).min(phases) as f32 / phases as f32,
            // 2^64 phases or more: any u32 threshold is a vanishing fraction.
            (Some(_), None) => 0.0,
        }
    }
}
