//! Machine configuration and the errors construction can report.
//!
//! Every parameter is fixed when the machine is built. Nothing here changes
//! at runtime, so the only failure the core can ever report is a
//! configuration that would not fit in its registers.
//!
//! ## Rust concepts
//! - `#[serde(default)]` so a JSON file only needs the fields it overrides
//! - `Option<u32>` as an explicit "absent" marker instead of magic numbers
//! - A hand-written error enum implementing `std::error::Error`

use crate::counter::{CounterConfig, MAX_WIDTH};
use crate::debounce::Debouncer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Bits of the master counter above the brightness phase: 2 for the row, 2 for the column.
pub const SCAN_FIELD_BITS: u32 = 4;

// ── Errors ───────────────────────────────────────────────────────────

/// Why a configuration was rejected.
#[derive(Debug)]
pub enum ConfigError {
    /// A register would need more bits than a counter can hold.
    WidthTooLarge { name: &'static str, width: u32 },
    /// A constant is compared against or loaded into a register too narrow for it.
    ValueDoesNotFit {
        name: &'static str,
        field: &'static str,
        value: u32,
        width: u32,
    },
    /// The configuration file could not be read.
    Io(std::io::Error),
    /// The configuration file is not valid JSON for `MachineConfig`.
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WidthTooLarge { name, width } => write!(
                f,
                "{name}: a {width}-bit register does not fit in {MAX_WIDTH} bits"
            ),
            Self::ValueDoesNotFit {
                name,
                field,
                value,
                width,
            } => write!(
                f,
                "{name}.{field}: value {value} does not fit in a {width}-bit register"
            ),
            Self::Io(e) => write!(f, "failed to read config: {e}"),
            Self::Parse(e) => write!(f, "failed to parse config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

// ── MachineConfig ────────────────────────────────────────────────────

/// Construction-time parameters of the scanner and the animation logic.
///
/// # Rust concept: one struct, every field present
/// Thresholds are `Option<u32>`: `None` means "no threshold, always lit".
/// A threshold at or above the phase range is also accepted and simply
/// never blocks, so there is no separate "disabled" variant to check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MachineConfig {
    /// Width of the brightness phase field; 0 disables dimming.
    pub hold_power: u32,
    /// Phase threshold for the full-brightness row.
    pub full_intensity: Option<u32>,
    /// Phase threshold for the three dim rows.
    pub dim_intensity: Option<u32>,
    /// Debounce window is `2^watch_power - 1` ticks.
    pub watch_power: u32,
    /// Fast-forward repeats every `2^ffwd_animate_power` ticks.
    pub ffwd_animate_power: u32,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            hold_power: 2,
            full_intensity: None,
            dim_intensity: Some(1),
            watch_power: 4,
            ffwd_animate_power: 5,
        }
    }
}

impl MachineConfig {
    /// Load a configuration from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// The free-running master counter that drives the scan.
    pub fn scan_counter(&self) -> CounterConfig {
        CounterConfig::new("scan_master", self.hold_power.saturating_add(SCAN_FIELD_BITS))
    }

    pub fn watcher_counter(&self, name: &'static str) -> CounterConfig {
        Debouncer::counter_config(name, self.watch_power)
    }

    /// The auto-repeat counter, held at 0 while fast-forward is settled.
    pub fn ffwd_pulse_counter(&self) -> CounterConfig {
        CounterConfig::new("ffwd_pulse", self.ffwd_animate_power)
            .overflow_at(1)
            .observe_reset(0)
    }

    /// Check every register this configuration would build.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scan_counter().check()?;
        self.watcher_counter("step_watcher").check()?;
        self.watcher_counter("ffwd_watcher").check()?;
        self.ffwd_pulse_counter().check()?;
        Ok(())
    }
}
