//! BitCounter: an n-bit register with an optional match flag and a
//! synchronous load input.
//!
//! Every sequential element in the machine is built from this one counter.
//! The debouncers, the scan position and the fast-forward repeat all differ
//! only in their `CounterConfig`.

use crate::config::ConfigError;

/// Widest register a counter can hold.
pub const MAX_WIDTH: u32 = u32::BITS;

/// Construction-time shape of a counter.
///
/// All fields are always present. `None` means the optional input or output
/// does not exist: without `observe_reset` the `observe` input is ignored,
/// and without `overflow_at` the `overflow` flag is always false.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CounterConfig {
    /// Used in error messages.
    pub name: &'static str,
    pub width: u32,
    pub overflow_at: Option<u32>,
    pub single_shot: bool,
    pub observe_reset: Option<u32>,
}

impl CounterConfig {
    /// A plain free-running counter.
    pub const fn new(name: &'static str, width: u32) -> Self {
        Self {
            name,
            width,
            overflow_at: None,
            single_shot: false,
            observe_reset: None,
        }
    }

    pub const fn overflow_at(mut self, value: u32) -> Self {
        self.overflow_at = Some(value);
        self
    }

    /// Hold at zero instead of counting out of it.
    pub const fn single_shot(mut self) -> Self {
        self.single_shot = true;
        self
    }

    /// Load `value` on every tick where `observe` is asserted.
    pub const fn observe_reset(mut self, value: u32) -> Self {
        self.observe_reset = Some(value);
        self
    }

    /// Verify the width and every constant fit. Returns the value mask.
    pub fn check(&self) -> Result<u32, ConfigError> {
        if self.width > MAX_WIDTH {
            return Err(ConfigError::WidthTooLarge {
                name: self.name,
                width: self.width,
            });
        }
        let mask = mask_for(self.width);

        let constants = [
            ("overflow_at", self.overflow_at),
            ("observe_reset", self.observe_reset),
        ];
        for (field, value) in constants {
            if let Some(value) = value {
                if value > mask {
                    return Err(ConfigError::ValueDoesNotFit {
                        name: self.name,
                        field,
                        value,
                        width: self.width,
                    });
                }
            }
        }

        Ok(mask)
    }
}

fn mask_for(width: u32) -> u32 {
    if width >= MAX_WIDTH {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitCounter {
    config: CounterConfig,
    mask: u32,
    count: u32,
}

impl BitCounter {
    /// Build a counter starting at zero.
    pub fn new(config: CounterConfig) -> Result<Self, ConfigError> {
        let mask = config.check()?;
        Ok(Self {
            config,
            mask,
            count: 0,
        })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    /// True while the current (pre-tick) count equals `overflow_at`.
    pub fn overflow(&self) -> bool {
        self.config.overflow_at.is_some_and(|at| self.count == at)
    }

    /// The value `count` takes at the next tick boundary.
    ///
    /// The order is a strict priority list: a load beats an increment,
    /// and an increment beats holding at zero.
    pub fn next_count(&self, observe: bool) -> u32 {
        if let Some(reset) = self.config.observe_reset.filter(|_| observe) {
            reset
        } else if !self.config.single_shot || self.count > 0 {
            self.count.wrapping_add(1) & self.mask
        } else {
            self.count
        }
    }

    pub fn tick(&mut self, observe: bool) {
        self.count = self.next_count(observe);
    }
}
