//! Debouncer: a single-shot BitCounter that reports a button as settled
//! once its line has stayed low for a full window.
//!
//! While the line is high the counter is forced to 1. Once it drops, the
//! counter climbs from 1, wraps through `2^watch_power` values and latches
//! at 0. The button is "settled" only while the counter sits at 0.

use crate::config::ConfigError;
use crate::counter::{BitCounter, CounterConfig};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Debouncer {
    counter: BitCounter,
}

impl Debouncer {
    /// Build from a watcher counter shape (see `Debouncer::counter_config`).
    pub fn new(config: CounterConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            counter: BitCounter::new(config)?,
        })
    }

    /// Counter shape of a watcher: held at 1 while the line is high, latches at 0.
    pub const fn counter_config(name: &'static str, watch_power: u32) -> CounterConfig {
        CounterConfig::new(name, watch_power)
            .single_shot()
            .overflow_at(0)
            .observe_reset(1)
    }

    pub fn with_watch_power(name: &'static str, watch_power: u32) -> Result<Self, ConfigError> {
        Self::new(Self::counter_config(name, watch_power))
    }

    /// No high level seen within the last window.
    pub fn settled(&self) -> bool {
        self.counter.overflow()
    }

    pub fn active(&self) -> bool {
        !self.settled()
    }

    /// Low ticks needed after the last high tick before `settled` returns.
    pub fn window(&self) -> u64 {
        (1u64 << self.counter.width()) - 1
    }

    pub fn tick(&mut self, line: bool) {
        self.counter.tick(line);
    }
}
