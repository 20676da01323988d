//! AnimationController: turn the two raw buttons into scroll and
//! fast-forward decisions for the grid.
//!
//! - `step_watcher` / `ffwd_watcher` debounce the step and fast-forward lines.
//! - `step_edge` pulses once when the step watcher leaves its settled state.
//! - `ffwd_pulse` counts only while fast-forward is active and matches 1
//!   once per `2^ffwd_animate_power` ticks.
//!
//! `may_scroll = step_edge.fire || ffwd_pulse.overflow`.

use crate::config::{ConfigError, MachineConfig};
use crate::counter::BitCounter;
use crate::debounce::Debouncer;
use crate::edge::EdgeDetector;

/// Raw, undebounced button lines sampled this tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ButtonInputs {
    pub step: bool,
    pub ffwd: bool,
}

/// Combinational outputs of the controller for the current tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnimationSignals {
    pub may_scroll: bool,
    pub ffwd_active: bool,
    pub step_settled: bool,
    pub ffwd_settled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnimationController {
    step_watcher: Debouncer,
    ffwd_watcher: Debouncer,
    step_edge: EdgeDetector,
    ffwd_pulse: BitCounter,
}

impl AnimationController {
    pub fn new(config: &MachineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            step_watcher: Debouncer::new(config.watcher_counter("step_watcher"))?,
            ffwd_watcher: Debouncer::new(config.watcher_counter("ffwd_watcher"))?,
            step_edge: EdgeDetector::new(),
            ffwd_pulse: BitCounter::new(config.ffwd_pulse_counter())?,
        })
    }

    pub fn evaluate(&self) -> AnimationSignals {
        let step_fire = self.step_edge.fire(self.step_watcher.active());
        AnimationSignals {
            may_scroll: step_fire || self.ffwd_pulse.overflow(),
            ffwd_active: self.ffwd_watcher.active(),
            step_settled: self.step_watcher.settled(),
            ffwd_settled: self.ffwd_watcher.settled(),
        }
    }

    pub fn step_settled(&self) -> bool {
        self.step_watcher.settled()
    }

    pub fn ffwd_settled(&self) -> bool {
        self.ffwd_watcher.settled()
    }

    /// Advance every register. Each one observes only pre-tick values.
    pub fn tick(&mut self, inputs: ButtonInputs) {
        let step_active = self.step_watcher.active();
        let ffwd_settled = self.ffwd_watcher.settled();

        self.step_edge.tick(step_active);
        self.ffwd_pulse.tick(ffwd_settled);
        self.step_watcher.tick(inputs.step);
        self.ffwd_watcher.tick(inputs.ffwd);
    }
}
