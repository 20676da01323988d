//! The complete scanner: one call to `tick` is one clock edge.
//!
//! Every combinational signal for the tick is computed from pre-tick state
//! first. Only then are the registers committed, all at once, so no
//! component ever sees another component's update from the same tick.
//! The grid has a single writer (the animation rule) and is read by the
//! display driver in the same tick, which is why the next grid is always
//! built from the current one.

use crate::animation::{AnimationController, AnimationSignals, ButtonInputs};
use crate::config::{ConfigError, MachineConfig};
use crate::display::{self, DriveSignals};
use crate::grid::{GRID_SIZE, GridBuffer};
use crate::scan::{IntensityGate, ScanCoordinates, ScanPositionDecoder};
use serde::Serialize;

#[derive(Clone, Debug)]
pub struct Machine {
    config: MachineConfig,
    initial_grid: GridBuffer,

    scan: ScanPositionDecoder,
    gate: IntensityGate,
    animation: AnimationController,
    grid: GridBuffer,
    ticks: u64,
}

impl Machine {
    /// A machine with every register, including the grid, at zero.
    pub fn new(config: MachineConfig) -> Result<Self, ConfigError> {
        Self::with_grid(config, GridBuffer::default())
    }

    pub fn with_grid(config: MachineConfig, grid: GridBuffer) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            initial_grid: grid,
            scan: ScanPositionDecoder::new(&config)?,
            gate: IntensityGate::from_config(&config),
            animation: AnimationController::new(&config)?,
            grid,
            ticks: 0,
        })
    }

    /// Return every register to its power-up value. The grid goes back to
    /// the value the machine was built with.
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        *self = Self::with_grid(self.config, self.initial_grid)?;
        Ok(())
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    // ── Diagnostics (read-only) ──────────────────────────────────────

    pub fn grid(&self) -> GridBuffer {
        self.grid
    }

    pub fn step_settled(&self) -> bool {
        self.animation.step_settled()
    }

    pub fn ffwd_settled(&self) -> bool {
        self.animation.ffwd_settled()
    }

    pub fn coordinates(&self) -> ScanCoordinates {
        self.scan.coordinates()
    }

    /// Ticks clocked since construction or the last reset.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn sweep_ticks(&self) -> u64 {
        self.scan.sweep_ticks()
    }

    /// Scroll and fast-forward decisions for the current tick.
    pub fn animation_signals(&self) -> AnimationSignals {
        self.animation.evaluate()
    }

    /// Line levels for the current state, without advancing.
    pub fn outputs(&self) -> DriveSignals {
        let coords = self.scan.coordinates();
        display::drive(coords, self.grid, self.gate.may_light(coords))
    }

    /// What an observer sees averaged over a full sweep.
    pub fn frame(&self) -> Frame {
        let mut cells = [[0.0; GRID_SIZE as usize]; GRID_SIZE as usize];
        for row in 0..GRID_SIZE {
            for column in 0..GRID_SIZE {
                if self.grid.bit(row, column) {
                    cells[usize::from(row)][usize::from(column)] = self.gate.duty(row);
                }
            }
        }
        Frame { cells }
    }

    // ── Clock ────────────────────────────────────────────────────────

    /// Clock one tick. Returns the line levels that were driven during it.
    pub fn tick(&mut self, inputs: ButtonInputs) -> DriveSignals {
        let outputs = self.outputs();
        let signals = self.animation.evaluate();
        let next_grid = self.grid.next(signals.may_scroll, signals.ffwd_active);

        if signals.may_scroll {
            tracing::debug!(
                tick = self.ticks,
                from = self.grid.bits(),
                to = next_grid.bits(),
                "grid scrolled"
            );
        }

        self.scan.tick();
        self.animation.tick(inputs);
        self.grid = next_grid;
        self.ticks += 1;

        outputs
    }

    /// Clock `count` ticks with the same inputs.
    pub fn run(&mut self, inputs: ButtonInputs, count: u64) {
        for _ in 0..count {
            self.tick(inputs);
        }
    }
}

// ── Frame ────────────────────────────────────────────────────────────

/// Perceived brightness of every cell, 0.0 (off) to 1.0 (full duty).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Frame {
    pub cells: [[f32; GRID_SIZE as usize]; GRID_SIZE as usize],
}

impl Frame {
    /// One line per row: `#` full, `+` dimmed, `.` off.
    pub fn render_rows(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&level| match level {
                        l if l <= 0.0 => '.',
                        l if l >= 1.0 => '#',
                        _ => '+',
                    })
                    .collect()
            })
            .collect()
    }

    pub fn render(&self) -> String {
        self.render_rows().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const IDLE: ButtonInputs = ButtonInputs {
        step: false,
        ffwd: false,
    };

    fn machine(config: MachineConfig, grid: u16) -> Machine {
        Machine::with_grid(config, GridBuffer::new(grid)).unwrap()
    }

    #[test]
    fn invalid_config_fails_at_construction() {
        let config = MachineConfig {
            hold_power: 40,
            ..MachineConfig::default()
        };
        assert!(Machine::new(config).is_err());
    }

    #[test]
    fn starts_with_both_buttons_settled() {
        let m = Machine::new(MachineConfig::default()).unwrap();
        assert!(m.step_settled());
        assert!(m.ffwd_settled());
        assert_eq!(m.grid(), GridBuffer::default());
        assert_eq!(m.ticks(), 0);
    }

    #[rstest]
    #[case(0, None, None)]
    #[case(2, None, Some(1))]
    #[case(3, Some(5), Some(2))]
    fn drives_at_most_the_scanned_cell(
        #[case] hold_power: u32,
        #[case] full_intensity: Option<u32>,
        #[case] dim_intensity: Option<u32>,
    ) {
        let config = MachineConfig {
            hold_power,
            full_intensity,
            dim_intensity,
            ..MachineConfig::default()
        };
        let mut m = machine(config, 0b1010_0101_0011_1100);
        let gate = IntensityGate::from_config(&config);

        for _ in 0..2 * m.sweep_ticks() {
            let coords = m.coordinates();
            let grid = m.grid();
            let out = m.tick(IDLE);

            let expected = (gate.may_light(coords) && grid.bit(coords.row, coords.column))
                .then_some((coords.row, coords.column));
            assert_eq!(out.lit_cell(), expected);
            if expected.is_none() {
                assert_eq!(out, DriveSignals::dark());
            }
        }
    }

    #[test]
    fn idle_clocking_leaves_grid_alone() {
        let mut m = machine(MachineConfig::default(), 0xBEEF);
        m.run(IDLE, 5_000);
        assert_eq!(m.grid().bits(), 0xBEEF);
        assert_eq!(m.ticks(), 5_000);
    }

    #[test]
    fn reset_restores_power_up_state() {
        let mut m = machine(MachineConfig::default(), 0x1234);
        m.run(
            ButtonInputs {
                step: false,
                ffwd: true,
            },
            50,
        );
        assert_ne!(m.grid().bits(), 0x1234);

        m.reset().unwrap();
        assert_eq!(m.grid().bits(), 0x1234);
        assert_eq!(m.ticks(), 0);
        assert!(m.ffwd_settled());
        assert_eq!(m.coordinates(), ScanCoordinates::default());
    }

    #[test]
    fn frame_uses_row_duty() {
        let config = MachineConfig {
            hold_power: 2,
            full_intensity: None,
            dim_intensity: Some(2),
            ..MachineConfig::default()
        };
        // (0, 0) and (3, 3) lit.
        let m = machine(config, 0x8001);
        let frame = m.frame();
        assert_eq!(frame.cells[0][0], 0.5);
        assert_eq!(frame.cells[3][3], 1.0);
        assert_eq!(frame.cells[1][1], 0.0);
        assert_eq!(frame.render(), "+...\n....\n....\n...#");
    }
}
