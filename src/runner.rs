//! Simulation thread: owns the `Machine` and processes commands via a channel.
//!
//! The machine is plain single-owner state, so it lives on one dedicated
//! thread that clocks it in real time. The async HTTP server talks to that
//! thread by sending `SimCommand` values through an `mpsc` channel and reads
//! back a `SimStatus` snapshot published behind `Arc<Mutex<_>>`.
//!
//! ## Rust concepts
//! - `std::sync::mpsc` channels for thread communication
//! - `try_recv()` to drain commands between batches without blocking
//! - Integer time accounting so no ticks are lost to rounding

use crate::animation::ButtonInputs;
use crate::machine::Machine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// How often the thread wakes up to clock a batch and publish status.
pub const BATCH_PERIOD: Duration = Duration::from_millis(20);

/// Upper bound on ticks clocked in one batch, so a stalled thread cannot
/// spend seconds catching up.
pub const MAX_BATCH_TICKS: u64 = 1_000_000;

// ── Buttons ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    Step,
    Ffwd,
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step => f.write_str("step"),
            Self::Ffwd => f.write_str("ffwd"),
        }
    }
}

impl FromStr for Button {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "step" => Ok(Self::Step),
            "ffwd" => Ok(Self::Ffwd),
            other => Err(format!("unknown button: {other}")),
        }
    }
}

fn set_button(inputs: &mut ButtonInputs, button: Button, pressed: bool) {
    match button {
        Button::Step => inputs.step = pressed,
        Button::Ffwd => inputs.ffwd = pressed,
    }
}

// ── Commands ─────────────────────────────────────────────────────────

/// Commands sent from the HTTP server to the simulation thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimCommand {
    /// Hold a button line high or low until told otherwise
    SetButton { button: Button, pressed: bool },
    /// Hold a button line high for exactly one tick
    Tap(Button),
    /// Stop clocking; commands are still processed
    Pause,
    Resume,
    /// Return every register, and the grid, to power-up values
    Reset,
    /// Ticks per second
    SetTickRate(u32),
}

// ── Status ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SimState {
    Running,
    Paused,
}

/// Averaged brightness of the 4x4 matrix.
#[derive(Clone, Debug, PartialEq, Serialize, utoipa::ToSchema)]
pub struct FrameSnapshot {
    /// One string per row: `#` full, `+` dimmed, `.` off
    pub rows: Vec<String>,
    /// Brightness per cell, row-major, 0.0 to 1.0
    pub brightness: Vec<Vec<f32>>,
}

/// Shared status that the HTTP server reads to report current state.
#[derive(Clone, Debug, PartialEq, Serialize, utoipa::ToSchema)]
pub struct SimStatus {
    pub state: SimState,
    /// Ticks clocked since start or the last reset
    pub tick: u64,
    /// Grid bitmap, bit `row * 4 + column`
    pub grid: u16,
    pub step_settled: bool,
    pub ffwd_settled: bool,
    /// Raw line levels currently applied
    pub step_pressed: bool,
    pub ffwd_pressed: bool,
    pub frame: FrameSnapshot,
    /// Ticks per second
    pub tick_rate: u32,
    /// Server version
    pub version: String,
}

// ── Simulation ───────────────────────────────────────────────────────

/// The machine plus the input lines and clock bookkeeping around it.
///
/// Everything here is synchronous and deterministic; `simulation_loop`
/// only adds the thread, the channel and wall-clock time.
pub struct Simulation {
    machine: Machine,
    inputs: ButtonInputs,
    /// Lines to drop after the next tick, one flag per tapped button.
    pending_release: ButtonInputs,
    state: SimState,
    tick_rate: u32,
    /// Leftover `nanoseconds * tick_rate`, always below one tick.
    carry_nanos: u128,
}

impl Simulation {
    pub fn new(machine: Machine, tick_rate: u32) -> Self {
        Self {
            machine,
            inputs: ButtonInputs::default(),
            pending_release: ButtonInputs::default(),
            state: SimState::Running,
            tick_rate,
            carry_nanos: 0,
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn apply(&mut self, cmd: SimCommand) {
        match cmd {
            SimCommand::SetButton { button, pressed } => {
                tracing::debug!(%button, pressed, "button line set");
                set_button(&mut self.inputs, button, pressed);
                set_button(&mut self.pending_release, button, false);
            }
            SimCommand::Tap(button) => {
                tracing::debug!(%button, "button tapped");
                set_button(&mut self.inputs, button, true);
                set_button(&mut self.pending_release, button, true);
            }
            SimCommand::Pause => {
                self.state = SimState::Paused;
                tracing::info!(tick = self.machine.ticks(), "simulation paused");
            }
            SimCommand::Resume => {
                self.state = SimState::Running;
                self.carry_nanos = 0;
                tracing::info!(tick = self.machine.ticks(), "simulation resumed");
            }
            SimCommand::Reset => {
                // The config was validated when the machine was built.
                if let Err(e) = self.machine.reset() {
                    tracing::error!("Failed to reset machine: {}", e);
                }
                self.inputs = ButtonInputs::default();
                self.pending_release = ButtonInputs::default();
                self.carry_nanos = 0;
                tracing::info!("simulation reset");
            }
            SimCommand::SetTickRate(hz) => {
                self.tick_rate = hz;
                self.carry_nanos = 0;
                tracing::info!("Tick rate set to {} Hz", hz);
            }
        }
    }

    /// Clock one tick, releasing every tapped button afterwards.
    pub fn step(&mut self) {
        self.machine.tick(self.inputs);
        let release = std::mem::take(&mut self.pending_release);
        if release.step {
            self.inputs.step = false;
        }
        if release.ffwd {
            self.inputs.ffwd = false;
        }
    }

    /// Clock as many ticks as `elapsed` is worth at the current rate.
    /// Returns the number clocked.
    pub fn advance(&mut self, elapsed: Duration) -> u64 {
        if self.state == SimState::Paused {
            return 0;
        }

        self.carry_nanos += elapsed.as_nanos() * u128::from(self.tick_rate);
        let due = self.carry_nanos / 1_000_000_000;
        self.carry_nanos %= 1_000_000_000;

        let ticks = u64::try_from(due).unwrap_or(u64::MAX).min(MAX_BATCH_TICKS);
        for _ in 0..ticks {
            self.step();
        }
        ticks
    }

    pub fn status(&self) -> SimStatus {
        let frame = self.machine.frame();
        SimStatus {
            state: self.state,
            tick: self.machine.ticks(),
            grid: self.machine.grid().bits(),
            step_settled: self.machine.step_settled(),
            ffwd_settled: self.machine.ffwd_settled(),
            step_pressed: self.inputs.step,
            ffwd_pressed: self.inputs.ffwd,
            frame: FrameSnapshot {
                rows: frame.render_rows(),
                brightness: frame.cells.iter().map(|row| row.to_vec()).collect(),
            },
            tick_rate: self.tick_rate,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// ── Simulation loop ──────────────────────────────────────────────────

/// Main simulation loop. Runs on a dedicated thread and returns once the
/// channel is closed (sender dropped).
///
/// While running, it wakes every `BATCH_PERIOD`, drains pending commands,
/// clocks the ticks that are due, and publishes status. While paused, it
/// blocks on `recv()` instead of spinning.
pub fn simulation_loop(
    rx: Receiver<SimCommand>,
    status: Arc<Mutex<SimStatus>>,
    mut sim: Simulation,
) {
    tracing::info!(
        "Simulation thread started at {} Hz ({} ticks per sweep)",
        sim.tick_rate,
        sim.machine.sweep_ticks()
    );

    let mut last = Instant::now();

    loop {
        loop {
            match rx.try_recv() {
                Ok(cmd) => sim.apply(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::info!("Simulation thread: channel closed, shutting down.");
                    publish(&status, &sim);
                    return;
                }
            }
        }

        if sim.state == SimState::Paused {
            publish(&status, &sim);
            match rx.recv() {
                Ok(cmd) => sim.apply(cmd),
                Err(_) => {
                    tracing::info!("Simulation thread: channel closed, shutting down.");
                    return;
                }
            }
            last = Instant::now();
            continue;
        }

        let now = Instant::now();
        let ticks = sim.advance(now - last);
        last = now;
        if ticks == MAX_BATCH_TICKS {
            tracing::warn!("Simulation fell behind; clocked {} ticks in one batch", ticks);
        }

        publish(&status, &sim);
        thread::sleep(BATCH_PERIOD);
    }
}

fn publish(status: &Mutex<SimStatus>, sim: &Simulation) {
    let snapshot = sim.status();
    match status.lock() {
        Ok(mut s) => *s = snapshot,
        Err(poisoned) => *poisoned.into_inner() = snapshot,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MachineConfig;
    use crate::grid::GridBuffer;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::mpsc;

    fn simulation(grid: u16, tick_rate: u32) -> Simulation {
        let machine = Machine::with_grid(MachineConfig::default(), GridBuffer::new(grid)).unwrap();
        Simulation::new(machine, tick_rate)
    }

    #[rstest]
    #[case("step", Button::Step)]
    #[case("ffwd", Button::Ffwd)]
    fn button_parses_from_its_display_name(#[case] name: &str, #[case] button: Button) {
        assert_eq!(name.parse::<Button>().unwrap(), button);
        assert_eq!(button.to_string(), name);
    }

    #[test]
    fn unknown_button_does_not_parse() {
        assert!("play".parse::<Button>().is_err());
    }

    #[rstest]
    #[case(1000, Duration::from_millis(20), 20)]
    #[case(50, Duration::from_millis(20), 1)]
    #[case(1, Duration::from_millis(999), 0)]
    fn advance_converts_time_to_ticks(
        #[case] tick_rate: u32,
        #[case] elapsed: Duration,
        #[case] expected: u64,
    ) {
        let mut sim = simulation(0, tick_rate);
        assert_eq!(sim.advance(elapsed), expected);
        assert_eq!(sim.machine().ticks(), expected);
    }

    #[test]
    fn advance_carries_fractional_ticks() {
        let mut sim = simulation(0, 30);
        let total: u64 = (0..50).map(|_| sim.advance(Duration::from_millis(20))).sum();
        assert_eq!(total, 30);
    }

    #[test]
    fn paused_simulation_does_not_advance() {
        let mut sim = simulation(0, 1000);
        sim.apply(SimCommand::Pause);
        assert_eq!(sim.advance(Duration::from_secs(1)), 0);
        assert_eq!(sim.status().state, SimState::Paused);

        sim.apply(SimCommand::Resume);
        assert_eq!(sim.advance(Duration::from_millis(5)), 5);
    }

    #[test]
    fn tap_holds_line_for_one_tick_and_scrolls_once() {
        let mut sim = simulation(0xA53C, 1000);
        sim.apply(SimCommand::Tap(Button::Step));
        assert!(sim.status().step_pressed);

        sim.step();
        assert!(!sim.status().step_pressed);
        assert!(!sim.status().step_settled);

        sim.advance(Duration::from_millis(100));
        assert_eq!(sim.status().grid, 0xAA53);
        assert!(sim.status().step_settled);
    }

    #[test]
    fn taps_on_both_buttons_release_both_lines() {
        let mut sim = simulation(0, 1000);
        sim.apply(SimCommand::Tap(Button::Step));
        sim.apply(SimCommand::Tap(Button::Ffwd));
        let status = sim.status();
        assert!(status.step_pressed && status.ffwd_pressed);

        sim.step();
        let status = sim.status();
        assert!(!status.step_pressed);
        assert!(!status.ffwd_pressed);

        sim.advance(Duration::from_millis(100));
        let status = sim.status();
        assert!(status.step_settled);
        assert!(status.ffwd_settled);
    }

    #[test]
    fn hold_after_tap_keeps_line_high() {
        let mut sim = simulation(0, 1000);
        sim.apply(SimCommand::Tap(Button::Ffwd));
        sim.apply(SimCommand::SetButton {
            button: Button::Ffwd,
            pressed: true,
        });
        sim.advance(Duration::from_millis(10));
        assert!(sim.status().ffwd_pressed);
        assert!(!sim.status().ffwd_settled);
    }

    #[test]
    fn release_after_tap_is_not_undone() {
        let mut sim = simulation(0, 1000);
        sim.apply(SimCommand::Tap(Button::Step));
        sim.apply(SimCommand::SetButton {
            button: Button::Step,
            pressed: false,
        });
        sim.step();
        assert!(!sim.status().step_pressed);
        assert!(sim.status().step_settled);
    }

    #[test]
    fn held_ffwd_changes_feed_lane() {
        let mut sim = simulation(0, 1000);
        sim.apply(SimCommand::SetButton {
            button: Button::Ffwd,
            pressed: true,
        });
        sim.advance(Duration::from_millis(10));
        assert!(sim.status().ffwd_pressed);
        assert!(!sim.status().ffwd_settled);
        assert_ne!(sim.status().grid, 0);
    }

    #[test]
    fn reset_restores_grid_and_releases_buttons() {
        let mut sim = simulation(0x00F0, 1000);
        sim.apply(SimCommand::SetButton {
            button: Button::Ffwd,
            pressed: true,
        });
        sim.advance(Duration::from_millis(50));
        sim.apply(SimCommand::Reset);

        let status = sim.status();
        assert_eq!(status.grid, 0x00F0);
        assert_eq!(status.tick, 0);
        assert!(!status.ffwd_pressed);
    }

    #[test]
    fn status_reports_frame_and_rate() {
        let mut sim = simulation(0x8001, 250);
        sim.apply(SimCommand::SetTickRate(500));
        let status = sim.status();
        assert_eq!(status.tick_rate, 500);
        assert_eq!(status.frame.rows, vec!["+...", "....", "....", "...#"]);
        assert_eq!(status.frame.brightness[0][0], 0.25);
    }

    #[test]
    fn running_loop_exits_and_publishes_when_sender_dropped() {
        let (tx, rx) = mpsc::channel();
        let sim = simulation(0, 1000);
        let status = Arc::new(Mutex::new(sim.status()));

        let thread_status = status.clone();
        let handle = thread::spawn(move || simulation_loop(rx, thread_status, sim));

        tx.send(SimCommand::SetTickRate(750)).unwrap();
        thread::sleep(BATCH_PERIOD * 3);
        drop(tx);
        handle.join().unwrap();

        let s = status.lock().unwrap();
        assert_eq!(s.state, SimState::Running);
        assert_eq!(s.tick_rate, 750);
    }

    #[test]
    fn loop_exits_when_sender_dropped() {
        let (tx, rx) = mpsc::channel();
        let sim = simulation(0, 1000);
        let status = Arc::new(Mutex::new(sim.status()));

        let thread_status = status.clone();
        let handle = thread::spawn(move || simulation_loop(rx, thread_status, sim));

        tx.send(SimCommand::SetTickRate(2000)).unwrap();
        tx.send(SimCommand::Pause).unwrap();
        drop(tx);
        handle.join().unwrap();

        let s = status.lock().unwrap();
        assert_eq!(s.tick_rate, 2000);
        assert_eq!(s.state, SimState::Paused);
    }
}
