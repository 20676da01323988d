//! Cycle-accurate model of a 4x4 LED matrix scanner.
//!
//! The core is a synchronous state machine clocked one tick at a time:
//! - `counter`, `edge`, `debounce`: the sequential building blocks
//! - `scan`: scan position and brightness gating from a master counter
//! - `grid`, `display`: the bitmap and the physical line levels it produces
//! - `animation`: button handling that scrolls and feeds the grid
//! - `machine`: everything wired together with register-transfer semantics
//!
//! Around the core sit the pieces the binary uses: `trace` for VCD
//! waveform dumps, `runner` for the real-time simulation thread and
//! `server` for the HTTP API.

pub mod animation;
pub mod config;
pub mod counter;
pub mod debounce;
pub mod display;
pub mod edge;
pub mod grid;
pub mod machine;
pub mod runner;
pub mod scan;
pub mod server;
pub mod trace;

pub use animation::ButtonInputs;
pub use config::{ConfigError, MachineConfig};
pub use display::DriveSignals;
pub use grid::GridBuffer;
pub use machine::{Frame, Machine};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ── Shutdown ───────────────────────────────────────────────────────

/// Set up a Ctrl+C handler that sets `running` to false.
///
/// # Rust concept: Arc and AtomicBool
/// The flag is shared between the simulation loop and the signal handler.
/// `Arc` lets both own it, and `AtomicBool` makes a single bool safe to
/// share without a mutex.
pub fn setup_signal_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    Ok(running)
}

/// Check if the main loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}
