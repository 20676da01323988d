//! LED Scan command-line tool
//!
//! Clocks the 4x4 scanner model either offline or in real time.
//!
//! ## Subcommands
//! - `simulate`: run a fixed number of ticks (or until Ctrl+C) with button
//!   hold intervals given on the command line, optionally writing a VCD
//! - `serve`: run the simulation thread in real time behind an HTTP API
//!
//! ## Usage
//! ```sh
//! led-scan-rs simulate --ticks 400 --step 10..14 --ffwd 100..300 --vcd scan.vcd
//! led-scan-rs serve --port 8080 --tick-rate 500
//! ```

use clap::{Args, Parser, Subcommand};
use led_scan_rs::runner::{Simulation, simulation_loop};
use led_scan_rs::server::{self, AppState};
use led_scan_rs::trace::{Sample, VcdWriter};
use led_scan_rs::{
    ButtonInputs, ConfigError, GridBuffer, Machine, MachineConfig, is_running,
    setup_signal_handler,
};
use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::ops::Range;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// LED matrix scanner model
#[derive(Parser)]
#[command(name = "led-scan-rs")]
#[command(about = "Cycle-accurate model of a 4x4 LED matrix scanner")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    machine: MachineArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clock the machine offline and print the final grid
    Simulate(SimulateArgs),
    /// Clock the machine in real time behind an HTTP API
    Serve(ServeArgs),
}

/// Machine parameters. Flags override values loaded from `--config`.
#[derive(Args)]
struct MachineArgs {
    /// JSON file with MachineConfig fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Width of the brightness phase field (0 disables dimming)
    #[arg(long, global = true)]
    hold_power: Option<u32>,

    /// Phase threshold for the full-brightness row
    #[arg(long, global = true)]
    full_intensity: Option<u32>,

    /// Phase threshold for the dim rows
    #[arg(long, global = true)]
    dim_intensity: Option<u32>,

    /// Debounce window is 2^watch_power - 1 ticks
    #[arg(long, global = true)]
    watch_power: Option<u32>,

    /// Fast-forward repeats every 2^ffwd_animate_power ticks
    #[arg(long, global = true)]
    ffwd_animate_power: Option<u32>,

    /// Initial grid bitmap (0x.., 0b.. or decimal)
    #[arg(long, global = true, value_parser = parse_grid)]
    grid: Option<u16>,
}

impl MachineArgs {
    fn resolve(&self) -> Result<MachineConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => MachineConfig::from_json_file(path)?,
            None => MachineConfig::default(),
        };

        if let Some(v) = self.hold_power {
            config.hold_power = v;
        }
        if let Some(v) = self.full_intensity {
            config.full_intensity = Some(v);
        }
        if let Some(v) = self.dim_intensity {
            config.dim_intensity = Some(v);
        }
        if let Some(v) = self.watch_power {
            config.watch_power = v;
        }
        if let Some(v) = self.ffwd_animate_power {
            config.ffwd_animate_power = v;
        }

        config.validate()?;
        Ok(config)
    }

    fn build(&self) -> Result<Machine, ConfigError> {
        let grid = GridBuffer::new(self.grid.unwrap_or(0));
        Machine::with_grid(self.resolve()?, grid)
    }
}

#[derive(Args)]
struct SimulateArgs {
    /// Ticks to run; runs until Ctrl+C when omitted
    #[arg(long)]
    ticks: Option<u64>,

    /// Hold the step button high over START..END (repeatable)
    #[arg(long)]
    step: Vec<TickRange>,

    /// Hold the fast-forward button high over START..END (repeatable)
    #[arg(long)]
    ffwd: Vec<TickRange>,

    /// Write a VCD waveform to this path
    #[arg(long)]
    vcd: Option<PathBuf>,
}

#[derive(Args)]
struct ServeArgs {
    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Ticks per second
    #[arg(long, default_value = "500")]
    tick_rate: u32,
}

// ── Argument parsing ─────────────────────────────────────────────────

/// Half-open tick interval `START..END`, or a single tick `N`.
#[derive(Clone, Debug, PartialEq, Eq)]
struct TickRange(Range<u64>);

impl TickRange {
    fn contains(&self, tick: u64) -> bool {
        self.0.contains(&tick)
    }
}

impl FromStr for TickRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |n: &str| {
            n.trim()
                .parse::<u64>()
                .map_err(|e| format!("invalid tick {n:?}: {e}"))
        };
        match s.split_once("..") {
            Some((start, end)) => {
                let (start, end) = (parse(start)?, parse(end)?);
                if end < start {
                    return Err(format!("range {s} ends before it starts"));
                }
                Ok(Self(start..end))
            }
            None => {
                let tick = parse(s)?;
                Ok(Self(tick..tick + 1))
            }
        }
    }
}

fn parse_grid(s: &str) -> Result<u16, String> {
    let s = s.replace('_', "");
    let parsed = if let Some(hex) = s.strip_prefix("0x") {
        u16::from_str_radix(hex, 16)
    } else if let Some(bin) = s.strip_prefix("0b") {
        u16::from_str_radix(bin, 2)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("invalid grid {s:?}: {e}"))
}

// ── Entry point ──────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn Error>> {
    // Logs go to stderr so simulate output can be piped.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let machine = cli.machine.build()?;

    tracing::info!("LED Scan v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Config: {:?}", machine.config());

    match cli.command {
        Command::Simulate(args) => simulate(machine, args),
        Command::Serve(args) => serve(machine, args),
    }
}

fn simulate(mut machine: Machine, args: SimulateArgs) -> Result<(), Box<dyn Error>> {
    let mut vcd = match &args.vcd {
        Some(path) => Some(VcdWriter::new(BufWriter::new(File::create(path)?), "1 us")?),
        None => None,
    };

    // Without a tick limit, Ctrl+C is the only way out.
    let running = match args.ticks {
        Some(_) => None,
        None => Some(setup_signal_handler()?),
    };
    let limit = args.ticks.unwrap_or(u64::MAX);

    let mut tick = 0;
    let mut scrolls = 0u64;
    while tick < limit && running.as_deref().is_none_or(is_running) {
        let inputs = ButtonInputs {
            step: args.step.iter().any(|r| r.contains(tick)),
            ffwd: args.ffwd.iter().any(|r| r.contains(tick)),
        };
        if let Some(vcd) = vcd.as_mut() {
            vcd.record(tick, &Sample::capture(&machine, inputs))?;
        }
        if machine.animation_signals().may_scroll {
            scrolls += 1;
        }
        machine.tick(inputs);
        tick += 1;
    }

    if let (Some(vcd), Some(path)) = (vcd, &args.vcd) {
        vcd.finish(tick)?;
        tracing::info!("Wrote waveform to {}", path.display());
    }

    println!("ticks: {}", machine.ticks());
    println!("grid:  {:#06x}", machine.grid().bits());
    println!("scrolls: {scrolls}");
    println!(
        "step settled: {}, ffwd settled: {}",
        machine.step_settled(),
        machine.ffwd_settled()
    );
    println!("{}", machine.frame().render());
    Ok(())
}

fn serve(machine: Machine, args: ServeArgs) -> Result<(), Box<dyn Error>> {
    let sim = Simulation::new(machine, args.tick_rate);

    // Channel for sending commands to the simulation thread.
    let (tx, rx) = mpsc::channel();

    // Shared status: simulation thread writes, HTTP handlers read.
    let status = Arc::new(Mutex::new(sim.status()));

    let sim_status = status.clone();
    let sim_handle = std::thread::spawn(move || {
        simulation_loop(rx, sim_status, sim);
    });

    let app = server::create_router(AppState {
        command_tx: tx,
        status,
    });

    let addr = format!("0.0.0.0:{}", args.port);
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("API Documentation: http://localhost:{}/docs", args.port);
    tracing::info!("Try: curl http://localhost:{}/api/v1/status", args.port);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let served = runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await
    });

    // Dropping the runtime drops the router and every command sender with
    // it, so the simulation thread sees the channel close and returns.
    drop(runtime);
    if sim_handle.join().is_err() {
        tracing::error!("Simulation thread panicked");
    }

    served?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("10..14", 10..14)]
    #[case("7", 7..8)]
    #[case(" 3 .. 3 ", 3..3)]
    fn tick_range_parses(#[case] text: &str, #[case] expected: Range<u64>) {
        assert_eq!(text.parse::<TickRange>().unwrap(), TickRange(expected));
    }

    #[rstest]
    #[case("5..2")]
    #[case("a..3")]
    #[case("")]
    fn tick_range_rejects_bad_input(#[case] text: &str) {
        assert!(text.parse::<TickRange>().is_err());
    }

    #[rstest]
    #[case("0xA53C", 0xA53C)]
    #[case("0b1010_0101_0011_1100", 0xA53C)]
    #[case("42", 42)]
    fn grid_parses_hex_binary_and_decimal(#[case] text: &str, #[case] expected: u16) {
        assert_eq!(parse_grid(text), Ok(expected));
    }

    #[test]
    fn grid_rejects_values_wider_than_16_bits() {
        assert!(parse_grid("0x10000").is_err());
    }

    #[test]
    fn cli_flags_override_defaults() {
        let cli = Cli::parse_from([
            "led-scan-rs",
            "simulate",
            "--ticks",
            "10",
            "--watch-power",
            "6",
            "--dim-intensity",
            "2",
        ]);
        let config = cli.machine.resolve().unwrap();
        assert_eq!(config.watch_power, 6);
        assert_eq!(config.dim_intensity, Some(2));
        assert_eq!(config.hold_power, MachineConfig::default().hold_power);
    }

    #[test]
    fn invalid_flag_combination_fails_resolution() {
        let cli = Cli::parse_from(["led-scan-rs", "serve", "--watch-power", "0"]);
        assert!(cli.machine.resolve().is_err());
    }
}
