//! Waveform dump in Value Change Dump (VCD) format.
//!
//! Captures the button lines, the grid, both debounce flags and the
//! physical drive lines once per tick, and writes only the signals that
//! changed. The output opens in GTKWave or any other VCD viewer.
//!
//! ## Rust concepts
//! - Generic over `W: Write`, so tests write into a `Vec<u8>`
//! - `io::Result` and `?` for every write

use crate::animation::ButtonInputs;
use crate::display::DriveSignals;
use crate::machine::Machine;
use std::io::{self, Write};

/// One tick's worth of traced signals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sample {
    pub inputs: ButtonInputs,
    pub grid: u16,
    pub step_settled: bool,
    pub ffwd_settled: bool,
    pub drive: DriveSignals,
}

impl Sample {
    /// Snapshot the machine's pre-tick state alongside the inputs about to be applied.
    pub fn capture(machine: &Machine, inputs: ButtonInputs) -> Self {
        Self {
            inputs,
            grid: machine.grid().bits(),
            step_settled: machine.step_settled(),
            ffwd_settled: machine.ffwd_settled(),
            drive: machine.outputs(),
        }
    }

    /// Values in declaration order, as VCD value strings.
    fn values(&self) -> [String; SIGNALS.len()] {
        [
            scalar(self.inputs.step),
            scalar(self.inputs.ffwd),
            format!("b{:016b}", self.grid),
            scalar(self.step_settled),
            scalar(self.ffwd_settled),
            vector(&self.drive.row_drive),
            vector(&self.drive.col_enable),
        ]
    }
}

/// (identifier, width, name) for every traced signal.
const SIGNALS: [(char, u32, &str); 7] = [
    ('!', 1, "step_button"),
    ('"', 1, "ffwd_button"),
    ('#', 16, "grid [15:0]"),
    ('$', 1, "step_settled"),
    ('%', 1, "ffwd_settled"),
    ('&', 4, "row_drive [3:0]"),
    ('\'', 4, "col_enable [3:0]"),
];

fn scalar(level: bool) -> String {
    if level { "1".into() } else { "0".into() }
}

/// Line 0 is the least significant bit, so it is written last.
fn vector(lines: &[bool]) -> String {
    let bits: String = lines
        .iter()
        .rev()
        .map(|&level| if level { '1' } else { '0' })
        .collect();
    format!("b{bits}")
}

pub struct VcdWriter<W: Write> {
    out: W,
    last: Option<[String; SIGNALS.len()]>,
}

impl<W: Write> VcdWriter<W> {
    /// Write the header. `timescale` is the duration of one tick, e.g. `"1 us"`.
    pub fn new(mut out: W, timescale: &str) -> io::Result<Self> {
        writeln!(out, "$version led-scan-rs {} $end", env!("CARGO_PKG_VERSION"))?;
        writeln!(out, "$timescale {timescale} $end")?;
        writeln!(out, "$scope module top $end")?;
        for (id, width, name) in SIGNALS {
            writeln!(out, "$var wire {width} {id} {name} $end")?;
        }
        writeln!(out, "$upscope $end")?;
        writeln!(out, "$enddefinitions $end")?;
        Ok(Self { out, last: None })
    }

    /// Record the signals at tick `time`. Unchanged values are skipped.
    pub fn record(&mut self, time: u64, sample: &Sample) -> io::Result<()> {
        let values = sample.values();

        match &self.last {
            None => {
                writeln!(self.out, "#{time}")?;
                writeln!(self.out, "$dumpvars")?;
                for (value, (id, _, _)) in values.iter().zip(SIGNALS) {
                    write_value(&mut self.out, value, id)?;
                }
                writeln!(self.out, "$end")?;
            }
            Some(last) => {
                let changed: Vec<usize> = (0..SIGNALS.len())
                    .filter(|&i| values[i] != last[i])
                    .collect();
                if !changed.is_empty() {
                    writeln!(self.out, "#{time}")?;
                    for i in changed {
                        write_value(&mut self.out, &values[i], SIGNALS[i].0)?;
                    }
                }
            }
        }

        self.last = Some(values);
        Ok(())
    }

    /// Write a closing timestamp and hand back the writer.
    pub fn finish(mut self, end_time: u64) -> io::Result<W> {
        writeln!(self.out, "#{end_time}")?;
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Scalars are written as `1!`, vectors as `b0101 &`.
fn write_value<W: Write>(out: &mut W, value: &str, id: char) -> io::Result<()> {
    if value.starts_with('b') {
        writeln!(out, "{value} {id}")
    } else {
        writeln!(out, "{value}{id}")
    }
}
