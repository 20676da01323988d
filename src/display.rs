//! DisplayDriver: map the scanned cell onto the physical row and column lines.
//!
//! Rows are driven active-low. Columns are modelled as tri-state sinks: the
//! data line is always high and only the enable line changes. At most one
//! cell can ever be lit in a given tick.

use crate::grid::{GRID_SIZE, GridBuffer};
use crate::scan::ScanCoordinates;
use serde::Serialize;

/// Level of every column data line.
pub const COL_DATA: bool = true;

const LINES: usize = GRID_SIZE as usize;

/// Physical line levels for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DriveSignals {
    /// Physical level; low lights the row.
    pub row_drive: [bool; LINES],
    pub col_enable: [bool; LINES],
    pub col_data: [bool; LINES],
}

impl Default for DriveSignals {
    fn default() -> Self {
        Self::dark()
    }
}

impl DriveSignals {
    /// Every line inert.
    pub const fn dark() -> Self {
        Self {
            row_drive: [true; LINES],
            col_enable: [false; LINES],
            col_data: [COL_DATA; LINES],
        }
    }

    pub fn row_lit(&self, row: u8) -> bool {
        !self.row_drive[usize::from(row)]
    }

    /// The cell lit this tick, if any, read back from the line levels.
    pub fn lit_cell(&self) -> Option<(u8, u8)> {
        let row = (0..GRID_SIZE).find(|&r| self.row_lit(r))?;
        let column = (0..GRID_SIZE).find(|&c| self.col_enable[usize::from(c)])?;
        Some((row, column))
    }
}

/// Drive levels for the scanned cell.
///
/// Row `r` is pulled low when the gate passes, `r` is the scanned row, and
/// the grid bit at (r, scanned column) is set. Column `c` is enabled under
/// the mirror condition.
pub fn drive(coords: ScanCoordinates, grid: GridBuffer, may_light: bool) -> DriveSignals {
    let mut signals = DriveSignals::dark();
    for r in 0..GRID_SIZE {
        let lit = may_light && coords.row == r && grid.bit(r, coords.column);
        signals.row_drive[usize::from(r)] = !lit;
    }
    for c in 0..GRID_SIZE {
        signals.col_enable[usize::from(c)] =
            may_light && coords.column == c && grid.bit(coords.row, c);
    }
    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn at(row: u8, column: u8) -> ScanCoordinates {
        ScanCoordinates {
            row,
            column,
            phase: 0,
        }
    }

    #[test]
    fn dark_has_all_rows_high_and_columns_disabled() {
        let d = DriveSignals::dark();
        assert_eq!(d.row_drive, [true; 4]);
        assert_eq!(d.col_enable, [false; 4]);
        assert_eq!(d.col_data, [true; 4]);
        assert_eq!(d.lit_cell(), None);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 3)]
    #[case(3, 2)]
    fn lights_only_the_scanned_cell(#[case] row: u8, #[case] column: u8) {
        let d = drive(at(row, column), GridBuffer::new(0xFFFF), true);
        assert_eq!(d.lit_cell(), Some((row, column)));
        assert_eq!(d.row_drive.iter().filter(|&&level| !level).count(), 1);
        assert_eq!(d.col_enable.iter().filter(|&&on| on).count(), 1);
        assert_eq!(d.col_data, [COL_DATA; 4]);
    }

    #[test]
    fn clear_grid_bit_stays_dark() {
        let grid = GridBuffer::new(!(1 << 6)); // (1, 2)
        assert_eq!(drive(at(1, 2), grid, true), DriveSignals::dark());
    }

    #[test]
    fn closed_gate_stays_dark() {
        assert_eq!(
            drive(at(2, 2), GridBuffer::new(0xFFFF), false),
            DriveSignals::dark()
        );
    }

    #[test]
    fn other_lit_cells_do_not_leak() {
        // Everything set except the scanned cell.
        let grid = GridBuffer::new(0xFFFF & !(1 << 5));
        assert_eq!(drive(at(1, 1), grid, true).lit_cell(), None);
    }
}
