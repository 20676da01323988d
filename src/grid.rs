//! GridBuffer: the 16-bit bitmap shown on the matrix, and its animation rule.
//!
//! Bit `row * 4 + column` is the cell at (row, column); 1 means lit. For
//! animation the bitmap is treated as four 4-bit lanes (lane `k` is bits
//! `4k..4k+4`). A scroll moves every lane down by one, and the top lane
//! (bits 12..16) is the feed lane that fast-forward counts up.

pub const GRID_SIZE: u8 = 4;

const LANE_BITS: u32 = 4;
const FEED_SHIFT: u32 = 12;
const FEED_MASK: u16 = 0xF << FEED_SHIFT;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GridBuffer(u16);

impl GridBuffer {
    pub const fn new(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub fn bit(self, row: u8, column: u8) -> bool {
        debug_assert!(row < GRID_SIZE && column < GRID_SIZE);
        (self.0 >> (row * GRID_SIZE + column)) & 1 == 1
    }

    /// The lane that fast-forward increments.
    pub fn feed_lane(self) -> u8 {
        (self.0 >> FEED_SHIFT) as u8
    }

    /// Next-tick value, computed only from the current value.
    ///
    /// On a scroll, bits 0..12 take the previous bits 4..16. While
    /// fast-forward is active the feed lane counts up by one (mod 16)
    /// every tick. The two updates touch disjoint bits.
    pub fn next(self, may_scroll: bool, ffwd_active: bool) -> Self {
        let mut bits = self.0;
        if may_scroll {
            bits = (self.0 & FEED_MASK) | (self.0 >> LANE_BITS);
        }
        if ffwd_active {
            let feed = u16::from(self.feed_lane().wrapping_add(1) & 0xF);
            bits = (bits & !FEED_MASK) | (feed << FEED_SHIFT);
        }
        Self(bits)
    }
}

impl From<u16> for GridBuffer {
    fn from(bits: u16) -> Self {
        Self(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const SAMPLE: u16 = 0b1010_0101_0011_1100;

    #[test]
    fn bit_indexes_row_major() {
        let grid = GridBuffer::new(1 << (2 * 4 + 1));
        for row in 0..GRID_SIZE {
            for column in 0..GRID_SIZE {
                assert_eq!(grid.bit(row, column), (row, column) == (2, 1));
            }
        }
    }

    #[test]
    fn idle_grid_never_changes() {
        let grid = GridBuffer::new(SAMPLE);
        assert_eq!(grid.next(false, false), grid);
    }

    #[test]
    fn scroll_moves_lanes_down_and_keeps_feed_lane() {
        let next = GridBuffer::new(SAMPLE).next(true, false);
        assert_eq!(next.bits() & 0x0FFF, SAMPLE >> 4);
        assert_eq!(next.bits() & 0xF000, SAMPLE & 0xF000);
        assert_eq!(next.bits(), 0b1010_1010_0101_0011);
    }

    #[rstest]
    #[case(0x0000, 0x1000)]
    #[case(0x3ABC, 0x4ABC)]
    #[case(0xF123, 0x0123)]
    fn ffwd_counts_feed_lane_up(#[case] before: u16, #[case] after: u16) {
        assert_eq!(GridBuffer::new(before).next(false, true).bits(), after);
    }

    #[test]
    fn scroll_and_ffwd_together_touch_disjoint_bits() {
        let next = GridBuffer::new(SAMPLE).next(true, true);
        assert_eq!(next.bits() & 0x0FFF, SAMPLE >> 4);
        assert_eq!(next.feed_lane(), 0b1011);
    }

    #[test]
    fn three_scrolls_fill_grid_with_feed_lane() {
        let mut grid = GridBuffer::new(0x9000);
        for _ in 0..3 {
            grid = grid.next(true, false);
        }
        assert_eq!(grid.bits(), 0x9999);
    }
}
