//! One-tick pulse on a rising boolean transition.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EdgeDetector {
    last_value: bool,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combinational: true when `observe` is high now and was low last tick.
    pub fn fire(&self, observe: bool) -> bool {
        observe && !self.last_value
    }

    pub fn tick(&mut self, observe: bool) {
        self.last_value = observe;
    }
}
