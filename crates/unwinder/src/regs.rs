use smallvec::SmallVec;

/// Register values recovered for the caller of an unwound frame.
///
/// Registers are identified by the names the host uses for them. Insertion
/// order is preserved, and setting a register twice overwrites the earlier
/// value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegisterSet {
    regs: SmallVec<[(&'static str, u64); 16]>,
}

impl RegisterSet {
    /// Creates an empty set.
    pub fn new() -> RegisterSet {
        RegisterSet::default()
    }

    /// Records `value` for the register `name`.
    pub fn set(&mut self, name: &'static str, value: u64) {
        match self.regs.iter_mut().find(|(reg, _)| *reg == name) {
            Some(slot) => slot.1 = value,
            None => self.regs.push((name, value)),
        }
    }

    /// The recovered value of `name`, if any.
    pub fn get(&self, name: &str) -> Option<u64> {
        self.regs
            .iter()
            .find(|(reg, _)| *reg == name)
            .map(|(_, value)| *value)
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&'static str, u64)> + '_ {
        self.regs.iter().copied()
    }

    /// Number of recovered registers.
    pub fn len(&self) -> usize {
        self.regs.len()
    }

    /// Whether nothing was recovered.
    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }
}
