//! Bump-pointer arena over a linear address space
//!
//! The arena is only an address register. It hands out addresses and never
//! touches memory itself; callers write through whatever memory the
//! addresses refer to.

use tracing::trace;

/// A single offset register starting at `base`.
///
/// `allocate` and `release` perform no checks at all. Releasing more than
/// was allocated moves the offset below the base, wrapping like an unsigned
/// register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BumpArena {
    base: usize,
    offset: usize,
}

impl BumpArena {
    pub fn new(base: usize) -> Self {
        BumpArena { base, offset: base }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    /// Current value of the offset register
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes handed out since creation, as seen by the register
    pub fn used(&self) -> usize {
        self.offset.wrapping_sub(self.base)
    }

    /// Return the current offset and advance it by `n`
    pub fn allocate(&mut self, n: usize) -> usize {
        let addr = self.offset;
        self.offset = self.offset.wrapping_add(n);
        trace!(addr, size = n, "allocate");
        addr
    }

    /// Rewind the offset by `n`
    pub fn release(&mut self, n: usize) {
        self.offset = self.offset.wrapping_sub(n);
        trace!(offset = self.offset, size = n, "release");
    }
}
