use serde::Serialize;

use super::arena::BumpArena;
use crate::vm::machine::Trap;
use crate::vm::memory::Memory;

pub const SAMPLE_COUNT: usize = 100;
pub const SAMPLE_START: f64 = 3.0;
pub const SAMPLE_STEP: f64 = 0.01;
/// Bytes reserved per stored sample
pub const SLOT_SIZE: usize = 8;

pub fn square(x: f64) -> f64 {
    x * x
}

/// Exposed alongside `square` but not used by the sampler
pub fn double(x: f64) -> f64 {
    x + x
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub index: usize,
    pub x: f64,
    pub y: f64,
}

/// The 100 sample points `x = 3.0 + 0.01 * j`, `y = x * x`, in order.
///
/// Calling [`samples`] again restarts the sequence. A clone resumes at the
/// same position.
#[derive(Debug, Clone)]
pub struct Samples {
    next: usize,
}

pub fn samples() -> Samples {
    Samples { next: 0 }
}

impl Iterator for Samples {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if self.next >= SAMPLE_COUNT {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let x = SAMPLE_START + SAMPLE_STEP * index as f64;
        Some(Sample {
            index,
            x,
            y: square(x),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = SAMPLE_COUNT - self.next.min(SAMPLE_COUNT);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Samples {}

/// Store every sample's `y` into a fresh 8-byte slot from `arena`.
///
/// `width` and `height` are accepted for interface compatibility and
/// ignored. Nothing is released afterwards, so the arena advances by
/// `SAMPLE_COUNT * SLOT_SIZE` bytes per call. The only failure is `memory`
/// rejecting a store past its end.
pub fn redraw(
    _width: f64,
    _height: f64,
    arena: &mut BumpArena,
    memory: &mut Memory,
) -> Result<(), Trap> {
    for sample in samples() {
        let addr = arena.allocate(SLOT_SIZE);
        memory.store_f64(addr as u64, sample.y)?;
    }
    Ok(())
}
