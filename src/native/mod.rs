//! Native Rust renditions of the bundled example programs
//!
//! Each function computes exactly what the compiled program computes on
//! the VM, so the two can be checked against each other.

pub mod conditional;
pub mod accumulator;
pub mod arena;
pub mod sampler;

pub use accumulator::accumulate;
pub use arena::BumpArena;
pub use conditional::conditional;
pub use sampler::{redraw, samples, Sample, Samples};
