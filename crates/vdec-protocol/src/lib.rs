//! Command-stream ABI for the fixed-function multi-format video decode
//! engine (MFD).
//!
//! This crate knows nothing about codecs. It defines the opcode encodings and
//! dword layouts of the command set consumed by the decode pipe, and the
//! [`batch::BatchBuffer`] used to assemble relocatable command batches.

pub mod batch;
pub mod cmd;

pub use batch::{Batch, BatchBuffer, Domains, Reloc};
pub use cmd::{DecoderFormatMode, StandardSelect};

/// Identifier of a relocatable GPU buffer, assigned by the allocator.
pub type BufferHandle = u64;

/// Round `v` up to the next multiple of the power-of-two `a`.
pub const fn align_up(v: u32, a: u32) -> u32 {
    debug_assert!(a.is_power_of_two());
    (v + (a - 1)) & !(a - 1)
}
