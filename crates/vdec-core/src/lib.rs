//! Command-sequence synthesis for a fixed-function multi-format video decode
//! engine.
//!
//! Given parsed picture/slice parameters for MPEG-2, H.264/AVC, VC-1, JPEG
//! baseline, or VP8, the [`decoder::DecodePipeline`] builds the ordered batch
//! of command records (pipeline mode, surface and address binding, per-picture
//! and per-slice state, quantization/probability tables, bitstream objects)
//! that describes one decode operation to the execution path.
//!
//! This crate performs no entropy decoding and no pixel reconstruction; its
//! output is the command stream and the bookkeeping that keeps per-surface
//! decode state (direct-mode motion-vector buffers, VC-1 intensity
//! compensation history) alive across frames.

pub mod buffer;
pub mod context;
pub mod decoder;
pub mod error;
pub mod params;
pub mod request;
pub mod surface;
pub mod tables;

pub use buffer::{AllocError, Allocator, Buffer, BufferRef, SystemAllocator};
pub use decoder::{DecodeConfig, DecodePipeline, SliceMode, SubmittedBatch};
pub use error::{DecodeError, Result};
pub use request::{CodecRequest, DecodeRequest, Profile, SliceGroup};
pub use surface::{Fourcc, Subsampling, Surface, SurfaceId, SurfaceSet};
