//! Parsed parameter records, one module per codec.
//!
//! Field names and widths follow each standard's well-known parameter-buffer
//! convention (snake_cased); the builders read them positionally into
//! hardware command words, so renaming or widening a field here is an ABI
//! change.

pub mod avc;
pub mod jpeg;
pub mod mpeg2;
pub mod vc1;
pub mod vp8;
