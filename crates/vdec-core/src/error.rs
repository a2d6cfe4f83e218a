use thiserror::Error;

use crate::buffer::AllocError;
use crate::request::Profile;

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Failure modes of a decode call.
///
/// Every variant is surfaced before any command reaches the execution path: a
/// call either flushes a complete batch or leaves the batch queue untouched.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The decode request is malformed or inconsistent: a required parameter
    /// buffer is missing, a component/sampling combination is unsupported, or
    /// slice counts violate the codec's minimums.
    #[error("invalid decode input: {0}")]
    InvalidInput(&'static str),

    /// The configured profile is not handled by this engine.
    #[error("profile {0:?} is not supported by the decode engine")]
    UnsupportedProfile(Profile),

    /// A scratch or auxiliary buffer could not be allocated. The call is
    /// abandoned; the engine never continues with a missing buffer.
    #[error("out of device memory: {0}")]
    OutOfMemory(#[from] AllocError),
}
