//! The decode context: state owned by one decoder instance across calls.

use vdec_protocol::DecoderFormatMode;

use crate::buffer::{AllocError, Allocator, BufferRef};
use crate::params::avc::AvcIqMatrix;
use crate::surface::SurfaceId;

/// Width of the reference register file. AVC addresses all 16 slots; VC-1
/// populates four, MPEG-2 two, VP8 three.
pub const MAX_REFERENCE_FRAMES: usize = 16;

/// One reference-surface slot: surface identity plus the frame-store index
/// the hardware knows it by (-1 while unassigned).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameStore {
    pub surface: Option<SurfaceId>,
    pub frame_store_id: i32,
}

impl FrameStore {
    pub const fn invalid() -> Self {
        Self {
            surface: None,
            frame_store_id: -1,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.surface.is_some()
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::invalid()
    }
}

/// Fixed-role buffer slots bound by the address-state commands. Invalid roles
/// emit zero placeholders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScratchRole {
    PreDeblockingOutput,
    PostDeblockingOutput,
    IntraRowStore,
    DeblockingFilterRowStore,
    BsdMpcRowStore,
    MprRowStore,
    BitplaneRead,
}

pub(crate) const SCRATCH_ROLE_COUNT: usize = 7;

#[derive(Debug, Default)]
pub struct BufferSlot {
    pub bo: Option<BufferRef>,
    pub valid: bool,
}

/// MPEG-2 quantization-matrix cache. Load flags are tri-state: `None` means
/// no matrix was ever supplied for the session (the hardware default
/// applies), `Some(loaded)` records the last explicit load flag.
#[derive(Debug)]
pub struct Mpeg2QmCache {
    pub load_intra_quantiser_matrix: Option<bool>,
    pub intra_quantiser_matrix: [u8; 64],
    pub load_non_intra_quantiser_matrix: Option<bool>,
    pub non_intra_quantiser_matrix: [u8; 64],
    pub load_chroma_intra_quantiser_matrix: Option<bool>,
    pub load_chroma_non_intra_quantiser_matrix: Option<bool>,
}

impl Default for Mpeg2QmCache {
    fn default() -> Self {
        Self {
            load_intra_quantiser_matrix: None,
            intra_quantiser_matrix: [0u8; 64],
            load_non_intra_quantiser_matrix: None,
            non_intra_quantiser_matrix: [0u8; 64],
            load_chroma_intra_quantiser_matrix: None,
            load_chroma_non_intra_quantiser_matrix: None,
        }
    }
}

#[derive(Debug)]
pub struct DecodeContext {
    pub reference_surfaces: [FrameStore; MAX_REFERENCE_FRAMES],
    scratch: [BufferSlot; SCRATCH_ROLE_COUNT],
    /// VP8 segmentation-id stream; provisioned once and reused across calls.
    pub segmentation_buffer: BufferSlot,
    pub mpeg2_qm: Mpeg2QmCache,
    /// MPEG-2 field-picture slice-position workaround, probed once per call.
    pub wa_mpeg2_slice_vertical_position: Option<bool>,
    pub format_mode: DecoderFormatMode,
    /// Scaling lists used when an AVC request carries none.
    pub avc_default_iq: AvcIqMatrix,
    /// Memory-attribute word emitted after every address pair.
    pub mocs: u32,
    #[cfg(feature = "jpeg-wa")]
    pub(crate) jpeg_wa: crate::decoder::jpeg::JpegWaState,
}

impl DecodeContext {
    pub fn new() -> Self {
        Self {
            reference_surfaces: [FrameStore::invalid(); MAX_REFERENCE_FRAMES],
            scratch: Default::default(),
            segmentation_buffer: BufferSlot::default(),
            mpeg2_qm: Mpeg2QmCache::default(),
            wa_mpeg2_slice_vertical_position: None,
            format_mode: DecoderFormatMode::Long,
            avc_default_iq: AvcIqMatrix::flat(),
            mocs: 0,
            #[cfg(feature = "jpeg-wa")]
            jpeg_wa: Default::default(),
        }
    }

    pub fn slot(&self, role: ScratchRole) -> &BufferSlot {
        &self.scratch[role as usize]
    }

    /// Re-provisions a scratch role: the previously held buffer is released
    /// first, then a fresh one is allocated. Scratch is never reused across
    /// calls. On allocation failure the role is left invalid.
    pub fn ensure(
        &mut self,
        role: ScratchRole,
        allocator: &dyn Allocator,
        label: &'static str,
        size: usize,
        align: usize,
    ) -> Result<(), AllocError> {
        let slot = &mut self.scratch[role as usize];
        slot.bo = None;
        slot.valid = false;
        slot.bo = Some(allocator.alloc(label, size, align)?);
        slot.valid = true;
        Ok(())
    }

    /// Binds an output role to an existing buffer (the destination surface's
    /// backing store), releasing whatever the role held before.
    pub fn bind_output(&mut self, role: ScratchRole, bo: BufferRef, valid: bool) {
        let slot = &mut self.scratch[role as usize];
        slot.bo = None;
        slot.bo = Some(bo);
        slot.valid = valid;
    }

    /// Marks a role invalid; the address-state command emits zeros for it.
    pub fn invalidate(&mut self, role: ScratchRole) {
        let slot = &mut self.scratch[role as usize];
        slot.bo = None;
        slot.valid = false;
    }

    /// Installs a pre-filled buffer into a role (VC-1 bitplane).
    pub fn install(&mut self, role: ScratchRole, bo: Option<BufferRef>, valid: bool) {
        let slot = &mut self.scratch[role as usize];
        slot.bo = None;
        slot.bo = bo;
        slot.valid = valid;
    }
}

impl Default for DecodeContext {
    fn default() -> Self {
        Self::new()
    }
}
