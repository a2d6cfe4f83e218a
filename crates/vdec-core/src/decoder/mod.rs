//! The dispatcher and the command emitters shared by every codec builder.

pub(crate) mod avc;
pub(crate) mod jpeg;
pub(crate) mod mpeg2;
pub(crate) mod vc1;
pub(crate) mod vp8;

use std::rc::Rc;

use vdec_protocol::cmd::{self, cmd_header};
use vdec_protocol::{Batch, BatchBuffer, Domains, StandardSelect};

use crate::buffer::{Allocator, BufferRef};
use crate::context::{DecodeContext, ScratchRole, MAX_REFERENCE_FRAMES};
use crate::error::{DecodeError, Result};
use crate::request::{CodecRequest, DecodeRequest, Profile};
use crate::surface::SurfaceSet;

/// Slice-data handling negotiated at configuration time. `Base` asks the
/// engine to parse slice headers itself (short format).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SliceMode {
    #[default]
    Long,
    Base,
}

#[derive(Clone, Copy, Debug)]
pub struct DecodeConfig {
    pub profile: Profile,
    pub slice_mode: SliceMode,
}

impl DecodeConfig {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            slice_mode: SliceMode::Long,
        }
    }
}

/// A flushed batch paired with the buffer references it pins until the
/// execution path has consumed it.
#[derive(Debug)]
pub struct SubmittedBatch {
    pub commands: Batch,
    pub buffers: Vec<BufferRef>,
}

/// Everything a codec builder touches during one decode call.
pub(crate) struct DecodeCall<'a> {
    pub ctx: &'a mut DecodeContext,
    pub surfaces: &'a mut SurfaceSet,
    pub batch: &'a mut BatchBuffer,
    pub allocator: &'a dyn Allocator,
    pub retained: Vec<BufferRef>,
}

impl DecodeCall<'_> {
    /// Emits a 64-bit relocation and pins the buffer for the batch lifetime.
    pub fn reloc64(&mut self, bo: &BufferRef, read_domains: Domains, write_domain: Domains) {
        self.batch.reloc64(bo.handle(), read_domains, write_domain, 0);
        self.retained.push(bo.clone());
    }

    /// Emits either a relocation or a zeroed 64-bit placeholder.
    pub fn emit_addr(
        &mut self,
        bo: Option<BufferRef>,
        read_domains: Domains,
        write_domain: Domains,
    ) {
        match bo {
            Some(bo) => self.reloc64(&bo, read_domains, write_domain),
            None => {
                self.batch.emit(0);
                self.batch.emit(0);
            }
        }
    }

    /// The buffer bound to a scratch role, if the role is valid.
    pub fn slot_bo(&self, role: ScratchRole) -> Option<BufferRef> {
        let slot = self.ctx.slot(role);
        if slot.valid {
            slot.bo.clone()
        } else {
            None
        }
    }
}

/* ------------------- Emitters shared by all five codecs ------------------ */

pub(crate) fn mi_flush(call: &mut DecodeCall) {
    let batch = &mut *call.batch;
    batch.begin(4);
    batch.emit(cmd::MI_FLUSH_DW | cmd::VIDEO_PIPELINE_CACHE_INVALIDATE | (4 - 2));
    batch.emit(0);
    batch.emit(0);
    batch.emit(0);
    batch.advance();
}

pub(crate) fn pipe_mode_select(call: &mut DecodeCall, standard: StandardSelect) {
    let post = call.ctx.slot(ScratchRole::PostDeblockingOutput).valid as u32;
    let pre = call.ctx.slot(ScratchRole::PreDeblockingOutput).valid as u32;
    let format_mode = call.ctx.format_mode as u32;

    let batch = &mut *call.batch;
    batch.begin(5);
    batch.emit(cmd_header(cmd::MFX_PIPE_MODE_SELECT, 5));
    batch.emit(
        (format_mode << 17)
            | (cmd::MFD_MODE_VLD << 15)
            | (0 << 10) // stream-out disabled
            | (post << 9)
            | (pre << 8)
            | (0 << 5) // not in stitch mode
            | (cmd::MFX_CODEC_DECODE << 4)
            | (standard as u32),
    );
    // Decode-error terminate controls, all off.
    batch.emit(0);
    batch.emit(0); // pic status/error report id
    batch.emit(0);
    batch.advance();
}

pub(crate) fn surface_state(call: &mut DecodeCall, target: crate::SurfaceId, standard: StandardSelect) {
    let surface = call
        .surfaces
        .get(target)
        .expect("destination surface validated before emission");
    let surface_format = if surface.fourcc() == Some(crate::Fourcc::Y800) {
        cmd::MFX_SURFACE_MONOCHROME
    } else {
        cmd::MFX_SURFACE_PLANAR_420_8
    };
    let is_jpeg = standard == StandardSelect::Jpeg;
    let (width, height) = (surface.width(), surface.height());
    let (pitch, y_cb_offset, y_cr_offset) =
        (surface.pitch, surface.y_cb_offset, surface.y_cr_offset);

    let batch = &mut *call.batch;
    batch.begin(6);
    batch.emit(cmd_header(cmd::MFX_SURFACE_STATE, 6));
    batch.emit(0);
    batch.emit(((height - 1) << 18) | ((width - 1) << 4));
    batch.emit(
        (surface_format << 28)
            | ((!is_jpeg as u32) << 27) // interleaved chroma, except for JPEG
            | (0 << 22)
            | ((pitch - 1) << 3)
            | (0 << 2)
            | (1 << 1) // must be tiled
            | cmd::TILEWALK_YMAJOR,
    );
    batch.emit((0 << 16) | y_cb_offset);
    // Cr offset is only meaningful for JPEG's planar formats.
    batch.emit((0 << 16) | if is_jpeg { y_cr_offset } else { 0 });
    batch.advance();
}

pub(crate) fn pipe_buf_addr_state(call: &mut DecodeCall) {
    let mocs = call.ctx.mocs;
    const RW: (Domains, Domains) = (Domains::INSTRUCTION, Domains::INSTRUCTION);

    call.batch.begin(61);
    call.batch.emit(cmd_header(cmd::MFX_PIPE_BUF_ADDR_STATE, 61));

    // Pre-deblocking output, dwords 1-3.
    let bo = call.slot_bo(ScratchRole::PreDeblockingOutput);
    call.emit_addr(bo, RW.0, RW.1);
    call.batch.emit(mocs);

    // Post-deblocking output, dwords 4-6.
    let bo = call.slot_bo(ScratchRole::PostDeblockingOutput);
    call.emit_addr(bo, RW.0, RW.1);
    call.batch.emit(mocs);

    // Uncompressed-picture and stream-out, dwords 7-12; ignored for decode.
    for _ in 0..6 {
        call.batch.emit(0);
    }

    // Intra row store, dwords 13-15.
    let bo = call.slot_bo(ScratchRole::IntraRowStore);
    call.emit_addr(bo, RW.0, RW.1);
    call.batch.emit(mocs);

    // Deblocking-filter row store, dwords 16-18.
    let bo = call.slot_bo(ScratchRole::DeblockingFilterRowStore);
    call.emit_addr(bo, RW.0, RW.1);
    call.batch.emit(mocs);

    // Reference pictures, dwords 19-50.
    for i in 0..MAX_REFERENCE_FRAMES {
        let bo = call.ctx.reference_surfaces[i]
            .surface
            .and_then(|id| call.surfaces.bo_of(id).cloned());
        call.emit_addr(bo, Domains::INSTRUCTION, Domains::empty());
    }
    call.batch.emit(mocs); // reference attribute, dword 51

    // Macroblock status and ILDB streams, dwords 52-60; unused.
    for _ in 0..9 {
        call.batch.emit(0);
    }

    call.batch.advance();
}

pub(crate) fn ind_obj_base_addr_state(call: &mut DecodeCall, slice_data: &BufferRef) {
    let mocs = call.ctx.mocs;
    call.batch.begin(26);
    call.batch.emit(cmd_header(cmd::MFX_IND_OBJ_BASE_ADDR_STATE, 26));
    // Indirect bitstream object base, dwords 1-3.
    call.reloc64(slice_data, Domains::INSTRUCTION, Domains::empty());
    call.batch.emit(mocs);
    // Upper bound plus the MV/IT-coefficient/IT-deblock/PAK streams, all
    // unused in VLD decode, dwords 4-25.
    for _ in 0..22 {
        call.batch.emit(0);
    }
    call.batch.advance();
}

pub(crate) fn bsp_buf_base_addr_state(call: &mut DecodeCall) {
    let mocs = call.ctx.mocs;
    const RW: (Domains, Domains) = (Domains::INSTRUCTION, Domains::INSTRUCTION);

    call.batch.begin(10);
    call.batch.emit(cmd_header(cmd::MFX_BSP_BUF_BASE_ADDR_STATE, 10));

    let bo = call.slot_bo(ScratchRole::BsdMpcRowStore);
    call.emit_addr(bo, RW.0, RW.1);
    call.batch.emit(mocs);

    let bo = call.slot_bo(ScratchRole::MprRowStore);
    call.emit_addr(bo, RW.0, RW.1);
    call.batch.emit(mocs);

    let bo = call.slot_bo(ScratchRole::BitplaneRead);
    call.emit_addr(bo, Domains::INSTRUCTION, Domains::empty());
    call.batch.emit(mocs);

    call.batch.advance();
}

/// Loads one quantization table; `data` is at most 64 bytes in the layout the
/// selected `qm_type` expects, zero-padded to the fixed payload width.
pub(crate) fn qm_state(call: &mut DecodeCall, qm_type: u32, data: &[u8]) {
    assert!(data.len() <= 64);
    let mut payload = [0u8; 64];
    payload[..data.len()].copy_from_slice(data);

    let batch = &mut *call.batch;
    batch.begin(18);
    batch.emit(cmd_header(cmd::MFX_QM_STATE, 18));
    batch.emit(qm_type);
    batch.emit_data(&payload);
    batch.advance();
}

/* ------------------------------- Dispatcher ------------------------------ */

/// One decode session against a fixed profile. Owns the context and the
/// batch writer; finished batches queue here until drained by the execution
/// path.
pub struct DecodePipeline {
    config: DecodeConfig,
    ctx: DecodeContext,
    batch: BatchBuffer,
    allocator: Rc<dyn Allocator>,
    submitted: Vec<SubmittedBatch>,
}

impl DecodePipeline {
    pub fn new(config: DecodeConfig, allocator: Rc<dyn Allocator>) -> Self {
        let mut ctx = DecodeContext::new();
        match config.profile.standard() {
            Some(StandardSelect::Mpeg2) => mpeg2::context_init(&mut ctx),
            Some(StandardSelect::Avc) => avc::context_init(&mut ctx, &config),
            _ => {}
        }
        Self {
            config,
            ctx,
            batch: BatchBuffer::new(),
            allocator,
            submitted: Vec::new(),
        }
    }

    pub fn profile(&self) -> Profile {
        self.config.profile
    }

    pub fn context(&self) -> &DecodeContext {
        &self.ctx
    }

    /// Builds and flushes the command batch for one decode operation.
    ///
    /// Validation failures surface before anything is emitted; the context
    /// and batch queue are untouched on error. The VP8 single-slice
    /// precondition is the one non-fatal exception: it logs and succeeds
    /// without emitting.
    pub fn decode_picture(
        &mut self,
        surfaces: &mut SurfaceSet,
        request: &DecodeRequest,
    ) -> Result<()> {
        let standard = self
            .config
            .profile
            .standard()
            .ok_or(DecodeError::UnsupportedProfile(self.config.profile))?;
        if standard != request.codec.standard() {
            return Err(DecodeError::InvalidInput(
                "parameter buffers do not match the configured profile",
            ));
        }
        if !surfaces.contains(request.target) {
            return Err(DecodeError::InvalidInput(
                "destination surface is not resident",
            ));
        }
        match &request.codec {
            CodecRequest::Mpeg2(req) => mpeg2::validate(req)?,
            CodecRequest::Avc(req) => avc::validate(req)?,
            CodecRequest::Vc1(req) => vc1::validate(req)?,
            CodecRequest::Jpeg(req) => jpeg::validate(req)?,
            CodecRequest::Vp8(_) => {} // checked in the builder; warn-and-skip
        }

        // Once-per-call derived state.
        self.ctx.wa_mpeg2_slice_vertical_position = None;

        let mut call = DecodeCall {
            ctx: &mut self.ctx,
            surfaces,
            batch: &mut self.batch,
            allocator: &*self.allocator,
            retained: Vec::new(),
        };
        let result = match &request.codec {
            CodecRequest::Mpeg2(req) => mpeg2::decode_picture(&mut call, request.target, req),
            CodecRequest::Avc(req) => {
                avc::decode_picture(&mut call, request.target, req, self.config.slice_mode)
            }
            CodecRequest::Vc1(req) => vc1::decode_picture(&mut call, request.target, req),
            CodecRequest::Jpeg(req) => jpeg::decode_picture(&mut call, request.target, req),
            CodecRequest::Vp8(req) => vp8::decode_picture(&mut call, request.target, req),
        };
        let retained = std::mem::take(&mut call.retained);

        match result {
            Ok(()) => {
                for commands in self.batch.take_pending() {
                    self.submitted.push(SubmittedBatch {
                        commands,
                        buffers: retained.clone(),
                    });
                }
                Ok(())
            }
            Err(err) => {
                // No partial batch may reach the execution path.
                self.batch.reset();
                Err(err)
            }
        }
    }

    /// Hands the finished batches to the execution path, oldest first.
    pub fn drain_batches(&mut self) -> Vec<SubmittedBatch> {
        std::mem::take(&mut self.submitted)
    }
}
