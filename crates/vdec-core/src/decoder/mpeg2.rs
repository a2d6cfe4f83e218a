//! MPEG-2 builder: reference setup, quantization-matrix caching, picture and
//! per-slice command emission.

use vdec_protocol::cmd::{self, cmd_header};
use vdec_protocol::{align_up, StandardSelect};

use super::{
    bsp_buf_base_addr_state, ind_obj_base_addr_state, mi_flush, pipe_buf_addr_state,
    pipe_mode_select, qm_state, surface_state, DecodeCall,
};
use crate::context::{DecodeContext, FrameStore, ScratchRole, MAX_REFERENCE_FRAMES};
use crate::error::{DecodeError, Result};
use crate::params::mpeg2::{
    Mpeg2PictureParams, Mpeg2SliceParams, MPEG_BOTTOM_FIELD, MPEG_B_PICTURE, MPEG_P_PICTURE,
    MPEG_TOP_FIELD,
};
use crate::request::Mpeg2Request;
use crate::surface::{Fourcc, Subsampling, SurfaceId};
use crate::tables::ZIGZAG_DIRECT;

pub(crate) fn context_init(ctx: &mut DecodeContext) {
    let qm = &mut ctx.mpeg2_qm;
    qm.load_intra_quantiser_matrix = None;
    qm.load_non_intra_quantiser_matrix = None;
    qm.load_chroma_intra_quantiser_matrix = None;
    qm.load_chroma_non_intra_quantiser_matrix = None;
}

pub(crate) fn validate(req: &Mpeg2Request) -> Result<()> {
    if req.slice_groups.is_empty() || req.slice_groups.iter().any(|g| g.params.is_empty()) {
        return Err(DecodeError::InvalidInput(
            "decode request carries no slice parameters",
        ));
    }
    if req.picture.horizontal_size == 0 || req.picture.vertical_size == 0 {
        return Err(DecodeError::InvalidInput(
            "picture dimensions must be non-zero",
        ));
    }
    Ok(())
}

fn width_in_mbs(pic: &Mpeg2PictureParams) -> u32 {
    align_up(pic.horizontal_size as u32, 16) / 16
}

fn is_field_picture(pic: &Mpeg2PictureParams) -> bool {
    let structure = pic.picture_coding_extension.picture_structure;
    structure == MPEG_TOP_FIELD || structure == MPEG_BOTTOM_FIELD
}

/// Fills the forward/backward reference slots. A missing reference falls
/// back to the destination surface so the engine never binds an absent one.
fn set_reference_surfaces(call: &mut DecodeCall, target: SurfaceId, pic: &Mpeg2PictureParams) {
    let resident = |id: Option<SurfaceId>, call: &DecodeCall| id.filter(|id| call.surfaces.contains(*id));

    let forward = match pic.picture_coding_type {
        MPEG_P_PICTURE | MPEG_B_PICTURE => {
            Some(resident(pic.forward_reference_picture, call).unwrap_or(target))
        }
        _ => None,
    };
    let backward = match pic.picture_coding_type {
        MPEG_B_PICTURE => {
            Some(resident(pic.backward_reference_picture, call).unwrap_or(forward.unwrap_or(target)))
        }
        _ => None,
    };

    call.ctx.reference_surfaces[0] = match forward {
        Some(surface) => FrameStore {
            surface: Some(surface),
            frame_store_id: 0,
        },
        None => FrameStore::invalid(),
    };
    call.ctx.reference_surfaces[1] = match backward {
        Some(surface) => FrameStore {
            surface: Some(surface),
            frame_store_id: 1,
        },
        None => FrameStore::invalid(),
    };
    for slot in &mut call.ctx.reference_surfaces[2..MAX_REFERENCE_FRAMES] {
        *slot = FrameStore::invalid();
    }
}

fn decode_init(call: &mut DecodeCall, target: SurfaceId, req: &Mpeg2Request) -> Result<()> {
    let pic = &req.picture;
    let width_in_mbs = width_in_mbs(pic);

    set_reference_surfaces(call, target, pic);

    let surface = call
        .surfaces
        .get_mut(target)
        .ok_or(DecodeError::InvalidInput("destination surface is not resident"))?;
    surface.ensure_backing(call.allocator, Fourcc::Nv12, Subsampling::Yuv420)?;
    let bo = surface.bo.clone().expect("backing just resolved");

    call.ctx
        .bind_output(ScratchRole::PreDeblockingOutput, bo, true);

    call.ctx.ensure(
        ScratchRole::BsdMpcRowStore,
        call.allocator,
        "bsd mpc row store",
        (width_in_mbs * 96) as usize,
        0x1000,
    )?;

    call.ctx.invalidate(ScratchRole::PostDeblockingOutput);
    call.ctx.invalidate(ScratchRole::IntraRowStore);
    call.ctx.invalidate(ScratchRole::DeblockingFilterRowStore);
    call.ctx.invalidate(ScratchRole::MprRowStore);
    call.ctx.invalidate(ScratchRole::BitplaneRead);
    Ok(())
}

fn pic_state(call: &mut DecodeCall, pic: &Mpeg2PictureParams) {
    let ext = &pic.picture_coding_extension;
    let f_code = pic.f_code as u32;
    let slice_concealment_disable = 1u32;

    let batch = &mut *call.batch;
    batch.begin(13);
    batch.emit(cmd_header(cmd::MFX_MPEG2_PIC_STATE, 13));
    batch.emit(
        ((f_code & 0xf) << 28) // f_code[1][1]
            | (((f_code >> 4) & 0xf) << 24) // f_code[1][0]
            | (((f_code >> 8) & 0xf) << 20) // f_code[0][1]
            | (((f_code >> 12) & 0xf) << 16) // f_code[0][0]
            | (ext.intra_dc_precision << 14)
            | (ext.picture_structure << 12)
            | ((ext.top_field_first as u32) << 11)
            | ((ext.frame_pred_frame_dct as u32) << 10)
            | ((ext.concealment_motion_vectors as u32) << 9)
            | ((ext.q_scale_type as u32) << 8)
            | ((ext.intra_vlc_format as u32) << 7)
            | ((ext.alternate_scan as u32) << 6),
    );
    batch.emit(pic.picture_coding_type << 9);
    batch.emit(
        (slice_concealment_disable << 31)
            | ((align_up(pic.vertical_size as u32, 16) / 16 - 1) << 16)
            | (align_up(pic.horizontal_size as u32, 16) / 16 - 1),
    );
    for _ in 0..9 {
        batch.emit(0);
    }
    batch.advance();
}

/// Updates the context quantization cache from the request and loads the
/// matrices the cache marks as present. Matrices arrive in zig-zag order and
/// are cached in raster order.
fn mpeg2_qm_state(call: &mut DecodeCall, req: &Mpeg2Request) {
    if let Some(iq) = &req.iq_matrix {
        let cache = &mut call.ctx.mpeg2_qm;

        if cache.load_intra_quantiser_matrix.is_none() || iq.load_intra_quantiser_matrix {
            cache.load_intra_quantiser_matrix = Some(iq.load_intra_quantiser_matrix);
            if iq.load_intra_quantiser_matrix {
                for j in 0..64 {
                    cache.intra_quantiser_matrix[ZIGZAG_DIRECT[j]] = iq.intra_quantiser_matrix[j];
                }
            }
        }

        if cache.load_non_intra_quantiser_matrix.is_none() || iq.load_non_intra_quantiser_matrix {
            cache.load_non_intra_quantiser_matrix = Some(iq.load_non_intra_quantiser_matrix);
            if iq.load_non_intra_quantiser_matrix {
                for j in 0..64 {
                    cache.non_intra_quantiser_matrix[ZIGZAG_DIRECT[j]] =
                        iq.non_intra_quantiser_matrix[j];
                }
            }
        }
    }

    for i in 0..2 {
        let (loaded, matrix, qm_type) = if i == 0 {
            (
                call.ctx.mpeg2_qm.load_intra_quantiser_matrix,
                call.ctx.mpeg2_qm.intra_quantiser_matrix,
                cmd::MFX_QM_MPEG_INTRA_QUANTIZER_MATRIX,
            )
        } else {
            (
                call.ctx.mpeg2_qm.load_non_intra_quantiser_matrix,
                call.ctx.mpeg2_qm.non_intra_quantiser_matrix,
                cmd::MFX_QM_MPEG_NON_INTRA_QUANTIZER_MATRIX,
            )
        };
        if loaded != Some(true) {
            continue;
        }
        qm_state(call, qm_type, &matrix);
    }
}

/// Probes whether field-picture slice vertical positions were coded in frame
/// units (a known producer quirk). Doubled numbering shows at the tail: the
/// last slice of a field picture then lands at or beyond the field height.
fn wa_slice_vertical_position(req: &Mpeg2Request) -> bool {
    let pic = &req.picture;
    // A progressive frame implies a progressive sequence; positions are fine.
    if pic.picture_coding_extension.progressive_frame {
        return false;
    }

    let field_height_in_mbs = (pic.vertical_size as u32 + 31) / 32;
    req.slice_groups
        .last()
        .and_then(|group| group.params.last())
        .map_or(false, |slice| {
            slice.slice_vertical_position >= field_height_in_mbs
        })
}

fn bsd_object(
    call: &mut DecodeCall,
    pic: &Mpeg2PictureParams,
    slice: &Mpeg2SliceParams,
    next_slice: Option<&Mpeg2SliceParams>,
) {
    let width_in_mbs = width_in_mbs(pic);
    let is_field_pic = is_field_picture(pic);
    let is_field_pic_wa =
        is_field_pic && call.ctx.wa_mpeg2_slice_vertical_position == Some(true);
    let wa_div = 1 + is_field_pic_wa as u32;

    let vpos0 = slice.slice_vertical_position / wa_div;
    let hpos0 = slice.slice_horizontal_position;
    let (vpos1, hpos1) = match next_slice {
        Some(next) => (
            next.slice_vertical_position / wa_div,
            next.slice_horizontal_position,
        ),
        None => (
            align_up(pic.vertical_size as u32, 16) / 16 / (1 + is_field_pic as u32),
            0,
        ),
    };
    let mb_count = (vpos1 * width_in_mbs + hpos1) as i32 - (vpos0 * width_in_mbs + hpos0) as i32;
    let is_last = next_slice.is_none() as u32;

    let batch = &mut *call.batch;
    batch.begin(5);
    batch.emit(cmd_header(cmd::MFD_MPEG2_BSD_OBJECT, 5));
    batch.emit(slice.slice_data_size.wrapping_sub(slice.macroblock_offset >> 3));
    batch.emit(slice.slice_data_offset.wrapping_add(slice.macroblock_offset >> 3));
    batch.emit(
        (hpos0 << 24)
            | (vpos0 << 16)
            | ((mb_count as u32) << 8)
            | (is_last << 5)
            | (is_last << 3)
            | (slice.macroblock_offset & 0x7),
    );
    batch.emit((slice.quantiser_scale_code << 24) | (vpos1 << 8) | hpos1);
    batch.advance();
}

pub(crate) fn decode_picture(
    call: &mut DecodeCall,
    target: SurfaceId,
    req: &Mpeg2Request,
) -> Result<()> {
    decode_init(call, target, req)?;

    call.batch.start_atomic();
    mi_flush(call);
    pipe_mode_select(call, StandardSelect::Mpeg2);
    surface_state(call, target, StandardSelect::Mpeg2);
    pipe_buf_addr_state(call);
    bsp_buf_base_addr_state(call);
    pic_state(call, &req.picture);
    mpeg2_qm_state(call, req);

    if call.ctx.wa_mpeg2_slice_vertical_position.is_none() {
        call.ctx.wa_mpeg2_slice_vertical_position = Some(wa_slice_vertical_position(req));
    }

    for (j, group) in req.slice_groups.iter().enumerate() {
        ind_obj_base_addr_state(call, &group.data);
        let next_group = req.slice_groups.get(j + 1);

        for (i, slice) in group.params.iter().enumerate() {
            let next_slice = group
                .params
                .get(i + 1)
                .or_else(|| next_group.and_then(|g| g.params.first()));
            bsd_object(call, &req.picture, slice, next_slice);
        }
    }

    call.batch.end_atomic();
    call.batch.flush();
    Ok(())
}
