//! H.264/AVC builder: frame-store management, direct-mode state, weighted
//! prediction, phantom first slice, and per-slice emission.

use vdec_protocol::cmd::{self, cmd_header};
use vdec_protocol::{Domains, StandardSelect};

use super::{
    bsp_buf_base_addr_state, ind_obj_base_addr_state, mi_flush, pipe_buf_addr_state,
    pipe_mode_select, qm_state, surface_state, DecodeCall, DecodeConfig, SliceMode,
};
use vdec_protocol::DecoderFormatMode;

use crate::context::{DecodeContext, FrameStore, ScratchRole, MAX_REFERENCE_FRAMES};
use crate::error::{DecodeError, Result};
use crate::params::avc::{
    AvcPictureParams, AvcSliceParams, PictureH264, PictureH264Flags, SLICE_TYPE_B, SLICE_TYPE_I,
    SLICE_TYPE_P, SLICE_TYPE_SI, SLICE_TYPE_SP,
};
use crate::request::AvcRequest;
use crate::surface::{AuxState, AvcAux, Fourcc, Subsampling, SurfaceId};

pub(crate) fn context_init(ctx: &mut DecodeContext, config: &DecodeConfig) {
    ctx.avc_default_iq = crate::params::avc::AvcIqMatrix::flat();
    if config.slice_mode == SliceMode::Base {
        ctx.format_mode = DecoderFormatMode::Short;
    }
}

pub(crate) fn validate(req: &AvcRequest) -> Result<()> {
    if req.slice_groups.is_empty() || req.slice_groups.iter().any(|g| g.params.is_empty()) {
        return Err(DecodeError::InvalidInput(
            "decode request carries no slice parameters",
        ));
    }

    let pic = &req.picture;
    if pic.curr_pic.flags.contains(PictureH264Flags::INVALID) {
        return Err(DecodeError::InvalidInput("current picture is invalid"));
    }

    let width_in_mbs = pic.picture_width_in_mbs_minus1 as u32 + 1;
    let height_in_mbs = pic.picture_height_in_mbs_minus1 as u32 + 1;
    if width_in_mbs > 256 || height_in_mbs > 256 {
        return Err(DecodeError::InvalidInput("picture exceeds the 4K limit"));
    }

    let is_field = pic
        .curr_pic
        .flags
        .intersects(PictureH264Flags::TOP_FIELD | PictureH264Flags::BOTTOM_FIELD);
    if is_field != pic.pic_fields.field_pic_flag {
        return Err(DecodeError::InvalidInput(
            "current-picture field flags disagree with field_pic_flag",
        ));
    }
    if pic.seq_fields.frame_mbs_only_flag
        && (pic.seq_fields.mb_adaptive_frame_field_flag || pic.pic_fields.field_pic_flag)
    {
        return Err(DecodeError::InvalidInput(
            "frame_mbs_only stream carries field coding flags",
        ));
    }

    // The decode pipe handles monochrome and 4:2:0 only.
    if pic.seq_fields.chroma_format_idc > 1 {
        return Err(DecodeError::InvalidInput(
            "unsupported chroma format for AVC decode",
        ));
    }
    if pic.seq_fields.residual_colour_transform_flag {
        return Err(DecodeError::InvalidInput(
            "residual colour transform is not supported",
        ));
    }

    for group in &req.slice_groups {
        for slice in &group.params {
            if slice.slice_type > SLICE_TYPE_SI {
                return Err(DecodeError::InvalidInput("unknown AVC slice type"));
            }
        }
    }
    Ok(())
}

/// SI slices decode as I, SP as P.
fn normalized_slice_type(slice_type: u32) -> u32 {
    match slice_type {
        SLICE_TYPE_SI => SLICE_TYPE_I,
        SLICE_TYPE_SP => SLICE_TYPE_P,
        other => other,
    }
}

/// Reconciles the reference slot table with the request's reference-frame
/// list: stale slots are invalidated, new reference surfaces take the lowest
/// free slot, whose index is the frame-store id the hardware sees.
fn update_frame_store(call: &mut DecodeCall, pic: &AvcPictureParams) {
    for slot in call.ctx.reference_surfaces.iter_mut() {
        let keep = slot.surface.is_some_and(|sid| {
            pic.reference_frames
                .iter()
                .any(|rf| rf.is_valid() && rf.picture_id == Some(sid))
        });
        if !keep {
            *slot = FrameStore::invalid();
        }
    }

    for rf in pic.reference_frames.iter().filter(|rf| rf.is_valid()) {
        let sid = rf.picture_id.unwrap();
        if !call.surfaces.contains(sid) {
            continue;
        }
        if call
            .ctx
            .reference_surfaces
            .iter()
            .any(|slot| slot.surface == Some(sid))
        {
            continue;
        }
        if let Some(i) = call
            .ctx
            .reference_surfaces
            .iter()
            .position(|slot| slot.surface.is_none())
        {
            call.ctx.reference_surfaces[i] = FrameStore {
                surface: Some(sid),
                frame_store_id: i as i32,
            };
        }
    }
}

/// Lazily attaches the whole-frame direct-MV buffer to the surface. The
/// buffer is sized for the frame irrespective of field coding and never
/// reallocated once set.
fn init_avc_surface(call: &mut DecodeCall, target: SurfaceId, pic: &AvcPictureParams) -> Result<()> {
    let width_in_mbs = pic.picture_width_in_mbs_minus1 as u32 + 1;
    let height_in_mbs = pic.picture_height_in_mbs_minus1 as u32 + 1;

    let needs_dmv = call.surfaces.avc_aux(target).is_none();
    if needs_dmv {
        let dmv = call.allocator.alloc(
            "direct mv w/r buffer",
            (width_in_mbs * height_in_mbs * 128) as usize,
            0x1000,
        )?;
        let surface = call
            .surfaces
            .get_mut(target)
            .ok_or(DecodeError::InvalidInput("destination surface is not resident"))?;
        surface.aux = Some(AuxState::Avc(AvcAux { dmv }));
    }
    Ok(())
}

fn decode_init(call: &mut DecodeCall, target: SurfaceId, req: &AvcRequest) -> Result<()> {
    let pic = &req.picture;

    // Any slice with deblocking enabled routes the picture through the
    // in-loop deblocker output.
    let enable_ildb = req
        .slice_groups
        .iter()
        .flat_map(|g| g.params.iter())
        .any(|slice| slice.disable_deblocking_filter_idc != 1);

    update_frame_store(call, pic);

    let width_in_mbs = pic.picture_width_in_mbs_minus1 as u32 + 1;

    let (fourcc, subsampling) = if pic.seq_fields.chroma_format_idc == 0 {
        (Fourcc::Y800, Subsampling::Yuv400)
    } else {
        (Fourcc::Nv12, Subsampling::Yuv420)
    };
    let surface = call
        .surfaces
        .get_mut(target)
        .ok_or(DecodeError::InvalidInput("destination surface is not resident"))?;
    surface.referenced = pic.pic_fields.reference_pic_flag;
    surface.ensure_backing(call.allocator, fourcc, subsampling)?;
    let bo = surface.bo.clone().expect("backing just resolved");

    init_avc_surface(call, target, pic)?;

    call.ctx
        .bind_output(ScratchRole::PostDeblockingOutput, bo.clone(), enable_ildb);
    call.ctx
        .bind_output(ScratchRole::PreDeblockingOutput, bo, !enable_ildb);

    call.ctx.ensure(
        ScratchRole::IntraRowStore,
        call.allocator,
        "intra row store",
        (width_in_mbs * 64) as usize,
        0x1000,
    )?;
    call.ctx.ensure(
        ScratchRole::DeblockingFilterRowStore,
        call.allocator,
        "deblocking filter row store",
        (width_in_mbs * 64 * 4) as usize,
        0x1000,
    )?;
    call.ctx.ensure(
        ScratchRole::BsdMpcRowStore,
        call.allocator,
        "bsd mpc row store",
        (width_in_mbs * 64 * 2) as usize,
        0x1000,
    )?;
    call.ctx.ensure(
        ScratchRole::MprRowStore,
        call.allocator,
        "mpr row store",
        (width_in_mbs * 64 * 2) as usize,
        0x1000,
    )?;
    call.ctx.invalidate(ScratchRole::BitplaneRead);

    // Every slot surface must be matched by the reference-frame list, or the
    // direct-mode picture-order-count table cannot be built.
    for slot in call.ctx.reference_surfaces.iter() {
        if let Some(sid) = slot.surface {
            if call.surfaces.contains(sid)
                && find_reference(pic, sid).is_none()
            {
                return Err(DecodeError::InvalidInput(
                    "reference surface missing from the reference frame list",
                ));
            }
        }
    }
    Ok(())
}

fn find_reference(pic: &AvcPictureParams, sid: SurfaceId) -> Option<&PictureH264> {
    pic.reference_frames
        .iter()
        .find(|rf| rf.is_valid() && rf.picture_id == Some(sid))
}

fn img_state(call: &mut DecodeCall, pic: &AvcPictureParams) {
    let img_struct = if pic.curr_pic.flags.contains(PictureH264Flags::TOP_FIELD) {
        1u32
    } else if pic.curr_pic.flags.contains(PictureH264Flags::BOTTOM_FIELD) {
        3
    } else {
        0
    };

    let mbaff_frame_flag =
        pic.seq_fields.mb_adaptive_frame_field_flag && !pic.pic_fields.field_pic_flag;
    let width_in_mbs = pic.picture_width_in_mbs_minus1 as u32 + 1;
    let height_in_mbs = pic.picture_height_in_mbs_minus1 as u32 + 1; // frame height

    let batch = &mut *call.batch;
    batch.begin(17);
    batch.emit(cmd_header(cmd::MFX_AVC_IMG_STATE, 17));
    batch.emit(width_in_mbs * height_in_mbs - 1);
    batch.emit(((height_in_mbs - 1) << 16) | (width_in_mbs - 1));
    batch.emit(
        (((pic.second_chroma_qp_index_offset as u32) & 0x1f) << 24)
            | (((pic.chroma_qp_index_offset as u32) & 0x1f) << 16)
            | (0 << 14) // max-bit conformance intra
            | (0 << 13) // max macroblock-size conformance inter
            | ((pic.pic_fields.weighted_pred_flag as u32) << 12)
            | (pic.pic_fields.weighted_bipred_idc << 10)
            | (img_struct << 8),
    );
    batch.emit(
        (pic.seq_fields.chroma_format_idc << 10)
            | ((pic.pic_fields.entropy_coding_mode_flag as u32) << 7)
            | ((!pic.pic_fields.reference_pic_flag as u32) << 6)
            | ((pic.pic_fields.constrained_intra_pred_flag as u32) << 5)
            | ((pic.seq_fields.direct_8x8_inference_flag as u32) << 4)
            | ((pic.pic_fields.transform_8x8_mode_flag as u32) << 3)
            | ((pic.seq_fields.frame_mbs_only_flag as u32) << 2)
            | ((mbaff_frame_flag as u32) << 1)
            | (pic.pic_fields.field_pic_flag as u32),
    );
    for _ in 0..12 {
        batch.emit(0);
    }
    batch.advance();
}

fn avc_qm_state(call: &mut DecodeCall, req: &AvcRequest) {
    let iq = req
        .iq_matrix
        .clone()
        .unwrap_or_else(|| call.ctx.avc_default_iq.clone());

    let mut lists_4x4_intra = [0u8; 48];
    let mut lists_4x4_inter = [0u8; 48];
    for i in 0..3 {
        lists_4x4_intra[i * 16..(i + 1) * 16].copy_from_slice(&iq.scaling_list_4x4[i]);
        lists_4x4_inter[i * 16..(i + 1) * 16].copy_from_slice(&iq.scaling_list_4x4[3 + i]);
    }
    qm_state(call, cmd::MFX_QM_AVC_4X4_INTRA_MATRIX, &lists_4x4_intra);
    qm_state(call, cmd::MFX_QM_AVC_4X4_INTER_MATRIX, &lists_4x4_inter);

    if req.picture.pic_fields.transform_8x8_mode_flag {
        qm_state(call, cmd::MFX_QM_AVC_8X8_INTRA_MATRIX, &iq.scaling_list_8x8[0]);
        qm_state(call, cmd::MFX_QM_AVC_8X8_INTER_MATRIX, &iq.scaling_list_8x8[1]);
    }
}

fn picid_state(call: &mut DecodeCall) {
    let batch = &mut *call.batch;
    batch.begin(10);
    batch.emit(cmd_header(cmd::MFX_AVC_PICID_STATE, 10));
    batch.emit(1); // picture-id remapping disabled
    for _ in 0..8 {
        batch.emit(0);
    }
    batch.advance();
}

fn directmode_state(call: &mut DecodeCall, target: SurfaceId, pic: &AvcPictureParams) {
    let mocs = call.ctx.mocs;

    call.batch.begin(71);
    call.batch.emit(cmd_header(cmd::MFX_AVC_DIRECTMODE_STATE, 71));

    // Direct-MV buffers of the reference surfaces, dwords 1-32.
    for i in 0..MAX_REFERENCE_FRAMES {
        let dmv = call.ctx.reference_surfaces[i]
            .surface
            .and_then(|sid| call.surfaces.avc_aux(sid))
            .map(|aux| aux.dmv.clone());
        call.emit_addr(dmv, Domains::INSTRUCTION, Domains::empty());
    }
    call.batch.emit(mocs);

    // The current frame's own buffer, written back during decode.
    let dmv = call
        .surfaces
        .avc_aux(target)
        .map(|aux| aux.dmv.clone())
        .expect("aux state attached in decode_init");
    call.reloc64(&dmv, Domains::INSTRUCTION, Domains::INSTRUCTION);
    call.batch.emit(mocs);

    // Picture-order-count table, matched by surface identity.
    for i in 0..MAX_REFERENCE_FRAMES {
        let pocs = call.ctx.reference_surfaces[i]
            .surface
            .and_then(|sid| find_reference(pic, sid))
            .map(|rf| (rf.top_field_order_cnt, rf.bottom_field_order_cnt));
        let (top, bottom) = pocs.unwrap_or((0, 0));
        call.batch.emit(top as u32);
        call.batch.emit(bottom as u32);
    }
    call.batch.emit(pic.curr_pic.top_field_order_cnt as u32);
    call.batch.emit(pic.curr_pic.bottom_field_order_cnt as u32);

    call.batch.advance();
}

/// One reference-list byte per entry: frame-store id plus the bottom-field
/// bit; unfilled entries stay 0xff.
fn ref_idx_state_for_list(
    call: &mut DecodeCall,
    list: u32,
    ref_list: &[PictureH264; 32],
    count: usize,
) {
    let mut entries = [0xffu8; 32];
    for (i, rf) in ref_list.iter().enumerate().take(count.min(32)) {
        if !rf.is_valid() {
            continue;
        }
        let slot = call
            .ctx
            .reference_surfaces
            .iter()
            .position(|s| s.surface == rf.picture_id);
        if let Some(slot) = slot {
            let bottom = rf.flags.contains(PictureH264Flags::BOTTOM_FIELD) as u8;
            entries[i] = slot as u8 | (bottom << 6);
        }
    }

    let batch = &mut *call.batch;
    batch.begin(10);
    batch.emit(cmd_header(cmd::MFX_AVC_REF_IDX_STATE, 10));
    batch.emit(list);
    batch.emit_data(&entries);
    batch.advance();
}

fn ref_idx_state(call: &mut DecodeCall, slice: &AvcSliceParams) {
    let slice_type = normalized_slice_type(slice.slice_type);
    if slice_type == SLICE_TYPE_I {
        return;
    }

    ref_idx_state_for_list(
        call,
        0,
        &slice.ref_pic_list0,
        slice.num_ref_idx_l0_active_minus1 as usize + 1,
    );

    if slice_type != SLICE_TYPE_B {
        return;
    }

    ref_idx_state_for_list(
        call,
        1,
        &slice.ref_pic_list1,
        slice.num_ref_idx_l1_active_minus1 as usize + 1,
    );
}

fn weightoffset_state(call: &mut DecodeCall, pic: &AvcPictureParams, slice: &AvcSliceParams) {
    let mut num_tables = 0u32;
    if (slice.slice_type == SLICE_TYPE_P || slice.slice_type == SLICE_TYPE_SP)
        && pic.pic_fields.weighted_pred_flag
    {
        num_tables = 1;
    }
    if slice.slice_type == SLICE_TYPE_B && pic.pic_fields.weighted_bipred_idc == 1 {
        num_tables = 2;
    }

    for table in 0..num_tables {
        let mut weights = [0u8; 32 * 6 * 2];
        for j in 0..32 {
            let values: [i16; 6] = if table == 0 {
                [
                    slice.luma_weight_l0[j],
                    slice.luma_offset_l0[j],
                    slice.chroma_weight_l0[j][0],
                    slice.chroma_offset_l0[j][0],
                    slice.chroma_weight_l0[j][1],
                    slice.chroma_offset_l0[j][1],
                ]
            } else {
                [
                    slice.luma_weight_l1[j],
                    slice.luma_offset_l1[j],
                    slice.chroma_weight_l1[j][0],
                    slice.chroma_offset_l1[j][0],
                    slice.chroma_weight_l1[j][1],
                    slice.chroma_offset_l1[j][1],
                ]
            };
            for (k, v) in values.iter().enumerate() {
                let at = (j * 6 + k) * 2;
                weights[at..at + 2].copy_from_slice(&v.to_le_bytes());
            }
        }

        let batch = &mut *call.batch;
        batch.begin(98);
        batch.emit(cmd_header(cmd::MFX_AVC_WEIGHTOFFSET_STATE, 98));
        batch.emit(table);
        batch.emit_data(&weights);
        batch.advance();
    }
}

fn slice_state(
    call: &mut DecodeCall,
    pic: &AvcPictureParams,
    slice: &AvcSliceParams,
    next_slice: Option<&AvcSliceParams>,
) {
    let width_in_mbs = pic.picture_width_in_mbs_minus1 as u32 + 1;
    let height_in_mbs = pic.picture_height_in_mbs_minus1 as u32 + 1;
    let mbaff_picture =
        !pic.pic_fields.field_pic_flag && pic.seq_fields.mb_adaptive_frame_field_flag;

    let slice_type = normalized_slice_type(slice.slice_type);
    let (mut num_ref_idx_l0, mut num_ref_idx_l1) = match slice_type {
        SLICE_TYPE_I => (0u32, 0u32),
        SLICE_TYPE_P => (slice.num_ref_idx_l0_active_minus1 as u32 + 1, 0),
        _ => (
            slice.num_ref_idx_l0_active_minus1 as u32 + 1,
            slice.num_ref_idx_l1_active_minus1 as u32 + 1,
        ),
    };

    // Never reference surfaces that do not exist; that stalls the engine.
    let num_surfaces = call
        .ctx
        .reference_surfaces
        .iter()
        .filter(|s| s.is_valid())
        .count();
    if num_surfaces == 0 {
        num_ref_idx_l0 = 0;
        num_ref_idx_l1 = 0;
    }

    let first_mb_in_slice = slice.first_mb_in_slice;
    let slice_hor_pos = first_mb_in_slice % width_in_mbs;
    let mut slice_ver_pos = first_mb_in_slice / width_in_mbs;
    if mbaff_picture {
        slice_ver_pos <<= 1;
    }

    let (next_slice_hor_pos, next_slice_ver_pos) = match next_slice {
        Some(next) => {
            let hor = next.first_mb_in_slice % width_in_mbs;
            let mut ver = next.first_mb_in_slice / width_in_mbs;
            if mbaff_picture {
                ver <<= 1;
            }
            (hor, ver)
        }
        None => (
            0,
            height_in_mbs / (1 + pic.pic_fields.field_pic_flag as u32),
        ),
    };

    let qp =
        (pic.pic_init_qp_minus26 as i32 + 26 + slice.slice_qp_delta as i32) as u32;

    let batch = &mut *call.batch;
    batch.begin(11);
    batch.emit(cmd_header(cmd::MFX_AVC_SLICE_STATE, 11));
    batch.emit(slice_type);
    batch.emit(
        (num_ref_idx_l1 << 24)
            | (num_ref_idx_l0 << 16)
            | ((slice.chroma_log2_weight_denom as u32) << 8)
            | (slice.luma_log2_weight_denom as u32),
    );
    batch.emit(
        ((slice.direct_spatial_mv_pred_flag as u32) << 29)
            | (slice.disable_deblocking_filter_idc << 27)
            | (slice.cabac_init_idc << 24)
            | (qp << 16)
            | (((slice.slice_beta_offset_div2 as u32) & 0xf) << 8)
            | ((slice.slice_alpha_c0_offset_div2 as u32) & 0xf),
    );
    batch.emit((slice_ver_pos << 24) | (slice_hor_pos << 16) | first_mb_in_slice);
    batch.emit((next_slice_ver_pos << 16) | next_slice_hor_pos);
    batch.emit((next_slice.is_none() as u32) << 19); // last-slice flag
    batch.emit(0);
    batch.emit(0);
    batch.emit(0);
    batch.emit(0);
    batch.advance();
}

/// The engine decodes from macroblock zero; when the first real slice starts
/// later, a synthetic slice covers the skipped region.
fn phantom_slice_first(call: &mut DecodeCall, pic: &AvcPictureParams, next_slice: &AvcSliceParams) {
    let width_in_mbs = pic.picture_width_in_mbs_minus1 as u32 + 1;
    let mbaff_picture =
        !pic.pic_fields.field_pic_flag && pic.seq_fields.mb_adaptive_frame_field_flag;

    let first_mb_in_next_slice = next_slice.first_mb_in_slice << mbaff_picture as u32;
    let next_slice_hor_pos = first_mb_in_next_slice % width_in_mbs;
    let next_slice_ver_pos = first_mb_in_next_slice / width_in_mbs;

    let batch = &mut *call.batch;
    batch.begin(11);
    batch.emit(cmd_header(cmd::MFX_AVC_SLICE_STATE, 11));
    batch.emit(0);
    batch.emit(0);
    batch.emit(0);
    batch.emit(0);
    batch.emit((next_slice_ver_pos << 16) | next_slice_hor_pos);
    batch.emit(0);
    batch.emit(0);
    batch.emit(0);
    batch.emit(0);
    batch.emit(0);
    batch.advance();

    batch.begin(6);
    batch.emit(cmd_header(cmd::MFD_AVC_BSD_OBJECT, 6));
    for _ in 0..5 {
        batch.emit(0);
    }
    batch.advance();
}

fn bsd_object(
    call: &mut DecodeCall,
    pic: &AvcPictureParams,
    slice: &AvcSliceParams,
    next_slice: Option<&AvcSliceParams>,
    slice_mode: SliceMode,
) {
    // CABAC slices start the macroblock data byte-aligned.
    let mut slice_data_bit_offset = slice.slice_data_bit_offset;
    if pic.pic_fields.entropy_coding_mode_flag {
        slice_data_bit_offset = (slice_data_bit_offset + 7) & !7;
    }

    // In short format the engine parses the slice header itself.
    let mb_byte_offset = match slice_mode {
        SliceMode::Base => 0,
        SliceMode::Long => slice_data_bit_offset,
    };

    let batch = &mut *call.batch;
    batch.begin(6);
    batch.emit(cmd_header(cmd::MFD_AVC_BSD_OBJECT, 6));
    batch.emit(slice.slice_data_size);
    batch.emit(slice.slice_data_offset);
    batch.emit(0);
    batch.emit(
        ((mb_byte_offset >> 3) << 16)
            | (1 << 7)
            | ((next_slice.is_none() as u32) << 3) // last-slice flag
            | (slice_data_bit_offset & 0x7),
    );
    batch.emit(0);
    batch.advance();
}

pub(crate) fn decode_picture(
    call: &mut DecodeCall,
    target: SurfaceId,
    req: &AvcRequest,
    slice_mode: SliceMode,
) -> Result<()> {
    decode_init(call, target, req)?;

    call.batch.start_atomic();
    mi_flush(call);
    pipe_mode_select(call, StandardSelect::Avc);
    surface_state(call, target, StandardSelect::Avc);
    pipe_buf_addr_state(call);
    bsp_buf_base_addr_state(call);
    avc_qm_state(call, req);
    picid_state(call);
    img_state(call, &req.picture);

    for (j, group) in req.slice_groups.iter().enumerate() {
        ind_obj_base_addr_state(call, &group.data);
        let next_group = req.slice_groups.get(j + 1);

        if j == 0 {
            if let Some(first) = group.params.first() {
                if first.first_mb_in_slice != 0 {
                    phantom_slice_first(call, &req.picture, first);
                }
            }
        }

        for (i, slice) in group.params.iter().enumerate() {
            let next_slice = group
                .params
                .get(i + 1)
                .or_else(|| next_group.and_then(|g| g.params.first()));

            directmode_state(call, target, &req.picture);
            ref_idx_state(call, slice);
            weightoffset_state(call, &req.picture, slice);
            slice_state(call, &req.picture, slice, next_slice);
            bsd_object(call, &req.picture, slice, next_slice, slice_mode);
        }
    }

    call.batch.end_atomic();
    call.batch.flush();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_types_collapse_to_their_decode_class() {
        assert_eq!(normalized_slice_type(SLICE_TYPE_SI), SLICE_TYPE_I);
        assert_eq!(normalized_slice_type(SLICE_TYPE_SP), SLICE_TYPE_P);
        assert_eq!(normalized_slice_type(SLICE_TYPE_B), SLICE_TYPE_B);
        assert_eq!(normalized_slice_type(SLICE_TYPE_I), SLICE_TYPE_I);
        assert_eq!(normalized_slice_type(SLICE_TYPE_P), SLICE_TYPE_P);
    }
}
