//! VC-1 builder: picture-type and quantizer derivation, intensity
//! compensation carried across surfaces, bit-plane packing, and per-slice
//! emission.

use vdec_protocol::cmd::{self, cmd_header};
use vdec_protocol::{align_up, Domains, StandardSelect};

use super::{
    bsp_buf_base_addr_state, ind_obj_base_addr_state, mi_flush, pipe_buf_addr_state,
    pipe_mode_select, surface_state, DecodeCall,
};
use crate::buffer::BufferRef;
use crate::context::{FrameStore, ScratchRole, MAX_REFERENCE_FRAMES};
use crate::error::{DecodeError, Result};
use crate::params::vc1::{
    Vc1MvMode, Vc1PictureParams, Vc1SliceParams, VC1_PROFILE_ADVANCED, VC1_PROFILE_MAIN,
};
use crate::request::Vc1Request;
use crate::surface::{AuxState, Fourcc, Subsampling, SurfaceId, Vc1Aux};
use crate::tables::B_PICTURE_SCALE_FACTOR;

/// Motion-vector mode remap into the unified command encoding.
const UNIFIED_MV_MODE: [u32; 4] = [
    1, // 1-MV
    2, // 1-MV half-pel
    3, // 1-MV half-pel bilinear
    0, // mixed MV
];

const CONDOVER_MAP: [u32; 3] = [0, 2, 3];

/// Field-interlace picture types: raw fptype code and first/second-field
/// select combine into the per-field picture type.
const FPTYPE_TO_PICTURE_TYPE: [[u32; 2]; 8] = [
    [cmd::VC1_I_PICTURE, cmd::VC1_I_PICTURE],
    [cmd::VC1_I_PICTURE, cmd::VC1_P_PICTURE],
    [cmd::VC1_P_PICTURE, cmd::VC1_I_PICTURE],
    [cmd::VC1_P_PICTURE, cmd::VC1_P_PICTURE],
    [cmd::VC1_B_PICTURE, cmd::VC1_B_PICTURE],
    [cmd::VC1_B_PICTURE, cmd::VC1_BI_PICTURE],
    [cmd::VC1_BI_PICTURE, cmd::VC1_B_PICTURE],
    [cmd::VC1_BI_PICTURE, cmd::VC1_BI_PICTURE],
];

fn is_field_interlace(pic: &Vc1PictureParams) -> bool {
    pic.sequence_fields.interlace && pic.picture_fields.frame_coding_mode >= 2
}

/// Per-field picture type and first-field flag for the current picture.
fn picture_type_of(pic: &Vc1PictureParams) -> (u32, bool) {
    if !is_field_interlace(pic) {
        (pic.picture_fields.picture_type, true)
    } else {
        let is_first_field = pic.picture_fields.is_first_field;
        let ty = FPTYPE_TO_PICTURE_TYPE[pic.picture_fields.picture_type as usize]
            [!is_first_field as usize];
        (ty, is_first_field)
    }
}

fn width_in_mbs(pic: &Vc1PictureParams) -> u32 {
    align_up(pic.coded_width as u32, 16) / 16
}

fn height_in_mbs(pic: &Vc1PictureParams) -> u32 {
    if !is_field_interlace(pic) {
        align_up(pic.coded_height as u32, 16) / 16
    } else {
        align_up(pic.coded_height as u32, 32) / 32
    }
}

pub(crate) fn validate(req: &Vc1Request) -> Result<()> {
    if req.slice_groups.is_empty() || req.slice_groups.iter().any(|g| g.params.is_empty()) {
        return Err(DecodeError::InvalidInput(
            "decode request carries no slice parameters",
        ));
    }

    let pic = &req.picture;
    if pic.picture_fields.frame_coding_mode > 2 {
        return Err(DecodeError::InvalidInput("unknown VC-1 frame coding mode"));
    }
    if pic.conditional_overlap_flag > 2 {
        return Err(DecodeError::InvalidInput(
            "conditional overlap flag out of range",
        ));
    }
    let max_ptype = if is_field_interlace(pic) { 7 } else { 4 };
    if pic.picture_fields.picture_type > max_ptype {
        return Err(DecodeError::InvalidInput("picture type out of range"));
    }
    if pic.mv_fields.mv_mode == Vc1MvMode::IntensityCompensation
        && pic.mv_fields.mv_mode2 == Vc1MvMode::IntensityCompensation
    {
        return Err(DecodeError::InvalidInput(
            "secondary mv mode cannot select intensity compensation",
        ));
    }

    let (picture_type, _) = picture_type_of(pic);
    if picture_type != cmd::VC1_SKIPPED_PICTURE && (pic.bitplane_present & 0x7f) != 0 {
        let mb_count = width_in_mbs(pic) * height_in_mbs(pic);
        let needed = ((mb_count + 1) / 2) as usize;
        match &req.bit_plane {
            None => {
                return Err(DecodeError::InvalidInput(
                    "bit-plane buffer missing for coded bitplanes",
                ));
            }
            Some(raw) if raw.len() < needed => {
                return Err(DecodeError::InvalidInput(
                    "bit-plane buffer too small for the picture",
                ));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Attaches/refreshes the surface's VC-1 side state. Field pairs share the
/// record: the first field resets the history, the second field inherits it.
fn init_vc1_surface(call: &mut DecodeCall, target: SurfaceId, pic: &Vc1PictureParams) -> Result<()> {
    let (picture_type, is_first_field) = picture_type_of(pic);
    let interlace = pic.sequence_fields.interlace;
    let frame_coded = !is_field_interlace(pic);

    if call.surfaces.vc1_aux(target).is_none() {
        let surface_height = call
            .surfaces
            .get(target)
            .ok_or(DecodeError::InvalidInput("destination surface is not resident"))?
            .height();
        // The direct MV buffer scales with frame height only; the engine
        // assumes a fixed 128-MB frame width.
        let height_in_mbs = align_up(surface_height, 16) / 16;
        let dmv_top = call.allocator.alloc(
            "direct mv w/r buffer",
            (128 * height_in_mbs * 64) as usize,
            0x1000,
        )?;
        let surface = call.surfaces.get_mut(target).expect("checked above");
        surface.aux = Some(AuxState::Vc1(Vc1Aux {
            dmv_top,
            dmv_bottom: None,
            picture_type_top: 0,
            picture_type_bottom: 0,
            intensity_compensation_top: 0,
            intensity_compensation_bottom: 0,
            luma_scale_top: [0; 2],
            luma_scale_bottom: [0; 2],
            luma_shift_top: [0; 2],
            luma_shift_bottom: [0; 2],
            range_reduction_frame: 0,
            reference_distance: 0,
            frame_coding_mode: 0,
        }));
    }

    if interlace && call.surfaces.vc1_aux(target).is_some_and(|aux| aux.dmv_bottom.is_none()) {
        let surface_height = call.surfaces.get(target).expect("checked above").height();
        let height_in_mbs = align_up(surface_height, 32) / 32;
        let dmv_bottom = call.allocator.alloc(
            "direct mv w/r buffer",
            (128 * height_in_mbs * 64) as usize,
            0x1000,
        )?;
        call.surfaces
            .vc1_aux_mut(target)
            .expect("aux just attached")
            .dmv_bottom = Some(dmv_bottom);
    }

    let aux = call
        .surfaces
        .vc1_aux_mut(target)
        .expect("aux just attached");

    if frame_coded || is_first_field {
        aux.picture_type_top = 0;
        aux.picture_type_bottom = 0;
        aux.intensity_compensation_top = 0;
        aux.intensity_compensation_bottom = 0;
        aux.luma_scale_top = [0; 2];
        aux.luma_scale_bottom = [0; 2];
        aux.luma_shift_top = [0; 2];
        aux.luma_shift_bottom = [0; 2];
    }

    if frame_coded {
        aux.picture_type_top = picture_type;
        aux.picture_type_bottom = picture_type;
    } else if pic.picture_fields.top_field_first ^ is_first_field {
        aux.picture_type_bottom = picture_type;
    } else {
        aux.picture_type_top = picture_type;
    }
    Ok(())
}

/// Slots 0/1 address the top-polarity forward/backward references, 2/3 the
/// bottom polarity; a missing backward reference falls back to the forward
/// one.
fn update_frame_store(call: &mut DecodeCall, pic: &Vc1PictureParams) {
    let resident =
        |id: Option<SurfaceId>, call: &DecodeCall| id.filter(|id| call.surfaces.contains(*id));

    let forward = resident(pic.forward_reference_picture, call);
    let backward = resident(pic.backward_reference_picture, call).or(forward);

    for (i, surface) in [forward, backward, forward, backward].into_iter().enumerate() {
        call.ctx.reference_surfaces[i] = match surface {
            Some(surface) => FrameStore {
                surface: Some(surface),
                frame_store_id: i as i32,
            },
            None => FrameStore::invalid(),
        };
    }
    for slot in &mut call.ctx.reference_surfaces[4..MAX_REFERENCE_FRAMES] {
        *slot = FrameStore::invalid();
    }
}

/// Records one intensity-compensation pass against a field's history,
/// keeping at most the single and double entries the engine consumes.
fn push_compensation(count: &mut u8, scales: &mut [u32; 2], shifts: &mut [u32; 2], scale: u32, shift: u32) {
    let i = *count as usize;
    *count = count.saturating_add(1);
    if i < 2 {
        scales[i] = scale;
        shifts[i] = shift;
    }
}

/// The intensity-compensation bookkeeping for P pictures. This mutates the
/// *reference* surface's (or, for second fields, the current surface's) aux
/// state; the write is consumed when a later frame motion-compensates
/// against that surface.
fn apply_intensity_compensation(call: &mut DecodeCall, target: SurfaceId, pic: &Vc1PictureParams) {
    let (_, is_first_field) = picture_type_of(pic);
    let forward = pic
        .forward_reference_picture
        .filter(|id| call.surfaces.contains(*id));

    let fcm = pic.picture_fields.frame_coding_mode;
    let interlace = pic.sequence_fields.interlace;

    if !interlace || fcm == 0 {
        // Progressive.
        if pic.mv_fields.mv_mode == Vc1MvMode::IntensityCompensation {
            if let Some(aux) = forward.and_then(|id| call.surfaces.vc1_aux_mut(id)) {
                aux.intensity_compensation_top = 1;
                aux.intensity_compensation_bottom = 1;
                aux.luma_scale_top[0] = pic.luma_scale;
                aux.luma_scale_bottom[0] = pic.luma_scale;
                aux.luma_shift_top[0] = pic.luma_shift;
                aux.luma_shift_bottom[0] = pic.luma_shift;
            }
        }
        return;
    }

    if fcm == 1 {
        // Frame-interlace.
        if pic.picture_fields.intensity_compensation {
            if let Some(aux) = forward.and_then(|id| call.surfaces.vc1_aux_mut(id)) {
                aux.intensity_compensation_top = 1;
                aux.intensity_compensation_bottom = 1;
                aux.luma_scale_top[0] = pic.luma_scale;
                aux.luma_scale_bottom[0] = pic.luma_scale;
                aux.luma_shift_top[0] = pic.luma_shift;
                aux.luma_shift_bottom[0] = pic.luma_shift;
            }
        }
        return;
    }

    // Field-interlace.
    if pic.mv_fields.mv_mode != Vc1MvMode::IntensityCompensation {
        return;
    }

    let num_refs = pic.reference_fields.num_reference_pictures != 0;
    let ref_ind = pic.reference_fields.reference_field_pic_indicator;
    let tff = pic.picture_fields.top_field_first;
    let ic_field = pic.intensity_compensation_field;

    // Top field (1) or both fields (0).
    if ic_field == 1 || ic_field == 0 {
        if is_first_field {
            if (!num_refs && (ref_ind == tff)) || num_refs {
                if let Some(aux) = forward.and_then(|id| call.surfaces.vc1_aux_mut(id)) {
                    push_compensation(
                        &mut aux.intensity_compensation_top,
                        &mut aux.luma_scale_top,
                        &mut aux.luma_shift_top,
                        pic.luma_scale,
                        pic.luma_shift,
                    );
                }
            }
        } else if tff {
            if (!num_refs && !ref_ind) || num_refs {
                if let Some(aux) = call.surfaces.vc1_aux_mut(target) {
                    push_compensation(
                        &mut aux.intensity_compensation_top,
                        &mut aux.luma_scale_top,
                        &mut aux.luma_shift_top,
                        pic.luma_scale,
                        pic.luma_shift,
                    );
                }
            }
        } else if (!num_refs && ref_ind) || num_refs {
            if let Some(aux) = forward.and_then(|id| call.surfaces.vc1_aux_mut(id)) {
                push_compensation(
                    &mut aux.intensity_compensation_top,
                    &mut aux.luma_scale_top,
                    &mut aux.luma_shift_top,
                    pic.luma_scale,
                    pic.luma_shift,
                );
            }
        }
    }

    // Bottom field (2) or both fields (0). When both fields compensate, the
    // bottom field carries the secondary scale/shift pair.
    if ic_field == 2 || ic_field == 0 {
        let (scale, shift) = if ic_field == 2 {
            (pic.luma_scale, pic.luma_shift)
        } else {
            (pic.luma_scale2, pic.luma_shift2)
        };

        if is_first_field {
            if (!num_refs && (ref_ind ^ tff)) || num_refs {
                if let Some(aux) = forward.and_then(|id| call.surfaces.vc1_aux_mut(id)) {
                    push_compensation(
                        &mut aux.intensity_compensation_bottom,
                        &mut aux.luma_scale_bottom,
                        &mut aux.luma_shift_bottom,
                        scale,
                        shift,
                    );
                }
            }
        } else if tff {
            if (!num_refs && ref_ind) || num_refs {
                if let Some(aux) = forward.and_then(|id| call.surfaces.vc1_aux_mut(id)) {
                    push_compensation(
                        &mut aux.intensity_compensation_bottom,
                        &mut aux.luma_scale_bottom,
                        &mut aux.luma_shift_bottom,
                        scale,
                        shift,
                    );
                }
            }
        } else if (!num_refs && !ref_ind) || num_refs {
            if let Some(aux) = call.surfaces.vc1_aux_mut(target) {
                push_compensation(
                    &mut aux.intensity_compensation_bottom,
                    &mut aux.luma_scale_bottom,
                    &mut aux.luma_shift_bottom,
                    scale,
                    shift,
                );
            }
        }
    }
}

/// Re-packs the 2-bits-per-macroblock raw bit-plane rows into the
/// nibble-packed layout the engine reads, one nibble column pair at a time.
/// Skipped pictures synthesize an all-0x2 plane instead.
fn pack_bitplane(
    dst: &mut [u8],
    src: Option<&[u8]>,
    width_in_mbs: u32,
    height_in_mbs: u32,
    bitplane_width: u32,
) {
    let width = width_in_mbs as usize;
    for row in 0..height_in_mbs as usize {
        let dst_row = &mut dst[row * bitplane_width as usize..];
        for col in 0..width {
            let src_value = match src {
                Some(src) => {
                    let mb = row * width + col;
                    let shift = if mb & 1 == 0 { 4 } else { 0 };
                    (src[mb / 2] >> shift) & 0xf
                }
                None => 0x2,
            };
            let dst_index = col / 2;
            dst_row[dst_index] = (dst_row[dst_index] >> 4) | (src_value << 4);
        }
        // Odd widths leave the final nibble in the high half; shift it down.
        if width & 1 == 1 {
            dst_row[width / 2] >>= 4;
        }
    }
}

fn decode_init(call: &mut DecodeCall, target: SurfaceId, req: &Vc1Request) -> Result<()> {
    let pic = &req.picture;
    let (picture_type, _) = picture_type_of(pic);
    let width_in_mbs = width_in_mbs(pic);

    let surface = call
        .surfaces
        .get_mut(target)
        .ok_or(DecodeError::InvalidInput("destination surface is not resident"))?;
    surface.ensure_backing(call.allocator, Fourcc::Nv12, Subsampling::Yuv420)?;
    let bo = surface.bo.clone().expect("backing just resolved");

    init_vc1_surface(call, target, pic)?;

    let loopfilter = pic.entrypoint_fields.loopfilter;
    let (post_valid, pre_valid) = if picture_type == cmd::VC1_SKIPPED_PICTURE {
        (false, true)
    } else {
        (loopfilter, !loopfilter)
    };
    call.ctx
        .bind_output(ScratchRole::PostDeblockingOutput, bo.clone(), post_valid);
    call.ctx
        .bind_output(ScratchRole::PreDeblockingOutput, bo, pre_valid);

    update_frame_store(call, pic);

    if picture_type == cmd::VC1_P_PICTURE {
        apply_intensity_compensation(call, target, pic);
    }

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
        (width_in_mbs * 7 * 64) as usize,
        0x1000,
    )?;
    call.ctx.ensure(
        ScratchRole::BsdMpcRowStore,
        call.allocator,
        "bsd mpc row store",
        (width_in_mbs * 96) as usize,
        0x1000,
    )?;
    call.ctx.invalidate(ScratchRole::MprRowStore);

    let bitplane_valid = if picture_type == cmd::VC1_SKIPPED_PICTURE {
        true
    } else {
        (pic.bitplane_present & 0x7f) != 0
    };

    if bitplane_valid {
        let height_in_mbs = height_in_mbs(pic);
        let bitplane_width = align_up(width_in_mbs, 2) / 2;
        let bo = call.allocator.alloc(
            "vc-1 bitplane",
            (bitplane_width * height_in_mbs) as usize,
            0x1000,
        )?;
        {
            let mut dst = bo.map_mut();
            let src = if picture_type == cmd::VC1_SKIPPED_PICTURE {
                None
            } else {
                req.bit_plane.as_deref()
            };
            pack_bitplane(&mut dst, src, width_in_mbs, height_in_mbs, bitplane_width);
        }
        call.ctx.install(ScratchRole::BitplaneRead, Some(bo), true);
    } else {
        call.ctx.install(ScratchRole::BitplaneRead, None, false);
    }
    Ok(())
}

/// The alternate-quantizer configuration/edge-mask decision tree, keyed on
/// dquant, dq_frame, dq_profile and the edge selectors.
fn alt_pquant(pic: &Vc1PictureParams) -> (u32, u32, u32) {
    let q = &pic.pic_quantizer_fields;
    let mut alt_pq = q.alt_pic_quantizer;

    let (config, edge_mask) = match q.dquant {
        0 => (0, 0),
        2 => (1, 0xf),
        _ => {
            if q.dq_frame == 0 {
                alt_pq = 0;
                (0, 0)
            } else {
                match q.dq_profile {
                    // All four edges.
                    0 => (1, 0xf),
                    // Double edge.
                    1 => {
                        if q.dq_db_edge == 3 {
                            (1, 0x9)
                        } else {
                            (1, 0x3 << q.dq_db_edge)
                        }
                    }
                    // Single edge.
                    2 => (1, 0x1 << q.dq_sb_edge),
                    // All macroblocks.
                    _ => {
                        if q.dq_binary_level == 0 {
                            (2, 0)
                        } else {
                            (3, 0)
                        }
                    }
                }
            }
        }
    };
    (config, edge_mask, alt_pq)
}

fn pic_state(call: &mut DecodeCall, target: SurfaceId, req: &Vc1Request) {
    let pic = &req.picture;
    let (picture_type, is_first_field) = picture_type_of(pic);
    let height_in_mbs = height_in_mbs(pic);
    let interlace = pic.sequence_fields.interlace;
    let fcm_raw = pic.picture_fields.frame_coding_mode;

    let (alt_pquant_config, alt_pquant_edge_mask, alt_pq) = alt_pquant(pic);

    let forward = pic
        .forward_reference_picture
        .filter(|id| call.surfaces.contains(*id));
    let backward = pic
        .backward_reference_picture
        .filter(|id| call.surfaces.contains(*id));

    // Range reduction state propagates along the reference chain on Main
    // profile; skipped pictures inherit the reference's flag.
    let mut range_reduction = 0u32;
    let mut range_reduction_scale = 0u32;
    if pic.sequence_fields.profile == VC1_PROFILE_MAIN && pic.sequence_fields.rangered {
        let ref_rr = forward
            .and_then(|id| call.surfaces.vc1_aux(id))
            .map(|aux| aux.range_reduction_frame);

        let current_rr = if picture_type == cmd::VC1_SKIPPED_PICTURE {
            ref_rr.unwrap_or(0)
        } else {
            pic.range_reduction_frame as u32
        };
        if let Some(aux) = call.surfaces.vc1_aux_mut(target) {
            aux.range_reduction_frame = current_rr;
        }

        if let Some(ref_rr) = ref_rr {
            if current_rr != 0 && ref_rr == 0 {
                range_reduction = 1;
                range_reduction_scale = 0;
            } else if current_rr == 0 && ref_rr != 0 {
                range_reduction = 1;
                range_reduction_scale = 1;
            }
        }
    }

    let mut unified_mv_mode = 0;
    if (!interlace || fcm_raw != 1)
        && (picture_type == cmd::VC1_P_PICTURE || picture_type == cmd::VC1_B_PICTURE)
    {
        let mode = if pic.mv_fields.mv_mode == Vc1MvMode::IntensityCompensation {
            pic.mv_fields.mv_mode2
        } else {
            pic.mv_fields.mv_mode
        };
        unified_mv_mode = UNIFIED_MV_MODE[mode as usize];
    }

    let mut ref_field_pic_polarity = 0u32;
    if is_field_interlace(pic)
        && picture_type == cmd::VC1_P_PICTURE
        && pic.reference_fields.num_reference_pictures == 0
    {
        let tff = pic.picture_fields.top_field_first;
        let polarity = if pic.reference_fields.reference_field_pic_indicator {
            if is_first_field {
                !tff
            } else {
                tff
            }
        } else if is_first_field {
            tff
        } else {
            !tff
        };
        ref_field_pic_polarity = polarity as u32;
    }

    let mut scale_factor = 0u32;
    if (pic.b_picture_fraction as usize) < B_PICTURE_SCALE_FACTOR.len() {
        scale_factor = B_PICTURE_SCALE_FACTOR[pic.b_picture_fraction as usize];
    }

    let skipped = picture_type == cmd::VC1_SKIPPED_PICTURE;
    let (ptype, bitplane_present) = if skipped {
        (cmd::VC1_P_PICTURE, 1u32)
    } else {
        (
            pic.picture_fields.picture_type,
            ((pic.bitplane_present & 0x7f) != 0) as u32,
        )
    };
    let raw = &pic.raw_coding;
    let (forward_mb, mv_type_mb, skip_mb, direct_mb, overflags, ac_pred, field_tx, loopfilter) =
        if skipped {
            (0, 0, 0, 0, 0, 0, 0, 0u32)
        } else {
            (
                raw.forward_mb as u32,
                raw.mv_type_mb as u32,
                raw.skip_mb as u32,
                raw.direct_mb as u32,
                raw.overflags as u32,
                raw.ac_pred as u32,
                raw.field_tx as u32,
                pic.entrypoint_fields.loopfilter as u32,
            )
        };

    let tf = &pic.transform_fields;
    let trans_ac_y;
    let mut mb_level_transform_type_flag = tf.mb_level_transform_type_flag as u32;
    let mut frame_level_transform_type = tf.frame_level_transform_type;
    if picture_type == cmd::VC1_I_PICTURE || picture_type == cmd::VC1_BI_PICTURE {
        trans_ac_y = tf.transform_ac_codingset_idx2;
    } else {
        trans_ac_y = tf.transform_ac_codingset_idx1;
        // Without variable-sized transform coding the 8x8 transform applies
        // everywhere.
        if !tf.variable_sized_transform_flag {
            mb_level_transform_type_flag = 1;
            frame_level_transform_type = 0;
        }
    }

    // The direct-MV read buffer is live only when the backward reference's
    // co-located field was a P picture.
    let mut dmv_surface_valid = 0u32;
    if picture_type == cmd::VC1_B_PICTURE {
        if let Some(aux) = backward.and_then(|id| call.surfaces.vc1_aux(id)) {
            let bottom_polarity = is_field_interlace(pic)
                && (pic.picture_fields.top_field_first ^ is_first_field);
            let colocated_type = if bottom_polarity {
                aux.picture_type_bottom
            } else {
                aux.picture_type_top
            };
            if colocated_type == cmd::VC1_P_PICTURE {
                dmv_surface_valid = 1;
            }
        }
    }

    if let Some(aux) = call.surfaces.vc1_aux_mut(target) {
        aux.frame_coding_mode = fcm_raw;
    }
    let mut fcm = 0u32;
    if interlace {
        fcm = if fcm_raw < 2 {
            fcm_raw
        } else if !pic.picture_fields.top_field_first {
            3 // field pair, bottom field first
        } else {
            2 // field pair, top field first
        };
    }

    // Reference-distance bookkeeping for field pairs; B pictures derive
    // forward/backward distances from the B fraction.
    let mut frfd = 0u32;
    let mut brfd = 0u32;
    if is_field_interlace(pic) {
        if picture_type == cmd::VC1_I_PICTURE || picture_type == cmd::VC1_P_PICTURE {
            if is_first_field {
                if let Some(aux) = call.surfaces.vc1_aux_mut(target) {
                    aux.reference_distance = pic.reference_fields.reference_distance;
                }
            }
            frfd = call
                .surfaces
                .vc1_aux(target)
                .map(|aux| aux.reference_distance)
                .unwrap_or(0);
        } else if picture_type == cmd::VC1_B_PICTURE {
            if let Some(aux) = backward.and_then(|id| call.surfaces.vc1_aux(id)) {
                frfd = (scale_factor * aux.reference_distance) >> 8;
                brfd = (aux.reference_distance as i32 - frfd as i32 - 1).max(0) as u32;
            }
        }
    }

    let mut overlap = 0u32;
    if pic.sequence_fields.overlap {
        let pq = pic.pic_quantizer_fields.pic_quantizer_scale;
        if pic.sequence_fields.profile == VC1_PROFILE_ADVANCED {
            if picture_type == cmd::VC1_P_PICTURE && pq >= 9 {
                overlap = 1;
            }
            if picture_type == cmd::VC1_I_PICTURE || picture_type == cmd::VC1_BI_PICTURE {
                if pq >= 9 || pic.conditional_overlap_flag == 1 || pic.conditional_overlap_flag == 2
                {
                    overlap = 1;
                }
            }
        } else if pq >= 9 && picture_type != cmd::VC1_B_PICTURE {
            overlap = 1;
        }
    }

    let mut interpolation_mode = 0u32;
    if (!interlace || fcm_raw != 1)
        && (picture_type == cmd::VC1_P_PICTURE || picture_type == cmd::VC1_B_PICTURE)
    {
        let bilinear = pic.mv_fields.mv_mode == Vc1MvMode::OneMvHalfPelBilinear
            || (pic.mv_fields.mv_mode == Vc1MvMode::IntensityCompensation
                && pic.mv_fields.mv_mode2 == Vc1MvMode::OneMvHalfPelBilinear);
        let base = if bilinear { 8 } else { 0 };
        interpolation_mode = base | pic.fast_uvmc_flag as u32;
    }

    let mv = &pic.mv_fields;
    let q = &pic.pic_quantizer_fields;
    let batch = &mut *call.batch;
    batch.begin(6);
    batch.emit(cmd_header(cmd::MFD_VC1_LONG_PIC_STATE, 6));
    batch.emit(
        ((height_in_mbs - 1) << 16) | (align_up(pic.coded_width as u32, 16) / 16 - 1),
    );
    batch.emit(
        (((align_up(pic.coded_width as u32, 16) / 16 + 1) / 2 - 1) << 24)
            | (dmv_surface_valid << 15)
            | (((q.quantizer == 0) as u32) << 14) // implicit quantizer
            | (pic.rounding_control << 13)
            | ((pic.sequence_fields.syncmarker as u32) << 12)
            | (interpolation_mode << 8)
            | (range_reduction_scale << 7)
            | (range_reduction << 6)
            | (loopfilter << 5)
            | (overlap << 4)
            | ((!is_first_field as u32) << 3)
            | ((pic.sequence_fields.profile == VC1_PROFILE_ADVANCED) as u32),
    );
    batch.emit(
        (CONDOVER_MAP[pic.conditional_overlap_flag as usize] << 29)
            | (ptype << 26)
            | (fcm << 24)
            | (alt_pq << 16)
            | (q.pic_quantizer_scale << 8)
            | scale_factor,
    );
    batch.emit(
        (unified_mv_mode << 28)
            | ((mv.four_mv_switch as u32) << 27)
            | ((pic.fast_uvmc_flag as u32) << 26)
            | (ref_field_pic_polarity << 25)
            | (pic.reference_fields.num_reference_pictures << 24)
            | (brfd << 20)
            | (frfd << 16)
            | (mv.extended_dmv_range << 10)
            | (mv.extended_mv_range << 8)
            | (alt_pquant_edge_mask << 4)
            | (alt_pquant_config << 2)
            | ((q.half_qp as u32) << 1)
            | q.pic_quantizer_type,
    );
    batch.emit(
        (bitplane_present << 31)
            | (forward_mb << 30)
            | (mv_type_mb << 29)
            | (skip_mb << 28)
            | (direct_mb << 27)
            | (overflags << 26)
            | (ac_pred << 25)
            | (field_tx << 24)
            | (mv.mv_table << 20)
            | (mv.four_mv_block_pattern_table << 18)
            | (mv.two_mv_block_pattern_table << 16)
            | (frame_level_transform_type << 12)
            | (mb_level_transform_type_flag << 11)
            | (pic.mb_mode_table << 8)
            | (trans_ac_y << 6)
            | (tf.transform_ac_codingset_idx1 << 4)
            | (tf.intra_transform_dc_table << 3)
            | pic.cbp_table,
    );
    batch.advance();
}

fn pred_pipe_state(call: &mut DecodeCall, pic: &Vc1PictureParams) {
    let (picture_type, _) = picture_type_of(pic);

    let mut intensitycomp_single_fwd = 0u32;
    let mut intensitycomp_single_bwd = 0u32;
    let mut intensitycomp_double_fwd = 0u32;
    let mut lumscale1_single_fwd = 0u32;
    let mut lumscale2_single_fwd = 0u32;
    let mut lumshift1_single_fwd = 0u32;
    let mut lumshift2_single_fwd = 0u32;
    let mut lumscale1_single_bwd = 0u32;
    let mut lumscale2_single_bwd = 0u32;
    let mut lumshift1_single_bwd = 0u32;
    let mut lumshift2_single_bwd = 0u32;
    let mut lumscale1_double_fwd = 0u32;
    let mut lumscale2_double_fwd = 0u32;
    let mut lumshift1_double_fwd = 0u32;
    let mut lumshift2_double_fwd = 0u32;
    let mut replication_mode = 0u32;

    let aux_of = |call: &DecodeCall, slot: usize| {
        call.ctx.reference_surfaces[slot]
            .surface
            .and_then(|id| call.surfaces.vc1_aux(id))
            .map(|aux| Vc1AuxSnapshot::of(aux))
    };

    let interlaced_refs =
        pic.sequence_fields.interlace && pic.picture_fields.frame_coding_mode > 0;

    if picture_type == cmd::VC1_P_PICTURE || picture_type == cmd::VC1_B_PICTURE {
        if let Some(top) = aux_of(call, 0) {
            intensitycomp_single_fwd = (top.ic_top != 0) as u32;
            lumscale1_single_fwd = top.scale_top[0];
            lumshift1_single_fwd = top.shift_top[0];
            if top.ic_top == 2 {
                intensitycomp_double_fwd = 1;
                lumscale1_double_fwd = top.scale_top[1];
                lumshift1_double_fwd = top.shift_top[1];
            }
            replication_mode |= (top.frame_coding_mode != 0) as u32;
        }

        if interlaced_refs {
            if let Some(bottom) = aux_of(call, 2) {
                intensitycomp_single_fwd |= ((bottom.ic_bottom != 0) as u32) << 1;
                lumscale2_single_fwd = bottom.scale_bottom[0];
                lumshift2_single_fwd = bottom.shift_bottom[0];
                if bottom.ic_bottom == 2 {
                    intensitycomp_double_fwd |= 2;
                    lumscale2_double_fwd = bottom.scale_bottom[1];
                    lumshift2_double_fwd = bottom.shift_bottom[1];
                }
                replication_mode |= ((bottom.frame_coding_mode != 0) as u32) << 2;
            }
        }
    }

    if picture_type == cmd::VC1_B_PICTURE {
        if let Some(top) = aux_of(call, 1) {
            intensitycomp_single_bwd = (top.ic_top != 0) as u32;
            lumscale1_single_bwd = top.scale_top[0];
            lumshift1_single_bwd = top.shift_top[0];
            replication_mode |= ((top.frame_coding_mode != 0) as u32) << 1;
        }

        if interlaced_refs {
            if let Some(bottom) = aux_of(call, 3) {
                intensitycomp_single_bwd |= ((bottom.ic_bottom != 0) as u32) << 1;
                lumscale2_single_bwd = bottom.scale_bottom[0];
                lumshift2_single_bwd = bottom.shift_bottom[0];
                replication_mode |= ((bottom.frame_coding_mode != 0) as u32) << 3;
            }
        }
    }

    let batch = &mut *call.batch;
    batch.begin(6);
    batch.emit(cmd_header(cmd::MFX_VC1_PRED_PIPE_STATE, 6));
    batch.emit(
        (intensitycomp_double_fwd << 14)
            | (0 << 12)
            | (intensitycomp_single_fwd << 10)
            | (intensitycomp_single_bwd << 8)
            | (replication_mode << 4),
    );
    batch.emit(
        (lumshift2_single_fwd << 24)
            | (lumshift1_single_fwd << 16)
            | (lumscale2_single_fwd << 8)
            | lumscale1_single_fwd,
    );
    batch.emit(
        (lumshift2_double_fwd << 24)
            | (lumshift1_double_fwd << 16)
            | (lumscale2_double_fwd << 8)
            | lumscale1_double_fwd,
    );
    batch.emit(
        (lumshift2_single_bwd << 24)
            | (lumshift1_single_bwd << 16)
            | (lumscale2_single_bwd << 8)
            | lumscale1_single_bwd,
    );
    batch.emit(0);
    batch.advance();
}

/// Copy of the aux fields pred-pipe reads, so the borrow on the surface set
/// ends before emission starts.
struct Vc1AuxSnapshot {
    ic_top: u8,
    ic_bottom: u8,
    scale_top: [u32; 2],
    scale_bottom: [u32; 2],
    shift_top: [u32; 2],
    shift_bottom: [u32; 2],
    frame_coding_mode: u32,
}

impl Vc1AuxSnapshot {
    fn of(aux: &Vc1Aux) -> Self {
        Self {
            ic_top: aux.intensity_compensation_top,
            ic_bottom: aux.intensity_compensation_bottom,
            scale_top: aux.luma_scale_top,
            scale_bottom: aux.luma_scale_bottom,
            shift_top: aux.luma_shift_top,
            shift_bottom: aux.luma_shift_bottom,
            frame_coding_mode: aux.frame_coding_mode,
        }
    }
}

fn directmode_state(call: &mut DecodeCall, target: SurfaceId, pic: &Vc1PictureParams) {
    let (picture_type, is_first_field) = picture_type_of(pic);
    let mocs = call.ctx.mocs;

    let bottom_polarity = |pic: &Vc1PictureParams| {
        pic.sequence_fields.interlace
            && pic.picture_fields.frame_coding_mode == 2
            && (pic.picture_fields.top_field_first ^ is_first_field)
    };

    let mut dmv_write: Option<BufferRef> = None;
    if picture_type == cmd::VC1_P_PICTURE || picture_type == cmd::VC1_SKIPPED_PICTURE {
        if let Some(aux) = call.surfaces.vc1_aux(target) {
            dmv_write = if bottom_polarity(pic) {
                aux.dmv_bottom.clone()
            } else {
                Some(aux.dmv_top.clone())
            };
        }
    }

    let mut dmv_read: Option<BufferRef> = None;
    if picture_type == cmd::VC1_B_PICTURE {
        let backward = pic
            .backward_reference_picture
            .filter(|id| call.surfaces.contains(*id));
        if let Some(aux) = backward.and_then(|id| call.surfaces.vc1_aux(id)) {
            dmv_read = if bottom_polarity(pic) {
                aux.dmv_bottom.clone()
            } else {
                Some(aux.dmv_top.clone())
            };
        }
    }

    call.batch.begin(7);
    call.batch.emit(cmd_header(cmd::MFX_VC1_DIRECTMODE_STATE, 7));
    call.emit_addr(dmv_write, Domains::INSTRUCTION, Domains::INSTRUCTION);
    call.batch.emit(mocs);
    call.emit_addr(dmv_read, Domains::INSTRUCTION, Domains::empty());
    call.batch.emit(mocs);
    call.batch.advance();
}

/// Locates the first macroblock in an Advanced-profile slice, skipping the
/// emulation-prevention bytes inside the slice header. The trailing
/// prevention byte, if any, is squashed in place so the engine never sees it.
fn macroblock_bit_offset(slice_data: &mut [u8], in_bit_offset: u32, profile: u32) -> u32 {
    let slice_header_size = (in_bit_offset / 8) as usize;
    if profile != VC1_PROFILE_ADVANCED || slice_header_size == 0 {
        return in_bit_offset;
    }

    let matches_epb = |buf: &[u8], j: usize| {
        buf.len() >= j + 4 && buf[j] == 0 && buf[j + 1] == 0 && buf[j + 2] == 3 && buf[j + 3] < 4
    };

    let mut i = 0usize;
    let mut j = 0usize;
    while i < slice_header_size - 1 {
        if matches_epb(slice_data, j) {
            i += 1;
            j += 2;
        }
        i += 1;
        j += 1;
    }

    if i == slice_header_size - 1 {
        if matches_epb(slice_data, j) {
            slice_data[j + 2] = 0;
            j += 1;
        }
        j += 1;
    }

    (8 * j as u32) + in_bit_offset % 8
}

fn bsd_object(
    call: &mut DecodeCall,
    pic: &Vc1PictureParams,
    slice: &Vc1SliceParams,
    next_slice: Option<&Vc1SliceParams>,
    slice_data: &BufferRef,
) {
    let macroblock_offset = {
        let mut data = slice_data.map_mut();
        let start = (slice.slice_data_offset as usize).min(data.len());
        let end = (start + slice.slice_data_size as usize).min(data.len());
        macroblock_bit_offset(
            &mut data[start..end],
            slice.macroblock_offset,
            pic.sequence_fields.profile,
        )
    };

    let next_slice_start_vert_pos = match next_slice {
        Some(next) => next.slice_vertical_position,
        None => height_in_mbs(pic),
    };

    let batch = &mut *call.batch;
    batch.begin(5);
    batch.emit(cmd_header(cmd::MFD_VC1_BSD_OBJECT, 5));
    batch.emit(slice.slice_data_size.wrapping_sub(macroblock_offset >> 3));
    batch.emit(slice.slice_data_offset.wrapping_add(macroblock_offset >> 3));
    batch.emit((slice.slice_vertical_position << 16) | next_slice_start_vert_pos);
    batch.emit(macroblock_offset & 0x7);
    batch.advance();
}

pub(crate) fn decode_picture(
    call: &mut DecodeCall,
    target: SurfaceId,
    req: &Vc1Request,
) -> Result<()> {
    decode_init(call, target, req)?;

    call.batch.start_atomic();
    mi_flush(call);
    pipe_mode_select(call, StandardSelect::Vc1);
    surface_state(call, target, StandardSelect::Vc1);
    pipe_buf_addr_state(call);
    bsp_buf_base_addr_state(call);
    pic_state(call, target, req);
    pred_pipe_state(call, &req.picture);
    directmode_state(call, target, &req.picture);

    for (j, group) in req.slice_groups.iter().enumerate() {
        ind_obj_base_addr_state(call, &group.data);
        let next_group = req.slice_groups.get(j + 1);

        for (i, slice) in group.params.iter().enumerate() {
            let next_slice = group
                .params
                .get(i + 1)
                .or_else(|| next_group.and_then(|g| g.params.first()));
            bsd_object(call, &req.picture, slice, next_slice, &group.data);
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
    fn alt_pquant_covers_the_documented_branch_table() {
        // (dquant, dq_frame, dq_profile, dq_db_edge, dq_sb_edge,
        //  dq_binary_level) -> (config, edge_mask).
        let cases: &[((u32, u32, u32, u32, u32, u32), (u32, u32))] = &[
            ((0, 0, 0, 0, 0, 0), (0, 0)),
            ((2, 0, 0, 0, 0, 0), (1, 0xf)),
            ((1, 0, 0, 0, 0, 0), (0, 0)),
            ((1, 1, 0, 0, 0, 0), (1, 0xf)),
            ((1, 1, 1, 0, 0, 0), (1, 0x3)),
            ((1, 1, 1, 1, 0, 0), (1, 0x6)),
            ((1, 1, 1, 2, 0, 0), (1, 0xc)),
            ((1, 1, 1, 3, 0, 0), (1, 0x9)),
            ((1, 1, 2, 0, 0, 0), (1, 0x1)),
            ((1, 1, 2, 0, 1, 0), (1, 0x2)),
            ((1, 1, 2, 0, 2, 0), (1, 0x4)),
            ((1, 1, 2, 0, 3, 0), (1, 0x8)),
            ((1, 1, 3, 0, 0, 0), (2, 0)),
            ((1, 1, 3, 0, 0, 1), (3, 0)),
        ];
        for &((dquant, dq_frame, dq_profile, dq_db_edge, dq_sb_edge, dq_binary_level), want) in
            cases
        {
            let mut pic = Vc1PictureParams::default();
            pic.pic_quantizer_fields.dquant = dquant;
            pic.pic_quantizer_fields.dq_frame = dq_frame;
            pic.pic_quantizer_fields.dq_profile = dq_profile;
            pic.pic_quantizer_fields.dq_db_edge = dq_db_edge;
            pic.pic_quantizer_fields.dq_sb_edge = dq_sb_edge;
            pic.pic_quantizer_fields.dq_binary_level = dq_binary_level;
            pic.pic_quantizer_fields.alt_pic_quantizer = 5;
            let (config, mask, _) = alt_pquant(&pic);
            assert_eq!(
                (config, mask),
                want,
                "dquant={dquant} dq_frame={dq_frame} dq_profile={dq_profile} \
                 dq_db_edge={dq_db_edge} dq_sb_edge={dq_sb_edge} dq_binary_level={dq_binary_level}"
            );
        }
    }

    #[test]
    fn dquant_one_without_dq_frame_clears_the_alternate_quantizer() {
        let mut pic = Vc1PictureParams::default();
        pic.pic_quantizer_fields.dquant = 1;
        pic.pic_quantizer_fields.dq_frame = 0;
        pic.pic_quantizer_fields.alt_pic_quantizer = 9;
        let (_, _, alt_pq) = alt_pquant(&pic);
        assert_eq!(alt_pq, 0);
    }

    #[test]
    fn bitplane_packs_even_width_rows() {
        // Two MBs per row, two rows: values 1,2 / 3,0. The source packs two
        // MBs per byte, high nibble first.
        let src = [0x12u8, 0x30];
        let mut dst = [0u8; 2];
        pack_bitplane(&mut dst, Some(&src), 2, 2, 1);
        // Row packing shifts right then inserts at the high nibble, so the
        // first MB of a pair lands in the low nibble.
        assert_eq!(dst, [0x21, 0x03]);
    }

    #[test]
    fn bitplane_shifts_the_final_nibble_on_odd_widths() {
        // Width 3: the last macroblock of each row must land in the low
        // nibble of the final byte.
        let src = [0x12u8, 0x30];
        let mut dst = [0u8; 2];
        pack_bitplane(&mut dst, Some(&src), 3, 1, 2);
        assert_eq!(dst, [0x21, 0x03]);
    }

    #[test]
    fn skipped_pictures_synthesize_an_all_skip_plane() {
        let mut dst = [0u8; 2];
        pack_bitplane(&mut dst, None, 2, 2, 1);
        assert_eq!(dst, [0x22, 0x22]);
    }

    #[test]
    fn advanced_profile_offset_steps_over_header_emulation_bytes() {
        // Header of 3 bytes (bit offset 24) starting with 00 00 03 01: the
        // scan walks the prevention sequence as one header byte, landing a
        // byte further into the data.
        let mut data = [0x00u8, 0x00, 0x03, 0x01, 0xff];
        let out = macroblock_bit_offset(&mut data, 24, VC1_PROFILE_ADVANCED);
        assert_eq!(out, 32);
        assert_eq!(data[2], 3); // in-header prevention bytes stay untouched
    }

    #[test]
    fn advanced_profile_squashes_a_trailing_prevention_byte() {
        // Two header bytes, then 00 00 03 01 straddling the header end: the
        // trailing prevention byte is zeroed in place and skipped.
        let mut data = [0xaau8, 0x00, 0x00, 0x03, 0x01];
        let out = macroblock_bit_offset(&mut data, 16, VC1_PROFILE_ADVANCED);
        assert_eq!(out, 24);
        assert_eq!(data[3], 0);
    }

    #[test]
    fn simple_profile_offsets_pass_through() {
        let mut data = [0u8; 8];
        assert_eq!(macroblock_bit_offset(&mut data, 42, VC1_PROFILE_MAIN), 42);
    }

    #[test]
    fn field_pairs_combine_fptype_and_field_order() {
        let mut pic = Vc1PictureParams::default();
        pic.sequence_fields.interlace = true;
        pic.picture_fields.frame_coding_mode = 2;
        pic.picture_fields.picture_type = 1; // I then P
        pic.picture_fields.is_first_field = true;
        assert_eq!(picture_type_of(&pic), (cmd::VC1_I_PICTURE, true));
        pic.picture_fields.is_first_field = false;
        assert_eq!(picture_type_of(&pic), (cmd::VC1_P_PICTURE, false));
    }

    use crate::buffer::SystemAllocator;
    use crate::context::DecodeContext;
    use crate::surface::SurfaceSet;
    use vdec_protocol::BatchBuffer;

    struct Fixture {
        ctx: DecodeContext,
        surfaces: SurfaceSet,
        batch: BatchBuffer,
        alloc: SystemAllocator,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                ctx: DecodeContext::new(),
                surfaces: SurfaceSet::new(),
                batch: BatchBuffer::new(),
                alloc: SystemAllocator::new(),
            }
        }

        fn call(&mut self) -> DecodeCall<'_> {
            DecodeCall {
                ctx: &mut self.ctx,
                surfaces: &mut self.surfaces,
                batch: &mut self.batch,
                allocator: &self.alloc,
                retained: Vec::new(),
            }
        }
    }

    /// Attaches zeroed VC-1 aux state to a fresh surface.
    fn seed_surface(fx: &mut Fixture, id: SurfaceId) {
        fx.surfaces.create(id, 64, 64);
        let pic = Vc1PictureParams::default();
        let mut call = fx.call();
        init_vc1_surface(&mut call, id, &pic).unwrap();
    }

    fn field_p_picture(forward: SurfaceId) -> Vc1PictureParams {
        let mut pic = Vc1PictureParams::default();
        pic.forward_reference_picture = Some(forward);
        pic.sequence_fields.interlace = true;
        pic.picture_fields.frame_coding_mode = 2;
        pic.picture_fields.picture_type = 3; // P/P field pair
        pic.mv_fields.mv_mode = Vc1MvMode::IntensityCompensation;
        pic.luma_scale = 40;
        pic.luma_shift = 10;
        pic.luma_scale2 = 41;
        pic.luma_shift2 = 11;
        pic
    }

    #[test]
    fn progressive_compensation_lands_on_the_forward_reference() {
        let mut fx = Fixture::new();
        let forward = SurfaceId(1);
        let target = SurfaceId(2);
        seed_surface(&mut fx, forward);
        seed_surface(&mut fx, target);

        let mut pic = Vc1PictureParams::default();
        pic.forward_reference_picture = Some(forward);
        pic.mv_fields.mv_mode = Vc1MvMode::IntensityCompensation;
        pic.luma_scale = 33;
        pic.luma_shift = 7;

        let mut call = fx.call();
        apply_intensity_compensation(&mut call, target, &pic);

        let aux = fx.surfaces.vc1_aux(forward).unwrap();
        assert_eq!(aux.intensity_compensation_top, 1);
        assert_eq!(aux.intensity_compensation_bottom, 1);
        assert_eq!(aux.luma_scale_top[0], 33);
        assert_eq!(aux.luma_shift_bottom[0], 7);
        assert_eq!(fx.surfaces.vc1_aux(target).unwrap().intensity_compensation_top, 0);
    }

    #[test]
    fn first_field_compensation_writes_the_forward_surface() {
        let mut fx = Fixture::new();
        let forward = SurfaceId(1);
        let target = SurfaceId(2);
        seed_surface(&mut fx, forward);
        seed_surface(&mut fx, target);

        let mut pic = field_p_picture(forward);
        pic.picture_fields.is_first_field = true;
        pic.picture_fields.top_field_first = true;
        pic.intensity_compensation_field = 1; // top only
        // Same-polarity reference: indicator matches top_field_first.
        pic.reference_fields.reference_field_pic_indicator = true;

        let mut call = fx.call();
        apply_intensity_compensation(&mut call, target, &pic);

        let aux = fx.surfaces.vc1_aux(forward).unwrap();
        assert_eq!(aux.intensity_compensation_top, 1);
        assert_eq!(aux.luma_scale_top[0], 40);
        assert_eq!(aux.luma_shift_top[0], 10);
        assert_eq!(aux.intensity_compensation_bottom, 0);
    }

    #[test]
    fn second_field_compensation_can_target_the_current_surface() {
        // With top-field-first coding, the second field's top-field
        // compensation references the first field of the same frame, so the
        // history lands on the *current* surface.
        let mut fx = Fixture::new();
        let forward = SurfaceId(1);
        let target = SurfaceId(2);
        seed_surface(&mut fx, forward);
        seed_surface(&mut fx, target);

        let mut pic = field_p_picture(forward);
        pic.picture_fields.is_first_field = false;
        pic.picture_fields.top_field_first = true;
        pic.intensity_compensation_field = 1; // top only
        pic.reference_fields.reference_field_pic_indicator = false;

        let mut call = fx.call();
        apply_intensity_compensation(&mut call, target, &pic);

        assert_eq!(fx.surfaces.vc1_aux(forward).unwrap().intensity_compensation_top, 0);
        let aux = fx.surfaces.vc1_aux(target).unwrap();
        assert_eq!(aux.intensity_compensation_top, 1);
        assert_eq!(aux.luma_scale_top[0], 40);
    }

    #[test]
    fn both_field_compensation_uses_the_secondary_pair_for_bottom() {
        let mut fx = Fixture::new();
        let forward = SurfaceId(1);
        let target = SurfaceId(2);
        seed_surface(&mut fx, forward);
        seed_surface(&mut fx, target);

        let mut pic = field_p_picture(forward);
        pic.picture_fields.is_first_field = true;
        pic.picture_fields.top_field_first = false;
        pic.intensity_compensation_field = 0; // both fields
        // Bottom branch wants indicator ^ top_field_first.
        pic.reference_fields.reference_field_pic_indicator = true;

        let mut call = fx.call();
        apply_intensity_compensation(&mut call, target, &pic);

        let aux = fx.surfaces.vc1_aux(forward).unwrap();
        assert_eq!(aux.intensity_compensation_bottom, 1);
        assert_eq!(aux.luma_scale_bottom[0], 41);
        assert_eq!(aux.luma_shift_bottom[0], 11);
    }

    #[test]
    fn double_compensation_keeps_both_history_entries() {
        let mut fx = Fixture::new();
        let forward = SurfaceId(1);
        let target = SurfaceId(2);
        seed_surface(&mut fx, forward);
        seed_surface(&mut fx, target);

        let mut pic = field_p_picture(forward);
        pic.picture_fields.is_first_field = true;
        pic.picture_fields.top_field_first = true;
        pic.intensity_compensation_field = 1;
        pic.reference_fields.num_reference_pictures = 1;

        let mut call = fx.call();
        apply_intensity_compensation(&mut call, target, &pic);
        pic.luma_scale = 50;
        pic.luma_shift = 20;
        let mut call = fx.call();
        apply_intensity_compensation(&mut call, target, &pic);

        let aux = fx.surfaces.vc1_aux(forward).unwrap();
        assert_eq!(aux.intensity_compensation_top, 2);
        assert_eq!(aux.luma_scale_top, [40, 50]);
        assert_eq!(aux.luma_shift_top, [10, 20]);
    }
}
