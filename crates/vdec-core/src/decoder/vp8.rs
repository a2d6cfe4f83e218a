//! VP8 builder: single-partition-set frames, segment-indexed quantizers,
//! boolean-decoder bootstrap, and partition layout.

use tracing::warn;
use vdec_protocol::cmd::{self, cmd_header};
use vdec_protocol::{Domains, StandardSelect};

use super::{
    bsp_buf_base_addr_state, ind_obj_base_addr_state, mi_flush, pipe_buf_addr_state,
    pipe_mode_select, surface_state, DecodeCall,
};
use crate::context::{FrameStore, ScratchRole, MAX_REFERENCE_FRAMES};
use crate::error::{DecodeError, Result};
use crate::params::vp8::{Vp8PictureParams, Vp8SliceParams};
use crate::request::Vp8Request;
use crate::surface::{Fourcc, Subsampling, SurfaceId};
use crate::tables::{vp8_clip_quantization_index, VP8_AC_QLOOKUP, VP8_DC_QLOOKUP};

/// Token-partition count log2; the partition count is 2..=9 so this is the
/// exact bit length of the token-partition count.
fn log2_num_partitions(num_of_partitions: u32) -> u32 {
    (num_of_partitions - 1).ilog2()
}

/// Slots 0/1/2 hold the last/golden/altref frames.
fn update_frame_store(call: &mut DecodeCall, pic: &Vp8PictureParams) {
    let refs = [pic.last_ref_frame, pic.golden_ref_frame, pic.alt_ref_frame];
    for (i, id) in refs.into_iter().enumerate() {
        let surface = id.filter(|id| call.surfaces.contains(*id));
        call.ctx.reference_surfaces[i] = match surface {
            Some(surface) => FrameStore {
                surface: Some(surface),
                frame_store_id: i as i32,
            },
            None => FrameStore::invalid(),
        };
    }
    for slot in &mut call.ctx.reference_surfaces[3..MAX_REFERENCE_FRAMES] {
        *slot = FrameStore::invalid();
    }
}

fn decode_init(call: &mut DecodeCall, target: SurfaceId, req: &Vp8Request) -> Result<()> {
    let pic = &req.picture;
    let width_in_mbs = (pic.frame_width as u32 + 15) / 16;
    let height_in_mbs = (pic.frame_height as u32 + 15) / 16;

    update_frame_store(call, pic);

    let surface = call
        .surfaces
        .get_mut(target)
        .ok_or(DecodeError::InvalidInput("destination surface is not resident"))?;
    surface.ensure_backing(call.allocator, Fourcc::Nv12, Subsampling::Yuv420)?;
    let bo = surface.bo.clone().expect("backing just resolved");

    let loop_filter_disable = pic.pic_fields.loop_filter_disable;
    call.ctx.bind_output(
        ScratchRole::PostDeblockingOutput,
        bo.clone(),
        !loop_filter_disable,
    );
    call.ctx
        .bind_output(ScratchRole::PreDeblockingOutput, bo, loop_filter_disable);

    // The segmentation-id stream persists across frames once allocated.
    if !(call.ctx.segmentation_buffer.valid && call.ctx.segmentation_buffer.bo.is_some()) {
        let bo = call.allocator.alloc(
            "segmentation map",
            (width_in_mbs * height_in_mbs) as usize,
            0x1000,
        )?;
        call.ctx.segmentation_buffer.bo = Some(bo);
        call.ctx.segmentation_buffer.valid = true;
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
    Ok(())
}

/// Derives the per-segment quantizer values from the lookup tables, with the
/// fixed-point Y2AC scaling and the Y2AC/UVDC clamps.
fn quantization_values(req: &Vp8Request, segment: usize) -> [u32; 6] {
    let idx = &req.iq_matrix.quantization_index[segment];
    let mut q = [0u32; 6];
    q[0] = VP8_AC_QLOOKUP[vp8_clip_quantization_index(idx[0])]; // yac
    q[1] = VP8_DC_QLOOKUP[vp8_clip_quantization_index(idx[1])]; // ydc
    q[2] = 2 * VP8_DC_QLOOKUP[vp8_clip_quantization_index(idx[2])]; // y2dc
    // 101581 >> 16 is 155/100.
    q[3] = (101581 * VP8_AC_QLOOKUP[vp8_clip_quantization_index(idx[3])]) >> 16; // y2ac
    q[4] = VP8_DC_QLOOKUP[vp8_clip_quantization_index(idx[4])]; // uvdc
    q[5] = VP8_AC_QLOOKUP[vp8_clip_quantization_index(idx[5])]; // uvac

    q[3] = q[3].max(8);
    q[4] = q[4].min(132);
    q
}

fn pic_state(call: &mut DecodeCall, req: &Vp8Request, slice: &Vp8SliceParams) {
    let pic = &req.picture;
    let mocs = call.ctx.mocs;
    let log2num = log2_num_partitions(slice.num_of_partitions);

    // Segmentation needs both the stream flag and a live buffer; without the
    // buffer the picture still decodes, just without the segment map.
    let enable_segmentation =
        pic.pic_fields.segmentation_enabled && call.ctx.segmentation_buffer.valid;
    let update_map = pic.pic_fields.update_mb_segmentation_map;

    call.batch.begin(38);
    call.batch.emit(cmd_header(cmd::MFX_VP8_PIC_STATE, 38));
    call.batch.emit(
        (((pic.frame_height as u32 + 15) / 16 - 1) << 16)
            | ((pic.frame_width as u32 + 15) / 16 - 1),
    );
    call.batch.emit(
        (log2num << 24)
            | (pic.pic_fields.sharpness_level << 16)
            | ((pic.pic_fields.sign_bias_alternate as u32) << 13)
            | ((pic.pic_fields.sign_bias_golden as u32) << 12)
            | ((pic.pic_fields.loop_filter_adj_enable as u32) << 11)
            | ((pic.pic_fields.mb_no_coeff_skip as u32) << 10)
            | (((enable_segmentation && update_map) as u32) << 9)
            | ((pic.pic_fields.segmentation_enabled as u32) << 8)
            | (((enable_segmentation && !update_map) as u32) << 7)
            | (((enable_segmentation && update_map) as u32) << 6)
            | ((!pic.pic_fields.key_frame as u32) << 5) // frame-tag 0 is intra
            | (pic.pic_fields.filter_type << 4)
            | (((pic.pic_fields.version == 3) as u32) << 1) // full-pel only
            | ((pic.pic_fields.version != 0) as u32), // version 0 runs the 6-tap filter
    );

    call.batch.emit(
        ((pic.loop_filter_level[3] as u32) << 24)
            | ((pic.loop_filter_level[2] as u32) << 16)
            | ((pic.loop_filter_level[1] as u32) << 8)
            | (pic.loop_filter_level[0] as u32),
    );

    // Per-segment quantizers, dwords 4-15.
    for segment in 0..4 {
        let q = quantization_values(req, segment);
        call.batch.emit((q[0] << 16) | q[1]); // y1ac | y1dc
        call.batch.emit((q[5] << 16) | q[4]); // uvac | uvdc
        call.batch.emit((q[3] << 16) | q[2]); // y2ac | y2dc
    }

    // Coefficient-probability stream, dwords 16-18.
    match &req.probability_data {
        Some(probs) => {
            call.reloc64(probs, Domains::empty(), Domains::INSTRUCTION);
            call.batch.emit(mocs);
        }
        None => {
            call.batch.emit(0);
            call.batch.emit(0);
            call.batch.emit(0);
        }
    }

    call.batch.emit(
        ((pic.mb_segment_tree_probs[2] as u32) << 16)
            | ((pic.mb_segment_tree_probs[1] as u32) << 8)
            | (pic.mb_segment_tree_probs[0] as u32),
    );
    call.batch.emit(
        ((pic.prob_skip_false as u32) << 24)
            | ((pic.prob_intra as u32) << 16)
            | ((pic.prob_last as u32) << 8)
            | (pic.prob_gf as u32),
    );
    call.batch.emit(
        ((pic.y_mode_probs[3] as u32) << 24)
            | ((pic.y_mode_probs[2] as u32) << 16)
            | ((pic.y_mode_probs[1] as u32) << 8)
            | (pic.y_mode_probs[0] as u32),
    );
    call.batch.emit(
        ((pic.uv_mode_probs[2] as u32) << 16)
            | ((pic.uv_mode_probs[1] as u32) << 8)
            | (pic.uv_mode_probs[0] as u32),
    );

    // Motion-vector update probabilities, dwords 23-32.
    for component in 0..2 {
        for j in (0..20).step_by(4) {
            let byte3 = if j + 3 == 19 {
                0
            } else {
                pic.mv_probs[component][j + 3] as u32
            };
            call.batch.emit(
                (byte3 << 24)
                    | ((pic.mv_probs[component][j + 2] as u32) << 16)
                    | ((pic.mv_probs[component][j + 1] as u32) << 8)
                    | (pic.mv_probs[component][j] as u32),
            );
        }
    }

    call.batch.emit(
        (((pic.loop_filter_deltas_ref_frame[3] as u32) & 0x7f) << 24)
            | (((pic.loop_filter_deltas_ref_frame[2] as u32) & 0x7f) << 16)
            | (((pic.loop_filter_deltas_ref_frame[1] as u32) & 0x7f) << 8)
            | ((pic.loop_filter_deltas_ref_frame[0] as u32) & 0x7f),
    );
    call.batch.emit(
        (((pic.loop_filter_deltas_mode[3] as u32) & 0x7f) << 24)
            | (((pic.loop_filter_deltas_mode[2] as u32) & 0x7f) << 16)
            | (((pic.loop_filter_deltas_mode[1] as u32) & 0x7f) << 8)
            | ((pic.loop_filter_deltas_mode[0] as u32) & 0x7f),
    );

    // Segmentation-id stream base, dwords 35-37.
    if enable_segmentation {
        let bo = call
            .ctx
            .segmentation_buffer
            .bo
            .clone()
            .expect("segmentation buffer provisioned");
        call.reloc64(&bo, Domains::empty(), Domains::INSTRUCTION);
        call.batch.emit(mocs);
    } else {
        call.batch.emit(0);
        call.batch.emit(0);
        call.batch.emit(0);
    }
    call.batch.advance();
}

fn bsd_object(call: &mut DecodeCall, pic: &Vp8PictureParams, slice: &Vp8SliceParams) {
    let mut offset = slice.slice_data_offset + ((slice.macroblock_offset + 7) >> 3);
    let mut used_bits = 8 - pic.bool_coder_ctx.count as u32;
    let mut partition_size_0 = slice.partition_size[0];

    // A fully consumed bootstrap byte rolls over to the next one.
    if used_bits == 8 {
        used_bits = 0;
        offset += 1;
        partition_size_0 = partition_size_0.saturating_sub(1);
    }

    let log2num = log2_num_partitions(slice.num_of_partitions);

    let batch = &mut *call.batch;
    batch.begin(22);
    batch.emit(cmd_header(cmd::MFD_VP8_BSD_OBJECT, 22));
    batch.emit(
        (used_bits << 16)
            | ((pic.bool_coder_ctx.range as u32) << 8)
            | (log2num << 4)
            | (slice.macroblock_offset & 0x7),
    );
    batch.emit((pic.bool_coder_ctx.value as u32) << 24);

    batch.emit(partition_size_0 + 1);
    batch.emit(offset);

    // The token partitions follow partition 0 and the per-partition size
    // table (3 bytes per entry).
    offset = offset.wrapping_add(partition_size_0 + 3 * (slice.num_of_partitions - 2));
    for i in 1..9 {
        if (i as u32) < slice.num_of_partitions {
            batch.emit(slice.partition_size[i] + 1);
            batch.emit(offset);
        } else {
            batch.emit(0);
            batch.emit(0);
        }
        offset = offset.wrapping_add(slice.partition_size[i]);
    }

    batch.emit(0); // concealment method
    batch.advance();
}

pub(crate) fn decode_picture(
    call: &mut DecodeCall,
    target: SurfaceId,
    req: &Vp8Request,
) -> Result<()> {
    // One partition set per frame is a hard precondition; anything else is
    // skipped rather than failed so a broken frame cannot wedge playback.
    if req.slice_groups.len() != 1
        || req.slice_groups[0].params.len() != 1
        || req.probability_data.is_none()
    {
        warn!(
            slice_groups = req.slice_groups.len(),
            "wrong parameters for VP8 decoding, skipping frame"
        );
        return Ok(());
    }

    let pic = &req.picture;
    let slice = &req.slice_groups[0].params[0];

    let width_in_mbs = (pic.frame_width as u32 + 15) / 16;
    let height_in_mbs = (pic.frame_height as u32 + 15) / 16;
    if width_in_mbs == 0 || width_in_mbs > 256 || height_in_mbs == 0 || height_in_mbs > 256 {
        return Err(DecodeError::InvalidInput("picture exceeds the 4K limit"));
    }
    if !(2..=9).contains(&slice.num_of_partitions) {
        return Err(DecodeError::InvalidInput(
            "VP8 partition count out of range",
        ));
    }
    if pic.bool_coder_ctx.count > 7 {
        return Err(DecodeError::InvalidInput(
            "boolean-coder bit count out of range",
        ));
    }

    decode_init(call, target, req)?;

    call.batch.start_atomic();
    mi_flush(call);
    pipe_mode_select(call, StandardSelect::Vp8);
    surface_state(call, target, StandardSelect::Vp8);
    pipe_buf_addr_state(call);
    bsp_buf_base_addr_state(call);
    ind_obj_base_addr_state(call, &req.slice_groups[0].data);
    pic_state(call, req, slice);
    bsd_object(call, pic, slice);
    call.batch.end_atomic();
    call.batch.flush();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::vp8::Vp8IqMatrix;

    fn request_with_indices(idx: [i32; 6]) -> Vp8Request {
        let alloc = crate::buffer::SystemAllocator::new();
        let data = crate::buffer::Allocator::alloc(&alloc, "frame", 64, 16).unwrap();
        Vp8Request {
            picture: Vp8PictureParams::default(),
            iq_matrix: Vp8IqMatrix {
                quantization_index: [idx; 4],
            },
            probability_data: None,
            slice_groups: vec![crate::request::SliceGroup {
                params: vec![Vp8SliceParams::default()],
                data,
            }],
        }
    }

    #[test]
    fn partition_count_log2_is_exact_at_power_of_two_boundaries() {
        assert_eq!(log2_num_partitions(2), 0);
        assert_eq!(log2_num_partitions(3), 1);
        assert_eq!(log2_num_partitions(4), 1);
        assert_eq!(log2_num_partitions(5), 2);
        assert_eq!(log2_num_partitions(9), 3);
    }

    #[test]
    fn quantizer_derivation_scales_and_clamps() {
        // Index 0 everywhere: dc=4, ac=4. y2dc doubles, y2ac takes the
        // 155/100 fixed-point scale and then the floor of eight.
        let req = request_with_indices([0; 6]);
        let q = quantization_values(&req, 0);
        assert_eq!(q[0], 4);
        assert_eq!(q[1], 4);
        assert_eq!(q[2], 8);
        assert_eq!(q[3], 8); // (101581 * 4) >> 16 == 6, floored to 8
        assert_eq!(q[4], 4);
        assert_eq!(q[5], 4);
    }

    #[test]
    fn uv_dc_is_capped() {
        // Index 127: dc lookup yields 157, above the 132 ceiling.
        let req = request_with_indices([127, 127, 127, 127, 127, 127]);
        let q = quantization_values(&req, 0);
        assert_eq!(q[4], 132);
    }

    #[test]
    fn out_of_range_indices_clip_into_the_table() {
        let req = request_with_indices([-3, 500, 0, 0, 0, 0]);
        let q = quantization_values(&req, 0);
        assert_eq!(q[0], VP8_AC_QLOOKUP[0]);
        assert_eq!(q[1], VP8_DC_QLOOKUP[127]);
    }

    #[test]
    fn y2ac_scale_is_exact_fixed_point() {
        // Index 127: ac lookup yields 284; 284 * 155 / 100 == 440 (truncated).
        let req = request_with_indices([0, 0, 0, 127, 0, 0]);
        let q = quantization_values(&req, 0);
        assert_eq!(q[3], (101581u32 * 284) >> 16);
        assert_eq!(q[3], 440);
    }
}
