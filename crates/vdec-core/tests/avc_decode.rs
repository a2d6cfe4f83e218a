mod common;

use std::rc::Rc;

use common::*;
use pretty_assertions::assert_eq;
use vdec_core::params::avc::{
    AvcPictureParams, AvcSliceParams, PictureH264, PictureH264Flags, SLICE_TYPE_B, SLICE_TYPE_I,
    SLICE_TYPE_P,
};
use vdec_core::request::{AvcRequest, CodecRequest, DecodeRequest, SliceGroup};
use vdec_core::{
    Allocator, BufferRef, DecodeConfig, DecodePipeline, Profile, SliceMode, SurfaceId, SurfaceSet,
};
use vdec_protocol::cmd;

fn setup() -> (DecodePipeline, SurfaceSet, Rc<TrackingAllocator>) {
    let alloc = Rc::new(TrackingAllocator::new());
    let pipeline = DecodePipeline::new(DecodeConfig::new(Profile::H264High), alloc.clone());
    (pipeline, SurfaceSet::new(), alloc)
}

fn slice_data(alloc: &TrackingAllocator) -> BufferRef {
    alloc.alloc("slice data", 4096, 16).unwrap()
}

fn i_frame_picture(width_in_mbs: u16, height_in_mbs: u16) -> AvcPictureParams {
    let mut pic = AvcPictureParams::default();
    pic.curr_pic = PictureH264 {
        picture_id: Some(SurfaceId(1)),
        flags: PictureH264Flags::empty(),
        ..PictureH264::invalid()
    };
    pic.picture_width_in_mbs_minus1 = width_in_mbs - 1;
    pic.picture_height_in_mbs_minus1 = height_in_mbs - 1;
    pic.seq_fields.chroma_format_idc = 1;
    pic.seq_fields.frame_mbs_only_flag = true;
    pic.seq_fields.direct_8x8_inference_flag = true;
    pic
}

fn i_slice() -> AvcSliceParams {
    AvcSliceParams {
        slice_type: SLICE_TYPE_I,
        slice_data_size: 256,
        disable_deblocking_filter_idc: 1,
        ..Default::default()
    }
}

fn request(pic: AvcPictureParams, slices: Vec<AvcSliceParams>, data: BufferRef) -> DecodeRequest {
    DecodeRequest {
        target: SurfaceId(1),
        codec: CodecRequest::Avc(AvcRequest {
            picture: pic,
            iq_matrix: None,
            slice_groups: vec![SliceGroup {
                params: slices,
                data,
            }],
        }),
    }
}

#[test]
fn single_macroblock_i_frame_emits_the_canonical_sequence() {
    let (mut pipeline, mut surfaces, alloc) = setup();
    surfaces.create(SurfaceId(1), 16, 16);

    let req = request(i_frame_picture(1, 1), vec![i_slice()], slice_data(&alloc));
    pipeline.decode_picture(&mut surfaces, &req).unwrap();

    let batches = pipeline.drain_batches();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0].commands;

    assert_subsequence(
        batch,
        &[
            cmd::MFX_PIPE_MODE_SELECT,
            cmd::MFX_SURFACE_STATE,
            cmd::MFX_PIPE_BUF_ADDR_STATE,
            cmd::MFX_AVC_IMG_STATE,
            cmd::MFX_IND_OBJ_BASE_ADDR_STATE,
            cmd::MFX_AVC_SLICE_STATE,
            cmd::MFD_AVC_BSD_OBJECT,
        ],
    );

    // All 16 reference slots in the address-state command are zeroed and
    // carry no relocation.
    let buf_addr = find_cmd(batch, cmd::MFX_PIPE_BUF_ADDR_STATE).unwrap();
    for dw in buf_addr + 19..buf_addr + 51 {
        assert_eq!(batch.dwords[dw], 0, "reference dword {dw} not zero");
        assert!(!has_reloc_at(batch, dw));
    }

    // The slice references nothing.
    let slice = find_cmd(batch, cmd::MFX_AVC_SLICE_STATE).unwrap();
    assert_eq!(batch.dwords[slice + 2] >> 16, 0);
    // Last-slice flag set, macroblock coverage runs 0..1 row.
    assert_eq!(batch.dwords[slice + 6], 1 << 19);
    assert_eq!(batch.dwords[slice + 5], 1 << 16);

    // The bitstream object is flagged as the last slice.
    let bsd = find_cmd(batch, cmd::MFD_AVC_BSD_OBJECT).unwrap();
    assert_ne!(batch.dwords[bsd + 4] & (1 << 3), 0);
}

#[test]
fn ref_counts_are_forced_to_zero_without_valid_reference_surfaces() {
    let (mut pipeline, mut surfaces, alloc) = setup();
    surfaces.create(SurfaceId(1), 16, 16);

    let mut slice = i_slice();
    slice.slice_type = SLICE_TYPE_P;
    slice.num_ref_idx_l0_active_minus1 = 3;
    slice.num_ref_idx_l1_active_minus1 = 2;

    // The reference-frame list is empty, so no reference surface is valid.
    let req = request(i_frame_picture(1, 1), vec![slice], slice_data(&alloc));
    pipeline.decode_picture(&mut surfaces, &req).unwrap();

    let batches = pipeline.drain_batches();
    let batch = &batches[0].commands;
    let slice = find_cmd(batch, cmd::MFX_AVC_SLICE_STATE).unwrap();
    assert_eq!(batch.dwords[slice + 2] >> 16, 0, "ref counts must be forced to zero");
}

#[test]
fn late_first_slice_gets_a_phantom_predecessor() {
    let (mut pipeline, mut surfaces, alloc) = setup();
    surfaces.create(SurfaceId(1), 64, 64);

    let mut slice = i_slice();
    slice.first_mb_in_slice = 4; // second macroblock row of a 4-MB-wide frame

    let req = request(i_frame_picture(4, 4), vec![slice], slice_data(&alloc));
    pipeline.decode_picture(&mut surfaces, &req).unwrap();

    let batches = pipeline.drain_batches();
    let batch = &batches[0].commands;
    assert_eq!(count_cmd(batch, cmd::MFX_AVC_SLICE_STATE), 2);
    assert_eq!(count_cmd(batch, cmd::MFD_AVC_BSD_OBJECT), 2);

    // The phantom covers rows 0..1 and carries no slice parameters.
    let phantom = find_cmd(batch, cmd::MFX_AVC_SLICE_STATE).unwrap();
    assert_eq!(batch.dwords[phantom + 1], 0);
    assert_eq!(batch.dwords[phantom + 5], 1 << 16);
    // Its bitstream object is empty.
    let phantom_bsd = find_cmd(batch, cmd::MFD_AVC_BSD_OBJECT).unwrap();
    assert_eq!(batch.dwords[phantom_bsd + 1], 0);
}

#[test]
fn weighted_prediction_tables_follow_the_slice_type() {
    let (mut pipeline, mut surfaces, alloc) = setup();
    surfaces.create(SurfaceId(1), 16, 16);

    // P slice with explicit weighted prediction: one table.
    let mut pic = i_frame_picture(1, 1);
    pic.pic_fields.weighted_pred_flag = true;
    let mut slice = i_slice();
    slice.slice_type = SLICE_TYPE_P;
    slice.luma_weight_l0[0] = -2;
    let req = request(pic, vec![slice], slice_data(&alloc));
    pipeline.decode_picture(&mut surfaces, &req).unwrap();
    let batches = pipeline.drain_batches();
    let batch = &batches[0].commands;
    assert_eq!(count_cmd(batch, cmd::MFX_AVC_WEIGHTOFFSET_STATE), 1);
    let w = find_cmd(batch, cmd::MFX_AVC_WEIGHTOFFSET_STATE).unwrap();
    assert_eq!(batch.dwords[w + 1], 0); // list 0
    assert_eq!(batch.dwords[w + 2] & 0xffff, (-2i16 as u16) as u32);

    // B slice with explicit bipred: both lists.
    let mut pic = i_frame_picture(1, 1);
    pic.pic_fields.weighted_bipred_idc = 1;
    let mut slice = i_slice();
    slice.slice_type = SLICE_TYPE_B;
    let req = request(pic, vec![slice], slice_data(&alloc));
    pipeline.decode_picture(&mut surfaces, &req).unwrap();
    let batches = pipeline.drain_batches();
    let batch = &batches[0].commands;
    assert_eq!(count_cmd(batch, cmd::MFX_AVC_WEIGHTOFFSET_STATE), 2);
}

#[test]
fn reference_surfaces_keep_their_frame_store_slot_across_calls() {
    let (mut pipeline, mut surfaces, alloc) = setup();
    surfaces.create(SurfaceId(1), 16, 16);
    surfaces.create(SurfaceId(2), 16, 16);
    surfaces.create(SurfaceId(3), 16, 16);

    // Decode the reference frames so they carry direct-MV state.
    for id in [2u32, 3] {
        let mut pic = i_frame_picture(1, 1);
        pic.curr_pic.picture_id = Some(SurfaceId(id));
        pic.pic_fields.reference_pic_flag = true;
        let req = DecodeRequest {
            target: SurfaceId(id),
            codec: CodecRequest::Avc(AvcRequest {
                picture: pic,
                iq_matrix: None,
                slice_groups: vec![SliceGroup {
                    params: vec![i_slice()],
                    data: slice_data(&alloc),
                }],
            }),
        };
        pipeline.decode_picture(&mut surfaces, &req).unwrap();
    }
    pipeline.drain_batches();

    let reference = |id: u32, poc: i32| PictureH264 {
        picture_id: Some(SurfaceId(id)),
        flags: PictureH264Flags::SHORT_TERM_REFERENCE,
        top_field_order_cnt: poc,
        bottom_field_order_cnt: poc,
        ..PictureH264::invalid()
    };

    let mut pic = i_frame_picture(1, 1);
    pic.reference_frames[0] = reference(2, 4);
    pic.reference_frames[1] = reference(3, 8);
    let mut slice = i_slice();
    slice.slice_type = SLICE_TYPE_P;
    slice.ref_pic_list0[0] = reference(3, 8);
    let req = request(pic, vec![slice], slice_data(&alloc));
    pipeline.decode_picture(&mut surfaces, &req).unwrap();

    let batches = pipeline.drain_batches();
    let batch = &batches[0].commands;

    // Surface 2 took slot 0, surface 3 slot 1; the reference list points at
    // surface 3, so the first ref-idx byte is frame store 1.
    let ref_idx = find_cmd(batch, cmd::MFX_AVC_REF_IDX_STATE).unwrap();
    assert_eq!(batch.dwords[ref_idx + 2] & 0xff, 1);
    // Remaining entries are invalid.
    assert_eq!(batch.dwords[ref_idx + 2] >> 8, 0x00ff_ffff);

    // The direct-mode POC table mirrors the slot assignment.
    let dm = find_cmd(batch, cmd::MFX_AVC_DIRECTMODE_STATE).unwrap();
    let poc_base = dm + 37;
    assert_eq!(batch.dwords[poc_base], 4);
    assert_eq!(batch.dwords[poc_base + 1], 4);
    assert_eq!(batch.dwords[poc_base + 2], 8);
    assert_eq!(batch.dwords[poc_base + 3], 8);
    // Reference direct-MV buffers are bound for both slots.
    assert!(has_reloc_at(batch, dm + 1));
    assert!(has_reloc_at(batch, dm + 3));
}

#[test]
fn short_format_mode_zeroes_the_macroblock_byte_offset() {
    let alloc = Rc::new(TrackingAllocator::new());
    let config = DecodeConfig {
        profile: Profile::H264High,
        slice_mode: SliceMode::Base,
    };
    let mut pipeline = DecodePipeline::new(config, alloc.clone());
    let mut surfaces = SurfaceSet::new();
    surfaces.create(SurfaceId(1), 16, 16);

    let mut slice = i_slice();
    slice.slice_data_bit_offset = 67;
    let mut pic = i_frame_picture(1, 1);
    pic.pic_fields.entropy_coding_mode_flag = false;
    let req = request(pic, vec![slice], slice_data(&alloc));
    pipeline.decode_picture(&mut surfaces, &req).unwrap();

    let batches = pipeline.drain_batches();
    let batch = &batches[0].commands;

    // Short-format select in the pipe mode dword.
    let pipe = find_cmd(batch, cmd::MFX_PIPE_MODE_SELECT).unwrap();
    assert_eq!(batch.dwords[pipe + 1] & (1 << 17), 0);

    // The byte offset is zeroed but the sub-byte bit offset survives.
    let bsd = find_cmd(batch, cmd::MFD_AVC_BSD_OBJECT).unwrap();
    assert_eq!(batch.dwords[bsd + 4] >> 16, 0);
    assert_eq!(batch.dwords[bsd + 4] & 0x7, 67 & 0x7);
}

#[test]
fn cabac_slices_byte_align_the_first_macroblock() {
    let (mut pipeline, mut surfaces, alloc) = setup();
    surfaces.create(SurfaceId(1), 16, 16);

    let mut pic = i_frame_picture(1, 1);
    pic.pic_fields.entropy_coding_mode_flag = true;
    let mut slice = i_slice();
    slice.slice_data_bit_offset = 67;
    let req = request(pic, vec![slice], slice_data(&alloc));
    pipeline.decode_picture(&mut surfaces, &req).unwrap();

    let batches = pipeline.drain_batches();
    let batch = &batches[0].commands;
    let bsd = find_cmd(batch, cmd::MFD_AVC_BSD_OBJECT).unwrap();
    // 67 rounds up to 72 bits = 9 bytes.
    assert_eq!(batch.dwords[bsd + 4] >> 16, 9);
    assert_eq!(batch.dwords[bsd + 4] & 0x7, 0);
}
