mod common;

use std::rc::Rc;

use common::*;
use pretty_assertions::assert_eq;
use vdec_core::params::vc1::{
    Vc1MvMode, Vc1PictureParams, Vc1SliceParams, VC1_PROFILE_MAIN, VC1_PTYPE_B, VC1_PTYPE_I,
    VC1_PTYPE_P, VC1_PTYPE_SKIPPED,
};
use vdec_core::request::{CodecRequest, DecodeRequest, SliceGroup, Vc1Request};
use vdec_core::{Allocator, DecodeConfig, DecodePipeline, Profile, SurfaceId, SurfaceSet};
use vdec_protocol::cmd;

fn setup() -> (DecodePipeline, SurfaceSet, Rc<TrackingAllocator>) {
    let alloc = Rc::new(TrackingAllocator::new());
    let pipeline = DecodePipeline::new(DecodeConfig::new(Profile::Vc1Main), alloc.clone());
    (pipeline, SurfaceSet::new(), alloc)
}

fn picture(ptype: u32) -> Vc1PictureParams {
    let mut pic = Vc1PictureParams::default();
    pic.coded_width = 64;
    pic.coded_height = 64;
    pic.picture_fields.picture_type = ptype;
    pic
}

fn request(alloc: &TrackingAllocator, target: u32, pic: Vc1PictureParams) -> DecodeRequest {
    DecodeRequest {
        target: SurfaceId(target),
        codec: CodecRequest::Vc1(Vc1Request {
            picture: pic,
            bit_plane: None,
            slice_groups: vec![SliceGroup {
                params: vec![Vc1SliceParams {
                    slice_data_size: 128,
                    ..Default::default()
                }],
                data: alloc.alloc("slice data", 4096, 16).unwrap(),
            }],
        }),
    }
}

fn decode(
    pipeline: &mut DecodePipeline,
    surfaces: &mut SurfaceSet,
    req: &DecodeRequest,
) -> vdec_protocol::Batch {
    pipeline.decode_picture(surfaces, req).unwrap();
    pipeline.drain_batches().pop().unwrap().commands
}

#[test]
fn intensity_compensation_from_one_frame_is_visible_to_the_next() {
    let (mut pipeline, mut surfaces, alloc) = setup();
    surfaces.create(SurfaceId(1), 64, 64);
    surfaces.create(SurfaceId(2), 64, 64);
    surfaces.create(SurfaceId(3), 64, 64);

    // Seed the reference frame.
    decode(&mut pipeline, &mut surfaces, &request(&alloc, 1, picture(VC1_PTYPE_I)));

    // A P frame with intensity compensation writes scale/shift onto the
    // *reference* surface's state.
    let mut pic = picture(VC1_PTYPE_P);
    pic.forward_reference_picture = Some(SurfaceId(1));
    pic.mv_fields.mv_mode = Vc1MvMode::IntensityCompensation;
    pic.mv_fields.mv_mode2 = Vc1MvMode::OneMv;
    pic.luma_scale = 33;
    pic.luma_shift = 7;
    decode(&mut pipeline, &mut surfaces, &request(&alloc, 2, pic));

    // The following P frame against the same reference reads the history
    // back into its prediction-pipe state.
    let mut pic = picture(VC1_PTYPE_P);
    pic.forward_reference_picture = Some(SurfaceId(1));
    let batch = decode(&mut pipeline, &mut surfaces, &request(&alloc, 3, pic));

    let pred = find_cmd(&batch, cmd::MFX_VC1_PRED_PIPE_STATE).unwrap();
    assert_eq!((batch.dwords[pred + 1] >> 10) & 0x3, 1); // single fwd, top
    assert_eq!(batch.dwords[pred + 2], (7 << 16) | 33);
    assert_eq!((batch.dwords[pred + 1] >> 14) & 0x3, 0); // no double entry
}

#[test]
fn range_reduction_transitions_set_the_scale_bits() {
    let (mut pipeline, mut surfaces, alloc) = setup();
    surfaces.create(SurfaceId(1), 64, 64);
    surfaces.create(SurfaceId(2), 64, 64);

    // Range-reduced reference frame on Main profile.
    let mut pic = picture(VC1_PTYPE_I);
    pic.sequence_fields.profile = VC1_PROFILE_MAIN;
    pic.sequence_fields.rangered = true;
    pic.range_reduction_frame = true;
    decode(&mut pipeline, &mut surfaces, &request(&alloc, 1, pic));

    // A non-reduced P frame referencing it must scale up.
    let mut pic = picture(VC1_PTYPE_P);
    pic.sequence_fields.profile = VC1_PROFILE_MAIN;
    pic.sequence_fields.rangered = true;
    pic.range_reduction_frame = false;
    pic.forward_reference_picture = Some(SurfaceId(1));
    let batch = decode(&mut pipeline, &mut surfaces, &request(&alloc, 2, pic));

    let pc = find_cmd(&batch, cmd::MFD_VC1_LONG_PIC_STATE).unwrap();
    assert_ne!(batch.dwords[pc + 2] & (1 << 6), 0, "range reduction on");
    assert_ne!(batch.dwords[pc + 2] & (1 << 7), 0, "scale up");
}

#[test]
fn p_pictures_bind_their_direct_mv_write_buffer() {
    let (mut pipeline, mut surfaces, alloc) = setup();
    surfaces.create(SurfaceId(1), 64, 64);

    let batch = decode(&mut pipeline, &mut surfaces, &request(&alloc, 1, picture(VC1_PTYPE_P)));
    let dm = find_cmd(&batch, cmd::MFX_VC1_DIRECTMODE_STATE).unwrap();
    assert!(has_reloc_at(&batch, dm + 1), "write buffer bound");
    assert!(!has_reloc_at(&batch, dm + 4), "no read buffer for P pictures");
}

#[test]
fn b_pictures_read_the_backward_references_direct_mv_buffer() {
    let (mut pipeline, mut surfaces, alloc) = setup();
    surfaces.create(SurfaceId(1), 64, 64);
    surfaces.create(SurfaceId(2), 64, 64);
    surfaces.create(SurfaceId(3), 64, 64);

    // The backward reference decodes first, as a P picture (so its
    // co-located buffer is valid for direct mode).
    decode(&mut pipeline, &mut surfaces, &request(&alloc, 1, picture(VC1_PTYPE_I)));
    let mut pic = picture(VC1_PTYPE_P);
    pic.forward_reference_picture = Some(SurfaceId(1));
    decode(&mut pipeline, &mut surfaces, &request(&alloc, 2, pic));

    let mut pic = picture(VC1_PTYPE_B);
    pic.forward_reference_picture = Some(SurfaceId(1));
    pic.backward_reference_picture = Some(SurfaceId(2));
    pic.b_picture_fraction = 0;
    let batch = decode(&mut pipeline, &mut surfaces, &request(&alloc, 3, pic));

    let dm = find_cmd(&batch, cmd::MFX_VC1_DIRECTMODE_STATE).unwrap();
    assert!(!has_reloc_at(&batch, dm + 1), "B pictures do not write");
    assert!(has_reloc_at(&batch, dm + 4), "read buffer bound");

    // The backward reference's top field was a P picture, so the co-located
    // MV surface is flagged valid.
    let pc = find_cmd(&batch, cmd::MFD_VC1_LONG_PIC_STATE).unwrap();
    assert_ne!(batch.dwords[pc + 2] & (1 << 15), 0);
}

#[test]
fn skipped_pictures_synthesize_a_bitplane() {
    let (mut pipeline, mut surfaces, alloc) = setup();
    surfaces.create(SurfaceId(1), 64, 64);
    surfaces.create(SurfaceId(2), 64, 64);

    decode(&mut pipeline, &mut surfaces, &request(&alloc, 1, picture(VC1_PTYPE_I)));

    let mut pic = picture(VC1_PTYPE_SKIPPED);
    pic.forward_reference_picture = Some(SurfaceId(1));
    let batch = decode(&mut pipeline, &mut surfaces, &request(&alloc, 2, pic));

    // The bitplane slot is bound in the BSP buffer command.
    let bsp = find_cmd(&batch, cmd::MFX_BSP_BUF_BASE_ADDR_STATE).unwrap();
    assert!(has_reloc_at(&batch, bsp + 7));

    // Every macroblock is coded as skipped (0x2 nibbles).
    let bitplane = alloc.last_live("vc-1 bitplane").unwrap();
    assert!(bitplane.map().iter().all(|&b| b == 0x22));

    // Skipped pictures decode as P with the pre-deblock output only.
    let pipe = find_cmd(&batch, cmd::MFX_PIPE_MODE_SELECT).unwrap();
    assert_ne!(batch.dwords[pipe + 1] & (1 << 8), 0);
    assert_eq!(batch.dwords[pipe + 1] & (1 << 9), 0);
    let pc = find_cmd(&batch, cmd::MFD_VC1_LONG_PIC_STATE).unwrap();
    assert_eq!((batch.dwords[pc + 3] >> 26) & 0x7, VC1_PTYPE_P);
}

#[test]
fn coded_bitplanes_require_the_bitplane_buffer() {
    let (mut pipeline, mut surfaces, alloc) = setup();
    surfaces.create(SurfaceId(1), 64, 64);

    let mut pic = picture(VC1_PTYPE_I);
    pic.bitplane_present = 0x4;
    let req = request(&alloc, 1, pic);
    let err = pipeline.decode_picture(&mut surfaces, &req).unwrap_err();
    assert!(matches!(err, vdec_core::DecodeError::InvalidInput(_)));
    assert!(pipeline.drain_batches().is_empty());
}

#[test]
fn vc1_populates_four_reference_slots() {
    let (mut pipeline, mut surfaces, alloc) = setup();
    surfaces.create(SurfaceId(1), 64, 64);
    surfaces.create(SurfaceId(2), 64, 64);
    surfaces.create(SurfaceId(3), 64, 64);

    decode(&mut pipeline, &mut surfaces, &request(&alloc, 1, picture(VC1_PTYPE_I)));
    let mut pic = picture(VC1_PTYPE_P);
    pic.forward_reference_picture = Some(SurfaceId(1));
    decode(&mut pipeline, &mut surfaces, &request(&alloc, 2, pic));

    let mut pic = picture(VC1_PTYPE_B);
    pic.forward_reference_picture = Some(SurfaceId(1));
    pic.backward_reference_picture = Some(SurfaceId(2));
    let batch = decode(&mut pipeline, &mut surfaces, &request(&alloc, 3, pic));

    // Slots 0..3 bind forward/backward for both field polarities; the rest
    // stay zero.
    let buf_addr = find_cmd(&batch, cmd::MFX_PIPE_BUF_ADDR_STATE).unwrap();
    for slot in 0..4 {
        assert!(has_reloc_at(&batch, buf_addr + 19 + 2 * slot), "slot {slot}");
    }
    for dw in buf_addr + 27..buf_addr + 51 {
        assert!(!has_reloc_at(&batch, dw));
    }
}
