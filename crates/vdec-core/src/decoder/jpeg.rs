//! JPEG baseline builder: chroma-class derivation, table loading keyed on
//! load flags, per-scan emission, and the feature-gated erratum workaround.

use vdec_protocol::cmd::{self, cmd_header};
use vdec_protocol::StandardSelect;

use super::{
    ind_obj_base_addr_state, mi_flush, pipe_buf_addr_state, pipe_mode_select, qm_state,
    surface_state, DecodeCall,
};
use crate::context::ScratchRole;
use crate::error::{DecodeError, Result};
use crate::params::jpeg::{JpegPictureParams, JpegSliceParams};
use crate::request::JpegRequest;
use crate::surface::{Fourcc, Subsampling, SurfaceId};
use crate::tables::zigzag_to_raster;

/// Quantizer-matrix selectors indexed by the 1-based component id.
const COMPONENT_QM_TYPE: [u32; 4] = [
    cmd::MFX_QM_JPEG_LUMA_Y_QUANTIZER_MATRIX,
    cmd::MFX_QM_JPEG_CHROMA_CB_QUANTIZER_MATRIX,
    cmd::MFX_QM_JPEG_CHROMA_CR_QUANTIZER_MATRIX,
    cmd::MFX_QM_JPEG_ALPHA_QUANTIZER_MATRIX,
];

const HUFFTABLE_IDS: [u32; 2] = [cmd::MFX_HUFFTABLE_ID_Y, cmd::MFX_HUFFTABLE_ID_UV];

/// Derives the subsampling class from the per-component sampling-factor
/// ratios. Exactly six combinations are recognized; anything else is a
/// caller error.
pub fn derive_chroma_class(pic: &JpegPictureParams) -> Result<Subsampling> {
    if pic.num_components == 1 {
        return Ok(Subsampling::Yuv400);
    }
    if pic.num_components != 3 {
        return Err(DecodeError::InvalidInput(
            "unsupported JPEG component count",
        ));
    }

    let [h1, h2, h3] = [
        pic.components[0].h_sampling_factor,
        pic.components[1].h_sampling_factor,
        pic.components[2].h_sampling_factor,
    ];
    let [v1, v2, v3] = [
        pic.components[0].v_sampling_factor,
        pic.components[1].v_sampling_factor,
        pic.components[2].v_sampling_factor,
    ];
    if [h1, h2, h3, v1, v2, v3]
        .iter()
        .any(|&f| f == 0 || f > 4)
    {
        return Err(DecodeError::InvalidInput(
            "JPEG sampling factors out of range",
        ));
    }

    let class = if h1 == 2 * h2 && h2 == h3 && v1 == 2 * v2 && v2 == v3 {
        Subsampling::Yuv420
    } else if h1 == 2 * h2 && h2 == h3 && v1 == v2 && v2 == v3 {
        Subsampling::Yuv422H
    } else if h1 == h2 && h2 == h3 && v1 == v2 && v2 == v3 {
        Subsampling::Yuv444
    } else if h1 == 4 * h2 && h2 == h3 && v1 == v2 && v2 == v3 {
        Subsampling::Yuv411
    } else if h1 == h2 && h2 == h3 && v1 == 2 * v2 && v2 == v3 {
        Subsampling::Yuv422V
    } else {
        return Err(DecodeError::InvalidInput(
            "unsupported JPEG chroma subsampling",
        ));
    };
    Ok(class)
}

fn fourcc_for(class: Subsampling) -> Fourcc {
    match class {
        Subsampling::Yuv400 => Fourcc::Y800,
        Subsampling::Yuv420 => Fourcc::Imc3,
        Subsampling::Yuv422H => Fourcc::Yuv422H,
        Subsampling::Yuv422V => Fourcc::Yuv422V,
        Subsampling::Yuv444 => Fourcc::Yuv444,
        Subsampling::Yuv411 => Fourcc::Yuv411,
    }
}

/// The chroma layout code the picture-state command carries distinguishes
/// luma-block multiplicity as well, so it keys on the exact factors.
fn chroma_code(pic: &JpegPictureParams) -> Result<u32> {
    if pic.num_components == 1 {
        return Ok(cmd::JPEG_CHROMA_400);
    }

    let [h1, h2, h3] = [
        pic.components[0].h_sampling_factor,
        pic.components[1].h_sampling_factor,
        pic.components[2].h_sampling_factor,
    ];
    let [v1, v2, v3] = [
        pic.components[0].v_sampling_factor,
        pic.components[1].v_sampling_factor,
        pic.components[2].v_sampling_factor,
    ];

    let code = if h1 == 2 * h2 && h2 == h3 && v1 == 2 * v2 && v2 == v3 {
        cmd::JPEG_CHROMA_420
    } else if h1 == 2 && h2 == 1 && h3 == 1 && v1 == 1 && v2 == 1 && v3 == 1 {
        cmd::JPEG_CHROMA_422H_2Y
    } else if h1 == h2 && h2 == h3 && v1 == v2 && v2 == v3 {
        cmd::JPEG_CHROMA_444
    } else if h1 == 4 * h2 && h2 == h3 && v1 == v2 && v2 == v3 {
        cmd::JPEG_CHROMA_411
    } else if h1 == 1 && h2 == 1 && h3 == 1 && v1 == 2 && v2 == 1 && v3 == 1 {
        cmd::JPEG_CHROMA_422V_2Y
    } else if h1 == 2 && h2 == 1 && h3 == 1 && v1 == 2 && v2 == 2 && v3 == 2 {
        cmd::JPEG_CHROMA_422H_4Y
    } else if h1 == 2 && h2 == 2 && h3 == 2 && v1 == 2 && v2 == 1 && v3 == 1 {
        cmd::JPEG_CHROMA_422V_4Y
    } else {
        return Err(DecodeError::InvalidInput(
            "unsupported JPEG chroma subsampling",
        ));
    };
    Ok(code)
}

/// 1-based component id relative to the first frame component.
fn component_id(pic: &JpegPictureParams, selector: u8) -> i32 {
    selector as i32 - pic.components[0].component_id as i32 + 1
}

pub(crate) fn validate(req: &JpegRequest) -> Result<()> {
    if req.slice_groups.is_empty() || req.slice_groups.iter().any(|g| g.params.is_empty()) {
        return Err(DecodeError::InvalidInput(
            "decode request carries no slice parameters",
        ));
    }

    let pic = &req.picture;
    derive_chroma_class(pic)?;
    chroma_code(pic)?;

    if pic.num_components > 3 {
        return Err(DecodeError::InvalidInput(
            "unsupported JPEG component count",
        ));
    }
    for component in &pic.components[..pic.num_components as usize] {
        if component.quantiser_table_selector > 3 {
            return Err(DecodeError::InvalidInput(
                "quantiser table selector out of range",
            ));
        }
    }

    for group in &req.slice_groups {
        for slice in &group.params {
            if slice.num_components == 0 || slice.num_components > 3 {
                return Err(DecodeError::InvalidInput(
                    "unsupported scan component count",
                ));
            }
            for component in &slice.components[..slice.num_components as usize] {
                let id = component_id(pic, component.component_selector);
                if !(1..=3).contains(&id) {
                    return Err(DecodeError::InvalidInput(
                        "scan component does not match a frame component",
                    ));
                }
                if component.dc_table_selector > 1 || component.ac_table_selector > 1 {
                    return Err(DecodeError::InvalidInput(
                        "huffman table selector out of range",
                    ));
                }
            }
        }
    }
    Ok(())
}

fn decode_init(call: &mut DecodeCall, target: SurfaceId, req: &JpegRequest) -> Result<()> {
    let class = derive_chroma_class(&req.picture)?;

    let surface = call
        .surfaces
        .get_mut(target)
        .ok_or(DecodeError::InvalidInput("destination surface is not resident"))?;
    surface.ensure_backing(call.allocator, fourcc_for(class), class)?;
    let bo = surface.bo.clone().expect("backing just resolved");

    call.ctx
        .bind_output(ScratchRole::PreDeblockingOutput, bo, true);
    call.ctx.invalidate(ScratchRole::PostDeblockingOutput);
    call.ctx.invalidate(ScratchRole::IntraRowStore);
    call.ctx.invalidate(ScratchRole::DeblockingFilterRowStore);
    call.ctx.invalidate(ScratchRole::BsdMpcRowStore);
    call.ctx.invalidate(ScratchRole::MprRowStore);
    call.ctx.invalidate(ScratchRole::BitplaneRead);
    Ok(())
}

fn pic_state(call: &mut DecodeCall, pic: &JpegPictureParams) -> Result<()> {
    let chroma_type = chroma_code(pic)?;
    let width = pic.picture_width as u32;
    let height = pic.picture_height as u32;

    let (frame_width_in_blks, frame_height_in_blks) = match chroma_type {
        cmd::JPEG_CHROMA_400 | cmd::JPEG_CHROMA_444 | cmd::JPEG_CHROMA_422V_2Y => {
            ((width + 7) / 8, (height + 7) / 8)
        }
        cmd::JPEG_CHROMA_411 => (((width + 31) / 32) * 4, ((height + 31) / 32) * 4),
        _ => (((width + 15) / 16) * 2, ((height + 15) / 16) * 2),
    };

    let batch = &mut *call.batch;
    batch.begin(3);
    batch.emit(cmd_header(cmd::MFX_JPEG_PIC_STATE, 3));
    batch.emit((cmd::JPEG_ROTATION_0 << 4) | chroma_type);
    batch.emit(((frame_height_in_blks - 1) << 16) | (frame_width_in_blks - 1));
    batch.advance();
    Ok(())
}

/// Loads the Huffman tables flagged for loading; `num_tables` comes from the
/// highest table selector any scan references.
fn huff_table_state(call: &mut DecodeCall, req: &JpegRequest, num_tables: usize) {
    let Some(huffman) = &req.huffman_table else {
        return;
    };

    for index in 0..num_tables {
        if !huffman.load_huffman_table[index] {
            continue;
        }
        let table = &huffman.huffman_table[index];

        let batch = &mut *call.batch;
        batch.begin(53);
        batch.emit(cmd_header(cmd::MFX_JPEG_HUFF_TABLE_STATE, 53));
        batch.emit(HUFFTABLE_IDS[index]);
        // The engine takes twelve DC code-length counts and the padded
        // AC value table.
        batch.emit_data(&table.num_dc_codes[..12]);
        batch.emit_data(&table.dc_values);
        batch.emit_data(&table.num_ac_codes);
        batch.emit_data(&table.ac_values);
        batch.emit_data(&table.pad);
        batch.advance();
    }
}

fn jpeg_qm_state(call: &mut DecodeCall, req: &JpegRequest) {
    let Some(iq) = &req.iq_matrix else {
        return;
    };
    let pic = &req.picture;

    for index in 0..pic.num_components as usize {
        let id = component_id(pic, pic.components[index].component_id);
        if !(1..=4).contains(&id) {
            continue;
        }
        let selector = pic.components[index].quantiser_table_selector as usize;
        if !iq.load_quantiser_table[selector] {
            continue;
        }

        let raster_qm = zigzag_to_raster(&iq.quantiser_table[selector]);
        qm_state(call, COMPONENT_QM_TYPE[(id - 1) as usize], &raster_qm);
    }
}

fn bsd_object(call: &mut DecodeCall, pic: &JpegPictureParams, slice: &JpegSliceParams) {
    let mut scan_component_mask = 0u32;
    for component in &slice.components[..slice.num_components as usize] {
        let id = component_id(pic, component.component_selector);
        scan_component_mask |= 1 << (id - 1);
    }

    let batch = &mut *call.batch;
    batch.begin(6);
    batch.emit(cmd_header(cmd::MFD_JPEG_BSD_OBJECT, 6));
    batch.emit(slice.slice_data_size);
    batch.emit(slice.slice_data_offset);
    batch.emit((slice.slice_horizontal_position << 16) | slice.slice_vertical_position);
    batch.emit(
        (((slice.num_components != 1) as u32) << 30) // interleaved scan
            | (scan_component_mask << 27)
            | (0 << 26) // interrupts disallowed
            | slice.num_mcus,
    );
    batch.emit(slice.restart_interval as u32);
    batch.advance();
}

pub(crate) fn decode_picture(
    call: &mut DecodeCall,
    target: SurfaceId,
    req: &JpegRequest,
) -> Result<()> {
    decode_init(call, target, req)?;

    call.batch.start_atomic();
    #[cfg(feature = "jpeg-wa")]
    wa::decode_dummy_avc(call)?;
    mi_flush(call);
    pipe_mode_select(call, StandardSelect::Jpeg);
    surface_state(call, target, StandardSelect::Jpeg);
    pipe_buf_addr_state(call);
    pic_state(call, &req.picture)?;
    jpeg_qm_state(call, req);

    // First pass binds each group's data and collects the highest Huffman
    // selector any scan uses.
    let mut max_selector = 0u8;
    for group in &req.slice_groups {
        ind_obj_base_addr_state(call, &group.data);
        for slice in &group.params {
            for component in &slice.components[..slice.num_components as usize] {
                max_selector = max_selector
                    .max(component.dc_table_selector)
                    .max(component.ac_table_selector);
            }
        }
    }

    huff_table_state(call, req, max_selector as usize + 1);

    for group in &req.slice_groups {
        ind_obj_base_addr_state(call, &group.data);
        for slice in &group.params {
            bsd_object(call, &req.picture, slice);
        }
    }

    call.batch.end_atomic();
    call.batch.flush();
    Ok(())
}

/// Pre-decode workaround: a canned 16x16 AVC clip primes the engine before
/// the real JPEG sequence on affected steppings. The path shares nothing
/// with the JPEG state except the batch itself.
#[cfg(feature = "jpeg-wa")]
pub(crate) mod wa {
    use vdec_protocol::cmd::{self, cmd_header};
    use vdec_protocol::{Domains, StandardSelect};

    use super::super::{mi_flush, DecodeCall};
    use crate::buffer::BufferRef;
    use crate::error::Result;
    use crate::surface::{Fourcc, Subsampling, Surface, SurfaceId};

    /// The canned clip: one intra 16x16 frame.
    const CLIP_DATA: [u8; 14] = [
        0x65, 0xb8, 0x40, 0x32, 0x13, 0xfd, 0x06, 0x6c, 0xfc, 0x0a, 0x50, 0x71, 0x5c, 0x00,
    ];
    const CLIP_WIDTH: u32 = 16;
    const CLIP_HEIGHT: u32 = 16;
    const CLIP_DATA_BIT_OFFSET: u32 = 40;
    const CLIP_QP: u32 = 28;

    /// Surface and clip buffer backing the workaround decode; owned by the
    /// context so the surface survives until the next call replaces it.
    #[derive(Debug, Default)]
    pub(crate) struct JpegWaState {
        pub surface: Option<Surface>,
        pub slice_data: Option<BufferRef>,
    }

    fn init(call: &mut DecodeCall) -> Result<()> {
        let mut surface = Surface::new(SurfaceId(u32::MAX), CLIP_WIDTH, CLIP_HEIGHT);
        surface.ensure_backing(call.allocator, Fourcc::Nv12, Subsampling::Yuv420)?;
        call.ctx.jpeg_wa.surface = Some(surface);

        if call.ctx.jpeg_wa.slice_data.is_none() {
            let bo = call.allocator.alloc("jpeg wa data", 0x1000, 0x1000)?;
            bo.write(0, &CLIP_DATA);
            call.ctx.jpeg_wa.slice_data = Some(bo);
        }
        Ok(())
    }

    fn pipe_mode_select(call: &mut DecodeCall) {
        let format_mode = call.ctx.format_mode as u32;
        let batch = &mut *call.batch;
        batch.begin(5);
        batch.emit(cmd_header(cmd::MFX_PIPE_MODE_SELECT, 5));
        batch.emit(
            (format_mode << 17)
                | (cmd::MFD_MODE_VLD << 15)
                | (0 << 9) // post-deblocking off
                | (1 << 8) // pre-deblocking on
                | (cmd::MFX_CODEC_DECODE << 4)
                | (StandardSelect::Avc as u32),
        );
        batch.emit(0);
        batch.emit(0);
        batch.emit(0);
        batch.advance();
    }

    fn surface_state(call: &mut DecodeCall) {
        let surface = call.ctx.jpeg_wa.surface.as_ref().expect("wa surface ready");
        let (width, height) = (surface.width(), surface.height());
        let (pitch, y_cb_offset) = (surface.pitch, surface.y_cb_offset);

        let batch = &mut *call.batch;
        batch.begin(6);
        batch.emit(cmd_header(cmd::MFX_SURFACE_STATE, 6));
        batch.emit(0);
        batch.emit(((width - 1) << 18) | ((height - 1) << 4));
        batch.emit(
            (cmd::MFX_SURFACE_PLANAR_420_8 << 28)
                | (1 << 27) // interleaved chroma
                | ((pitch - 1) << 3)
                | (1 << 1)
                | cmd::TILEWALK_YMAJOR,
        );
        batch.emit(y_cb_offset);
        batch.emit(0);
        batch.advance();
    }

    fn pipe_buf_addr_state(call: &mut DecodeCall) -> Result<()> {
        let mocs = call.ctx.mocs;
        let surface_bo = call
            .ctx
            .jpeg_wa
            .surface
            .as_ref()
            .and_then(|s| s.bo.clone())
            .expect("wa surface ready");
        let intra_bo = call
            .allocator
            .alloc("intra row store", 128 * 64, 0x1000)?;

        call.batch.begin(61);
        call.batch.emit(cmd_header(cmd::MFX_PIPE_BUF_ADDR_STATE, 61));
        call.reloc64(&surface_bo, Domains::INSTRUCTION, Domains::INSTRUCTION);
        call.batch.emit(mocs);

        // Post-deblocking plus the uncompressed/stream-out block, unused.
        for _ in 0..9 {
            call.batch.emit(0);
        }

        call.reloc64(&intra_bo, Domains::INSTRUCTION, Domains::INSTRUCTION);
        call.batch.emit(mocs);

        // Deblocking filter, references, attribute, status streams: unused.
        for _ in 0..45 {
            call.batch.emit(0);
        }
        call.batch.advance();
        Ok(())
    }

    fn bsp_buf_base_addr_state(call: &mut DecodeCall) -> Result<()> {
        let mocs = call.ctx.mocs;
        let bsd_mpc_bo = call
            .allocator
            .alloc("bsd mpc row store", 11520, 0x1000)?;
        let mpr_bo = call.allocator.alloc("mpr row store", 7680, 0x1000)?;

        call.batch.begin(10);
        call.batch
            .emit(cmd_header(cmd::MFX_BSP_BUF_BASE_ADDR_STATE, 10));
        call.reloc64(&bsd_mpc_bo, Domains::INSTRUCTION, Domains::INSTRUCTION);
        call.batch.emit(mocs);
        call.reloc64(&mpr_bo, Domains::INSTRUCTION, Domains::INSTRUCTION);
        call.batch.emit(mocs);
        call.batch.emit(0);
        call.batch.emit(0);
        call.batch.emit(0);
        call.batch.advance();
        Ok(())
    }

    fn avc_img_state(call: &mut DecodeCall) {
        let (width_in_mbs, height_in_mbs) = (1u32, 1u32);
        let batch = &mut *call.batch;
        batch.begin(16);
        batch.emit(cmd_header(cmd::MFX_AVC_IMG_STATE, 16));
        batch.emit(width_in_mbs * height_in_mbs);
        batch.emit(((height_in_mbs - 1) << 16) | (width_in_mbs - 1));
        batch.emit(0);
        batch.emit(
            (1 << 10) // 4:2:0
                | (1 << 7) // CABAC
                | (1 << 2), // frame-mbs-only
        );
        for _ in 0..11 {
            batch.emit(0);
        }
        batch.advance();
    }

    fn ind_obj_base_addr_state(call: &mut DecodeCall) {
        let mocs = call.ctx.mocs;
        let slice_data = call
            .ctx
            .jpeg_wa
            .slice_data
            .clone()
            .expect("wa clip uploaded");

        call.batch.begin(11);
        call.batch
            .emit(cmd_header(cmd::MFX_IND_OBJ_BASE_ADDR_STATE, 11));
        call.reloc64(&slice_data, Domains::INSTRUCTION, Domains::empty());
        call.batch.emit(mocs);
        for _ in 0..7 {
            call.batch.emit(0);
        }
        call.batch.advance();
    }

    fn avc_directmode_state(call: &mut DecodeCall) {
        let batch = &mut *call.batch;
        batch.begin(71);
        batch.emit(cmd_header(cmd::MFX_AVC_DIRECTMODE_STATE, 71));
        for _ in 0..70 {
            batch.emit(0);
        }
        batch.advance();
    }

    fn avc_slice_state(call: &mut DecodeCall) {
        let batch = &mut *call.batch;
        batch.begin(11);
        batch.emit(cmd_header(cmd::MFX_AVC_SLICE_STATE, 11));
        batch.emit(cmd::AVC_SLICE_TYPE_I);
        batch.emit(0);
        batch.emit(
            (1 << 27) // deblocking disabled
                | (CLIP_QP << 16),
        );
        batch.emit(0);
        batch.emit(1 << 16); // next slice row
        batch.emit(1 << 19); // last slice
        batch.emit(0);
        batch.emit(0);
        batch.emit(0);
        batch.emit(0);
        batch.advance();
    }

    fn avc_bsd_object(call: &mut DecodeCall) {
        let batch = &mut *call.batch;
        batch.begin(6);
        batch.emit(cmd_header(cmd::MFD_AVC_BSD_OBJECT, 6));
        batch.emit(CLIP_DATA.len() as u32);
        batch.emit(0);
        batch.emit(0);
        batch.emit(
            ((CLIP_DATA_BIT_OFFSET >> 3) << 16)
                | (1 << 3) // last slice
                | (CLIP_DATA_BIT_OFFSET & 0x7),
        );
        batch.emit(0);
        batch.advance();
    }

    /// Emits the full dummy AVC decode ahead of the real JPEG sequence.
    pub(crate) fn decode_dummy_avc(call: &mut DecodeCall) -> Result<()> {
        init(call)?;
        mi_flush(call);
        pipe_mode_select(call);
        surface_state(call);
        pipe_buf_addr_state(call)?;
        bsp_buf_base_addr_state(call)?;
        avc_img_state(call);
        ind_obj_base_addr_state(call);
        avc_directmode_state(call);
        avc_slice_state(call);
        avc_bsd_object(call);
        Ok(())
    }
}

#[cfg(feature = "jpeg-wa")]
pub(crate) use wa::JpegWaState;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::jpeg::JpegComponent;

    fn picture(h: [u8; 3], v: [u8; 3]) -> JpegPictureParams {
        let mut pic = JpegPictureParams {
            num_components: 3,
            ..Default::default()
        };
        for i in 0..3 {
            pic.components[i] = JpegComponent {
                component_id: 1 + i as u8,
                h_sampling_factor: h[i],
                v_sampling_factor: v[i],
                quantiser_table_selector: 0,
            };
        }
        pic
    }

    #[test]
    fn recognized_sampling_ratios_map_to_their_class() {
        let cases = [
            ([2, 1, 1], [2, 1, 1], Subsampling::Yuv420),
            ([2, 1, 1], [1, 1, 1], Subsampling::Yuv422H),
            ([1, 1, 1], [1, 1, 1], Subsampling::Yuv444),
            ([4, 1, 1], [1, 1, 1], Subsampling::Yuv411),
            ([1, 1, 1], [2, 1, 1], Subsampling::Yuv422V),
            // Ratio-equivalent variants with doubled chroma factors.
            ([4, 2, 2], [4, 2, 2], Subsampling::Yuv420),
            ([2, 2, 2], [2, 2, 2], Subsampling::Yuv444),
        ];
        for (h, v, want) in cases {
            assert_eq!(derive_chroma_class(&picture(h, v)).unwrap(), want);
        }
    }

    #[test]
    fn monochrome_pictures_class_as_400() {
        let pic = JpegPictureParams {
            num_components: 1,
            ..Default::default()
        };
        assert_eq!(derive_chroma_class(&pic).unwrap(), Subsampling::Yuv400);
    }

    #[test]
    fn unrecognized_ratios_are_rejected() {
        for (h, v) in [
            ([3u8, 1, 1], [1u8, 1, 1]),
            ([2, 1, 2], [1, 1, 1]),
            ([1, 2, 2], [1, 1, 1]),
            ([0, 0, 0], [0, 0, 0]),
        ] {
            assert!(derive_chroma_class(&picture(h, v)).is_err(), "{h:?}/{v:?}");
        }
    }

    #[test]
    fn chroma_code_distinguishes_luma_block_multiplicity() {
        assert_eq!(
            chroma_code(&picture([2, 1, 1], [1, 1, 1])).unwrap(),
            cmd::JPEG_CHROMA_422H_2Y
        );
        assert_eq!(
            chroma_code(&picture([2, 1, 1], [2, 2, 2])).unwrap(),
            cmd::JPEG_CHROMA_422H_4Y
        );
        assert_eq!(
            chroma_code(&picture([2, 2, 2], [2, 1, 1])).unwrap(),
            cmd::JPEG_CHROMA_422V_4Y
        );
        // 4:2:2H with doubled factors passes the ratio classifier but has no
        // hardware layout code.
        assert!(chroma_code(&picture([4, 2, 2], [1, 1, 1])).is_err());
    }
}
