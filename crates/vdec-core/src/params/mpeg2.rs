//! MPEG-2 picture, quantization-matrix and slice parameters.

use crate::surface::SurfaceId;

pub const MPEG_I_PICTURE: u32 = 1;
pub const MPEG_P_PICTURE: u32 = 2;
pub const MPEG_B_PICTURE: u32 = 3;

/// `picture_structure` codes.
pub const MPEG_TOP_FIELD: u32 = 1;
pub const MPEG_BOTTOM_FIELD: u32 = 2;
pub const MPEG_FRAME: u32 = 3;

#[derive(Clone, Debug, Default)]
pub struct Mpeg2PictureParams {
    pub horizontal_size: u16,
    pub vertical_size: u16,
    pub forward_reference_picture: Option<SurfaceId>,
    pub backward_reference_picture: Option<SurfaceId>,
    pub picture_coding_type: u32,
    /// Packed `f_code[0][0]..f_code[1][1]`, four bits each, `[0][0]` in the
    /// most significant nibble.
    pub f_code: u16,
    pub picture_coding_extension: Mpeg2PictureCodingExtension,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Mpeg2PictureCodingExtension {
    pub intra_dc_precision: u32,
    pub picture_structure: u32,
    pub top_field_first: bool,
    pub frame_pred_frame_dct: bool,
    pub concealment_motion_vectors: bool,
    pub q_scale_type: bool,
    pub intra_vlc_format: bool,
    pub alternate_scan: bool,
    pub repeat_first_field: bool,
    pub progressive_frame: bool,
    pub is_first_field: bool,
}

/// Quantization matrices in bitstream zig-zag order, with per-matrix load
/// flags.
#[derive(Clone, Debug)]
pub struct Mpeg2IqMatrix {
    pub load_intra_quantiser_matrix: bool,
    pub intra_quantiser_matrix: [u8; 64],
    pub load_non_intra_quantiser_matrix: bool,
    pub non_intra_quantiser_matrix: [u8; 64],
    pub load_chroma_intra_quantiser_matrix: bool,
    pub chroma_intra_quantiser_matrix: [u8; 64],
    pub load_chroma_non_intra_quantiser_matrix: bool,
    pub chroma_non_intra_quantiser_matrix: [u8; 64],
}

impl Default for Mpeg2IqMatrix {
    fn default() -> Self {
        Self {
            load_intra_quantiser_matrix: false,
            intra_quantiser_matrix: [0; 64],
            load_non_intra_quantiser_matrix: false,
            non_intra_quantiser_matrix: [0; 64],
            load_chroma_intra_quantiser_matrix: false,
            chroma_intra_quantiser_matrix: [0; 64],
            load_chroma_non_intra_quantiser_matrix: false,
            chroma_non_intra_quantiser_matrix: [0; 64],
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Mpeg2SliceParams {
    pub slice_data_size: u32,
    pub slice_data_offset: u32,
    /// Bit offset of the first macroblock past the slice header.
    pub macroblock_offset: u32,
    pub slice_horizontal_position: u32,
    pub slice_vertical_position: u32,
    pub quantiser_scale_code: u32,
    pub intra_slice_flag: bool,
}
