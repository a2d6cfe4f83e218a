//! H.264/AVC picture, scaling-list and slice parameters.

use bitflags::bitflags;

use crate::surface::SurfaceId;

pub const SLICE_TYPE_P: u32 = 0;
pub const SLICE_TYPE_B: u32 = 1;
pub const SLICE_TYPE_I: u32 = 2;
pub const SLICE_TYPE_SP: u32 = 3;
pub const SLICE_TYPE_SI: u32 = 4;

bitflags! {
    /// Flags attached to a reference/current picture entry.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PictureH264Flags: u32 {
        const INVALID = 0x1;
        const TOP_FIELD = 0x2;
        const BOTTOM_FIELD = 0x4;
        const SHORT_TERM_REFERENCE = 0x8;
        const LONG_TERM_REFERENCE = 0x10;
    }
}

/// One picture entry as it appears in the reference-frame list and reference
/// picture lists.
#[derive(Clone, Copy, Debug)]
pub struct PictureH264 {
    pub picture_id: Option<SurfaceId>,
    pub frame_idx: u32,
    pub flags: PictureH264Flags,
    pub top_field_order_cnt: i32,
    pub bottom_field_order_cnt: i32,
}

impl PictureH264 {
    pub const fn invalid() -> Self {
        Self {
            picture_id: None,
            frame_idx: 0,
            flags: PictureH264Flags::INVALID,
            top_field_order_cnt: 0,
            bottom_field_order_cnt: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.flags.contains(PictureH264Flags::INVALID) && self.picture_id.is_some()
    }
}

impl Default for PictureH264 {
    fn default() -> Self {
        Self::invalid()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AvcSeqFields {
    pub chroma_format_idc: u32,
    pub residual_colour_transform_flag: bool,
    pub frame_mbs_only_flag: bool,
    pub mb_adaptive_frame_field_flag: bool,
    pub direct_8x8_inference_flag: bool,
    pub log2_max_frame_num_minus4: u32,
    pub pic_order_cnt_type: u32,
    pub log2_max_pic_order_cnt_lsb_minus4: u32,
    pub delta_pic_order_always_zero_flag: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AvcPicFields {
    pub entropy_coding_mode_flag: bool,
    pub weighted_pred_flag: bool,
    pub weighted_bipred_idc: u32,
    pub transform_8x8_mode_flag: bool,
    pub field_pic_flag: bool,
    pub constrained_intra_pred_flag: bool,
    pub pic_order_present_flag: bool,
    pub deblocking_filter_control_present_flag: bool,
    pub redundant_pic_cnt_present_flag: bool,
    pub reference_pic_flag: bool,
}

#[derive(Clone, Debug)]
pub struct AvcPictureParams {
    pub curr_pic: PictureH264,
    pub reference_frames: [PictureH264; 16],
    pub picture_width_in_mbs_minus1: u16,
    pub picture_height_in_mbs_minus1: u16,
    pub num_ref_frames: u8,
    pub seq_fields: AvcSeqFields,
    pub pic_fields: AvcPicFields,
    pub pic_init_qp_minus26: i8,
    pub chroma_qp_index_offset: i8,
    pub second_chroma_qp_index_offset: i8,
    pub frame_num: u16,
}

impl Default for AvcPictureParams {
    fn default() -> Self {
        Self {
            curr_pic: PictureH264::invalid(),
            reference_frames: [PictureH264::invalid(); 16],
            picture_width_in_mbs_minus1: 0,
            picture_height_in_mbs_minus1: 0,
            num_ref_frames: 0,
            seq_fields: AvcSeqFields::default(),
            pic_fields: AvcPicFields::default(),
            pic_init_qp_minus26: 0,
            chroma_qp_index_offset: 0,
            second_chroma_qp_index_offset: 0,
            frame_num: 0,
        }
    }
}

/// Scaling lists in raster order: six 4x4 lists (three intra, three inter)
/// and the two 8x8 lists.
#[derive(Clone, Debug)]
pub struct AvcIqMatrix {
    pub scaling_list_4x4: [[u8; 16]; 6],
    pub scaling_list_8x8: [[u8; 64]; 2],
}

impl AvcIqMatrix {
    /// Flat lists (all 16), the default when the stream carries none.
    pub fn flat() -> Self {
        Self {
            scaling_list_4x4: [[16; 16]; 6],
            scaling_list_8x8: [[16; 64]; 2],
        }
    }
}

impl Default for AvcIqMatrix {
    fn default() -> Self {
        Self::flat()
    }
}

#[derive(Clone, Debug)]
pub struct AvcSliceParams {
    pub slice_data_size: u32,
    pub slice_data_offset: u32,
    /// Bit offset of the first macroblock within the slice data.
    pub slice_data_bit_offset: u32,
    pub first_mb_in_slice: u32,
    pub slice_type: u32,
    pub direct_spatial_mv_pred_flag: bool,
    pub num_ref_idx_l0_active_minus1: u8,
    pub num_ref_idx_l1_active_minus1: u8,
    pub cabac_init_idc: u32,
    pub slice_qp_delta: i8,
    pub disable_deblocking_filter_idc: u32,
    pub slice_alpha_c0_offset_div2: i8,
    pub slice_beta_offset_div2: i8,
    pub ref_pic_list0: [PictureH264; 32],
    pub ref_pic_list1: [PictureH264; 32],
    pub luma_log2_weight_denom: u8,
    pub chroma_log2_weight_denom: u8,
    pub luma_weight_l0: [i16; 32],
    pub luma_offset_l0: [i16; 32],
    pub chroma_weight_l0: [[i16; 2]; 32],
    pub chroma_offset_l0: [[i16; 2]; 32],
    pub luma_weight_l1: [i16; 32],
    pub luma_offset_l1: [i16; 32],
    pub chroma_weight_l1: [[i16; 2]; 32],
    pub chroma_offset_l1: [[i16; 2]; 32],
}

impl Default for AvcSliceParams {
    fn default() -> Self {
        Self {
            slice_data_size: 0,
            slice_data_offset: 0,
            slice_data_bit_offset: 0,
            first_mb_in_slice: 0,
            slice_type: SLICE_TYPE_I,
            direct_spatial_mv_pred_flag: false,
            num_ref_idx_l0_active_minus1: 0,
            num_ref_idx_l1_active_minus1: 0,
            cabac_init_idc: 0,
            slice_qp_delta: 0,
            disable_deblocking_filter_idc: 0,
            slice_alpha_c0_offset_div2: 0,
            slice_beta_offset_div2: 0,
            ref_pic_list0: [PictureH264::invalid(); 32],
            ref_pic_list1: [PictureH264::invalid(); 32],
            luma_log2_weight_denom: 0,
            chroma_log2_weight_denom: 0,
            luma_weight_l0: [0; 32],
            luma_offset_l0: [0; 32],
            chroma_weight_l0: [[0; 2]; 32],
            chroma_offset_l0: [[0; 2]; 32],
            luma_weight_l1: [0; 32],
            luma_offset_l1: [0; 32],
            chroma_weight_l1: [[0; 2]; 32],
            chroma_offset_l1: [[0; 2]; 32],
        }
    }
}
