//! VP8 picture, quantization and partition parameters.

use crate::surface::SurfaceId;

/// Snapshot of the boolean decoder after the frame tag and (for key frames)
/// the size fields have been consumed.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoolCoderContext {
    pub range: u8,
    pub value: u8,
    /// Bits of `value` already consumed, 0..=7.
    pub count: u8,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Vp8PicFields {
    /// Frame-tag key-frame bit: 0 indicates an intra frame in the VP8 stream.
    pub key_frame: bool,
    pub version: u32,
    pub segmentation_enabled: bool,
    pub update_mb_segmentation_map: bool,
    pub filter_type: u32,
    pub sharpness_level: u32,
    pub sign_bias_golden: bool,
    pub sign_bias_alternate: bool,
    pub mb_no_coeff_skip: bool,
    pub loop_filter_adj_enable: bool,
    pub loop_filter_disable: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Vp8PictureParams {
    pub frame_width: u16,
    pub frame_height: u16,
    pub last_ref_frame: Option<SurfaceId>,
    pub golden_ref_frame: Option<SurfaceId>,
    pub alt_ref_frame: Option<SurfaceId>,
    pub pic_fields: Vp8PicFields,
    pub mb_segment_tree_probs: [u8; 3],
    pub loop_filter_level: [u8; 4],
    pub loop_filter_deltas_ref_frame: [i8; 4],
    pub loop_filter_deltas_mode: [i8; 4],
    pub prob_skip_false: u8,
    pub prob_intra: u8,
    pub prob_last: u8,
    pub prob_gf: u8,
    pub y_mode_probs: [u8; 4],
    pub uv_mode_probs: [u8; 3],
    pub mv_probs: [[u8; 19]; 2],
    pub bool_coder_ctx: BoolCoderContext,
}

/// Per-segment quantization indices: yac, ydc, y2dc, y2ac, uvdc, uvac.
#[derive(Clone, Copy, Debug, Default)]
pub struct Vp8IqMatrix {
    pub quantization_index: [[i32; 6]; 4],
}

#[derive(Clone, Copy, Debug)]
pub struct Vp8SliceParams {
    pub slice_data_size: u32,
    pub slice_data_offset: u32,
    /// Bit offset of the macroblock data past the frame header, within the
    /// first partition.
    pub macroblock_offset: u32,
    /// Control partition plus token partitions: 2..=9.
    pub num_of_partitions: u32,
    pub partition_size: [u32; 9],
}

impl Default for Vp8SliceParams {
    fn default() -> Self {
        Self {
            slice_data_size: 0,
            slice_data_offset: 0,
            macroblock_offset: 0,
            num_of_partitions: 2,
            partition_size: [0; 9],
        }
    }
}
