//! VC-1 picture and slice parameters.

use crate::surface::SurfaceId;

/// `picture_type` codes carried in the picture parameters (field-interlace
/// pictures carry the combined first/second-field code, see the builder).
pub const VC1_PTYPE_I: u32 = 0;
pub const VC1_PTYPE_P: u32 = 1;
pub const VC1_PTYPE_B: u32 = 2;
pub const VC1_PTYPE_BI: u32 = 3;
pub const VC1_PTYPE_SKIPPED: u32 = 4;

/// Sequence-layer profile codes.
pub const VC1_PROFILE_SIMPLE: u32 = 0;
pub const VC1_PROFILE_MAIN: u32 = 1;
pub const VC1_PROFILE_ADVANCED: u32 = 3;

/// Motion-vector coding modes, in the order the unified-mode mapping table
/// expects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Vc1MvMode {
    #[default]
    OneMv = 0,
    OneMvHalfPel = 1,
    OneMvHalfPelBilinear = 2,
    MixedMv = 3,
    IntensityCompensation = 4,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Vc1SequenceFields {
    pub profile: u32,
    pub interlace: bool,
    pub rangered: bool,
    pub syncmarker: bool,
    pub overlap: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Vc1EntrypointFields {
    pub loopfilter: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Vc1PictureFields {
    pub picture_type: u32,
    /// 0 progressive, 1 frame-interlace, 2 field-interlace.
    pub frame_coding_mode: u32,
    pub top_field_first: bool,
    pub is_first_field: bool,
    pub intensity_compensation: bool,
}

/// Which bitplanes are coded raw (in-band) rather than carried in the
/// bit-plane buffer.
#[derive(Clone, Copy, Debug, Default)]
pub struct Vc1RawCodingFlags {
    pub mv_type_mb: bool,
    pub direct_mb: bool,
    pub skip_mb: bool,
    pub field_tx: bool,
    pub forward_mb: bool,
    pub ac_pred: bool,
    pub overflags: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Vc1ReferenceFields {
    pub reference_distance: u32,
    pub num_reference_pictures: u32,
    pub reference_field_pic_indicator: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Vc1MvFields {
    pub mv_mode: Vc1MvMode,
    /// Secondary mode when `mv_mode` selects intensity compensation.
    pub mv_mode2: Vc1MvMode,
    pub mv_table: u32,
    pub two_mv_block_pattern_table: u32,
    pub four_mv_switch: bool,
    pub four_mv_block_pattern_table: u32,
    pub extended_mv_range: u32,
    pub extended_dmv_range: u32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Vc1PicQuantizerFields {
    pub pic_quantizer_scale: u32,
    pub quantizer: u32,
    pub half_qp: bool,
    pub pic_quantizer_type: u32,
    pub dquant: u32,
    pub dq_frame: u32,
    pub dq_profile: u32,
    pub dq_sb_edge: u32,
    pub dq_db_edge: u32,
    pub dq_binary_level: u32,
    pub alt_pic_quantizer: u32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Vc1TransformFields {
    pub variable_sized_transform_flag: bool,
    pub mb_level_transform_type_flag: bool,
    pub frame_level_transform_type: u32,
    pub transform_ac_codingset_idx1: u32,
    pub transform_ac_codingset_idx2: u32,
    pub intra_transform_dc_table: u32,
}

#[derive(Clone, Debug, Default)]
pub struct Vc1PictureParams {
    pub forward_reference_picture: Option<SurfaceId>,
    pub backward_reference_picture: Option<SurfaceId>,
    pub coded_width: u16,
    pub coded_height: u16,
    pub sequence_fields: Vc1SequenceFields,
    pub entrypoint_fields: Vc1EntrypointFields,
    pub picture_fields: Vc1PictureFields,
    pub raw_coding: Vc1RawCodingFlags,
    /// Low seven bits flag which bitplanes are present in the bit-plane
    /// buffer.
    pub bitplane_present: u32,
    pub reference_fields: Vc1ReferenceFields,
    pub mv_fields: Vc1MvFields,
    pub pic_quantizer_fields: Vc1PicQuantizerFields,
    pub transform_fields: Vc1TransformFields,
    pub luma_scale: u32,
    pub luma_shift: u32,
    pub luma_scale2: u32,
    pub luma_shift2: u32,
    /// 0 both fields, 1 top, 2 bottom.
    pub intensity_compensation_field: u32,
    pub range_reduction_frame: bool,
    pub rounding_control: u32,
    pub fast_uvmc_flag: bool,
    pub b_picture_fraction: u32,
    pub cbp_table: u32,
    pub mb_mode_table: u32,
    pub conditional_overlap_flag: u32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Vc1SliceParams {
    pub slice_data_size: u32,
    pub slice_data_offset: u32,
    /// Bit offset of the first macroblock past the slice header.
    pub macroblock_offset: u32,
    pub slice_vertical_position: u32,
}
