//! Command opcodes and fixed field encodings for the MFD command streamer.
//!
//! Every command is a sequence of little-endian dwords. Dword 0 carries the
//! command encoding in bits 16..31 and `dword_length - 2` in bits 0..15.
//! Payload bit positions are documented at the emission sites in `vdec-core`;
//! the values here are the stable ABI shared with the execution path.

/// Builds the opcode part (bits 16..31) of a command's first dword.
pub const fn mfx(pipeline: u32, op: u32, sub_a: u32, sub_b: u32) -> u32 {
    (0x3 << 29) | (pipeline << 27) | (op << 24) | (sub_a << 21) | (sub_b << 16)
}

/// Combines an opcode with its dword length into a complete header dword.
pub const fn cmd_header(opcode: u32, dwords: u32) -> u32 {
    opcode | (dwords - 2)
}

/// Opcode (bits 16..31) of a command header dword.
pub const fn opcode_of(header: u32) -> u32 {
    header & !0xffff
}

/// Total dword length encoded in a command header dword. MI commands carry
/// their length in bits 0..5, with flag bits above; MFX commands use the
/// full low half-word.
pub const fn dword_length_of(header: u32) -> u32 {
    if header >> 29 == 0 {
        (header & 0x3f) + 2
    } else {
        (header & 0xffff) + 2
    }
}

/* ------------------------------ MI commands ------------------------------ */

/// The only non-MFX command the decode path emits; 4 dwords.
pub const MI_FLUSH_DW: u32 = 0x26 << 23;
pub const VIDEO_PIPELINE_CACHE_INVALIDATE: u32 = 1 << 7;

/* --------------------------- Common pipe state --------------------------- */

pub const MFX_PIPE_MODE_SELECT: u32 = mfx(2, 0, 0, 0);
pub const MFX_SURFACE_STATE: u32 = mfx(2, 0, 0, 1);
pub const MFX_PIPE_BUF_ADDR_STATE: u32 = mfx(2, 0, 0, 2);
pub const MFX_IND_OBJ_BASE_ADDR_STATE: u32 = mfx(2, 0, 0, 3);
pub const MFX_BSP_BUF_BASE_ADDR_STATE: u32 = mfx(2, 0, 0, 4);
pub const MFX_QM_STATE: u32 = mfx(2, 0, 0, 7);

/* --------------------------------- AVC ----------------------------------- */

pub const MFX_AVC_IMG_STATE: u32 = mfx(2, 1, 0, 0);
pub const MFX_AVC_DIRECTMODE_STATE: u32 = mfx(2, 1, 0, 2);
pub const MFX_AVC_SLICE_STATE: u32 = mfx(2, 1, 0, 3);
pub const MFX_AVC_REF_IDX_STATE: u32 = mfx(2, 1, 0, 4);
pub const MFX_AVC_WEIGHTOFFSET_STATE: u32 = mfx(2, 1, 0, 5);
pub const MFX_AVC_PICID_STATE: u32 = mfx(2, 1, 1, 5);
pub const MFD_AVC_BSD_OBJECT: u32 = mfx(2, 1, 1, 8);

/* --------------------------------- VC-1 ---------------------------------- */

pub const MFX_VC1_PRED_PIPE_STATE: u32 = mfx(2, 2, 0, 1);
pub const MFX_VC1_DIRECTMODE_STATE: u32 = mfx(2, 2, 0, 2);
pub const MFD_VC1_LONG_PIC_STATE: u32 = mfx(2, 2, 1, 1);
pub const MFD_VC1_BSD_OBJECT: u32 = mfx(2, 2, 1, 8);

/* -------------------------------- MPEG-2 --------------------------------- */

pub const MFX_MPEG2_PIC_STATE: u32 = mfx(2, 3, 0, 0);
pub const MFD_MPEG2_BSD_OBJECT: u32 = mfx(2, 3, 1, 8);

/* --------------------------------- VP8 ----------------------------------- */

pub const MFX_VP8_PIC_STATE: u32 = mfx(2, 4, 0, 0);
pub const MFD_VP8_BSD_OBJECT: u32 = mfx(2, 4, 1, 8);

/* --------------------------------- JPEG ---------------------------------- */

pub const MFX_JPEG_PIC_STATE: u32 = mfx(2, 7, 0, 0);
pub const MFX_JPEG_HUFF_TABLE_STATE: u32 = mfx(2, 7, 0, 2);
pub const MFD_JPEG_BSD_OBJECT: u32 = mfx(2, 7, 1, 8);

/* ------------------------------ Field codes ------------------------------ */

/// Codec tag programmed into bits 0..3 of MFX_PIPE_MODE_SELECT dword 1.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StandardSelect {
    Mpeg2 = 0,
    Vc1 = 1,
    Avc = 2,
    Jpeg = 3,
    Vp8 = 5,
}

/// Slice-data mode programmed into bit 17 of MFX_PIPE_MODE_SELECT dword 1.
///
/// In short format the hardware parses slice headers itself; in long format
/// the driver supplies fully parsed slice state.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DecoderFormatMode {
    Short = 0,
    #[default]
    Long = 1,
}

/// Entropy-decode mode (bit 15 of MFX_PIPE_MODE_SELECT dword 1).
pub const MFD_MODE_VLD: u32 = 0;
/// Codec-operation select (bit 4 of MFX_PIPE_MODE_SELECT dword 1).
pub const MFX_CODEC_DECODE: u32 = 0;

/// Surface formats for MFX_SURFACE_STATE dword 3 bits 28..31.
pub const MFX_SURFACE_PLANAR_420_8: u32 = 4;
pub const MFX_SURFACE_MONOCHROME: u32 = 12;

/// Tile walk (bit 0 of MFX_SURFACE_STATE dword 3); Y-major is mandatory.
pub const TILEWALK_YMAJOR: u32 = 1;

/* MFX_QM_STATE table selectors (dword 1). The id space is per codec. */

pub const MFX_QM_MPEG_INTRA_QUANTIZER_MATRIX: u32 = 0;
pub const MFX_QM_MPEG_NON_INTRA_QUANTIZER_MATRIX: u32 = 1;

pub const MFX_QM_AVC_4X4_INTRA_MATRIX: u32 = 0;
pub const MFX_QM_AVC_4X4_INTER_MATRIX: u32 = 1;
pub const MFX_QM_AVC_8X8_INTRA_MATRIX: u32 = 2;
pub const MFX_QM_AVC_8X8_INTER_MATRIX: u32 = 3;

pub const MFX_QM_JPEG_LUMA_Y_QUANTIZER_MATRIX: u32 = 0;
pub const MFX_QM_JPEG_CHROMA_CB_QUANTIZER_MATRIX: u32 = 1;
pub const MFX_QM_JPEG_CHROMA_CR_QUANTIZER_MATRIX: u32 = 2;
pub const MFX_QM_JPEG_ALPHA_QUANTIZER_MATRIX: u32 = 3;

/* MFX_JPEG_HUFF_TABLE_STATE table ids (dword 1). */

pub const MFX_HUFFTABLE_ID_Y: u32 = 0;
pub const MFX_HUFFTABLE_ID_UV: u32 = 1;

/* Chroma layout codes for MFX_JPEG_PIC_STATE dword 1 bits 0..3. */

pub const JPEG_CHROMA_400: u32 = 0;
pub const JPEG_CHROMA_420: u32 = 1;
pub const JPEG_CHROMA_411: u32 = 2;
pub const JPEG_CHROMA_422H_2Y: u32 = 3;
pub const JPEG_CHROMA_422V_2Y: u32 = 4;
pub const JPEG_CHROMA_422H_4Y: u32 = 5;
pub const JPEG_CHROMA_422V_4Y: u32 = 6;
pub const JPEG_CHROMA_444: u32 = 7;

pub const JPEG_ROTATION_0: u32 = 0;

/* Picture-type codes in MFD_VC1_LONG_PIC_STATE dword 3 bits 26..28. */

pub const VC1_I_PICTURE: u32 = 0;
pub const VC1_P_PICTURE: u32 = 1;
pub const VC1_B_PICTURE: u32 = 2;
pub const VC1_BI_PICTURE: u32 = 3;
pub const VC1_SKIPPED_PICTURE: u32 = 4;

/* Slice-type codes in MFX_AVC_SLICE_STATE dword 1. */

pub const AVC_SLICE_TYPE_P: u32 = 0;
pub const AVC_SLICE_TYPE_B: u32 = 1;
pub const AVC_SLICE_TYPE_I: u32 = 2;
