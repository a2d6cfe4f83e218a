//! The decode request: profile plus one codec's parameter bundle.

use vdec_protocol::StandardSelect;

use crate::buffer::BufferRef;
use crate::params::avc::{AvcIqMatrix, AvcPictureParams, AvcSliceParams};
use crate::params::jpeg::{
    JpegHuffmanTableParams, JpegIqMatrix, JpegPictureParams, JpegSliceParams,
};
use crate::params::mpeg2::{Mpeg2IqMatrix, Mpeg2PictureParams, Mpeg2SliceParams};
use crate::params::vc1::{Vc1PictureParams, Vc1SliceParams};
use crate::params::vp8::{Vp8IqMatrix, Vp8PictureParams, Vp8SliceParams};
use crate::surface::SurfaceId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Profile {
    Mpeg2Simple,
    Mpeg2Main,
    H264ConstrainedBaseline,
    H264Main,
    H264High,
    H264StereoHigh,
    H264MultiviewHigh,
    Vc1Simple,
    Vc1Main,
    Vc1Advanced,
    JpegBaseline,
    Vp8Version0_3,
    /// Handled by newer engines only; always rejected here.
    HevcMain,
    Vp9Profile0,
}

impl Profile {
    /// The codec tag this profile maps to, or `None` when the engine has no
    /// pipeline for it.
    pub fn standard(self) -> Option<StandardSelect> {
        match self {
            Profile::Mpeg2Simple | Profile::Mpeg2Main => Some(StandardSelect::Mpeg2),
            Profile::H264ConstrainedBaseline
            | Profile::H264Main
            | Profile::H264High
            | Profile::H264StereoHigh
            | Profile::H264MultiviewHigh => Some(StandardSelect::Avc),
            Profile::Vc1Simple | Profile::Vc1Main | Profile::Vc1Advanced => {
                Some(StandardSelect::Vc1)
            }
            Profile::JpegBaseline => Some(StandardSelect::Jpeg),
            Profile::Vp8Version0_3 => Some(StandardSelect::Vp8),
            Profile::HevcMain | Profile::Vp9Profile0 => None,
        }
    }
}

/// An ordered group of slices sharing one raw data buffer. Slice elements are
/// contiguous in the underlying buffer, in coded order.
#[derive(Clone, Debug)]
pub struct SliceGroup<P> {
    pub params: Vec<P>,
    pub data: BufferRef,
}

#[derive(Clone, Debug)]
pub struct Mpeg2Request {
    pub picture: Mpeg2PictureParams,
    pub iq_matrix: Option<Mpeg2IqMatrix>,
    pub slice_groups: Vec<SliceGroup<Mpeg2SliceParams>>,
}

#[derive(Clone, Debug)]
pub struct AvcRequest {
    pub picture: AvcPictureParams,
    pub iq_matrix: Option<AvcIqMatrix>,
    pub slice_groups: Vec<SliceGroup<AvcSliceParams>>,
}

#[derive(Clone, Debug)]
pub struct Vc1Request {
    pub picture: Vc1PictureParams,
    /// Raw 2-bit-per-macroblock bit-plane data, nibble-packed per the
    /// parameter-buffer convention.
    pub bit_plane: Option<Vec<u8>>,
    pub slice_groups: Vec<SliceGroup<Vc1SliceParams>>,
}

#[derive(Clone, Debug)]
pub struct JpegRequest {
    pub picture: JpegPictureParams,
    pub iq_matrix: Option<JpegIqMatrix>,
    pub huffman_table: Option<JpegHuffmanTableParams>,
    pub slice_groups: Vec<SliceGroup<JpegSliceParams>>,
}

#[derive(Clone, Debug)]
pub struct Vp8Request {
    pub picture: Vp8PictureParams,
    pub iq_matrix: Vp8IqMatrix,
    /// Coefficient-probability data laid out as the engine consumes it.
    pub probability_data: Option<BufferRef>,
    pub slice_groups: Vec<SliceGroup<Vp8SliceParams>>,
}

#[derive(Clone, Debug)]
pub enum CodecRequest {
    Mpeg2(Mpeg2Request),
    Avc(AvcRequest),
    Vc1(Vc1Request),
    Jpeg(JpegRequest),
    Vp8(Vp8Request),
}

impl CodecRequest {
    pub(crate) fn standard(&self) -> StandardSelect {
        match self {
            CodecRequest::Mpeg2(_) => StandardSelect::Mpeg2,
            CodecRequest::Avc(_) => StandardSelect::Avc,
            CodecRequest::Vc1(_) => StandardSelect::Vc1,
            CodecRequest::Jpeg(_) => StandardSelect::Jpeg,
            CodecRequest::Vp8(_) => StandardSelect::Vp8,
        }
    }
}

/// One decode operation: destination surface plus the codec parameter bundle
/// produced by the bitstream parser.
#[derive(Clone, Debug)]
pub struct DecodeRequest {
    pub target: SurfaceId,
    pub codec: CodecRequest,
}
