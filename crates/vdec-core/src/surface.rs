//! Decode surfaces and their codec-specific side state.
//!
//! Surfaces live in a [`SurfaceSet`] keyed by identity so builders can reach
//! any surface the request names. VC-1 relies on this to update a *reference*
//! surface's intensity-compensation history for a later frame to consume.

use std::collections::HashMap;

use crate::buffer::{AllocError, Allocator, BufferRef};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

/// Pixel layout of a surface's backing store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fourcc {
    Nv12,
    Imc3,
    Y800,
    Yuv411,
    Yuv422H,
    Yuv422V,
    Yuv444,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subsampling {
    Yuv400,
    Yuv420,
    Yuv411,
    Yuv422H,
    Yuv422V,
    Yuv444,
}

/// Per-surface decode state that outlives a single decode call. Created
/// lazily on first touch and torn down with the surface; the contained buffer
/// references are owned exclusively by this record.
#[derive(Debug)]
pub(crate) enum AuxState {
    Avc(AvcAux),
    Vc1(Vc1Aux),
}

/// Direct-mode motion-vector buffer for AVC. Relates to the whole frame,
/// irrespective of field coding modes.
#[derive(Debug)]
pub(crate) struct AvcAux {
    pub dmv: BufferRef,
}

/// VC-1 side state: direct-mode MV buffers plus the per-field history that
/// later frames read back (picture types, intensity compensation, range
/// reduction, reference distance).
#[derive(Debug)]
pub(crate) struct Vc1Aux {
    pub dmv_top: BufferRef,
    pub dmv_bottom: Option<BufferRef>,
    pub picture_type_top: u32,
    pub picture_type_bottom: u32,
    pub intensity_compensation_top: u8,
    pub intensity_compensation_bottom: u8,
    pub luma_scale_top: [u32; 2],
    pub luma_scale_bottom: [u32; 2],
    pub luma_shift_top: [u32; 2],
    pub luma_shift_bottom: [u32; 2],
    pub range_reduction_frame: u32,
    pub reference_distance: u32,
    pub frame_coding_mode: u32,
}

#[derive(Debug)]
pub struct Surface {
    id: SurfaceId,
    width: u32,
    height: u32,
    pub(crate) format: Option<(Fourcc, Subsampling)>,
    pub(crate) bo: Option<BufferRef>,
    pub(crate) pitch: u32,
    pub(crate) y_cb_offset: u32,
    pub(crate) y_cr_offset: u32,
    pub(crate) referenced: bool,
    pub(crate) aux: Option<AuxState>,
}

impl Surface {
    pub fn new(id: SurfaceId, width: u32, height: u32) -> Self {
        Self {
            id,
            width,
            height,
            format: None,
            bo: None,
            pitch: 0,
            y_cb_offset: 0,
            y_cr_offset: 0,
            referenced: false,
            aux: None,
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fourcc(&self) -> Option<Fourcc> {
        self.format.map(|(f, _)| f)
    }

    /// Resolves the surface's backing store for the requested layout,
    /// allocating (or re-allocating on a format change) as needed.
    ///
    /// The plane layout is deterministic: pitch is the width rounded up to
    /// 128 bytes, plane heights round up to 32 rows, and chroma planes follow
    /// the luma plane in Cb/Cr order sharing the luma pitch.
    pub(crate) fn ensure_backing(
        &mut self,
        allocator: &dyn Allocator,
        fourcc: Fourcc,
        subsampling: Subsampling,
    ) -> Result<(), AllocError> {
        if self.bo.is_some() && self.format == Some((fourcc, subsampling)) {
            return Ok(());
        }

        let pitch = align(self.width, 128);
        let luma_rows = align(self.height, 32);
        let chroma_rows = match fourcc {
            Fourcc::Y800 => 0,
            Fourcc::Nv12 | Fourcc::Imc3 | Fourcc::Yuv422V => luma_rows / 2,
            Fourcc::Yuv411 | Fourcc::Yuv422H | Fourcc::Yuv444 => luma_rows,
        };
        let (y_cb_offset, y_cr_offset, total_rows) = match fourcc {
            Fourcc::Y800 => (luma_rows, luma_rows, luma_rows),
            // NV12 interleaves Cb/Cr in one plane.
            Fourcc::Nv12 => (luma_rows, 0, luma_rows + chroma_rows),
            _ => (
                luma_rows,
                luma_rows + chroma_rows,
                luma_rows + 2 * chroma_rows,
            ),
        };

        let size = (pitch * total_rows) as usize;
        self.bo = None;
        self.bo = Some(allocator.alloc("decode surface", size, 0x1000)?);
        self.format = Some((fourcc, subsampling));
        self.pitch = pitch;
        self.y_cb_offset = y_cb_offset;
        self.y_cr_offset = y_cr_offset;
        Ok(())
    }
}

const fn align(v: u32, a: u32) -> u32 {
    (v + (a - 1)) & !(a - 1)
}

/// All surfaces a decode session can address, keyed by identity.
#[derive(Debug, Default)]
pub struct SurfaceSet {
    surfaces: HashMap<SurfaceId, Surface>,
}

impl SurfaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh surface, replacing any previous one with the same
    /// id. Replacing drops the old surface's backing store and aux state.
    pub fn create(&mut self, id: SurfaceId, width: u32, height: u32) -> &mut Surface {
        self.surfaces.insert(id, Surface::new(id, width, height));
        self.surfaces.get_mut(&id).unwrap()
    }

    pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.surfaces.get_mut(&id)
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.surfaces.contains_key(&id)
    }

    /// Destroys a surface, releasing its backing store and aux-state buffers.
    pub fn destroy(&mut self, id: SurfaceId) {
        self.surfaces.remove(&id);
    }

    /// Backing-store handle of a surface, if resident.
    pub(crate) fn bo_of(&self, id: SurfaceId) -> Option<&BufferRef> {
        self.surfaces.get(&id).and_then(|s| s.bo.as_ref())
    }

    pub(crate) fn avc_aux(&self, id: SurfaceId) -> Option<&AvcAux> {
        match self.surfaces.get(&id)?.aux {
            Some(AuxState::Avc(ref aux)) => Some(aux),
            _ => None,
        }
    }

    pub(crate) fn vc1_aux(&self, id: SurfaceId) -> Option<&Vc1Aux> {
        match self.surfaces.get(&id)?.aux {
            Some(AuxState::Vc1(ref aux)) => Some(aux),
            _ => None,
        }
    }

    pub(crate) fn vc1_aux_mut(&mut self, id: SurfaceId) -> Option<&mut Vc1Aux> {
        match self.surfaces.get_mut(&id)?.aux {
            Some(AuxState::Vc1(ref mut aux)) => Some(aux),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SystemAllocator;

    #[test]
    fn backing_is_allocated_once_per_format() {
        let alloc = SystemAllocator::new();
        let mut surf = Surface::new(SurfaceId(1), 176, 144);
        surf.ensure_backing(&alloc, Fourcc::Nv12, Subsampling::Yuv420)
            .unwrap();
        let first = surf.bo.as_ref().unwrap().handle();
        surf.ensure_backing(&alloc, Fourcc::Nv12, Subsampling::Yuv420)
            .unwrap();
        assert_eq!(surf.bo.as_ref().unwrap().handle(), first);

        // A format change re-allocates.
        surf.ensure_backing(&alloc, Fourcc::Imc3, Subsampling::Yuv420)
            .unwrap();
        assert_ne!(surf.bo.as_ref().unwrap().handle(), first);
    }

    #[test]
    fn nv12_layout_is_deterministic() {
        let alloc = SystemAllocator::new();
        let mut surf = Surface::new(SurfaceId(1), 176, 144);
        surf.ensure_backing(&alloc, Fourcc::Nv12, Subsampling::Yuv420)
            .unwrap();
        assert_eq!(surf.pitch, 256);
        assert_eq!(surf.y_cb_offset, 160);
        assert_eq!(surf.y_cr_offset, 0);
        assert_eq!(surf.bo.as_ref().unwrap().size(), 256 * 240);
    }

    #[test]
    fn destroying_a_surface_releases_its_buffers() {
        let alloc = SystemAllocator::new();
        let mut set = SurfaceSet::new();
        set.create(SurfaceId(3), 64, 64)
            .ensure_backing(&alloc, Fourcc::Nv12, Subsampling::Yuv420)
            .unwrap();
        let bo = set.bo_of(SurfaceId(3)).unwrap().clone();
        assert_eq!(std::rc::Rc::strong_count(&bo), 2);
        set.destroy(SurfaceId(3));
        assert_eq!(std::rc::Rc::strong_count(&bo), 1);
    }
}
