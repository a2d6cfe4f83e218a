//! GPU buffer handles and the allocator boundary.
//!
//! Buffers are reference counted: cloning a [`BufferRef`] acquires, dropping
//! releases. Replacing a held reference therefore follows the
//! release-then-acquire discipline automatically. Contents are CPU visible so
//! the engine can pre-fill side data (VC-1 bitplanes, the JPEG workaround
//! clip) the way the original maps device memory.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use thiserror::Error;
use vdec_protocol::BufferHandle;

/// Allocation failure; converted into [`crate::DecodeError::OutOfMemory`].
#[derive(Debug, Error, PartialEq, Eq)]
#[error("allocation of {size} bytes ({label}) failed")]
pub struct AllocError {
    pub label: &'static str,
    pub size: usize,
}

/// A GPU-visible buffer. Identity (the [`BufferHandle`]) is what ends up in
/// relocation records; contents back the handful of paths that write side
/// data through the CPU.
#[derive(Debug)]
pub struct Buffer {
    handle: BufferHandle,
    label: &'static str,
    size: usize,
    align: usize,
    data: RefCell<Vec<u8>>,
}

pub type BufferRef = Rc<Buffer>;

impl Buffer {
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn align(&self) -> usize {
        self.align
    }

    pub fn map(&self) -> Ref<'_, Vec<u8>> {
        self.data.borrow()
    }

    pub fn map_mut(&self) -> RefMut<'_, Vec<u8>> {
        self.data.borrow_mut()
    }

    /// Copies `bytes` into the buffer at `offset`.
    pub fn write(&self, offset: usize, bytes: &[u8]) {
        self.data.borrow_mut()[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

/// The allocation boundary the decode engine talks to. Implementations hand
/// out zero-initialized buffers; failure is surfaced, never masked.
pub trait Allocator {
    fn alloc(
        &self,
        label: &'static str,
        size: usize,
        align: usize,
    ) -> std::result::Result<BufferRef, AllocError>;
}

/// Heap-backed allocator used when no device-specific allocator is supplied.
#[derive(Debug, Default)]
pub struct SystemAllocator {
    next_handle: Cell<BufferHandle>,
}

impl SystemAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Allocator for SystemAllocator {
    fn alloc(
        &self,
        label: &'static str,
        size: usize,
        align: usize,
    ) -> std::result::Result<BufferRef, AllocError> {
        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        Ok(Rc::new(Buffer {
            handle,
            label,
            size,
            align,
            data: RefCell::new(vec![0; size]),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique_and_contents_zeroed() {
        let alloc = SystemAllocator::new();
        let a = alloc.alloc("a", 16, 0x1000).unwrap();
        let b = alloc.alloc("b", 16, 0x1000).unwrap();
        assert_ne!(a.handle(), b.handle());
        assert!(a.map().iter().all(|&x| x == 0));
    }

    #[test]
    fn write_patches_contents_in_place() {
        let alloc = SystemAllocator::new();
        let buf = alloc.alloc("clip", 8, 16).unwrap();
        buf.write(2, &[0xaa, 0xbb]);
        assert_eq!(&buf.map()[..], &[0, 0, 0xaa, 0xbb, 0, 0, 0, 0]);
    }
}
