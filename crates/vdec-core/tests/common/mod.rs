#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use vdec_core::{AllocError, Allocator, Buffer, BufferRef, SystemAllocator};
use vdec_protocol::cmd::opcode_of;
use vdec_protocol::Batch;

/// Allocator wrapper that logs every allocation and can be told to start
/// failing, for exercising the resource-exhaustion path.
pub struct TrackingAllocator {
    inner: SystemAllocator,
    log: RefCell<Vec<(&'static str, Weak<Buffer>)>>,
    fail_after: Cell<Option<usize>>,
}

impl TrackingAllocator {
    pub fn new() -> Self {
        Self {
            inner: SystemAllocator::new(),
            log: RefCell::new(Vec::new()),
            fail_after: Cell::new(None),
        }
    }

    /// Fails every allocation once `n` have succeeded.
    pub fn fail_after(n: usize) -> Self {
        let alloc = Self::new();
        alloc.fail_after.set(Some(n));
        alloc
    }

    /// Number of allocations ever made under `label`.
    pub fn total(&self, label: &str) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|(l, _)| *l == label)
            .count()
    }

    /// Number of allocations under `label` still referenced somewhere.
    pub fn live(&self, label: &str) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|(l, weak)| *l == label && weak.upgrade().is_some())
            .count()
    }

    /// The most recent live allocation under `label`.
    pub fn last_live(&self, label: &str) -> Option<BufferRef> {
        self.log
            .borrow()
            .iter()
            .rev()
            .filter(|(l, _)| *l == label)
            .find_map(|(_, weak)| weak.upgrade())
    }
}

impl Allocator for TrackingAllocator {
    fn alloc(
        &self,
        label: &'static str,
        size: usize,
        align: usize,
    ) -> Result<BufferRef, AllocError> {
        if let Some(n) = self.fail_after.get() {
            if self.log.borrow().len() >= n {
                return Err(AllocError { label, size });
            }
        }
        let buf = self.inner.alloc(label, size, align)?;
        self.log.borrow_mut().push((label, Rc::downgrade(&buf)));
        Ok(buf)
    }
}

/// Dword indices and opcodes of every command in the batch.
pub fn commands_of(batch: &Batch) -> Vec<(usize, u32)> {
    batch
        .commands()
        .map(|(at, header)| (at, opcode_of(header)))
        .collect()
}

/// Dword index of the n-th command with the given opcode.
pub fn find_nth(batch: &Batch, opcode: u32, n: usize) -> Option<usize> {
    commands_of(batch)
        .into_iter()
        .filter(|&(_, op)| op == opcode)
        .map(|(at, _)| at)
        .nth(n)
}

pub fn find_cmd(batch: &Batch, opcode: u32) -> Option<usize> {
    find_nth(batch, opcode, 0)
}

pub fn count_cmd(batch: &Batch, opcode: u32) -> usize {
    commands_of(batch)
        .into_iter()
        .filter(|&(_, op)| op == opcode)
        .count()
}

/// Asserts that `expected` opcodes appear in the batch in the given relative
/// order (other commands may interleave).
pub fn assert_subsequence(batch: &Batch, expected: &[u32]) {
    let actual = commands_of(batch);
    let mut want = expected.iter().peekable();
    for (_, op) in actual {
        if want.peek() == Some(&&op) {
            want.next();
        }
    }
    assert!(
        want.peek().is_none(),
        "missing opcode {:#x} in command sequence",
        want.peek().unwrap()
    );
}

/// True when some relocation patches the 64-bit slot at `dword`.
pub fn has_reloc_at(batch: &Batch, dword: usize) -> bool {
    batch.relocs.iter().any(|r| r.dword == dword)
}
