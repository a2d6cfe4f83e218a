//! Batch construction for the decode command streamer.
//!
//! The writer mirrors the begin/emit/advance discipline of the execution
//! path: a command is opened with its total dword length, filled one dword at
//! a time, then closed. Addresses are emitted as 64-bit zero placeholders
//! paired with relocation records that the submission layer patches.

use bitflags::bitflags;

use crate::cmd;
use crate::BufferHandle;

bitflags! {
    /// Memory domains a relocation target participates in.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Domains: u32 {
        const INSTRUCTION = 1 << 0;
        const RENDER = 1 << 1;
    }
}

/// A patch point inside a batch: the two dwords starting at `dword` hold a
/// 64-bit address of `target` plus `delta` once the batch is submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reloc {
    pub dword: usize,
    pub target: BufferHandle,
    pub delta: u32,
    pub read_domains: Domains,
    pub write_domain: Domains,
}

/// One flushed unit of work: an opaque dword stream plus its relocations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    pub dwords: Vec<u32>,
    pub relocs: Vec<Reloc>,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.dwords.is_empty()
    }

    /// Iterates over the command headers in the batch, yielding
    /// `(dword_index, header)` pairs. Walks by the length encoded in each
    /// header, so it is only meaningful for well-formed streams.
    pub fn commands(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        let mut cursor = 0usize;
        std::iter::from_fn(move || {
            if cursor >= self.dwords.len() {
                return None;
            }
            let at = cursor;
            let header = self.dwords[at];
            cursor += cmd::dword_length_of(header) as usize;
            Some((at, header))
        })
    }
}

#[derive(Debug, Default)]
pub struct BatchBuffer {
    dwords: Vec<u32>,
    relocs: Vec<Reloc>,
    open: Option<OpenCommand>,
    atomic: bool,
    pending: Vec<Batch>,
}

#[derive(Debug)]
struct OpenCommand {
    start: usize,
    len: usize,
}

impl BatchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.dwords.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dwords.len()
    }

    /// Opens an `len`-dword command. The count is checked at [`advance`].
    ///
    /// [`advance`]: Self::advance
    pub fn begin(&mut self, len: usize) {
        assert!(self.open.is_none(), "previous command not closed");
        self.open = Some(OpenCommand {
            start: self.dwords.len(),
            len,
        });
    }

    pub fn emit(&mut self, dword: u32) {
        self.dwords.push(dword);
    }

    /// Appends raw little-endian bytes; the length must be dword-aligned.
    pub fn emit_data(&mut self, bytes: &[u8]) {
        assert_eq!(bytes.len() % 4, 0, "command payload must be dword-aligned");
        for chunk in bytes.chunks_exact(4) {
            self.dwords.push(u32::from_le_bytes(chunk.try_into().unwrap()));
        }
    }

    /// Appends a 64-bit address placeholder (two zero dwords) and records the
    /// relocation against `target`.
    pub fn reloc64(
        &mut self,
        target: BufferHandle,
        read_domains: Domains,
        write_domain: Domains,
        delta: u32,
    ) {
        self.relocs.push(Reloc {
            dword: self.dwords.len(),
            target,
            delta,
            read_domains,
            write_domain,
        });
        self.dwords.push(0);
        self.dwords.push(0);
    }

    /// Closes the current command, checking the emitted dword count.
    pub fn advance(&mut self) {
        let open = self.open.take().expect("no command open");
        assert_eq!(
            self.dwords.len() - open.start,
            open.len,
            "command dword count mismatch"
        );
    }

    /// Marks the start of a group of commands that must reach the execution
    /// path as one unit.
    pub fn start_atomic(&mut self) {
        assert!(!self.atomic, "atomic section already open");
        self.atomic = true;
    }

    pub fn end_atomic(&mut self) {
        assert!(self.atomic, "no atomic section open");
        self.atomic = false;
    }

    /// Closes the batch and queues it for submission. Flushing with an open
    /// command or inside an atomic section is a programming error.
    pub fn flush(&mut self) {
        assert!(self.open.is_none(), "flush with an open command");
        assert!(!self.atomic, "flush inside an atomic section");
        if self.dwords.is_empty() {
            return;
        }
        let batch = Batch {
            dwords: std::mem::take(&mut self.dwords),
            relocs: std::mem::take(&mut self.relocs),
        };
        self.pending.push(batch);
    }

    /// Hands the flushed batches to the caller, oldest first.
    pub fn take_pending(&mut self) -> Vec<Batch> {
        std::mem::take(&mut self.pending)
    }

    /// Discards everything emitted since the last flush. Used to unwind a
    /// decode call that failed mid-emission so no partial batch survives.
    pub fn reset(&mut self) {
        self.dwords.clear();
        self.relocs.clear();
        self.open = None;
        self.atomic = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reloc_records_placeholder_position() {
        let mut b = BatchBuffer::new();
        b.begin(4);
        b.emit(cmd::cmd_header(cmd::MFX_VC1_DIRECTMODE_STATE, 4));
        b.reloc64(7, Domains::INSTRUCTION, Domains::INSTRUCTION, 0);
        b.emit(0);
        b.advance();
        b.flush();

        let batches = b.take_pending();
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.dwords.len(), 4);
        assert_eq!(batch.relocs.len(), 1);
        assert_eq!(batch.relocs[0].dword, 1);
        assert_eq!(batch.relocs[0].target, 7);
    }

    #[test]
    #[should_panic(expected = "dword count mismatch")]
    fn advance_checks_dword_count() {
        let mut b = BatchBuffer::new();
        b.begin(3);
        b.emit(0);
        b.advance();
    }

    #[test]
    #[should_panic(expected = "atomic section")]
    fn flush_inside_atomic_section_panics() {
        let mut b = BatchBuffer::new();
        b.start_atomic();
        b.begin(1);
        b.emit(0);
        b.advance();
        b.flush();
    }

    #[test]
    fn reset_discards_unflushed_commands() {
        let mut b = BatchBuffer::new();
        b.start_atomic();
        b.begin(1);
        b.emit(0xdead_beef);
        b.advance();
        b.reset();
        b.flush();
        assert!(b.take_pending().is_empty());
    }
}
