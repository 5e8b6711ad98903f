// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.
// Sampling-buffer wire format shared with the kernel counting interface.

use core::mem;

/// Fixed header at the start of a sampling-buffer snapshot.
///
/// The buffer is `[BufferHeader][entry]*` where each entry is an
/// [`EntryHeader`] followed by a variable number of 8-byte register values.
/// `overflow_count` and `entry_count` are monotonic within one buffer
/// generation and drive the decoder's skip-already-seen logic.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferHeader {
    /// Number of times the buffer has filled and been reset by the kernel.
    pub overflow_count: u64,

    /// Number of entries currently in the buffer.
    pub entry_count: u64,

    /// Wire format version; must equal [`BufferHeader::FORMAT_VERSION`].
    pub format_version: u32,

    /// Unused, must be zero.
    pub reserved: u32,
}

impl BufferHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 24;

    /// The wire format version this crate understands.
    pub const FORMAT_VERSION: u32 = 1;

    /// Reads a BufferHeader from a byte array.
    /// - If `source_big_endian != cfg!(target_endian = "big")`, returns a
    ///   byte-swapped copy of `bytes`.
    /// - Otherwise, returns `bytes` reinterpreted.
    pub fn from_bytes(bytes: &[u8; Self::SIZE], source_big_endian: bool) -> Self {
        let header: BufferHeader = unsafe { mem::transmute_copy(bytes) };
        if source_big_endian != cfg!(target_endian = "big") {
            return header.byte_swap_copy();
        } else {
            return header;
        }
    }

    /// Return a copy of this struct with all fields byte-reversed.
    pub const fn byte_swap_copy(mut self) -> Self {
        self.overflow_count = self.overflow_count.swap_bytes();
        self.entry_count = self.entry_count.swap_bytes();
        self.format_version = self.format_version.swap_bytes();
        self.reserved = self.reserved.swap_bytes();
        return self;
    }
}

/// Fixed header at the start of each sampling-buffer entry.
///
/// Followed by N 8-byte register values; N depends only on
/// `overflowed_pmd` (via the event set's reverse-sampling-PMD table), never
/// on the individual sample. Entries are packed with no padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntryHeader {
    /// Timestamp of the overflow, in session clock ticks.
    pub timestamp: u64,

    /// Instruction pointer at the overflow.
    pub ip: u64,

    /// Value the overflowed counter was last reset to.
    pub last_reset_value: u64,

    /// Process id of the monitored task, 0 for system-wide sessions.
    pub pid: u32,

    /// Thread id of the monitored task, 0 for system-wide sessions.
    pub tid: u32,

    /// CPU the overflow was recorded on.
    pub cpu: u32,

    /// Logical id of the event set that was active.
    pub set_id: u32,

    /// Register number of the counter that overflowed.
    pub overflowed_pmd: u16,

    /// Unused, must be zero.
    pub reserved: [u8; 6],
}

impl EntryHeader {
    /// Size of the fixed entry header in bytes.
    pub const SIZE: usize = 48;

    /// Reads an EntryHeader from a byte array, swapping byte order if the
    /// source byte order does not match the host byte order.
    pub fn from_bytes(bytes: &[u8; Self::SIZE], source_big_endian: bool) -> Self {
        let entry: EntryHeader = unsafe { mem::transmute_copy(bytes) };
        if source_big_endian != cfg!(target_endian = "big") {
            return entry.byte_swap_copy();
        } else {
            return entry;
        }
    }

    /// Return a copy of this struct with all fields byte-reversed.
    pub const fn byte_swap_copy(mut self) -> Self {
        self.timestamp = self.timestamp.swap_bytes();
        self.ip = self.ip.swap_bytes();
        self.last_reset_value = self.last_reset_value.swap_bytes();
        self.pid = self.pid.swap_bytes();
        self.tid = self.tid.swap_bytes();
        self.cpu = self.cpu.swap_bytes();
        self.set_id = self.set_id.swap_bytes();
        self.overflowed_pmd = self.overflowed_pmd.swap_bytes();
        return self;
    }
}

const _: () = assert!(mem::size_of::<BufferHeader>() == BufferHeader::SIZE);
const _: () = assert!(mem::size_of::<EntryHeader>() == EntryHeader::SIZE);
