// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

/// Helper for reading sampling-buffer data that may be in big-endian or
/// little-endian byte order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ByteReader {
    source_big_endian: bool,
}

impl ByteReader {
    /// true if running on a big-endian system.
    pub const HOST_IS_BIG_ENDIAN: bool = cfg!(target_endian = "big");

    /// A reader for input data in the byte order of the host system.
    pub const KEEP_ENDIAN: Self = Self::new(Self::HOST_IS_BIG_ENDIAN);

    /// A reader for input data NOT in the byte order of the host system.
    pub const SWAP_ENDIAN: Self = Self::new(!Self::HOST_IS_BIG_ENDIAN);

    /// Create a new reader that will interpret input data bytes as indicated
    /// by the source_big_endian parameter.
    pub const fn new(source_big_endian: bool) -> Self {
        return Self { source_big_endian };
    }

    /// Returns true if the input data bytes are being interpreted as
    /// big-endian.
    pub const fn source_big_endian(self) -> bool {
        return self.source_big_endian;
    }

    /// Returns true if the input data bytes are being byte-swapped.
    pub const fn byte_swap_needed(self) -> bool {
        return self.source_big_endian != Self::HOST_IS_BIG_ENDIAN;
    }

    /// Reads a u16 from the start of the given slice, swapping byte order
    /// if byte_swap_needed() is true.
    /// PRECONDITION: source.len() >= 2
    pub fn read_u16(self, source: &[u8]) -> u16 {
        let source_array = source[..2].try_into().unwrap();
        return if self.source_big_endian {
            u16::from_be_bytes(source_array)
        } else {
            u16::from_le_bytes(source_array)
        };
    }

    /// Reads a u32 from the start of the given slice, swapping byte order
    /// if byte_swap_needed() is true.
    /// PRECONDITION: source.len() >= 4
    pub fn read_u32(self, source: &[u8]) -> u32 {
        let source_array = source[..4].try_into().unwrap();
        return if self.source_big_endian {
            u32::from_be_bytes(source_array)
        } else {
            u32::from_le_bytes(source_array)
        };
    }

    /// Reads a u64 from the start of the given slice, swapping byte order
    /// if byte_swap_needed() is true.
    /// PRECONDITION: source.len() >= 8
    pub fn read_u64(self, source: &[u8]) -> u64 {
        let source_array = source[..8].try_into().unwrap();
        return if self.source_big_endian {
            u64::from_be_bytes(source_array)
        } else {
            u64::from_le_bytes(source_array)
        };
    }

    /// Reads the `index`-th 8-byte register value from a sample body.
    /// PRECONDITION: body.len() >= (index + 1) * 8
    pub fn read_aux_u64(self, body: &[u8], index: usize) -> u64 {
        return self.read_u64(&body[index * 8..]);
    }
}
