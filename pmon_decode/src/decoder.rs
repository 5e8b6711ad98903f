// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use core::fmt;

use alloc::sync::Arc;

use pmon_events::EventSetSetup;
use pmon_events::RevPmd;
use pmon_types::BufferHeader;
use pmon_types::EntryHeader;

use crate::byte_reader::ByteReader;

/// Errors raised while walking a sampling-buffer snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer declares a wire format version this crate does not
    /// understand.
    BadVersion {
        /// The version found in the buffer header.
        found: u32,
    },

    /// The buffer ends in the middle of a header or sample body.
    Truncated,

    /// An entry names an overflowed PMD with no reverse-sampling-table
    /// entry, i.e. a register that is not an overflow source of this set.
    UnknownOverflowPmd {
        /// The offending register number.
        reg: u16,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::BadVersion { found } => {
                return write!(
                    f,
                    "unsupported sampling-buffer format version {} (expected {})",
                    found,
                    BufferHeader::FORMAT_VERSION
                );
            }
            DecodeError::Truncated => return f.write_str("truncated sampling buffer"),
            DecodeError::UnknownOverflowPmd { reg } => {
                return write!(f, "overflow reported for unconfigured PMD {}", reg);
            }
        }
    }
}

/// One auxiliary register value of a decoded sample, in body order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuxValue {
    /// Register number.
    pub reg: u16,

    /// 0-based position in the sample body.
    pub offset: u16,

    /// Owning event index, when the register is itself a trigger counter.
    pub event: Option<usize>,

    /// Raw 64-bit register value.
    pub value: u64,
}

/// One decoded overflow sample, borrowing the snapshot bytes.
#[derive(Clone, Copy, Debug)]
pub struct DecodedSample<'wlk, 'dat> {
    /// The fixed entry header, in host byte order.
    pub header: EntryHeader,

    /// Index of the event whose counter overflowed.
    pub event: usize,

    pmds: &'wlk [RevPmd],
    body: &'dat [u8],
    reader: ByteReader,
}

impl<'wlk, 'dat> DecodedSample<'wlk, 'dat> {
    /// Number of auxiliary registers in this sample's body.
    pub fn aux_count(&self) -> usize {
        return self.pmds.len();
    }

    /// The raw sample body (aux_count × 8 bytes, source byte order).
    pub const fn body(&self) -> &'dat [u8] {
        self.body
    }

    /// Returns the auxiliary register values in the fixed per-overflow
    /// order established when the set was prepared.
    pub fn aux_values(&self) -> AuxIter<'wlk, 'dat> {
        return AuxIter {
            pmds: self.pmds,
            body: self.body,
            reader: self.reader,
            next: 0,
        };
    }
}

/// Iterator over a sample's auxiliary register values, in body order.
#[derive(Clone, Copy, Debug)]
pub struct AuxIter<'wlk, 'dat> {
    pmds: &'wlk [RevPmd],
    body: &'dat [u8],
    reader: ByteReader,
    next: usize,
}

impl<'wlk, 'dat> Iterator for AuxIter<'wlk, 'dat> {
    type Item = AuxValue;

    fn next(&mut self) -> Option<AuxValue> {
        if self.next >= self.pmds.len() {
            return None;
        }

        let pmd = self.pmds[self.next];
        let value = self.reader.read_aux_u64(self.body, pmd.offset as usize);
        self.next += 1;
        return Some(AuxValue {
            reg: pmd.reg,
            offset: pmd.offset,
            event: pmd.event,
            value,
        });
    }
}

/// Per-entity decoder for kernel-filled sampling-buffer snapshots.
///
/// Holds the decode cursor: the last seen (overflow count, entry count)
/// pair. Re-reading an unchanged snapshot yields zero new samples, and a
/// snapshot extended since the previous read yields only the entries not
/// processed before. Owned by exactly one worker; no internal locking.
#[derive(Clone, Debug)]
pub struct SampleDecoder {
    setup: Arc<EventSetSetup>,
    reader: ByteReader,
    last_overflow_count: u64,
    last_entry_count: u64,
    seen: bool,
}

impl SampleDecoder {
    /// Creates a decoder for buffers produced by the given prepared set.
    pub fn new(setup: Arc<EventSetSetup>, reader: ByteReader) -> SampleDecoder {
        return SampleDecoder {
            setup,
            reader,
            last_overflow_count: 0,
            last_entry_count: 0,
            seen: false,
        };
    }

    /// The event set this decoder decodes against.
    pub const fn setup(&self) -> &Arc<EventSetSetup> {
        &self.setup
    }

    /// Starts a walk over a snapshot and advances the decode cursor.
    ///
    /// A snapshot whose (overflow count, entry count) pair is not newer
    /// than the cursor produces a walk of zero samples. A snapshot with
    /// the same overflow count but more entries is a partial re-read: the
    /// previously-seen entries are skipped. A lower overflow count is
    /// accepted as one kernel-side counter wraparound only when the entry
    /// count also decreased; otherwise the snapshot is stale.
    pub fn begin<'dat>(&mut self, snapshot: &'dat [u8]) -> Result<EntryWalk<'dat>, DecodeError> {
        if snapshot.len() < BufferHeader::SIZE {
            return Err(DecodeError::Truncated);
        }

        let hdr_bytes: &[u8; BufferHeader::SIZE] =
            snapshot[..BufferHeader::SIZE].try_into().unwrap();
        let hdr = BufferHeader::from_bytes(hdr_bytes, self.reader.source_big_endian());
        if hdr.format_version != BufferHeader::FORMAT_VERSION {
            return Err(DecodeError::BadVersion {
                found: hdr.format_version,
            });
        }

        let fresh = if !self.seen {
            true
        } else if hdr.overflow_count == self.last_overflow_count {
            hdr.entry_count > self.last_entry_count
        } else if hdr.overflow_count > self.last_overflow_count {
            true
        } else {
            hdr.entry_count < self.last_entry_count
        };

        let mut remaining = 0;
        let mut skip = 0;
        if fresh {
            remaining = hdr.entry_count;
            if self.seen && hdr.overflow_count == self.last_overflow_count {
                skip = self.last_entry_count;
            }
            self.last_overflow_count = hdr.overflow_count;
            self.last_entry_count = hdr.entry_count;
            self.seen = true;
        }

        return Ok(EntryWalk {
            setup: Arc::clone(&self.setup),
            reader: self.reader,
            data: snapshot,
            pos: BufferHeader::SIZE,
            remaining,
            skip,
        });
    }
}

/// An in-progress walk over one snapshot's entries.
#[derive(Clone, Debug)]
pub struct EntryWalk<'dat> {
    setup: Arc<EventSetSetup>,
    reader: ByteReader,
    data: &'dat [u8],
    pos: usize,
    remaining: u64,
    skip: u64,
}

impl<'dat> EntryWalk<'dat> {
    /// Bytes consumed so far, including the buffer header.
    pub const fn pos(&self) -> usize {
        self.pos
    }

    /// Decodes the next new sample, or returns `Ok(None)` at the end of
    /// the snapshot. Entries already seen by a previous partial read are
    /// parsed (they are variable-length) but not returned.
    pub fn next_sample<'wlk>(
        &'wlk mut self,
    ) -> Result<Option<DecodedSample<'wlk, 'dat>>, DecodeError> {
        while self.remaining > 0 {
            if self.data.len() - self.pos < EntryHeader::SIZE {
                return Err(DecodeError::Truncated);
            }

            let hdr_bytes: &[u8; EntryHeader::SIZE] = self.data
                [self.pos..self.pos + EntryHeader::SIZE]
                .try_into()
                .unwrap();
            let header = EntryHeader::from_bytes(hdr_bytes, self.reader.source_big_endian());

            let rev = match self.setup.rev_entry(header.overflowed_pmd) {
                Some(rev) => rev,
                None => {
                    return Err(DecodeError::UnknownOverflowPmd {
                        reg: header.overflowed_pmd,
                    })
                }
            };

            let body_start = self.pos + EntryHeader::SIZE;
            let body_len = rev.pmds.len() * 8;
            if self.data.len() - body_start < body_len {
                return Err(DecodeError::Truncated);
            }

            self.pos = body_start + body_len;
            self.remaining -= 1;
            if self.skip > 0 {
                self.skip -= 1;
                continue;
            }

            return Ok(Some(DecodedSample {
                header,
                event: rev.event,
                pmds: &rev.pmds,
                body: &self.data[body_start..body_start + body_len],
                reader: self.reader,
            }));
        }
        return Ok(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;
    use pmon_events::prepare_event_set;
    use pmon_events::Event;
    use pmon_events::GenericModel;
    use pmon_events::PrepareOpts;
    use pmon_types::PrivLevel;
    use pmon_types::RateFlags;
    use pmon_types::RegSet;
    use pmon_types::SamplingRate;
    use pmon_types::SetFlags;

    const HOST_IS_BIG_ENDIAN: bool = cfg!(target_endian = "big");

    fn period(value: u64) -> SamplingRate {
        return SamplingRate {
            value,
            mask: 0,
            seed: 0,
            flags: RateFlags::ValueSet,
        };
    }

    // Two events on PMDs 4 and 5: event 0 triggers overflows, event 1 is
    // a period-less companion captured in every sample body.
    fn prepared_setup() -> Arc<EventSetSetup> {
        let model = GenericModel::new(
            "test",
            4,
            4,
            0,
            vec![
                (String::from("cpu_cycles"), 0x3c),
                (String::from("inst_retired"), 0xc0),
            ],
        );
        let mut setup = EventSetSetup::new(
            0,
            SetFlags::None,
            vec![
                Event::new("cpu_cycles", vec![], PrivLevel::All),
                Event::new("inst_retired", vec![], PrivLevel::All),
            ],
            vec![period(100_000), SamplingRate::UNSET],
            vec![RegSet::EMPTY; 2],
            vec![RegSet::EMPTY; 2],
        );
        prepare_event_set(&mut setup, &PrepareOpts::default(), &model).unwrap();
        return Arc::new(setup);
    }

    fn push_buffer_header(buf: &mut Vec<u8>, overflow_count: u64, entry_count: u64) {
        let hdr = BufferHeader {
            overflow_count,
            entry_count,
            format_version: BufferHeader::FORMAT_VERSION,
            reserved: 0,
        };
        let bytes: [u8; BufferHeader::SIZE] = unsafe { core::mem::transmute(hdr) };
        buf.extend_from_slice(&bytes);
    }

    fn push_entry(buf: &mut Vec<u8>, ip: u64, overflowed_pmd: u16, aux: &[u64]) {
        let entry = EntryHeader {
            timestamp: 1_000,
            ip,
            last_reset_value: 0u64.wrapping_sub(100_000),
            pid: 7,
            tid: 8,
            cpu: 0,
            set_id: 0,
            overflowed_pmd,
            reserved: [0; 6],
        };
        let bytes: [u8; EntryHeader::SIZE] = unsafe { core::mem::transmute(entry) };
        buf.extend_from_slice(&bytes);
        for value in aux {
            buf.extend_from_slice(&value.to_ne_bytes());
        }
    }

    fn decoder() -> SampleDecoder {
        return SampleDecoder::new(prepared_setup(), ByteReader::new(HOST_IS_BIG_ENDIAN));
    }

    /// Decoding all declared entries consumes exactly the valid region.
    #[test]
    fn entry_size_additivity() {
        let mut buf = Vec::new();
        push_buffer_header(&mut buf, 3, 10);
        for i in 0..10u64 {
            push_entry(&mut buf, 0x4000_0000 + i, 4, &[i]);
        }

        let mut dec = decoder();
        let mut walk = dec.begin(&buf).unwrap();
        let mut samples = 0;
        while let Some(sample) = walk.next_sample().unwrap() {
            assert_eq!(0, sample.event);
            assert_eq!(1, sample.aux_count());
            samples += 1;
        }
        assert_eq!(10, samples);
        assert_eq!(
            BufferHeader::SIZE + 10 * (EntryHeader::SIZE + 8),
            walk.pos()
        );
        assert_eq!(buf.len(), walk.pos());
    }

    /// Re-reading an unchanged snapshot yields zero new samples.
    #[test]
    fn idempotent_decode() {
        let mut buf = Vec::new();
        push_buffer_header(&mut buf, 3, 2);
        push_entry(&mut buf, 0x1000, 4, &[11]);
        push_entry(&mut buf, 0x2000, 4, &[22]);

        let mut dec = decoder();
        let mut walk = dec.begin(&buf).unwrap();
        let mut first = 0;
        while walk.next_sample().unwrap().is_some() {
            first += 1;
        }
        assert_eq!(2, first);

        let mut walk = dec.begin(&buf).unwrap();
        assert!(walk.next_sample().unwrap().is_none());
    }

    #[test]
    fn partial_read_skips_seen_entries() {
        let mut buf = Vec::new();
        push_buffer_header(&mut buf, 3, 1);
        push_entry(&mut buf, 0x1000, 4, &[11]);

        let mut dec = decoder();
        let mut walk = dec.begin(&buf).unwrap();
        assert_eq!(0x1000, walk.next_sample().unwrap().unwrap().header.ip);
        assert!(walk.next_sample().unwrap().is_none());

        // Same overflow generation, one more entry appended.
        let mut buf = Vec::new();
        push_buffer_header(&mut buf, 3, 2);
        push_entry(&mut buf, 0x1000, 4, &[11]);
        push_entry(&mut buf, 0x2000, 4, &[22]);

        let mut walk = dec.begin(&buf).unwrap();
        let sample = walk.next_sample().unwrap().unwrap();
        assert_eq!(0x2000, sample.header.ip);
        assert_eq!(
            vec![AuxValue {
                reg: 5,
                offset: 0,
                event: None,
                value: 22,
            }],
            sample.aux_values().collect::<Vec<_>>()
        );
        assert!(walk.next_sample().unwrap().is_none());
    }

    #[test]
    fn new_overflow_generation_restarts() {
        let mut buf = Vec::new();
        push_buffer_header(&mut buf, 3, 2);
        push_entry(&mut buf, 0x1000, 4, &[1]);
        push_entry(&mut buf, 0x2000, 4, &[2]);

        let mut dec = decoder();
        let mut walk = dec.begin(&buf).unwrap();
        while walk.next_sample().unwrap().is_some() {}

        // Buffer reset by the kernel: higher overflow count, fewer entries.
        let mut buf = Vec::new();
        push_buffer_header(&mut buf, 4, 1);
        push_entry(&mut buf, 0x3000, 4, &[3]);

        let mut walk = dec.begin(&buf).unwrap();
        assert_eq!(0x3000, walk.next_sample().unwrap().unwrap().header.ip);
        assert!(walk.next_sample().unwrap().is_none());
    }

    #[test]
    fn overflow_count_wraparound() {
        let mut buf = Vec::new();
        push_buffer_header(&mut buf, u64::MAX, 5);
        for i in 0..5u64 {
            push_entry(&mut buf, i, 4, &[i]);
        }

        let mut dec = decoder();
        let mut walk = dec.begin(&buf).unwrap();
        while walk.next_sample().unwrap().is_some() {}

        // Wrapped overflow count with a decreased entry count is new data.
        let mut buf = Vec::new();
        push_buffer_header(&mut buf, 0, 1);
        push_entry(&mut buf, 0x9000, 4, &[9]);
        let mut walk = dec.begin(&buf).unwrap();
        assert_eq!(0x9000, walk.next_sample().unwrap().unwrap().header.ip);

        // A lower overflow count without a decreased entry count is stale.
        let mut buf = Vec::new();
        push_buffer_header(&mut buf, 0, 1);
        push_entry(&mut buf, 0x9000, 4, &[9]);
        let mut walk = dec.begin(&buf).unwrap();
        assert!(walk.next_sample().unwrap().is_none());
    }

    #[test]
    fn unknown_overflow_pmd() {
        let mut buf = Vec::new();
        push_buffer_header(&mut buf, 1, 1);
        push_entry(&mut buf, 0x1000, 99, &[]);

        let mut dec = decoder();
        let mut walk = dec.begin(&buf).unwrap();
        assert_eq!(
            DecodeError::UnknownOverflowPmd { reg: 99 },
            walk.next_sample().unwrap_err()
        );
    }

    #[test]
    fn truncated_buffer() {
        let mut dec = decoder();
        assert_eq!(DecodeError::Truncated, dec.begin(&[0u8; 4]).unwrap_err());

        let mut buf = Vec::new();
        push_buffer_header(&mut buf, 1, 2);
        push_entry(&mut buf, 0x1000, 4, &[1]);
        // Second entry promised by the header is missing.
        let mut walk = dec.begin(&buf).unwrap();
        assert!(walk.next_sample().unwrap().is_some());
        assert_eq!(DecodeError::Truncated, walk.next_sample().unwrap_err());
    }

    #[test]
    fn compact_and_raw_output() {
        let mut buf = Vec::new();
        push_buffer_header(&mut buf, 1, 1);
        push_entry(&mut buf, 0x4000_1230, 4, &[42]);

        let mut dec = decoder();
        let mut walk = dec.begin(&buf).unwrap();
        let sample = walk.next_sample().unwrap().unwrap();

        let mut text = String::new();
        crate::write_compact_sample(&mut text, &sample, None).unwrap();
        assert!(text.contains("pmd4"));
        assert!(text.contains("pmd5=0x2a"));
        assert!(text.contains("0x0000000040001230"));

        let mut raw = Vec::new();
        crate::write_raw_sample(&mut raw, &sample);
        assert_eq!(EntryHeader::SIZE + 8, raw.len());
        assert_eq!(&buf[BufferHeader::SIZE..], &raw[..]);
    }

    #[test]
    fn bad_version() {
        let mut buf = Vec::new();
        push_buffer_header(&mut buf, 1, 0);
        buf[16] = 0x7f; // format_version low byte
        let mut dec = decoder();
        assert!(matches!(
            dec.begin(&buf).unwrap_err(),
            DecodeError::BadVersion { .. }
        ));
    }
}
