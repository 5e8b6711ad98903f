// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.
// Text and raw output for decoded samples and reduced profiles.

use core::fmt;
use core::mem;

use alloc::vec::Vec;

use pmon_types::EntryHeader;

use crate::decoder::DecodedSample;
use crate::profile::percent;
use crate::profile::ProfileTable;
use crate::symbols::SymbolInfo;

/// Writes one sample as a single line: identity fields, the overflow
/// address, then each auxiliary register as `pmdN=value`. When `symbol`
/// is provided the resolved location is appended.
pub fn write_compact_sample<W: fmt::Write + ?Sized>(
    w: &mut W,
    sample: &DecodedSample,
    symbol: Option<&SymbolInfo>,
) -> fmt::Result {
    let hdr = &sample.header;
    write!(
        w,
        "{:>6} {:>6} cpu{:<3} set{:<3} {:>20} 0x{:016x} pmd{}",
        hdr.pid, hdr.tid, hdr.cpu, hdr.set_id, hdr.timestamp, hdr.ip, hdr.overflowed_pmd
    )?;
    for aux in sample.aux_values() {
        write!(w, " pmd{}=0x{:x}", aux.reg, aux.value)?;
    }
    if let Some(symbol) = symbol {
        write!(
            w,
            " {}+0x{:x} [{}]",
            symbol.name,
            sample.header.ip.wrapping_sub(symbol.start),
            symbol.module
        )?;
    }
    return writeln!(w);
}

/// Appends one sample in wire format (entry header then the auxiliary
/// values in body order), letting raw-mode consumers re-parse the stream
/// with their own tooling. The header is emitted in host byte order; the
/// body is copied as captured.
pub fn write_raw_sample(out: &mut Vec<u8>, sample: &DecodedSample) {
    let bytes: [u8; EntryHeader::SIZE] = unsafe { mem::transmute(sample.header) };
    out.extend_from_slice(&bytes);
    out.extend_from_slice(sample.body());
}

/// Writes the reduced profile histogram for `order` (as returned by
/// [`ProfileTable::reduce_and_sort`]): per-event counts, the first
/// event's share and cumulative share, the address, and the symbol when
/// one was resolved.
pub fn write_profile<W: fmt::Write + ?Sized>(
    w: &mut W,
    table: &ProfileTable,
    order: &[usize],
) -> fmt::Result {
    let totals = table.totals();
    let total = totals.first().copied().unwrap_or(0);

    let mut cum = 0.0f64;
    for &index in order {
        let bucket = table.bucket(index);
        for count in &bucket.counts {
            write!(w, "{:>12} ", count)?;
        }
        let share = percent(bucket.counts[0], total);
        cum += share;
        write!(w, "{:>6.2}% {:>6.2}% 0x{:016x} ", share, cum, bucket.key.addr)?;
        match &bucket.symbol {
            Some(symbol) => writeln!(
                w,
                "{}+0x{:x} [{}]",
                symbol.name,
                bucket.key.addr.wrapping_sub(symbol.start),
                symbol.module
            )?,
            None => writeln!(w, "?")?,
        }
    }

    for total in &totals {
        write!(w, "{:>12} ", total)?;
    }
    return writeln!(w, "total samples");
}
