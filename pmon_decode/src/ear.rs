// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.
// Event-address-register sample decoding.

use core::fmt;

use crate::printer::RegisterPrinter;

const LATENCY_MASK: u64 = 0xfff;
const LATENCY_VALID: u64 = 1 << 12;
const LEVEL_SHIFT: u32 = 13;
const LEVEL_MASK: u64 = 0x7;

/// Data event-address registers: one register carries the data address of
/// the captured cache miss, a second carries the latency in cycles
/// (bits 0..11), a valid bit (bit 12), and the cache level that satisfied
/// the access (bits 13..15).
#[derive(Clone, Copy, Debug)]
pub struct DataEarPrinter {
    addr_reg: u16,
    latency_reg: u16,
}

impl DataEarPrinter {
    /// Creates a printer for the given address/latency register pair.
    pub const fn new(addr_reg: u16, latency_reg: u16) -> DataEarPrinter {
        return DataEarPrinter {
            addr_reg,
            latency_reg,
        };
    }
}

impl RegisterPrinter for DataEarPrinter {
    fn decodes(&self, reg: u16) -> bool {
        return reg == self.addr_reg || reg == self.latency_reg;
    }

    fn print(&self, writer: &mut dyn fmt::Write, reg: u16, value: u64) -> fmt::Result {
        if reg == self.addr_reg {
            return write!(writer, "dear addr=0x{:016x}", value);
        }
        debug_assert!(reg == self.latency_reg);
        if value & LATENCY_VALID == 0 {
            return write!(writer, "dear invalid");
        }
        return write!(
            writer,
            "dear lat={} cycles level={}",
            value & LATENCY_MASK,
            (value >> LEVEL_SHIFT) & LEVEL_MASK
        );
    }
}

/// Instruction event-address register: bits 4..63 carry the instruction
/// address of the captured miss, bits 0..2 the cache level, bit 3 the
/// valid bit.
#[derive(Clone, Copy, Debug)]
pub struct InstEarPrinter {
    reg: u16,
}

impl InstEarPrinter {
    /// Creates a printer for the given instruction EAR register.
    pub const fn new(reg: u16) -> InstEarPrinter {
        return InstEarPrinter { reg };
    }
}

impl RegisterPrinter for InstEarPrinter {
    fn decodes(&self, reg: u16) -> bool {
        return reg == self.reg;
    }

    fn print(&self, writer: &mut dyn fmt::Write, reg: u16, value: u64) -> fmt::Result {
        debug_assert!(reg == self.reg);
        if value & (1 << 3) == 0 {
            return write!(writer, "iear invalid");
        }
        return write!(
            writer,
            "iear addr=0x{:016x} level={}",
            value & !0xf,
            value & 0x7
        );
    }
}
