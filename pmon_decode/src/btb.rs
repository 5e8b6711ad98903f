// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.
// Branch-trace-buffer sample decoding.

use core::fmt;

use crate::decoder::AuxValue;
use crate::printer::RegisterPrinter;

/// Number of slot registers in a branch trace buffer.
pub const BTB_SLOTS: u16 = 8;

/// Slot register layout:
/// - bit 0: slot holds a valid branch record
/// - bit 1: the branch was mispredicted
/// - bits 4..63: branch address (low 4 bits implied zero)
///
/// Index register layout:
/// - bits 0..2: next slot the hardware will write (ring position)
/// - bit 3: the ring has wrapped (all slots valid)
#[derive(Clone, Copy, Debug)]
pub struct BtbPrinter {
    first_slot: u16,
    index_reg: u16,
}

const SLOT_VALID: u64 = 1 << 0;
const SLOT_MISPREDICTED: u64 = 1 << 1;
const SLOT_ADDR_MASK: u64 = !0xf;
const INDEX_POS_MASK: u64 = 0x7;
const INDEX_FULL: u64 = 1 << 3;

impl BtbPrinter {
    /// Creates a printer for a trace buffer occupying slot registers
    /// `first_slot..first_slot + 8` plus the given index register.
    pub const fn new(first_slot: u16, index_reg: u16) -> BtbPrinter {
        return BtbPrinter {
            first_slot,
            index_reg,
        };
    }

    /// The index register number.
    pub const fn index_reg(&self) -> u16 {
        self.index_reg
    }

    const fn is_slot(&self, reg: u16) -> bool {
        return reg >= self.first_slot && reg < self.first_slot + BTB_SLOTS;
    }

    fn print_slot(&self, writer: &mut dyn fmt::Write, slot: u16, value: u64) -> fmt::Result {
        if value & SLOT_VALID == 0 {
            return write!(writer, "btb[{}] invalid", slot);
        }
        return write!(
            writer,
            "btb[{}] addr=0x{:016x} mp={}",
            slot,
            value & SLOT_ADDR_MASK,
            (value & SLOT_MISPREDICTED != 0) as u32
        );
    }
}

impl RegisterPrinter for BtbPrinter {
    fn decodes(&self, reg: u16) -> bool {
        return reg == self.index_reg || self.is_slot(reg);
    }

    fn print(&self, writer: &mut dyn fmt::Write, reg: u16, value: u64) -> fmt::Result {
        if reg == self.index_reg {
            return write!(
                writer,
                "btb index={} full={}",
                value & INDEX_POS_MASK,
                (value & INDEX_FULL != 0) as u32
            );
        }
        debug_assert!(self.is_slot(reg));
        return self.print_slot(writer, reg - self.first_slot, value);
    }
}

/// Formatter for one sample's full branch trace: walks the slot ring
/// oldest-first, starting from the position in the index register, and
/// writes one line per valid branch record.
#[derive(Clone, Debug)]
pub struct BranchTraceDisplay<'smp> {
    printer: BtbPrinter,
    aux: &'smp [AuxValue],
}

impl<'smp> BranchTraceDisplay<'smp> {
    /// Creates a formatter over a decoded sample's auxiliary values.
    pub fn new(printer: BtbPrinter, aux: &'smp [AuxValue]) -> BranchTraceDisplay<'smp> {
        return BranchTraceDisplay { printer, aux };
    }

    fn slot_value(&self, slot: u16) -> Option<u64> {
        let reg = self.printer.first_slot + slot;
        for aux in self.aux {
            if aux.reg == reg {
                return Some(aux.value);
            }
        }
        return None;
    }

    /// Writes the trace to the specified writer.
    pub fn write_to<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let mut index = 0u64;
        for aux in self.aux {
            if aux.reg == self.printer.index_reg {
                index = aux.value;
            }
        }

        // When the ring wrapped, the next-write position is the oldest
        // record; otherwise slot 0 is.
        let start = if index & INDEX_FULL != 0 {
            (index & INDEX_POS_MASK) as u16
        } else {
            0
        };

        for k in 0..BTB_SLOTS {
            let slot = (start + k) % BTB_SLOTS;
            let value = match self.slot_value(slot) {
                Some(value) => value,
                None => continue,
            };
            if value & SLOT_VALID == 0 {
                continue;
            }
            self.printer.print_slot(writer, slot, value)?;
            writer.write_char('\n')?;
        }
        return Ok(());
    }
}

impl<'smp> fmt::Display for BranchTraceDisplay<'smp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return self.write_to(f);
    }
}
