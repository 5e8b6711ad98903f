// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use core::fmt;

/// Per-PMU-model capability for the semantic decoding of auxiliary sample
/// registers, keyed by register number. The generic decoder supplies
/// `(register, raw value)` pairs in the fixed per-overflow order; printers
/// turn individual values into human-readable text.
pub trait RegisterPrinter {
    /// Returns true if this printer knows how to decode `reg`.
    fn decodes(&self, reg: u16) -> bool;

    /// Writes the decoded representation of `reg`'s raw value.
    /// PRECONDITION: `self.decodes(reg)`.
    fn print(&self, writer: &mut dyn fmt::Write, reg: u16, value: u64) -> fmt::Result;
}

/// Fallback printer: hex-dumps any register.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawPrinter;

impl RegisterPrinter for RawPrinter {
    fn decodes(&self, _reg: u16) -> bool {
        return true;
    }

    fn print(&self, writer: &mut dyn fmt::Write, reg: u16, value: u64) -> fmt::Result {
        return write!(writer, "pmd{}=0x{:016x}", reg, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    #[test]
    fn raw_printer_hex_dumps() {
        let mut out = String::new();
        RawPrinter.print(&mut out, 7, 0xdead).unwrap();
        assert_eq!("pmd7=0x000000000000dead", out);
    }
}
