// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use alloc::string::String;

/// Cookie value meaning "no symbol information".
pub const UNKNOWN_COOKIE: u64 = u64::MAX;

/// Resolved symbol information for one code address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolInfo {
    /// Symbol name.
    pub name: String,

    /// Module (executable or shared object) the symbol belongs to.
    pub module: String,

    /// Symbol start address.
    pub start: u64,

    /// Symbol end address (exclusive).
    pub end: u64,

    /// Identity of the exact symbol, or [`UNKNOWN_COOKIE`].
    pub cookie: u64,
}

/// Abstract address-to-symbol resolution capability. The implementation
/// (ELF parsing, /proc/kallsyms) is outside this crate; `version`
/// identifies which symbol table generation was live when the sample was
/// taken (tables change across exec).
pub trait SymbolResolver {
    /// Resolves an address against the given symbol-table version.
    /// Returns `None` if the address is not covered by any known symbol.
    fn resolve(&self, addr: u64, version: u32) -> Option<SymbolInfo>;
}
