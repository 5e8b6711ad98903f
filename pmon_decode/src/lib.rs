// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![no_std]
#![warn(missing_docs)]
#![allow(clippy::needless_return)]

//! Sampling-buffer decoding and profile reduction

extern crate alloc;

pub use byte_reader::ByteReader;
pub use decoder::AuxValue;
pub use decoder::DecodeError;
pub use decoder::DecodedSample;
pub use decoder::EntryWalk;
pub use decoder::SampleDecoder;
pub use ear::DataEarPrinter;
pub use ear::InstEarPrinter;
pub use btb::BranchTraceDisplay;
pub use btb::BtbPrinter;
pub use printer::RawPrinter;
pub use printer::RegisterPrinter;
pub use profile::percent;
pub use profile::ProfileBucket;
pub use profile::ProfileKey;
pub use profile::ProfileTable;
pub use profile::ReduceOpts;
pub use report::write_compact_sample;
pub use report::write_profile;
pub use report::write_raw_sample;
pub use symbols::SymbolInfo;
pub use symbols::SymbolResolver;
pub use symbols::UNKNOWN_COOKIE;

pub mod changelog;

mod btb;
mod byte_reader;
mod decoder;
mod ear;
mod printer;
mod profile;
mod report;
mod symbols;
