// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![no_std]
#![warn(missing_docs)]
#![allow(clippy::needless_return)]

//! Register-set and sampling-buffer wire types for pmon

pub use abi::BufferHeader;
pub use abi::EntryHeader;
pub use flags::PmdFlags;
pub use flags::PrivLevel;
pub use flags::RateFlags;
pub use flags::SamplingRate;
pub use flags::SetFlags;
pub use regset::RegSet;
pub use regset::RegSetIter;
pub use regset::PMON_MAX_REGS;

pub mod changelog;

mod abi;
mod flags;
mod regset;
