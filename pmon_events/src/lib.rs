// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![no_std]
#![warn(missing_docs)]
#![allow(clippy::needless_return)]

//! Event-set modeling and PMU register programming

extern crate alloc;

pub use event_set::CounterAssignment;
pub use event_set::Event;
pub use event_set::EventSetSetup;
pub use event_set::RevEntry;
pub use event_set::RevPmd;
pub use install::install_pmc_registers;
pub use install::install_pmd_registers;
pub use install::AccessError;
pub use install::InstallError;
pub use install::PmdValue;
pub use install::RegisterAccess;
pub use model::GenericModel;
pub use model::PmuModel;
pub use prepare::prepare_event_set;
pub use prepare::prepare_pmc_registers;
pub use prepare::prepare_pmd_registers;
pub use prepare::prepare_sampling_pmds;
pub use prepare::PmcImage;
pub use prepare::PmdImage;
pub use prepare::PrepareError;
pub use prepare::PrepareOpts;

pub mod changelog;

mod event_set;
mod install;
mod model;
mod prepare;
