// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use alloc::string::String;
use alloc::vec::Vec;

use pmon_types::RegSet;

use crate::event_set::CounterAssignment;
use crate::event_set::Event;
use crate::event_set::EventSetSetup;
use crate::install::InstallError;
use crate::install::RegisterAccess;
use crate::prepare::PrepareError;

/// The per-PMU-family capability the generic engine programs registers
/// through. One implementation per hardware family, selected once at
/// startup and passed by reference into the core.
pub trait PmuModel {
    /// Model name, e.g. "core2" or "amd64".
    fn name(&self) -> &str;

    /// Number of physical counters the hardware provides.
    fn num_counters(&self) -> usize;

    /// Encodes the control-register value selecting `event`.
    /// Returns `None` if the event name is unknown to this model.
    fn encode_pmc(&self, event: &Event) -> Option<u64>;

    /// Maps each event to a physical (PMD, PMC) register pair.
    /// Fails with [`PrepareError::TooManyCounters`] if the set does not fit.
    fn assign_counters(&self, events: &[Event]) -> Result<Vec<CounterAssignment>, PrepareError>;

    /// Registers this model requires in every sample body (e.g. a trace
    /// buffer index register), merged into the common-sampling set before
    /// the reverse table is built.
    fn required_smpl_pmds(&self, setup: &EventSetSetup) -> RegSet {
        let _ = setup;
        return RegSet::EMPTY;
    }

    /// Invoked after a successful register installation, for registers the
    /// generic engine does not know how to express (e.g. debug-register
    /// based sampling ranges).
    fn post_install(
        &self,
        access: &mut dyn RegisterAccess,
        setup: &EventSetSetup,
    ) -> Result<(), InstallError> {
        let _ = (access, setup);
        return Ok(());
    }
}

/// A table-driven PMU model: `num_counters` counters with PMDs starting at
/// `first_pmd` and PMCs starting at `first_pmc`, events encoded by a flat
/// name -> code table. Used for hardware without model-specific side
/// effects, and by tests.
#[derive(Clone, Debug)]
pub struct GenericModel {
    name: String,
    num_counters: usize,
    first_pmd: u16,
    first_pmc: u16,
    event_codes: Vec<(String, u64)>,
}

impl GenericModel {
    /// Creates a model with the given geometry and event table.
    pub fn new(
        name: impl Into<String>,
        num_counters: usize,
        first_pmd: u16,
        first_pmc: u16,
        event_codes: Vec<(String, u64)>,
    ) -> GenericModel {
        return GenericModel {
            name: name.into(),
            num_counters,
            first_pmd,
            first_pmc,
            event_codes,
        };
    }
}

impl PmuModel for GenericModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_counters(&self) -> usize {
        self.num_counters
    }

    fn encode_pmc(&self, event: &Event) -> Option<u64> {
        for (name, code) in &self.event_codes {
            if name == event.name() {
                return Some(*code);
            }
        }
        return None;
    }

    fn assign_counters(&self, events: &[Event]) -> Result<Vec<CounterAssignment>, PrepareError> {
        if events.len() > self.num_counters {
            return Err(PrepareError::TooManyCounters {
                requested: events.len(),
                available: self.num_counters,
            });
        }

        let mut assignments = Vec::with_capacity(events.len());
        for i in 0..events.len() {
            assignments.push(CounterAssignment {
                pmd: self.first_pmd + i as u16,
                pmc: self.first_pmc + i as u16,
            });
        }
        return Ok(assignments);
    }
}
