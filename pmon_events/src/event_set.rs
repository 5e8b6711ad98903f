// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use pmon_types::PrivLevel;
use pmon_types::RegSet;
use pmon_types::SamplingRate;
use pmon_types::SetFlags;
use pmon_types::PMON_MAX_REGS;

/// A user-requested hardware counter specification.
/// Immutable once parsed; owned by its [`EventSetSetup`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    name: String,
    unit_masks: Vec<String>,
    priv_levels: PrivLevel,
}

impl Event {
    /// Creates a new event specification.
    pub fn new(
        name: impl Into<String>,
        unit_masks: Vec<String>,
        priv_levels: PrivLevel,
    ) -> Event {
        return Event {
            name: name.into(),
            unit_masks,
            priv_levels,
        };
    }

    /// Symbolic event code, e.g. "cpu_cycles".
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requested unit masks, possibly empty.
    pub fn unit_masks(&self) -> &[String] {
        &self.unit_masks
    }

    /// Requested privilege levels.
    pub const fn priv_levels(&self) -> PrivLevel {
        self.priv_levels
    }
}

/// The physical registers the PMU model assigned to one event:
/// the data register holding the count and its control register.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterAssignment {
    /// Data (count) register number.
    pub pmd: u16,

    /// Control register number.
    pub pmc: u16,
}

/// One auxiliary register in a sample body: its register number, its byte
/// position in the body (offset × 8), and the owning event index when the
/// register is itself an overflow-period counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevPmd {
    /// Auxiliary register number.
    pub reg: u16,

    /// 0-based position of this register's value in the sample body.
    pub offset: u16,

    /// Event index owning `reg`, if `reg` is a period-bearing counter.
    pub event: Option<usize>,
}

/// Reverse-sampling-PMD table entry for one overflow source: which event
/// the overflow belongs to and, in emission order, the auxiliary registers
/// present in its sample body.
///
/// The body-offset -> register mapping depends only on which PMD
/// overflowed, never on the individual sample.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevEntry {
    /// Index of the event whose counter overflowed.
    pub event: usize,

    /// Auxiliary registers in body order; offsets are contiguous 0..N-1.
    pub pmds: Vec<RevPmd>,
}

/// One logical group of events scheduled together.
///
/// Insertion order of events is significant: it fixes the event index used
/// to map register numbers back to events when decoding overflow samples.
/// The setup is mutated during the prepare phase (which adds required PMDs
/// and builds the reverse-sampling table) and read-only afterwards; share
/// it across monitored entities with `alloc::sync::Arc`.
#[derive(Clone, Debug)]
pub struct EventSetSetup {
    set_id: u16,
    flags: SetFlags,
    events: Vec<Event>,
    rates: Vec<SamplingRate>,

    // Per-event sets; same length as `events`. `smpl_pmds` starts as the
    // user-specified extra PMDs and is grown by the prepare phase.
    pub(crate) smpl_pmds: Vec<RegSet>,
    pub(crate) reset_pmds: Vec<RegSet>,

    pub(crate) common_smpl_pmds: RegSet,
    pub(crate) common_reset_pmds: RegSet,

    pub(crate) assignments: Vec<CounterAssignment>,
    pub(crate) rev_smpl_pmds: Vec<Option<RevEntry>>,
    pub(crate) eff_reset_pmds: Vec<RegSet>,
    pub(crate) pmd_flags: Vec<pmon_types::PmdFlags>,
    pub(crate) max_pmds_per_sample: usize,
}

impl EventSetSetup {
    /// Creates a new setup for the given events. `rates`, `extra_smpl_pmds`
    /// and `explicit_reset_pmds` must have the same length as `events`.
    pub fn new(
        set_id: u16,
        flags: SetFlags,
        events: Vec<Event>,
        rates: Vec<SamplingRate>,
        extra_smpl_pmds: Vec<RegSet>,
        explicit_reset_pmds: Vec<RegSet>,
    ) -> EventSetSetup {
        let n = events.len();
        debug_assert!(rates.len() == n);
        debug_assert!(extra_smpl_pmds.len() == n);
        debug_assert!(explicit_reset_pmds.len() == n);
        return EventSetSetup {
            set_id,
            flags,
            events,
            rates,
            smpl_pmds: extra_smpl_pmds,
            reset_pmds: explicit_reset_pmds,
            common_smpl_pmds: RegSet::EMPTY,
            common_reset_pmds: RegSet::EMPTY,
            assignments: Vec::new(),
            rev_smpl_pmds: vec![None; PMON_MAX_REGS],
            eff_reset_pmds: vec![RegSet::EMPTY; n],
            pmd_flags: vec![pmon_types::PmdFlags::None; n],
            max_pmds_per_sample: 0,
        };
    }

    /// Logical id of this set.
    pub const fn set_id(&self) -> u16 {
        self.set_id
    }

    /// Set-level flags.
    pub const fn flags(&self) -> SetFlags {
        self.flags
    }

    /// The events in insertion order (index = event identity).
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Per-event sampling-period descriptors.
    pub fn rates(&self) -> &[SamplingRate] {
        &self.rates
    }

    /// Per-event sampling-PMD sets. Before the prepare phase these hold the
    /// user-specified extra PMDs; afterwards they also contain the event's
    /// own PMD and the PMDs of period counters seen earlier in the set.
    pub fn smpl_pmds(&self) -> &[RegSet] {
        &self.smpl_pmds
    }

    /// PMDs captured in every sample regardless of which counter overflowed.
    pub const fn common_smpl_pmds(&self) -> &RegSet {
        &self.common_smpl_pmds
    }

    /// PMDs systematically reset on every overflow.
    pub const fn common_reset_pmds(&self) -> &RegSet {
        &self.common_reset_pmds
    }

    /// Adds a PMD to the common-sampling set. Used by model prepare hooks
    /// to contribute required registers before the prepare phase runs.
    pub fn add_common_smpl_pmd(&mut self, r: u16) {
        self.common_smpl_pmds.set(r);
    }

    /// Adds a PMD to the common-reset set.
    pub fn add_common_reset_pmd(&mut self, r: u16) {
        self.common_reset_pmds.set(r);
    }

    /// Physical register assignments, one per event, set by the PMU model.
    pub fn assignments(&self) -> &[CounterAssignment] {
        &self.assignments
    }

    /// Records the model's counter assignments. One per event.
    pub fn set_assignments(&mut self, assignments: Vec<CounterAssignment>) {
        debug_assert!(assignments.len() == self.events.len());
        self.assignments = assignments;
    }

    /// Looks up the reverse-sampling-PMD table by overflowed register
    /// number. Returns `None` if the register is not an overflow source.
    pub fn rev_entry(&self, overflowed_pmd: u16) -> Option<&RevEntry> {
        return self.rev_smpl_pmds.get(overflowed_pmd as usize)?.as_ref();
    }

    /// The largest number of auxiliary PMDs across all overflow sources.
    /// Sizes the largest possible sample entry.
    pub const fn max_pmds_per_sample(&self) -> usize {
        self.max_pmds_per_sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn new_setup_is_unprepared() {
        let setup = EventSetSetup::new(
            0,
            SetFlags::None,
            vec![Event::new("cpu_cycles", vec![], PrivLevel::All)],
            vec![SamplingRate::UNSET],
            vec![RegSet::EMPTY],
            vec![RegSet::EMPTY],
        );

        assert_eq!(1, setup.events().len());
        assert_eq!("cpu_cycles", setup.events()[0].name());
        assert!(setup.common_smpl_pmds().is_empty());
        assert_eq!(0, setup.max_pmds_per_sample());
        assert!(setup.rev_entry(4).is_none());
    }
}
