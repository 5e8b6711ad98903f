// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use core::fmt;

use alloc::vec::Vec;

use pmon_types::PmdFlags;
use pmon_types::RegSet;
use pmon_types::SetFlags;

use crate::event_set::EventSetSetup;
use crate::event_set::RevEntry;
use crate::event_set::RevPmd;
use crate::model::PmuModel;

/// Errors detected while preparing an event set, before any hardware
/// register is touched. All of these are fatal to the whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrepareError {
    /// More counters requested than the hardware provides.
    TooManyCounters {
        /// Number of events in the set.
        requested: usize,
        /// Number of physical counters the model provides.
        available: usize,
    },

    /// An event name is not known to the selected PMU model.
    UnknownEvent {
        /// Index of the offending event.
        event: usize,
    },

    /// A randomization mask was combined with "saturate instead of
    /// notify". The two are mutually exclusive: a saturating counter
    /// never reloads, so there is no reset value to randomize.
    RandomizeWithSaturate {
        /// Index of the offending event.
        event: usize,
    },

    /// The model-specific prepare hook failed.
    ModelFailure,
}

impl fmt::Display for PrepareError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrepareError::TooManyCounters {
                requested,
                available,
            } => {
                return write!(
                    f,
                    "too many counters: {} requested, {} available",
                    requested, available
                );
            }
            PrepareError::UnknownEvent { event } => {
                return write!(f, "event {} unknown to the PMU model", event);
            }
            PrepareError::RandomizeWithSaturate { event } => {
                return write!(
                    f,
                    "event {}: randomization cannot be combined with saturation",
                    event
                );
            }
            PrepareError::ModelFailure => {
                return f.write_str("model-specific register preparation failed");
            }
        }
    }
}

/// Session-level options consumed by the prepare phase.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrepareOpts {
    /// Let overflowing counters saturate instead of notifying.
    pub saturate: bool,

    /// User-specified PMDs captured in every sample.
    pub extra_smpl_pmds: RegSet,

    /// Reset all common (non-trigger) sampling PMDs on each overflow when
    /// the event carries no explicit reset list.
    pub reset_non_smpl: bool,
}

/// Decides, for each hardware counter in the set, which auxiliary
/// registers accompany its overflow samples, and builds the
/// reverse-sampling-PMD table used to decode them.
///
/// Requires `setup.assignments()` to be populated (see
/// [`prepare_event_set`]). Mutates the setup: per-event sampling-PMD sets
/// grow, the common sets are merged, the reverse table and per-counter
/// reset sets are built, and `max_pmds_per_sample` is computed.
///
/// The emission order for each overflow source is fixed and must match
/// the order the kernel uses when building sample bodies: first the PMDs
/// of overflow-period counters seen earlier in the set (ascending
/// register order), then the remaining auxiliary PMDs (ascending),
/// excluding the counter's own PMD unless the set carries
/// [`SetFlags::SmplAll`].
pub fn prepare_sampling_pmds(
    setup: &mut EventSetSetup,
    opts: &PrepareOpts,
    model: &dyn PmuModel,
) -> Result<(), PrepareError> {
    let n = setup.events().len();
    debug_assert!(setup.assignments.len() == n);

    // Step 1: classify counters. A counter with a sampling period is an
    // overflow trigger; a counter without one is captured in every sample
    // as a static companion instead.
    for i in 0..n {
        let rate = setup.rates()[i];
        if rate.has_value() {
            let mut flags = PmdFlags::None;
            if rate.has_mask() {
                if opts.saturate {
                    return Err(PrepareError::RandomizeWithSaturate { event: i });
                }
                flags = flags.or(PmdFlags::Random);
            }
            if !opts.saturate {
                flags = flags.or(PmdFlags::Notify);
            }
            setup.pmd_flags[i] = flags;
        } else {
            let pmd = setup.assignments[i].pmd;
            setup.common_smpl_pmds.set(pmd);
        }
    }

    // Step 2: merge model-required and user-specified extra PMDs into the
    // common-sampling set.
    let required = model.required_smpl_pmds(setup);
    setup.common_smpl_pmds.or(&required);
    setup.common_smpl_pmds.or(&opts.extra_smpl_pmds);

    // Step 3: build each trigger counter's reverse-table entry.
    //
    // `explicit` accumulates the PMDs of trigger counters already seen, in
    // event order; `explicit_owners` holds their event indexes sorted by
    // register number so an emitted register resolves to its owner by its
    // position in the set.
    let mut explicit = RegSet::new();
    let mut explicit_owners: Vec<(u16, usize)> = Vec::new();
    let include_own = setup.flags().has_flag(SetFlags::SmplAll);
    let mut max_pmds = 0usize;

    for i in 0..n {
        if !setup.rates()[i].has_value() {
            continue;
        }
        let own = setup.assignments[i].pmd;

        // The per-event sampling set grows to include the counter's own
        // PMD and the trigger PMDs seen so far; sample bodies are counted
        // against this post-prepare union.
        setup.smpl_pmds[i].set(own);
        setup.smpl_pmds[i].or(&explicit);

        let mut eff = setup.smpl_pmds[i];
        eff.or(&setup.common_smpl_pmds);

        let mut pmds: Vec<RevPmd> = Vec::new();
        let mut offset: u16 = 0;

        // First pass: trigger counters seen earlier, ascending register
        // order, owner resolved by position among the accumulated set.
        for (pos, r) in explicit.iter().enumerate() {
            if r == own || !eff.isset(r) {
                continue;
            }
            pmds.push(RevPmd {
                reg: r,
                offset,
                event: Some(explicit_owners[pos].1),
            });
            offset += 1;
        }

        // Second pass: remaining auxiliary registers, ascending. The own
        // PMD is skipped unless the set asks for it.
        for r in eff.iter() {
            if explicit.isset(r) {
                continue;
            }
            if r == own && !include_own {
                continue;
            }
            let event = if r == own { Some(i) } else { None };
            pmds.push(RevPmd {
                reg: r,
                offset,
                event,
            });
            offset += 1;
        }

        if pmds.len() > max_pmds {
            max_pmds = pmds.len();
        }
        setup.rev_smpl_pmds[own as usize] = Some(RevEntry { event: i, pmds });

        explicit.set(own);
        let at = explicit_owners
            .iter()
            .position(|&(reg, _)| reg > own)
            .unwrap_or(explicit_owners.len());
        explicit_owners.insert(at, (own, i));
    }

    // Step 4: per-counter reset sets.
    for i in 0..n {
        let mut reset = setup.common_reset_pmds;
        if !setup.reset_pmds[i].is_empty() {
            reset.or(&setup.reset_pmds[i]);
        } else if opts.reset_non_smpl {
            reset.or(&setup.common_smpl_pmds);
        }
        setup.eff_reset_pmds[i] = reset;
    }

    // Step 5: the largest sample body, which sizes the buffer's maximum
    // entry.
    setup.max_pmds_per_sample = max_pmds;
    return Ok(());
}

/// Assigns physical counters and runs the sampling-PMD preparation in one
/// step. This is the normal entry point for a freshly-built setup.
pub fn prepare_event_set(
    setup: &mut EventSetSetup,
    opts: &PrepareOpts,
    model: &dyn PmuModel,
) -> Result<(), PrepareError> {
    let assignments = model.assign_counters(setup.events())?;
    setup.set_assignments(assignments);
    return prepare_sampling_pmds(setup, opts, model);
}

/// Concrete PMD register value to write to hardware, per monitored entity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PmdImage {
    /// Register number.
    pub reg: u16,

    /// Owning logical set id.
    pub set_id: u16,

    /// Notify/randomize flags.
    pub flags: PmdFlags,

    /// Initial counter value.
    pub value: u64,

    /// Value reloaded after a notified overflow.
    pub long_reset: u64,

    /// Value reloaded after a non-notified overflow.
    pub short_reset: u64,

    /// Randomization mask applied to the reset value.
    pub random_mask: u64,

    /// Randomization seed.
    pub random_seed: u32,

    /// PMDs captured in this counter's sample bodies.
    pub smpl_pmds: RegSet,

    /// PMDs reset when this counter overflows.
    pub reset_pmds: RegSet,
}

/// Concrete PMC register value to write to hardware, per monitored entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PmcImage {
    /// Register number.
    pub reg: u16,

    /// Owning logical set id.
    pub set_id: u16,

    /// Control value selecting the event.
    pub value: u64,
}

/// Builds the master PMD images for one monitored entity from a prepared
/// setup. The initial value of a trigger counter is the two's-complement
/// negation of its period, so the counter overflows after `period`
/// occurrences.
pub fn prepare_pmd_registers(setup: &EventSetSetup) -> Vec<PmdImage> {
    let n = setup.events().len();
    debug_assert!(setup.assignments().len() == n);

    let mut images = Vec::with_capacity(n);
    for i in 0..n {
        let rate = setup.rates()[i];
        let value = if rate.has_value() {
            0u64.wrapping_sub(rate.value)
        } else {
            0
        };

        let mut smpl = setup.smpl_pmds[i];
        smpl.or(&setup.common_smpl_pmds);

        images.push(PmdImage {
            reg: setup.assignments()[i].pmd,
            set_id: setup.set_id(),
            flags: setup.pmd_flags[i],
            value,
            long_reset: value,
            short_reset: value,
            random_mask: if rate.has_mask() { rate.mask } else { 0 },
            random_seed: rate.seed,
            smpl_pmds: smpl,
            reset_pmds: setup.eff_reset_pmds[i],
        });
    }
    return images;
}

/// Builds the master PMC images for one monitored entity. Fails with
/// [`PrepareError::UnknownEvent`] if the model cannot encode an event.
pub fn prepare_pmc_registers(
    setup: &EventSetSetup,
    model: &dyn PmuModel,
) -> Result<Vec<PmcImage>, PrepareError> {
    let n = setup.events().len();
    debug_assert!(setup.assignments().len() == n);

    let mut images = Vec::with_capacity(n);
    for i in 0..n {
        let value = match model.encode_pmc(&setup.events()[i]) {
            Some(value) => value,
            None => return Err(PrepareError::UnknownEvent { event: i }),
        };
        images.push(PmcImage {
            reg: setup.assignments()[i].pmc,
            set_id: setup.set_id(),
            value,
        });
    }
    return Ok(images);
}
