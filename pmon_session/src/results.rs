// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.
// Final counter collection across multiplexed event sets.

use std::sync::Arc;

use pmon_events::EventSetSetup;
use pmon_events::PmdValue;
use pmon_events::RegisterAccess;

use crate::error::SessionError;

/// Runtime state of one event set within a multiplexed group: how long
/// it was scheduled on the hardware and the raw values at the previous
/// incremental read.
#[derive(Clone, Debug)]
pub struct SetRuntime {
    /// The prepared set.
    pub setup: Arc<EventSetSetup>,

    /// Total time this set was actively counting, in nanoseconds.
    pub duration_ns: u64,

    last_raw: Vec<u64>,
}

impl SetRuntime {
    /// Creates runtime state for one set with zeroed read history.
    pub fn new(setup: Arc<EventSetSetup>) -> SetRuntime {
        let n = setup.assignments().len();
        return SetRuntime {
            setup,
            duration_ns: 0,
            last_raw: vec![0; n],
        };
    }
}

fn scale(value: u64, total_ns: u64, set_ns: u64) -> u64 {
    return (value as f64 * total_ns as f64 / set_ns as f64).round() as u64;
}

fn read_raw(
    access: &mut dyn RegisterAccess,
    setup: &EventSetSetup,
) -> Result<Vec<u64>, SessionError> {
    let mut regs: Vec<PmdValue> = setup
        .assignments()
        .iter()
        .map(|a| PmdValue {
            reg: a.pmd,
            value: 0,
        })
        .collect();
    access.read_pmds(&mut regs)?;
    return Ok(regs.into_iter().map(|r| r.value).collect());
}

fn scale_set(counts: &mut [u64], set_id: u16, total_ns: u64, set_ns: u64, n_sets: usize) {
    if n_sets < 2 {
        // A single set runs the whole session; its counts are exact.
        return;
    }
    if set_ns == 0 {
        tracing::warn!(
            set = set_id,
            "event set was never scheduled; counts forced to zero \
             (consider a smaller switch timeout)"
        );
        for count in counts.iter_mut() {
            *count = 0;
        }
        return;
    }
    for count in counts.iter_mut() {
        *count = scale(*count, total_ns, set_ns);
    }
}

/// Reads the final counter values of every set in a multiplexed group.
///
/// With more than one set, each set only counted while scheduled, so its
/// values are extrapolated to the whole session:
/// `round(value * total_duration / set_duration)`. A single set is
/// returned exactly as read. A set that was never scheduled yields zeros
/// and a diagnostic rather than an error.
pub fn read_results(
    access: &mut dyn RegisterAccess,
    sets: &[SetRuntime],
) -> Result<Vec<Vec<u64>>, SessionError> {
    let total_ns: u64 = sets.iter().map(|s| s.duration_ns).sum();
    let mut results = Vec::with_capacity(sets.len());
    for set in sets {
        let mut counts = read_raw(access, &set.setup)?;
        scale_set(
            &mut counts,
            set.setup.set_id(),
            total_ns,
            set.duration_ns,
            sets.len(),
        );
        results.push(counts);
    }
    return Ok(results);
}

/// Like [`read_results`] but returns the change since the previous call,
/// scaling only the deltas. Used for periodic interval printing.
pub fn read_incremental(
    access: &mut dyn RegisterAccess,
    sets: &mut [SetRuntime],
) -> Result<Vec<Vec<u64>>, SessionError> {
    let total_ns: u64 = sets.iter().map(|s| s.duration_ns).sum();
    let n_sets = sets.len();
    let mut results = Vec::with_capacity(n_sets);
    for set in sets.iter_mut() {
        let raw = read_raw(access, &set.setup)?;
        let mut counts: Vec<u64> = raw
            .iter()
            .zip(&set.last_raw)
            .map(|(now, before)| now.wrapping_sub(*before))
            .collect();
        set.last_raw = raw;
        scale_set(
            &mut counts,
            set.setup.set_id(),
            total_ns,
            set.duration_ns,
            n_sets,
        );
        results.push(counts);
    }
    return Ok(results);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmon_events::prepare_event_set;
    use pmon_events::AccessError;
    use pmon_events::Event;
    use pmon_events::GenericModel;
    use pmon_events::PmcImage;
    use pmon_events::PmdImage;
    use pmon_events::PrepareOpts;
    use pmon_types::PrivLevel;
    use pmon_types::RegSet;
    use pmon_types::SamplingRate;
    use pmon_types::SetFlags;

    /// Serves fixed counter values, keyed by register number.
    struct FixedCounters {
        values: Vec<(u16, u64)>,
    }

    impl RegisterAccess for FixedCounters {
        fn write_pmcs(&mut self, _images: &[PmcImage]) -> Result<(), AccessError> {
            return Ok(());
        }

        fn write_pmds(&mut self, _images: &[PmdImage]) -> Result<(), AccessError> {
            return Ok(());
        }

        fn read_pmds(&mut self, regs: &mut [PmdValue]) -> Result<(), AccessError> {
            for reg in regs.iter_mut() {
                reg.value = self
                    .values
                    .iter()
                    .find(|(r, _)| *r == reg.reg)
                    .map(|(_, v)| *v)
                    .unwrap_or(0);
            }
            return Ok(());
        }
    }

    fn one_event_set(set_id: u16, event: &str, code: u64, pmd: u16) -> Arc<EventSetSetup> {
        let model = GenericModel::new(
            "test",
            4,
            pmd,
            0,
            vec![(event.to_string(), code)],
        );
        let mut setup = EventSetSetup::new(
            set_id,
            SetFlags::None,
            vec![Event::new(event, vec![], PrivLevel::All)],
            vec![SamplingRate::UNSET],
            vec![RegSet::EMPTY],
            vec![RegSet::EMPTY],
        );
        prepare_event_set(&mut setup, &PrepareOpts::default(), &model).unwrap();
        return Arc::new(setup);
    }

    /// Two sets scheduled 600ms and 400ms: counts extrapolate by the
    /// inverse of each set's share of the total duration.
    #[test]
    fn multiplexed_duration_scaling() {
        let mut sets = vec![
            SetRuntime::new(one_event_set(0, "cpu_cycles", 0x3c, 4)),
            SetRuntime::new(one_event_set(1, "inst_retired", 0xc0, 4)),
        ];
        sets[0].duration_ns = 600_000_000;
        sets[1].duration_ns = 400_000_000;

        let mut access = FixedCounters {
            values: vec![(4, 60)],
        };
        let results = read_results(&mut access, &sets).unwrap();
        // 60 * 1000/600 = 100; 60 * 1000/400 = 150.
        assert_eq!(vec![vec![100], vec![150]], results);
    }

    /// A single set is returned bit-exact, no scaling applied.
    #[test]
    fn single_set_is_exact() {
        let mut sets = vec![SetRuntime::new(one_event_set(0, "cpu_cycles", 0x3c, 4))];
        sets[0].duration_ns = 0; // Duration is irrelevant for one set.

        let mut access = FixedCounters {
            values: vec![(4, u64::MAX - 3)],
        };
        let results = read_results(&mut access, &sets).unwrap();
        assert_eq!(vec![vec![u64::MAX - 3]], results);
    }

    #[test]
    fn never_scheduled_set_reads_zero() {
        let mut sets = vec![
            SetRuntime::new(one_event_set(0, "cpu_cycles", 0x3c, 4)),
            SetRuntime::new(one_event_set(1, "inst_retired", 0xc0, 4)),
        ];
        sets[0].duration_ns = 1_000_000_000;
        sets[1].duration_ns = 0;

        let mut access = FixedCounters {
            values: vec![(4, 500)],
        };
        let results = read_results(&mut access, &sets).unwrap();
        assert_eq!(vec![500], results[0]);
        assert_eq!(vec![0], results[1]);
    }

    #[test]
    fn incremental_deltas() {
        let mut sets = vec![SetRuntime::new(one_event_set(0, "cpu_cycles", 0x3c, 4))];

        let mut access = FixedCounters {
            values: vec![(4, 100)],
        };
        assert_eq!(
            vec![vec![100]],
            read_incremental(&mut access, &mut sets).unwrap()
        );

        access.values = vec![(4, 175)];
        assert_eq!(
            vec![vec![75]],
            read_incremental(&mut access, &mut sets).unwrap()
        );
    }
}
