// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.
// Per-entity session state: buffer sizing and snapshot processing.

use std::sync::Arc;

use pmon_decode::ByteReader;
use pmon_decode::ProfileKey;
use pmon_decode::ProfileTable;
use pmon_decode::SampleDecoder;
use pmon_events::EventSetSetup;
use pmon_types::BufferHeader;
use pmon_types::EntryHeader;

use crate::error::SessionError;

/// The resolved size of one entity's sampling buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferPlan {
    /// Entries the buffer will hold.
    pub entries: u64,

    /// Bytes of one entry (header plus auxiliary values) for this set.
    pub entry_size: usize,

    /// Total buffer allocation in bytes, header included.
    pub bytes: usize,
}

/// Sizes one sampling buffer for a prepared set.
///
/// The request is shrunk to fit `budget` (locked kernel memory is a
/// scarce resource, so over-asking degrades rather than fails); a budget
/// that cannot hold even one entry is an error.
pub fn plan_sampling_buffer(
    setup: &EventSetSetup,
    requested_entries: u64,
    budget: usize,
) -> Result<BufferPlan, SessionError> {
    let entry_size = EntryHeader::SIZE + 8 * setup.max_pmds_per_sample();
    let capacity = budget.saturating_sub(BufferHeader::SIZE) / entry_size;
    if capacity == 0 {
        return Err(SessionError::BufferTooSmall { budget, entry_size });
    }

    let mut entries = requested_entries;
    if entries > capacity as u64 {
        tracing::warn!(
            requested = requested_entries,
            granted = capacity as u64,
            budget,
            "sampling buffer shrunk to fit the locked-memory budget"
        );
        entries = capacity as u64;
    }

    return Ok(BufferPlan {
        entries,
        entry_size,
        bytes: BufferHeader::SIZE + entries as usize * entry_size,
    });
}

/// One monitored entity: its prepared set, decode cursor, and buffer
/// plan. Owned by a single worker thread.
#[derive(Debug)]
pub struct EntitySession {
    setup: Arc<EventSetSetup>,
    decoder: SampleDecoder,
    plan: BufferPlan,
    samples: u64,
}

impl EntitySession {
    /// Creates the session state for one entity.
    pub fn new(
        setup: Arc<EventSetSetup>,
        reader: ByteReader,
        requested_entries: u64,
        budget: usize,
    ) -> Result<EntitySession, SessionError> {
        let plan = plan_sampling_buffer(&setup, requested_entries, budget)?;
        let decoder = SampleDecoder::new(Arc::clone(&setup), reader);
        return Ok(EntitySession {
            setup,
            decoder,
            plan,
            samples: 0,
        });
    }

    /// The prepared set this entity monitors.
    pub const fn setup(&self) -> &Arc<EventSetSetup> {
        &self.setup
    }

    /// The resolved buffer size.
    pub const fn plan(&self) -> &BufferPlan {
        &self.plan
    }

    /// Samples recorded so far.
    pub const fn samples(&self) -> u64 {
        self.samples
    }

    /// Decodes every new sample in `snapshot` into `table`, returning the
    /// number recorded. When `aggregate` is set, samples lose their
    /// pid/tid so all entities land in the same buckets.
    pub fn process_snapshot(
        &mut self,
        snapshot: &[u8],
        table: &mut ProfileTable,
        aggregate: bool,
    ) -> Result<u64, SessionError> {
        let mut recorded = 0;
        let mut walk = self.decoder.begin(snapshot)?;
        while let Some(sample) = walk.next_sample()? {
            let hdr = &sample.header;
            let key = ProfileKey {
                addr: hdr.ip,
                pid: if aggregate { 0 } else { hdr.pid },
                tid: if aggregate { 0 } else { hdr.tid },
                sym_version: 0,
            };
            table.record(key, sample.event);
            recorded += 1;
        }
        self.samples += recorded;
        return Ok(recorded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmon_events::prepare_event_set;
    use pmon_events::Event;
    use pmon_events::GenericModel;
    use pmon_events::PrepareOpts;
    use pmon_types::PrivLevel;
    use pmon_types::RateFlags;
    use pmon_types::RegSet;
    use pmon_types::SamplingRate;
    use pmon_types::SetFlags;

    const HOST_IS_BIG_ENDIAN: bool = cfg!(target_endian = "big");

    fn prepared_setup() -> Arc<EventSetSetup> {
        let model = GenericModel::new(
            "test",
            4,
            4,
            0,
            vec![
                ("cpu_cycles".to_string(), 0x3c),
                ("inst_retired".to_string(), 0xc0),
            ],
        );
        let mut setup = EventSetSetup::new(
            0,
            SetFlags::None,
            vec![
                Event::new("cpu_cycles", vec![], PrivLevel::All),
                Event::new("inst_retired", vec![], PrivLevel::All),
            ],
            vec![
                SamplingRate {
                    value: 100_000,
                    mask: 0,
                    seed: 0,
                    flags: RateFlags::ValueSet,
                },
                SamplingRate::UNSET,
            ],
            vec![RegSet::EMPTY; 2],
            vec![RegSet::EMPTY; 2],
        );
        prepare_event_set(&mut setup, &PrepareOpts::default(), &model).unwrap();
        return Arc::new(setup);
    }

    #[test]
    fn plan_honors_request_within_budget() {
        let setup = prepared_setup();
        // One aux PMD per sample: entry is 48 + 8 bytes.
        let plan = plan_sampling_buffer(&setup, 10, 1 << 20).unwrap();
        assert_eq!(10, plan.entries);
        assert_eq!(EntryHeader::SIZE + 8, plan.entry_size);
        assert_eq!(BufferHeader::SIZE + 10 * plan.entry_size, plan.bytes);
    }

    #[test]
    fn plan_shrinks_to_budget() {
        let setup = prepared_setup();
        let entry_size = EntryHeader::SIZE + 8;
        let budget = BufferHeader::SIZE + 3 * entry_size + entry_size / 2;
        let plan = plan_sampling_buffer(&setup, 1_000_000, budget).unwrap();
        assert_eq!(3, plan.entries);
        assert!(plan.bytes <= budget);
    }

    #[test]
    fn plan_rejects_hopeless_budget() {
        let setup = prepared_setup();
        assert!(matches!(
            plan_sampling_buffer(&setup, 1, BufferHeader::SIZE + 8),
            Err(SessionError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn snapshot_records_into_profile() {
        let setup = prepared_setup();
        let mut session = EntitySession::new(
            Arc::clone(&setup),
            ByteReader::new(HOST_IS_BIG_ENDIAN),
            64,
            1 << 20,
        )
        .unwrap();

        let mut buf = Vec::new();
        let hdr = BufferHeader {
            overflow_count: 1,
            entry_count: 2,
            format_version: BufferHeader::FORMAT_VERSION,
            reserved: 0,
        };
        let bytes: [u8; BufferHeader::SIZE] = unsafe { core::mem::transmute(hdr) };
        buf.extend_from_slice(&bytes);
        for ip in [0x4000u64, 0x4000u64] {
            let entry = EntryHeader {
                timestamp: 1,
                ip,
                last_reset_value: 0,
                pid: 9,
                tid: 9,
                cpu: 0,
                set_id: 0,
                overflowed_pmd: 4,
                reserved: [0; 6],
            };
            let bytes: [u8; EntryHeader::SIZE] = unsafe { core::mem::transmute(entry) };
            buf.extend_from_slice(&bytes);
            buf.extend_from_slice(&7u64.to_ne_bytes());
        }

        let mut table = ProfileTable::new(2, 64);
        assert_eq!(2, session.process_snapshot(&buf, &mut table, false).unwrap());
        assert_eq!(1, table.len());
        assert_eq!(2, session.samples());

        // Unchanged snapshot decodes to nothing new.
        assert_eq!(0, session.process_snapshot(&buf, &mut table, false).unwrap());
    }
}
