// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use pmon_decode::ReduceOpts;
use pmon_events::PrepareOpts;
use pmon_types::RegSet;

/// Immutable session configuration, built by the front end and threaded
/// through every core call. No global state.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Merge samples from all monitored entities into one profile
    /// (pid/tid zeroed in profile keys).
    pub aggregate: bool,

    /// Fuse profile buckets per function instead of per address.
    pub per_function: bool,

    /// Emit at most this many profile buckets; 0 means no limit.
    pub show_top: usize,

    /// Stop emitting buckets past this cumulative percentage.
    pub cum_threshold: f64,

    /// Let overflowing counters saturate instead of notifying.
    pub saturate: bool,

    /// Reset all common sampling PMDs on each overflow when the event has
    /// no explicit reset list.
    pub reset_non_smpl: bool,

    /// User-specified PMDs captured in every sample.
    pub extra_smpl_pmds: RegSet,

    /// Requested sampling-buffer capacity, in entries.
    pub buffer_entries: u64,

    /// Locked-memory budget for one sampling buffer, in bytes.
    pub buffer_budget: usize,

    /// Event-set switch timeout when multiplexing, in milliseconds.
    pub switch_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        return SessionConfig {
            aggregate: false,
            per_function: false,
            show_top: 0,
            cum_threshold: 100.0,
            saturate: false,
            reset_non_smpl: false,
            extra_smpl_pmds: RegSet::EMPTY,
            buffer_entries: 2048,
            buffer_budget: 512 * 1024,
            switch_timeout_ms: 1000,
        };
    }
}

impl SessionConfig {
    /// The prepare-phase options this configuration implies.
    pub const fn prepare_opts(&self) -> PrepareOpts {
        return PrepareOpts {
            saturate: self.saturate,
            extra_smpl_pmds: self.extra_smpl_pmds,
            reset_non_smpl: self.reset_non_smpl,
        };
    }

    /// The profile-reduction options this configuration implies.
    pub const fn reduce_opts(&self) -> ReduceOpts {
        return ReduceOpts {
            per_function: self.per_function,
            show_top: self.show_top,
            cum_threshold: self.cum_threshold,
        };
    }
}
