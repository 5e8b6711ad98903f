// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.
// Per-instruction profile accumulation and reduction.

use core::mem;

use alloc::vec;
use alloc::vec::Vec;

use crate::symbols::SymbolInfo;
use crate::symbols::SymbolResolver;
use crate::symbols::UNKNOWN_COOKIE;

/// Identity of one profile bucket. `pid`/`tid` are zero when results are
/// aggregated across tasks; `sym_version` distinguishes samples taken
/// against different symbol-table generations of the same address space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ProfileKey {
    /// Sampled instruction address.
    pub addr: u64,

    /// Process id, or 0 when aggregated.
    pub pid: u32,

    /// Thread id, or 0 when aggregated.
    pub tid: u32,

    /// Symbol-table generation the address resolves against.
    pub sym_version: u32,
}

/// One bucket of the profile table: per-event sample counts for one
/// (address, pid, tid, symbol-table-version) identity, plus symbol
/// information filled in by the reduce pass.
#[derive(Clone, Debug)]
pub struct ProfileBucket {
    /// The bucket identity.
    pub key: ProfileKey,

    /// Per-event-in-set sample counts.
    pub counts: Vec<u64>,

    /// Resolved symbol, after symbolization.
    pub symbol: Option<SymbolInfo>,

    /// True once this bucket has been fused into an earlier one; voided
    /// buckets stay allocated until table teardown but are excluded from
    /// output.
    pub void: bool,

    access: u64,
    in_use: bool,
    next: Option<usize>,
}

impl ProfileBucket {
    /// The bucket's symbol cookie, or [`UNKNOWN_COOKIE`].
    pub fn cookie(&self) -> u64 {
        return match &self.symbol {
            Some(symbol) => symbol.cookie,
            None => UNKNOWN_COOKIE,
        };
    }

    fn module(&self) -> Option<&str> {
        return self.symbol.as_ref().map(|s| s.module.as_str());
    }
}

/// Reduction policy for [`ProfileTable::reduce_and_sort`].
#[derive(Clone, Copy, Debug)]
pub struct ReduceOpts {
    /// Fuse buckets that share a symbol (per-function granularity)
    /// instead of buckets that share an exact address.
    pub per_function: bool,

    /// Emit at most this many buckets; 0 means no limit.
    pub show_top: usize,

    /// Stop emitting once the cumulative percentage of the first event's
    /// total exceeds this value. 100.0 means no early stop.
    pub cum_threshold: f64,
}

impl Default for ReduceOpts {
    fn default() -> ReduceOpts {
        return ReduceOpts {
            per_function: false,
            show_top: 0,
            cum_threshold: 100.0,
        };
    }
}

/// Percentage of `count` against `total`, 0.0 when `total` is zero.
pub fn percent(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    return count as f64 * 100.0 / total as f64;
}

fn hash_key(key: &ProfileKey) -> usize {
    let mut h = key.addr.wrapping_mul(0x9e37_79b9_7f4a_7c15);
    h ^= (((key.pid as u64) << 32) | key.tid as u64).wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= key.sym_version as u64;
    h ^= h >> 33;
    return h as usize;
}

/// Open-chained hash table of profile buckets with a bounded entry budget.
///
/// When full, the least-recently-accessed bucket is evicted to make room,
/// which bounds memory for long-running system-wide sessions at the cost
/// of dropping the coldest locations.
#[derive(Clone, Debug)]
pub struct ProfileTable {
    heads: Vec<Option<usize>>,
    slots: Vec<ProfileBucket>,
    free: Vec<usize>,
    max_entries: usize,
    n_events: usize,
    clock: u64,
}

impl ProfileTable {
    /// Creates a table for sets of `n_events` events, holding at most
    /// `max_entries` buckets.
    /// PRECONDITION: max_entries >= 1.
    pub fn new(n_events: usize, max_entries: usize) -> ProfileTable {
        debug_assert!(max_entries >= 1);
        let n_heads = max_entries.next_power_of_two();
        return ProfileTable {
            heads: vec![None; n_heads],
            slots: Vec::new(),
            free: Vec::new(),
            max_entries,
            n_events,
            clock: 0,
        };
    }

    /// Number of live (non-evicted) buckets.
    pub fn len(&self) -> usize {
        return self.slots.len() - self.free.len();
    }

    /// Returns true if the table holds no buckets.
    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// The bucket at an index returned by [`Self::reduce_and_sort`].
    pub fn bucket(&self, index: usize) -> &ProfileBucket {
        return &self.slots[index];
    }

    fn head_of(&self, key: &ProfileKey) -> usize {
        return hash_key(key) & (self.heads.len() - 1);
    }

    /// Finds the bucket for `key`, refreshing its access stamp.
    pub fn find(&mut self, key: &ProfileKey) -> Option<&mut ProfileBucket> {
        let head = self.head_of(key);
        let mut cursor = self.heads[head];
        while let Some(index) = cursor {
            if self.slots[index].key == *key {
                self.clock += 1;
                self.slots[index].access = self.clock;
                return Some(&mut self.slots[index]);
            }
            cursor = self.slots[index].next;
        }
        return None;
    }

    /// Records one sample for `key` attributed to event `event`,
    /// creating the bucket (counts all zero) on first access.
    pub fn record(&mut self, key: ProfileKey, event: usize) {
        self.record_add(key, event, 1);
    }

    /// Records `count` samples for `key` attributed to event `event`.
    pub fn record_add(&mut self, key: ProfileKey, event: usize, count: u64) {
        debug_assert!(event < self.n_events);
        if let Some(bucket) = self.find(&key) {
            bucket.counts[event] += count;
            return;
        }

        self.evict_one_if_full();
        self.clock += 1;
        let head = self.head_of(&key);
        let mut bucket = ProfileBucket {
            key,
            counts: vec![0; self.n_events],
            symbol: None,
            void: false,
            access: self.clock,
            in_use: true,
            next: self.heads[head],
        };
        bucket.counts[event] = count;

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = bucket;
                index
            }
            None => {
                self.slots.push(bucket);
                self.slots.len() - 1
            }
        };
        self.heads[head] = Some(index);
    }

    /// If the table is at its entry budget, evicts the bucket with the
    /// oldest access stamp. Returns true if a bucket was evicted.
    pub fn evict_one_if_full(&mut self) -> bool {
        if self.len() < self.max_entries {
            return false;
        }

        let mut victim = None;
        let mut oldest = u64::MAX;
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.in_use && slot.access < oldest {
                oldest = slot.access;
                victim = Some(index);
            }
        }

        let victim = match victim {
            Some(victim) => victim,
            None => return false,
        };
        self.unlink(victim);
        self.slots[victim].in_use = false;
        self.free.push(victim);
        return true;
    }

    fn unlink(&mut self, index: usize) {
        let head = self.head_of(&self.slots[index].key);
        let mut cursor = self.heads[head];
        let mut prev: Option<usize> = None;
        while let Some(at) = cursor {
            if at == index {
                match prev {
                    Some(prev) => self.slots[prev].next = self.slots[index].next,
                    None => self.heads[head] = self.slots[index].next,
                }
                return;
            }
            prev = Some(at);
            cursor = self.slots[at].next;
        }
        debug_assert!(false, "bucket not on its chain");
    }

    /// Per-event totals across all live, non-voided buckets.
    pub fn totals(&self) -> Vec<u64> {
        let mut totals = vec![0u64; self.n_events];
        for slot in &self.slots {
            if !slot.in_use || slot.void {
                continue;
            }
            for (total, count) in totals.iter_mut().zip(&slot.counts) {
                *total += count;
            }
        }
        return totals;
    }

    /// Symbolizes, fuses, sorts and truncates the table, returning the
    /// indexes of the buckets to emit, in output order.
    ///
    /// Fusing sums all per-event counts into the earlier bucket and voids
    /// the later one; totals are preserved. Sorting is by first-event
    /// count descending; equal counts are ordered by ascending address
    /// (the tie-break is otherwise unspecified by the histogram contract,
    /// so make it deterministic). Truncation applies `show_top` and the
    /// cumulative-percentage threshold, in that order.
    pub fn reduce_and_sort(
        &mut self,
        resolver: Option<&dyn SymbolResolver>,
        opts: &ReduceOpts,
    ) -> Vec<usize> {
        if let Some(resolver) = resolver {
            for slot in self.slots.iter_mut() {
                if slot.in_use && !slot.void && slot.symbol.is_none() {
                    slot.symbol = resolver.resolve(slot.key.addr, slot.key.sym_version);
                }
            }
        }

        let live: Vec<usize> = (0..self.slots.len())
            .filter(|&i| self.slots[i].in_use)
            .collect();

        // Fuse pass.
        for (pos, &i) in live.iter().enumerate() {
            if self.slots[i].void {
                continue;
            }
            for &j in &live[pos + 1..] {
                if self.slots[j].void || !self.fusable(i, j, opts.per_function) {
                    continue;
                }
                let taken = mem::take(&mut self.slots[j].counts);
                for (into, from) in self.slots[i].counts.iter_mut().zip(&taken) {
                    *into += from;
                }
                self.slots[j].counts = vec![0; self.n_events];
                self.slots[j].void = true;
            }
        }

        let mut order: Vec<usize> = live
            .into_iter()
            .filter(|&i| !self.slots[i].void)
            .collect();
        order.sort_by(|&a, &b| {
            let slots = &self.slots;
            return slots[b].counts[0]
                .cmp(&slots[a].counts[0])
                .then(slots[a].key.addr.cmp(&slots[b].key.addr));
        });

        // A threshold at or above 100% never stops: rounding can push the
        // running sum of valid shares past 100.0.
        let limit = if opts.cum_threshold < 100.0 {
            Some(opts.cum_threshold)
        } else {
            None
        };
        let total = self.totals().first().copied().unwrap_or(0);
        let mut out = Vec::new();
        let mut cum = 0.0f64;
        for index in order {
            if opts.show_top != 0 && out.len() >= opts.show_top {
                break;
            }
            cum += percent(self.slots[index].counts[0], total);
            if let Some(limit) = limit {
                if cum > limit {
                    break;
                }
            }
            out.push(index);
        }
        return out;
    }

    fn fusable(&self, i: usize, j: usize, per_function: bool) -> bool {
        let a = &self.slots[i];
        let b = &self.slots[j];
        if per_function {
            // Per-function: same module and symbol cookie, both known.
            return a.cookie() != UNKNOWN_COOKIE
                && a.cookie() == b.cookie()
                && a.module() == b.module();
        }
        // Per-address: same address, module and cookie.
        return a.key.addr == b.key.addr && a.cookie() == b.cookie() && a.module() == b.module();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    fn key(addr: u64, pid: u32, tid: u32) -> ProfileKey {
        return ProfileKey {
            addr,
            pid,
            tid,
            sym_version: 0,
        };
    }

    struct FixedResolver;

    impl SymbolResolver for FixedResolver {
        fn resolve(&self, addr: u64, _version: u32) -> Option<SymbolInfo> {
            // 0x1000..0x2000 is main, 0x2000..0x3000 is helper.
            if (0x1000..0x2000).contains(&addr) {
                return Some(SymbolInfo {
                    name: String::from("main"),
                    module: String::from("a.out"),
                    start: 0x1000,
                    end: 0x2000,
                    cookie: 1,
                });
            } else if (0x2000..0x3000).contains(&addr) {
                return Some(SymbolInfo {
                    name: String::from("helper"),
                    module: String::from("a.out"),
                    start: 0x2000,
                    end: 0x3000,
                    cookie: 2,
                });
            }
            return None;
        }
    }

    #[test]
    fn record_creates_and_increments() {
        let mut table = ProfileTable::new(2, 64);
        table.record(key(0x1000, 5, 5), 0);
        table.record(key(0x1000, 5, 5), 0);
        table.record(key(0x1000, 5, 5), 1);
        assert_eq!(1, table.len());

        let bucket = table.find(&key(0x1000, 5, 5)).unwrap();
        assert_eq!(vec![2, 1], bucket.counts);
    }

    /// Per-address mode fuses same-address buckets with identical
    /// cookies and keeps different addresses separate.
    #[test]
    fn fuse_by_address() {
        let mut table = ProfileTable::new(1, 64);
        table.record_add(key(0x1000, 5, 1), 0, 10);
        table.record_add(key(0x1000, 5, 2), 0, 7);
        table.record_add(key(0x2000, 5, 1), 0, 3);

        let order = table.reduce_and_sort(Some(&FixedResolver), &ReduceOpts::default());
        assert_eq!(2, order.len());
        assert_eq!(vec![17], table.bucket(order[0]).counts);
        assert_eq!(0x1000, table.bucket(order[0]).key.addr);
        assert_eq!(vec![3], table.bucket(order[1]).counts);
    }

    #[test]
    fn fuse_by_function() {
        let mut table = ProfileTable::new(1, 64);
        table.record_add(key(0x1000, 5, 1), 0, 10);
        table.record_add(key(0x1040, 5, 1), 0, 7);
        table.record_add(key(0x2000, 5, 1), 0, 30);
        // Unresolvable addresses never fuse in per-function mode.
        table.record_add(key(0x9000, 5, 1), 0, 1);
        table.record_add(key(0x9000, 6, 1), 0, 1);

        let opts = ReduceOpts {
            per_function: true,
            ..ReduceOpts::default()
        };
        let order = table.reduce_and_sort(Some(&FixedResolver), &opts);
        assert_eq!(4, order.len());
        assert_eq!(vec![30], table.bucket(order[0]).counts);
        assert_eq!(vec![17], table.bucket(order[1]).counts);
        assert_eq!("main", table.bucket(order[1]).symbol.as_ref().unwrap().name);
    }

    /// Fusing preserves per-event totals.
    #[test]
    fn fuse_conserves_totals() {
        let mut table = ProfileTable::new(2, 64);
        table.record_add(key(0x1000, 5, 1), 0, 10);
        table.record_add(key(0x1000, 5, 1), 1, 4);
        table.record_add(key(0x1000, 5, 2), 0, 7);
        table.record_add(key(0x2500, 5, 1), 1, 9);

        let before = table.totals();
        table.reduce_and_sort(Some(&FixedResolver), &ReduceOpts::default());
        assert_eq!(before, table.totals());
        assert_eq!(vec![17, 13], table.totals());
    }

    /// Top-2 of counts 50/30/20 emits 50 then 30 with percentages
    /// 50.00/30.00 and cumulative 50.00/80.00.
    #[test]
    fn top_n_truncation() {
        let mut table = ProfileTable::new(1, 64);
        table.record_add(key(0x3100, 1, 1), 0, 50);
        table.record_add(key(0x3200, 1, 1), 0, 30);
        table.record_add(key(0x3300, 1, 1), 0, 20);

        let opts = ReduceOpts {
            show_top: 2,
            ..ReduceOpts::default()
        };
        let order = table.reduce_and_sort(None, &opts);
        assert_eq!(2, order.len());
        assert_eq!(vec![50], table.bucket(order[0]).counts);
        assert_eq!(vec![30], table.bucket(order[1]).counts);

        let total = table.totals()[0];
        assert_eq!(100, total);
        assert_eq!(50.0, percent(50, total));
        assert_eq!(30.0, percent(30, total));
        assert_eq!(80.0, percent(50, total) + percent(30, total));
    }

    /// The cumulative threshold stops emission before the bucket that
    /// would push past it.
    #[test]
    fn cumulative_threshold() {
        let mut table = ProfileTable::new(1, 64);
        table.record_add(key(0x3100, 1, 1), 0, 50);
        table.record_add(key(0x3200, 1, 1), 0, 30);
        table.record_add(key(0x3300, 1, 1), 0, 20);

        let opts = ReduceOpts {
            cum_threshold: 85.0,
            ..ReduceOpts::default()
        };
        let order = table.reduce_and_sort(None, &opts);
        assert_eq!(2, order.len());
    }

    /// The default threshold emits every bucket even when the f64 sum of
    /// equal shares drifts past 100.0.
    #[test]
    fn default_threshold_never_truncates() {
        let mut table = ProfileTable::new(1, 64);
        for i in 0..6u64 {
            table.record(key(0x1000 * (i + 1), 1, 1), 0);
        }

        let order = table.reduce_and_sort(None, &ReduceOpts::default());
        assert_eq!(6, order.len());
    }

    #[test]
    fn zero_total_percent() {
        assert_eq!(0.0, percent(0, 0));
        assert_eq!(0.0, percent(5, 0));
    }

    #[test]
    fn equal_counts_tie_break_by_address() {
        let mut table = ProfileTable::new(1, 64);
        table.record_add(key(0x9000, 1, 1), 0, 5);
        table.record_add(key(0x3000, 1, 1), 0, 5);

        let order = table.reduce_and_sort(None, &ReduceOpts::default());
        assert_eq!(0x3000, table.bucket(order[0]).key.addr);
        assert_eq!(0x9000, table.bucket(order[1]).key.addr);
    }

    #[test]
    fn lru_eviction() {
        let mut table = ProfileTable::new(1, 2);
        table.record(key(0x1, 1, 1), 0);
        table.record(key(0x2, 1, 1), 0);
        // Touch 0x1 so 0x2 becomes the coldest.
        table.find(&key(0x1, 1, 1)).unwrap();

        table.record(key(0x3, 1, 1), 0);
        assert_eq!(2, table.len());
        assert!(table.find(&key(0x1, 1, 1)).is_some());
        assert!(table.find(&key(0x2, 1, 1)).is_none());
        assert!(table.find(&key(0x3, 1, 1)).is_some());
    }
}
