// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![allow(non_upper_case_globals)]

use core::fmt;

/// Privilege levels at which a counter counts, as a uint32 flag set.
/// Bit 0 is the most-privileged level.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PrivLevel(pub u32);

impl PrivLevel {
    /// No level selected.
    pub const None: Self = Self(0);

    /// Privilege level 0 (kernel).
    pub const Kernel: Self = Self(1 << 0);

    /// Privilege level 1.
    pub const Priv1: Self = Self(1 << 1);

    /// Privilege level 2.
    pub const Priv2: Self = Self(1 << 2);

    /// Privilege level 3 (user).
    pub const User: Self = Self(1 << 3);

    /// All privilege levels.
    pub const All: Self = Self(0xf);

    /// Returns true if (self & mask) != 0.
    pub const fn has_flag(self, mask: Self) -> bool {
        0 != (self.0 & mask.0)
    }

    /// Returns `self | other`.
    pub const fn or(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl fmt::Display for PrivLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        return write!(f, "0x{:x}", self.0);
    }
}

/// Which parts of a [`SamplingRate`] the user supplied, as a uint32 flag set.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RateFlags(pub u32);

impl RateFlags {
    /// Nothing supplied: the event has no sampling period.
    pub const None: Self = Self(0);

    /// A sampling period value was supplied.
    pub const ValueSet: Self = Self(1 << 0);

    /// A randomization mask was supplied.
    pub const MaskSet: Self = Self(1 << 1);

    /// A randomization seed was supplied.
    pub const SeedSet: Self = Self(1 << 2);

    /// Returns true if (self & mask) != 0.
    pub const fn has_flag(self, mask: Self) -> bool {
        0 != (self.0 & mask.0)
    }

    /// Returns `self | other`.
    pub const fn or(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Per-event sampling-period descriptor.
///
/// `value` is the number of event occurrences between overflows. `mask` and
/// `seed` drive period randomization. `flags` records which of the three the
/// user actually supplied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SamplingRate {
    /// Sampling period (occurrences between overflows).
    pub value: u64,

    /// Randomization mask: bits of the period that may vary.
    pub mask: u64,

    /// Randomization seed.
    pub seed: u32,

    /// Which fields were supplied.
    pub flags: RateFlags,
}

impl SamplingRate {
    /// A descriptor with nothing supplied (event counts but never triggers).
    pub const UNSET: Self = Self {
        value: 0,
        mask: 0,
        seed: 0,
        flags: RateFlags::None,
    };

    /// Returns true if a sampling period value was supplied, i.e. the
    /// counter is an overflow trigger.
    pub const fn has_value(&self) -> bool {
        self.flags.has_flag(RateFlags::ValueSet)
    }

    /// Returns true if a randomization mask was supplied.
    pub const fn has_mask(&self) -> bool {
        self.flags.has_flag(RateFlags::MaskSet)
    }
}

/// Per-counter master-PMD flags, as a uint32 flag set.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PmdFlags(pub u32);

impl PmdFlags {
    /// No flags.
    pub const None: Self = Self(0);

    /// Notify the monitoring session when this counter overflows.
    pub const Notify: Self = Self(1 << 0);

    /// Apply the randomization mask to the reset value after each overflow.
    pub const Random: Self = Self(1 << 1);

    /// Returns true if (self & mask) != 0.
    pub const fn has_flag(self, mask: Self) -> bool {
        0 != (self.0 & mask.0)
    }

    /// Returns `self | other`.
    pub const fn or(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Per-event-set flags, as a uint32 flag set.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SetFlags(pub u32);

impl SetFlags {
    /// No flags.
    pub const None: Self = Self(0);

    /// Include the overflowed counter's own PMD in its sample body.
    pub const SmplAll: Self = Self(1 << 0);

    /// Exclude idle time from the set's active duration.
    pub const ExclIdle: Self = Self(1 << 1);

    /// Returns true if (self & mask) != 0.
    pub const fn has_flag(self, mask: Self) -> bool {
        0 != (self.0 & mask.0)
    }

    /// Returns `self | other`.
    pub const fn or(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}
