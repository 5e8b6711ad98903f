// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Release history

#[allow(unused_imports)]
use crate::*; // For docs

/// # v0.1.0
/// - Initial release: session configuration, buffer sizing, multiplexed
///   counter reading, worker pool, rendezvous printing, Linux register
///   transport.
pub mod v0_1_0 {}
