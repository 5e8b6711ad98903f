// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Release history

#[allow(unused_imports)]
use crate::*; // For docs

/// # v0.1.0
/// - Initial release: event-set model, sampling-PMD preparation engine,
///   reverse-sampling-PMD table, register image preparation/installation.
pub mod v0_1_0 {}
