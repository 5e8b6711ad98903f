// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Release history

#[allow(unused_imports)]
use crate::*; // For docs

/// # v0.1.0
/// - Initial release: register bit-vectors, sampling-rate descriptors,
///   sampling-buffer wire format.
pub mod v0_1_0 {}
