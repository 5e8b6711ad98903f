// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Release history

#[allow(unused_imports)]
use crate::*; // For docs

/// # v0.1.0
/// - Initial release: sampling-buffer decoding, model-specific register
///   printers, profile accumulation and reduction, sample reporting.
pub mod v0_1_0 {}
