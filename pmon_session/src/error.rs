// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use std::io;

use pmon_decode::DecodeError;
use pmon_events::AccessError;
use pmon_events::InstallError;
use pmon_events::PrepareError;

/// Session-level failure. Per-entity errors stop that entity only; the
/// caller decides whether to tear down siblings.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Event-set validation or counter assignment failed.
    #[error("event-set preparation failed: {0}")]
    Prepare(PrepareError),

    /// Register installation for one entity failed.
    #[error("register installation failed: {0}")]
    Install(InstallError),

    /// The register read/write transport failed.
    #[error("register access failed: {0}")]
    Access(AccessError),

    /// A sampling-buffer snapshot could not be decoded.
    #[error("sample decoding failed: {0}")]
    Decode(DecodeError),

    /// The memory budget cannot hold even one sampling-buffer entry.
    #[error("buffer budget of {budget} bytes holds no {entry_size}-byte entries")]
    BufferTooSmall {
        /// The configured byte budget.
        budget: usize,

        /// Size of one entry for the prepared set.
        entry_size: usize,
    },

    /// An operating-system call failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<PrepareError> for SessionError {
    fn from(e: PrepareError) -> SessionError {
        return SessionError::Prepare(e);
    }
}

impl From<InstallError> for SessionError {
    fn from(e: InstallError) -> SessionError {
        return SessionError::Install(e);
    }
}

impl From<AccessError> for SessionError {
    fn from(e: AccessError) -> SessionError {
        return SessionError::Access(e);
    }
}

impl From<DecodeError> for SessionError {
    fn from(e: DecodeError) -> SessionError {
        return SessionError::Decode(e);
    }
}
