// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use core::fmt;

use crate::event_set::EventSetSetup;
use crate::model::PmuModel;
use crate::prepare::PmcImage;
use crate::prepare::PmdImage;

/// A register number paired with its raw 64-bit value, used when reading
/// counters back from the monitoring context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PmdValue {
    /// Register number.
    pub reg: u16,

    /// Raw counter value, filled in by [`RegisterAccess::read_pmds`].
    pub value: u64,
}

/// Error reported by the underlying register read/write transport,
/// carrying the OS error code when one is available.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessError {
    errno: i32,
}

impl AccessError {
    /// Creates an error from an OS error code (0 if unknown).
    pub const fn from_errno(errno: i32) -> AccessError {
        return AccessError { errno };
    }

    /// The OS error code, or 0 if unknown.
    pub const fn errno(&self) -> i32 {
        self.errno
    }
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.errno == 0 {
            return f.write_str("register access failed");
        } else {
            return write!(f, "register access failed (errno {})", self.errno);
        }
    }
}

/// The abstract kernel register read/write capability. The core depends
/// only on these signatures, not on the underlying transport.
pub trait RegisterAccess {
    /// Writes control-register images to the monitoring context.
    fn write_pmcs(&mut self, images: &[PmcImage]) -> Result<(), AccessError>;

    /// Writes data-register images to the monitoring context.
    fn write_pmds(&mut self, images: &[PmdImage]) -> Result<(), AccessError>;

    /// Reads current counter values; `regs[k].reg` selects the register,
    /// `regs[k].value` receives the count.
    fn read_pmds(&mut self, regs: &mut [PmdValue]) -> Result<(), AccessError>;
}

/// Failure installing registers for one monitored entity. Fatal to that
/// entity only; sibling entities are unaffected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallError {
    /// The underlying register write failed.
    Write(AccessError),

    /// The model-specific post-install hook failed.
    PostInstall(AccessError),
}

impl fmt::Display for InstallError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InstallError::Write(e) => return write!(f, "register write failed: {}", e),
            InstallError::PostInstall(e) => {
                return write!(f, "model post-install hook failed: {}", e);
            }
        }
    }
}

/// Writes the precomputed PMC images for one monitored entity, then
/// invokes the model's post-install hook.
pub fn install_pmc_registers(
    access: &mut dyn RegisterAccess,
    model: &dyn PmuModel,
    setup: &EventSetSetup,
    images: &[PmcImage],
) -> Result<(), InstallError> {
    access.write_pmcs(images).map_err(InstallError::Write)?;
    return model.post_install(access, setup);
}

/// Writes the precomputed PMD images for one monitored entity.
pub fn install_pmd_registers(
    access: &mut dyn RegisterAccess,
    images: &[PmdImage],
) -> Result<(), InstallError> {
    return access.write_pmds(images).map_err(InstallError::Write);
}
