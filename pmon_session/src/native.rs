// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.
// Linux register transport: the perfmon control-file implementation of
// the abstract register capability.

use std::io;

use pmon_events::AccessError;
use pmon_events::PmcImage;
use pmon_events::PmdImage;
use pmon_events::PmdValue;
use pmon_events::RegisterAccess;

#[cfg(target_os = "linux")]
use libc as linux;

/// Requires: an errno-setting operation has failed.
///
/// Returns the current value of `linux::errno`.
/// Debug-asserts that `errno > 0`.
#[cfg(target_os = "linux")]
fn get_failure_errno() -> i32 {
    let errno = unsafe { *linux::__errno_location() };
    debug_assert!(errno > 0); // Shouldn't call this unless an errno-based operation failed.
    return errno;
}

// Control-file request opcodes, one per register operation.
#[cfg(target_os = "linux")]
const OP_WRITE_PMCS: u32 = 1;
#[cfg(target_os = "linux")]
const OP_WRITE_PMDS: u32 = 2;
#[cfg(target_os = "linux")]
const OP_READ_PMDS: u32 = 3;

// Request = { op: u32, count: u32 } followed by count records of
// { reg: u64, value: u64 }. Responses to READ_PMDS echo the records with
// values filled in.
#[cfg(target_os = "linux")]
const RECORD_SIZE: usize = 16;

#[cfg(target_os = "linux")]
fn push_request(buf: &mut Vec<u8>, op: u32, count: usize) {
    buf.extend_from_slice(&op.to_ne_bytes());
    buf.extend_from_slice(&(count as u32).to_ne_bytes());
}

#[cfg(target_os = "linux")]
fn push_record(buf: &mut Vec<u8>, reg: u16, value: u64) {
    buf.extend_from_slice(&(reg as u64).to_ne_bytes());
    buf.extend_from_slice(&value.to_ne_bytes());
}

/// The kernel perfmon control file for one monitored entity, opened
/// read-write. Implements [`RegisterAccess`] over a simple
/// request/record protocol. On non-Linux targets [`PerfCtl::open`]
/// always fails.
#[derive(Debug)]
pub struct PerfCtl {
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    fd: i32,
}

impl PerfCtl {
    /// Opens the control file for one entity, e.g.
    /// `/sys/kernel/perfmon/cpu3/ctl`.
    pub fn open(path: &str) -> io::Result<PerfCtl> {
        #[cfg(not(target_os = "linux"))]
        {
            let _ = path;
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "perfmon control files are Linux-only",
            ));
        }
        #[cfg(target_os = "linux")]
        {
            let path0 = std::ffi::CString::new(path)
                .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
            let fd = unsafe {
                linux::open(
                    path0.as_ptr().cast::<linux::c_char>(),
                    linux::O_RDWR | linux::O_CLOEXEC,
                )
            };
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }
            return Ok(PerfCtl { fd });
        }
    }

    #[cfg(target_os = "linux")]
    fn write_all(&mut self, buf: &[u8]) -> Result<(), AccessError> {
        let mut written = 0;
        while written < buf.len() {
            let result = unsafe {
                linux::write(
                    self.fd,
                    buf[written..].as_ptr().cast::<linux::c_void>(),
                    buf.len() - written,
                )
            };
            if result < 0 {
                return Err(AccessError::from_errno(get_failure_errno()));
            }
            written += result as usize;
        }
        return Ok(());
    }

    #[cfg(target_os = "linux")]
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), AccessError> {
        let mut filled = 0;
        while filled < buf.len() {
            let result = unsafe {
                linux::read(
                    self.fd,
                    buf[filled..].as_mut_ptr().cast::<linux::c_void>(),
                    buf.len() - filled,
                )
            };
            if result < 0 {
                return Err(AccessError::from_errno(get_failure_errno()));
            } else if result == 0 {
                // Short response from the kernel.
                return Err(AccessError::from_errno(5)); // EIO
            }
            filled += result as usize;
        }
        return Ok(());
    }
}

#[cfg(target_os = "linux")]
impl Drop for PerfCtl {
    fn drop(&mut self) {
        unsafe { linux::close(self.fd) };
    }
}

impl RegisterAccess for PerfCtl {
    fn write_pmcs(&mut self, images: &[PmcImage]) -> Result<(), AccessError> {
        #[cfg(not(target_os = "linux"))]
        {
            let _ = images;
            return Err(AccessError::from_errno(0));
        }
        #[cfg(target_os = "linux")]
        {
            let mut buf = Vec::with_capacity(8 + images.len() * RECORD_SIZE);
            push_request(&mut buf, OP_WRITE_PMCS, images.len());
            for image in images {
                push_record(&mut buf, image.reg, image.value);
            }
            return self.write_all(&buf);
        }
    }

    fn write_pmds(&mut self, images: &[PmdImage]) -> Result<(), AccessError> {
        #[cfg(not(target_os = "linux"))]
        {
            let _ = images;
            return Err(AccessError::from_errno(0));
        }
        #[cfg(target_os = "linux")]
        {
            let mut buf = Vec::with_capacity(8 + images.len() * RECORD_SIZE);
            push_request(&mut buf, OP_WRITE_PMDS, images.len());
            for image in images {
                push_record(&mut buf, image.reg, image.value);
            }
            return self.write_all(&buf);
        }
    }

    fn read_pmds(&mut self, regs: &mut [PmdValue]) -> Result<(), AccessError> {
        #[cfg(not(target_os = "linux"))]
        {
            let _ = regs;
            return Err(AccessError::from_errno(0));
        }
        #[cfg(target_os = "linux")]
        {
            let mut buf = Vec::with_capacity(8 + regs.len() * RECORD_SIZE);
            push_request(&mut buf, OP_READ_PMDS, regs.len());
            for reg in regs.iter() {
                push_record(&mut buf, reg.reg, 0);
            }
            self.write_all(&buf)?;

            let mut response = vec![0u8; regs.len() * RECORD_SIZE];
            self.read_exact(&mut response)?;
            for (reg, record) in regs.iter_mut().zip(response.chunks_exact(RECORD_SIZE)) {
                let value: [u8; 8] = record[8..16].try_into().unwrap_or([0; 8]);
                reg.value = u64::from_ne_bytes(value);
            }
            return Ok(());
        }
    }
}
