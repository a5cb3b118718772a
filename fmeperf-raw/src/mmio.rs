//! Memory-mapped register access
//!
//! This module maps a PCI BAR (exposed by sysfs as `resourceN`) into the
//! process and performs volatile 64-bit register accesses on it.
//! Higher-level device discovery lives in fmeperf-agent.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, MmioError>;

/// Errors that can occur while mapping a register region
#[derive(Debug, thiserror::Error)]
pub enum MmioError {
    #[error("Failed to open register region {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to map register region {path}: {source}")]
    MapFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Register region {path} is empty")]
    EmptyRegion { path: PathBuf },

    #[error("Window 0x{base:X}+0x{len:X} exceeds region of 0x{region:X} bytes")]
    OutOfBounds { base: u64, len: u64, region: u64 },
}

/// 64-bit register access
///
/// Accesses are infallible: a read that cannot be serviced returns all ones,
/// the value PCI returns for an aborted transaction.
pub trait RegisterIo: Send + Sync {
    /// Read the 64-bit register at byte `offset`
    fn read64(&self, offset: u64) -> u64;

    /// Write the 64-bit register at byte `offset`
    fn write64(&self, offset: u64, value: u64);
}

impl<T: RegisterIo + ?Sized> RegisterIo for Arc<T> {
    fn read64(&self, offset: u64) -> u64 {
        (**self).read64(offset)
    }

    fn write64(&self, offset: u64, value: u64) {
        (**self).write64(offset, value)
    }
}

/// A shared mapping of a register region
pub struct Mmio {
    ptr: NonNull<u8>,
    len: usize,
    // Keeps the descriptor alive for the lifetime of the mapping
    _file: File,
}

// SAFETY: the mapping is only accessed through volatile reads and writes of
// naturally aligned u64 values, which the device serializes.
unsafe impl Send for Mmio {}
unsafe impl Sync for Mmio {}

impl Mmio {
    /// Map the whole file at `path` read/write
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened (requires root to map PCI resources)
    /// - The file is empty
    /// - `mmap` fails
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC) // Uncached register accesses
            .open(path)
            .map_err(|e| MmioError::OpenFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        let len = file
            .metadata()
            .map_err(|e| MmioError::OpenFailed {
                path: path.to_path_buf(),
                source: e,
            })?
            .len() as usize;

        if len == 0 {
            return Err(MmioError::EmptyRegion {
                path: path.to_path_buf(),
            });
        }

        // SAFETY: fd is valid for the duration of the call, the result is
        // checked against MAP_FAILED before use.
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };

        if addr == libc::MAP_FAILED {
            return Err(MmioError::MapFailed {
                path: path.to_path_buf(),
                source: std::io::Error::last_os_error(),
            });
        }

        let ptr = NonNull::new(addr as *mut u8).ok_or_else(|| MmioError::MapFailed {
            path: path.to_path_buf(),
            source: std::io::Error::from(std::io::ErrorKind::InvalidData),
        })?;

        Ok(Self {
            ptr,
            len,
            _file: file,
        })
    }

    /// Size of the mapping in bytes
    pub fn len(&self) -> u64 {
        self.len as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn in_bounds(&self, offset: u64) -> bool {
        offset % 8 == 0 && offset.saturating_add(8) <= self.len as u64
    }
}

impl RegisterIo for Mmio {
    fn read64(&self, offset: u64) -> u64 {
        if !self.in_bounds(offset) {
            return u64::MAX;
        }
        // SAFETY: offset is 8-byte aligned and inside the mapping
        unsafe { std::ptr::read_volatile(self.ptr.as_ptr().add(offset as usize) as *const u64) }
    }

    fn write64(&self, offset: u64, value: u64) {
        if !self.in_bounds(offset) {
            return;
        }
        // SAFETY: offset is 8-byte aligned and inside the mapping
        unsafe {
            std::ptr::write_volatile(self.ptr.as_ptr().add(offset as usize) as *mut u64, value)
        }
    }
}

impl Drop for Mmio {
    fn drop(&mut self) {
        // SAFETY: ptr/len describe the mapping created in `open`
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len);
        }
    }
}

/// A sub-range of a register region, addressed relative to `base`
///
/// Feature drivers work with offsets from their own feature header; a window
/// translates those into offsets of the enclosing BAR.
#[derive(Clone)]
pub struct Window<T: RegisterIo> {
    io: T,
    base: u64,
}

impl<T: RegisterIo> Window<T> {
    /// Create a window of `len` bytes at `base` inside a region of
    /// `region_len` bytes
    pub fn new(io: T, base: u64, len: u64, region_len: u64) -> Result<Self> {
        if base.saturating_add(len) > region_len {
            return Err(MmioError::OutOfBounds {
                base,
                len,
                region: region_len,
            });
        }
        Ok(Self { io, base })
    }

    pub fn base(&self) -> u64 {
        self.base
    }
}

impl<T: RegisterIo> RegisterIo for Window<T> {
    fn read64(&self, offset: u64) -> u64 {
        self.io.read64(self.base + offset)
    }

    fn write64(&self, offset: u64, value: u64) {
        self.io.write64(self.base + offset, value)
    }
}
