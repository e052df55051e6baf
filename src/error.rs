//! Recoverable errors.
//!
//! Anything else (bad indices, short block transfers, accesses outside the
//! virtual range) is a contract violation and panics.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("couldn't create virtual disk {path}: {source}")]
    DiskOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't map physical memory: {0}")]
    PhysicalMemory(#[source] std::io::Error),

    #[error("page and frame counts must be non-zero (npages={npages}, nframes={nframes})")]
    InvalidGeometry { npages: usize, nframes: usize },

    #[error("unknown replacement policy: {0}")]
    UnknownPolicy(String),

    #[error("unknown program: {0}")]
    UnknownProgram(String),

    #[error("invalid count: {0}")]
    InvalidCount(String),

    #[error("couldn't write report: {0}")]
    Report(#[from] std::io::Error),
}

pub type VmResult<T> = Result<T, VmError>;
