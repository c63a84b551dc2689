// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
use std::io;
use std::path::PathBuf;

use deku::DekuError;
use nix::errno::Errno;
use thiserror::Error;

use crate::status::FirmwareStatus;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to allocate {0} byte payload")]
    NoMemory(usize),

    #[error("payload of {size} bytes exceeds mailbox maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("{}: failed to validate as a CXL memdev node {major}:{minor}", .path.display())]
    DeviceValidation {
        path: PathBuf,
        major: u32,
        minor: u32,
    },

    #[error("{name}: expected at least {expected} payload bytes, device returned {actual}")]
    PayloadSize {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{0}: command not supported by device")]
    Unsupported(&'static str),

    #[error("{0}: command has not been queried")]
    NotQueried(&'static str),

    #[error("mailbox transport failed: {0}")]
    Transport(#[from] Errno),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("firmware status {0}")]
    Firmware(FirmwareStatus),

    #[error("payload codec failed: {0}")]
    Codec(#[from] DekuError),

    #[error("{}: {reason}", .path.display())]
    Discovery { path: PathBuf, reason: String },

    #[error("no memdev with id {0}")]
    NoDevice(u32),
}

impl Error {
    /// The errno a C caller of the mailbox library would observe.
    pub fn errno(&self) -> Errno {
        match self {
            Self::NoMemory(_) => Errno::ENOMEM,
            Self::PayloadTooLarge { .. }
            | Self::InvalidArgument(_)
            | Self::PayloadSize { .. }
            | Self::NotQueried(_)
            | Self::Codec(_) => Errno::EINVAL,
            Self::DeviceValidation { .. } | Self::Firmware(_) => Errno::ENXIO,
            Self::Unsupported(_) => Errno::EOPNOTSUPP,
            Self::Transport(e) => *e,
            Self::Io(e) => e.raw_os_error().map_or(Errno::EIO, Errno::from_raw),
            Self::Discovery { .. } | Self::NoDevice(_) => Errno::ENODEV,
        }
    }

    /// Firmware failures the device marks as worth reissuing.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Firmware(s) => s.is_retryable(),
            _ => false,
        }
    }
}
