// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
//! Kernel mailbox transport.
//!
//! Every transaction opens the memdev's character node, checks that it is the
//! device recorded at discovery, issues one ioctl and closes the node again.
use std::fs::{File, OpenOptions};
use std::io::Cursor;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};

use deku::ctx::Endian;
use deku::reader::Reader;
use deku::{DekuRead, DekuReader};
use log::{debug, error};
use nix::errno::Errno;
use nix::sys::stat::{SFlag, fstat, major, minor};

use crate::command::alloc_payload;
use crate::cxl::{COMMAND_INFO_SIZE, CommandInfo, NATIVE_ENDIAN};
use crate::{Error, Memdev, Result};

// include/uapi/linux/cxl_mem.h
mod ioctl {
    use nix::{ioctl_read, ioctl_readwrite};

    #[repr(C)]
    pub struct MemQueryCommands {
        pub n_commands: u32,
        pub rsvd: u32,
    }

    #[repr(C)]
    #[derive(Default)]
    pub struct MemPayload {
        pub size: u32,
        pub rsvd: u32,
        pub payload: u64,
    }

    #[repr(C)]
    #[derive(Default)]
    pub struct MemSendCommand {
        pub id: u32,
        pub flags: u32,
        pub raw_opcode: u16,
        pub raw_rsvd: u16,
        pub retval: u32,
        pub in_: MemPayload,
        pub out: MemPayload,
    }

    ioctl_read!(cxl_mem_query_commands, 0xce, 1, MemQueryCommands);
    ioctl_readwrite!(cxl_mem_send_command, 0xce, 2, MemSendCommand);
}

/// `struct cxl_mem_query_commands` header ahead of the command array.
pub const QUERY_HEADER_SIZE: usize = 8;

/// One send-command transaction.
#[derive(Debug)]
pub struct SendCommand<'a> {
    pub id: u32,
    /// Only meaningful for the raw command id.
    pub opcode: u16,
    pub input: &'a [u8],
    pub output: &'a mut [u8],
    pub retval: u32,
    /// Bytes the device wrote into `output`.
    pub out_size: usize,
}

/// The two mailbox ioctls, issued against an open and validated node.
pub trait Kernel {
    /// `buf` holds the query header with `n_commands` set, followed by room
    /// for that many command entries.
    fn query_commands(&self, fd: BorrowedFd<'_>, buf: &mut [u8]) -> nix::Result<()>;

    fn send_command(&self, fd: BorrowedFd<'_>, cmd: &mut SendCommand<'_>) -> nix::Result<()>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Ioctl;

impl Kernel for Ioctl {
    fn query_commands(&self, fd: BorrowedFd<'_>, buf: &mut [u8]) -> nix::Result<()> {
        if buf.len() < QUERY_HEADER_SIZE {
            return Err(Errno::EINVAL);
        }
        // SAFETY: buf covers the header and the n_commands entries the
        // kernel may fill
        unsafe { ioctl::cxl_mem_query_commands(fd.as_raw_fd(), buf.as_mut_ptr().cast()) }?;
        Ok(())
    }

    fn send_command(&self, fd: BorrowedFd<'_>, cmd: &mut SendCommand<'_>) -> nix::Result<()> {
        let mut send = ioctl::MemSendCommand {
            id: cmd.id,
            raw_opcode: cmd.opcode,
            in_: ioctl::MemPayload {
                size: u32::try_from(cmd.input.len()).map_err(|_| Errno::EINVAL)?,
                rsvd: 0,
                payload: cmd.input.as_ptr() as usize as u64,
            },
            out: ioctl::MemPayload {
                size: u32::try_from(cmd.output.len()).map_err(|_| Errno::EINVAL)?,
                rsvd: 0,
                payload: cmd.output.as_mut_ptr() as usize as u64,
            },
            ..Default::default()
        };
        // SAFETY: both payload pointers reference live slices of the stated
        // sizes for the duration of the call
        unsafe { ioctl::cxl_mem_send_command(fd.as_raw_fd(), &mut send) }?;
        cmd.retval = send.retval;
        cmd.out_size = core::cmp::min(send.out.size as usize, cmd.output.len());
        Ok(())
    }
}

/// Result of one enumerate call.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SupportedCommands {
    /// Total number of commands the device supports when probed with zero
    /// slots, otherwise the number of slots requested.
    pub count: u32,
    pub commands: Vec<CommandInfo>,
}

pub trait Transport {
    fn enumerate(&self, memdev: &Memdev, slots: u32) -> Result<SupportedCommands>;

    fn send(&self, memdev: &Memdev, cmd: &mut SendCommand<'_>) -> Result<()>;
}

/// Transport over the memdev's character node.
#[derive(Debug, Default)]
pub struct DevNodeTransport<K: Kernel = Ioctl> {
    kernel: K,
}

impl DevNodeTransport<Ioctl> {
    pub fn new() -> Self {
        Self { kernel: Ioctl }
    }
}

impl<K: Kernel> DevNodeTransport<K> {
    pub fn with_kernel(kernel: K) -> Self {
        Self { kernel }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    fn open(&self, memdev: &Memdev) -> Result<File> {
        let path = memdev.node();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .inspect_err(|e| error!("{}: failed to open: {e}", path.display()))?;

        let st = fstat(file.as_raw_fd())?;
        let is_chr = SFlag::from_bits_truncate(st.st_mode & SFlag::S_IFMT.bits()) == SFlag::S_IFCHR;
        if !is_chr
            || major(st.st_rdev) != u64::from(memdev.major())
            || minor(st.st_rdev) != u64::from(memdev.minor())
        {
            error!("failed to validate {} as a CXL memdev node", path.display());
            return Err(Error::DeviceValidation {
                path: path.to_owned(),
                major: memdev.major(),
                minor: memdev.minor(),
            });
        }
        Ok(file)
    }
}

impl<K: Kernel> Transport for DevNodeTransport<K> {
    fn enumerate(&self, memdev: &Memdev, slots: u32) -> Result<SupportedCommands> {
        let file = self.open(memdev)?;
        let mut buf = alloc_payload(QUERY_HEADER_SIZE + slots as usize * COMMAND_INFO_SIZE)?;
        buf[..4].copy_from_slice(&slots.to_ne_bytes());

        self.kernel
            .query_commands(file.as_fd(), &mut buf)
            .inspect_err(|e| error!("{}: query commands failed: {e}", memdev.devname()))?;

        decode_query(&buf, slots)
    }

    fn send(&self, memdev: &Memdev, cmd: &mut SendCommand<'_>) -> Result<()> {
        let file = self.open(memdev)?;
        self.kernel
            .send_command(file.as_fd(), cmd)
            .inspect_err(|e| error!("{}: send command failed: {e}", memdev.devname()))?;
        debug!(
            "{}: sent command {}: in {}, out {}, retval {}",
            memdev.devname(),
            cmd.id,
            cmd.input.len(),
            cmd.out_size,
            cmd.retval
        );
        Ok(())
    }
}

#[derive(Debug, DekuRead)]
#[deku(ctx = "endian: Endian", endian = "endian")]
struct QueryHeader {
    n_commands: u32,
    _rsvd: u32,
}

/// Parse a query buffer filled for `slots` entries.
///
/// A zero slot probe carries only the total count. Otherwise at most `slots`
/// entries are read, whatever the header claims.
pub(crate) fn decode_query(buf: &[u8], slots: u32) -> Result<SupportedCommands> {
    let mut cursor = Cursor::new(buf);
    let mut reader = Reader::new(&mut cursor);
    let header = QueryHeader::from_reader_with_ctx(&mut reader, NATIVE_ENDIAN)?;

    let entries = core::cmp::min(header.n_commands, slots);
    let commands = (0..entries)
        .map(|_| CommandInfo::from_reader_with_ctx(&mut reader, NATIVE_ENDIAN))
        .collect::<core::result::Result<Vec<_>, _>>()?;

    Ok(SupportedCommands {
        count: header.n_commands,
        commands,
    })
}
