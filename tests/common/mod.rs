// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
#![allow(dead_code)]

extern crate simplelog;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::os::fd::BorrowedFd;
use std::rc::Rc;

use cxl_mbox::cxl::CommandInfo;
use cxl_mbox::transport::{DevNodeTransport, Kernel, SendCommand};
use cxl_mbox::{Config as CxlConfig, DeviceSource, Memdev, Result as CxlResult};
use log::LevelFilter;
use nix::errno::Errno;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

pub fn setup() {
    let _ = TermLogger::init(
        LevelFilter::Debug,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );
}

/// One send-command call as seen by the kernel.
#[derive(Clone, Debug)]
pub struct Sent {
    pub id: u32,
    pub opcode: u16,
    pub input: Vec<u8>,
    pub output_len: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Reply {
    pub retval: u32,
    pub output: Vec<u8>,
}

impl Reply {
    pub fn ok(output: &[u8]) -> Self {
        Reply {
            retval: 0,
            output: output.to_vec(),
        }
    }

    pub fn status(retval: u32) -> Self {
        Reply {
            retval,
            output: Vec::new(),
        }
    }
}

type Responder = Box<dyn FnMut(&Sent) -> Reply>;

#[derive(Default)]
pub struct MockState {
    pub commands: RefCell<Vec<CommandInfo>>,
    /// Slot count of each query call.
    pub queries: RefCell<Vec<u32>>,
    pub sent: RefCell<Vec<Sent>>,
    /// Replies consumed in order before falling back to the responder.
    pub replies: RefCell<VecDeque<Reply>>,
    pub responder: RefCell<Option<Responder>>,
    /// Fail the query call at this position once.
    pub fail_query: Cell<Option<(usize, Errno)>>,
    /// Fail the next send once.
    pub fail_send: Cell<Option<Errno>>,
}

/// Scripted stand-in for the mailbox ioctls.
#[derive(Clone, Default)]
pub struct MockKernel(pub Rc<MockState>);

impl MockKernel {
    pub fn new(commands: &[(u32, i32, i32)]) -> Self {
        let kernel = MockKernel::default();
        kernel.set_commands(commands);
        kernel
    }

    pub fn set_commands(&self, commands: &[(u32, i32, i32)]) {
        *self.0.commands.borrow_mut() = commands
            .iter()
            .map(|&(id, size_in, size_out)| CommandInfo::new(id, size_in, size_out))
            .collect();
    }

    pub fn reply(&self, reply: Reply) {
        self.0.replies.borrow_mut().push_back(reply);
    }

    pub fn respond_with(&self, f: impl FnMut(&Sent) -> Reply + 'static) {
        *self.0.responder.borrow_mut() = Some(Box::new(f));
    }

    pub fn fail_query(&self, call: usize, errno: Errno) {
        self.0.fail_query.set(Some((call, errno)));
    }

    pub fn fail_send(&self, errno: Errno) {
        self.0.fail_send.set(Some(errno));
    }

    pub fn queries(&self) -> Vec<u32> {
        self.0.queries.borrow().clone()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.0.sent.borrow().clone()
    }

    pub fn sends(&self) -> usize {
        self.0.sent.borrow().len()
    }
}

impl Kernel for MockKernel {
    fn query_commands(&self, _fd: BorrowedFd<'_>, buf: &mut [u8]) -> nix::Result<()> {
        let slots = u32::from_ne_bytes(buf[..4].try_into().unwrap());
        let call = self.0.queries.borrow().len();
        self.0.queries.borrow_mut().push(slots);

        if let Some((n, errno)) = self.0.fail_query.get() {
            if n == call {
                self.0.fail_query.set(None);
                return Err(errno);
            }
        }

        let commands = self.0.commands.borrow();
        if slots == 0 {
            buf[..4].copy_from_slice(&(commands.len() as u32).to_ne_bytes());
            return Ok(());
        }

        for (i, c) in commands.iter().take(slots as usize).enumerate() {
            let entry = &mut buf[8 + i * 16..8 + (i + 1) * 16];
            entry[0..4].copy_from_slice(&c.id.to_ne_bytes());
            entry[4..8].copy_from_slice(&c.flags.get().bits().to_ne_bytes());
            entry[8..12].copy_from_slice(&c.size_in.to_ne_bytes());
            entry[12..16].copy_from_slice(&c.size_out.to_ne_bytes());
        }
        Ok(())
    }

    fn send_command(&self, _fd: BorrowedFd<'_>, cmd: &mut SendCommand<'_>) -> nix::Result<()> {
        if let Some(errno) = self.0.fail_send.take() {
            return Err(errno);
        }

        let sent = Sent {
            id: cmd.id,
            opcode: cmd.opcode,
            input: cmd.input.to_vec(),
            output_len: cmd.output.len(),
        };

        let queued = self.0.replies.borrow_mut().pop_front();
        let reply = match queued {
            Some(reply) => reply,
            None => match self.0.responder.borrow_mut().as_mut() {
                Some(f) => f(&sent),
                None => Reply::default(),
            },
        };
        self.0.sent.borrow_mut().push(sent);

        let n = core::cmp::min(reply.output.len(), cmd.output.len());
        cmd.output[..n].copy_from_slice(&reply.output[..n]);
        cmd.out_size = n;
        cmd.retval = reply.retval;
        Ok(())
    }
}

pub fn transport(kernel: &MockKernel) -> DevNodeTransport<MockKernel> {
    DevNodeTransport::with_kernel(kernel.clone())
}

/// A memdev backed by `/dev/null`, which is char device 1:3.
pub fn null_memdev(id: u32) -> Memdev {
    Memdev::builder(id)
        .node("/dev/null")
        .dev(1, 3)
        .payload_max(256)
        .lsa_size(600)
        .build()
}

/// Counts discovery calls.
pub struct CountingSource {
    pub memdevs: Vec<Memdev>,
    pub calls: Rc<Cell<usize>>,
}

impl DeviceSource for CountingSource {
    fn discover(&self, _config: &CxlConfig) -> CxlResult<Vec<Memdev>> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.memdevs.clone())
    }
}

pub const IDENTIFY: u32 = 1;
pub const RAW: u32 = 2;
pub const GET_SUPPORTED_LOGS: u32 = 3;
pub const GET_LSA: u32 = 6;
pub const GET_HEALTH_INFO: u32 = 7;
pub const GET_LOG: u32 = 8;
pub const SET_LSA: u32 = 10;

/// The command list the kernel advertises for a typical memdev.
pub const KERNEL_COMMANDS: [(u32, i32, i32); 7] = [
    (IDENTIFY, 0, 0x43),
    (RAW, -1, -1),
    (GET_SUPPORTED_LOGS, 0, -1),
    (GET_LSA, 0x8, -1),
    (GET_HEALTH_INFO, 0, 0x12),
    (GET_LOG, 0x18, -1),
    (SET_LSA, -1, 0),
];
