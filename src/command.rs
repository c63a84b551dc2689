// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use deku::DekuContainerRead;
use log::{debug, error, warn};

use crate::cxl::{CommandId, CommandInfo, PayloadSize};
use crate::transport::{SendCommand, Transport};
use crate::{Error, FirmwareStatus, Memdev, Result};

/// Outcome of the capability query.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryStatus {
    NotRun,
    Unsupported,
    Ok,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    NotQueried,
    Unsupported,
    Supported,
    Built,
    Submitted,
}

impl State {
    pub fn query_status(self) -> QueryStatus {
        match self {
            Self::NotQueried => QueryStatus::NotRun,
            Self::Unsupported => QueryStatus::Unsupported,
            Self::Supported | Self::Built | Self::Submitted => QueryStatus::Ok,
        }
    }
}

#[derive(Debug)]
enum Output<'a> {
    Owned(Vec<u8>),
    Caller(&'a mut [u8]),
}

impl Output<'_> {
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::Owned(v) => v,
            Self::Caller(s) => s,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Self::Owned(v) => v,
            Self::Caller(s) => s,
        }
    }
}

pub type SharedCommand<'a> = Rc<RefCell<Command<'a>>>;

/// One mailbox request against a memdev.
///
/// A command is queried against the device's supported command list, built
/// (payload buffers allocated to the declared sizes), then submitted. It may
/// be submitted again once built. Payload buffers are either allocated here
/// or lent by the caller, and never exceed the memdev's `payload_max`.
pub struct Command<'a> {
    memdev: &'a Memdev,
    transport: &'a dyn Transport,
    id: CommandId,
    name: &'static str,
    opcode: u16,
    state: State,
    supported: Vec<CommandInfo>,
    index: Option<usize>,
    size_in: PayloadSize,
    size_out: PayloadSize,
    input: Option<Cow<'a, [u8]>>,
    output: Option<Output<'a>>,
    out_size: usize,
    status: Option<FirmwareStatus>,
}

impl core::fmt::Debug for Command<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Command")
            .field("memdev", &self.memdev.devname())
            .field("name", &self.name)
            .field("opcode", &self.opcode)
            .field("state", &self.state)
            .field("index", &self.index)
            .field("size_in", &self.size_in)
            .field("size_out", &self.size_out)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl<'a> Command<'a> {
    pub fn new(transport: &'a dyn Transport, memdev: &'a Memdev, id: CommandId) -> Self {
        let desc = id.descriptor();
        Self {
            memdev,
            transport,
            id,
            name: desc.name,
            opcode: desc.opcode,
            state: State::NotQueried,
            supported: Vec::new(),
            index: None,
            size_in: desc.size_in,
            size_out: desc.size_out,
            input: None,
            output: None,
            out_size: 0,
            status: None,
        }
    }

    /// A vendor command addressed by opcode through the raw command id.
    pub fn new_raw(transport: &'a dyn Transport, memdev: &'a Memdev, opcode: u16) -> Result<Self> {
        if opcode == 0 {
            error!("{}: raw opcode 0 is invalid", memdev.devname());
            return Err(Error::InvalidArgument("raw opcode must be non-zero"));
        }
        let mut cmd = Self::new(transport, memdev, CommandId::Raw);
        cmd.opcode = opcode;
        Ok(cmd)
    }

    pub(crate) fn rename(&mut self, name: &'static str) {
        self.name = name;
    }

    /// Resolve support for this command against the device's command list.
    ///
    /// The list is fetched in two passes: a zero slot probe for the count,
    /// then a fetch sized for exactly that count. The first entry whose id
    /// matches wins. A completed query is not repeated.
    pub fn query(&mut self) -> Result<()> {
        match self.state {
            State::NotQueried => (),
            State::Unsupported => return Err(Error::Unsupported(self.name)),
            State::Supported | State::Built | State::Submitted => return Ok(()),
        }

        let devname = self.memdev.devname();
        let probe = self.transport.enumerate(self.memdev, 0)?;
        debug!("{devname}: device supports {} commands", probe.count);

        let list = if probe.count == 0 {
            probe
        } else {
            self.transport.enumerate(self.memdev, probe.count)?
        };
        self.supported = list.commands;

        let id = self.id as u32;
        let Some(index) = self.supported.iter().position(|c| c.id == id) else {
            debug!("{devname}: {} is not supported", self.name);
            self.state = State::Unsupported;
            return Err(Error::Unsupported(self.name));
        };

        let info = &self.supported[index];
        self.size_in = info.size_in();
        self.size_out = info.size_out();
        self.index = Some(index);
        self.state = State::Supported;
        debug!(
            "{devname}: {} supported at index {index}, in {}, out {}",
            self.name, self.size_in, self.size_out
        );
        Ok(())
    }

    /// Override the device-declared sizes before buffers are built.
    pub fn set_payload_sizes(&mut self, size_in: PayloadSize, size_out: PayloadSize) -> Result<()> {
        match self.state {
            State::NotQueried => Err(Error::NotQueried(self.name)),
            State::Unsupported => Err(Error::Unsupported(self.name)),
            State::Supported => {
                self.size_in = size_in;
                self.size_out = size_out;
                Ok(())
            }
            State::Built | State::Submitted => {
                Err(Error::InvalidArgument("payload sizes are fixed once built"))
            }
        }
    }

    /// Allocate any payload buffer the caller has not supplied.
    ///
    /// Variable sized outputs take the full `payload_max`. Variable sized
    /// inputs are left to the caller.
    pub fn build(&mut self) -> Result<()> {
        match self.state {
            State::NotQueried => return Err(Error::NotQueried(self.name)),
            State::Unsupported => return Err(Error::Unsupported(self.name)),
            _ => (),
        }

        let max = self.memdev.payload_max();
        if self.input.is_none() {
            if let PayloadSize::Fixed(size) = self.size_in {
                if size > 0 {
                    self.check_payload(size)?;
                    self.input = Some(Cow::Owned(alloc_payload(size)?));
                }
            }
        }
        if self.output.is_none() {
            let size = self.size_out.resolve(max);
            if size > 0 {
                self.check_payload(size)?;
                self.output = Some(Output::Owned(alloc_payload(size)?));
            }
        }

        if self.state == State::Supported {
            self.state = State::Built;
        }
        Ok(())
    }

    fn check_payload(&self, size: usize) -> Result<()> {
        let max = self.memdev.payload_max();
        if size > max {
            error!(
                "{}: {}: payload of {size} bytes exceeds max of {max}",
                self.memdev.devname(),
                self.name
            );
            return Err(Error::PayloadTooLarge { size, max });
        }
        Ok(())
    }

    /// Use `data` as the input payload, replacing any existing buffer.
    pub fn set_input_payload(&mut self, data: impl Into<Cow<'a, [u8]>>) -> Result<()> {
        let data = data.into();
        self.check_payload(data.len())?;
        self.input = Some(data);
        Ok(())
    }

    /// Replace the input payload with a zeroed buffer of `size` bytes.
    pub fn alloc_input_payload(&mut self, size: usize) -> Result<&mut [u8]> {
        self.check_payload(size)?;
        let buf = alloc_payload(size)?;
        Ok(self.input.insert(Cow::Owned(buf)).to_mut().as_mut_slice())
    }

    /// Lend `buf` as the output payload, replacing any existing buffer.
    pub fn set_output_payload(&mut self, buf: &'a mut [u8]) -> Result<()> {
        self.check_payload(buf.len())?;
        self.output = Some(Output::Caller(buf));
        Ok(())
    }

    pub fn alloc_output_payload(&mut self, size: usize) -> Result<&mut [u8]> {
        self.check_payload(size)?;
        let buf = alloc_payload(size)?;
        Ok(self.output.insert(Output::Owned(buf)).as_mut_slice())
    }

    /// Writable view of an input payload owned by the command.
    pub fn input_mut(&mut self) -> Option<&mut [u8]> {
        match self.input.as_mut() {
            Some(Cow::Owned(buf)) => Some(buf.as_mut_slice()),
            _ => None,
        }
    }

    pub fn input(&self) -> Option<&[u8]> {
        self.input.as_deref()
    }

    /// Issue the command, building it first if required.
    ///
    /// Returns the firmware status. A non-success status is not an error at
    /// this level; see [`Self::check_status`].
    pub fn submit(&mut self) -> Result<FirmwareStatus> {
        match self.state {
            State::NotQueried => return Err(Error::NotQueried(self.name)),
            State::Unsupported => return Err(Error::Unsupported(self.name)),
            State::Supported => self.build()?,
            State::Built | State::Submitted => (),
        }

        let output: &mut [u8] = match self.output.as_mut() {
            Some(out) => out.as_mut_slice(),
            None => &mut [],
        };
        let mut send = SendCommand {
            id: self.id as u32,
            opcode: if self.id == CommandId::Raw { self.opcode } else { 0 },
            input: self.input.as_deref().unwrap_or(&[]),
            output,
            retval: 0,
            out_size: 0,
        };
        debug!(
            "{}: submitting {}: in {}, out {}",
            self.memdev.devname(),
            self.name,
            send.input.len(),
            send.output.len()
        );
        self.transport.send(self.memdev, &mut send)?;

        let status = FirmwareStatus::from_retval(send.retval);
        self.out_size = send.out_size;
        self.status = Some(status);
        self.state = State::Submitted;

        if !status.is_success() {
            warn!(
                "{}: {}: firmware status {status}",
                self.memdev.devname(),
                self.name
            );
        }
        Ok(status)
    }

    /// The firmware status of the last submission as a `Result`.
    pub fn check_status(&self) -> Result<()> {
        match self.status {
            Some(status) if status.is_success() => Ok(()),
            Some(status) => Err(Error::Firmware(status)),
            None => Err(Error::InvalidArgument("command has not been submitted")),
        }
    }

    /// The bytes the device returned in the last submission.
    pub fn output(&self) -> Option<&[u8]> {
        self.output.as_ref().map(|out| {
            let buf = out.as_slice();
            &buf[..core::cmp::min(self.out_size, buf.len())]
        })
    }

    /// The whole output buffer, regardless of how much the device filled.
    pub fn output_buffer(&self) -> Option<&[u8]> {
        self.output.as_ref().map(Output::as_slice)
    }

    /// Decode the returned bytes as `T`.
    pub fn decode<'b, T: DekuContainerRead<'b>>(&'b self) -> Result<T> {
        let (_, value) = T::from_bytes((self.output().unwrap_or(&[]), 0))?;
        Ok(value)
    }

    pub fn memdev(&self) -> &'a Memdev {
        self.memdev
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Opcode sent for raw commands; the nominal opcode otherwise.
    pub fn opcode(&self) -> u16 {
        self.opcode
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn query_status(&self) -> QueryStatus {
        self.state.query_status()
    }

    /// Position of the matched entry in the device's command list.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// The device's command list as fetched by [`Self::query`].
    pub fn supported(&self) -> &[CommandInfo] {
        &self.supported
    }

    pub fn size_in(&self) -> PayloadSize {
        self.size_in
    }

    pub fn size_out(&self) -> PayloadSize {
        self.size_out
    }

    pub fn status(&self) -> Option<FirmwareStatus> {
        self.status
    }

    pub fn out_size(&self) -> usize {
        self.out_size
    }

    pub fn into_shared(self) -> SharedCommand<'a> {
        Rc::new(RefCell::new(self))
    }
}

/// Zeroed payload buffer, failing rather than aborting on allocation failure.
pub(crate) fn alloc_payload(size: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size).map_err(|_| Error::NoMemory(size))?;
    buf.resize(size, 0);
    Ok(buf)
}

#[cfg(test)]
mod test {
    use std::cell::{Cell, RefCell};

    use super::{Command, QueryStatus, State};
    use crate::cxl::{CommandId, CommandInfo, PayloadSize};
    use crate::transport::{SendCommand, SupportedCommands, Transport};
    use crate::{Error, FirmwareStatus, MboxStatus, Memdev, Result};

    #[derive(Default)]
    struct FakeTransport {
        commands: Vec<CommandInfo>,
        enumerates: RefCell<Vec<u32>>,
        sends: Cell<usize>,
        retval: u32,
        reply: Vec<u8>,
    }

    impl Transport for FakeTransport {
        fn enumerate(&self, _memdev: &Memdev, slots: u32) -> Result<SupportedCommands> {
            self.enumerates.borrow_mut().push(slots);
            let count = self.commands.len() as u32;
            if slots == 0 {
                return Ok(SupportedCommands {
                    count,
                    commands: Vec::new(),
                });
            }
            Ok(SupportedCommands {
                count: slots,
                commands: self.commands.iter().take(slots as usize).copied().collect(),
            })
        }

        fn send(&self, _memdev: &Memdev, cmd: &mut SendCommand<'_>) -> Result<()> {
            self.sends.set(self.sends.get() + 1);
            let n = core::cmp::min(self.reply.len(), cmd.output.len());
            cmd.output[..n].copy_from_slice(&self.reply[..n]);
            cmd.out_size = n;
            cmd.retval = self.retval;
            Ok(())
        }
    }

    fn memdev() -> Memdev {
        Memdev::builder(0).payload_max(256).build()
    }

    fn transport(commands: &[(u32, i32, i32)]) -> FakeTransport {
        FakeTransport {
            commands: commands
                .iter()
                .map(|&(id, i, o)| CommandInfo::new(id, i, o))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn query_is_cached() {
        let t = transport(&[(7, 0, 0x12), (1, 0, 0x43)]);
        let m = memdev();
        let mut cmd = Command::new(&t, &m, CommandId::Identify);
        assert_eq!(cmd.query_status(), QueryStatus::NotRun);
        cmd.query().unwrap();
        cmd.query().unwrap();
        assert_eq!(*t.enumerates.borrow(), [0, 2]);
        assert_eq!(cmd.index(), Some(1));
        assert_eq!(cmd.query_status(), QueryStatus::Ok);
        assert_eq!(cmd.size_out(), PayloadSize::Fixed(0x43));
    }

    #[test]
    fn first_match_wins() {
        let t = transport(&[(7, 0, 0x12), (7, 0, 0x20)]);
        let m = memdev();
        let mut cmd = Command::new(&t, &m, CommandId::GetHealthInfo);
        cmd.query().unwrap();
        assert_eq!(cmd.index(), Some(0));
        assert_eq!(cmd.size_out(), PayloadSize::Fixed(0x12));
    }

    #[test]
    fn empty_list_is_unsupported() {
        let t = transport(&[]);
        let m = memdev();
        let mut cmd = Command::new(&t, &m, CommandId::Identify);
        assert!(matches!(cmd.query(), Err(Error::Unsupported(_))));
        assert_eq!(*t.enumerates.borrow(), [0]);
        assert_eq!(cmd.query_status(), QueryStatus::Unsupported);
        // not re-enumerated
        assert!(matches!(cmd.query(), Err(Error::Unsupported(_))));
        assert_eq!(t.enumerates.borrow().len(), 1);
        assert!(matches!(cmd.submit(), Err(Error::Unsupported(_))));
        assert_eq!(t.sends.get(), 0);
    }

    #[test]
    fn submit_requires_query() {
        let t = transport(&[(1, 0, 0x43)]);
        let m = memdev();
        let mut cmd = Command::new(&t, &m, CommandId::Identify);
        assert!(matches!(cmd.submit(), Err(Error::NotQueried(_))));
        assert_eq!(cmd.submit().unwrap_err().errno(), nix::errno::Errno::EINVAL);
        assert_eq!(t.sends.get(), 0);
    }

    #[test]
    fn build_sizes() {
        let t = transport(&[(3, 64, -1)]);
        let m = memdev();
        let mut cmd = Command::new(&t, &m, CommandId::GetSupportedLogs);
        cmd.query().unwrap();
        cmd.build().unwrap();
        assert_eq!(cmd.state(), State::Built);
        assert_eq!(cmd.input().map(<[u8]>::len), Some(64));
        assert_eq!(cmd.output_buffer().map(<[u8]>::len), Some(256));
    }

    #[test]
    fn declared_input_over_max() {
        let t = transport(&[(3, 512, 0)]);
        let m = memdev();
        let mut cmd = Command::new(&t, &m, CommandId::GetSupportedLogs);
        cmd.query().unwrap();
        assert!(matches!(
            cmd.build(),
            Err(Error::PayloadTooLarge { size: 512, max: 256 })
        ));
    }

    #[test]
    fn caller_buffers() {
        let t = FakeTransport {
            reply: vec![0xaa; 4],
            ..transport(&[(2, -1, -1)])
        };
        let m = memdev();
        let mut out = [0u8; 16];
        let mut big = vec![0u8; 257];
        {
            let mut cmd = Command::new_raw(&t, &m, 0xc000).unwrap();
            cmd.query().unwrap();
            assert!(cmd.set_output_payload(&mut big).is_err());
            cmd.set_input_payload(&[1u8, 2][..]).unwrap();
            cmd.set_output_payload(&mut out).unwrap();
            let status = cmd.submit().unwrap();
            assert!(status.is_success());
            assert_eq!(cmd.output(), Some(&[0xaa; 4][..]));
            assert_eq!(cmd.out_size(), 4);
        }
        assert_eq!(&out[..5], &[0xaa, 0xaa, 0xaa, 0xaa, 0]);
    }

    #[test]
    fn raw_opcode_zero() {
        let t = transport(&[]);
        let m = memdev();
        assert!(matches!(
            Command::new_raw(&t, &m, 0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn firmware_failure_is_reported() {
        let t = FakeTransport {
            retval: 0x16,
            ..transport(&[(1, 0, 0x43)])
        };
        let m = memdev();
        let mut cmd = Command::new(&t, &m, CommandId::Identify);
        cmd.query().unwrap();
        let status = cmd.submit().unwrap();
        assert_eq!(
            status,
            FirmwareStatus::Known(MboxStatus::InvalidPayloadLength)
        );
        assert!(matches!(cmd.check_status(), Err(Error::Firmware(_))));
        assert_eq!(cmd.state(), State::Submitted);
    }

    #[test]
    fn sizes_fixed_after_build() {
        let t = transport(&[(2, -1, -1)]);
        let m = memdev();
        let mut cmd = Command::new_raw(&t, &m, 0xcd00).unwrap();
        assert!(matches!(
            cmd.set_payload_sizes(PayloadSize::Fixed(0), PayloadSize::Fixed(8)),
            Err(Error::NotQueried(_))
        ));
        cmd.query().unwrap();
        cmd.set_payload_sizes(PayloadSize::Fixed(0), PayloadSize::Fixed(8))
            .unwrap();
        cmd.build().unwrap();
        assert_eq!(cmd.output_buffer().map(<[u8]>::len), Some(8));
        assert!(cmd.input().is_none());
        assert!(
            cmd.set_payload_sizes(PayloadSize::Fixed(0), PayloadSize::Fixed(4))
                .is_err()
        );
    }

    #[test]
    fn shared_release() {
        let t = transport(&[]);
        let m = memdev();
        let shared = Command::new(&t, &m, CommandId::Identify).into_shared();
        let other = shared.clone();
        drop(shared);
        other
            .borrow_mut()
            .alloc_input_payload(8)
            .unwrap()
            .copy_from_slice(&[1; 8]);
        assert_eq!(other.borrow().input(), Some(&[1u8; 8][..]));
    }
}
