// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
use deku::{DekuContainerRead, DekuContainerWrite};
use flagset::FlagSet;
use log::{debug, error};
use uuid::Uuid;

use crate::command::alloc_payload;
use crate::commands::{self, MailboxCommand, Target};
use crate::cxl::events::{
    ClearEventRecordsRequest, EventInterruptPolicy, EventLog, EventRecordsResponse,
    GetEventRecordsRequest, TimestampPayload,
};
use crate::cxl::firmware::{
    ActivateFwRequest, FwActivateAction, FwInfoResponse, HboStatusResponse, TRANSFER_FW_SIZE,
    TransferFwRequest,
};
use crate::cxl::vendor::{HealthCounter, HealthCountersResponse};
use crate::cxl::{
    AlertConfigResponse, CEL_ENTRY_SIZE, CEL_UUID, CelEntry, CommandId, GetLogRequest,
    GetLsaRequest, HealthInfoResponse, IdentifyResponse, PayloadSize, SET_LSA_HEADER_SIZE,
    SetAlertConfigRequest, SetLsaHeader, SupportedLogsResponse,
};
use crate::transport::Transport;
use crate::{Command, Encode, Error, Memdev, Result};

// CXL 2.0, 8.2.9.1.3
const CLEAR_EVENT_RECORDS_OPCODE: u16 = 0x0101;

/// Command execution against one memdev.
#[derive(Clone, Copy)]
pub struct Mailbox<'a> {
    memdev: &'a Memdev,
    transport: &'a dyn Transport,
}

impl<'a> Mailbox<'a> {
    pub fn new(memdev: &'a Memdev, transport: &'a dyn Transport) -> Self {
        Self { memdev, transport }
    }

    pub fn memdev(&self) -> &'a Memdev {
        self.memdev
    }

    pub fn command(&self, id: CommandId) -> Command<'a> {
        Command::new(self.transport, self.memdev, id)
    }

    pub fn raw(&self, opcode: u16) -> Result<Command<'a>> {
        Command::new_raw(self.transport, self.memdev, opcode)
    }

    /// Query and build `C`, with raw commands sized to their wire layout.
    fn prepare<C: MailboxCommand>(&self) -> Result<Command<'a>> {
        let mut cmd = match C::TARGET {
            Target::Logical(id) => self.command(id),
            Target::Raw(opcode) => self.raw(opcode)?,
        };
        cmd.rename(C::NAME);
        cmd.query()?;
        if let Target::Raw(_) = C::TARGET {
            cmd.set_payload_sizes(C::SIZE_IN, C::SIZE_OUT)?;
        }
        cmd.build()?;
        Ok(cmd)
    }

    /// Run one typed command to completion.
    ///
    /// Fails on a non-success firmware status, and when a fixed size response
    /// comes back short.
    pub fn execute<C: MailboxCommand>(&self, req: &C::Request) -> Result<C::Response> {
        let mut cmd = self.prepare::<C>()?;
        if let Some(buf) = cmd.input_mut() {
            C::encode(req, buf)?;
        }
        cmd.submit()?;
        cmd.check_status()?;

        let out = cmd.output().unwrap_or(&[]);
        if let PayloadSize::Fixed(expected) = C::SIZE_OUT {
            if out.len() < expected {
                error!(
                    "{}: {}: short response, {} of {expected} bytes",
                    self.memdev.devname(),
                    C::NAME,
                    out.len()
                );
                return Err(Error::PayloadSize {
                    name: C::NAME,
                    expected,
                    actual: out.len(),
                });
            }
        }
        Ok(C::decode(out)?)
    }

    pub fn identify(&self) -> Result<IdentifyResponse> {
        self.execute::<commands::Identify>(&())
    }

    pub fn health_info(&self) -> Result<HealthInfoResponse> {
        self.execute::<commands::GetHealthInfo>(&())
    }

    pub fn alert_config(&self) -> Result<AlertConfigResponse> {
        self.execute::<commands::GetAlertConfig>(&())
    }

    pub fn set_alert_config(&self, config: &SetAlertConfigRequest) -> Result<()> {
        self.execute::<commands::SetAlertConfig>(config)
    }

    pub fn supported_logs(&self) -> Result<SupportedLogsResponse> {
        self.execute::<commands::GetSupportedLogs>(&())
    }

    /// Read `buf.len()` bytes of the log identified by `uuid` into `buf`.
    ///
    /// Returns the number of bytes the device returned.
    pub fn read_log(&self, uuid: Uuid, offset: u32, buf: &mut [u8]) -> Result<usize> {
        let length = u32::try_from(buf.len())
            .map_err(|_| Error::InvalidArgument("log read length out of range"))?;
        let req = GetLogRequest {
            uuid: uuid.into(),
            offset,
            length,
        };

        let mut cmd = self.command(CommandId::GetLog);
        cmd.query()?;
        let (bytes, len) = req.encode()?;
        cmd.set_input_payload(bytes[..len].to_vec())?;
        cmd.set_output_payload(buf)?;
        cmd.submit()?;
        cmd.check_status()?;
        Ok(cmd.out_size())
    }

    /// The Command Effects Log, read in one transfer of up to `payload_max`.
    pub fn cel(&self) -> Result<Vec<CelEntry>> {
        let mut buf = alloc_payload(self.memdev.payload_max())?;
        let len = self.read_log(CEL_UUID, 0, &mut buf)?;
        buf.truncate(len);
        debug!(
            "{}: CEL holds {} entries",
            self.memdev.devname(),
            len / CEL_ENTRY_SIZE
        );

        let entries = buf
            .chunks_exact(CEL_ENTRY_SIZE)
            .map(|raw| CelEntry::from_bytes((raw, 0)).map(|(_, entry)| entry))
            .collect::<core::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn check_lsa_range(&self, offset: usize, length: usize) -> Result<()> {
        let lsa_size = self.memdev.lsa_size();
        if offset.checked_add(length).is_none_or(|end| end > lsa_size) {
            error!(
                "{}: LSA access of {length} bytes at {offset} exceeds size {lsa_size}",
                self.memdev.devname()
            );
            return Err(Error::InvalidArgument("LSA range exceeds label storage size"));
        }
        Ok(())
    }

    /// Fill `buf` from the label storage area starting at `offset`.
    ///
    /// Reads larger than the mailbox payload are split into several commands.
    pub fn get_lsa(&self, buf: &mut [u8], offset: usize) -> Result<()> {
        if buf.is_empty() {
            return Err(Error::InvalidArgument("LSA buffer cannot be empty"));
        }
        self.check_lsa_range(offset, buf.len())?;

        let chunk = self.memdev.payload_max();
        let mut cmd = self.command(CommandId::GetLsa);
        cmd.query()?;
        for (i, part) in buf.chunks_mut(chunk).enumerate() {
            let req = GetLsaRequest {
                offset: lsa_offset(offset + i * chunk)?,
                length: part.len() as u32,
            };
            let want = part.len();
            let (bytes, len) = req.encode()?;
            cmd.set_input_payload(bytes[..len].to_vec())?;
            cmd.set_output_payload(part)?;
            cmd.submit()?;
            cmd.check_status()?;
            if cmd.out_size() < want {
                return Err(Error::PayloadSize {
                    name: cmd.name(),
                    expected: want,
                    actual: cmd.out_size(),
                });
            }
        }
        Ok(())
    }

    /// Read `length` bytes of the LSA at `offset`; zero reads to the end.
    pub fn read_lsa(&self, offset: usize, length: usize) -> Result<Vec<u8>> {
        let length = match length {
            0 => self
                .memdev
                .lsa_size()
                .checked_sub(offset)
                .ok_or(Error::InvalidArgument("LSA offset exceeds label storage size"))?,
            n => n,
        };
        let mut buf = alloc_payload(length)?;
        self.get_lsa(&mut buf, offset)?;
        Ok(buf)
    }

    /// Write `data` into the label storage area starting at `offset`.
    pub fn set_lsa(&self, data: &[u8], offset: usize) -> Result<()> {
        if data.is_empty() {
            return Err(Error::InvalidArgument("LSA data cannot be empty"));
        }
        self.check_lsa_range(offset, data.len())?;

        let chunk = self
            .memdev
            .payload_max()
            .checked_sub(SET_LSA_HEADER_SIZE)
            .filter(|&c| c > 0)
            .ok_or(Error::InvalidArgument("payload too small for LSA writes"))?;

        let mut cmd = self.command(CommandId::SetLsa);
        cmd.query()?;
        for (i, part) in data.chunks(chunk).enumerate() {
            let header = SetLsaHeader {
                offset: lsa_offset(offset + i * chunk)?,
            };
            let (bytes, len) = header.encode()?;
            let input = cmd.alloc_input_payload(SET_LSA_HEADER_SIZE + part.len())?;
            input[..len].copy_from_slice(&bytes[..len]);
            input[SET_LSA_HEADER_SIZE..].copy_from_slice(part);
            cmd.submit()?;
            cmd.check_status()?;
        }
        Ok(())
    }

    /// Overwrite the whole label storage area with zeroes.
    pub fn zero_lsa(&self) -> Result<()> {
        let zeroes = alloc_payload(self.memdev.lsa_size())?;
        self.set_lsa(&zeroes, 0)
    }

    pub fn event_records(&self, log: EventLog) -> Result<EventRecordsResponse> {
        self.execute::<commands::GetEventRecords>(&GetEventRecordsRequest { log })
    }

    pub fn clear_event_records(&self, req: &ClearEventRecordsRequest) -> Result<()> {
        let mut cmd = self.raw(CLEAR_EVENT_RECORDS_OPCODE)?;
        cmd.rename("Clear Event Records");
        cmd.query()?;
        cmd.set_payload_sizes(PayloadSize::Fixed(req.wire_size()), PayloadSize::Fixed(0))?;
        cmd.set_input_payload(req.to_bytes()?)?;
        cmd.submit()?;
        cmd.check_status()
    }

    pub fn event_interrupt_policy(&self) -> Result<EventInterruptPolicy> {
        self.execute::<commands::GetEventInterruptPolicy>(&())
    }

    pub fn set_event_interrupt_policy(&self, policy: &EventInterruptPolicy) -> Result<()> {
        self.execute::<commands::SetEventInterruptPolicy>(policy)
    }

    pub fn timestamp(&self) -> Result<u64> {
        Ok(self.execute::<commands::GetTimestamp>(&())?.timestamp)
    }

    pub fn set_timestamp(&self, timestamp: u64) -> Result<()> {
        self.execute::<commands::SetTimestamp>(&TimestampPayload { timestamp })
    }

    pub fn fw_info(&self) -> Result<FwInfoResponse> {
        self.execute::<commands::GetFwInfo>(&())
    }

    pub fn transfer_fw(&self, req: &TransferFwRequest) -> Result<()> {
        self.execute::<commands::TransferFw>(req)
    }

    /// Transfer FW under a caller-chosen opcode, such as
    /// [`crate::cxl::firmware::HBO_TRANSFER_FW_OPCODE`] for a background transfer.
    pub fn transfer_fw_with_opcode(&self, opcode: u16, req: &TransferFwRequest) -> Result<()> {
        let (bytes, len) = <TransferFwRequest as Encode<TRANSFER_FW_SIZE>>::encode(req)?;
        let mut cmd = self.raw(opcode)?;
        cmd.rename("Transfer FW");
        cmd.query()?;
        cmd.set_payload_sizes(PayloadSize::Fixed(TRANSFER_FW_SIZE), PayloadSize::Fixed(0))?;
        cmd.set_input_payload(bytes[..len].to_vec())?;
        cmd.submit()?;
        cmd.check_status()
    }

    pub fn activate_fw(&self, action: FwActivateAction, slot: u8) -> Result<()> {
        self.execute::<commands::ActivateFw>(&ActivateFwRequest { action, slot })
    }

    pub fn hbo_status(&self) -> Result<HboStatusResponse> {
        self.execute::<commands::HboStatus>(&())
    }

    pub fn health_counters(&self) -> Result<HealthCountersResponse> {
        self.execute::<commands::HealthCountersGet>(&())
    }

    pub fn clear_health_counters(&self, counters: FlagSet<HealthCounter>) -> Result<()> {
        self.execute::<commands::HealthCountersClear>(&counters.into())
    }
}

fn lsa_offset(offset: usize) -> Result<u32> {
    u32::try_from(offset).map_err(|_| Error::InvalidArgument("LSA offset out of range"))
}
