// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
pub mod events;
pub mod firmware;
pub mod vendor;

use core::fmt;

use deku::ctx::Endian;
use deku::{DekuRead, DekuWrite};
use flagset::{FlagSet, flags};
use num_derive::FromPrimitive;
use uuid::{Uuid, uuid};

use crate::Encode;
use crate::wire::{WireFlagSet, WireString, WireUuid};

/// Capacity fields are reported in multiples of 256 MiB.
pub const CAPACITY_MULTIPLIER: u64 = 256 * 1024 * 1024;

// CXL 2.0, 8.2.9.4.2.1
pub const CEL_UUID: Uuid = uuid!("0da9c0b5-bf41-4b78-8f79-96b1623b3f17");

/// Byte order of structures exchanged with the kernel, as opposed to the
/// little-endian mailbox payloads.
pub const NATIVE_ENDIAN: Endian = if cfg!(target_endian = "little") {
    Endian::Little
} else {
    Endian::Big
};

// include/uapi/linux/cxl_mem.h, CXL_CMDS
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, Hash, PartialEq)]
#[repr(u32)]
pub enum CommandId {
    Invalid = 0,
    Identify = 1,
    Raw = 2,
    GetSupportedLogs = 3,
    GetFwInfo = 4,
    GetPartitionInfo = 5,
    GetLsa = 6,
    GetHealthInfo = 7,
    GetLog = 8,
    SetPartitionInfo = 9,
    SetLsa = 10,
    GetAlertConfig = 11,
    SetAlertConfig = 12,
    GetShutdownState = 13,
    SetShutdownState = 14,
    GetPoison = 15,
    InjectPoison = 16,
    ClearPoison = 17,
    GetScanMediaCaps = 18,
    ScanMedia = 19,
    GetScanMedia = 20,
}

/// One past the last logical command id.
pub const COMMAND_ID_MAX: u32 = 21;

impl CommandId {
    pub fn descriptor(self) -> &'static Descriptor {
        &DESCRIPTORS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }
}

/// Payload size as declared by a command descriptor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PayloadSize {
    Fixed(usize),
    /// Declared as -1: bounded only by the device's max payload.
    Variable,
}

impl PayloadSize {
    pub fn from_declared(size: i32) -> Self {
        match usize::try_from(size) {
            Ok(s) => Self::Fixed(s),
            Err(_) => Self::Variable,
        }
    }

    /// Buffer length to allocate on a device whose mailbox holds `payload_max`.
    pub fn resolve(self, payload_max: usize) -> usize {
        match self {
            Self::Fixed(s) => s,
            Self::Variable => payload_max,
        }
    }
}

impl fmt::Display for PayloadSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(s) => write!(f, "{s}"),
            Self::Variable => f.write_str("variable"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Descriptor {
    pub id: CommandId,
    pub name: &'static str,
    pub opcode: u16,
    pub size_in: PayloadSize,
    pub size_out: PayloadSize,
}

const fn desc(
    id: CommandId,
    name: &'static str,
    opcode: u16,
    size_in: i32,
    size_out: i32,
) -> Descriptor {
    const fn size(s: i32) -> PayloadSize {
        if s < 0 {
            PayloadSize::Variable
        } else {
            PayloadSize::Fixed(s as usize)
        }
    }
    Descriptor {
        id,
        name,
        opcode,
        size_in: size(size_in),
        size_out: size(size_out),
    }
}

// drivers/cxl/mem.c, mem_commands
#[rustfmt::skip]
pub static DESCRIPTORS: [Descriptor; COMMAND_ID_MAX as usize] = [
    desc(CommandId::Invalid, "Invalid Command", 0x0000, 0, 0),
    desc(CommandId::Identify, "Identify Command", 0x4000, 0, 0x43),
    desc(CommandId::Raw, "Raw device command", 0x0000, -1, -1),
    desc(CommandId::GetSupportedLogs, "Get Supported Logs", 0x0400, 0, -1),
    desc(CommandId::GetFwInfo, "Get FW Info", 0x0200, 0, 0x50),
    desc(CommandId::GetPartitionInfo, "Get Partition Info", 0x4100, 0, 0x20),
    desc(CommandId::GetLsa, "Get Label Storage Area", 0x4102, 0x8, -1),
    desc(CommandId::GetHealthInfo, "Get Health Info", 0x4200, 0, 0x12),
    desc(CommandId::GetLog, "Get Log", 0x0401, 0x18, -1),
    desc(CommandId::SetPartitionInfo, "Set Partition Info", 0x4101, 0x0a, 0),
    desc(CommandId::SetLsa, "Set Label Storage Area", 0x4103, -1, 0),
    desc(CommandId::GetAlertConfig, "Get Alert Configuration", 0x4201, 0, 0x10),
    desc(CommandId::SetAlertConfig, "Set Alert Configuration", 0x4202, 0x0c, 0),
    desc(CommandId::GetShutdownState, "Get Shutdown State", 0x4203, 0, 0x1),
    desc(CommandId::SetShutdownState, "Set Shutdown State", 0x4204, 0x1, 0),
    desc(CommandId::GetPoison, "Get Poison List", 0x4300, 0x10, -1),
    desc(CommandId::InjectPoison, "Inject Poison", 0x4301, 0x8, 0),
    desc(CommandId::ClearPoison, "Clear Poison", 0x4302, 0x48, 0),
    desc(CommandId::GetScanMediaCaps, "Get Scan Media Capabilities", 0x4303, 0x10, 0x4),
    desc(CommandId::ScanMedia, "Scan Media", 0x4304, 0x11, 0),
    desc(CommandId::GetScanMedia, "Get Scan Media Results", 0x4305, 0, -1),
];

// include/uapi/linux/cxl_mem.h, struct cxl_command_info
flags! {
    pub enum CommandInfoFlags: u32 {
        Enabled = 1 << 0,
        Exclusive = 1 << 1,
    }
}

// include/uapi/linux/cxl_mem.h, struct cxl_command_info
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(ctx = "endian: Endian", endian = "endian")]
pub struct CommandInfo {
    pub id: u32,
    pub flags: WireFlagSet<CommandInfoFlags>,
    pub size_in: i32,
    pub size_out: i32,
}

pub const COMMAND_INFO_SIZE: usize = 16;

impl CommandInfo {
    pub fn new(id: u32, size_in: i32, size_out: i32) -> Self {
        Self {
            id,
            flags: FlagSet::default().into(),
            size_in,
            size_out,
        }
    }

    pub fn size_in(&self) -> PayloadSize {
        PayloadSize::from_declared(self.size_in)
    }

    pub fn size_out(&self) -> PayloadSize {
        PayloadSize::from_declared(self.size_out)
    }
}

// CXL 2.0, 8.2.9.5.1.1
#[derive(Clone, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct IdentifyResponse {
    fw_revision: WireString<16>,
    total_capacity: u64,
    volatile_capacity: u64,
    persistent_capacity: u64,
    partition_align: u64,
    info_event_log_size: u16,
    warning_event_log_size: u16,
    failure_event_log_size: u16,
    fatal_event_log_size: u16,
    lsa_size: u32,
    #[deku(bytes = "3")]
    poison_list_max_mer: u32,
    inject_poison_limit: u16,
    poison_caps: u8,
    qos_telemetry_caps: u8,
}

pub const IDENTIFY_SIZE: usize = 0x43;

impl IdentifyResponse {
    pub fn fw_revision(&self) -> &str {
        self.fw_revision.as_str()
    }

    pub fn fw_revision_bytes(&self) -> &[u8; 16] {
        self.fw_revision.as_bytes()
    }

    /// Bytes, converted from the 256 MiB units on the wire.
    pub fn total_capacity(&self) -> u64 {
        self.total_capacity.saturating_mul(CAPACITY_MULTIPLIER)
    }

    pub fn volatile_capacity(&self) -> u64 {
        self.volatile_capacity.saturating_mul(CAPACITY_MULTIPLIER)
    }

    pub fn persistent_capacity(&self) -> u64 {
        self.persistent_capacity.saturating_mul(CAPACITY_MULTIPLIER)
    }

    pub fn partition_align(&self) -> u64 {
        self.partition_align.saturating_mul(CAPACITY_MULTIPLIER)
    }

    /// Entry capacity of the informational, warning, failure and fatal logs.
    pub fn event_log_sizes(&self) -> [u16; 4] {
        [
            self.info_event_log_size,
            self.warning_event_log_size,
            self.failure_event_log_size,
            self.fatal_event_log_size,
        ]
    }

    pub fn lsa_size(&self) -> u32 {
        self.lsa_size
    }

    pub fn poison_list_max_mer(&self) -> u32 {
        self.poison_list_max_mer
    }

    pub fn inject_poison_limit(&self) -> u16 {
        self.inject_poison_limit
    }

    pub fn poison_caps(&self) -> u8 {
        self.poison_caps
    }

    pub fn qos_telemetry_caps(&self) -> u8 {
        self.qos_telemetry_caps
    }
}

// CXL 2.0, 8.2.9.5.3.1, Health Status
flags! {
    pub enum HealthStatus: u8 {
        MaintenanceNeeded = 1 << 0,
        PerformanceDegraded = 1 << 1,
        HardwareReplacementNeeded = 1 << 2,
    }
}

// CXL 2.0, 8.2.9.5.3.1
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct HealthInfoResponse {
    health_status: WireFlagSet<HealthStatus>,
    media_status: u8,
    additional_status: u8,
    life_used: u8,
    temperature: i16,
    dirty_shutdowns: u32,
    volatile_errors: u32,
    persistent_errors: u32,
}

pub const HEALTH_INFO_SIZE: usize = 0x12;

impl HealthInfoResponse {
    pub fn health_status(&self) -> FlagSet<HealthStatus> {
        self.health_status.get()
    }

    pub fn media_status(&self) -> u8 {
        self.media_status
    }

    /// Bits 1:0 life used, 3:2 device temperature, 5:4 volatile and
    /// persistent error counts.
    pub fn additional_status(&self) -> u8 {
        self.additional_status
    }

    /// Percent of rated life consumed, 0xff when not implemented.
    pub fn life_used(&self) -> Option<u8> {
        (self.life_used != 0xff).then_some(self.life_used)
    }

    /// Degrees Celsius, `None` when the device reports 0xffff.
    pub fn temperature(&self) -> Option<i16> {
        (self.temperature != -1).then_some(self.temperature)
    }

    pub fn dirty_shutdowns(&self) -> u32 {
        self.dirty_shutdowns
    }

    pub fn volatile_errors(&self) -> u32 {
        self.volatile_errors
    }

    pub fn persistent_errors(&self) -> u32 {
        self.persistent_errors
    }
}

// CXL 2.0, 8.2.9.5.3.2, Valid Alerts / Programmable Alerts
flags! {
    pub enum AlertFlags: u8 {
        LifeUsedProgWarn = 1 << 0,
        OverTempProgWarn = 1 << 1,
        UnderTempProgWarn = 1 << 2,
        CorrVolatileMemErrProgWarn = 1 << 3,
        CorrPersistentMemErrProgWarn = 1 << 4,
    }
}

// CXL 2.0, 8.2.9.5.3.2
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct AlertConfigResponse {
    pub valid_alerts: WireFlagSet<AlertFlags>,
    pub programmable_alerts: WireFlagSet<AlertFlags>,
    pub life_used_crit: u8,
    pub life_used_prog_warn: u8,
    pub over_temp_crit: u16,
    pub under_temp_crit: u16,
    pub over_temp_prog_warn: u16,
    pub under_temp_prog_warn: u16,
    pub corr_volatile_mem_err_prog_warn: u16,
    pub corr_persistent_mem_err_prog_warn: u16,
}

// CXL 2.0, 8.2.9.5.3.3
#[derive(Clone, Copy, Debug, Default, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct SetAlertConfigRequest {
    pub valid_alert_actions: WireFlagSet<AlertFlags>,
    pub enable_alert_actions: WireFlagSet<AlertFlags>,
    #[deku(pad_bytes_after = "1")]
    pub life_used_prog_warn: u8,
    pub over_temp_prog_warn: u16,
    pub under_temp_prog_warn: u16,
    pub corr_volatile_mem_err_prog_warn: u16,
    pub corr_persistent_mem_err_prog_warn: u16,
}
impl Encode<12> for SetAlertConfigRequest {}

impl SetAlertConfigRequest {
    /// Build from the three packed words used by management tooling:
    ///
    /// - `alerts`: bits 23:16 valid actions, 15:8 enable actions,
    ///   7:0 life used warning threshold;
    /// - `temperature`: bits 31:16 over, 15:0 under temperature threshold;
    /// - `mem_errors`: bits 31:16 volatile, 15:0 persistent corrected error
    ///   threshold.
    pub fn from_packed(alerts: u32, temperature: u32, mem_errors: u32) -> Self {
        let [_, valid, enable, life_used] = alerts.to_be_bytes();
        let [t0, t1, t2, t3] = temperature.to_be_bytes();
        let [m0, m1, m2, m3] = mem_errors.to_be_bytes();
        Self {
            valid_alert_actions: FlagSet::new_truncated(valid).into(),
            enable_alert_actions: FlagSet::new_truncated(enable).into(),
            life_used_prog_warn: life_used,
            over_temp_prog_warn: u16::from_be_bytes([t0, t1]),
            under_temp_prog_warn: u16::from_be_bytes([t2, t3]),
            corr_volatile_mem_err_prog_warn: u16::from_be_bytes([m0, m1]),
            corr_persistent_mem_err_prog_warn: u16::from_be_bytes([m2, m3]),
        }
    }
}

// CXL 2.0, 8.2.9.4.1
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(ctx = "endian: Endian", endian = "endian")]
pub struct SupportedLog {
    pub uuid: WireUuid,
    pub size: u32,
}

// CXL 2.0, 8.2.9.4.1
#[derive(Clone, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct SupportedLogsResponse {
    entries: u16,
    #[deku(seek_from_current = "6", count = "entries")]
    logs: Vec<SupportedLog>,
}

impl SupportedLogsResponse {
    pub fn logs(&self) -> &[SupportedLog] {
        &self.logs
    }

    pub fn find(&self, uuid: Uuid) -> Option<&SupportedLog> {
        self.logs.iter().find(|l| l.uuid.uuid() == uuid)
    }
}

// CXL 2.0, 8.2.9.4.2
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct GetLogRequest {
    pub uuid: WireUuid,
    pub offset: u32,
    pub length: u32,
}
impl Encode<24> for GetLogRequest {}

// CXL 2.0, 8.2.9.4.2.1, Command Effect
flags! {
    pub enum CommandEffect: u16 {
        ConfigChangeColdReset = 1 << 0,
        ConfigChangeImmediate = 1 << 1,
        DataChangeImmediate = 1 << 2,
        PolicyChangeImmediate = 1 << 3,
        LogChangeImmediate = 1 << 4,
        SecurityStateChange = 1 << 5,
        BackgroundOperation = 1 << 6,
    }
}

// CXL 2.0, 8.2.9.4.2.1
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct CelEntry {
    pub opcode: u16,
    pub effect: WireFlagSet<CommandEffect>,
}

pub const CEL_ENTRY_SIZE: usize = 4;

// CXL 2.0, 8.2.9.5.2.3
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct GetLsaRequest {
    pub offset: u32,
    pub length: u32,
}
impl Encode<8> for GetLsaRequest {}

// CXL 2.0, 8.2.9.5.2.4, data follows the header
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct SetLsaHeader {
    #[deku(pad_bytes_after = "4")]
    pub offset: u32,
}
impl Encode<8> for SetLsaHeader {}

pub const SET_LSA_HEADER_SIZE: usize = 8;
