// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
//! Vendor-specific mailbox payloads.
//!
//! These cover device information, trace buffers (HCT), link training
//! monitoring (LTMON), ordered set analysis (OSA), performance counters, error
//! injection, eye capture and adaptation, and health counters. Reserved bytes
//! are zeroed on write and skipped on read.
use deku::ctx::Endian;
use deku::{DekuError, DekuRead, DekuWrite};
use flagset::{FlagSet, flags};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::Encode;
use crate::wire::{WireFlagSet, WireVec};

// Get LD Info
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct LdInfoResponse {
    pub memory_size: u64,
    pub ld_count: u16,
    pub qos_telemetry_caps: u8,
}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct DeviceInfoResponse {
    pub device_id: u16,
    pub release_major: u8,
    pub release_minor: u8,
    pub device_revision: u8,
    pub config_major: u8,
    pub config_minor: u16,
}

impl DeviceInfoResponse {
    /// Chip release letter, 'A' for major release 0.
    pub fn release(&self) -> char {
        char::from(b'A'.saturating_add(self.release_major))
    }
}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct DdrInfoRequest {
    pub ddr_id: u8,
}
impl Encode<1> for DdrInfoRequest {}

#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
#[repr(u32)]
pub enum DramWidth {
    X4 = 0,
    X8 = 1,
    X16 = 2,
    X32 = 3,
}

impl DramWidth {
    pub fn name(self) -> &'static str {
        match self {
            Self::X4 => "X4_DEVICE",
            Self::X8 => "X8_DEVICE",
            Self::X16 => "X16_DEVICE",
            Self::X32 => "X32_DEVICE",
        }
    }
}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct DdrInfoResponse {
    pub mstr_reg: u32,
    pub dram_width: u32,
}

impl DdrInfoResponse {
    pub fn width(&self) -> Option<DramWidth> {
        DramWidth::from_u32(self.dram_width)
    }
}

#[derive(Clone, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct HctPlatParamsResponse {
    num_instances: u8,
    #[deku(count = "num_instances")]
    instance_types: WireVec<u8, 255>,
}

impl HctPlatParamsResponse {
    pub fn instance_types(&self) -> &[u8] {
        self.instance_types.as_slice()
    }
}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct HctStartStopTriggerRequest {
    pub instance: u8,
    pub buffer_control: u8,
}
impl Encode<2> for HctStartStopTriggerRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct HctInstanceRequest {
    pub instance: u8,
}
impl Encode<1> for HctInstanceRequest {}

#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
#[repr(u8)]
pub enum HctBufferStatus {
    Stop = 0,
    PreTrigger = 1,
    PostTrigger = 2,
}

impl HctBufferStatus {
    pub fn name(self) -> &'static str {
        match self {
            Self::Stop => "Stop",
            Self::PreTrigger => "Pre-Trigger",
            Self::PostTrigger => "Post-Trigger",
        }
    }
}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct HctBufferStatusResponse {
    pub buffer_status: u8,
    pub fill_level: u8,
}

impl HctBufferStatusResponse {
    pub fn status(&self) -> Option<HctBufferStatus> {
        HctBufferStatus::from_u8(self.buffer_status)
    }
}

/// Capture clear, L2R count dump and clear, and capture status all take
/// just the target memory id.
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct LtmonTargetRequest {
    #[deku(pad_bytes_before = "1")]
    pub mem_id: u8,
}
impl Encode<2> for LtmonTargetRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct LtmonCaptureRequest {
    #[deku(pad_bytes_before = "1")]
    pub mem_id: u8,
    pub capture_mode: u8,
    pub ignore_sub_change: u16,
    pub ignore_rxl0_change: u8,
    #[deku(pad_bytes_after = "1")]
    pub trigger_source: u8,
}
impl Encode<8> for LtmonCaptureRequest {}

/// Freeze/restore, capture trigger and enable: one byte value for a memory id.
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct LtmonControlRequest {
    #[deku(pad_bytes_before = "1")]
    pub mem_id: u8,
    #[deku(pad_bytes_after = "1")]
    pub value: u8,
}
impl Encode<4> for LtmonControlRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct LtmonBasicCfgRequest {
    #[deku(pad_bytes_before = "1")]
    pub mem_id: u8,
    pub tick_count: u8,
    pub global_timestamp: u8,
}
impl Encode<4> for LtmonBasicCfgRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct LtmonWatchRequest {
    #[deku(pad_bytes_before = "1")]
    pub mem_id: u8,
    pub watch_id: u8,
    pub watch_mode: u8,
    pub src_major_state: u8,
    pub src_minor_state: u8,
    pub src_l0_state: u8,
    pub dst_major_state: u8,
    pub dst_minor_state: u8,
    #[deku(pad_bytes_after = "2")]
    pub dst_l0_state: u8,
}
impl Encode<12> for LtmonWatchRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct L2rCountResponse {
    pub count: u32,
}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct LtmonCaptureStatResponse {
    pub trigger_count: u16,
    pub watch0_trigger_count: u16,
    pub watch1_trigger_count: u16,
    pub timestamp: u16,
    pub trigger_source_status: u8,
}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct LtmonCaptureLogDumpRequest {
    #[deku(pad_bytes_before = "1")]
    pub mem_id: u8,
    pub dump_index: u16,
    #[deku(pad_bytes_after = "2")]
    pub dump_count: u16,
}
impl Encode<8> for LtmonCaptureLogDumpRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct LtmonCaptureLogDumpResponse {
    pub data: [u64; 2],
}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct OsaOsTypeTrigCfgRequest {
    #[deku(pad_bytes_before = "1", pad_bytes_after = "2")]
    pub mem_id: u8,
    pub lane_mask: u16,
    pub lane_dir_mask: u8,
    pub rate_mask: u8,
    #[deku(pad_bytes_after = "2")]
    pub os_type_mask: u16,
}
impl Encode<12> for OsaOsTypeTrigCfgRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct OsaCapCtrlRequest {
    #[deku(pad_bytes_before = "1", pad_bytes_after = "2")]
    pub mem_id: u8,
    pub lane_mask: u16,
    pub lane_dir_mask: u8,
    pub drop_single_os: u8,
    pub stop_mode: u8,
    pub snapshot_mode: u8,
    pub post_trigger_count: u16,
    #[deku(pad_bytes_after = "2")]
    pub os_type_mask: u16,
}
impl Encode<16> for OsaCapCtrlRequest {}

/// Config dump, status query and access release address one memory id.
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct OsaTargetRequest {
    #[deku(pad_bytes_before = "1", pad_bytes_after = "2")]
    pub mem_id: u8,
}
impl Encode<4> for OsaTargetRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct OsaAnaOpRequest {
    #[deku(pad_bytes_before = "1")]
    pub mem_id: u8,
    #[deku(pad_bytes_after = "1")]
    pub op: u8,
}
impl Encode<4> for OsaAnaOpRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(ctx = "endian: Endian", endian = "endian")]
pub struct OsaOsTypeTrigCfg {
    pub lane_mask: u16,
    pub lane_dir_mask: u8,
    pub rate_mask: u8,
    pub os_type_mask: u16,
}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(ctx = "endian: Endian", endian = "endian")]
pub struct OsaPatternTrigCfg {
    pub lane_mask: u16,
    pub lane_dir_mask: u8,
    pub rate_mask: u8,
    pub value: [u32; 4],
    pub mask: [u32; 4],
}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(ctx = "endian: Endian", endian = "endian")]
pub struct OsaCapCtrl {
    pub lane_mask: u16,
    pub lane_dir_mask: u8,
    pub drop_single_os: u8,
    pub stop_mode: u8,
    pub snapshot_mode: u8,
    pub post_trigger_count: u16,
    pub os_type_mask: u16,
}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct OsaCfgDumpResponse {
    #[deku(pad_bytes_after = "2")]
    pub os_type_trigger: OsaOsTypeTrigCfg,
    pub pattern_trigger: OsaPatternTrigCfg,
    #[deku(pad_bytes_after = "3")]
    pub misc_trigger_enable_mask: u8,
    #[deku(pad_bytes_after = "2")]
    pub capture_control: OsaCapCtrl,
}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct OsaStatusResponse {
    pub state: u8,
    pub lane_id: u8,
    #[deku(pad_bytes_after = "1")]
    pub lane_dir: u8,
    pub trigger_reason_mask: u16,
}

/// Counter match configuration, used for both LTIF and HIF counters.
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct MtaLtifSetRequest {
    pub counter: u32,
    pub match_value: u32,
    pub opcode: u32,
    pub meta_field: u32,
    pub meta_value: u32,
}
impl Encode<20> for MtaLtifSetRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct MtaCounterRequest {
    pub counter_type: u8,
    pub counter: u32,
}
impl Encode<5> for MtaCounterRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct MtaHifSetRequest {
    pub counter: u32,
    pub match_value: u32,
    pub address: u32,
    pub request_type: u32,
    pub sc_type: u32,
}
impl Encode<20> for MtaHifSetRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct HifCounterRequest {
    pub counter: u32,
}
impl Encode<4> for HifCounterRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct CounterValueResponse {
    pub value: u64,
}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct DdrGenericSelectRequest {
    pub ddr_id: u8,
    pub cid: u8,
    pub rank: u8,
    pub bank: u8,
    pub bank_group: u8,
    pub events: [u8; 8],
}
impl Encode<13> for DdrGenericSelectRequest {}

/// DRS poison and DRS ECC injection.
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct DrsInjectionRequest {
    pub channel: u8,
    pub duration: u8,
    #[deku(pad_bytes_after = "1")]
    pub mode: u8,
    pub tag: u16,
}
impl Encode<6> for DrsInjectionRequest {}

/// Host interface poison injection.
///
/// The 40-bit target address layout has not been validated against
/// hardware.
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct HifPoisonRequest {
    channel: u8,
    duration: u8,
    #[deku(pad_bytes_after = "1")]
    mode: u8,
    #[deku(bytes = "5")]
    address: u64,
}
impl Encode<9> for HifPoisonRequest {}

pub const HIF_POISON_ADDRESS_MAX: u64 = (1 << 40) - 1;

impl HifPoisonRequest {
    pub fn new(channel: u8, duration: u8, mode: u8, address: u64) -> Result<Self, DekuError> {
        if address > HIF_POISON_ADDRESS_MAX {
            return Err(DekuError::InvalidParam(
                format!("Poison address {address:#x} exceeds 40 bits").into(),
            ));
        }
        Ok(Self {
            channel,
            duration,
            mode,
            address,
        })
    }

    pub fn address(&self) -> u64 {
        self.address
    }
}

/// RX/TX flit CRC injection target.
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct MemIdRequest {
    pub mem_id: u8,
}
impl Encode<1> for MemIdRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct ViralRequest {
    pub ld_id: u8,
}
impl Encode<1> for ViralRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct EyeCapRunRequest {
    #[deku(pad_bytes_before = "1", pad_bytes_after = "2")]
    pub depth: u8,
    pub lane_mask: u32,
}
impl Encode<8> for EyeCapRunRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct EyeCapReadRequest {
    #[deku(pad_bytes_before = "1")]
    pub lane_id: u8,
    #[deku(pad_bytes_after = "1")]
    pub bin: u8,
}
impl Encode<4> for EyeCapReadRequest {}

pub const EYE_BER_ENTRIES: usize = 60;

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct EyeCapReadResponse {
    #[deku(pad_bytes_after = "7")]
    num_phases: u8,
    ber_data: [u32; EYE_BER_ENTRIES],
}

impl EyeCapReadResponse {
    pub fn num_phases(&self) -> u8 {
        self.num_phases
    }

    /// Bit error rate samples for the reported phases.
    pub fn ber_data(&self) -> &[u32] {
        let n = usize::from(self.num_phases).min(EYE_BER_ENTRIES);
        &self.ber_data[..n]
    }
}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct LaneRequest {
    pub lane_id: u32,
}
impl Encode<4> for LaneRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct AdaptGetResponse {
    pub pga_gain: u8,
    pub pga_off2: u8,
    pub pga_off1: u8,
    /// Coefficients a2 through a10.
    pub cdfe: [u8; 9],
    pub zobel_a_gain: u8,
    pub zobel_b_gain: u8,
    pub zobel_dc_offset: u16,
    pub udfe_thr_0: u16,
    pub udfe_thr_1: u16,
    pub dc_offset: u16,
    pub median_amp: u16,
    pub ph_ofs_t: u8,
}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct AdaptOneoffRequest {
    pub lane_id: u32,
    pub preload: u32,
    pub loops: u32,
    pub objects: u32,
}
impl Encode<16> for AdaptOneoffRequest {}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct AdaptForceRequest {
    pub lane_id: u32,
    pub rate: u32,
    pub vdd_bias: u32,
    pub ssc: u32,
    pub pga_gain: u8,
    pub pga_a0: u8,
    pub pga_off: u8,
    /// Coefficients a2 through a10.
    pub cdfe: [u8; 9],
    pub dc_offset: u16,
    pub zobel_dc_offset: u16,
    pub udfe_thr_0: u16,
    pub udfe_thr_1: u16,
    pub median_amp: u16,
    pub zobel_a_gain: u8,
    pub ph_ofs_t: u8,
}
impl Encode<40> for AdaptForceRequest {}

flags! {
    pub enum HealthCounter: u32 {
        TemperatureThresholdExceeded = 1 << 0,
        PowerOnEvents = 1 << 1,
        PowerOnHours = 1 << 2,
        CxlMemLinkCrcErrors = 1 << 3,
        CxlIoLinkLcrcErrors = 1 << 4,
        CxlIoLinkEcrcErrors = 1 << 5,
        DdrSingleEccErrors = 1 << 6,
        DdrDoubleEccErrors = 1 << 7,
        LinkRecoveryEvents = 1 << 8,
        TimeInThrottled = 1 << 9,
    }
}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct HealthCountersClearRequest {
    pub counters: WireFlagSet<HealthCounter>,
}
impl Encode<4> for HealthCountersClearRequest {}

impl From<FlagSet<HealthCounter>> for HealthCountersClearRequest {
    fn from(counters: FlagSet<HealthCounter>) -> Self {
        Self {
            counters: counters.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct HealthCountersResponse {
    pub temperature_threshold_exceeded: u32,
    pub power_on_events: u32,
    pub power_on_hours: u32,
    pub cxl_mem_link_crc_errors: u32,
    pub cxl_io_link_lcrc_errors: u32,
    pub cxl_io_link_ecrc_errors: u32,
    pub ddr_single_ecc_errors: u32,
    pub ddr_double_ecc_errors: u32,
    pub link_recovery_events: u32,
    pub time_in_throttled: u32,
}
