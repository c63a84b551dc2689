// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
//! Typed mailbox commands.
//!
//! Each marker type names one command: its target (a logical command id or a
//! raw opcode), the request and response payload types and their wire sizes.
//! [`crate::Mailbox::execute`] runs any of them.
use core::fmt;

use deku::{DekuContainerRead, DekuError};

use crate::Encode;
use crate::cxl::events::{EventInterruptPolicy, EventRecordsResponse, GetEventRecordsRequest, TimestampPayload};
use crate::cxl::firmware::{ActivateFwRequest, FwInfoResponse, HboStatusResponse, TransferFwRequest};
use crate::cxl::vendor::{
    AdaptForceRequest, AdaptGetResponse, AdaptOneoffRequest, CounterValueResponse,
    DdrGenericSelectRequest, DdrInfoRequest, DdrInfoResponse, DeviceInfoResponse,
    DrsInjectionRequest, EyeCapReadRequest, EyeCapReadResponse, EyeCapRunRequest,
    HctBufferStatusResponse, HctInstanceRequest, HctPlatParamsResponse,
    HctStartStopTriggerRequest, HealthCountersClearRequest, HealthCountersResponse,
    HifCounterRequest, HifPoisonRequest, L2rCountResponse, LaneRequest, LdInfoResponse,
    LtmonBasicCfgRequest, LtmonCaptureLogDumpRequest, LtmonCaptureLogDumpResponse,
    LtmonCaptureRequest, LtmonCaptureStatResponse, LtmonControlRequest, LtmonTargetRequest,
    LtmonWatchRequest, MemIdRequest, MtaCounterRequest, MtaHifSetRequest, MtaLtifSetRequest,
    OsaAnaOpRequest, OsaCapCtrlRequest, OsaCfgDumpResponse, OsaOsTypeTrigCfgRequest,
    OsaStatusResponse, OsaTargetRequest, ViralRequest,
};
use crate::cxl::{
    AlertConfigResponse, CommandId, HealthInfoResponse, IdentifyResponse, PayloadSize,
    SetAlertConfigRequest, SupportedLogsResponse,
};

/// How a command is addressed through the kernel interface.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Target {
    Logical(CommandId),
    Raw(u16),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logical(id) => f.write_str(id.name()),
            Self::Raw(opcode) => write!(f, "raw opcode {opcode:#06x}"),
        }
    }
}

pub trait MailboxCommand {
    const NAME: &'static str;
    const TARGET: Target;
    const SIZE_IN: PayloadSize;
    const SIZE_OUT: PayloadSize;

    type Request;
    type Response;

    /// Write the request into `buf`, which is at least `SIZE_IN` bytes.
    fn encode(req: &Self::Request, buf: &mut [u8]) -> Result<(), DekuError>;

    fn decode(bytes: &[u8]) -> Result<Self::Response, DekuError>;
}

macro_rules! payload_size {
    (var) => {
        PayloadSize::Variable
    };
    ($n:literal) => {
        PayloadSize::Fixed($n)
    };
}

macro_rules! encode_request {
    ((), $size:tt, $req:ident, $buf:ident) => {{
        let _ = ($req, $buf);
        Ok(())
    }};
    ($t:ident, $size:literal, $req:ident, $buf:ident) => {{
        let (bytes, len) = <$t as Encode<$size>>::encode($req)?;
        let cap = $buf.len();
        let dst = $buf.get_mut(..len).ok_or_else(|| {
            DekuError::InvalidParam(
                format!("{} needs {len} bytes, buffer holds {cap}", stringify!($t)).into(),
            )
        })?;
        dst.copy_from_slice(&bytes[..len]);
        Ok(())
    }};
}

macro_rules! decode_response {
    ((), $bytes:ident) => {{
        let _ = $bytes;
        Ok(())
    }};
    ($t:ident, $bytes:ident) => {{
        let (_, resp) = <$t as DekuContainerRead>::from_bytes(($bytes, 0))?;
        Ok(resp)
    }};
}

macro_rules! mailbox_commands {
    ($(
        $(#[$meta:meta])*
        $name:ident($label:literal): $target:expr, $req:tt[$size_in:tt] => $resp:tt[$size_out:tt];
    )*) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug)]
            pub struct $name;

            impl MailboxCommand for $name {
                const NAME: &'static str = $label;
                const TARGET: Target = $target;
                const SIZE_IN: PayloadSize = payload_size!($size_in);
                const SIZE_OUT: PayloadSize = payload_size!($size_out);

                type Request = $req;
                type Response = $resp;

                fn encode(req: &Self::Request, buf: &mut [u8]) -> Result<(), DekuError> {
                    encode_request!($req, $size_in, req, buf)
                }

                fn decode(bytes: &[u8]) -> Result<Self::Response, DekuError> {
                    decode_response!($resp, bytes)
                }
            }
        )*
    };
}

use Target::{Logical, Raw};

mailbox_commands! {
    // CXL 2.0, 8.2.9.5.1.1
    Identify("Identify"): Logical(CommandId::Identify), ()[0] => IdentifyResponse[67];
    // CXL 2.0, 8.2.9.5.3.1
    GetHealthInfo("Get Health Info"): Logical(CommandId::GetHealthInfo), ()[0] => HealthInfoResponse[18];
    // CXL 2.0, 8.2.9.5.3.2
    GetAlertConfig("Get Alert Configuration"): Logical(CommandId::GetAlertConfig), ()[0] => AlertConfigResponse[16];
    // CXL 2.0, 8.2.9.5.3.3
    SetAlertConfig("Set Alert Configuration"): Logical(CommandId::SetAlertConfig), SetAlertConfigRequest[12] => ()[0];
    // CXL 2.0, 8.2.9.4.1
    GetSupportedLogs("Get Supported Logs"): Logical(CommandId::GetSupportedLogs), ()[0] => SupportedLogsResponse[var];

    // CXL 2.0, 8.2.9.1
    GetEventRecords("Get Event Records"): Raw(0x0100), GetEventRecordsRequest[1] => EventRecordsResponse[var];
    GetEventInterruptPolicy("Get Event Interrupt Policy"): Raw(0x0102), ()[0] => EventInterruptPolicy[4];
    SetEventInterruptPolicy("Set Event Interrupt Policy"): Raw(0x0103), EventInterruptPolicy[4] => ()[0];

    // CXL 2.0, 8.2.9.2
    GetFwInfo("Get FW Info"): Raw(0x0200), ()[0] => FwInfoResponse[80];
    TransferFw("Transfer FW"): Raw(0x0201), TransferFwRequest[256] => ()[0];
    ActivateFw("Activate FW"): Raw(0x0202), ActivateFwRequest[2] => ()[0];

    // CXL 2.0, 8.2.9.3
    GetTimestamp("Get Timestamp"): Raw(0x0300), ()[0] => TimestampPayload[8];
    SetTimestamp("Set Timestamp"): Raw(0x0301), TimestampPayload[8] => ()[0];

    GetLdInfo("Get LD Info"): Raw(0x5400), ()[0] => LdInfoResponse[11];
    DeviceInfoGet("Device Info Get"): Raw(0xc000), ()[0] => DeviceInfoResponse[8];
    DdrInfo("DDR Info"): Raw(0xc500), DdrInfoRequest[1] => DdrInfoResponse[8];

    HctGetPlatParams("HCT Get Platform Parameters"): Raw(0xc600), ()[0] => HctPlatParamsResponse[var];
    HctStartStopTrigger("HCT Start/Stop Trigger"): Raw(0xc603), HctStartStopTriggerRequest[2] => ()[0];
    HctGetBufferStatus("HCT Get Buffer Status"): Raw(0xc604), HctInstanceRequest[1] => HctBufferStatusResponse[2];
    HctEnable("HCT Enable"): Raw(0xc606), HctInstanceRequest[1] => ()[0];

    LtmonCaptureClear("LTMON Capture Clear"): Raw(0xc70a), LtmonTargetRequest[2] => ()[0];
    LtmonCapture("LTMON Capture"): Raw(0xc70c), LtmonCaptureRequest[8] => ()[0];
    LtmonCaptureFreezeRestore("LTMON Capture Freeze and Restore"): Raw(0xc70e), LtmonControlRequest[4] => ()[0];
    LtmonL2rCountDump("LTMON L2R Count Dump"): Raw(0xc710), LtmonTargetRequest[2] => L2rCountResponse[4];
    LtmonL2rCountClear("LTMON L2R Count Clear"): Raw(0xc711), LtmonTargetRequest[2] => ()[0];
    LtmonBasicCfg("LTMON Basic Config"): Raw(0xc712), LtmonBasicCfgRequest[4] => ()[0];
    LtmonWatch("LTMON Watch"): Raw(0xc713), LtmonWatchRequest[12] => ()[0];
    LtmonCaptureStat("LTMON Capture Status"): Raw(0xc714), LtmonTargetRequest[2] => LtmonCaptureStatResponse[12];
    LtmonCaptureLogDump("LTMON Capture Log Dump"): Raw(0xc715), LtmonCaptureLogDumpRequest[8] => LtmonCaptureLogDumpResponse[16];
    LtmonCaptureTrigger("LTMON Capture Trigger"): Raw(0xc716), LtmonControlRequest[4] => ()[0];
    LtmonEnable("LTMON Enable"): Raw(0xc780), LtmonControlRequest[4] => ()[0];

    OsaOsTypeTrigCfg("OSA OS Type Trigger Config"): Raw(0xc800), OsaOsTypeTrigCfgRequest[12] => ()[0];
    OsaCapCtrl("OSA Capture Control"): Raw(0xc803), OsaCapCtrlRequest[16] => ()[0];
    OsaCfgDump("OSA Config Dump"): Raw(0xc804), OsaTargetRequest[4] => OsaCfgDumpResponse[60];
    OsaAnaOp("OSA Analyzer Operation"): Raw(0xc805), OsaAnaOpRequest[4] => ()[0];
    OsaStatusQuery("OSA Status Query"): Raw(0xc806), OsaTargetRequest[4] => OsaStatusResponse[8];
    OsaAccessRelease("OSA Access Release"): Raw(0xc808), OsaTargetRequest[4] => ()[0];

    MtaLtifSet("MTA LTIF Set"): Raw(0xca00), MtaLtifSetRequest[20] => ()[0];
    MtaGet("MTA Get"): Raw(0xca01), MtaCounterRequest[5] => CounterValueResponse[8];
    MtaLatchValGet("MTA Latch Value Get"): Raw(0xca02), MtaCounterRequest[5] => CounterValueResponse[8];
    MtaCounterClear("MTA Counter Clear"): Raw(0xca03), MtaCounterRequest[5] => ()[0];
    MtaCntValLatch("MTA Counter Value Latch"): Raw(0xca04), MtaCounterRequest[5] => ()[0];
    MtaHifSet("MTA HIF Set"): Raw(0xca05), MtaHifSetRequest[20] => ()[0];
    MtaHifCfgGet("MTA HIF Config Get"): Raw(0xca06), HifCounterRequest[4] => CounterValueResponse[8];
    MtaHifLatchValGet("MTA HIF Latch Value Get"): Raw(0xca07), HifCounterRequest[4] => CounterValueResponse[8];
    MtaHifCounterClear("MTA HIF Counter Clear"): Raw(0xca08), HifCounterRequest[4] => ()[0];
    MtaHifCntValLatch("MTA HIF Counter Value Latch"): Raw(0xca09), HifCounterRequest[4] => ()[0];
    DdrGenericSelect("DDR Generic Select"): Raw(0xca10), DdrGenericSelectRequest[13] => ()[0];

    ErrInjHifPoison("Inject HIF Poison"): Raw(0xcb00), HifPoisonRequest[9] => ()[0];
    ErrInjDrsPoison("Inject DRS Poison"): Raw(0xcb02), DrsInjectionRequest[6] => ()[0];
    ErrInjDrsEcc("Inject DRS ECC"): Raw(0xcb03), DrsInjectionRequest[6] => ()[0];
    ErrInjRxFlitCrc("Inject RX Flit CRC"): Raw(0xcb04), MemIdRequest[1] => ()[0];
    ErrInjTxFlitCrc("Inject TX Flit CRC"): Raw(0xcb05), MemIdRequest[1] => ()[0];
    ErrInjViral("Inject Viral"): Raw(0xcb06), ViralRequest[1] => ()[0];

    EyeCapRun("Eye Capture Run"): Raw(0xcc00), EyeCapRunRequest[8] => ()[0];
    EyeCapRead("Eye Capture Read"): Raw(0xcc02), EyeCapReadRequest[4] => EyeCapReadResponse[248];
    AdaptGet("Adaptation Get"): Raw(0xcc03), LaneRequest[4] => AdaptGetResponse[28];
    AdaptOneoff("Adaptation One-off"): Raw(0xcc04), AdaptOneoffRequest[16] => ()[0];
    AdaptForce("Adaptation Force"): Raw(0xcc05), AdaptForceRequest[40] => ()[0];

    HboStatus("Hidden BO Status"): Raw(0xcd00), ()[0] => HboStatusResponse[8];
    HboTransferFw("Hidden BO Transfer FW"): Raw(0xcd01), ()[0] => ()[0];
    HboActivateFw("Hidden BO Activate FW"): Raw(0xcd02), ()[0] => ()[0];

    HealthCountersClear("Health Counters Clear"): Raw(0xce00), HealthCountersClearRequest[4] => ()[0];
    HealthCountersGet("Health Counters Get"): Raw(0xce01), ()[0] => HealthCountersResponse[40];
}

#[cfg(test)]
mod test {
    use super::{
        GetSupportedLogs, GetTimestamp, HboTransferFw, Identify, MailboxCommand, MtaGet,
        SetTimestamp, Target, TransferFw,
    };
    use crate::cxl::events::TimestampPayload;
    use crate::cxl::vendor::MtaCounterRequest;
    use crate::cxl::{CommandId, PayloadSize};

    #[test]
    fn table_metadata() {
        assert_eq!(Identify::TARGET, Target::Logical(CommandId::Identify));
        assert_eq!(Identify::SIZE_OUT, PayloadSize::Fixed(0x43));
        assert_eq!(GetSupportedLogs::SIZE_OUT, PayloadSize::Variable);
        assert_eq!(TransferFw::SIZE_IN, PayloadSize::Fixed(256));
        assert_eq!(HboTransferFw::SIZE_IN, PayloadSize::Fixed(0));
        assert_eq!(MtaGet::TARGET, Target::Raw(0xca01));
        assert_eq!(Target::Raw(0xca01).to_string(), "raw opcode 0xca01");
        assert_eq!(Target::Logical(CommandId::GetLog).to_string(), "Get Log");
    }

    #[test]
    fn encode_into_payload() {
        let mut buf = [0xffu8; 8];
        SetTimestamp::encode(&TimestampPayload { timestamp: 0x0102 }, &mut buf).unwrap();
        assert_eq!(buf, [0x02, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn encode_short_buffer() {
        let req = MtaCounterRequest {
            counter_type: 0,
            counter: 1,
        };
        let mut buf = [0u8; 4];
        let err = MtaGet::encode(&req, &mut buf).unwrap_err();
        assert!(err.to_string().contains("needs 5 bytes, buffer holds 4"));
        assert_eq!(buf, [0u8; 4]);
    }

    #[test]
    fn decode_boundaries() {
        for ts in [0, u64::MAX] {
            let resp = GetTimestamp::decode(&ts.to_le_bytes()).unwrap();
            assert_eq!(resp.timestamp, ts);
        }
        assert!(GetTimestamp::decode(&[0u8; 4]).is_err());
    }

    #[test]
    fn empty_payloads() {
        let mut buf = [0u8; 0];
        HboTransferFw::encode(&(), &mut buf).unwrap();
        HboTransferFw::decode(&[]).unwrap();
    }
}
