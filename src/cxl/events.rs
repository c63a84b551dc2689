// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
use deku::ctx::Endian;
use deku::{DekuContainerRead, DekuError, DekuRead, DekuWrite};
use flagset::{FlagSet, flags};
use uuid::{Uuid, uuid};

use crate::Encode;
use crate::cxl::HealthInfoResponse;
use crate::wire::{WireFlagSet, WireUuid, WireVec};

pub const DRAM_EVENT_UUID: Uuid = uuid!("601dcbb3-9c06-4eab-b8af-4e9bfb5c9624");
pub const MEMORY_MODULE_EVENT_UUID: Uuid = uuid!("fe927475-dd59-4339-a586-79bab113b774");

/// Records retained from a single Get Event Records response.
pub const MAX_EVENT_RECORDS: usize = 20;

pub const EVENT_RECORD_SIZE: usize = 128;
pub const EVENT_RECORDS_HEADER_SIZE: usize = 32;

/// Upper bound on handles in one Clear Event Records request, set by the
/// single byte count field.
pub const MAX_CLEAR_HANDLES: usize = u8::MAX as usize;

// CXL 2.0, 8.2.9.1.2, Event Log
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(id_type = "u8", endian = "endian", ctx = "endian: Endian")]
#[repr(u8)]
pub enum EventLog {
    Informational = 0x00,
    Warning = 0x01,
    Failure = 0x02,
    Fatal = 0x03,
}

// CXL 2.0, 8.2.9.1.2
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct GetEventRecordsRequest {
    pub log: EventLog,
}
impl Encode<1> for GetEventRecordsRequest {}

// CXL 2.0, 8.2.9.1.2, Event Records flags
flags! {
    #[repr(u8)]
    pub enum EventRecordsFlags: u8 {
        Overflow = 1 << 0,
        MoreRecords = 1 << 1,
    }
}

// CXL 2.0, 8.2.9.1.2
#[derive(Clone, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct EventRecordsResponse {
    flags: WireFlagSet<EventRecordsFlags>,
    #[deku(seek_from_current = "1")]
    overflow_error_count: u16,
    first_overflow_timestamp: u64,
    last_overflow_timestamp: u64,
    record_count: u16,
    #[deku(
        seek_from_current = "10",
        count = "core::cmp::min(*record_count as usize, MAX_EVENT_RECORDS)"
    )]
    records: WireVec<EventRecord, MAX_EVENT_RECORDS>,
}

impl EventRecordsResponse {
    pub fn flags(&self) -> FlagSet<EventRecordsFlags> {
        self.flags.get()
    }

    pub fn overflow_error_count(&self) -> u16 {
        self.overflow_error_count
    }

    pub fn first_overflow_timestamp(&self) -> u64 {
        self.first_overflow_timestamp
    }

    pub fn last_overflow_timestamp(&self) -> u64 {
        self.last_overflow_timestamp
    }

    /// As reported by the device, which may exceed the retained records.
    pub fn record_count(&self) -> u16 {
        self.record_count
    }

    pub fn records(&self) -> &[EventRecord] {
        self.records.as_slice()
    }
}

// CXL 2.0, 8.2.9.1.1, Common Event Record
#[derive(Clone, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(ctx = "endian: Endian", endian = "endian")]
pub struct EventRecord {
    uuid: WireUuid,
    length: u8,
    flags: [u8; 3],
    handle: u16,
    related_handle: u16,
    timestamp: u64,
    #[deku(seek_from_current = "16")]
    data: [u8; 80],
}

/// Event-specific body of a record, selected by the record GUID.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EventBody {
    Dram(DramEventRecord),
    MemoryModule(MemoryModuleEventRecord),
    Other(Uuid),
}

impl EventRecord {
    pub fn uuid(&self) -> Uuid {
        self.uuid.uuid()
    }

    pub fn length(&self) -> u8 {
        self.length
    }

    /// The 24-bit flags field.
    pub fn flags(&self) -> u32 {
        let [a, b, c] = self.flags;
        u32::from_le_bytes([a, b, c, 0])
    }

    pub fn handle(&self) -> u16 {
        self.handle
    }

    pub fn related_handle(&self) -> u16 {
        self.related_handle
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn data(&self) -> &[u8; 80] {
        &self.data
    }

    pub fn body(&self) -> Result<EventBody, DekuError> {
        let uuid = self.uuid();
        if uuid == DRAM_EVENT_UUID {
            let (_, rec) = DramEventRecord::from_bytes((&self.data, 0))?;
            Ok(EventBody::Dram(rec))
        } else if uuid == MEMORY_MODULE_EVENT_UUID {
            let (_, rec) = MemoryModuleEventRecord::from_bytes((&self.data, 0))?;
            Ok(EventBody::MemoryModule(rec))
        } else {
            Ok(EventBody::Other(uuid))
        }
    }
}

// CXL 2.0, 8.2.9.1.1.2
#[derive(Clone, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct DramEventRecord {
    pub physical_address: u64,
    pub descriptor: u8,
    pub event_type: u8,
    pub transaction_type: u8,
    pub validity_flags: u16,
    pub channel: u8,
    pub rank: u8,
    #[deku(bytes = "3")]
    pub nibble_mask: u32,
    pub bank_group: u8,
    pub bank: u8,
    #[deku(bytes = "3")]
    pub row: u32,
    pub column: u16,
    pub correction_mask: [u8; 32],
}

// CXL 2.0, 8.2.9.1.1.3
#[derive(Clone, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct MemoryModuleEventRecord {
    pub event_type: u8,
    health_info: [u8; 18],
}

impl MemoryModuleEventRecord {
    /// The embedded snapshot, laid out as a Get Health Info response.
    pub fn health_info(&self) -> Result<HealthInfoResponse, DekuError> {
        let (_, info) = HealthInfoResponse::from_bytes((&self.health_info, 0))?;
        Ok(info)
    }
}

flags! {
    #[repr(u8)]
    pub enum ClearEventFlags: u8 {
        ClearAll = 1 << 0,
    }
}

// CXL 2.0, 8.2.9.1.3
#[derive(Clone, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct ClearEventRecordsRequest {
    log: EventLog,
    flags: WireFlagSet<ClearEventFlags>,
    #[deku(update = "self.handles.len()", pad_bytes_after = "3")]
    count: u8,
    #[deku(count = "count")]
    handles: WireVec<u16, MAX_CLEAR_HANDLES>,
}

impl ClearEventRecordsRequest {
    /// Clear the given records by handle.
    pub fn handles(log: EventLog, handles: &[u16]) -> Option<Self> {
        let handles = WireVec::from_slice(handles).ok()?;
        Some(Self {
            log,
            flags: FlagSet::default().into(),
            count: handles.len() as u8,
            handles,
        })
    }

    /// Clear every record in the log.
    pub fn all(log: EventLog) -> Self {
        Self {
            log,
            flags: FlagSet::from(ClearEventFlags::ClearAll).into(),
            count: 0,
            handles: WireVec::new(),
        }
    }

    pub fn wire_size(&self) -> usize {
        6 + 2 * self.handles.len()
    }
}

// CXL 2.0, 8.2.9.1.4
#[derive(Clone, Copy, Debug, Default, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct EventInterruptPolicy {
    pub informational: u8,
    pub warning: u8,
    pub failure: u8,
    pub fatal: u8,
}
impl Encode<4> for EventInterruptPolicy {}

impl EventInterruptPolicy {
    /// Unpack the big-endian word used by management tooling, with the
    /// informational setting in the most significant byte.
    pub fn from_be_packed(policy: u32) -> Self {
        let [informational, warning, failure, fatal] = policy.to_be_bytes();
        Self {
            informational,
            warning,
            failure,
            fatal,
        }
    }

    pub fn to_be_packed(&self) -> u32 {
        u32::from_be_bytes([self.informational, self.warning, self.failure, self.fatal])
    }
}

// CXL 2.0, 8.2.9.3.1 and 8.2.9.3.2
#[derive(Clone, Copy, Debug, Default, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct TimestampPayload {
    pub timestamp: u64,
}
impl Encode<8> for TimestampPayload {}
