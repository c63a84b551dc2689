// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
use deku::ctx::Endian;
use deku::{DekuRead, DekuWrite};
use flagset::{FlagSet, flags};

use crate::Encode;
use crate::wire::{WireFlagSet, WireString};

/// Firmware package bytes carried by one Transfer FW request.
pub const FW_BLOCK_SIZE: usize = 128;
pub const TRANSFER_FW_SIZE: usize = 128 + FW_BLOCK_SIZE;

// CXL 2.0, 8.2.9.2.2
pub const TRANSFER_FW_OPCODE: u16 = 0x0201;
/// Transfer FW issued as a hidden background operation.
pub const HBO_TRANSFER_FW_OPCODE: u16 = 0xcd01;

// CXL 2.0, 8.2.9.2.1, FW Activation Capabilities
flags! {
    #[repr(u8)]
    pub enum ActivationCaps: u8 {
        OnlineActivation = 1 << 0,
    }
}

// CXL 2.0, 8.2.9.2.1
#[derive(Clone, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct FwInfoResponse {
    slots_supported: u8,
    slot_info: u8,
    #[deku(pad_bytes_after = "13")]
    activation_caps: WireFlagSet<ActivationCaps>,
    slot1: WireString<16>,
    slot2: WireString<16>,
    slot3: WireString<16>,
    slot4: WireString<16>,
}

pub const FW_INFO_SIZE: usize = 0x50;

impl FwInfoResponse {
    pub fn slots_supported(&self) -> u8 {
        self.slots_supported
    }

    /// Undecoded FW Slot Info byte.
    pub fn slot_info(&self) -> u8 {
        self.slot_info
    }

    /// Bits 2:0 of the slot info byte.
    ///
    /// Decoded with a bitwise mask. Some management tools reduce the field
    /// with a logical AND instead, reporting slot 1 for any non-zero byte; use
    /// [`Self::slot_info`] to reproduce that reading if required.
    pub fn active_slot(&self) -> u8 {
        self.slot_info & 0x07
    }

    /// Bits 5:3 of the slot info byte, `None` when no firmware is staged.
    pub fn staged_slot(&self) -> Option<u8> {
        let slot = (self.slot_info & 0x38) >> 3;
        (slot != 0).then_some(slot)
    }

    pub fn activation_caps(&self) -> FlagSet<ActivationCaps> {
        self.activation_caps.get()
    }

    /// Revision string for 1-based `slot`.
    pub fn slot_revision(&self, slot: u8) -> Option<&str> {
        self.slot(slot).map(WireString::as_str)
    }

    /// Undecoded revision field for 1-based `slot`.
    pub fn slot_revision_bytes(&self, slot: u8) -> Option<&[u8; 16]> {
        self.slot(slot).map(WireString::as_bytes)
    }

    fn slot(&self, slot: u8) -> Option<&WireString<16>> {
        match slot {
            1 => Some(&self.slot1),
            2 => Some(&self.slot2),
            3 => Some(&self.slot3),
            4 => Some(&self.slot4),
            _ => None,
        }
    }
}

// CXL 2.0, 8.2.9.2.2, Action
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(id_type = "u8", endian = "endian", ctx = "endian: Endian")]
#[repr(u8)]
pub enum FwTransferAction {
    Full = 0x00,
    Initiate = 0x01,
    Continue = 0x02,
    End = 0x03,
    Abort = 0x04,
}

// CXL 2.0, 8.2.9.2.2
#[derive(Clone, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct TransferFwRequest {
    pub action: FwTransferAction,
    #[deku(pad_bytes_after = "2")]
    pub slot: u8,
    /// In units of 128 bytes.
    #[deku(pad_bytes_after = "120")]
    pub offset: u32,
    pub data: [u8; FW_BLOCK_SIZE],
}
impl Encode<TRANSFER_FW_SIZE> for TransferFwRequest {}

// CXL 2.0, 8.2.9.2.3, Action
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(id_type = "u8", endian = "endian", ctx = "endian: Endian")]
#[repr(u8)]
pub enum FwActivateAction {
    Online = 0x00,
    NextColdReset = 0x01,
}

// CXL 2.0, 8.2.9.2.3
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct ActivateFwRequest {
    pub action: FwActivateAction,
    pub slot: u8,
}
impl Encode<2> for ActivateFwRequest {}

/// Hidden background operation status word.
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct HboStatusResponse {
    status: u64,
}

impl HboStatusResponse {
    pub fn raw(&self) -> u64 {
        self.status
    }

    pub fn opcode(&self) -> u16 {
        (self.status & 0xffff) as u16
    }

    pub fn percent_complete(&self) -> u8 {
        ((self.status >> 16) & 0x7f) as u8
    }

    pub fn is_running(&self) -> bool {
        self.status & (1 << 23) != 0
    }

    pub fn return_code(&self) -> u16 {
        ((self.status >> 32) & 0xffff) as u16
    }

    pub fn extended_status(&self) -> u16 {
        (self.status >> 48) as u16
    }
}
