// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
use core::fmt;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

// CXL 2.0, 8.2.8.4.5.1, Command Return Codes
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, Hash, PartialEq)]
#[repr(u16)]
pub enum MboxStatus {
    Success = 0x00,
    BackgroundCommandStarted = 0x01,
    InvalidInput = 0x02,
    Unsupported = 0x03,
    InternalError = 0x04,
    RetryRequired = 0x05,
    Busy = 0x06,
    MediaDisabled = 0x07,
    FwTransferInProgress = 0x08,
    FwTransferOutOfOrder = 0x09,
    FwAuthenticationFailed = 0x0a,
    InvalidSlot = 0x0b,
    ActivationFailedRolledBack = 0x0c,
    ActivationFailedColdReset = 0x0d,
    InvalidHandle = 0x0e,
    InvalidPhysicalAddress = 0x0f,
    InjectPoisonLimitReached = 0x10,
    PermanentMediaFailure = 0x11,
    Aborted = 0x12,
    InvalidSecurityState = 0x13,
    IncorrectPassphrase = 0x14,
    UnsupportedMailbox = 0x15,
    InvalidPayloadLength = 0x16,
}

pub const MBOX_STATUS_COUNT: usize = 23;

const DESCRIPTIONS: [&str; MBOX_STATUS_COUNT] = [
    "Success: the command completed successfully",
    "Background Command Started: poll the background command status for the result",
    "Invalid Input: a command input was invalid",
    "Unsupported: the command is not supported",
    "Internal Error: the command failed due to an internal device error",
    "Retry Required: a temporary error occurred, a single retry may succeed",
    "Busy: a background operation is running, retry once it completes",
    "Media Disabled: the command needs media access and media is disabled",
    "FW Transfer in Progress: finish the current firmware package transfer first",
    "FW Transfer Out of Order: package content was transferred out of order and the transfer was aborted",
    "FW Authentication Failed: the package failed authentication and was not saved",
    "Invalid Slot: the firmware slot is not supported or not valid for this operation",
    "Activation Failed, FW Rolled Back: the new firmware failed to activate and the previous firmware is active",
    "Activation Failed, Cold Reset Required: the new firmware failed to activate",
    "Invalid Handle: one or more event record handles were invalid",
    "Invalid Physical Address: the physical address is invalid",
    "Inject Poison Limit Reached: clear injected poison before injecting more",
    "Permanent Media Failure: poison could not be cleared due to a permanent media issue",
    "Aborted: the device aborted the background command",
    "Invalid Security State: the command is not valid in the current security state",
    "Incorrect Passphrase: the passphrase does not match the one currently set",
    "Unsupported Mailbox: the command is not supported on this mailbox",
    "Invalid Payload Length: the payload length in the command register is not valid",
];

impl MboxStatus {
    pub fn description(self) -> &'static str {
        DESCRIPTIONS[self as usize]
    }

    /// The device's own semantics allow the command to be reissued unchanged.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RetryRequired | Self::Busy)
    }
}

/// Mailbox return code as reported by the device after executing a command.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FirmwareStatus {
    Known(MboxStatus),
    /// Outside the defined return code table.
    Unmapped(u32),
}

impl FirmwareStatus {
    pub fn from_retval(retval: u32) -> Self {
        match MboxStatus::from_u32(retval) {
            Some(s) => Self::Known(s),
            None => Self::Unmapped(retval),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::Known(s) => *s as u32,
            Self::Unmapped(c) => *c,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Known(MboxStatus::Success))
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Known(s) => s.is_retryable(),
            Self::Unmapped(_) => false,
        }
    }

    pub fn description(&self) -> Option<&'static str> {
        match self {
            Self::Known(s) => Some(s.description()),
            Self::Unmapped(_) => None,
        }
    }
}

impl fmt::Display for FirmwareStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(s) => write!(f, "{}: {}", *s as u32, s.description()),
            Self::Unmapped(c) => write!(f, "{c}: unknown firmware status"),
        }
    }
}
