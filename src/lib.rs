// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
mod command;
pub mod commands;
mod config;
pub mod cxl;
mod error;
mod mailbox;
mod memdev;
mod status;
pub mod transport;
mod wire;

pub use command::{Command, QueryStatus, SharedCommand, State};
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use mailbox::Mailbox;
pub use memdev::{Context, DeviceSource, Memdev, MemdevBuilder, StaticSource, SysfsSource};
pub use status::{FirmwareStatus, MboxStatus};
pub use wire::{WireFlagSet, WireString, WireUuid, WireVec};

extern crate deku;
extern crate num_derive;

use std::io::Cursor;

use deku::{DekuError, DekuWriter, writer::Writer};

/// Fixed wire size `S` of a request payload.
///
/// Encoding writes into a zeroed `S` byte array, so reserved bytes the layout
/// does not cover stay zero.
pub trait Encode<const S: usize>: DekuWriter {
    fn encode(&self) -> core::result::Result<([u8; S], usize), DekuError> {
        let mut buf = [0u8; S];
        let len = {
            let mut cursor = Cursor::new(buf.as_mut_slice());
            {
                let mut writer = Writer::new(&mut cursor);
                self.to_writer(&mut writer, ())?;
                writer.finalize()?;
            }
            cursor.position() as usize
        };
        Ok((buf, len))
    }
}
