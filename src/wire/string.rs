// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
use std::io::{Read, Seek, Write};

use deku::{DekuError, DekuReader, DekuWriter, reader::Reader, writer::Writer};
use log::debug;

/// Fixed-width, NUL padded ASCII field such as a firmware revision.
///
/// Exactly `S` bytes are consumed on read. The text view stops at the first
/// NUL and shows bytes outside printable ASCII as `?`; [`Self::as_bytes`]
/// keeps the field exactly as read.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WireString<const S: usize> {
    string: heapless::String<S>,
    raw: [u8; S],
}

impl<const S: usize> Default for WireString<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const S: usize> WireString<S> {
    pub fn new() -> Self {
        Self {
            string: heapless::String::new(),
            raw: [0u8; S],
        }
    }

    pub fn from(string: &str) -> Result<Self, ()> {
        let mut res = Self::new();
        if res.string.push_str(string).is_err() {
            debug!("'{string}' does not fit in {S} bytes");
            return Err(());
        }
        res.raw[..string.len()].copy_from_slice(string.as_bytes());
        Ok(res)
    }

    pub fn as_str(&self) -> &str {
        self.string.as_str()
    }

    /// The field as it appears on the wire, padding included.
    pub fn as_bytes(&self) -> &[u8; S] {
        &self.raw
    }
}

impl<'a, Ctx, const S: usize> DekuReader<'a, Ctx> for WireString<S>
where
    Ctx: Copy,
    u8: DekuReader<'a, Ctx>,
{
    fn from_reader_with_ctx<R: Read + Seek>(
        reader: &mut Reader<R>,
        inner_ctx: Ctx,
    ) -> Result<Self, DekuError>
    where
        Self: Sized,
    {
        let mut res: WireString<S> = WireString::new();
        let mut terminated = false;

        for i in 0..S {
            let val = <u8>::from_reader_with_ctx(reader, inner_ctx)?;
            res.raw[i] = val;
            if val == 0 {
                terminated = true;
            }
            if terminated {
                continue;
            }
            let c = if val.is_ascii_graphic() || val == b' ' {
                val as char
            } else {
                '?'
            };
            if res.string.push(c).is_err() {
                return Err(DekuError::InvalidParam(
                    "Failed to insert item into WireString".into(),
                ));
            }
        }

        Ok(res)
    }
}

impl<Ctx: Copy, const S: usize> DekuWriter<Ctx> for WireString<S>
where
    u8: DekuWriter<Ctx>,
{
    fn to_writer<W: Write + Seek>(
        &self,
        writer: &mut Writer<W>,
        inner_ctx: Ctx,
    ) -> Result<(), DekuError> {
        for v in self.raw {
            v.to_writer(writer, inner_ctx)?;
        }
        Ok(())
    }
}
