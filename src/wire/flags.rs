// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
use std::io::{Read, Seek, Write};

use deku::{DekuError, DekuReader, DekuWriter, reader::Reader, writer::Writer};
use flagset::{FlagSet, Flags};
use log::debug;

/// Bitmask field decoded into a [`FlagSet`].
///
/// Devices are free to set bits that a later revision defines, so unknown
/// bits are dropped on read rather than failing the whole payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WireFlagSet<T: Flags>(pub FlagSet<T>);

impl<T: Flags> WireFlagSet<T> {
    pub fn get(&self) -> FlagSet<T> {
        self.0
    }

    pub fn contains(&self, flag: T) -> bool {
        self.0.contains(flag)
    }
}

impl<T: Flags> From<FlagSet<T>> for WireFlagSet<T> {
    fn from(value: FlagSet<T>) -> Self {
        Self(value)
    }
}

impl<T: Flags> Default for WireFlagSet<T> {
    fn default() -> Self {
        Self(FlagSet::empty())
    }
}

impl<'a, Ctx, T> DekuReader<'a, Ctx> for WireFlagSet<T>
where
    T: Flags,
    <T as Flags>::Type: DekuReader<'a, Ctx> + core::fmt::LowerHex,
{
    fn from_reader_with_ctx<R: Read + Seek>(
        reader: &mut Reader<R>,
        ctx: Ctx,
    ) -> Result<Self, DekuError>
    where
        Self: Sized,
    {
        let val = <<T as Flags>::Type>::from_reader_with_ctx(reader, ctx)?;
        let fs = FlagSet::new_truncated(val);
        if fs.bits() != val {
            debug!("Ignoring undefined flag bits in {val:#x}");
        }
        Ok(WireFlagSet(fs))
    }
}

impl<Ctx, T> DekuWriter<Ctx> for WireFlagSet<T>
where
    T: Flags,
    <T as Flags>::Type: DekuWriter<Ctx>,
{
    fn to_writer<W: Write + Seek>(
        &self,
        writer: &mut Writer<W>,
        ctx: Ctx,
    ) -> Result<(), DekuError> {
        self.0.bits().to_writer(writer, ctx)
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use deku::{DekuReader, DekuWriter, ctx::Endian, reader::Reader, writer::Writer};
    use flagset::{FlagSet, flags};

    use crate::wire::flags::WireFlagSet;

    flags! {
        enum RecordFlags: u8 {
            Overflow = 1 << 0,
            MoreRecords = 1 << 1,
        }

        enum EffectFlags: u16 {
            ColdReset = 1 << 0,
            Background = 1 << 6,
        }
    }

    #[test]
    fn empty() {
        let test_data = [0u8; 1];

        let mut cursor = Cursor::new(&test_data);
        let mut reader = Reader::new(&mut cursor);
        let flags = WireFlagSet::<RecordFlags>::from_reader_with_ctx(&mut reader, ()).unwrap();
        assert_eq!(flags, FlagSet::empty().into());
    }

    #[test]
    fn more_records() {
        let test_data = [2u8; 1];

        let mut cursor = Cursor::new(&test_data);
        let mut reader = Reader::new(&mut cursor);
        let flags = WireFlagSet::<RecordFlags>::from_reader_with_ctx(&mut reader, ()).unwrap();
        assert!(flags.contains(RecordFlags::MoreRecords));
        assert!(!flags.contains(RecordFlags::Overflow));

        let mut ret_data = [0xffu8; 1];
        let mut cursor = Cursor::new(ret_data.as_mut_slice());
        let mut writer = Writer::new(&mut cursor);
        flags.to_writer(&mut writer, ()).unwrap();

        assert_eq!(test_data, ret_data);
    }

    #[test]
    fn undefined_bits_dropped() {
        let test_data = [0x83u8; 1];

        let mut cursor = Cursor::new(&test_data);
        let mut reader = Reader::new(&mut cursor);
        let flags = WireFlagSet::<RecordFlags>::from_reader_with_ctx(&mut reader, ()).unwrap();
        assert_eq!(flags.get(), RecordFlags::Overflow | RecordFlags::MoreRecords);

        let mut ret_data = [0xffu8; 1];
        let mut cursor = Cursor::new(ret_data.as_mut_slice());
        let mut writer = Writer::new(&mut cursor);
        flags.to_writer(&mut writer, ()).unwrap();

        assert_eq!([0x03u8], ret_data);
    }

    #[test]
    fn little_endian_word() {
        let test_data = [0x41u8, 0x00];

        let mut cursor = Cursor::new(&test_data);
        let mut reader = Reader::new(&mut cursor);
        let flags =
            WireFlagSet::<EffectFlags>::from_reader_with_ctx(&mut reader, Endian::Little).unwrap();
        assert_eq!(flags.get(), EffectFlags::ColdReset | EffectFlags::Background);
    }
}
