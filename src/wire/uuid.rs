// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
use std::io::{Read, Seek, Write};

use deku::{DekuError, DekuReader, DekuWriter, reader::Reader, writer::Writer};
use uuid::Uuid;

/// GUID carried as 16 bytes in textual order, as log and event record
/// identifiers are.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WireUuid(Uuid);

impl WireUuid {
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for WireUuid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl<'a, Ctx> DekuReader<'a, Ctx> for WireUuid
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
        let mut val = [0u8; 16];
        for b in val.iter_mut() {
            *b = <u8>::from_reader_with_ctx(reader, inner_ctx)?;
        }
        Ok(Self(Uuid::from_bytes(val)))
    }
}

impl<Ctx: Copy> DekuWriter<Ctx> for WireUuid
where
    u8: DekuWriter<Ctx>,
{
    fn to_writer<W: Write + Seek>(
        &self,
        writer: &mut Writer<W>,
        inner_ctx: Ctx,
    ) -> Result<(), DekuError> {
        for b in self.0.into_bytes() {
            b.to_writer(writer, inner_ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use deku::{DekuReader, reader::Reader};
    use uuid::uuid;

    use super::WireUuid;

    #[test]
    fn textual_byte_order() {
        #[rustfmt::skip]
        const CEL: [u8; 16] = [
            0x0d, 0xa9, 0xc0, 0xb5, 0xbf, 0x41, 0x4b, 0x78,
            0x8f, 0x79, 0x96, 0xb1, 0x62, 0x3b, 0x3f, 0x17,
        ];

        let mut cursor = Cursor::new(&CEL);
        let mut reader = Reader::new(&mut cursor);
        let id = WireUuid::from_reader_with_ctx(&mut reader, ()).unwrap();
        assert_eq!(id.uuid(), uuid!("0da9c0b5-bf41-4b78-8f79-96b1623b3f17"));
    }
}
