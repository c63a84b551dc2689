// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
use std::io::{Read, Seek, Write};

use deku::{DekuError, DekuReader, DekuWriter, ctx::Limit, reader::Reader, writer::Writer};

/// Bounded list whose length is given by a preceding count field.
///
/// Only [`Limit::Count`] is supported: the element count always comes from
/// the payload itself and reading never walks past it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WireVec<T, const S: usize>(heapless::Vec<T, S>);

impl<T, const S: usize> WireVec<T, S> {
    pub fn new() -> Self {
        Self(heapless::Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, item: T) -> Result<(), T> {
        self.0.push(item)
    }

    pub fn as_slice(&self) -> &[T] {
        self.0.as_slice()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.0.iter()
    }
}

impl<T: Clone, const S: usize> WireVec<T, S> {
    pub fn from_slice(items: &[T]) -> Result<Self, ()> {
        heapless::Vec::from_slice(items).map(Self)
    }
}

impl<'a, T, Ctx, Predicate, const S: usize> DekuReader<'a, (Limit<T, Predicate>, Ctx)>
    for WireVec<T, S>
where
    T: DekuReader<'a, Ctx>,
    Ctx: Copy,
    Predicate: FnMut(&T) -> bool,
{
    fn from_reader_with_ctx<R: Read + Seek>(
        reader: &mut Reader<R>,
        (limit, inner_ctx): (Limit<T, Predicate>, Ctx),
    ) -> Result<Self, DekuError>
    where
        Self: Sized,
    {
        let Limit::Count(count) = limit else {
            return Err(DekuError::InvalidParam(
                "WireVec requires a count limit".into(),
            ));
        };

        if count > S {
            return Err(DekuError::InvalidParam(
                format!("Count {count} exceeds WireVec capacity {S}").into(),
            ));
        }

        let mut res = WireVec::new();
        for _ in 0..count {
            let val = <T>::from_reader_with_ctx(reader, inner_ctx)?;
            if res.push(val).is_err() {
                return Err(DekuError::InvalidParam(
                    "Failed to insert item into WireVec".into(),
                ));
            }
        }

        Ok(res)
    }
}

impl<T: DekuWriter<Ctx>, Ctx: Copy, const S: usize> DekuWriter<Ctx> for WireVec<T, S> {
    fn to_writer<W: Write + Seek>(
        &self,
        writer: &mut Writer<W>,
        inner_ctx: Ctx,
    ) -> Result<(), DekuError> {
        for v in &self.0 {
            v.to_writer(writer, inner_ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use deku::{DekuReader, ctx::Endian, ctx::Limit, reader::Reader};

    use super::WireVec;

    #[test]
    fn reads_exactly_count() {
        const DATA: [u8; 6] = [0x01, 0x00, 0x02, 0x00, 0xff, 0xff];

        let mut cursor = Cursor::new(&DATA);
        let mut reader = Reader::new(&mut cursor);
        let handles = WireVec::<u16, 4>::from_reader_with_ctx(
            &mut reader,
            (Limit::new_count(2), Endian::Little),
        )
        .unwrap();
        assert_eq!(handles.as_slice(), &[1, 2]);
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn zero_count() {
        const DATA: [u8; 0] = [];

        let mut cursor = Cursor::new(&DATA);
        let mut reader = Reader::new(&mut cursor);
        let handles = WireVec::<u16, 4>::from_reader_with_ctx(
            &mut reader,
            (Limit::new_count(0), Endian::Little),
        )
        .unwrap();
        assert!(handles.is_empty());
    }

    #[test]
    fn count_over_capacity() {
        const DATA: [u8; 6] = [0; 6];

        let mut cursor = Cursor::new(&DATA);
        let mut reader = Reader::new(&mut cursor);
        let res = WireVec::<u16, 2>::from_reader_with_ctx(
            &mut reader,
            (Limit::new_count(3), Endian::Little),
        );
        assert!(res.is_err());
    }
}
