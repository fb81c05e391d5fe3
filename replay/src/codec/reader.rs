use crate::errors::ReplayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// Reads fixed-width numbers off a byte slice. Every read is bounds checked;
/// running off the end is reported as corruption.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

macro_rules! read_number {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self) -> Result<$ty, ReplayError> {
            let bytes = self.array::<{ std::mem::size_of::<$ty>() }>()?;

            Ok(match self.order {
                ByteOrder::Little => <$ty>::from_le_bytes(bytes),
                ByteOrder::Big => <$ty>::from_be_bytes(bytes),
            })
        }
    };
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8], order: ByteOrder) -> Self {
        Self { buf, pos: 0, order }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Checks that `count` records of `record_size` bytes fit in what's left.
    pub fn ensure_records(&self, count: usize, record_size: usize, player: usize) -> Result<(), ReplayError> {
        let needed = count.checked_mul(record_size);

        match needed {
            Some(needed) if needed <= self.remaining() => Ok(()),
            _ => Err(ReplayError::corrupt(format!(
                "player {player} declares {count} records of {record_size} bytes at offset {} but only {} bytes remain",
                self.pos,
                self.remaining()
            ))),
        }
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], ReplayError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                ReplayError::corrupt(format!(
                    "wanted {len} bytes at offset {} but only {} remain",
                    self.pos,
                    self.remaining()
                ))
            })?;

        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ReplayError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, ReplayError> {
        Ok(self.take(1)?[0])
    }

    read_number!(u16, u16);
    read_number!(u32, u32);
    read_number!(u64, u64);
    read_number!(f32, f32);
    read_number!(f64, f64);
}
