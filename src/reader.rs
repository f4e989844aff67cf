use std::io::{self, Read};

/// Byte order of the 4-byte words in a dcd file.
///
/// The format does not describe its own endianness. Files are written in the native order of
/// the machine that produced them, which in practice is almost always little-endian.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    #[default]
    Little,
    Big,
    /// Determine the byte order from the leading header size word, which is 84 for every dcd
    /// file. Falls back to [`Endianness::Little`] if neither reading yields 84.
    Detect,
}

/// A byte order that has been settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ByteOrder {
    Little,
    Big,
}

/// The value of the first word in a dcd file: the size of the fixed header record.
pub const HEADER_SIZE: i32 = 84;

impl Endianness {
    /// Settle on a [`ByteOrder`], given the raw bytes of the first word of the file.
    pub(crate) fn resolve(self, first: [u8; 4]) -> ByteOrder {
        match self {
            Endianness::Little => ByteOrder::Little,
            Endianness::Big => ByteOrder::Big,
            Endianness::Detect => {
                if i32::from_be_bytes(first) == HEADER_SIZE
                    && i32::from_le_bytes(first) != HEADER_SIZE
                {
                    ByteOrder::Big
                } else {
                    ByteOrder::Little
                }
            }
        }
    }
}

impl ByteOrder {
    #[inline]
    pub(crate) fn i32(self, buf: [u8; 4]) -> i32 {
        match self {
            ByteOrder::Little => i32::from_le_bytes(buf),
            ByteOrder::Big => i32::from_be_bytes(buf),
        }
    }

    #[inline]
    pub(crate) fn f32(self, buf: [u8; 4]) -> f32 {
        match self {
            ByteOrder::Little => f32::from_le_bytes(buf),
            ByteOrder::Big => f32::from_be_bytes(buf),
        }
    }
}

pub(crate) fn read_word<R: Read>(file: &mut R) -> io::Result<[u8; 4]> {
    let mut buf: [u8; 4] = Default::default();
    file.read_exact(&mut buf)?;
    Ok(buf)
}

pub(crate) fn read_i32<R: Read>(file: &mut R, order: ByteOrder) -> io::Result<i32> {
    read_word(file).map(|buf| order.i32(buf))
}

/// Decode the 4-byte words in `bytes` as floats. Trailing bytes that do not form a whole word
/// are ignored.
pub(crate) fn f32s(bytes: &[u8], order: ByteOrder) -> impl Iterator<Item = f32> + '_ {
    bytes
        .chunks_exact(4)
        .map(move |word| order.f32([word[0], word[1], word[2], word[3]]))
}

/// Read exactly `n` bytes into `data`, replacing its contents.
///
/// `data` grows with the bytes that actually arrive, so a bogus `n` from a damaged file cannot
/// trigger a huge allocation up front.
pub(crate) fn read_bytes<R: Read>(file: &mut R, data: &mut Vec<u8>, n: u64) -> io::Result<()> {
    data.clear();
    let read = file.take(n).read_to_end(data)?;
    if (read as u64) < n {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

/// Consume and discard exactly `n` bytes.
pub(crate) fn skip<R: Read>(file: &mut R, n: u64) -> io::Result<()> {
    let skipped = io::copy(&mut file.take(n), &mut io::sink())?;
    if skipped < n {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}
