use std::fmt;
use std::io::{self, Read};

use byteorder::{BigEndian, ByteOrder as _, LittleEndian, ReadBytesExt};

use crate::error::{AtStage, Diagnostics, Error, FormatError, Result, Stage, Warning};

/// The value of the leading record marker: the byte length of the header block.
pub const HEADER_MARKER: u64 = 84;
pub const CORD: &[u8; 4] = b"CORD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Big,
    Little,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordWidth {
    /// 32-bit record markers.
    Four,
    /// 64-bit record markers.
    Eight,
}

impl WordWidth {
    pub const fn bytes(self) -> usize {
        match self {
            WordWidth::Four => 4,
            WordWidth::Eight => 8,
        }
    }
}

/// The format parameters of one trajectory.
///
/// Established once by [`Codec::detect`] and passed by value into every subsequent read.
///
/// The word width governs record markers and the title and atom counts. The header fields and
/// free atom indices are always 32-bit, coordinates are always 32-bit floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Codec {
    word_width: WordWidth,
    byte_order: ByteOrder,
}

impl Codec {
    pub const fn new(word_width: WordWidth, byte_order: ByteOrder) -> Self {
        Self {
            word_width,
            byte_order,
        }
    }

    pub const fn word_width(&self) -> WordWidth {
        self.word_width
    }

    pub const fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Determines the word width and byte order from the leading record marker and checks the
    /// `CORD` tag that follows it.
    ///
    /// Expects `file` to be positioned at the very start of the trajectory. Leaves it right
    /// after the tag.
    ///
    /// A 64-bit little endian marker starts with the same four bytes as a 32-bit one, so a
    /// 32-bit match is only accepted when the tag follows directly.
    pub fn detect<R: Read>(file: &mut R) -> Result<Self> {
        let stage = Stage::Detect;
        let mut head = [0u8; 8];
        file.read_exact(&mut head[..4]).at(stage)?;

        let narrow = [ByteOrder::Big, ByteOrder::Little]
            .into_iter()
            .find(|&order| u64::from(read_u32_from(order, &head[..4])) == HEADER_MARKER);

        file.read_exact(&mut head[4..]).at(stage)?;
        if let Some(order) = narrow {
            if &head[4..] == CORD {
                return Ok(Self::new(WordWidth::Four, order));
            }
        }

        let wide = [ByteOrder::Big, ByteOrder::Little]
            .into_iter()
            .find(|&order| read_u64_from(order, &head) == HEADER_MARKER);
        let Some(order) = wide else {
            return Err(Error::format(
                stage,
                match narrow {
                    Some(_) => FormatError::NotADCDFile {
                        found: [head[4], head[5], head[6], head[7]],
                    },
                    None => FormatError::UnrecognizedMarker,
                },
            ));
        };

        let mut tag = [0u8; 4];
        file.read_exact(&mut tag).at(stage)?;
        if &tag != CORD {
            return Err(Error::format(stage, FormatError::NotADCDFile { found: tag }));
        }

        Ok(Self::new(WordWidth::Eight, order))
    }

    /// Reads one record marker.
    pub fn read_marker<R: Read>(&self, file: &mut R) -> io::Result<u64> {
        match (self.word_width, self.byte_order) {
            (WordWidth::Four, ByteOrder::Big) => file.read_u32::<BigEndian>().map(u64::from),
            (WordWidth::Four, ByteOrder::Little) => {
                file.read_u32::<LittleEndian>().map(u64::from)
            }
            (WordWidth::Eight, ByteOrder::Big) => file.read_u64::<BigEndian>(),
            (WordWidth::Eight, ByteOrder::Little) => file.read_u64::<LittleEndian>(),
        }
    }

    /// Reads one signed integer of the word width, sign-extended.
    pub fn read_word<R: Read>(&self, file: &mut R) -> io::Result<i64> {
        match (self.word_width, self.byte_order) {
            (WordWidth::Four, ByteOrder::Big) => file.read_i32::<BigEndian>().map(i64::from),
            (WordWidth::Four, ByteOrder::Little) => {
                file.read_i32::<LittleEndian>().map(i64::from)
            }
            (WordWidth::Eight, ByteOrder::Big) => file.read_i64::<BigEndian>(),
            (WordWidth::Eight, ByteOrder::Little) => file.read_i64::<LittleEndian>(),
        }
    }

    /// Fills `buf` with 32-bit integers.
    pub fn read_i32s<R: Read>(&self, file: &mut R, buf: &mut [i32]) -> io::Result<()> {
        match self.byte_order {
            ByteOrder::Big => file.read_i32_into::<BigEndian>(buf),
            ByteOrder::Little => file.read_i32_into::<LittleEndian>(buf),
        }
    }

    /// Fills `buf` with single precision floats.
    pub fn read_f32s<R: Read>(&self, file: &mut R, buf: &mut [f32]) -> io::Result<()> {
        match self.byte_order {
            ByteOrder::Big => file.read_f32_into::<BigEndian>(buf),
            ByteOrder::Little => file.read_f32_into::<LittleEndian>(buf),
        }
    }

    /// Decodes an `i32` from the first four bytes of `bytes`.
    pub fn i32_from(&self, bytes: &[u8]) -> i32 {
        match self.byte_order {
            ByteOrder::Big => BigEndian::read_i32(bytes),
            ByteOrder::Little => LittleEndian::read_i32(bytes),
        }
    }

    pub fn f32_from(&self, bytes: &[u8]) -> f32 {
        match self.byte_order {
            ByteOrder::Big => BigEndian::read_f32(bytes),
            ByteOrder::Little => LittleEndian::read_f32(bytes),
        }
    }

    pub fn f64_from(&self, bytes: &[u8]) -> f64 {
        match self.byte_order {
            ByteOrder::Big => BigEndian::read_f64(bytes),
            ByteOrder::Little => LittleEndian::read_f64(bytes),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits = self.word_width.bytes() * 8;
        let order = match self.byte_order {
            ByteOrder::Big => "Big",
            ByteOrder::Little => "Little",
        };
        write!(f, "{bits}-bit {order} Endian")
    }
}

fn read_u32_from(order: ByteOrder, bytes: &[u8]) -> u32 {
    match order {
        ByteOrder::Big => BigEndian::read_u32(bytes),
        ByteOrder::Little => LittleEndian::read_u32(bytes),
    }
}

fn read_u64_from(order: ByteOrder, bytes: &[u8]) -> u64 {
    match order {
        ByteOrder::Big => BigEndian::read_u64(bytes),
        ByteOrder::Little => LittleEndian::read_u64(bytes),
    }
}

/// Values per read when the count comes from the file.
const CHUNK: usize = 4096;

/// Reads `n` values into `out` (after clearing it), growing it only as data actually arrives.
///
/// Counts read from the stream are untrusted, so a huge bogus count fails with an early end of
/// stream instead of a huge allocation.
pub(crate) fn read_chunked<R, T, F>(
    file: &mut R,
    n: usize,
    out: &mut Vec<T>,
    mut read: F,
) -> io::Result<()>
where
    R: Read,
    T: Copy + Default,
    F: FnMut(&mut R, &mut [T]) -> io::Result<()>,
{
    out.clear();
    let mut chunk = [T::default(); CHUNK];
    let mut left = n;
    while left > 0 {
        let len = left.min(CHUNK);
        read(file, &mut chunk[..len])?;
        out.extend_from_slice(&chunk[..len]);
        left -= len;
    }
    Ok(())
}

/// How a disagreement between a block's leading and trailing markers is handled.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Trailer {
    /// The offsets of everything after the block become untrustworthy.
    Fatal(fn(u64, u64) -> FormatError),
    /// Reported as a [`Warning::MarkerMismatch`], decoding proceeds.
    Warn(crate::error::Block),
}

/// Reads a trailing marker and compares it against the `leading` one.
pub(crate) fn check_trailer<R: Read>(
    file: &mut R,
    codec: Codec,
    stage: Stage,
    leading: u64,
    trailer: Trailer,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    let trailing = codec.read_marker(file).at(stage)?;
    if trailing == leading {
        return Ok(());
    }

    match trailer {
        Trailer::Fatal(err) => Err(Error::format(stage, err(leading, trailing))),
        Trailer::Warn(block) => diagnostics.warn(
            stage,
            Warning::MarkerMismatch {
                stage,
                block,
                leading,
                trailing,
            },
        ),
    }
}

/// Reads a bracketed block whose payload size is implied by the structure rather than the
/// marker, returning the payload and the leading marker.
///
/// The caller validates the leading marker. The trailing marker is checked against it.
pub(crate) fn read_record<R: Read>(
    file: &mut R,
    codec: Codec,
    stage: Stage,
    payload: &mut [u8],
    trailer: Trailer,
    diagnostics: &mut Diagnostics,
) -> Result<u64> {
    let leading = codec.read_marker(file).at(stage)?;
    file.read_exact(payload).at(stage)?;
    check_trailer(file, codec, stage, leading, trailer, diagnostics)?;
    Ok(leading)
}
