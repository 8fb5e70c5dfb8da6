use std::io::{Read, Seek};

use crate::error::{AtStage, Block, Diagnostics, Error, FormatError, Result, Stage, Warning};
use crate::reader::{check_trailer, read_chunked, Codec, Trailer};

/// Per-frame atom layout.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Atoms {
    /// Total atoms per frame.
    pub num_atoms: usize,
    /// Zero-based indices of the atoms stored in every frame, in storage order.
    ///
    /// Empty when no atoms are fixed.
    pub free_indexes: Vec<usize>,
    /// Byte offset where the per-frame data begins.
    pub body_start: u64,
}

impl Atoms {
    pub fn num_free(&self) -> usize {
        self.free_indexes.len()
    }

    /// Reads the word-sized atom count and, if any atoms are fixed, the 32-bit free atom
    /// indices.
    ///
    /// The leading marker of the atom count record has been consumed as the title's integrity
    /// word.
    pub(crate) fn read<R: Read + Seek>(
        file: &mut R,
        codec: Codec,
        num_fixed: i32,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        let stage = Stage::Atoms;
        let natom = codec.read_word(file).at(stage)?;
        check_trailer(
            file,
            codec,
            stage,
            codec.word_width().bytes() as u64,
            Trailer::Fatal(|leading, trailing| FormatError::RecordMarkerMismatch {
                leading,
                trailing,
            }),
            diagnostics,
        )?;

        let invalid = FormatError::InvalidAtomCount {
            num_atoms: natom,
            num_fixed,
        };
        let (Ok(num_atoms), Ok(fixed)) = (usize::try_from(natom), usize::try_from(num_fixed))
        else {
            return Err(Error::format(stage, invalid));
        };
        if fixed > num_atoms {
            return Err(Error::format(stage, invalid));
        }

        let free_indexes = if fixed > 0 {
            read_free_indexes(file, codec, num_atoms, num_atoms - fixed, diagnostics)?
        } else {
            Vec::new()
        };

        let body_start = file.stream_position().at(stage)?;
        log::debug!(
            "{num_atoms} atoms ({} free), frames start at byte {body_start}",
            if fixed > 0 { free_indexes.len() } else { num_atoms },
        );
        Ok(Self {
            num_atoms,
            free_indexes,
            body_start,
        })
    }
}

fn read_free_indexes<R: Read>(
    file: &mut R,
    codec: Codec,
    num_atoms: usize,
    num_free: usize,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<usize>> {
    let stage = Stage::Atoms;
    let leading = codec.read_marker(file).at(stage)?;
    let expected = 4 * num_free as u64;
    if leading != expected {
        diagnostics.warn(
            stage,
            Warning::BlockSize {
                stage,
                block: Block::FreeIndexes,
                expected,
                found: leading,
            },
        )?;
    }

    let mut raw = Vec::new();
    read_chunked(file, num_free, &mut raw, |file, buf| {
        codec.read_i32s(file, buf)
    })
    .at(stage)?;
    check_trailer(
        file,
        codec,
        stage,
        leading,
        Trailer::Fatal(|leading, trailing| FormatError::FixedAtomCountMismatch {
            leading,
            trailing,
        }),
        diagnostics,
    )?;

    // Stored one-based.
    raw.into_iter()
        .map(|index| match usize::try_from(index) {
            Ok(one_based) if (1..=num_atoms).contains(&one_based) => Ok(one_based - 1),
            _ => Err(Error::format(
                stage,
                FormatError::FreeIndexOutOfRange { index, num_atoms },
            )),
        })
        .collect()
}
