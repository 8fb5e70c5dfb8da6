use std::io::Read;

use crate::error::{AtStage, Diagnostics, Error, FormatError, Result, Stage, Warning};
use crate::reader::Codec;

/// Value written by Vega ZZ where a line count of 2 was meant.
const VEGA_ZZ_LINE_COUNT: i64 = 1095062083;

/// The free-text title block: fixed-width lines, concatenated.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Title {
    /// All lines concatenated, each exactly [`Title::LINE_LEN`] bytes before decoding.
    pub text: String,
    /// The individual lines with trailing padding removed.
    pub lines: Vec<String>,
    /// The line count as it appeared in the file.
    pub declared_lines: i64,
}

impl Title {
    pub const LINE_LEN: usize = 80;
    /// Anything above this is taken to be a corrupted count.
    pub const MAX_LINES: i64 = 1000;

    /// The number of lines that were actually read.
    pub fn num_lines(&self) -> usize {
        self.lines.len()
    }

    /// Reads the title block and the integrity word that follows it.
    ///
    /// The line count is a word-sized integer. An implausible count is repaired and reported
    /// through `diagnostics`. A negative count, a trailing size that disagrees with the leading
    /// one, or an integrity word other than the word width are fatal.
    pub(crate) fn read<R: Read>(
        file: &mut R,
        codec: Codec,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        let stage = Stage::Title;
        let size = codec.read_marker(file).at(stage)?;
        let declared_lines = codec.read_word(file).at(stage)?;

        let num_lines = match declared_lines {
            n if n < 0 => {
                return Err(Error::format(stage, FormatError::InvalidTitleLength(n)));
            }
            n if n > Self::MAX_LINES => {
                let recovered = if n == VEGA_ZZ_LINE_COUNT { 2 } else { 0 };
                diagnostics.warn(
                    stage,
                    Warning::TitleLineCount {
                        declared: n,
                        recovered,
                    },
                )?;
                recovered
            }
            n => n as usize,
        };

        let mut raw = vec![0u8; num_lines * Self::LINE_LEN];
        file.read_exact(&mut raw).at(stage)?;
        let raw_lines: Vec<_> = raw
            .chunks_exact(Self::LINE_LEN)
            .map(String::from_utf8_lossy)
            .collect();
        let text = raw_lines.concat();
        let lines = raw_lines
            .iter()
            .map(|line| {
                line.trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
                    .to_string()
            })
            .collect();

        let size_check = codec.read_marker(file).at(stage)?;
        if size_check != size {
            return Err(Error::format(
                stage,
                FormatError::TitleIntegrityMismatch {
                    expected: size,
                    found: size_check,
                },
            ));
        }

        // The leading marker of the atom count record, which holds a single word.
        let integrity = codec.read_marker(file).at(stage)?;
        let expected = codec.word_width().bytes() as u64;
        if integrity != expected {
            return Err(Error::format(
                stage,
                FormatError::TitleIntegrityMismatch {
                    expected,
                    found: integrity,
                },
            ));
        }

        log::trace!("title: {num_lines} lines ({declared_lines} declared)");
        Ok(Self {
            text,
            lines,
            declared_lines,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::reader::{ByteOrder, WordWidth};

    const CODEC: Codec = Codec::new(WordWidth::Four, ByteOrder::Little);

    fn title_bytes(size: u32, lines: i64, text: &[&str], size_check: u32, check: u32) -> Vec<u8> {
        let mut bytes = size.to_le_bytes().to_vec();
        bytes.extend_from_slice(&(lines as i32).to_le_bytes());
        for line in text {
            let mut padded = [b' '; Title::LINE_LEN];
            padded[..line.len()].copy_from_slice(line.as_bytes());
            bytes.extend_from_slice(&padded);
        }
        bytes.extend_from_slice(&size_check.to_le_bytes());
        bytes.extend_from_slice(&check.to_le_bytes());
        bytes
    }

    #[test]
    fn two_lines() {
        let bytes = title_bytes(164, 2, &["REMARKS FILENAME=run.dcd", "REMARKS DATE"], 164, 4);
        let mut diagnostics = Diagnostics::new(false);
        let title = Title::read(&mut Cursor::new(bytes), CODEC, &mut diagnostics).unwrap();
        assert_eq!(title.num_lines(), 2);
        assert_eq!(title.text.len(), 160);
        assert_eq!(title.lines, ["REMARKS FILENAME=run.dcd", "REMARKS DATE"]);
        assert!(diagnostics.warnings().is_empty());
    }

    #[test]
    fn negative_line_count() {
        let bytes = title_bytes(4, -1, &[], 4, 4);
        let mut diagnostics = Diagnostics::new(false);
        let err = Title::read(&mut Cursor::new(bytes), CODEC, &mut diagnostics).unwrap_err();
        assert_eq!(err.format_error(), Some(&FormatError::InvalidTitleLength(-1)));
    }

    #[test]
    fn vega_zz_line_count() {
        let bytes = title_bytes(164, VEGA_ZZ_LINE_COUNT, &["A", "B"], 164, 4);
        let mut diagnostics = Diagnostics::new(false);
        let title = Title::read(&mut Cursor::new(bytes), CODEC, &mut diagnostics).unwrap();
        assert_eq!(title.num_lines(), 2);
        assert_eq!(title.declared_lines, VEGA_ZZ_LINE_COUNT);
        assert_eq!(
            diagnostics.warnings(),
            &[Warning::TitleLineCount {
                declared: VEGA_ZZ_LINE_COUNT,
                recovered: 2
            }]
        );
    }

    #[test]
    fn other_garbage_line_count() {
        let bytes = title_bytes(4, 5000, &[], 4, 4);
        let mut diagnostics = Diagnostics::new(false);
        let title = Title::read(&mut Cursor::new(bytes), CODEC, &mut diagnostics).unwrap();
        assert_eq!(title.num_lines(), 0);
        assert!(title.text.is_empty());
        assert_eq!(diagnostics.warnings().len(), 1);
    }

    #[test]
    fn wide_line_count() {
        let codec = Codec::new(WordWidth::Eight, ByteOrder::Big);
        let mut bytes = 88u64.to_be_bytes().to_vec();
        bytes.extend_from_slice(&1i64.to_be_bytes());
        bytes.extend_from_slice(&[b'T'; Title::LINE_LEN]);
        bytes.extend_from_slice(&88u64.to_be_bytes());
        bytes.extend_from_slice(&8u64.to_be_bytes());

        let mut diagnostics = Diagnostics::new(false);
        let title = Title::read(&mut Cursor::new(bytes), codec, &mut diagnostics).unwrap();
        assert_eq!(title.declared_lines, 1);
        assert_eq!(title.lines, ["T".repeat(Title::LINE_LEN)]);
    }

    #[test]
    fn size_mismatch() {
        let bytes = title_bytes(84, 1, &["X"], 88, 4);
        let mut diagnostics = Diagnostics::new(false);
        let err = Title::read(&mut Cursor::new(bytes), CODEC, &mut diagnostics).unwrap_err();
        assert_eq!(
            err.format_error(),
            Some(&FormatError::TitleIntegrityMismatch {
                expected: 84,
                found: 88
            })
        );
    }

    #[test]
    fn bad_integrity_word() {
        let bytes = title_bytes(84, 1, &["X"], 84, 8);
        let mut diagnostics = Diagnostics::new(false);
        let err = Title::read(&mut Cursor::new(bytes), CODEC, &mut diagnostics).unwrap_err();
        assert_eq!(
            err.format_error(),
            Some(&FormatError::TitleIntegrityMismatch {
                expected: 4,
                found: 8
            })
        );
    }
}
