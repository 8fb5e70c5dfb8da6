use std::fmt;
use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The logical decoding stage at which something went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Detect,
    Header,
    Title,
    Atoms,
    /// Reading the frame with this index.
    Frame(usize),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Detect => write!(f, "format detection"),
            Stage::Header => write!(f, "header"),
            Stage::Title => write!(f, "title"),
            Stage::Atoms => write!(f, "atom metadata"),
            Stage::Frame(idx) => write!(f, "frame {idx}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid dcd {stage}: {source}")]
    Format {
        stage: Stage,
        #[source]
        source: FormatError,
    },

    #[error("I/O operation failed: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl Error {
    pub fn format(stage: Stage, source: FormatError) -> Self {
        Self::Format { stage, source }
    }

    /// Returns the [`FormatError`] if this is a format violation.
    pub fn format_error(&self) -> Option<&FormatError> {
        match self {
            Error::Format { source, .. } => Some(source),
            Error::Io { .. } => None,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Format { stage, .. } => Some(*stage),
            Error::Io { .. } => None,
        }
    }
}

/// Fatal violations of the dcd layout.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("leading record marker is not 84 under any word width or byte order")]
    UnrecognizedMarker,

    #[error("missing 'CORD' tag, found {found:?}")]
    NotADCDFile { found: [u8; 4] },

    #[error("record markers do not match (leading {leading}, trailing {trailing})")]
    RecordMarkerMismatch { leading: u64, trailing: u64 },

    #[error("negative title line count ({0})")]
    InvalidTitleLength(i64),

    #[error("title integrity check failed (expected {expected}, found {found})")]
    TitleIntegrityMismatch { expected: u64, found: u64 },

    #[error("free atom block markers do not match (leading {leading}, trailing {trailing})")]
    FixedAtomCountMismatch { leading: u64, trailing: u64 },

    #[error("stream ended unexpectedly")]
    UnexpectedEndOfStream,

    #[error("implausible atom counts ({num_atoms} atoms, {num_fixed} fixed)")]
    InvalidAtomCount { num_atoms: i64, num_fixed: i32 },

    #[error("free atom index {index} is outside 1..={num_atoms}")]
    FreeIndexOutOfRange { index: i32, num_atoms: usize },

    #[error("strict mode: {0}")]
    Escalated(Warning),
}

/// Recoverable anomalies. Decoding continues with a recovered value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    #[error("implausible title line count {declared}, using {recovered}")]
    TitleLineCount { declared: i64, recovered: usize },

    #[error("{stage}: {block} markers do not match (leading {leading}, trailing {trailing})")]
    MarkerMismatch {
        stage: Stage,
        block: Block,
        leading: u64,
        trailing: u64,
    },

    #[error("{stage}: {block} block declares {found} bytes, expected {expected}")]
    BlockSize {
        stage: Stage,
        block: Block,
        expected: u64,
        found: u64,
    },
}

/// Names the bracketed block a [`Warning`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    UnitCell,
    FreeIndexes,
    X,
    Y,
    Z,
    W,
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Block::UnitCell => "unit cell",
            Block::FreeIndexes => "free atom",
            Block::X => "x coordinate",
            Block::Y => "y coordinate",
            Block::Z => "z coordinate",
            Block::W => "w coordinate",
        };
        f.write_str(name)
    }
}

/// Attaches a [`Stage`] to lower-level failures.
///
/// An [`io::ErrorKind::UnexpectedEof`] becomes [`FormatError::UnexpectedEndOfStream`].
pub(crate) trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T>;
}

impl<T> AtStage<T> for io::Result<T> {
    fn at(self, stage: Stage) -> Result<T> {
        self.map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => {
                Error::format(stage, FormatError::UnexpectedEndOfStream)
            }
            _ => Error::Io { source: err },
        })
    }
}

impl<T> AtStage<T> for std::result::Result<T, FormatError> {
    fn at(self, stage: Stage) -> Result<T> {
        self.map_err(|source| Error::format(stage, source))
    }
}

/// Collects [`Warning`]s for one decode session.
///
/// Every warning is also emitted through [`log::warn!`]. In strict mode the first warning is
/// turned into a fatal [`FormatError::Escalated`] instead.
#[derive(Debug, Default, Clone)]
pub(crate) struct Diagnostics {
    strict: bool,
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub(crate) fn new(strict: bool) -> Self {
        Self {
            strict,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn warn(&mut self, stage: Stage, warning: Warning) -> Result<()> {
        if self.strict {
            return Err(Error::format(stage, FormatError::Escalated(warning)));
        }
        log::warn!("{warning}");
        self.warnings.push(warning);
        Ok(())
    }

    pub(crate) fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub(crate) fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}
