//! Read CHARMM and X-PLOR dcd trajectories.
//!
//! Word width (32- or 64-bit record markers) and byte order are detected from the file itself.
//! Trajectories that store only the free atoms after the first frame are expanded back to full
//! frames while reading.
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

pub use crate::atoms::Atoms;
pub use crate::error::{Block, Error, FormatError, Result, Stage, Warning};
pub use crate::frames::{Frame, FrameSet, UnitCell};
pub use crate::header::{Dialect, Header};
pub use crate::reader::{ByteOrder, Codec, WordWidth};
pub use crate::title::Title;

use crate::error::{AtStage, Diagnostics};

mod atoms;
mod error;
mod frames;
mod header;
pub mod reader;
mod title;

/// Everything in front of the frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub codec: Codec,
    pub header: Header,
    pub title: Title,
    pub atoms: Atoms,
}

impl Metadata {
    /// Runs detection, header, title and atom parsing, in that order, from the start of `file`.
    fn read<R: Read + Seek>(file: &mut R, diagnostics: &mut Diagnostics) -> Result<Self> {
        file.seek(SeekFrom::Start(0)).at(Stage::Detect)?;
        let codec = Codec::detect(file)?;
        log::debug!("detected {codec} trajectory");

        let header = Header::read(file, codec)?;
        let title = Title::read(file, codec, diagnostics)?;
        let atoms = Atoms::read(file, codec, header.num_fixed, diagnostics)?;

        Ok(Self {
            codec,
            header,
            title,
            atoms,
        })
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dialect = match self.header.dialect() {
            Dialect::Charmm => "CHARMM",
            Dialect::Xplor => "X-PLOR",
        };
        let bits = self.codec.word_width().bytes() * 8;
        let order = match self.codec.byte_order() {
            ByteOrder::Big => "Big",
            ByteOrder::Little => "Little",
        };
        writeln!(f, "{dialect} {bits}-bit Trajectory File {order} Endian")?;
        for line in &self.title.lines {
            writeln!(f, "{line}")?;
        }
        writeln!(f, "Nset: {}", self.header.nset)?;
        writeln!(f, "Istart: {}", self.header.istart)?;
        writeln!(f, "Nsavc: {}", self.header.nsavc)?;
        writeln!(f, "Nstep: {}", self.header.nstep)?;
        writeln!(f, "Step size: {} picoseconds", self.header.step_size)?;
        if self.header.num_fixed != 0 {
            writeln!(f, "Fixed atoms: {}", self.header.num_fixed)?;
        }
        write!(f, "Number of atoms per frame: {}", self.atoms.num_atoms)
    }
}

/// Decoding options.
#[derive(Debug, Default, Clone, Copy)]
pub struct Options {
    /// Treat every recoverable anomaly as a fatal [`FormatError::Escalated`].
    pub strict: bool,
}

/// A fully decoded trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Dcd {
    pub metadata: Metadata,
    pub frames: FrameSet,
    /// Recoverable anomalies encountered while decoding.
    pub warnings: Vec<Warning>,
}

/// Decodes a whole trajectory.
pub fn decode<R: Read + Seek>(reader: R) -> Result<Dcd> {
    decode_with(reader, Options::default())
}

pub fn decode_with<R: Read + Seek>(reader: R, options: Options) -> Result<Dcd> {
    let mut reader = DcdReader::with_options(reader, options)?;
    let frames = reader.read_all_frames()?;
    Ok(Dcd {
        metadata: reader.metadata,
        frames,
        warnings: reader.diagnostics.into_warnings(),
    })
}

#[derive(Debug)]
pub struct DcdReader<R> {
    pub file: R,
    metadata: Metadata,
    step: usize,
    /// A copy of frame 0, kept around when fixed atoms must be reconstructed.
    reference: Option<Frame>,
    diagnostics: Diagnostics,
}

impl DcdReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, Options::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        let file = File::open(path)?;
        Self::with_options(BufReader::new(file), options)
    }
}

impl<R: Read + Seek> DcdReader<R> {
    /// Reads the metadata from the start of `reader`, leaving it positioned at the first frame.
    pub fn new(reader: R) -> Result<Self> {
        Self::with_options(reader, Options::default())
    }

    pub fn with_options(mut reader: R, options: Options) -> Result<Self> {
        let mut diagnostics = Diagnostics::new(options.strict);
        let metadata = Metadata::read(&mut reader, &mut diagnostics)?;
        Ok(Self {
            file: reader,
            metadata,
            step: 0,
            reference: None,
            diagnostics,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Recoverable anomalies encountered so far.
    pub fn warnings(&self) -> &[Warning] {
        self.diagnostics.warnings()
    }

    /// Index of the next frame to be read.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Number of frames that have not been read yet.
    pub fn remaining(&self) -> usize {
        self.metadata.header.num_frames().saturating_sub(self.step)
    }

    /// Reads the next frame into `frame` and advances one step.
    ///
    /// Returns `false`, leaving `frame` untouched, once all frames declared in the header have
    /// been read. Running out of data before that is an [`FormatError::UnexpectedEndOfStream`].
    pub fn read_frame(&mut self, frame: &mut Frame) -> Result<bool> {
        if self.remaining() == 0 {
            return Ok(false);
        }

        let fixed = self.metadata.header.num_fixed != 0;
        let reference = if self.step == 0 {
            None
        } else {
            self.reference.as_ref()
        };
        frame.read(
            &mut self.file,
            &self.metadata,
            self.step,
            reference,
            &mut self.diagnostics,
        )?;

        if fixed && self.step == 0 {
            self.reference = Some(frame.clone());
        }
        self.step += 1;
        Ok(true)
    }

    /// Reads all remaining frames.
    pub fn read_all_frames(&mut self) -> Result<FrameSet> {
        let mut frames = FrameSet::default();
        let mut frame = Frame::default();
        while self.read_frame(&mut frame)? {
            frames.push(std::mem::take(&mut frame));
        }
        Ok(frames)
    }

    /// Returns to the first frame.
    pub fn home(&mut self) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(self.metadata.atoms.body_start))
            .at(Stage::Frame(0))?;
        self.step = 0;
        self.reference = None;
        Ok(())
    }
}
