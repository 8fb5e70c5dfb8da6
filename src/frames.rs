use std::io::Read;

use glam::{DVec3, Vec3};

use crate::error::{AtStage, Block, Diagnostics, Result, Stage, Warning};
use crate::reader::{check_trailer, read_chunked, read_record, Codec, Trailer};
use crate::Metadata;

/// Simulation cell geometry. Lengths in Å, angles as written (degrees or cosines, depending on
/// the writer).
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct UnitCell {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl UnitCell {
    pub const SIZE: usize = 48;

    pub fn lengths(&self) -> DVec3 {
        DVec3::new(self.a, self.b, self.c)
    }

    pub fn angles(&self) -> DVec3 {
        DVec3::new(self.alpha, self.beta, self.gamma)
    }

    fn read<R: Read>(
        file: &mut R,
        codec: Codec,
        stage: Stage,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        let mut payload = [0u8; Self::SIZE];
        read_record(
            file,
            codec,
            stage,
            &mut payload,
            Trailer::Warn(Block::UnitCell),
            diagnostics,
        )?;

        // On disk: a, gamma, b, beta, alpha, c.
        let value = |idx: usize| codec.f64_from(&payload[idx * 8..]);
        Ok(Self {
            a: value(0),
            gamma: value(1),
            b: value(2),
            beta: value(3),
            alpha: value(4),
            c: value(5),
        })
    }
}

/// A single decoded frame. Every channel holds one value per atom, unless the block markers
/// in the file declared another length.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Frame {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub w: Option<Vec<f32>>,
    pub unit_cell: Option<UnitCell>,
}

impl Frame {
    pub fn natoms(&self) -> usize {
        self.x.len()
    }

    pub fn coords(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .map(|((&x, &y), &z)| Vec3::new(x, y, z))
    }

    /// Reads the frame with index `idx`.
    ///
    /// `reference` is frame 0, required to reconstruct later frames of a trajectory with fixed
    /// atoms. When it is `None`, or no atoms are fixed, every channel is read in full.
    pub(crate) fn read<R: Read>(
        &mut self,
        file: &mut R,
        metadata: &Metadata,
        idx: usize,
        reference: Option<&Frame>,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let stage = Stage::Frame(idx);
        let codec = metadata.codec;
        let natoms = metadata.atoms.num_atoms;

        self.unit_cell = if metadata.header.has_extra_block {
            Some(UnitCell::read(file, codec, stage, diagnostics)?)
        } else {
            None
        };

        let reference = reference.filter(|_| metadata.header.num_fixed != 0);
        let mut coords = CoordReader {
            codec,
            stage,
            diagnostics,
        };
        match reference {
            None => {
                coords.read(file, Block::X, Extent::Marker(natoms), &mut self.x)?;
                coords.read(file, Block::Y, Extent::Marker(natoms), &mut self.y)?;
                coords.read(file, Block::Z, Extent::Marker(natoms), &mut self.z)?;
            }
            Some(reference) => {
                let free = &metadata.atoms.free_indexes;
                let mut moved = Vec::with_capacity(free.len());
                for (block, out, base) in [
                    (Block::X, &mut self.x, &reference.x),
                    (Block::Y, &mut self.y, &reference.y),
                    (Block::Z, &mut self.z, &reference.z),
                ] {
                    coords.read(file, block, Extent::Exact(free.len()), &mut moved)?;
                    overlay(out, base, free, &moved);
                }
            }
        }

        // The w channel has no fixed/free split.
        self.w = if metadata.header.has_w_channel {
            let mut w = self.w.take().unwrap_or_default();
            coords.read(file, Block::W, Extent::Marker(natoms), &mut w)?;
            Some(w)
        } else {
            None
        };

        Ok(())
    }
}

/// Sets `out` to `base` with the values at the `free` positions replaced by `moved`.
///
/// Positions past the end of `base` are skipped, so a short first frame stays short.
fn overlay(out: &mut Vec<f32>, base: &[f32], free: &[usize], moved: &[f32]) {
    out.clear();
    out.extend_from_slice(base);
    for (&idx, &value) in free.iter().zip(moved) {
        if let Some(slot) = out.get_mut(idx) {
            *slot = value;
        }
    }
}

/// How many values a coordinate block holds.
#[derive(Debug, Clone, Copy)]
enum Extent {
    /// Expected to hold this many, but the leading marker decides.
    Marker(usize),
    /// Exactly this many, whatever the leading marker says.
    Exact(usize),
}

/// Reads the bracketed coordinate blocks of one frame.
///
/// Disagreeing markers are only reported: a leading marker that does not match the expected
/// size is a [`Warning::BlockSize`], a trailing one that does not match the leading one a
/// [`Warning::MarkerMismatch`].
struct CoordReader<'d> {
    codec: Codec,
    stage: Stage,
    diagnostics: &'d mut Diagnostics,
}

impl CoordReader<'_> {
    fn read<R: Read>(
        &mut self,
        file: &mut R,
        block: Block,
        extent: Extent,
        out: &mut Vec<f32>,
    ) -> Result<()> {
        let (codec, stage) = (self.codec, self.stage);
        let leading = codec.read_marker(file).at(stage)?;
        let (Extent::Marker(n) | Extent::Exact(n)) = extent;
        let expected = 4 * n as u64;
        if leading != expected {
            self.diagnostics.warn(
                stage,
                Warning::BlockSize {
                    stage,
                    block,
                    expected,
                    found: leading,
                },
            )?;
        }

        let (n, rest) = match extent {
            Extent::Marker(_) => {
                let n = usize::try_from(leading / 4).unwrap_or(usize::MAX);
                (n, leading % 4)
            }
            Extent::Exact(n) => (n, 0),
        };
        read_chunked(file, n, out, |file, buf| codec.read_f32s(file, buf)).at(stage)?;
        // A trailing partial value cannot be decoded.
        let mut partial = [0u8; 3];
        file.read_exact(&mut partial[..rest as usize]).at(stage)?;

        check_trailer(
            file,
            codec,
            stage,
            leading,
            Trailer::Warn(block),
            self.diagnostics,
        )
    }
}

/// All frames of a trajectory, as parallel per-channel sequences.
///
/// `x`, `y` and `z` always hold the same number of frames. `w` and `unit_cells` are either
/// empty or hold one entry per frame as well.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FrameSet {
    pub x: Vec<Vec<f32>>,
    pub y: Vec<Vec<f32>>,
    pub z: Vec<Vec<f32>>,
    pub w: Vec<Vec<f32>>,
    pub unit_cells: Vec<UnitCell>,
}

impl FrameSet {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn push(&mut self, frame: Frame) {
        let Frame {
            x,
            y,
            z,
            w,
            unit_cell,
        } = frame;
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);
        self.w.extend(w);
        self.unit_cells.extend(unit_cell);
    }

    /// Reassembles the frame at `idx`.
    pub fn frame(&self, idx: usize) -> Option<Frame> {
        Some(Frame {
            x: self.x.get(idx)?.clone(),
            y: self.y.get(idx)?.clone(),
            z: self.z.get(idx)?.clone(),
            w: self.w.get(idx).cloned(),
            unit_cell: self.unit_cells.get(idx).copied(),
        })
    }

    /// The positions of frame `idx`.
    pub fn coords(&self, idx: usize) -> Option<impl Iterator<Item = Vec3> + '_> {
        let (x, y, z) = (self.x.get(idx)?, self.y.get(idx)?, self.z.get(idx)?);
        Some(
            x.iter()
                .zip(y)
                .zip(z)
                .map(|((&x, &y), &z)| Vec3::new(x, y, z)),
        )
    }
}

impl FromIterator<Frame> for FrameSet {
    fn from_iter<T: IntoIterator<Item = Frame>>(iter: T) -> Self {
        let mut frames = Self::default();
        for frame in iter {
            frames.push(frame);
        }
        frames
    }
}
