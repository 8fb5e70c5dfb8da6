use std::io::Read;

use crate::error::{AtStage, Error, FormatError, Result, Stage};
use crate::reader::{Codec, HEADER_MARKER};

/// The two header layouts a dcd file can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Charmm,
    Xplor,
}

/// Simulation parameters from the fixed `ICNTRL` header block.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Header {
    /// Number of frames.
    pub nset: i32,
    pub istart: i32,
    pub nsavc: i32,
    pub nstep: i32,
    /// Number of fixed atoms. Zero when every atom is stored in every frame.
    pub num_fixed: i32,
    /// Time step in picoseconds.
    pub step_size: f64,
    /// CHARMM version tag. Zero for X-PLOR files.
    pub charmm_version: i32,
    /// Every frame is preceded by a unit cell record.
    pub has_extra_block: bool,
    /// Every frame carries a fourth coordinate channel.
    pub has_w_channel: bool,
}

impl Header {
    /// Size of the `ICNTRL` block between the `CORD` tag and the trailing marker.
    pub const SIZE: usize = 80;

    pub fn is_charmm(&self) -> bool {
        self.charmm_version != 0
    }

    pub fn dialect(&self) -> Dialect {
        if self.is_charmm() {
            Dialect::Charmm
        } else {
            Dialect::Xplor
        }
    }

    /// Number of frames, with negative counts read as empty.
    pub fn num_frames(&self) -> usize {
        usize::try_from(self.nset).unwrap_or_default()
    }

    /// Reads the header block that follows the `CORD` tag, including its trailing marker.
    pub fn read<R: Read>(file: &mut R, codec: Codec) -> Result<Self> {
        let stage = Stage::Header;
        let mut block = [0u8; Self::SIZE];
        file.read_exact(&mut block).at(stage)?;

        // The leading marker (84) was consumed during detection.
        let trailing = codec.read_marker(file).at(stage)?;
        if trailing != HEADER_MARKER {
            return Err(Error::format(
                stage,
                FormatError::RecordMarkerMismatch {
                    leading: HEADER_MARKER,
                    trailing,
                },
            ));
        }

        let header = Self::from_bytes(&block, codec);
        log::debug!(
            "{:?} header: nset={} istart={} nsavc={} nstep={} num_fixed={}",
            header.dialect(),
            header.nset,
            header.istart,
            header.nsavc,
            header.nstep,
            header.num_fixed,
        );
        Ok(header)
    }

    /// Extracts the fields from the raw `ICNTRL` block by their fixed offsets.
    pub fn from_bytes(block: &[u8; Self::SIZE], codec: Codec) -> Self {
        let icntrl = |idx: usize| codec.i32_from(&block[idx * 4..]);

        let charmm_version = icntrl(19);
        let is_charmm = charmm_version != 0;
        // X-PLOR stores a double over ICNTRL[9..11]. CHARMM a float at ICNTRL[9] with flags after.
        let step_size = if is_charmm {
            f64::from(codec.f32_from(&block[36..40]))
        } else {
            codec.f64_from(&block[36..44])
        };

        Self {
            nset: icntrl(0),
            istart: icntrl(1),
            nsavc: icntrl(2),
            nstep: icntrl(3),
            num_fixed: icntrl(8),
            step_size,
            charmm_version,
            has_extra_block: is_charmm && icntrl(10) != 0,
            has_w_channel: is_charmm && icntrl(11) == 1,
        }
    }
}
