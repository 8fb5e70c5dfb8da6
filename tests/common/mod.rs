//! A small dcd writer for synthesizing test trajectories in every layout.
#![allow(dead_code)]

use std::io::Cursor;

use dcd::{ByteOrder, WordWidth};

pub const ALL_LAYOUTS: [(WordWidth, ByteOrder); 4] = [
    (WordWidth::Four, ByteOrder::Big),
    (WordWidth::Four, ByteOrder::Little),
    (WordWidth::Eight, ByteOrder::Big),
    (WordWidth::Eight, ByteOrder::Little),
];

/// Per-frame channels as written to the file. For fixed-atom trajectories, frames after the
/// first hold only the free atoms.
#[derive(Debug, Clone, Default)]
pub struct RawFrame {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub w: Option<Vec<f32>>,
    /// a, b, c, alpha, beta, gamma.
    pub unit_cell: Option<[f64; 6]>,
}

#[derive(Debug, Clone)]
pub struct DcdBuilder {
    pub word_width: WordWidth,
    pub byte_order: ByteOrder,
    pub charmm: bool,
    pub istart: i32,
    pub nsavc: i32,
    pub nstep: i32,
    pub step_size: f64,
    pub title: Vec<String>,
    /// Overrides the line count written to the title block.
    pub declared_title_lines: Option<i32>,
    pub num_atoms: i32,
    /// One-based free atom indices. Empty means no fixed atoms.
    pub free_indexes: Vec<i32>,
    pub frames: Vec<RawFrame>,
    /// Overrides the nset written to the header.
    pub nset: Option<i32>,
    pub header_trailer: Option<u64>,
    pub free_trailer: Option<u64>,
    /// Replaces the trailing marker of the x block in the frame with this index.
    pub x_trailer: Option<(usize, u64)>,
    /// Replaces the trailing marker of the unit cell in the frame with this index.
    pub unit_cell_trailer: Option<(usize, u64)>,
}

impl DcdBuilder {
    pub fn new(word_width: WordWidth, byte_order: ByteOrder) -> Self {
        Self {
            word_width,
            byte_order,
            charmm: true,
            istart: 0,
            nsavc: 1,
            nstep: 0,
            step_size: 0.5,
            title: vec!["REMARKS created by the test suite".to_string()],
            declared_title_lines: None,
            num_atoms: 0,
            free_indexes: Vec::new(),
            frames: Vec::new(),
            nset: None,
            header_trailer: None,
            free_trailer: None,
            x_trailer: None,
            unit_cell_trailer: None,
        }
    }

    /// Adds `nframes` full frames of `natoms` atoms with distinct, predictable values.
    pub fn with_frames(mut self, natoms: usize, nframes: usize) -> Self {
        self.num_atoms = natoms as i32;
        self.frames = (0..nframes).map(|f| full_frame(natoms, f)).collect();
        self
    }

    pub fn num_fixed(&self) -> i32 {
        if self.free_indexes.is_empty() {
            0
        } else {
            self.num_atoms - self.free_indexes.len() as i32
        }
    }

    fn i32(&self, value: i32) -> [u8; 4] {
        match self.byte_order {
            ByteOrder::Big => value.to_be_bytes(),
            ByteOrder::Little => value.to_le_bytes(),
        }
    }

    /// A signed integer of the word width.
    fn word(&self, value: i64) -> Vec<u8> {
        self.marker(value as u64)
    }

    fn marker(&self, value: u64) -> Vec<u8> {
        match (self.word_width, self.byte_order) {
            (WordWidth::Four, ByteOrder::Big) => (value as u32).to_be_bytes().to_vec(),
            (WordWidth::Four, ByteOrder::Little) => (value as u32).to_le_bytes().to_vec(),
            (WordWidth::Eight, ByteOrder::Big) => value.to_be_bytes().to_vec(),
            (WordWidth::Eight, ByteOrder::Little) => value.to_le_bytes().to_vec(),
        }
    }

    fn f32s(&self, values: &[f32]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|v| match self.byte_order {
                ByteOrder::Big => v.to_be_bytes(),
                ByteOrder::Little => v.to_le_bytes(),
            })
            .collect()
    }

    fn f64(&self, value: f64) -> [u8; 8] {
        match self.byte_order {
            ByteOrder::Big => value.to_be_bytes(),
            ByteOrder::Little => value.to_le_bytes(),
        }
    }

    fn record(&self, out: &mut Vec<u8>, payload: &[u8], trailer: Option<u64>) {
        let len = payload.len() as u64;
        out.extend(self.marker(len));
        out.extend_from_slice(payload);
        out.extend(self.marker(trailer.unwrap_or(len)));
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();

        // Header.
        let mut icntrl = Vec::with_capacity(80);
        let nset = self.nset.unwrap_or(self.frames.len() as i32);
        for value in [nset, self.istart, self.nsavc, self.nstep, 0, 0, 0, 0] {
            icntrl.extend(self.i32(value));
        }
        icntrl.extend(self.i32(self.num_fixed()));
        if self.charmm {
            let step = match self.byte_order {
                ByteOrder::Big => (self.step_size as f32).to_be_bytes(),
                ByteOrder::Little => (self.step_size as f32).to_le_bytes(),
            };
            icntrl.extend(step);
            let has_cell = self.frames.iter().any(|f| f.unit_cell.is_some());
            let has_w = self.frames.iter().any(|f| f.w.is_some());
            icntrl.extend(self.i32(has_cell as i32));
            icntrl.extend(self.i32(has_w as i32));
        } else {
            icntrl.extend(self.f64(self.step_size));
        }
        while icntrl.len() < 76 {
            icntrl.extend(self.i32(0));
        }
        icntrl.extend(self.i32(if self.charmm { 24 } else { 0 }));

        let mut header = b"CORD".to_vec();
        header.extend(icntrl);
        out.extend(self.marker(84));
        out.extend_from_slice(&header);
        out.extend(self.marker(self.header_trailer.unwrap_or(84)));

        // Title.
        let lines = self
            .declared_title_lines
            .unwrap_or(self.title.len() as i32);
        let mut title = self.word(i64::from(lines));
        for line in &self.title {
            let mut padded = [b' '; 80];
            let n = line.len().min(80);
            padded[..n].copy_from_slice(&line.as_bytes()[..n]);
            title.extend_from_slice(&padded);
        }
        self.record(&mut out, &title, None);

        // Atoms.
        self.record(&mut out, &self.word(i64::from(self.num_atoms)), None);
        if !self.free_indexes.is_empty() {
            let payload: Vec<u8> = self.free_indexes.iter().flat_map(|&i| self.i32(i)).collect();
            self.record(&mut out, &payload, self.free_trailer);
        }

        // Frames.
        for (idx, frame) in self.frames.iter().enumerate() {
            if let Some(cell) = frame.unit_cell {
                let [a, b, c, alpha, beta, gamma] = cell;
                let payload: Vec<u8> = [a, gamma, b, beta, alpha, c]
                    .into_iter()
                    .flat_map(|v| self.f64(v))
                    .collect();
                self.record(&mut out, &payload, trailer_at(self.unit_cell_trailer, idx));
            }
            let x_trailer = trailer_at(self.x_trailer, idx);
            self.record(&mut out, &self.f32s(&frame.x), x_trailer);
            self.record(&mut out, &self.f32s(&frame.y), None);
            self.record(&mut out, &self.f32s(&frame.z), None);
            if let Some(w) = &frame.w {
                self.record(&mut out, &self.f32s(w), None);
            }
        }

        out
    }

    pub fn cursor(&self) -> Cursor<Vec<u8>> {
        Cursor::new(self.build())
    }
}

fn trailer_at(trailer: Option<(usize, u64)>, idx: usize) -> Option<u64> {
    trailer
        .filter(|&(frame_idx, _)| frame_idx == idx)
        .map(|(_, trailer)| trailer)
}

/// A full frame whose values encode the frame, channel and atom they belong to.
pub fn full_frame(natoms: usize, frame: usize) -> RawFrame {
    let channel = |c: usize| {
        (0..natoms)
            .map(|a| (frame * 1000 + c * 100 + a) as f32 * 0.5)
            .collect::<Vec<_>>()
    };
    RawFrame {
        x: channel(0),
        y: channel(1),
        z: channel(2),
        w: None,
        unit_cell: None,
    }
}
