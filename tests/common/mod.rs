#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

/// Describes a synthetic dcd file to be written for testing.
#[derive(Debug, Clone)]
pub struct Synthetic {
    pub tag: [u8; 4],
    pub nframes: i32,
    pub first_step: i32,
    pub nfree: i32,
    pub comment: Vec<u8>,
    pub natoms: i32,
    /// Per frame, the positions as `x, y, z` triples.
    pub frames: Vec<Vec<[f32; 3]>>,
    pub big_endian: bool,
}

impl Synthetic {
    pub fn new(frames: Vec<Vec<[f32; 3]>>) -> Self {
        let natoms = frames.first().map_or(0, |f| f.len()) as i32;
        Self {
            tag: *b"CORD",
            nframes: frames.len() as i32,
            first_step: 0,
            nfree: 0,
            comment: b"REMARKS synthetic trajectory".to_vec(),
            natoms,
            frames,
            big_endian: false,
        }
    }

    fn i32(&self, out: &mut Vec<u8>, value: i32) {
        if self.big_endian {
            out.extend(value.to_be_bytes())
        } else {
            out.extend(value.to_le_bytes())
        }
    }

    fn f32(&self, out: &mut Vec<u8>, value: f32) {
        if self.big_endian {
            out.extend(value.to_be_bytes())
        } else {
            out.extend(value.to_le_bytes())
        }
    }

    pub fn header_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.i32(&mut out, 84);
        out.extend(self.tag);
        self.i32(&mut out, self.nframes);
        self.i32(&mut out, self.first_step);
        out.extend([0u8; 24]);
        self.i32(&mut out, self.nfree);
        out.extend([0u8; 44]);
        self.i32(&mut out, 84);

        self.i32(&mut out, self.comment.len() as i32);
        out.extend(&self.comment);
        self.i32(&mut out, self.comment.len() as i32);

        self.i32(&mut out, 4);
        self.i32(&mut out, self.natoms);
        self.i32(&mut out, 4);

        if self.nfree > 0 {
            for idx in 0..(self.natoms - self.nfree + 2) {
                self.i32(&mut out, idx);
            }
        }
        out
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.header_bytes();
        for frame in &self.frames {
            for axis in 0..3 {
                let marker = frame.len() as i32 * 4;
                self.i32(&mut out, marker);
                for position in frame {
                    self.f32(&mut out, position[axis]);
                }
                self.i32(&mut out, marker);
            }
        }
        out
    }

    pub fn write(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(&self.to_bytes())
    }
}

/// The two frames of three atoms used throughout the tests. All values are exactly
/// representable.
pub fn three_atoms() -> Vec<Vec<[f32; 3]>> {
    vec![
        vec![[0.0, 1.5, -2.25], [1.0, -0.5, 4.0], [8.0, 0.125, -16.0]],
        vec![[0.5, 1.75, -2.0], [1.25, -0.75, 4.5], [7.5, 0.25, -15.5]],
    ]
}

/// Apply `f` to every coordinate.
pub fn map(frames: &[Vec<[f32; 3]>], f: impl Fn(f32) -> f32) -> Vec<Vec<[f32; 3]>> {
    frames
        .iter()
        .map(|frame| frame.iter().map(|p| p.map(&f)).collect())
        .collect()
}
