use std::io::{BufReader, Read};
use std::path::Path;

use glam::Vec3;
use tracing::{debug, warn};

use crate::reader::{f32s, read_bytes, read_i32, read_word, skip, ByteOrder};
pub use crate::compare::{
    compare, compare_files, structural_check, Axis, Comparison, ElementMismatch,
    StructuralMismatch, Tolerance,
};
pub use crate::config::Overrides;
pub use crate::error::{Error, Result};
pub use crate::reader::{Endianness, HEADER_SIZE};
pub use crate::report::{FileKind, Report};

pub mod compare;
pub mod config;
mod error;
pub mod reader;
pub mod report;

/// The tag that is expected to follow the header size word.
pub const MAGIC: [u8; 4] = *b"CORD";

/// Number of opaque bytes between the first step and the free atom index count.
const RESERVED_A: u64 = 24;
/// Number of opaque bytes between the free atom index count and the end of the header record.
const RESERVED_B: u64 = 44;

/// The metadata at the start of a dcd file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Size of the fixed header record. Always 84 for well-formed files.
    pub header_size: i32,
    pub tag: [u8; 4],
    /// Number of frames in the trajectory. Never zero.
    pub nframes: usize,
    /// Index of the first simulation step.
    pub first_step: i32,
    /// Number of free atom indices. If positive, an index block follows the header, which is
    /// skipped.
    pub nfree: i32,
    /// Raw comment record. Not interpreted.
    pub comment: Vec<u8>,
    pub natoms: usize,
}

/// A single snapshot of all atom positions.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Frame {
    /// Positions stored as consecutive `x, y, z` triples, in the atom order of the file.
    pub positions: Vec<f32>,
}

impl Frame {
    pub fn coords<'f>(&'f self) -> impl Iterator<Item = Vec3> + 'f {
        self.positions.chunks_exact(3).map(Vec3::from_slice)
    }

    pub fn natoms(&self) -> usize {
        self.positions.len() / 3
    }

    /// Returns the position of the atom at `idx`, if it exists.
    pub fn get(&self, idx: usize) -> Option<Vec3> {
        self.positions
            .get(idx * 3..idx * 3 + 3)
            .map(Vec3::from_slice)
    }
}

/// A sequential reader for the dcd format.
///
/// Bytes are consumed strictly in order. There is no seeking, so reading a file a second time
/// means opening it again.
#[derive(Debug)]
pub struct DCDReader<R> {
    pub file: R,
    endianness: Endianness,
    order: ByteOrder,
    /// Number of frames read so far.
    frame: usize,
    scratch: Vec<u8>,
}

impl DCDReader<BufReader<std::fs::File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> DCDReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_endianness(reader, Endianness::default())
    }

    pub fn with_endianness(reader: R, endianness: Endianness) -> Self {
        let order = match endianness {
            Endianness::Big => ByteOrder::Big,
            Endianness::Little | Endianness::Detect => ByteOrder::Little,
        };
        Self {
            file: reader,
            endianness,
            order,
            frame: 0,
            scratch: Vec::new(),
        }
    }

    /// Reads the [`Header`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedHeader`] if the stream ends before the header is complete or if
    /// one of its lengths is negative, and [`Error::EmptyTrajectory`] if the header declares
    /// zero frames.
    pub fn read_header(&mut self) -> Result<Header> {
        let first = read_word(&mut self.file).map_err(Error::in_header("header size"))?;
        self.order = self.endianness.resolve(first);
        let header_size = self.order.i32(first);
        if header_size != HEADER_SIZE {
            warn!("header size is {header_size}, expected {HEADER_SIZE}");
        }

        let tag = read_word(&mut self.file).map_err(Error::in_header("tag"))?;
        if tag != MAGIC {
            warn!(
                "found unexpected tag {:?}, expected {:?}",
                String::from_utf8_lossy(&tag),
                String::from_utf8_lossy(&MAGIC)
            );
        }
        let nframes = self.i32("frame count")?;
        let first_step = self.i32("first step")?;
        skip(&mut self.file, RESERVED_A).map_err(Error::in_header("reserved"))?;
        let nfree = self.i32("free atom index count")?;
        skip(&mut self.file, RESERVED_B).map_err(Error::in_header("reserved"))?;
        let trailer = self.i32("header trailer")?;
        self.check_trailer("header", header_size, trailer);

        let comment_len = self.i32("comment length")?;
        let comment_len: usize = comment_len.try_into().map_err(|_| {
            Error::malformed("comment length", format!("negative length {comment_len}"))
        })?;
        let mut comment = Vec::new();
        read_bytes(&mut self.file, &mut comment, comment_len as u64)
            .map_err(Error::in_header("comment"))?;
        let trailer = self.i32("comment trailer")?;
        self.check_trailer("comment", comment_len as i32, trailer);

        let marker = self.i32("atom count marker")?;
        let natoms = self.i32("atom count")?;
        let trailer = self.i32("atom count trailer")?;
        self.check_trailer("atom count", marker, trailer);
        let natoms: usize = natoms
            .try_into()
            .map_err(|_| Error::malformed("atom count", format!("negative count {natoms}")))?;

        if nfree > 0 {
            // The index block is sized by the number of fixed atoms, and is not decoded.
            let nbytes = 4 * (natoms as i64 - nfree as i64 + 2);
            let nbytes: u64 = nbytes.try_into().map_err(|_| {
                Error::malformed(
                    "free atom indices",
                    format!("{nfree} free atom indices exceed the atom count {natoms}"),
                )
            })?;
            skip(&mut self.file, nbytes).map_err(Error::in_header("free atom indices"))?;
        }

        let nframes = match nframes {
            0 => return Err(Error::EmptyTrajectory),
            n if n < 0 => {
                return Err(Error::malformed("frame count", format!("negative count {n}")))
            }
            n => n as usize,
        };

        Ok(Header {
            header_size,
            tag,
            nframes,
            first_step,
            nfree,
            comment,
            natoms,
        })
    }

    /// Reads a [`Frame`] of `natoms` positions into `frame` and advances one step.
    ///
    /// The block markers around each axis are consumed but a mismatch with the payload size only
    /// produces a warning. Buffers are only sized once the x block has actually been read, so an
    /// inflated atom count in a damaged file ends in [`Error::TruncatedFrame`].
    pub fn read_frame(&mut self, natoms: usize, frame: &mut Frame) -> Result<()> {
        let idx = self.frame;
        let nbytes = natoms as u64 * 4;
        frame.positions.clear();

        for axis in Axis::ALL {
            let eof = || Error::in_frame(idx, axis);
            let marker = read_i32(&mut self.file, self.order).map_err(eof())?;
            read_bytes(&mut self.file, &mut self.scratch, nbytes).map_err(eof())?;
            let trailer = read_i32(&mut self.file, self.order).map_err(eof())?;

            if marker as i64 != nbytes as i64 {
                warn!("frame {idx}: {axis} block marker is {marker}, expected {nbytes}");
            }
            self.check_trailer("frame", marker, trailer);

            if axis == Axis::X {
                frame.positions.resize(natoms * 3, 0.0);
            }
            let offset = axis.index();
            let values = f32s(&self.scratch, self.order);
            for (position, value) in frame.positions.chunks_exact_mut(3).zip(values) {
                position[offset] = value;
            }
        }

        self.frame += 1;
        Ok(())
    }

    /// Reads the header and returns a lazy iterator over the frames that follow it.
    ///
    /// The iterator takes ownership of the reader, so the frames can be visited only once.
    pub fn into_frames(mut self) -> Result<Frames<R>> {
        let header = self.read_header()?;
        Ok(Frames {
            remaining: 0..header.nframes,
            reader: self,
            header,
        })
    }

    /// Reads the header and all frames into a [`Trajectory`].
    pub fn read_trajectory(self) -> Result<Trajectory> {
        let mut frames = self.into_frames()?;
        let collected = frames.by_ref().collect::<Result<Vec<_>>>()?;
        Ok(Trajectory {
            header: frames.header,
            frames: collected.into_boxed_slice(),
        })
    }

    fn i32(&mut self, field: &'static str) -> Result<i32> {
        read_i32(&mut self.file, self.order).map_err(Error::in_header(field))
    }

    fn check_trailer(&self, record: &str, marker: i32, trailer: i32) {
        if marker != trailer {
            warn!("{record} record marker ({marker}) does not match its trailer ({trailer})");
        }
    }
}

/// A single-pass iterator over the frames of a dcd file.
///
/// Yields exactly [`Header::nframes`] frames unless an error occurs, after which it is
/// exhausted.
#[derive(Debug)]
pub struct Frames<R> {
    reader: DCDReader<R>,
    header: Header,
    remaining: std::ops::Range<usize>,
}

impl<R> Frames<R> {
    pub fn header(&self) -> &Header {
        &self.header
    }
}

impl<R: Read> Iterator for Frames<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.remaining.next()?;
        let mut frame = Frame::default();
        match self.reader.read_frame(self.header.natoms, &mut frame) {
            Ok(()) => Some(Ok(frame)),
            Err(err) => {
                self.remaining = 0..0;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining.len()))
    }
}

/// A fully decoded dcd file.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub header: Header,
    pub frames: Box<[Frame]>,
}

impl Trajectory {
    pub fn new(header: Header, frames: impl Into<Box<[Frame]>>) -> Self {
        Self {
            header,
            frames: frames.into(),
        }
    }

    /// Reads a trajectory from any source, assuming little-endian words.
    pub fn read<R: Read>(reader: R) -> Result<Self> {
        Self::read_with_endianness(reader, Endianness::default())
    }

    pub fn read_with_endianness<R: Read>(reader: R, endianness: Endianness) -> Result<Self> {
        DCDReader::with_endianness(reader, endianness).read_trajectory()
    }

    /// Reads the trajectory at `path`, assuming little-endian words.
    ///
    /// The file is closed before this function returns, whether decoding succeeded or not.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_endianness(path, Endianness::default())
    }

    pub fn load_with_endianness<P: AsRef<Path>>(path: P, endianness: Endianness) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let trajectory = Self::read_with_endianness(BufReader::new(file), endianness)?;
        debug!(
            path = %path.display(),
            nframes = trajectory.header.nframes,
            natoms = trajectory.header.natoms,
            "loaded trajectory"
        );
        Ok(trajectory)
    }

    pub fn natoms(&self) -> usize {
        self.header.natoms
    }

    pub fn nframes(&self) -> usize {
        self.frames.len()
    }
}
