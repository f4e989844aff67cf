//! Tolerance-based comparison of two trajectories.
//!
//! A comparison first checks that the two headers describe the same kind of trajectory. Only
//! when they do are the coordinates compared element by element, visiting every value of the
//! expected trajectory and recording every difference that exceeds the tolerance.
use std::io::Read;
use std::path::Path;

use tracing::{debug, instrument};

use crate::{DCDReader, Endianness, Error, Frame, Header, Result, Trajectory};

/// The default maximum absolute difference between two values.
pub const DEFAULT_EPSILON: f64 = 1e-5;
/// The default factor applied to expected values.
pub const DEFAULT_SCALE: f64 = 1.0;

/// One of the three coordinate axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes, in the order in which they are stored in a frame.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub const fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(name)
    }
}

/// Parameters that decide whether two values are considered equal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Largest absolute difference that still passes.
    pub epsilon: f64,
    /// Multiplier applied to each expected value before comparing, e.g., for unit conversion.
    pub scale: f64,
    /// Compare absolute values, for data where the sign is arbitrary (eigenvectors).
    pub ignore_sign: bool,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            scale: DEFAULT_SCALE,
            ignore_sign: false,
        }
    }
}

impl Tolerance {
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon,
            ..Self::default()
        }
    }

    pub fn with_scale(self, scale: f64) -> Self {
        Self { scale, ..self }
    }

    pub fn with_ignore_sign(self, ignore_sign: bool) -> Self {
        Self {
            ignore_sign,
            ..self
        }
    }

    /// Returns the difference between a scaled `expected` value and `actual`.
    ///
    /// Computed as max minus min, so equal values always give exactly zero.
    pub fn difference(&self, expected: f64, actual: f64) -> f64 {
        let (expected, actual) = if self.ignore_sign {
            (expected.abs(), actual.abs())
        } else {
            (expected, actual)
        };
        f64::max(expected, actual) - f64::min(expected, actual)
    }

    /// Whether the difference is within tolerance. Equality with epsilon passes.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn accepts(&self, difference: f64) -> bool {
        !(difference > self.epsilon)
    }
}

/// Reason two headers describe incompatible trajectories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralMismatch {
    Tag { expected: [u8; 4], actual: [u8; 4] },
    FrameCount { expected: usize, actual: usize },
    FirstStep { expected: i32, actual: i32 },
    AtomCount { expected: usize, actual: usize },
}

impl std::fmt::Display for StructuralMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructuralMismatch::Tag { expected, actual } => write!(
                f,
                "tags differ, should be {:?} but is {:?}",
                String::from_utf8_lossy(expected),
                String::from_utf8_lossy(actual)
            ),
            StructuralMismatch::FrameCount { expected, actual } => write!(
                f,
                "frame count differs, should be {expected} but is {actual}"
            ),
            StructuralMismatch::FirstStep { expected, actual } => write!(
                f,
                "first step differs, should be {expected} but is {actual}"
            ),
            StructuralMismatch::AtomCount { expected, actual } => write!(
                f,
                "atom count differs, should be {expected} but is {actual}"
            ),
        }
    }
}

/// A single value that differs by more than the tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementMismatch {
    pub frame: usize,
    pub atom: usize,
    pub axis: Axis,
    /// The expected value, after scaling.
    pub expected: f64,
    pub actual: f64,
    pub difference: f64,
}

impl std::fmt::Display for ElementMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "frame {}, atom {}, {} differs. expected: {:.6}, actual: {:.6}, difference: {:.6}",
            self.frame, self.atom, self.axis, self.expected, self.actual, self.difference
        )
    }
}

/// The outcome of comparing two trajectories.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub epsilon: f64,
    /// Set if the headers disagree. In that case no values were compared.
    pub structural: Option<StructuralMismatch>,
    pub mismatches: Vec<ElementMismatch>,
}

impl Comparison {
    fn new(tolerance: &Tolerance) -> Self {
        Self {
            epsilon: tolerance.epsilon,
            structural: None,
            mismatches: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.structural.is_none() && self.mismatches.is_empty()
    }

    pub fn mismatch_count(&self) -> usize {
        self.mismatches.len()
    }

    /// Compare one frame, appending any mismatches.
    fn compare_frame(
        &mut self,
        tolerance: &Tolerance,
        idx: usize,
        expected: &Frame,
        actual: &Frame,
    ) -> Result<()> {
        for (atom, e) in expected.coords().enumerate() {
            let a = actual
                .get(atom)
                .ok_or(Error::OutOfRange { frame: idx, atom })?;
            for axis in Axis::ALL {
                let expected = e[axis.index()] as f64 * tolerance.scale;
                let actual = a[axis.index()] as f64;
                let difference = tolerance.difference(expected, actual);
                if !tolerance.accepts(difference) {
                    let mismatch = ElementMismatch {
                        frame: idx,
                        atom,
                        axis,
                        expected,
                        actual,
                        difference,
                    };
                    debug!("{mismatch}");
                    self.mismatches.push(mismatch);
                }
            }
        }
        Ok(())
    }
}

/// Check that two headers describe the same trajectory layout.
///
/// The checks are performed in order: tag, frame count, first step, atom count. The comment
/// is not compared.
pub fn structural_check(expected: &Header, actual: &Header) -> Option<StructuralMismatch> {
    let mismatch = if expected.tag != actual.tag {
        StructuralMismatch::Tag {
            expected: expected.tag,
            actual: actual.tag,
        }
    } else if expected.nframes != actual.nframes {
        StructuralMismatch::FrameCount {
            expected: expected.nframes,
            actual: actual.nframes,
        }
    } else if expected.first_step != actual.first_step {
        StructuralMismatch::FirstStep {
            expected: expected.first_step,
            actual: actual.first_step,
        }
    } else if expected.natoms != actual.natoms {
        StructuralMismatch::AtomCount {
            expected: expected.natoms,
            actual: actual.natoms,
        }
    } else {
        return None;
    };
    debug!("{mismatch}");
    Some(mismatch)
}

/// Compare `actual` against `expected` within `tolerance`.
///
/// Every value of `expected` is visited, so the result holds all mismatches rather than just
/// the first. A comparison of trajectories without frames or atoms passes.
///
/// # Errors
///
/// Returns [`Error::OutOfRange`] if `actual` holds fewer frames or atoms than `expected`.
pub fn compare(
    expected: &Trajectory,
    actual: &Trajectory,
    tolerance: &Tolerance,
) -> Result<Comparison> {
    let mut comparison = Comparison::new(tolerance);
    if let Some(mismatch) = structural_check(&expected.header, &actual.header) {
        comparison.structural = Some(mismatch);
        return Ok(comparison);
    }

    for (idx, e) in expected.frames.iter().enumerate() {
        let a = actual.frames.get(idx).ok_or(Error::OutOfRange {
            frame: idx,
            atom: 0,
        })?;
        comparison.compare_frame(tolerance, idx, e, a)?;
    }
    Ok(comparison)
}

/// Compare the trajectory in the file at `actual` against the one at `expected`.
///
/// Both headers are read before any frame. If they disagree, the frames are never decoded, so
/// a damaged body behind a mismatching header still yields a failed [`Comparison`] rather than
/// an error. Otherwise the frames are compared pairwise as they are read.
#[instrument(skip_all, fields(expected = %expected.as_ref().display(), actual = %actual.as_ref().display()))]
pub fn compare_files<P: AsRef<Path>, Q: AsRef<Path>>(
    expected: P,
    actual: Q,
    tolerance: &Tolerance,
    endianness: Endianness,
) -> Result<Comparison> {
    let open = |path: &Path| -> Result<_> {
        let file = std::fs::File::open(path)?;
        Ok(DCDReader::with_endianness(
            std::io::BufReader::new(file),
            endianness,
        ))
    };
    let expected = open(expected.as_ref())?;
    let actual = open(actual.as_ref())?;
    compare_readers(expected, actual, tolerance)
}

/// Compare two trajectories frame by frame, straight from their readers.
pub fn compare_readers<R: Read, S: Read>(
    expected: DCDReader<R>,
    actual: DCDReader<S>,
    tolerance: &Tolerance,
) -> Result<Comparison> {
    let expected = expected.into_frames()?;
    let mut actual = actual.into_frames()?;

    let mut comparison = Comparison::new(tolerance);
    if let Some(mismatch) = structural_check(expected.header(), actual.header()) {
        comparison.structural = Some(mismatch);
        return Ok(comparison);
    }

    for (idx, e) in expected.enumerate() {
        let e = e?;
        let a = actual.next().ok_or(Error::OutOfRange {
            frame: idx,
            atom: 0,
        })??;
        comparison.compare_frame(tolerance, idx, &e, &a)?;
    }
    Ok(comparison)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(nframes: usize, natoms: usize) -> Header {
        Header {
            header_size: crate::HEADER_SIZE,
            tag: crate::MAGIC,
            nframes,
            first_step: 0,
            nfree: 0,
            comment: Vec::new(),
            natoms,
        }
    }

    fn trajectory(frames: &[&[f32]]) -> Trajectory {
        let natoms = frames.first().map_or(0, |f| f.len() / 3);
        let frames: Vec<Frame> = frames
            .iter()
            .map(|positions| Frame {
                positions: positions.to_vec(),
            })
            .collect();
        Trajectory::new(header(frames.len(), natoms), frames)
    }

    #[test]
    fn difference_is_symmetric() {
        let tolerance = Tolerance::default();
        assert_eq!(tolerance.difference(1.0, 3.0), 2.0);
        assert_eq!(tolerance.difference(3.0, 1.0), 2.0);
        assert_eq!(tolerance.difference(-0.5, -0.5), 0.0);
    }

    #[test]
    fn difference_ignoring_sign() {
        let tolerance = Tolerance::default().with_ignore_sign(true);
        assert_eq!(tolerance.difference(-1.5, 1.5), 0.0);
        assert_eq!(tolerance.difference(-1.0, 3.0), 2.0);
    }

    #[test]
    fn epsilon_is_inclusive() {
        let tolerance = Tolerance::new(0.25);
        assert!(tolerance.accepts(0.25));
        assert!(!tolerance.accepts(0.2500001));
    }

    #[test]
    fn structural_checks_in_order() {
        let expected = header(2, 3);

        let mut actual = header(1, 4);
        actual.first_step = 10;
        assert_eq!(
            structural_check(&expected, &actual),
            Some(StructuralMismatch::FrameCount {
                expected: 2,
                actual: 1
            })
        );

        actual.tag = *b"VELD";
        assert!(matches!(
            structural_check(&expected, &actual),
            Some(StructuralMismatch::Tag { .. })
        ));

        let mut actual = header(2, 4);
        actual.first_step = 10;
        assert_eq!(
            structural_check(&expected, &actual),
            Some(StructuralMismatch::FirstStep {
                expected: 0,
                actual: 10
            })
        );

        let actual = header(2, 4);
        assert_eq!(
            structural_check(&expected, &actual),
            Some(StructuralMismatch::AtomCount {
                expected: 3,
                actual: 4
            })
        );
    }

    #[test]
    fn comment_is_not_compared() {
        let expected = header(1, 1);
        let mut actual = header(1, 1);
        actual.comment = b"Created by a different program".to_vec();
        assert_eq!(structural_check(&expected, &actual), None);
    }

    #[test]
    fn counts_every_mismatch() -> Result<()> {
        let expected = trajectory(&[&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]]);
        let actual = trajectory(&[&[1.0, 0.0, 1.0, 1.0, 0.0, 1.0]]);
        let comparison = compare(&expected, &actual, &Tolerance::new(0.5))?;
        assert!(!comparison.passed());
        assert_eq!(comparison.mismatch_count(), 3);
        let positions: Vec<_> = comparison
            .mismatches
            .iter()
            .map(|m| (m.frame, m.atom, m.axis))
            .collect();
        assert_eq!(
            positions,
            [(0, 0, Axis::X), (0, 0, Axis::Z), (0, 1, Axis::Y)]
        );
        Ok(())
    }

    #[test]
    fn scale_applies_to_expected() -> Result<()> {
        let expected = trajectory(&[&[1.0, 2.0, 3.0]]);
        let actual = trajectory(&[&[10.0, 20.0, 30.0]]);
        let tolerance = Tolerance::new(0.0).with_scale(10.0);
        assert!(compare(&expected, &actual, &tolerance)?.passed());
        assert!(!compare(&actual, &expected, &tolerance)?.passed());
        Ok(())
    }

    #[test]
    fn empty_trajectories_pass() -> Result<()> {
        let empty = trajectory(&[&[]]);
        let comparison = compare(&empty, &empty, &Tolerance::new(0.0))?;
        assert!(comparison.passed());
        Ok(())
    }

    #[test]
    fn structural_mismatch_skips_values() -> Result<()> {
        let expected = trajectory(&[&[0.0; 3], &[0.0; 3]]);
        let actual = trajectory(&[&[5.0; 3]]);
        let comparison = compare(&expected, &actual, &Tolerance::default())?;
        assert!(!comparison.passed());
        assert!(comparison.mismatches.is_empty());
        assert!(matches!(
            comparison.structural,
            Some(StructuralMismatch::FrameCount { .. })
        ));
        Ok(())
    }

    #[test]
    fn short_actual_is_out_of_range() {
        let expected = trajectory(&[&[0.0; 6]]);
        // The header claims as many atoms as expected, but the frame is short.
        let mut actual = trajectory(&[&[0.0; 3]]);
        actual.header.natoms = 2;
        let result = compare(&expected, &actual, &Tolerance::default());
        assert!(matches!(
            result,
            Err(Error::OutOfRange { frame: 0, atom: 1 })
        ));
    }
}
