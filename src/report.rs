//! Aggregation of comparison verdicts over a batch of output files.
use std::path::Path;

use tracing::{info, warn};

use crate::Comparison;

/// How an output file is to be compared, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A dcd trajectory.
    Trajectory,
    /// Eigenvectors, stored as text. Their sign is arbitrary, so whichever comparator handles
    /// them must ignore it. That comparator lives outside of this crate.
    Eigenvectors,
    /// Files that are never compared, such as headers and xtc trajectories.
    Skipped,
    /// Any other output, which requires a comparator outside of this crate.
    Unsupported,
}

impl FileKind {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let extension = path.as_ref().extension().and_then(|e| e.to_str());
        match extension {
            Some("dcd") => FileKind::Trajectory,
            Some("vec") => FileKind::Eigenvectors,
            Some("header" | "xtc") => FileKind::Skipped,
            _ => FileKind::Unsupported,
        }
    }

    /// Whether values of this kind are compared regardless of their sign.
    pub fn ignores_sign(self) -> bool {
        matches!(self, FileKind::Eigenvectors)
    }

    /// Whether this crate compares files of this kind.
    pub fn is_compared(self) -> bool {
        matches!(self, FileKind::Trajectory)
    }
}

/// Counts of attempted, passed, and failed comparisons, with a description of each failure.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    pub attempted: usize,
    pub passed: usize,
    pub failed: usize,
    /// Descriptions of the failed comparisons, in the order they were recorded.
    pub failures: Vec<String>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a pair of files that was found but not compared.
    pub fn record_skipped(&mut self, expected: &Path, actual: &Path) {
        self.attempted += 1;
        info!(
            "skipping {} and {}",
            expected.display(),
            actual.display()
        );
    }

    /// Record the verdict of a comparison between `expected` and `actual`.
    pub fn record(&mut self, expected: &Path, actual: &Path, comparison: &Comparison) {
        self.attempted += 1;
        if comparison.passed() {
            self.passed += 1;
            info!("passed");
        } else {
            match &comparison.structural {
                Some(mismatch) => warn!("failed: {mismatch}"),
                None => warn!(
                    "failed: {} values differ by more than {}",
                    comparison.mismatch_count(),
                    comparison.epsilon
                ),
            }
            self.push_failure(expected, actual);
        }
    }

    /// Record a comparison that could not be completed, for instance because a file could not
    /// be decoded.
    pub fn record_error(&mut self, expected: &Path, actual: &Path, error: &crate::Error) {
        self.attempted += 1;
        warn!("failed: {error}");
        self.push_failure(expected, actual);
    }

    fn push_failure(&mut self, expected: &Path, actual: &Path) {
        self.failed += 1;
        self.failures.push(format!(
            "Comparison of {} and {}",
            expected.display(),
            actual.display()
        ));
    }

    /// Number of pairs that were counted but neither passed nor failed.
    pub fn not_run(&self) -> usize {
        self.attempted - (self.passed + self.failed)
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn log_summary(&self) {
        info!("tests: {}", self.attempted);
        info!("tests not run: {}", self.not_run());
        info!("tests passed: {}", self.passed);
        info!("tests failed: {}", self.failed);
        for failure in &self.failures {
            warn!("{failure} failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Axis, ElementMismatch, StructuralMismatch};

    fn comparison(structural: Option<StructuralMismatch>, nmismatches: usize) -> Comparison {
        let mismatch = ElementMismatch {
            frame: 0,
            atom: 0,
            axis: Axis::X,
            expected: 1.0,
            actual: 2.0,
            difference: 1.0,
        };
        Comparison {
            epsilon: 1e-5,
            structural,
            mismatches: vec![mismatch; nmismatches],
        }
    }

    #[test]
    fn file_kinds() {
        assert_eq!(FileKind::from_path("out/alanine.dcd"), FileKind::Trajectory);
        assert_eq!(FileKind::from_path("out/nm.vec"), FileKind::Eigenvectors);
        assert_eq!(FileKind::from_path("out/alanine.header"), FileKind::Skipped);
        assert_eq!(FileKind::from_path("out/alanine.xtc"), FileKind::Skipped);
        assert_eq!(FileKind::from_path("out/alanine.energy"), FileKind::Unsupported);
        assert_eq!(FileKind::from_path("out/alanine"), FileKind::Unsupported);
        assert!(FileKind::Eigenvectors.ignores_sign());
        assert!(!FileKind::Trajectory.ignores_sign());
        assert!(FileKind::Trajectory.is_compared());
        for kind in [FileKind::Eigenvectors, FileKind::Skipped, FileKind::Unsupported] {
            assert!(!kind.is_compared(), "{kind:?} is not a dcd trajectory");
        }
    }

    #[test]
    fn aggregate() {
        let mut report = Report::new();
        let (e, a) = (Path::new("expected/a.dcd"), Path::new("output/a.dcd"));
        report.record(e, a, &comparison(None, 0));
        report.record(e, a, &comparison(None, 2));
        report.record(
            e,
            a,
            &comparison(
                Some(StructuralMismatch::FirstStep {
                    expected: 0,
                    actual: 1,
                }),
                0,
            ),
        );
        report.record_error(e, a, &crate::Error::EmptyTrajectory);
        report.record_skipped(Path::new("expected/a.header"), Path::new("output/a.header"));

        assert_eq!(report.attempted, 5);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 3);
        assert_eq!(report.not_run(), 1);
        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 3);
        assert_eq!(
            report.failures[0],
            "Comparison of expected/a.dcd and output/a.dcd"
        );
    }

    #[test]
    fn empty_report_is_a_success() {
        let report = Report::new();
        assert!(report.is_success());
        assert_eq!(report.not_run(), 0);
    }
}
