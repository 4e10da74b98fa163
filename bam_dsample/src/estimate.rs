//! Coverage estimation
//!
//! The average read length is taken from a capped sample of reads at the start of
//! the file.  Combined with the total number of mapped reads and the total length of
//! the reference it gives an estimate of the average coverage, which in turn gives
//! the fraction of reads to keep to reach a target coverage.
//!
//! Non-fatal problems are returned as [`Diagnostic`]s alongside the result so the
//! caller decides how to report them.
use std::fmt;

use crate::{error::DownsampleError, stats::ReferenceStats};

/// Number of read lengths collected for the read length estimate
pub const SAMPLE_SIZE: usize = 1001;

/// Number of lengths averaged after dropping the shortest read
const TRIMMED_SIZE: usize = 1000;

/// Percentage difference between the 2nd shortest and longest sampled reads above
/// which a warning is raised
const MAX_LENGTH_SPREAD: f64 = 5.0;

const SHORT_READ_LIMIT: f64 = 100.0;
const LONG_READ_LIMIT: f64 = 160.0;

/// Minimum gap between estimated and desired coverage
pub const MIN_COVERAGE_MARGIN: f64 = 5.0;

/// Name used by idxstats for reads without a reference
pub const UNMAPPED_REF: &str = "*";

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    HeterogeneousReadLengths { short: u32, long: u32, percent: f64 },
    ShortReads(f64),
    LongReads(f64),
    DualIndex { used: String, ignored: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeterogeneousReadLengths {
                short,
                long,
                percent,
            } => write!(
                f,
                "The second shortest ({}) and longest ({}) of {} sampled reads differ by {:.2}% (> {}%)",
                short, long, SAMPLE_SIZE, percent, MAX_LENGTH_SPREAD
            ),
            Self::ShortReads(x) => write!(
                f,
                "Your file has reads shorter than {}bp (average {})",
                SHORT_READ_LIMIT, x
            ),
            Self::LongReads(x) => write!(
                f,
                "Your file has reads longer than {}bp (average {})",
                LONG_READ_LIMIT, x
            ),
            Self::DualIndex { used, ignored } => write!(
                f,
                "Input BAM file has two index files ({} and {}). Index file {} will be used",
                used, ignored, used
            ),
        }
    }
}

/// A result together with any warnings raised while producing it
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            diagnostics: Vec::new(),
        }
    }

    fn with(mut self, d: Option<Diagnostic>) -> Self {
        self.diagnostics.extend(d);
        self
    }
}

/// Estimate average read length from a sample of read lengths
///
/// The sample is sorted and the shortest read dropped.  The average is taken over
/// the following 1000 reads.  If the second shortest and the longest read differ by
/// more than 5% (relative to their mean) a warning is returned.
pub fn average_read_length(sample: &mut [u32]) -> Result<Outcome<f64>, DownsampleError> {
    if sample.len() < SAMPLE_SIZE {
        return Err(DownsampleError::InsufficientSample {
            found: sample.len(),
            required: SAMPLE_SIZE,
        });
    }
    sample.sort_unstable();

    let short = sample[1];
    let long = sample[TRIMMED_SIZE];
    let (s, l) = (short as f64, long as f64);
    let percent = (l - s) / ((l + s) / 2.0) * 100.0;
    trace!(
        "Read length spread: 2nd shortest {}, longest {}, difference {}%",
        short,
        long,
        percent
    );

    let total: u64 = sample[1..=TRIMMED_SIZE].iter().map(|x| *x as u64).sum();
    let average = total as f64 / TRIMMED_SIZE as f64;
    debug!("Average read length: {}", average);

    // NaN (all zero lengths) compares false
    let warning = (percent > MAX_LENGTH_SPREAD).then_some(Diagnostic::HeterogeneousReadLengths {
        short,
        long,
        percent,
    });
    Ok(Outcome::new(average).with(warning))
}

/// Estimate average coverage from the per reference statistics and the average read length
pub fn estimate_coverage(
    stats: &[ReferenceStats],
    avg_read_len: f64,
) -> Result<Outcome<f64>, DownsampleError> {
    let (n_reads, genome_len) = stats
        .iter()
        .filter(|r| r.name() != UNMAPPED_REF)
        .fold((0u64, 0u64), |(n, l), r| (n + r.mapped(), l + r.length()));

    let n_unmapped: u64 = stats.iter().map(|r| r.unmapped()).sum();
    debug!(
        "Mapped reads: {}, unmapped reads: {}, total reference length: {}",
        n_reads, n_unmapped, genome_len
    );

    if genome_len == 0 {
        return Err(DownsampleError::NoReferenceData);
    }

    let warning = if avg_read_len < SHORT_READ_LIMIT {
        Some(Diagnostic::ShortReads(avg_read_len))
    } else if avg_read_len > LONG_READ_LIMIT {
        Some(Diagnostic::LongReads(avg_read_len))
    } else {
        None
    };

    let coverage = (n_reads as f64 * avg_read_len) / genome_len as f64;
    Ok(Outcome::new(coverage).with(warning))
}

/// Fraction of reads to keep to get from the estimated to the desired coverage
///
/// The desired coverage must be lower than the estimate by more than 5
pub fn downsample_fraction(desired: u32, estimated: f64) -> Result<f64, DownsampleError> {
    let d = desired as f64;
    if d > estimated {
        Err(DownsampleError::CoverageTooHigh { desired, estimated })
    } else if estimated - d <= MIN_COVERAGE_MARGIN {
        Err(DownsampleError::CoverageTooClose {
            desired,
            estimated,
            margin: MIN_COVERAGE_MARGIN,
        })
    } else {
        Ok(d / estimated)
    }
}
