use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions raised while validating input or estimating coverage
#[derive(Error, Debug, PartialEq)]
pub enum DownsampleError {
    #[error("No input BAM/SAM/CRAM file selected")]
    MissingFileArgument,
    #[error("Failed to open '{}': No such file or directory", .0.display())]
    FileNotFound(PathBuf),
    #[error("Input file {path} has unsupported extension '{1}' (expected .bam, .sam or .cram)", path = .0.display())]
    UnsupportedFormat(PathBuf, String),
    #[error("Input {1} file {path} is not indexed. Please index it and try again", path = .0.display())]
    MissingIndex(PathBuf, &'static str),
    #[error("Only {found} reads with an inferable length were found; at least {required} are needed to estimate read length")]
    InsufficientSample { found: usize, required: usize },
    #[error("Total reference length is zero; cannot estimate coverage")]
    NoReferenceData,
    #[error("Please specify the coverage you'd like to downsample to using -d or --downcoverage")]
    MissingDownsampleTarget,
    #[error("The desired coverage ({desired}) is higher than the average coverage ({estimated})")]
    CoverageTooHigh { desired: u32, estimated: f64 },
    #[error("The difference between the average coverage ({estimated}) and desired coverage ({desired}) is too small (<= {margin})")]
    CoverageTooClose {
        desired: u32,
        estimated: f64,
        margin: f64,
    },
    #[error("Subsampling fraction {0} is outside (0, 1)")]
    InvalidFraction(f64),
}
