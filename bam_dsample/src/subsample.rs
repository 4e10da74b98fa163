use std::path::{Path, PathBuf};

use anyhow::Context;
use rust_htslib::bam::{self, Read};

use utils::lower_extension;

use crate::{error::DownsampleError, input::set_threads};

/// Counts of records seen and written by a subsampler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubsampleSummary {
    pub total: u64,
    pub kept: u64,
}

/// Writes a random subset of the reads from `input` to `output`, keeping
/// each read with probability `fraction`
pub trait Subsampler {
    fn subsample(
        &mut self,
        input: &Path,
        fraction: f64,
        output: &Path,
    ) -> anyhow::Result<SubsampleSummary>;
}

/// Subsample using htslib
///
/// Records are selected on a hash of the read name and a seed (as in `samtools view -s`),
/// so both reads of a pair are kept or dropped together and a run can be repeated
/// exactly with the same seed.  The output format follows the extension of the output
/// file (.sam, .cram, otherwise BAM).
pub struct HtsSubsampler {
    seed: u32,
    reference: Option<PathBuf>,
    threads: usize,
}

impl HtsSubsampler {
    pub fn new(seed: u32, reference: Option<&Path>, threads: usize) -> Self {
        Self {
            seed,
            reference: reference.map(|p| p.to_owned()),
            threads,
        }
    }
}

impl Subsampler for HtsSubsampler {
    fn subsample(
        &mut self,
        input: &Path,
        fraction: f64,
        output: &Path,
    ) -> anyhow::Result<SubsampleSummary> {
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(DownsampleError::InvalidFraction(fraction).into());
        }

        let mut rdr = bam::Reader::from_path(input)
            .with_context(|| format!("Failed to open input file {}", input.display()))?;
        if let Some(r) = self.reference.as_deref() {
            rdr.set_reference(r)
                .with_context(|| format!("Could not set reference {}", r.display()))?;
        }
        set_threads(&mut rdr, self.threads)?;

        let (format, fmt_name) = match lower_extension(output).as_str() {
            ".sam" => (bam::Format::Sam, "SAM"),
            ".cram" => (bam::Format::Cram, "CRAM"),
            _ => (bam::Format::Bam, "BAM"),
        };
        debug!(
            "Writing {} output to {} (seed {}, fraction {})",
            fmt_name,
            output.display(),
            self.seed,
            fraction
        );

        let header = bam::Header::from_template(rdr.header());
        let mut wrt = bam::Writer::from_path(output, &header, format)
            .with_context(|| format!("Could not open output file {}", output.display()))?;
        if let Some(r) = self.reference.as_deref() {
            wrt.set_reference(r)
                .with_context(|| format!("Could not set reference {}", r.display()))?;
        }
        if self.threads > 1 {
            wrt.set_threads(self.threads)
                .with_context(|| "Could not set writer threads")?;
        }

        let mut summary = SubsampleSummary::default();
        let mut rec = bam::Record::new();
        while let Some(r) = rdr.read(&mut rec) {
            r.with_context(|| {
                format!(
                    "Error reading from {} after {} records",
                    input.display(),
                    summary.total
                )
            })?;
            summary.total += 1;
            if keep_read(rec.qname(), self.seed, fraction) {
                wrt.write(&rec)
                    .with_context(|| format!("Error writing to {}", output.display()))?;
                summary.kept += 1;
            }
        }
        debug!("Kept {} of {} records", summary.kept, summary.total);
        Ok(summary)
    }
}

fn x31_hash(s: &[u8]) -> u32 {
    match s.split_first() {
        Some((c, rest)) => rest.iter().fold(*c as u32, |h, c| {
            (h << 5).wrapping_sub(h).wrapping_add(*c as u32)
        }),
        None => 0,
    }
}

fn wang_hash(mut key: u32) -> u32 {
    key = key.wrapping_add(!(key << 15));
    key ^= key >> 10;
    key = key.wrapping_add(key << 3);
    key ^= key >> 6;
    key = key.wrapping_add(!(key << 11));
    key ^= key >> 16;
    key
}

/// Decide whether to keep a read from its name
pub fn keep_read(qname: &[u8], seed: u32, fraction: f64) -> bool {
    let x = wang_hash(x31_hash(qname) ^ seed) & 0xff_ffff;
    (x as f64 / 0x100_0000 as f64) < fraction
}
