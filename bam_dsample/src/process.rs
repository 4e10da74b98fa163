use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use rust_htslib::bam::Read;

use utils::lower_extension;

use crate::{
    config::Config,
    error::DownsampleError,
    estimate::{
        average_read_length, downsample_fraction, estimate_coverage, Diagnostic, SAMPLE_SIZE,
    },
    input::{FileFormat, InputFile},
    sampler::sample_read_lengths,
    stats::{self, ReferenceStats},
    subsample::{HtsSubsampler, Subsampler},
};

fn report(diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        warn!("{}", d)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatsSource<'a> {
    IdxstatsFile(&'a Path),
    Index,
    FullPass,
}

/// Where the per reference statistics come from
///
/// Only BAM indices carry per reference read counts.  htslib derives CRAM
/// statistics by reading the file and cannot handle unplaced reads there, so
/// CRAM (like SAM) is counted with our own pass over the records.
fn stats_source<'a>(cfg: &'a Config, input: &InputFile) -> StatsSource<'a> {
    if let Some(p) = cfg.idxstats() {
        StatsSource::IdxstatsFile(p)
    } else if input.format() == FileFormat::Bam && input.index().is_some() {
        StatsSource::Index
    } else {
        StatsSource::FullPass
    }
}

fn reference_stats(cfg: &Config, input: &InputFile) -> anyhow::Result<Vec<ReferenceStats>> {
    let source = stats_source(cfg, input);
    debug!("Reference statistics source: {:?}", source);
    match source {
        StatsSource::IdxstatsFile(p) => stats::read_idxstats(p),
        StatsSource::Index => {
            let mut rdr = input.open_indexed(cfg.reference(), cfg.hts_threads())?;
            stats::from_index(&mut rdr)
        }
        StatsSource::FullPass => {
            let mut rdr = input.open(cfg.reference(), cfg.hts_threads())?;
            stats::from_records(&mut rdr)
        }
    }
}

/// Estimate average coverage of input file
pub fn estimate_file_coverage(cfg: &Config, input: &InputFile) -> anyhow::Result<f64> {
    let mut sample = {
        let mut rdr = input.open(cfg.reference(), cfg.hts_threads())?;
        sample_read_lengths(rdr.records(), SAMPLE_SIZE).with_context(|| {
            format!(
                "Error sampling read lengths from {}",
                input.path().display()
            )
        })?
    };
    let read_len = average_read_length(&mut sample)?;
    report(&read_len.diagnostics);

    let ref_stats = reference_stats(cfg, input)?;
    let coverage = estimate_coverage(&ref_stats, read_len.value)?;
    report(&coverage.diagnostics);
    info!("Estimated average coverage: {}", coverage.value);
    Ok(coverage.value)
}

/// Output file name
///
/// `<prefix><input extension>` if an output prefix was given, otherwise
/// `Downsampled<target>X_<input file name>` in the current directory
pub fn output_path(cfg: &Config, target: u32) -> PathBuf {
    let input = cfg.input();
    match cfg.output_prefix() {
        Some(p) => PathBuf::from(format!("{}{}", p.display(), lower_extension(input))),
        None => {
            let name = input
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            PathBuf::from(format!("Downsampled{}X_{}", target, name))
        }
    }
}

/// Validate the requested coverage and hand the input to the subsampler
///
/// The output file is created (empty) before the subsampler is called
pub fn downsample<S: Subsampler, W: Write>(
    cfg: &Config,
    coverage: f64,
    subsampler: &mut S,
    out: &mut W,
) -> anyhow::Result<PathBuf> {
    let target = cfg
        .target_coverage()
        .ok_or(DownsampleError::MissingDownsampleTarget)?;
    let fraction = downsample_fraction(target, coverage)?;
    let input = cfg.input();
    let opath = output_path(cfg, target);

    // Debug keeps the decimal point on whole numbers (100.0)
    writeln!(out, "The average coverage is {:?}", coverage)?;
    writeln!(
        out,
        "Downsampling {} from {}X to {}X",
        input.display(),
        coverage.round_ties_even(),
        target
    )?;
    writeln!(out, "The downsampling fraction is {:?}", fraction)?;

    fs::File::create(&opath)
        .with_context(|| format!("Could not create output file {}", opath.display()))?;

    let summary = subsampler
        .subsample(input, fraction, &opath)
        .with_context(|| format!("Error downsampling {}", input.display()))?;
    info!(
        "Wrote {} of {} records to {}",
        summary.kept,
        summary.total,
        opath.display()
    );
    Ok(opath)
}

fn print_coverage<W: Write>(out: &mut W, input: &Path, coverage: f64) -> io::Result<()> {
    writeln!(out, "Average coverage for {}: {:?}", input.display(), coverage)
}

pub fn process(cfg: &Config) -> anyhow::Result<()> {
    let input = InputFile::resolve(cfg.input(), cfg.idxstats().is_none())?;
    report(&input.diagnostics);
    let input = input.value;
    debug!("Input {} ({} format)", input.path().display(), input.format());

    let coverage = estimate_file_coverage(cfg, &input)?;

    let mut out = io::stdout().lock();
    if cfg.report_coverage() {
        print_coverage(&mut out, input.path(), coverage)?;
    } else {
        let mut subsampler = HtsSubsampler::new(cfg.seed(), cfg.reference(), cfg.hts_threads());
        downsample(cfg, coverage, &mut subsampler, &mut out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsample::SubsampleSummary;
    use rust_htslib::bam;
    use std::fmt::Write as _;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(PathBuf, f64, PathBuf, bool)>,
    }

    impl Subsampler for Recorder {
        fn subsample(
            &mut self,
            input: &Path,
            fraction: f64,
            output: &Path,
        ) -> anyhow::Result<SubsampleSummary> {
            self.calls.push((
                input.to_owned(),
                fraction,
                output.to_owned(),
                output.exists(),
            ));
            Ok(SubsampleSummary {
                total: 10,
                kept: 5,
            })
        }
    }

    #[test]
    fn default_output_name() {
        let mut cfg = Config::new("data/Sample1.BAM");
        assert_eq!(
            output_path(&cfg, 20),
            PathBuf::from("Downsampled20X_Sample1.BAM")
        );
        cfg.set_output_prefix("res/low");
        assert_eq!(output_path(&cfg, 20), PathBuf::from("res/low.bam"));
    }

    #[test]
    fn downsample_creates_output_then_delegates() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::new("in.bam");
        cfg.set_target_coverage(50);
        cfg.set_output_prefix(dir.path().join("half"));

        let mut rec = Recorder::default();
        let mut out = Vec::new();
        let opath = downsample(&cfg, 100.0, &mut rec, &mut out).unwrap();

        assert_eq!(opath, dir.path().join("half.bam"));
        assert_eq!(
            rec.calls,
            vec![(PathBuf::from("in.bam"), 0.5, opath.clone(), true)]
        );
        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            "The average coverage is 100.0\n\
             Downsampling in.bam from 100X to 50X\n\
             The downsampling fraction is 0.5\n"
        );
    }

    #[test]
    fn coverage_rounded_half_to_even() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::new("in.bam");
        cfg.set_target_coverage(10);
        cfg.set_output_prefix(dir.path().join("low"));
        let mut rec = Recorder::default();

        let mut out = Vec::new();
        downsample(&cfg, 22.5, &mut rec, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("from 22X to 10X"));

        let mut out = Vec::new();
        downsample(&cfg, 23.5, &mut rec, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("from 24X to 10X"));
    }

    #[test]
    fn coverage_report_line() {
        let mut out = Vec::new();
        print_coverage(&mut out, Path::new("x.bam"), 30.0).unwrap();
        print_coverage(&mut out, Path::new("y.cram"), 12.25).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Average coverage for x.bam: 30.0\nAverage coverage for y.cram: 12.25\n"
        );
    }

    #[test]
    fn downsample_rejects_bad_targets() {
        let mut rec = Recorder::default();
        let mut out = Vec::new();

        let cfg = Config::new("in.bam");
        let e = downsample(&cfg, 40.0, &mut rec, &mut out).unwrap_err();
        assert_eq!(
            e.downcast_ref::<DownsampleError>(),
            Some(&DownsampleError::MissingDownsampleTarget)
        );

        let mut cfg = Config::new("in.bam");
        cfg.set_target_coverage(45);
        let e = downsample(&cfg, 40.0, &mut rec, &mut out).unwrap_err();
        assert!(matches!(
            e.downcast_ref::<DownsampleError>(),
            Some(DownsampleError::CoverageTooHigh { .. })
        ));

        cfg.set_target_coverage(36);
        let e = downsample(&cfg, 40.0, &mut rec, &mut out).unwrap_err();
        assert!(matches!(
            e.downcast_ref::<DownsampleError>(),
            Some(DownsampleError::CoverageTooClose { .. })
        ));

        assert!(rec.calls.is_empty());
        assert!(out.is_empty());
    }

    fn write_sam(p: &Path, n_reads: usize, read_len: usize) {
        let mut sam = String::from("@HD\tVN:1.6\tSO:coordinate\n@SQ\tSN:chr1\tLN:10000\n");
        let seq = "A".repeat(read_len);
        let qual = "I".repeat(read_len);
        for i in 0..n_reads {
            writeln!(
                sam,
                "r{i}\t0\tchr1\t{}\t60\t{read_len}M\t*\t0\t0\t{seq}\t{qual}",
                1 + i / 2
            )
            .unwrap();
        }
        // Unmapped read without CIGAR is not sampled
        writeln!(sam, "u1\t4\t*\t0\t0\t*\t*\t0\t0\t{seq}\t{qual}").unwrap();
        fs::write(p, sam).unwrap();
    }

    #[test]
    fn coverage_of_sam_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("reads.sam");
        write_sam(&p, 2000, 120);
        let cfg = Config::new(&p);
        let input = InputFile::resolve(&p, true).unwrap().value;
        // 2000 reads * 120bp / 10000bp
        assert_eq!(estimate_file_coverage(&cfg, &input).unwrap(), 24.0);
    }

    #[test]
    fn coverage_with_idxstats_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("reads.sam");
        write_sam(&p, 1001, 150);
        let stats = dir.path().join("stats.txt");
        fs::write(&stats, "chr1\t3000\t100\t0\n*\t0\t0\t1\n").unwrap();
        let mut cfg = Config::new(&p);
        cfg.set_idxstats(&stats);
        let input = InputFile::resolve(&p, false).unwrap().value;
        assert_eq!(estimate_file_coverage(&cfg, &input).unwrap(), 5.0);
    }

    #[test]
    fn too_few_reads() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("reads.sam");
        write_sam(&p, 1000, 150);
        let cfg = Config::new(&p);
        let input = InputFile::resolve(&p, true).unwrap().value;
        let e = estimate_file_coverage(&cfg, &input).unwrap_err();
        assert_eq!(
            e.downcast_ref::<DownsampleError>(),
            Some(&DownsampleError::InsufficientSample {
                found: 1000,
                required: SAMPLE_SIZE
            })
        );
    }

    /// Copy a SAM file to BAM or CRAM
    fn convert(sam: &Path, out: &Path, format: bam::Format, reference: Option<&Path>) {
        let mut rdr = bam::Reader::from_path(sam).unwrap();
        let header = bam::Header::from_template(rdr.header());
        let mut wrt = bam::Writer::from_path(out, &header, format).unwrap();
        if let Some(r) = reference {
            wrt.set_reference(r).unwrap();
        }
        for r in rdr.records() {
            wrt.write(&r.unwrap()).unwrap();
        }
    }

    fn expected_stats() -> Vec<ReferenceStats> {
        vec![
            ReferenceStats::new("chr1", 10000, 2000, 0),
            ReferenceStats::new("*", 0, 0, 1),
        ]
    }

    #[test]
    fn coverage_of_indexed_bam() {
        let dir = tempfile::tempdir().unwrap();
        let sam = dir.path().join("reads.sam");
        let bam_path = dir.path().join("reads.bam");
        write_sam(&sam, 2000, 120);
        convert(&sam, &bam_path, bam::Format::Bam, None);
        bam::index::build(bam_path.as_path(), None, bam::index::Type::Bai, 1).unwrap();

        let cfg = Config::new(&bam_path);
        let input = InputFile::resolve(&bam_path, true).unwrap().value;
        assert_eq!(input.index(), Some(dir.path().join("reads.bam.bai").as_path()));
        assert_eq!(stats_source(&cfg, &input), StatsSource::Index);

        let mut rdr = input.open_indexed(None, 1).unwrap();
        assert_eq!(stats::from_index(&mut rdr).unwrap(), expected_stats());
        assert_eq!(estimate_file_coverage(&cfg, &input).unwrap(), 24.0);
    }

    #[test]
    fn coverage_of_indexed_cram_with_unplaced_reads() {
        let dir = tempfile::tempdir().unwrap();
        let fasta = dir.path().join("ref.fa");
        let mut seq = String::from(">chr1\n");
        for _ in 0..(10000 / 50) {
            seq.push_str(&"A".repeat(50));
            seq.push('\n');
        }
        fs::write(&fasta, seq).unwrap();
        fs::write(dir.path().join("ref.fa.fai"), "chr1\t10000\t6\t50\t51\n").unwrap();

        let sam = dir.path().join("reads.sam");
        let cram = dir.path().join("reads.cram");
        let crai = dir.path().join("reads.crai");
        write_sam(&sam, 2000, 120);
        convert(&sam, &cram, bam::Format::Cram, Some(&fasta));
        bam::index::build(cram.as_path(), Some(crai.as_path()), bam::index::Type::Bai, 1)
            .unwrap();

        let mut cfg = Config::new(&cram);
        cfg.set_reference(&fasta);
        let input = InputFile::resolve(&cram, true).unwrap().value;
        assert_eq!(input.index(), Some(crai.as_path()));
        assert_eq!(stats_source(&cfg, &input), StatsSource::FullPass);

        assert_eq!(reference_stats(&cfg, &input).unwrap(), expected_stats());
        assert_eq!(estimate_file_coverage(&cfg, &input).unwrap(), 24.0);
    }

    #[test]
    fn idxstats_file_overrides_index() {
        let dir = tempfile::tempdir().unwrap();
        let bam_path = dir.path().join("a.bam");
        fs::write(&bam_path, "").unwrap();
        fs::write(dir.path().join("a.bam.bai"), "").unwrap();
        let input = InputFile::resolve(&bam_path, true).unwrap().value;

        let mut cfg = Config::new(&bam_path);
        assert_eq!(stats_source(&cfg, &input), StatsSource::Index);
        cfg.set_idxstats("stats.txt");
        assert_eq!(
            stats_source(&cfg, &input),
            StatsSource::IdxstatsFile(Path::new("stats.txt"))
        );
    }
}
