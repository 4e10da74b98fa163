use std::path::{Path, PathBuf};

/// Config
///
/// Configuration info for the program
/// This is generated from the command line arguments
/// Once set it is read only
///
/// input - input SAM/BAM/CRAM file
/// target_coverage - coverage to downsample to
/// output_prefix - prefix for output file (the input extension is appended)
/// report_coverage - only print the estimated coverage
/// idxstats - idxstats file to use in place of the index
/// reference - reference FASTA for CRAM files
/// seed - seed for read selection
/// hts_threads - number of threads for htslib reading and writing
///
#[derive(Debug)]
pub struct Config {
    input: PathBuf,
    target_coverage: Option<u32>,
    output_prefix: Option<PathBuf>,
    report_coverage: bool,
    idxstats: Option<PathBuf>,
    reference: Option<PathBuf>,
    seed: u32,
    hts_threads: usize,
}

impl Config {
    pub fn new<P: AsRef<Path>>(input: P) -> Self {
        Self {
            input: input.as_ref().to_owned(),
            target_coverage: None,
            output_prefix: None,
            report_coverage: false,
            idxstats: None,
            reference: None,
            seed: 0,
            hts_threads: 1,
        }
    }

    pub fn set_target_coverage(&mut self, x: u32) {
        self.target_coverage = Some(x)
    }

    pub fn set_output_prefix<P: AsRef<Path>>(&mut self, p: P) {
        self.output_prefix = Some(p.as_ref().to_owned())
    }

    pub fn set_report_coverage(&mut self) {
        self.report_coverage = true
    }

    pub fn set_idxstats<P: AsRef<Path>>(&mut self, p: P) {
        self.idxstats = Some(p.as_ref().to_owned())
    }

    pub fn set_reference<P: AsRef<Path>>(&mut self, p: P) {
        self.reference = Some(p.as_ref().to_owned())
    }

    pub fn set_seed(&mut self, x: u32) {
        self.seed = x
    }

    pub fn set_hts_threads(&mut self, x: usize) {
        self.hts_threads = x
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn target_coverage(&self) -> Option<u32> {
        self.target_coverage
    }

    pub fn output_prefix(&self) -> Option<&Path> {
        self.output_prefix.as_deref()
    }

    pub fn report_coverage(&self) -> bool {
        self.report_coverage
    }

    pub fn idxstats(&self) -> Option<&Path> {
        self.idxstats.as_deref()
    }

    pub fn reference(&self) -> Option<&Path> {
        self.reference.as_deref()
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn hts_threads(&self) -> usize {
        self.hts_threads
    }
}
