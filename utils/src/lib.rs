#[macro_use]
extern crate anyhow;

use std::{
    fmt,
    io::BufRead,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::Context;
use clap::ArgMatches;

/// LogLevel
///
/// Represents minimum level of messages that will be logged
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLevel {
    pub level: usize,
}

const LEVEL_NAMES: [&str; 6] = ["error", "warn", "info", "debug", "trace", "none"];

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_lowercase();
        LEVEL_NAMES
            .iter()
            .position(|x| *x == s.as_str())
            .map(|level| LogLevel { level })
            .ok_or_else(|| anyhow!("Unknown log level '{}'", s))
    }
}

impl LogLevel {
    pub fn is_none(&self) -> bool {
        self.level > 4
    }
    pub fn get_level(&self) -> usize {
        if self.level > 4 {
            0
        } else {
            self.level
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", LEVEL_NAMES.get(self.level).unwrap_or(&"unknown"))
    }
}

/// Initialize logging from command line arguments
///
/// Expects the matches to come from a command that defines the
/// `loglevel`, `quiet` and `timestamp` arguments
pub fn init_log(m: &ArgMatches) -> anyhow::Result<()> {
    let verbose = m
        .get_one::<LogLevel>("loglevel")
        .copied()
        .unwrap_or(LogLevel { level: 1 });
    let quiet = verbose.is_none() || m.get_flag("quiet");
    let ts = m
        .get_one::<stderrlog::Timestamp>("timestamp")
        .copied()
        .unwrap_or(stderrlog::Timestamp::Off);

    stderrlog::new()
        .quiet(quiet)
        .verbosity(verbose.get_level())
        .timestamp(ts)
        .init()
        .with_context(|| "Could not initialize logging")
}

/// Read in next line and split on tabs after trimming white space
pub fn get_next_line<'a, R: BufRead>(
    rdr: &mut R,
    buf: &'a mut String,
) -> anyhow::Result<Option<Vec<&'a str>>> {
    buf.clear();
    if rdr.read_line(buf)? == 0 {
        Ok(None)
    } else {
        Ok(Some(buf.trim().split('\t').collect()))
    }
}

/// Lower case extension of a path including the leading '.', or an empty
/// string if the path has no extension
pub fn lower_extension<P: AsRef<Path>>(p: P) -> String {
    p.as_ref()
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Path with the final extension removed (`dir/a.bam` -> `dir/a`)
pub fn strip_extension<P: AsRef<Path>>(p: P) -> PathBuf {
    p.as_ref().with_extension("")
}

/// Path with `suffix` appended to the full file name (`a.bam` + `.bai` -> `a.bam.bai`)
pub fn append_to_path<P: AsRef<Path>>(p: P, suffix: &str) -> PathBuf {
    let mut s = p.as_ref().as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}
