use std::{
    ffi::CStr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
};

use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_parser, Arg, ArgAction,
    ArgMatches, Command,
};

use rust_htslib::htslib;
use utils::{init_log, LogLevel};

use crate::{config::Config, error::DownsampleError};

/// Set up definition of command options for clap
fn cli_model() -> Command {
    Command::new(crate_name!())
        .about(crate_description!())
        .version(crate_version!())
        .author(crate_authors!())
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .short('v')
                .long("version")
                .action(ArgAction::SetTrue)
                .help("Print version information"),
        )
        .arg(
            Arg::new("timestamp")
                .short('X')
                .long("timestamp")
                .value_parser(value_parser!(stderrlog::Timestamp))
                .value_name("GRANULARITY")
                .default_value("none")
                .help("Prepend log entries with a timestamp"),
        )
        .arg(
            Arg::new("loglevel")
                .short('l')
                .long("loglevel")
                .value_name("LOGLEVEL")
                .value_parser(value_parser!(LogLevel))
                .ignore_case(true)
                .default_value("warn")
                .help("Set log level"),
        )
        .arg(
            Arg::new("quiet")
                .action(ArgAction::SetTrue)
                .long("quiet")
                .conflicts_with("loglevel")
                .help("Silence all output"),
        )
        .arg(
            Arg::new("hts_threads")
                .short('@')
                .long("hts-threads")
                .value_parser(value_parser!(NonZeroUsize))
                .value_name("INT")
                .help("Set number of threads for sam/bam/cram reading and writing [default: available cores]"),
        )
        .arg(
            Arg::new("downcoverage")
                .short('d')
                .long("downcoverage")
                .value_parser(value_parser!(NonZeroU32))
                .value_name("INT")
                .help("The coverage you want to downsample to"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_parser(value_parser!(PathBuf))
                .value_name("PREFIX")
                .help("Output file prefix [default: Downsampled<INT>X_<input file name>]"),
        )
        .arg(
            Arg::new("coverage")
                .short('c')
                .long("coverage")
                .action(ArgAction::SetTrue)
                .help("Print out average coverage for file"),
        )
        .arg(
            Arg::new("idxstats")
                .short('i')
                .long("idxstats")
                .value_parser(value_parser!(PathBuf))
                .value_name("PATH")
                .help("Read per reference statistics from idxstats output instead of the index"),
        )
        .arg(
            Arg::new("reference")
                .short('r')
                .long("reference")
                .value_parser(value_parser!(PathBuf))
                .value_name("PATH")
                .help("Reference FASTA file (for CRAM files)"),
        )
        .arg(
            Arg::new("seed")
                .short('s')
                .long("seed")
                .value_parser(value_parser!(u32))
                .value_name("INT")
                .default_value("0")
                .help("Seed for read selection"),
        )
        .arg(
            Arg::new("input")
                .value_parser(value_parser!(PathBuf))
                .value_name("FILE")
                .help("BAM/SAM/CRAM file to be downsampled"),
        )
}

/// Version of the linked htslib library
fn htslib_version() -> String {
    // SAFETY: hts_version() returns a pointer to a static nul terminated string
    let v = unsafe { CStr::from_ptr(htslib::hts_version()) };
    v.to_string_lossy().into_owned()
}

fn print_version() {
    println!("{} {}", crate_name!(), crate_version!());
    println!("using htslib {}", htslib_version());
}

/// Build Config from parsed command line
fn config_from_matches(m: &ArgMatches) -> anyhow::Result<Config> {
    let input = m
        .get_one::<PathBuf>("input")
        .ok_or(DownsampleError::MissingFileArgument)?;

    let mut cfg = Config::new(input);

    let nt = m
        .get_one::<NonZeroUsize>("hts_threads")
        .map(|x| usize::from(*x))
        .unwrap_or_else(num_cpus::get);
    cfg.set_hts_threads(nt);

    if let Some(x) = m.get_one::<NonZeroU32>("downcoverage") {
        cfg.set_target_coverage(u32::from(*x))
    }
    if let Some(p) = m.get_one::<PathBuf>("output") {
        cfg.set_output_prefix(p)
    }
    if m.get_flag("coverage") {
        cfg.set_report_coverage()
    }
    if let Some(p) = m.get_one::<PathBuf>("idxstats") {
        cfg.set_idxstats(p)
    }
    if let Some(p) = m.get_one::<PathBuf>("reference") {
        cfg.set_reference(p)
    }
    cfg.set_seed(*m.get_one::<u32>("seed").expect("Missing default seed"));

    Ok(cfg)
}

/// Handle command line options.  Set up Config structure
pub fn handle_cli() -> anyhow::Result<Config> {
    // Get matches from command line
    let m = cli_model().get_matches();

    if m.get_flag("version") {
        print_version();
        std::process::exit(0)
    }

    // Setup logging
    init_log(&m)?;

    debug!("Processing command line options");

    config_from_matches(&m)
}
