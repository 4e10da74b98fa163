use std::{io::BufRead, path::Path};

use anyhow::Context;
use compress_io::compress::CompressIo;
use rust_htslib::bam::{self, Read};

use utils::get_next_line;

use crate::estimate::UNMAPPED_REF;

/// ReferenceStats
///
/// Per reference summary, as given by samtools idxstats
///
/// name - reference name (`*` for reads without a reference)
/// length - reference length in base pairs
/// mapped - number of mapped reads
/// unmapped - number of unmapped reads placed on the reference
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceStats {
    name: String,
    length: u64,
    mapped: u64,
    unmapped: u64,
}

impl ReferenceStats {
    pub fn new(name: &str, length: u64, mapped: u64, unmapped: u64) -> Self {
        Self {
            name: name.to_owned(),
            length,
            mapped,
            unmapped,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn mapped(&self) -> u64 {
        self.mapped
    }

    pub fn unmapped(&self) -> u64 {
        self.unmapped
    }
}

/// Get reference statistics from the index attached to an indexed reader
pub fn from_index(rdr: &mut bam::IndexedReader) -> anyhow::Result<Vec<ReferenceStats>> {
    let raw = rdr
        .index_stats()
        .with_context(|| "Could not get statistics from index")?;
    let hdr = rdr.header();
    let v: Vec<_> = raw
        .into_iter()
        .map(|(tid, length, mapped, unmapped)| {
            let name = if tid < 0 {
                UNMAPPED_REF.to_owned()
            } else {
                String::from_utf8_lossy(hdr.tid2name(tid as u32)).into_owned()
            };
            ReferenceStats {
                name,
                length,
                mapped,
                unmapped,
            }
        })
        .collect();
    debug!("Read statistics for {} references from index", v.len());
    Ok(v)
}

/// Get reference statistics by reading through all records (for files without an index)
///
/// Counts follow idxstats: every record with a reference counts as mapped
/// unless it carries the unmapped flag
pub fn from_records<R: Read>(rdr: &mut R) -> anyhow::Result<Vec<ReferenceStats>> {
    let hdr = rdr.header().clone();
    let mut v: Vec<_> = hdr
        .target_names()
        .iter()
        .enumerate()
        .map(|(tid, name)| {
            let length = hdr.target_len(tid as u32).unwrap_or(0);
            ReferenceStats::new(&String::from_utf8_lossy(name), length, 0, 0)
        })
        .collect();
    let mut unplaced = ReferenceStats::new(UNMAPPED_REF, 0, 0, 0);

    debug!("Counting records for {} references", v.len());
    let mut rec = bam::Record::new();
    let mut n: u64 = 0;
    while let Some(r) = rdr.read(&mut rec) {
        r.with_context(|| format!("Error reading record after {} records", n))?;
        n += 1;
        let s = match usize::try_from(rec.tid()) {
            Ok(tid) if tid < v.len() => &mut v[tid],
            _ => &mut unplaced,
        };
        if rec.is_unmapped() {
            s.unmapped += 1
        } else {
            s.mapped += 1
        }
    }
    debug!("Finished reading {} records", n);
    v.push(unplaced);
    Ok(v)
}

/// Read reference statistics from a samtools idxstats style file
///
/// Four tab separated columns: name, length, mapped and unmapped read counts.
/// Lines with fewer than two columns are skipped.  A missing unmapped
/// column is taken as zero.
pub fn read_idxstats<P: AsRef<Path>>(fname: P) -> anyhow::Result<Vec<ReferenceStats>> {
    let fname = fname.as_ref();
    debug!("Reading in reference statistics from {}", fname.display());

    let mut rdr = CompressIo::new()
        .path(fname)
        .bufreader()
        .with_context(|| format!("Error opening idxstats file {}", fname.display()))?;

    parse_idxstats(&mut rdr, fname)
}

fn parse_idxstats<R: BufRead>(rdr: &mut R, fname: &Path) -> anyhow::Result<Vec<ReferenceStats>> {
    let mut buf = String::new();
    let mut line = 0;
    let mut v = Vec::new();

    let parse = |s: Option<&&str>, line: usize, what: &str| -> anyhow::Result<u64> {
        let s = s.ok_or_else(|| anyhow!("{}:{} Missing {}", fname.display(), line, what))?;
        s.parse::<u64>()
            .with_context(|| format!("{}:{} Error reading {}", fname.display(), line, what))
    };

    while let Some(fields) = get_next_line(rdr, &mut buf).with_context(|| {
        format!(
            "Error after reading {} lines from {}",
            line,
            fname.display()
        )
    })? {
        line += 1;
        // Skip short lines
        if fields.len() > 1 {
            let length = parse(fields.get(1), line, "reference length")?;
            let mapped = parse(fields.get(2), line, "mapped read count")?;
            let unmapped = match fields.get(3) {
                Some(_) => parse(fields.get(3), line, "unmapped read count")?,
                None => 0,
            };
            trace!("{}\t{}\t{}\t{}", fields[0], length, mapped, unmapped);
            v.push(ReferenceStats::new(fields[0], length, mapped, unmapped))
        }
    }

    debug!(
        "Finished reading in {} lines; found {} references",
        line,
        v.len()
    );
    Ok(v)
}
