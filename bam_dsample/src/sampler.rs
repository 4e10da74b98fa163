use rust_htslib::bam::{self, record::Cigar};

/// Records that can report a read length inferred from their alignment
pub trait InferReadLength {
    /// Read length inferred from the CIGAR, or None if there is no CIGAR
    fn infer_read_length(&self) -> Option<u32>;
}

/// The read length includes soft and hard clipped bases, but not deletions
/// or skipped reference
impl InferReadLength for bam::Record {
    fn infer_read_length(&self) -> Option<u32> {
        if self.cigar_len() == 0 {
            None
        } else {
            Some(
                self.cigar()
                    .iter()
                    .map(|c| match c {
                        Cigar::Match(l)
                        | Cigar::Ins(l)
                        | Cigar::SoftClip(l)
                        | Cigar::HardClip(l)
                        | Cigar::Equal(l)
                        | Cigar::Diff(l) => *l,
                        Cigar::Del(_) | Cigar::RefSkip(_) | Cigar::Pad(_) => 0,
                    })
                    .sum(),
            )
        }
    }
}

/// Collect inferred read lengths from the start of a stream of records
///
/// Records without an inferable length are skipped.  Stops once `limit`
/// lengths have been collected or the records are exhausted, so the
/// returned vector may be shorter than `limit`.
pub fn sample_read_lengths<I, T, E>(records: I, limit: usize) -> anyhow::Result<Vec<u32>>
where
    I: IntoIterator<Item = Result<T, E>>,
    T: InferReadLength,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut lengths = Vec::with_capacity(limit);
    let mut n_records = 0;
    for r in records {
        if lengths.len() >= limit {
            break;
        }
        let rec = r.map_err(|e| anyhow!("Error reading record {}: {}", n_records + 1, e))?;
        n_records += 1;
        if let Some(l) = rec.infer_read_length() {
            lengths.push(l)
        }
    }
    debug!(
        "Collected {} read lengths from {} records",
        lengths.len(),
        n_records
    );
    Ok(lengths)
}
