use std::{
    fmt,
    path::{Path, PathBuf},
};

use anyhow::Context;
use rust_htslib::bam::{self, Read};

use utils::{append_to_path, lower_extension, strip_extension};

use crate::{
    error::DownsampleError,
    estimate::{Diagnostic, Outcome},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Sam,
    Bam,
    Cram,
}

impl FileFormat {
    /// Format from the (case insensitive) file extension
    pub fn from_path(p: &Path) -> Result<Self, DownsampleError> {
        match lower_extension(p).as_str() {
            ".sam" => Ok(Self::Sam),
            ".bam" => Ok(Self::Bam),
            ".cram" => Ok(Self::Cram),
            ext => Err(DownsampleError::UnsupportedFormat(
                p.to_owned(),
                ext.to_owned(),
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sam => "SAM",
            Self::Bam => "BAM",
            Self::Cram => "CRAM",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Input alignment file with its format and index (if any)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    path: PathBuf,
    format: FileFormat,
    index: Option<PathBuf>,
}

impl InputFile {
    /// Check that the input file exists and find its index
    ///
    /// BAM files may be indexed as `<file>.bai` or `<stem>.bai`.  If both are present the
    /// first is used and a warning returned.  CRAM files must be indexed as `<stem>.crai`.
    /// SAM files are read without an index.  If `require_index` is false a missing index
    /// is not an error.
    pub fn resolve(path: &Path, require_index: bool) -> Result<Outcome<Self>, DownsampleError> {
        if !path.exists() {
            return Err(DownsampleError::FileNotFound(path.to_owned()));
        }
        let format = FileFormat::from_path(path)?;

        let candidates = match format {
            FileFormat::Sam => vec![],
            FileFormat::Bam => vec![
                append_to_path(path, ".bai"),
                append_to_path(strip_extension(path), ".bai"),
            ],
            FileFormat::Cram => vec![append_to_path(strip_extension(path), ".crai")],
        };
        let mut found = candidates.into_iter().filter(|p| p.exists());

        let mut diagnostics = Vec::new();
        let index = found.next();
        if let (Some(used), Some(ignored)) = (index.as_ref(), found.next()) {
            diagnostics.push(Diagnostic::DualIndex {
                used: used.display().to_string(),
                ignored: ignored.display().to_string(),
            })
        }

        match &index {
            Some(p) => debug!("Using index {} for {}", p.display(), path.display()),
            None if format != FileFormat::Sam && require_index => {
                return Err(DownsampleError::MissingIndex(path.to_owned(), format.name()))
            }
            None => debug!("No index used for {}", path.display()),
        }

        Ok(Outcome {
            value: Self {
                path: path.to_owned(),
                format,
                index,
            },
            diagnostics,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn index(&self) -> Option<&Path> {
        self.index.as_deref()
    }

    /// Open for sequential reading from the start of the file
    pub fn open(&self, reference: Option<&Path>, threads: usize) -> anyhow::Result<bam::Reader> {
        debug!(
            "Try to open input file {} with reference {:?}",
            self.path.display(),
            reference
        );
        let mut rdr = bam::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open input file {}", self.path.display()))?;
        if let Some(r) = reference {
            rdr.set_reference(r)
                .with_context(|| format!("Could not set reference {}", r.display()))?;
        }
        set_threads(&mut rdr, threads)?;
        Ok(rdr)
    }

    /// Open with the resolved index loaded
    pub fn open_indexed(
        &self,
        reference: Option<&Path>,
        threads: usize,
    ) -> anyhow::Result<bam::IndexedReader> {
        let idx = self.index.as_deref().ok_or_else(|| {
            DownsampleError::MissingIndex(self.path.clone(), self.format.name())
        })?;
        debug!(
            "Try to open input file {} with index {}",
            self.path.display(),
            idx.display()
        );
        let mut rdr = bam::IndexedReader::from_path_and_index(self.path.as_path(), idx)
            .with_context(|| {
                format!(
                    "Failed to open input file {} with index {}",
                    self.path.display(),
                    idx.display()
                )
            })?;
        if let Some(r) = reference {
            rdr.set_reference(r)
                .with_context(|| format!("Could not set reference {}", r.display()))?;
        }
        set_threads(&mut rdr, threads)?;
        Ok(rdr)
    }
}

/// Attach decompression threads to a reader
pub fn set_threads<R: Read>(rdr: &mut R, threads: usize) -> anyhow::Result<()> {
    if threads > 1 {
        trace!("Setting {} reader threads", threads);
        rdr.set_threads(threads)
            .with_context(|| "Could not set reader threads")?
    }
    Ok(())
}
