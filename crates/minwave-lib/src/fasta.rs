//! Random-access sequence retrieval from indexed FASTA.
//!
//! The underlying reader is stateful and not thread-safe, so the pipeline
//! gives every worker its own pair of handles (target and query),
//! constructed inside the worker thread. Handles are never shared.

use ahash::AHashMap;
use anyhow::{anyhow, Context, Result};
use bio::io::fasta::IndexedReader;
use std::fs::File;
use std::path::Path;

/// One exclusively-owned handle onto an indexed FASTA file (`.fai`
/// alongside, as produced by `samtools faidx`).
pub struct FastaHandle {
    reader: IndexedReader<File>,
    lengths: AHashMap<String, u64>,
}

impl FastaHandle {
    /// Open the FASTA and its index.
    pub fn open(path: &Path) -> Result<Self> {
        let reader = IndexedReader::from_file(&path.to_path_buf())
            .map_err(|e| anyhow!("failed to open indexed FASTA {}: {}", path.display(), e))?;
        let lengths = reader
            .index
            .sequences()
            .iter()
            .map(|s| (s.name.clone(), s.len))
            .collect();
        Ok(Self { reader, lengths })
    }

    /// Length of a contig, or `None` when the index does not know it.
    pub fn seq_len(&self, name: &str) -> Option<u64> {
        self.lengths.get(name).copied()
    }

    /// Fetch `[start, end)` (0-based half-open) of a contig into an owned
    /// buffer of length `end - start`.
    pub fn fetch(&mut self, name: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        let len = self
            .seq_len(name)
            .ok_or_else(|| anyhow!("contig {} not present in FASTA index", name))?;
        if start > end || end > len {
            return Err(anyhow!(
                "region {}:{}-{} out of range (contig length {})",
                name,
                start,
                end,
                len
            ));
        }
        self.reader
            .fetch(name, start, end)
            .with_context(|| format!("failed to fetch {}:{}-{}", name, start, end))?;
        let mut seq = Vec::with_capacity((end - start) as usize);
        self.reader
            .read(&mut seq)
            .with_context(|| format!("failed to read {}:{}-{}", name, start, end))?;
        Ok(seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Write a FASTA file with single-line records plus its `.fai`.
    fn write_indexed_fasta(dir: &Path, stem: &str, records: &[(&str, &[u8])]) -> std::path::PathBuf {
        let fa_path = dir.join(format!("{stem}.fa"));
        let fai_path = dir.join(format!("{stem}.fa.fai"));
        let mut fa = std::fs::File::create(&fa_path).unwrap();
        let mut fai = std::fs::File::create(&fai_path).unwrap();
        let mut offset = 0u64;
        for (name, seq) in records {
            let header = format!(">{name}\n");
            fa.write_all(header.as_bytes()).unwrap();
            fa.write_all(seq).unwrap();
            fa.write_all(b"\n").unwrap();
            offset += header.len() as u64;
            writeln!(
                fai,
                "{}\t{}\t{}\t{}\t{}",
                name,
                seq.len(),
                offset,
                seq.len(),
                seq.len() + 1
            )
            .unwrap();
            offset += seq.len() as u64 + 1;
        }
        fa_path
    }

    #[test]
    fn test_fetch_subsequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_indexed_fasta(dir.path(), "ref", &[("r1", b"ACGTACGTAC"), ("r2", b"TTTTGGGG")]);
        let mut handle = FastaHandle::open(&path).unwrap();
        assert_eq!(handle.seq_len("r1"), Some(10));
        assert_eq!(handle.seq_len("r2"), Some(8));
        assert_eq!(handle.seq_len("missing"), None);
        assert_eq!(handle.fetch("r1", 0, 4).unwrap(), b"ACGT");
        assert_eq!(handle.fetch("r1", 4, 10).unwrap(), b"ACGTAC");
        assert_eq!(handle.fetch("r2", 4, 8).unwrap(), b"GGGG");
    }

    #[test]
    fn test_fetch_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_indexed_fasta(dir.path(), "ref", &[("r1", b"ACGTACGTAC")]);
        let mut handle = FastaHandle::open(&path).unwrap();
        assert!(handle.fetch("nope", 0, 4).is_err());
        assert!(handle.fetch("r1", 0, 11).is_err());
        assert!(handle.fetch("r1", 6, 4).is_err());
    }
}
