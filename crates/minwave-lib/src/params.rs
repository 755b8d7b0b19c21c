//! Parameter bundles for indexing and alignment.
//!
//! Both bundles are constructed once from CLI arguments, validated, and
//! treated as read-only for the rest of the run; the pipeline shares them
//! behind an `Arc` and never mutates them after start.

use crate::constants::{
    DEFAULT_KMER_PCT_THRESHOLD, DEFAULT_KMER_SIZE, DEFAULT_MAX_LEN_MINOR, DEFAULT_SEGMENT_LENGTH,
    DEFAULT_SKETCH_SIZE,
};
use std::path::PathBuf;

/// Parameters of the reference sketch/index stage.
#[derive(Debug, Clone)]
pub struct IndexParams {
    /// Worker threads for sketching (0 = all available cores).
    pub threads: usize,

    /// K-mer size for hashing.
    pub kmer_size: usize,

    /// Sliding-window (segment) length for minmer selection, in bases.
    pub seg_length: u64,

    /// Number of smallest hashes retained per window (bottom-s sketch).
    pub sketch_size: u64,

    /// Hashing alphabet size (4 for DNA).
    pub alphabet_size: u64,

    /// Percentage of unique minmer hashes to prune as too frequent.
    pub kmer_pct_threshold: f64,

    /// Reference FASTA files, in order.
    pub ref_paths: Vec<PathBuf>,

    /// If non-empty, only sequences with these names are sketched.
    pub target_names: Vec<String>,

    /// Index file to write after building, or to read when it exists.
    pub index_path: Option<PathBuf>,

    /// Rebuild and overwrite an existing index file.
    pub overwrite_index: bool,

    /// Stop after the index has been built and written.
    pub create_index_only: bool,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            threads: 0,
            kmer_size: DEFAULT_KMER_SIZE,
            seg_length: DEFAULT_SEGMENT_LENGTH,
            sketch_size: DEFAULT_SKETCH_SIZE,
            alphabet_size: 4,
            kmer_pct_threshold: DEFAULT_KMER_PCT_THRESHOLD,
            ref_paths: Vec::new(),
            target_names: Vec::new(),
            index_path: None,
            overwrite_index: false,
            create_index_only: false,
        }
    }
}

impl IndexParams {
    /// Validate the parameter bundle.
    pub fn validate(&self) -> Result<(), String> {
        if self.kmer_size < 2 {
            return Err(format!("kmer size must be >= 2, got {}", self.kmer_size));
        }
        if self.seg_length < self.kmer_size as u64 {
            return Err(format!(
                "segment length must be >= kmer size, got segment length {} and kmer size {}",
                self.seg_length, self.kmer_size
            ));
        }
        if self.sketch_size == 0 {
            return Err("sketch size must be >= 1".to_string());
        }
        if self.alphabet_size != 4 {
            return Err(format!(
                "only the DNA alphabet (size 4) is supported, got {}",
                self.alphabet_size
            ));
        }
        if !(0.0..=100.0).contains(&self.kmer_pct_threshold) {
            return Err(format!(
                "kmer percentage threshold must be in [0, 100], got {}",
                self.kmer_pct_threshold
            ));
        }
        if self.ref_paths.is_empty() {
            return Err("at least one reference FASTA is required".to_string());
        }
        if self.create_index_only && self.index_path.is_none() {
            return Err("an index path is required with create-index-only".to_string());
        }
        Ok(())
    }

    /// Log the parameters via tracing.
    pub fn print(&self) {
        tracing::info!("Index parameters:");
        tracing::info!("  kmer_size = {}", self.kmer_size);
        tracing::info!("  seg_length = {}", self.seg_length);
        tracing::info!("  sketch_size = {}", self.sketch_size);
        tracing::info!("  kmer_pct_threshold = {}%", self.kmer_pct_threshold);
        if self.threads == 0 {
            tracing::info!("  threads = all available cores");
        } else {
            tracing::info!("  threads = {}", self.threads);
        }
        tracing::debug!("  alphabet_size = {}", self.alphabet_size);
        tracing::debug!("  references = {:?}", self.ref_paths);
        tracing::debug!("  targets = {:?}", self.target_names);
        tracing::debug!("  index_path = {:?}", self.index_path);
    }

    /// Thread count with 0 resolved to the available parallelism.
    pub fn effective_threads(&self) -> usize {
        effective_threads(self.threads)
    }
}

/// Parameters of the alignment stage.
#[derive(Debug, Clone)]
pub struct AlignParams {
    /// Worker threads (0 = all available cores); also the number of FASTA
    /// handle pairs.
    pub threads: usize,

    /// Indexed target (reference) FASTA.
    pub target_path: PathBuf,

    /// Indexed query FASTA.
    pub query_path: PathBuf,

    /// Mapping list file produced by the mapping stage.
    pub mapping_path: PathBuf,

    /// PAF output path; lines are appended.
    pub output_path: PathBuf,

    /// When set, one numbered TSV file per alignment is written with this
    /// prefix, in completion order.
    pub tsv_prefix: Option<String>,

    /// When set, a single TSV with the flank padding applied per record.
    pub patching_tsv_path: Option<PathBuf>,

    /// Minimum block identity (fraction) for a record to produce output.
    pub min_identity: f64,

    /// Flank padding around the reference interval, in bases.
    pub wflign_max_len_minor: u64,

    /// WFA mismatch penalty, passed verbatim to the aligner.
    pub wfa_mismatch_score: i32,

    /// WFA gap opening penalty, passed verbatim to the aligner.
    pub wfa_gap_opening_score: i32,

    /// WFA gap extension penalty, passed verbatim to the aligner.
    pub wfa_gap_extension_score: i32,

    /// Emit SAM-style naming conventions.
    pub sam_format: bool,

    /// Emit the MD tag on alignment records.
    pub emit_md_tag: bool,

    /// Omit sequences from SAM output (handled by the output layer).
    pub no_seq_in_sam: bool,

    /// Input mappings were split; rank-suffix query names in SAM mode.
    pub split: bool,
}

impl Default for AlignParams {
    fn default() -> Self {
        Self {
            threads: 0,
            target_path: PathBuf::new(),
            query_path: PathBuf::new(),
            mapping_path: PathBuf::new(),
            output_path: PathBuf::new(),
            tsv_prefix: None,
            patching_tsv_path: None,
            min_identity: 0.0,
            wflign_max_len_minor: DEFAULT_MAX_LEN_MINOR,
            wfa_mismatch_score: 4,
            wfa_gap_opening_score: 6,
            wfa_gap_extension_score: 1,
            sam_format: false,
            emit_md_tag: false,
            no_seq_in_sam: false,
            split: false,
        }
    }
}

impl AlignParams {
    /// Validate the parameter bundle.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.min_identity) {
            return Err(format!(
                "minimum identity must be a fraction in [0, 1], got {}",
                self.min_identity
            ));
        }
        if self.wfa_mismatch_score <= 0
            || self.wfa_gap_opening_score < 0
            || self.wfa_gap_extension_score <= 0
        {
            return Err(format!(
                "WFA penalties must be positive, got mismatch={} gap_open={} gap_ext={}",
                self.wfa_mismatch_score, self.wfa_gap_opening_score, self.wfa_gap_extension_score
            ));
        }
        Ok(())
    }

    /// Log the parameters via tracing.
    pub fn print(&self) {
        tracing::info!("Alignment parameters:");
        tracing::info!("  target = {}", self.target_path.display());
        tracing::info!("  query = {}", self.query_path.display());
        tracing::info!("  mappings = {}", self.mapping_path.display());
        tracing::info!("  output = {}", self.output_path.display());
        if self.threads == 0 {
            tracing::info!("  threads = all available cores");
        } else {
            tracing::info!("  threads = {}", self.threads);
        }
        tracing::debug!("  min_identity = {}", self.min_identity);
        tracing::debug!("  wflign_max_len_minor = {}", self.wflign_max_len_minor);
        tracing::debug!(
            "  wfa penalties: mismatch={} gap_open={} gap_ext={}",
            self.wfa_mismatch_score,
            self.wfa_gap_opening_score,
            self.wfa_gap_extension_score
        );
    }

    /// Thread count with 0 resolved to the available parallelism.
    pub fn effective_threads(&self) -> usize {
        effective_threads(self.threads)
    }
}

fn effective_threads(requested: usize) -> usize {
    if requested > 0 {
        requested
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_params() -> IndexParams {
        IndexParams {
            ref_paths: vec![PathBuf::from("ref.fa")],
            ..IndexParams::default()
        }
    }

    #[test]
    fn test_default_index_params_valid() {
        assert!(index_params().validate().is_ok());
    }

    #[test]
    fn test_segment_shorter_than_kmer() {
        let params = IndexParams {
            seg_length: 10,
            kmer_size: 19,
            ..index_params()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_zero_sketch_size() {
        let params = IndexParams {
            sketch_size: 0,
            ..index_params()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_create_index_only_needs_path() {
        let params = IndexParams {
            create_index_only: true,
            ..index_params()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_align_identity_out_of_range() {
        let params = AlignParams {
            min_identity: 80.0,
            ..AlignParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_effective_threads_resolves_zero() {
        assert!(AlignParams::default().effective_threads() >= 1);
        let params = AlignParams {
            threads: 3,
            ..AlignParams::default()
        };
        assert_eq!(params.effective_threads(), 3);
    }
}
