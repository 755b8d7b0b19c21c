//! Reference sketch index.
//!
//! The index has two faces over the same minmer content: the ordered
//! window list (every minmer occurrence in reference scan order) and the
//! position lookup (hash to interval points, consumed by the mapper's
//! sweep). Building streams the reference through the minmer sketcher on a
//! worker pool, merges thread outputs serially, then prunes hashes that
//! occur too frequently to be informative.

use crate::minmer::{self, MinmerWindow};
use crate::params::IndexParams;
use crate::{parse, serialization};
use ahash::{AHashMap, AHashSet};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// Errors of the sketch/index subsystem. All of them are fatal to the run
/// except where the caller states otherwise.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The FASTA input could not be parsed.
    #[error("failed to read sequence input: {0}")]
    SequenceInput(String),

    /// Nothing was sketched.
    #[error("reference sketch is empty; sequences shorter than the segment length are not indexed")]
    EmptySketch,

    /// The sketch worker pool could not be created.
    #[error("failed to build sketch worker pool: {0}")]
    ThreadPool(String),

    /// The file is not a minwave index.
    #[error("not a minwave index file (bad magic)")]
    BadMagic,

    /// The index was written by an incompatible format version.
    #[error("unsupported index format version {found_major}.{found_minor}, expected {expected_major}.{expected_minor}")]
    UnsupportedVersion {
        /// Major version found in the file.
        found_major: u32,
        /// Minor version found in the file.
        found_minor: u32,
        /// Supported major version.
        expected_major: u32,
        /// Supported minor version.
        expected_minor: u32,
    },

    /// The index was built with different sketch parameters.
    #[error("parameters of the indexed sketch differ from CLI parameters: \
             index --> seg_length={index_seg_length} sketch_size={index_sketch_size} kmer_size={index_kmer_size}; \
             cli --> seg_length={cli_seg_length} sketch_size={cli_sketch_size} kmer_size={cli_kmer_size}")]
    ParameterMismatch {
        /// Segment length recorded in the index file.
        index_seg_length: u64,
        /// Sketch size recorded in the index file.
        index_sketch_size: u64,
        /// K-mer size recorded in the index file.
        index_kmer_size: u64,
        /// Segment length requested on the command line.
        cli_seg_length: u64,
        /// Sketch size requested on the command line.
        cli_sketch_size: u64,
        /// K-mer size requested on the command line.
        cli_kmer_size: u64,
    },

    /// The file contents are not a well-formed index.
    #[error("corrupt index file: {0}")]
    Corrupt(String),
}

/// Which end of a minmer window an interval point marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Window start.
    Open,
    /// Window end.
    Close,
}

/// One endpoint of a minmer window, keyed by its hash in the lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntervalPoint {
    /// Window position of the endpoint.
    pub pos: u64,
    /// Sequence the window belongs to.
    pub seq_id: u32,
    /// Open or close.
    pub side: Side,
}

/// Name and length of one indexed sequence; its id is its position in the
/// metadata list, identical between build and read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContigInfo {
    /// Sequence name (first token of the FASTA header).
    pub name: String,
    /// Sequence length in bases.
    pub len: u64,
}

/// Sketch parameters baked into an index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SketchParams {
    /// K-mer size.
    pub kmer_size: u64,
    /// Sliding-window length in bases.
    pub seg_length: u64,
    /// Bottom-s sketch size.
    pub sketch_size: u64,
}

impl From<&IndexParams> for SketchParams {
    fn from(p: &IndexParams) -> Self {
        Self {
            kmer_size: p.kmer_size as u64,
            seg_length: p.seg_length,
            sketch_size: p.sketch_size,
        }
    }
}

/// The reference minmer index.
pub struct SketchIndex {
    /// Parameters the sketch was built with.
    pub params: SketchParams,
    /// Per-sequence name and length, in sequence-id order.
    pub metadata: Vec<ContigInfo>,
    /// Ordered window list. Content is deterministic; order across
    /// sequences depends on worker completion and must not be relied on.
    pub window_index: Vec<MinmerWindow>,
    /// Hash to interval points, appended in scan order per sequence.
    pub pos_lookup: AHashMap<u64, Vec<IntervalPoint>>,
    /// Frequency histogram: interval-point count -> number of hashes.
    pub(crate) freq_histogram: BTreeMap<u64, u64>,
    pub(crate) freq_threshold: u64,
    pub(crate) frequent_seeds: AHashSet<u64>,
}

impl SketchIndex {
    pub(crate) fn new(params: SketchParams) -> Self {
        Self {
            params,
            metadata: Vec::new(),
            window_index: Vec::new(),
            pos_lookup: AHashMap::new(),
            freq_histogram: BTreeMap::new(),
            freq_threshold: u64::MAX,
            frequent_seeds: AHashSet::new(),
        }
    }

    /// Build, prune and persist (or reload) an index, following the
    /// parameter bundle: a fresh build runs whenever there is no readable
    /// index file or an overwrite was requested.
    pub fn initialize(params: &IndexParams) -> Result<SketchIndex, IndexError> {
        info!("initializing sketch");
        let index = match &params.index_path {
            Some(path) if path.exists() && !params.overwrite_index => {
                let metadata = Self::collect_metadata(params)?;
                let index = Self::read(path, params, metadata)?;
                info!("read index from {}", path.display());
                index
            }
            _ => {
                let mut index = Self::build(params)?;
                index.compute_freq_hist(params.kmer_pct_threshold);
                index.compute_freq_seed_set();
                index.drop_freq_seed_set();
                if let Some(path) = &params.index_path {
                    index.write(path)?;
                    info!("wrote index to {}", path.display());
                }
                index
            }
        };

        // with create_index_only the caller stops right after the write,
        // before the post-initialize statistics
        if !params.create_index_only {
            info!(
                "unique minmer hashes after pruning = {}",
                index.pos_lookup.len() - index.frequent_seeds.len()
            );
            info!(
                "total minmer windows after pruning = {}",
                index.window_index.len()
            );
            info!("metadata size = {}", index.metadata.len());
        }
        Ok(index)
    }

    /// Sketch every matching reference sequence and merge the results.
    pub fn build(params: &IndexParams) -> Result<SketchIndex, IndexError> {
        let t0 = Instant::now();
        let mut index = SketchIndex::new(SketchParams::from(params));

        // metadata pass and job collection
        let mut jobs: Vec<(u32, Vec<u8>)> = Vec::new();
        let mut skipped = 0u64;
        let mut shortest = u64::MAX;
        for path in &params.ref_paths {
            info!("processing reference file {}", path.display());
            parse::for_each_sequence(path, &params.target_names, |name, seq| {
                let len = seq.len() as u64;
                if len < params.seg_length {
                    warn!(
                        "skipping short sequence {} ({} bp < segment length {})",
                        name, len, params.seg_length
                    );
                    skipped += 1;
                    return;
                }
                let seq_id = index.metadata.len() as u32;
                index.metadata.push(ContigInfo {
                    name: name.to_string(),
                    len,
                });
                shortest = shortest.min(len);
                jobs.push((seq_id, seq.to_vec()));
            })?;
        }
        info!(
            "sequences accepted = {}, skipped = {}",
            index.metadata.len(),
            skipped
        );
        if shortest != u64::MAX {
            info!("shortest accepted sequence length = {}", shortest);
        }

        // sketch on the worker pool; the coordinator merges thread
        // outputs in completion order
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(params.threads)
            .build()
            .map_err(|e| IndexError::ThreadPool(e.to_string()))?;
        let kmer_size = params.kmer_size;
        let seg_length = params.seg_length;
        let sketch_size = params.sketch_size;
        let (tx, rx) = crossbeam_channel::unbounded();
        pool.in_place_scope(|scope| {
            for (seq_id, seq) in jobs.drain(..) {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let windows =
                        minmer::window_minmers(&seq, seq_id, kmer_size, seg_length, sketch_size);
                    let _ = tx.send(windows);
                });
            }
            drop(tx);
            for thread_windows in rx.iter() {
                index.merge_thread_output(thread_windows);
            }
        });

        info!(
            "unique minmer hashes before pruning = {}",
            index.pos_lookup.len()
        );
        info!(
            "total minmer windows before pruning = {}",
            index.window_index.len()
        );
        info!(
            "time spent computing the reference index: {:.2} sec",
            t0.elapsed().as_secs_f64()
        );

        if index.window_index.is_empty() {
            return Err(IndexError::EmptySketch);
        }
        Ok(index)
    }

    /// Names-and-lengths pass over the references, with the same skip rule
    /// as the build, so sequence ids agree with the indexed sketch.
    pub fn collect_metadata(params: &IndexParams) -> Result<Vec<ContigInfo>, IndexError> {
        let mut metadata = Vec::new();
        for path in &params.ref_paths {
            parse::for_each_sequence(path, &params.target_names, |name, seq| {
                let len = seq.len() as u64;
                if len < params.seg_length {
                    warn!(
                        "skipping short sequence {} ({} bp < segment length {})",
                        name, len, params.seg_length
                    );
                    return;
                }
                metadata.push(ContigInfo {
                    name: name.to_string(),
                    len,
                });
            })?;
        }
        Ok(metadata)
    }

    /// Fold one thread-local window list into the index.
    ///
    /// Windows append to the ordered list verbatim. Interval points get
    /// the contiguity compression: when the last point for a hash is a
    /// CLOSE of the same sequence ending exactly where the incoming
    /// window starts, that CLOSE is extended instead of appending a new
    /// OPEN/CLOSE pair. The on-disk layout depends on this rule.
    pub(crate) fn merge_thread_output(&mut self, windows: Vec<MinmerWindow>) {
        for w in &windows {
            let points = self.pos_lookup.entry(w.hash).or_default();
            match points.last_mut() {
                Some(last)
                    if last.side == Side::Close
                        && last.seq_id == w.seq_id
                        && last.pos == w.wpos_start =>
                {
                    last.pos = w.wpos_end;
                }
                _ => {
                    points.push(IntervalPoint {
                        pos: w.wpos_start,
                        seq_id: w.seq_id,
                        side: Side::Open,
                    });
                    points.push(IntervalPoint {
                        pos: w.wpos_end,
                        seq_id: w.seq_id,
                        side: Side::Close,
                    });
                }
            }
        }
        self.window_index.extend(windows);
    }

    /// Histogram interval-point counts per hash and derive the frequency
    /// threshold: scanning from the most frequent bucket down, stop once
    /// the cumulative hash count reaches `kmer_pct_threshold` percent of
    /// all unique hashes.
    pub fn compute_freq_hist(&mut self, kmer_pct_threshold: f64) {
        if self.pos_lookup.is_empty() {
            info!("no minmers");
            return;
        }

        self.freq_histogram.clear();
        for points in self.pos_lookup.values() {
            *self.freq_histogram.entry(points.len() as u64).or_insert(0) += 1;
        }
        let lowest = self.freq_histogram.iter().next();
        let highest = self.freq_histogram.iter().next_back();
        info!(
            "frequency histogram of minmer interval points: {:?} ... {:?}",
            lowest, highest
        );

        let total_unique = self.pos_lookup.len() as u64;
        let to_ignore = (total_unique as f64 * kmer_pct_threshold / 100.0) as u64;

        let mut sum = 0u64;
        for (&freq, &count) in self.freq_histogram.iter().rev() {
            sum += count;
            if sum < to_ignore {
                self.freq_threshold = freq;
            } else if sum == to_ignore {
                self.freq_threshold = freq;
                break;
            } else {
                break;
            }
        }

        if self.freq_threshold != u64::MAX {
            info!(
                "with threshold {}%, ignore minmers with >= {} interval points during mapping",
                kmer_pct_threshold, self.freq_threshold
            );
        } else {
            info!(
                "with threshold {}%, consider all minmers during mapping",
                kmer_pct_threshold
            );
        }
    }

    /// Collect every hash at or above the frequency threshold.
    pub fn compute_freq_seed_set(&mut self) {
        for (hash, points) in &self.pos_lookup {
            if points.len() as u64 >= self.freq_threshold {
                self.frequent_seeds.insert(*hash);
            }
        }
    }

    /// Remove frequent-seed windows from the ordered window list. Their
    /// interval points stay resident; queries guard with [`Self::is_freq_seed`].
    pub fn drop_freq_seed_set(&mut self) {
        let frequent = &self.frequent_seeds;
        self.window_index.retain(|w| !frequent.contains(&w.hash));
    }

    /// Whether a hash was pruned as too frequent.
    pub fn is_freq_seed(&self, hash: u64) -> bool {
        self.frequent_seeds.contains(&hash)
    }

    /// The computed frequency threshold (`u64::MAX` when nothing is pruned).
    pub fn freq_threshold(&self) -> u64 {
        self.freq_threshold
    }

    /// Number of pruned hashes.
    pub fn num_frequent_seeds(&self) -> usize {
        self.frequent_seeds.len()
    }

    /// Persist the index; see [`crate::serialization`] for the layout.
    pub fn write(&self, path: &Path) -> Result<(), IndexError> {
        serialization::write_index_file(self, path)
    }

    /// Restore an index written by [`Self::write`], verifying that the file
    /// parameters match the CLI parameters before any state is built.
    pub fn read(
        path: &Path,
        params: &IndexParams,
        metadata: Vec<ContigInfo>,
    ) -> Result<SketchIndex, IndexError> {
        serialization::read_index_file(path, params, metadata)
    }

    /// Dump the ordered window list as TSV for debugging.
    pub fn write_sketch_tsv(&self, path: &Path) -> Result<(), IndexError> {
        use std::io::Write;
        let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
        writeln!(out, "seqId\tstrand\tstart\tend\thash")?;
        for w in &self.window_index {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                w.seq_id,
                w.strand.to_i8(),
                w.wpos_start,
                w.wpos_end,
                w.hash
            )?;
        }
        Ok(())
    }
}
